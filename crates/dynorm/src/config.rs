use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error as ThisError;

/// Default cap on operations per transaction.
pub const DEFAULT_TRANSACTION_LIMIT: usize = 25;

/// Largest configurable transaction cap.
pub const MAX_TRANSACTION_LIMIT: usize = 100;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("transaction_limit must be between 1 and {max}, found {value}")]
    TransactionLimit { value: usize, max: usize },
}

///
/// DbConfig
///
/// Runtime settings for a `Db`. Every key is optional in TOML:
///
/// ```toml
/// transaction_limit = 25
/// table_prefix = "staging_"
/// debug = false
/// ```
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DbConfig {
    /// Operation cap enforced by `Transaction::commit`.
    pub transaction_limit: usize,

    /// Prepended to every entity storage name at call time.
    pub table_prefix: Option<String>,

    /// Log compiled store expressions at debug level.
    pub debug: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            transaction_limit: DEFAULT_TRANSACTION_LIMIT,
            table_prefix: None,
            debug: false,
        }
    }
}

impl DbConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;

        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transaction_limit == 0 || self.transaction_limit > MAX_TRANSACTION_LIMIT {
            return Err(ConfigError::TransactionLimit {
                value: self.transaction_limit,
                max: MAX_TRANSACTION_LIMIT,
            });
        }

        Ok(())
    }

    #[must_use]
    pub const fn transaction_limit(mut self, limit: usize) -> Self {
        self.transaction_limit = limit;
        self
    }

    #[must_use]
    pub fn table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub const fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Physical table name for an entity storage name.
    #[must_use]
    pub fn table_name(&self, storage_name: &str) -> String {
        match &self.table_prefix {
            Some(prefix) => format!("{prefix}{storage_name}"),
            None => storage_name.to_string(),
        }
    }
}
