//! Store driver boundary.
//!
//! The engine needs exactly six capabilities from the underlying store:
//! get-by-key, put, delete, key-conditioned query, filtered scan and a
//! bounded atomic multi-item write. Anything speaking those can back a `Db`.

mod memory;

#[cfg(test)]
mod tests;

use crate::{
    db::query::{Condition, KeyCondition},
    value::{Record, Value},
};
use async_trait::async_trait;
use thiserror::Error as ThisError;

// re-exports
pub use memory::{MemoryDriver, RequestStats};

///
/// Item
///
/// One stored item, keyed by storage attribute names.
///

pub type Item = Record;

///
/// Key
///
/// Full primary key of one item, in storage attribute names and store form.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Key {
    pub partition: (String, Value),
    pub sort: Option<(String, Value)>,
}

impl Key {
    #[must_use]
    pub fn new(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            partition: (attribute.into(), value.into()),
            sort: None,
        }
    }

    #[must_use]
    pub fn with_sort(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.sort = Some((attribute.into(), value.into()));
        self
    }

    /// Canonical string form, stable across numeric representations.
    #[must_use]
    pub fn signature(&self) -> String {
        match &self.sort {
            Some((_, sort)) => format!("{}|{}", self.partition.1.key_string(), sort.key_string()),
            None => self.partition.1.key_string(),
        }
    }
}

///
/// PutCondition
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PutCondition {
    /// Fail unless no item with the same key exists.
    NotExists,
}

///
/// TransactOp
///

#[derive(Clone, Debug, PartialEq)]
pub enum TransactOp {
    Put {
        table: String,
        item: Item,
        condition: Option<PutCondition>,
    },
    Delete {
        table: String,
        key: Key,
    },
}

impl TransactOp {
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::Put { table, .. } | Self::Delete { table, .. } => table,
        }
    }
}

///
/// StoreError
///
/// Driver-level failures. The engine never retries; these reach the caller
/// unmodified inside `Error::detail`.
///

#[derive(Debug, ThisError)]
pub enum StoreError {
    #[error("table '{0}' does not exist")]
    TableNotFound(String),

    #[error("item in table '{table}' is missing key attribute '{attribute}'")]
    MissingKeyAttribute { table: String, attribute: String },

    #[error("conditional check failed in table '{table}' for key {key}")]
    ConditionFailed { table: String, key: String },

    #[error("transaction canceled: {reason}")]
    TransactionCanceled { reason: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

///
/// StoreDriver
///

#[async_trait]
pub trait StoreDriver: Send + Sync {
    async fn get_item(&self, table: &str, key: &Key) -> Result<Option<Item>, StoreError>;

    async fn put_item(
        &self,
        table: &str,
        item: Item,
        condition: Option<PutCondition>,
    ) -> Result<(), StoreError>;

    async fn delete_item(&self, table: &str, key: &Key) -> Result<(), StoreError>;

    /// Items in one partition, ordered by sort key (`forward` = ascending),
    /// with `filter` applied after the key condition.
    async fn query(
        &self,
        table: &str,
        key_condition: &KeyCondition,
        filter: &[Condition],
        forward: bool,
    ) -> Result<Vec<Item>, StoreError>;

    /// Every item in the table matching `filter`, in no particular order.
    async fn scan(&self, table: &str, filter: &[Condition]) -> Result<Vec<Item>, StoreError>;

    /// Apply every operation or none of them.
    async fn transact_write(&self, ops: Vec<TransactOp>) -> Result<(), StoreError>;
}
