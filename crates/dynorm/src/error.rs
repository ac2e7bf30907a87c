use crate::{config::ConfigError, db::store::StoreError};
use std::fmt;
use thiserror::Error as ThisError;

///
/// Error
///
/// Structured runtime error with a stable classification.
/// `class` says what kind of failure happened, `origin` says which layer
/// raised it, and `detail` carries the structured payload when one exists.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct Error {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    pub detail: Option<ErrorDetail>,
}

impl Error {
    #[must_use]
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    /// Construct a registry-origin configuration error.
    pub(crate) fn registry(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Configuration, ErrorOrigin::Registry, message)
    }

    /// Construct a model-origin configuration error.
    pub(crate) fn model(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Configuration, ErrorOrigin::Model, message)
    }

    /// Construct a field validation error.
    ///
    /// The failing field and the validator message are kept in the detail so
    /// callers can report them without parsing the message.
    pub fn validation(
        entity: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let entity = entity.into();
        let field = field.into();
        let message = message.into();

        Self {
            class: ErrorClass::Validation,
            origin: ErrorOrigin::Pipeline,
            message: format!("validation failed: {entity}.{field}: {message}"),
            detail: Some(ErrorDetail::Validation(ValidationError {
                entity,
                field,
                message,
            })),
        }
    }

    /// Construct a query-origin unsupported error.
    pub(crate) fn query_unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unsupported, ErrorOrigin::Query, message)
    }

    /// Construct a relation-origin unsupported error.
    pub(crate) fn relation_unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unsupported, ErrorOrigin::Relation, message)
    }

    /// Construct a transaction-origin invariant violation.
    pub(crate) fn transaction_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Transaction,
            message,
        )
    }

    /// Construct a serialize-origin error.
    pub(crate) fn serialize(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Serialize, ErrorOrigin::Serialize, message)
    }

    /// Construct the error raised when a batch exceeds the operation cap.
    pub(crate) fn transaction_limit(count: usize, limit: usize) -> Self {
        Self {
            class: ErrorClass::TransactionLimit,
            origin: ErrorOrigin::Transaction,
            message: format!("transaction has {count} operations; the limit is {limit}"),
            detail: Some(ErrorDetail::TransactionLimit { count, limit }),
        }
    }

    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self.class, ErrorClass::Validation)
    }

    #[must_use]
    pub const fn is_transaction_limit(&self) -> bool {
        matches!(self.class, ErrorClass::TransactionLimit)
    }

    /// Borrow the validation detail, if this is a validation error.
    #[must_use]
    pub const fn validation_detail(&self) -> Option<&ValidationError> {
        match &self.detail {
            Some(ErrorDetail::Validation(detail)) => Some(detail),
            _ => None,
        }
    }

    /// Borrow the driver error, if this error came from the store.
    #[must_use]
    pub const fn store_error(&self) -> Option<&StoreError> {
        match &self.detail {
            Some(ErrorDetail::Store(err)) => Some(err),
            _ => None,
        }
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Self {
            class: ErrorClass::Store,
            origin: ErrorOrigin::Store,
            message: err.to_string(),
            detail: Some(ErrorDetail::Store(err)),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorClass::Configuration, ErrorOrigin::Config, err.to_string())
    }
}

///
/// ErrorDetail
///
/// Structured, class-specific error detail carried by [`Error`].
///

#[derive(Debug, ThisError)]
pub enum ErrorDetail {
    #[error("{0}")]
    Validation(ValidationError),

    #[error("{count} operations exceed the limit of {limit}")]
    TransactionLimit { count: usize, limit: usize },

    /// Driver failure, passed through unmodified.
    #[error("{0}")]
    Store(StoreError),
}

///
/// ValidationError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("{entity}.{field}: {message}")]
pub struct ValidationError {
    pub entity: String,
    pub field: String,
    pub message: String,
}

///
/// ErrorClass
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Configuration,
    Validation,
    TransactionLimit,
    Store,
    Serialize,
    Unsupported,
    InvariantViolation,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Configuration => "configuration",
            Self::Validation => "validation",
            Self::TransactionLimit => "transaction_limit",
            Self::Store => "store",
            Self::Serialize => "serialize",
            Self::Unsupported => "unsupported",
            Self::InvariantViolation => "invariant_violation",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Config,
    Model,
    Registry,
    Pipeline,
    Query,
    Relation,
    Transaction,
    Serialize,
    Store,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Config => "config",
            Self::Model => "model",
            Self::Registry => "registry",
            Self::Pipeline => "pipeline",
            Self::Query => "query",
            Self::Relation => "relation",
            Self::Transaction => "transaction",
            Self::Serialize => "serialize",
            Self::Store => "store",
        };
        write!(f, "{label}")
    }
}
