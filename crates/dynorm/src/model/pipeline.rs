//! Per-field attribute pipeline.
//!
//! Write path, strictly in this order:
//! 1. default (only when the value is absent)
//! 2. mutators, in declaration order
//! 3. validators, in declaration order (first failure wins)
//! 4. lifecycle timestamps, at save time
//! 5. `to_store`, immediately before the write
//!
//! Read path: `from_store` before the value is exposed on the entity.
//! Lazy validators are not part of construction; they run at save time.

use crate::value::Value;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use std::{fmt, sync::Arc};

///
/// Pipeline step signatures
///

/// Zero-argument default provider; invoked once per constructed instance.
pub type DefaultFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// `(previous, incoming) -> next`.
pub type Mutator = Arc<dyn Fn(Option<&Value>, Value) -> Value + Send + Sync>;

/// `Ok(())` passes; `Err(message)` fails the write with that message.
pub type Validator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// One-way value conversion between entity and store representation.
pub type Converter = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Deferred, possibly asynchronous validator run only at save time.
pub type LazyValidator =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

///
/// DefaultValue
///

#[derive(Clone)]
pub enum DefaultValue {
    Const(Value),
    Provider(DefaultFn),
}

impl DefaultValue {
    /// Produce a fresh default. Providers are never memoized.
    #[must_use]
    pub fn produce(&self) -> Value {
        match self {
            Self::Const(value) => value.clone(),
            Self::Provider(provider) => provider(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(value) => f.debug_tuple("Const").field(value).finish(),
            Self::Provider(_) => f.write_str("Provider(..)"),
        }
    }
}

///
/// Lifecycle
///
/// Fields whose value is owned by the pipeline rather than the caller.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Lifecycle {
    CreatedAt,
    UpdatedAt,
    SoftDelete,
}

///
/// WriteMode
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WriteMode {
    Insert,
    Update,
}

///
/// AttributePipeline
///
/// Ordered chain of default/mutate/validate/serialize steps for one field.
///

#[derive(Clone, Default)]
pub struct AttributePipeline {
    pub(crate) default: Option<DefaultValue>,
    pub(crate) mutators: Vec<Mutator>,
    pub(crate) validators: Vec<Validator>,
    pub(crate) lazy_validators: Vec<LazyValidator>,
    pub(crate) to_store: Option<Converter>,
    pub(crate) from_store: Option<Converter>,
}

impl AttributePipeline {
    /// Steps 1-3: default, mutate, validate.
    ///
    /// Returns the value to keep on the entity (`None` when still absent),
    /// or the first validator message.
    pub fn apply(
        &self,
        previous: Option<&Value>,
        incoming: Option<Value>,
    ) -> Result<Option<Value>, String> {
        let value = match incoming {
            Some(value) => Some(value),
            None => self.default.as_ref().map(DefaultValue::produce),
        };

        let Some(mut value) = value else {
            return Ok(None);
        };
        if value.is_null() {
            return Ok(Some(value));
        }

        for mutator in &self.mutators {
            value = mutator(previous, value);
        }

        for validator in &self.validators {
            validator(&value)?;
        }

        Ok(Some(value))
    }

    /// Step 4: lifecycle timestamps overwrite whatever the caller supplied.
    #[must_use]
    pub fn stamp(
        lifecycle: Option<Lifecycle>,
        mode: WriteMode,
        now: DateTime<Utc>,
        current: Option<Value>,
    ) -> Option<Value> {
        match (lifecycle, mode) {
            (Some(Lifecycle::CreatedAt), WriteMode::Insert)
            | (Some(Lifecycle::UpdatedAt), WriteMode::Insert | WriteMode::Update) => {
                Some(Value::Timestamp(now))
            }
            _ => current,
        }
    }

    /// Step 5: entity value → store value.
    #[must_use]
    pub fn to_store(&self, value: Value) -> Value {
        match &self.to_store {
            Some(convert) if !value.is_null() => convert(value),
            _ => value,
        }
    }

    /// Read path: store value → entity value.
    #[must_use]
    pub fn from_store(&self, value: Value) -> Value {
        match &self.from_store {
            Some(convert) if !value.is_null() => convert(value),
            _ => value,
        }
    }

    /// Run every lazy validator in declaration order, stopping at the first failure.
    pub async fn run_lazy(&self, value: &Value) -> Result<(), String> {
        for validator in &self.lazy_validators {
            validator(value.clone()).await?;
        }

        Ok(())
    }

    #[must_use]
    pub const fn has_default(&self) -> bool {
        self.default.is_some()
    }

    #[must_use]
    pub fn has_lazy_validators(&self) -> bool {
        !self.lazy_validators.is_empty()
    }
}

impl fmt::Debug for AttributePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributePipeline")
            .field("default", &self.default)
            .field("mutators", &self.mutators.len())
            .field("validators", &self.validators.len())
            .field("lazy_validators", &self.lazy_validators.len())
            .field("to_store", &self.to_store.is_some())
            .field("from_store", &self.from_store.is_some())
            .finish()
    }
}
