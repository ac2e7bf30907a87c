//! Ready-made pipeline steps for common field declarations.

///
/// Default providers
///

pub mod default {
    use crate::value::Value;
    use chrono::Utc;
    use ulid::Ulid;

    /// Fresh ULID as text.
    #[must_use]
    pub fn ulid() -> Value {
        Value::from(Ulid::new())
    }

    /// Current instant.
    #[must_use]
    pub fn now() -> Value {
        Value::Timestamp(Utc::now())
    }
}

///
/// Mutators
///

pub mod mutate {
    use crate::value::Value;

    fn map_text(value: Value, f: impl FnOnce(&str) -> String) -> Value {
        match value {
            Value::Text(text) => Value::Text(f(&text)),
            other => other,
        }
    }

    #[must_use]
    pub fn trim(_previous: Option<&Value>, value: Value) -> Value {
        map_text(value, |text| text.trim().to_string())
    }

    #[must_use]
    pub fn lowercase(_previous: Option<&Value>, value: Value) -> Value {
        map_text(value, str::to_lowercase)
    }

    #[must_use]
    pub fn uppercase(_previous: Option<&Value>, value: Value) -> Value {
        map_text(value, str::to_uppercase)
    }
}

///
/// Validators
///

pub mod validate {
    use crate::value::{Value, compare_eq};

    /// Text must contain `needle`.
    pub fn contains(needle: &'static str) -> impl Fn(&Value) -> Result<(), String> + Send + Sync {
        move |value| match value {
            Value::Text(text) if text.contains(needle) => Ok(()),
            Value::Text(_) => Err(format!("must contain '{needle}'")),
            other => Err(format!("expected text, found {}", other.kind())),
        }
    }

    /// Text (in chars) or list length must be at least `min`.
    pub fn min_len(min: usize) -> impl Fn(&Value) -> Result<(), String> + Send + Sync {
        move |value| match length(value) {
            Some(len) if len >= min => Ok(()),
            Some(len) => Err(format!("length {len} is below the minimum of {min}")),
            None => Err(format!("{} has no length", value.kind())),
        }
    }

    pub fn max_len(max: usize) -> impl Fn(&Value) -> Result<(), String> + Send + Sync {
        move |value| match length(value) {
            Some(len) if len <= max => Ok(()),
            Some(len) => Err(format!("length {len} exceeds the maximum of {max}")),
            None => Err(format!("{} has no length", value.kind())),
        }
    }

    /// Value must equal one of `allowed`.
    pub fn one_of(allowed: Vec<Value>) -> impl Fn(&Value) -> Result<(), String> + Send + Sync {
        move |value| {
            if allowed
                .iter()
                .any(|candidate| compare_eq(value, candidate).unwrap_or(false))
            {
                Ok(())
            } else {
                Err(format!("{value:?} is not an allowed value"))
            }
        }
    }

    fn length(value: &Value) -> Option<usize> {
        match value {
            Value::Text(text) => Some(text.chars().count()),
            Value::List(items) => Some(items.len()),
            _ => None,
        }
    }
}

///
/// Codecs
///

pub mod convert {
    use crate::{model::field::Codec, value::Value};
    use chrono::DateTime;
    use std::sync::Arc;

    /// Booleans stored as `1` / `0`.
    #[must_use]
    pub fn bool_as_int() -> Codec {
        Codec {
            to_store: Arc::new(|value| match value {
                Value::Bool(b) => Value::Int(i64::from(b)),
                other => other,
            }),
            from_store: Arc::new(|value| match value {
                Value::Int(i) => Value::Bool(i != 0),
                other => other,
            }),
        }
    }

    /// Timestamps stored as epoch milliseconds.
    #[must_use]
    pub fn timestamp_millis() -> Codec {
        Codec {
            to_store: Arc::new(|value| match value {
                Value::Timestamp(ts) => Value::Int(ts.timestamp_millis()),
                other => other,
            }),
            from_store: Arc::new(|value| match value {
                Value::Int(ms) => {
                    DateTime::from_timestamp_millis(ms).map_or(Value::Int(ms), Value::Timestamp)
                }
                other => other,
            }),
        }
    }
}
