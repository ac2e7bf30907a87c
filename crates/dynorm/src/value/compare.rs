use crate::value::Value;
use std::cmp::Ordering;

///
/// Compare two values for equality.
///
/// Int and Float compare numerically; lists and maps compare structurally.
/// Values of different families are never equal. Returns `None` only when a
/// numeric comparison is undefined (NaN).
///
#[must_use]
pub fn compare_eq(left: &Value, right: &Value) -> Option<bool> {
    match (left, right) {
        (Value::List(_) | Value::Map(_), _) | (_, Value::List(_) | Value::Map(_)) => {
            Some(left == right)
        }
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            compare_numeric(left, right).map(Ordering::is_eq)
        }
        _ => Some(left == right),
    }
}

///
/// Compare two values for ordering.
///
/// Ordering is defined for numbers, text and timestamps. Any other pairing
/// yields `None` and filter evaluation treats it as a non-match.
///
#[must_use]
pub fn compare_order(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            compare_numeric(left, right)
        }
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

///
/// Total order used when sorting result sets.
///
/// Comparable pairs use [`compare_order`]; anything else falls back to a
/// fixed rank per variant so sorting stays deterministic.
///
#[must_use]
pub fn sort_order(left: &Value, right: &Value) -> Ordering {
    compare_order(left, right).unwrap_or_else(|| rank(left).cmp(&rank(right)))
}

fn compare_numeric(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        _ => left.as_float()?.partial_cmp(&right.as_float()?),
    }
}

const fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Float(_) => 2,
        Value::Text(_) => 3,
        Value::Timestamp(_) => 4,
        Value::List(_) => 5,
        Value::Map(_) => 6,
    }
}
