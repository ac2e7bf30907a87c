use crate::{
    db::query::filter::{Condition, Operator},
    value::{Record, Value, compare_eq, compare_order},
};
use std::cmp::Ordering;

/// Evaluate every condition against one item (logical AND).
#[must_use]
pub fn matches_all(item: &Record, conditions: &[Condition]) -> bool {
    conditions.iter().all(|condition| matches(item, condition))
}

/// Evaluate one condition against one item.
///
/// A missing or null attribute only satisfies `not-exists`; every
/// comparison against it is false, including `!=` and `not-in`.
#[must_use]
pub fn matches(item: &Record, condition: &Condition) -> bool {
    let actual = item.get(&condition.field).filter(|value| !value.is_null());

    match condition.op {
        Operator::Exists => actual.is_some(),
        Operator::NotExists => actual.is_none(),
        op => actual.is_some_and(|actual| compare(op, actual, &condition.value)),
    }
}

fn compare(op: Operator, actual: &Value, expected: &Value) -> bool {
    match op {
        Operator::Eq => compare_eq(actual, expected) == Some(true),
        Operator::Ne => compare_eq(actual, expected) == Some(false),
        Operator::Lt => compare_order(actual, expected) == Some(Ordering::Less),
        Operator::Lte => matches!(
            compare_order(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::Gt => compare_order(actual, expected) == Some(Ordering::Greater),
        Operator::Gte => matches!(
            compare_order(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::In => expected
            .as_list()
            .is_some_and(|list| list.iter().any(|v| compare_eq(actual, v) == Some(true))),
        Operator::NotIn => expected
            .as_list()
            .is_some_and(|list| list.iter().all(|v| compare_eq(actual, v) == Some(false))),
        Operator::Contains => contains(actual, expected),
        Operator::BeginsWith => match (actual, expected) {
            (Value::Text(text), Value::Text(prefix)) => text.starts_with(prefix.as_str()),
            _ => false,
        },
        Operator::Exists | Operator::NotExists => false,
    }
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match (haystack, needle) {
        (Value::Text(text), Value::Text(fragment)) => text.contains(fragment.as_str()),
        (Value::List(items), needle) => items
            .iter()
            .any(|item| compare_eq(item, needle) == Some(true)),
        _ => false,
    }
}
