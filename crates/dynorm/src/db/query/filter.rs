use crate::{error::Error, value::Value};
use derive_more::{Deref, IntoIterator};
use serde_json::Value as JsonValue;
use std::{fmt, str::FromStr};

///
/// Operator
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
    Contains,
    BeginsWith,
    Exists,
    NotExists,
}

impl Operator {
    /// Parse an operator or one of its accepted aliases.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim().trim_start_matches('$');
        let op = match token.to_ascii_lowercase().as_str() {
            "=" | "==" | "eq" => Self::Eq,
            "!=" | "<>" | "ne" | "neq" => Self::Ne,
            "<" | "lt" => Self::Lt,
            "<=" | "lte" | "le" => Self::Lte,
            ">" | "gt" => Self::Gt,
            ">=" | "gte" | "ge" => Self::Gte,
            "in" => Self::In,
            "not-in" | "not_in" | "notin" | "nin" => Self::NotIn,
            "contains" | "includes" | "like" => Self::Contains,
            "begins-with" | "begins_with" | "beginswith" | "starts-with" | "starts_with"
            | "startswith" => Self::BeginsWith,
            "exists" => Self::Exists,
            "not-exists" | "not_exists" | "notexists" => Self::NotExists,
            _ => return None,
        };

        Some(op)
    }

    /// Canonical spelling.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::In => "in",
            Self::NotIn => "not-in",
            Self::Contains => "contains",
            Self::BeginsWith => "begins-with",
            Self::Exists => "exists",
            Self::NotExists => "not-exists",
        }
    }

    /// Operators a store accepts on the sort key inside a key condition.
    #[must_use]
    pub const fn is_range_key_op(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Lt | Self::Lte | Self::Gt | Self::Gte | Self::BeginsWith
        )
    }

    /// Operators whose right-hand side is a list.
    #[must_use]
    pub const fn takes_list(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| Error::query_unsupported(format!("unknown operator '{s}'")))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

///
/// Condition
///
/// One `{ field, operator, value }` filter leaf.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: Operator,
    pub value: Value,
}

impl Condition {
    /// Build a leaf. A list on the right of `=` / `!=` becomes `in` / `not-in`.
    #[must_use]
    pub fn new(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        let value = value.into();
        let op = match (op, &value) {
            (Operator::Eq, Value::List(_)) => Operator::In,
            (Operator::Ne, Value::List(_)) => Operator::NotIn,
            (op, _) => op,
        };

        Self {
            field: field.into(),
            op,
            value,
        }
    }
}

///
/// Filter
///
/// Conditions combined by implicit AND. There is no OR: callers needing a
/// union issue several queries and merge the results.
///

#[derive(Clone, Debug, Default, Deref, IntoIterator, PartialEq)]
pub struct Filter(Vec<Condition>);

impl Filter {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn and(mut self, condition: Condition) -> Self {
        self.0.push(condition);
        self
    }

    #[must_use]
    pub fn op(self, field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        self.and(Condition::new(field, op, value))
    }

    #[must_use]
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Eq, value)
    }

    #[must_use]
    pub fn ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Ne, value)
    }

    #[must_use]
    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Lt, value)
    }

    #[must_use]
    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Lte, value)
    }

    #[must_use]
    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Gt, value)
    }

    #[must_use]
    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Gte, value)
    }

    #[must_use]
    pub fn in_<V: Into<Value>>(self, field: impl Into<String>, values: Vec<V>) -> Self {
        self.op(field, Operator::In, Value::from(values))
    }

    #[must_use]
    pub fn not_in<V: Into<Value>>(self, field: impl Into<String>, values: Vec<V>) -> Self {
        self.op(field, Operator::NotIn, Value::from(values))
    }

    #[must_use]
    pub fn contains(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Contains, value)
    }

    #[must_use]
    pub fn begins_with(self, field: impl Into<String>, prefix: impl Into<Value>) -> Self {
        self.op(field, Operator::BeginsWith, prefix)
    }

    #[must_use]
    pub fn exists(self, field: impl Into<String>) -> Self {
        self.op(field, Operator::Exists, Value::Null)
    }

    #[must_use]
    pub fn not_exists(self, field: impl Into<String>) -> Self {
        self.op(field, Operator::NotExists, Value::Null)
    }

    /// Append every condition of `other`.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.0.extend(other.0);
        self
    }

    /// Parse the `where` wire shape: `{ field: value | { op: value, .. } }`.
    ///
    /// An object value is read as an operator map only when every key is a
    /// known operator; otherwise it is an equality match on a map value.
    pub fn from_json(json: &JsonValue) -> Result<Self, Error> {
        let JsonValue::Object(fields) = json else {
            return Err(Error::query_unsupported(format!(
                "filter must be an object, found {json}"
            )));
        };

        let mut filter = Self::new();
        for (field, rhs) in fields {
            match operator_map(rhs) {
                Some(ops) => {
                    for (op, value) in ops {
                        filter = filter.op(field.as_str(), op, Value::from(value.clone()));
                    }
                }
                None => filter = filter.eq(field.as_str(), Value::from(rhs.clone())),
            }
        }

        Ok(filter)
    }
}

fn operator_map(rhs: &JsonValue) -> Option<Vec<(Operator, &JsonValue)>> {
    let JsonValue::Object(map) = rhs else {
        return None;
    };
    if map.is_empty() {
        return None;
    }

    map.iter()
        .map(|(token, value)| Operator::parse(token).map(|op| (op, value)))
        .collect()
}

///
/// IntoFilter
///
/// Normalizes the `where` call shapes into one [`Filter`]:
/// `(field, value)`, `(field, op, value)`, a single [`Condition`], or a
/// ready [`Filter`]. `()` selects everything.
///

pub trait IntoFilter {
    fn into_filter(self) -> Filter;
}

impl IntoFilter for Filter {
    fn into_filter(self) -> Filter {
        self
    }
}

impl IntoFilter for () {
    fn into_filter(self) -> Filter {
        Filter::new()
    }
}

impl IntoFilter for Condition {
    fn into_filter(self) -> Filter {
        Filter(vec![self])
    }
}

impl IntoFilter for Vec<Condition> {
    fn into_filter(self) -> Filter {
        Filter(self)
    }
}

impl<V: Into<Value>> IntoFilter for (&str, V) {
    fn into_filter(self) -> Filter {
        Filter::new().eq(self.0, self.1)
    }
}

impl<V: Into<Value>> IntoFilter for (&str, Operator, V) {
    fn into_filter(self) -> Filter {
        Filter::new().op(self.0, self.1, self.2)
    }
}
