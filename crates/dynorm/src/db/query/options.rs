use crate::{
    db::query::filter::{Filter, IntoFilter},
    error::Error,
};
use derive_more::{Deref, IntoIterator};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

///
/// Order
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl Order {
    #[must_use]
    pub const fn reverse(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    #[must_use]
    pub const fn is_asc(self) -> bool {
        matches!(self, Self::Asc)
    }

    fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "ASC" => Some(Self::Asc),
            "DESC" => Some(Self::Desc),
            _ => None,
        }
    }
}

///
/// TrashedMode
///
/// Soft-delete visibility for one read.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TrashedMode {
    #[default]
    Exclude,
    Include,
    Only,
}

///
/// Include
///

#[derive(Clone, Debug, PartialEq)]
pub enum Include {
    /// Load every related item.
    All,
    /// Load related items matching a nested query (which may include further).
    Nested(Box<Query>),
}

impl Include {
    /// The nested query, or an empty one for [`Include::All`].
    #[must_use]
    pub fn query(&self) -> Query {
        match self {
            Self::All => Query::default(),
            Self::Nested(query) => (**query).clone(),
        }
    }
}

///
/// IncludeSpec
///
/// Relation name → include mode.
///

#[derive(Clone, Debug, Default, Deref, IntoIterator, PartialEq)]
pub struct IncludeSpec(BTreeMap<String, Include>);

impl IncludeSpec {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    #[must_use]
    pub fn all(mut self, relation: impl Into<String>) -> Self {
        self.0.insert(relation.into(), Include::All);
        self
    }

    #[must_use]
    pub fn nested(mut self, relation: impl Into<String>, query: Query) -> Self {
        self.0
            .insert(relation.into(), Include::Nested(Box::new(query)));
        self
    }

    fn from_json(json: &JsonValue) -> Result<Self, Error> {
        let mut spec = Self::new();

        match json {
            JsonValue::Array(names) => {
                for name in names {
                    let JsonValue::String(name) = name else {
                        return Err(Error::query_unsupported(format!(
                            "include list entries must be relation names, found {name}"
                        )));
                    };
                    spec = spec.all(name.as_str());
                }
            }
            JsonValue::Object(map) => {
                for (name, rhs) in map {
                    match rhs {
                        JsonValue::Bool(true) => spec = spec.all(name.as_str()),
                        JsonValue::Bool(false) | JsonValue::Null => {}
                        JsonValue::Object(_) => {
                            spec = spec.nested(name.as_str(), Query::from_json(rhs)?);
                        }
                        other => {
                            return Err(Error::query_unsupported(format!(
                                "include '{name}' must be true or a nested query, found {other}"
                            )));
                        }
                    }
                }
            }
            other => {
                return Err(Error::query_unsupported(format!(
                    "include must be an object or a list, found {other}"
                )));
            }
        }

        Ok(spec)
    }
}

///
/// QueryOptions
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryOptions {
    pub order: Order,
    pub skip: usize,
    pub limit: Option<usize>,
    /// Projection; `None` keeps every declared field.
    pub attributes: Option<Vec<String>>,
    pub include: IncludeSpec,
}

impl QueryOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub const fn desc(self) -> Self {
        self.order(Order::Desc)
    }

    #[must_use]
    pub const fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = Some(attributes.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn include(mut self, relation: impl Into<String>) -> Self {
        self.include = self.include.all(relation);
        self
    }

    #[must_use]
    pub fn include_with(mut self, relation: impl Into<String>, query: Query) -> Self {
        self.include = self.include.nested(relation, query);
        self
    }

    /// Apply ordering-independent pagination to an already ordered list.
    pub(crate) fn paginate<T>(&self, items: Vec<T>) -> Vec<T> {
        let items = items.into_iter().skip(self.skip);

        match self.limit {
            Some(limit) => items.take(limit).collect(),
            None => items.collect(),
        }
    }
}

///
/// Query
///
/// Filter plus options; the unit of a nested include and of the JSON
/// wire shape.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    pub filter: Filter,
    pub options: QueryOptions,
}

impl Query {
    #[must_use]
    pub fn new(filter: impl IntoFilter) -> Self {
        Self {
            filter: filter.into_filter(),
            options: QueryOptions::default(),
        }
    }

    #[must_use]
    pub fn options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    /// Parse `{ where?, order?, skip?, limit?, attributes?, include? }`.
    pub fn from_json(json: &JsonValue) -> Result<Self, Error> {
        let JsonValue::Object(map) = json else {
            return Err(Error::query_unsupported(format!(
                "query must be an object, found {json}"
            )));
        };

        let mut query = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "where" => query.filter = Filter::from_json(value)?,
                "order" => {
                    query.options.order = value
                        .as_str()
                        .and_then(Order::parse)
                        .ok_or_else(|| {
                            Error::query_unsupported(format!(
                                "order must be \"ASC\" or \"DESC\", found {value}"
                            ))
                        })?;
                }
                "skip" => query.options.skip = json_count(key, value)?,
                "limit" => query.options.limit = Some(json_count(key, value)?),
                "attributes" => {
                    let names = value
                        .as_array()
                        .and_then(|names| {
                            names
                                .iter()
                                .map(|name| name.as_str().map(str::to_string))
                                .collect::<Option<Vec<_>>>()
                        })
                        .ok_or_else(|| {
                            Error::query_unsupported(format!(
                                "attributes must be a list of field names, found {value}"
                            ))
                        })?;
                    query.options.attributes = Some(names);
                }
                "include" => query.options.include = IncludeSpec::from_json(value)?,
                other => {
                    return Err(Error::query_unsupported(format!(
                        "unknown query option '{other}'"
                    )));
                }
            }
        }

        Ok(query)
    }
}

fn json_count(key: &str, value: &JsonValue) -> Result<usize, Error> {
    value
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| {
            Error::query_unsupported(format!("{key} must be a non-negative integer, found {value}"))
        })
}
