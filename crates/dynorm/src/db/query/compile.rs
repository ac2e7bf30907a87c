//! Filter → store access plan.
//!
//! Compilation resolves field names to storage names, pushes every value
//! through the field's `to_store` converter and then decides the access
//! path: a partition key pinned by `=` to a scalar yields a key-conditioned
//! query, anything else a full scan with the filter evaluated post-fetch.

use crate::{
    db::query::{
        filter::{Condition, Filter, Operator},
        options::{Order, TrashedMode},
    },
    error::Error,
    model::{entity::EntityModel, field::FieldModel},
    value::Value,
};

///
/// KeyCondition
///
/// Partition equality plus an optional sort-key range, in storage names
/// and store form.
///

#[derive(Clone, Debug, PartialEq)]
pub struct KeyCondition {
    pub partition: (String, Value),
    pub sort: Option<Condition>,
}

///
/// AccessPath
///

#[derive(Clone, Debug, PartialEq)]
pub enum AccessPath {
    Query(KeyCondition),
    Scan,
}

///
/// AccessMode
///
/// Payload-free view of [`AccessPath`], used for logging and metrics.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AccessMode {
    Query,
    Scan,
}

///
/// CompiledQuery
///

#[derive(Clone, Debug, PartialEq)]
pub struct CompiledQuery {
    pub table: String,
    pub access: AccessPath,

    /// Residual conditions evaluated after the key condition.
    pub filter: Vec<Condition>,
    pub order: Order,

    /// Attribute that orders results (sort key, else partition key).
    pub sort_attribute: String,

    /// Set when a condition can never match (`in []`); no store call is needed.
    pub empty: bool,
}

impl CompiledQuery {
    #[must_use]
    pub const fn mode(&self) -> AccessMode {
        match self.access {
            AccessPath::Query(_) => AccessMode::Query,
            AccessPath::Scan => AccessMode::Scan,
        }
    }

    #[must_use]
    pub const fn is_query(&self) -> bool {
        matches!(self.access, AccessPath::Query(_))
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.empty
    }
}

/// Compile `filter` against `model` for reads from `table`.
pub fn compile(
    model: &EntityModel,
    table: &str,
    filter: &Filter,
    order: Order,
    trashed: TrashedMode,
) -> Result<CompiledQuery, Error> {
    let partition_field = model.partition_key().ok_or_else(|| {
        Error::query_unsupported(format!(
            "entity '{}' has no partition key",
            model.type_name()
        ))
    })?;
    let sort_field = model.sort_key();

    let mut conditions = Vec::with_capacity(filter.len() + 1);
    let mut empty = false;
    for condition in filter.iter() {
        let compiled = compile_condition(model, condition)?;
        if compiled.op == Operator::In && is_empty_list(&compiled.value) {
            empty = true;
        }
        conditions.push(compiled);
    }

    // key condition
    let partition = take_first(&mut conditions, |c| {
        c.field == partition_field.storage() && c.op == Operator::Eq && c.value.is_scalar()
    });
    let access = match partition {
        Some(partition) => {
            let sort = sort_field.and_then(|sort_field| {
                take_first(&mut conditions, |c| {
                    c.field == sort_field.storage()
                        && c.op.is_range_key_op()
                        && c.value.is_scalar()
                        && (c.op != Operator::BeginsWith || c.value.as_text().is_some())
                })
            });

            AccessPath::Query(KeyCondition {
                partition: (partition.field, partition.value),
                sort,
            })
        }
        None => AccessPath::Scan,
    };

    // soft-delete visibility
    if let Some(marker) = model.soft_delete_field() {
        let op = match trashed {
            TrashedMode::Exclude => Some(Operator::NotExists),
            TrashedMode::Include => None,
            TrashedMode::Only => Some(Operator::Exists),
        };
        if let Some(op) = op {
            conditions.push(Condition::new(marker.storage(), op, Value::Null));
        }
    }

    let sort_attribute = sort_field
        .unwrap_or(partition_field)
        .storage()
        .to_string();

    Ok(CompiledQuery {
        table: table.to_string(),
        access,
        filter: conditions,
        order,
        sort_attribute,
        empty,
    })
}

// Resolve one caller condition into storage name and store form.
fn compile_condition(model: &EntityModel, condition: &Condition) -> Result<Condition, Error> {
    let field = model.field(&condition.field).ok_or_else(|| {
        Error::query_unsupported(format!(
            "entity '{}' has no field '{}' to filter on",
            model.type_name(),
            condition.field
        ))
    })?;

    let compiled = match condition.op {
        Operator::Exists | Operator::NotExists => {
            Condition::new(field.storage(), condition.op, Value::Null)
        }
        Operator::In | Operator::NotIn => {
            let Value::List(items) = &condition.value else {
                return Err(Error::query_unsupported(format!(
                    "operator '{}' on '{}' needs a list, found {}",
                    condition.op,
                    condition.field,
                    condition.value.kind()
                )));
            };
            let items: Vec<Value> = items.iter().map(|v| store_value(field, v)).collect();

            // `not-in []` excludes nothing, leaving only the presence requirement.
            if condition.op == Operator::NotIn && items.is_empty() {
                Condition::new(field.storage(), Operator::Exists, Value::Null)
            } else {
                Condition::new(field.storage(), condition.op, Value::List(items))
            }
        }
        op => Condition::new(field.storage(), op, store_value(field, &condition.value)),
    };

    Ok(compiled)
}

fn store_value(field: &FieldModel, value: &Value) -> Value {
    field.pipeline().to_store(value.clone())
}

fn is_empty_list(value: &Value) -> bool {
    value.as_list().is_some_and(<[Value]>::is_empty)
}

fn take_first<F>(conditions: &mut Vec<Condition>, pred: F) -> Option<Condition>
where
    F: Fn(&Condition) -> bool,
{
    let index = conditions.iter().position(pred)?;

    Some(conditions.remove(index))
}
