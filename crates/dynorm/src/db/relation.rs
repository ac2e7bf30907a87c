//! Include resolution.
//!
//! Every include runs one target load per parent (concurrently across
//! parents), so nested `order`/`skip`/`limit` apply per parent. Nested
//! includes are resolved by the target load itself. Cycles are not
//! detected: an include graph that loops forever is a caller error.

use crate::{
    db::{
        Db,
        query::{Condition, Filter, Include, IncludeSpec, Operator, Query, TrashedMode},
        session::Table,
    },
    entity::{Entity, Related},
    error::Error,
    model::{
        entity::EntityModel,
        relation::{RelationKind, RelationModel},
    },
    obs::sink::MetricsEvent,
    value::Value,
};
use futures_util::future::try_join_all;

/// Attach every include in `spec` to each of `parents`.
pub(crate) async fn resolve(
    db: &Db,
    model: &EntityModel,
    parents: &mut [Entity],
    spec: &IncludeSpec,
) -> Result<(), Error> {
    if parents.is_empty() {
        return Ok(());
    }

    for (name, include) in spec.iter() {
        let relation = model.relation(name).ok_or_else(|| {
            Error::relation_unsupported(format!(
                "entity '{}' has no relation '{name}'",
                model.type_name()
            ))
        })?;
        let target = db.table(relation.target())?;

        let related = load_related(db, model, relation, &target, parents, include).await?;

        let rows: usize = related
            .iter()
            .map(|related| match related {
                Related::Many(entities) => entities.len(),
                Related::One(entity) => usize::from(entity.is_some()),
            })
            .sum();
        tracing::debug!(
            entity = %model.type_name(),
            relation = %name,
            target = %target.model().type_name(),
            rows,
            "relation loaded"
        );
        db.record(MetricsEvent::RelationLoad {
            entity: model.type_name(),
            relation: name,
            rows: u64::try_from(rows).unwrap_or(u64::MAX),
        });

        for (parent, related) in parents.iter_mut().zip(related) {
            parent.attach(name.as_str(), related);
        }
    }

    Ok(())
}

// One `Related` per parent, in parent order.
async fn load_related(
    db: &Db,
    model: &EntityModel,
    relation: &RelationModel,
    target: &Table<'_>,
    parents: &[Entity],
    include: &Include,
) -> Result<Vec<Related>, Error> {
    let query = include.query();

    match relation.kind() {
        RelationKind::HasMany | RelationKind::HasOne => {
            let local = local_key(model, relation)?;
            let single = relation.kind() == RelationKind::HasOne;

            try_join_all(parents.iter().map(|parent| {
                let key = parent.get(&local).cloned();
                load_by(target, relation.foreign_key(), key, &query, single)
            }))
            .await
        }

        RelationKind::BelongsTo => {
            // the local key lives on the target side here
            let target_field = local_key(target.model(), relation)?;

            try_join_all(parents.iter().map(|parent| {
                let key = parent.get(relation.foreign_key()).cloned();
                load_by(target, &target_field, key, &query, true)
            }))
            .await
        }

        RelationKind::ManyToMany => {
            let local = local_key(model, relation)?;
            let local_field = model.field(&local);

            // pivot rows hold keys in store form
            try_join_all(parents.iter().map(|parent| {
                let key = parent.get(&local).cloned().map(|value| match local_field {
                    Some(field) => field.pipeline().to_store(value),
                    None => value,
                });
                load_through_pivot(db, relation, target, key, &query)
            }))
            .await
        }
    }
}

// Target rows whose `field` equals `key`, merged with the nested query.
async fn load_by(
    target: &Table<'_>,
    field: &str,
    key: Option<Value>,
    query: &Query,
    single: bool,
) -> Result<Related, Error> {
    let Some(key) = key else {
        return Ok(empty(single));
    };

    let filter = Filter::new()
        .eq(field, key)
        .merge(query.filter.clone());
    let mut options = query.options.clone();
    if single {
        options.limit = Some(1);
    }

    let found = target.load(filter, options, TrashedMode::Exclude).await?;

    Ok(if single {
        Related::One(found.into_iter().next().map(Box::new))
    } else {
        Related::Many(found)
    })
}

// Two hops: pivot rows by the parent key (store form), then targets by the
// related keys.
async fn load_through_pivot(
    db: &Db,
    relation: &RelationModel,
    target: &Table<'_>,
    key: Option<Value>,
    query: &Query,
) -> Result<Related, Error> {
    let (Some(key), Some(pivot)) = (key, relation.pivot()) else {
        return Ok(Related::Many(Vec::new()));
    };
    let target_key = target.model().partition_key().ok_or_else(|| {
        Error::relation_unsupported(format!(
            "relation '{}' targets an entity without a partition key",
            relation.name()
        ))
    })?;

    let pivot_table = db.config().table_name(&pivot.table);
    let pivot_filter = [Condition::new(pivot.foreign_key.as_str(), Operator::Eq, key)];
    let rows = db.driver().scan(&pivot_table, &pivot_filter).await?;

    let related_keys: Vec<Value> = rows
        .into_iter()
        .filter_map(|mut row| row.remove(&pivot.related_key))
        .filter(|value| !value.is_null())
        .map(|value| target_key.pipeline().from_store(value))
        .collect();
    if related_keys.is_empty() {
        return Ok(Related::Many(Vec::new()));
    }

    let filter = Filter::new()
        .in_(target_key.name(), related_keys)
        .merge(query.filter.clone());
    let found = target
        .load(filter, query.options.clone(), TrashedMode::Exclude)
        .await?;

    Ok(Related::Many(found))
}

// Owner-side key: explicit override, else the owner's partition key.
fn local_key(model: &EntityModel, relation: &RelationModel) -> Result<String, Error> {
    if let Some(field) = relation.local_key_override() {
        return Ok(field.to_string());
    }

    model
        .partition_key()
        .map(|field| field.name().to_string())
        .ok_or_else(|| {
            Error::relation_unsupported(format!(
                "relation '{}' needs a local key on '{}'",
                relation.name(),
                model.type_name()
            ))
        })
}

const fn empty(single: bool) -> Related {
    if single {
        Related::One(None)
    } else {
        Related::Many(Vec::new())
    }
}
