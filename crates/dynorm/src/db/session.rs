use crate::{
    db::{
        Db,
        query::{
            AccessPath, CompiledQuery, Filter, IntoFilter, Query, QueryOptions, TrashedMode,
            compile,
        },
        relation,
        store::{Item, Key, PutCondition},
    },
    entity::Entity,
    error::Error,
    model::{entity::EntityModel, pipeline::WriteMode},
    obs::sink::{ExecKind, MetricsEvent},
    value::{Record, Value, sort_order},
};
use chrono::Utc;
use futures_util::{FutureExt, future::BoxFuture};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::{cmp::Ordering, collections::BTreeMap, fmt, sync::Arc};

///
/// Table
///
/// Query facade for one entity type. Reads hide soft-deleted items unless
/// the facade was switched with [`Self::with_trashed`] or
/// [`Self::only_trashed`].
///

#[derive(Clone)]
pub struct Table<'a> {
    db: &'a Db,
    model: Arc<EntityModel>,
    table: String,
    trashed: TrashedMode,
}

impl fmt::Debug for Table<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("model", &self.model)
            .field("table", &self.table)
            .field("trashed", &self.trashed)
            .finish_non_exhaustive()
    }
}

impl<'a> Table<'a> {
    pub(crate) fn new(db: &'a Db, model: Arc<EntityModel>) -> Self {
        let table = db.table_name(&model);

        Self {
            db,
            model,
            table,
            trashed: TrashedMode::Exclude,
        }
    }

    /// Include soft-deleted items in reads.
    #[must_use]
    pub const fn with_trashed(mut self) -> Self {
        self.trashed = TrashedMode::Include;
        self
    }

    /// Read soft-deleted items only.
    #[must_use]
    pub const fn only_trashed(mut self) -> Self {
        self.trashed = TrashedMode::Only;
        self
    }

    #[must_use]
    pub const fn model(&self) -> &Arc<EntityModel> {
        &self.model
    }

    /// Physical table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.table
    }

    // ---------------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------------

    /// Construct an entity without persisting it.
    pub fn build(&self, record: Record) -> Result<Entity, Error> {
        Entity::new(Arc::clone(&self.model), record).inspect_err(|err| self.on_error(err))
    }

    /// Construct and insert. A second create with the same key fails with
    /// a store conflict instead of overwriting.
    pub async fn create(&self, record: Record) -> Result<Entity, Error> {
        let mut entity = self.build(record)?;
        self.save(&mut entity).await?;

        Ok(entity)
    }

    /// Create from any serde-serializable value that serializes to a map.
    pub async fn create_from<T: Serialize + Sync>(&self, value: &T) -> Result<Entity, Error> {
        let json = serde_json::to_value(value).map_err(|err| Error::serialize(err.to_string()))?;
        let Value::Map(record) = Value::from(json) else {
            return Err(Error::serialize(format!(
                "'{}' input must serialize to a map",
                self.model.type_name()
            )));
        };

        self.create(record).await
    }

    /// Insert a new entity or overwrite a persisted one.
    pub async fn save(&self, entity: &mut Entity) -> Result<(), Error> {
        self.ensure_owned(entity)?;
        let entity_name = self.model.type_name();
        self.db.record(MetricsEvent::ExecStart {
            kind: ExecKind::Save,
            entity: entity_name,
        });

        let mode = if entity.is_persisted() {
            WriteMode::Update
        } else {
            WriteMode::Insert
        };
        let mut next = entity.clone();
        next.stamp(mode, Utc::now());
        next.check_required()
            .inspect_err(|err| self.on_error(err))?;
        self.validate_for_save(&next)
            .await
            .inspect_err(|err| self.on_error(err))?;

        self.write(&mut next, mode).await?;
        *entity = next;
        self.db.record(MetricsEvent::ExecFinish {
            kind: ExecKind::Save,
            entity: entity_name,
            rows_touched: 1,
        });

        Ok(())
    }

    /// Apply `patch` to every match; returns the number of items written.
    ///
    /// Every patched entity passes the in-memory pipeline, the required
    /// check, batch uniqueness and the save-time checks before the first
    /// write, so a validation failure leaves the store untouched.
    pub async fn update(&self, filter: impl IntoFilter, patch: Record) -> Result<usize, Error> {
        let matches = self
            .load(filter.into_filter(), QueryOptions::default(), self.trashed)
            .await?;
        if matches.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut patched = Vec::with_capacity(matches.len());
        for mut entity in matches {
            entity
                .update(patch.clone())
                .inspect_err(|err| self.on_error(err))?;
            entity.stamp(WriteMode::Update, now);
            entity
                .check_required()
                .inspect_err(|err| self.on_error(err))?;
            patched.push(entity);
        }

        check_batch_unique(&patched).inspect_err(|err| self.on_error(err))?;
        for entity in &patched {
            self.validate_for_save(entity)
                .await
                .inspect_err(|err| self.on_error(err))?;
        }

        let entity_name = self.model.type_name();
        self.db.record(MetricsEvent::ExecStart {
            kind: ExecKind::Save,
            entity: entity_name,
        });
        for entity in &mut patched {
            self.write(entity, WriteMode::Update).await?;
        }
        self.db.record(MetricsEvent::ExecFinish {
            kind: ExecKind::Save,
            entity: entity_name,
            rows_touched: u64::try_from(patched.len()).unwrap_or(u64::MAX),
        });

        Ok(patched.len())
    }

    // Driver put for an already validated entity.
    async fn write(&self, entity: &mut Entity, mode: WriteMode) -> Result<(), Error> {
        let condition = (mode == WriteMode::Insert).then_some(PutCondition::NotExists);
        tracing::debug!(entity = %self.model.type_name(), table = %self.table, ?mode, "put item");
        self.db
            .driver()
            .put_item(&self.table, entity.to_item(), condition)
            .await?;
        entity.mark_persisted();

        Ok(())
    }

    /// Delete every match: soft when the model declares a soft-delete
    /// field, hard otherwise. Returns the number of items deleted.
    pub async fn delete(&self, filter: impl IntoFilter) -> Result<usize, Error> {
        let matches = self
            .load(filter.into_filter(), QueryOptions::default(), self.trashed)
            .await?;

        let mut count = 0;
        for mut entity in matches {
            if entity.is_trashed() {
                continue;
            }
            self.destroy(&mut entity).await?;
            count += 1;
        }

        Ok(count)
    }

    /// Hard-delete every match, trashed or not.
    pub async fn force_delete(&self, filter: impl IntoFilter) -> Result<usize, Error> {
        let trashed = match self.trashed {
            TrashedMode::Only => TrashedMode::Only,
            TrashedMode::Exclude | TrashedMode::Include => TrashedMode::Include,
        };
        let matches = self
            .load(filter.into_filter(), QueryOptions::default(), trashed)
            .await?;

        for entity in &matches {
            self.force_destroy(entity).await?;
        }

        Ok(matches.len())
    }

    /// Delete one entity: soft when the model declares a soft-delete field.
    pub async fn destroy(&self, entity: &mut Entity) -> Result<(), Error> {
        if self.model.soft_delete_field().is_none() {
            return self.force_destroy(entity).await;
        }
        self.ensure_owned(entity)?;

        let entity_name = self.model.type_name();
        self.db.record(MetricsEvent::ExecStart {
            kind: ExecKind::Delete,
            entity: entity_name,
        });

        let mut next = entity.clone();
        next.set_trashed(Some(Utc::now()))?;
        tracing::debug!(entity = %entity_name, table = %self.table, "soft delete");
        self.db
            .driver()
            .put_item(&self.table, next.to_item(), None)
            .await?;
        *entity = next;

        self.db.record(MetricsEvent::ExecFinish {
            kind: ExecKind::Delete,
            entity: entity_name,
            rows_touched: 1,
        });

        Ok(())
    }

    /// Remove one entity from the store regardless of soft-delete.
    pub async fn force_destroy(&self, entity: &Entity) -> Result<(), Error> {
        self.ensure_owned(entity)?;

        let entity_name = self.model.type_name();
        self.db.record(MetricsEvent::ExecStart {
            kind: ExecKind::Delete,
            entity: entity_name,
        });

        let key = entity.key()?;
        tracing::debug!(entity = %entity_name, table = %self.table, key = %key.signature(), "delete item");
        self.db.driver().delete_item(&self.table, &key).await?;

        self.db.record(MetricsEvent::ExecFinish {
            kind: ExecKind::Delete,
            entity: entity_name,
            rows_touched: 1,
        });

        Ok(())
    }

    /// Clear the soft-delete marker of one entity.
    pub async fn restore(&self, entity: &mut Entity) -> Result<(), Error> {
        self.ensure_owned(entity)?;

        let mut next = entity.clone();
        next.set_trashed(None)?;
        tracing::debug!(entity = %self.model.type_name(), table = %self.table, "restore");
        self.db
            .driver()
            .put_item(&self.table, next.to_item(), None)
            .await?;
        *entity = next;

        Ok(())
    }

    /// Restore every trashed match; returns the number restored.
    pub async fn restore_where(&self, filter: impl IntoFilter) -> Result<usize, Error> {
        let matches = self
            .load(filter.into_filter(), QueryOptions::default(), TrashedMode::Only)
            .await?;

        let count = matches.len();
        for mut entity in matches {
            self.restore(&mut entity).await?;
        }

        Ok(count)
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    /// Single item by primary key. Entity-form key values are converted
    /// through the key fields' `to_store`.
    pub async fn get(
        &self,
        partition: impl Into<Value>,
        sort: Option<Value>,
    ) -> Result<Option<Entity>, Error> {
        let key = self.key(partition.into(), sort)?;
        let entity_name = self.model.type_name();
        self.db.record(MetricsEvent::ExecStart {
            kind: ExecKind::Load,
            entity: entity_name,
        });

        let item = self.db.driver().get_item(&self.table, &key).await?;
        let entity = item
            .map(|item| Entity::from_store(Arc::clone(&self.model), item))
            .filter(|entity| match self.trashed {
                TrashedMode::Exclude => !entity.is_trashed(),
                TrashedMode::Include => true,
                TrashedMode::Only => entity.is_trashed(),
            });

        self.db.record(MetricsEvent::ExecFinish {
            kind: ExecKind::Load,
            entity: entity_name,
            rows_touched: u64::from(entity.is_some()),
        });

        Ok(entity)
    }

    pub async fn find(&self, filter: impl IntoFilter) -> Result<Vec<Entity>, Error> {
        self.find_with(filter, QueryOptions::default()).await
    }

    pub async fn find_with(
        &self,
        filter: impl IntoFilter,
        options: QueryOptions,
    ) -> Result<Vec<Entity>, Error> {
        self.load(filter.into_filter(), options, self.trashed).await
    }

    pub async fn query(&self, query: Query) -> Result<Vec<Entity>, Error> {
        self.find_with(query.filter, query.options).await
    }

    /// Run a query given in its JSON wire shape.
    pub async fn query_json(&self, json: &JsonValue) -> Result<Vec<Entity>, Error> {
        self.query(Query::from_json(json)?).await
    }

    pub async fn first(&self, filter: impl IntoFilter) -> Result<Option<Entity>, Error> {
        self.first_with(filter, QueryOptions::default()).await
    }

    pub async fn first_with(
        &self,
        filter: impl IntoFilter,
        options: QueryOptions,
    ) -> Result<Option<Entity>, Error> {
        let found = self.find_with(filter, options.limit(1)).await?;

        Ok(found.into_iter().next())
    }

    pub async fn last(&self, filter: impl IntoFilter) -> Result<Option<Entity>, Error> {
        self.last_with(filter, QueryOptions::default()).await
    }

    /// Reverse the requested order and take the first item.
    pub async fn last_with(
        &self,
        filter: impl IntoFilter,
        options: QueryOptions,
    ) -> Result<Option<Entity>, Error> {
        let order = options.order.reverse();

        self.first_with(filter, options.order(order)).await
    }

    pub async fn count(&self, filter: impl IntoFilter) -> Result<usize, Error> {
        let found = self
            .load(filter.into_filter(), QueryOptions::default(), self.trashed)
            .await?;

        Ok(found.len())
    }

    // ---------------------------------------------------------------------
    // Load pipeline
    // ---------------------------------------------------------------------

    /// Compile, fetch, order, paginate, materialize, resolve includes, project.
    ///
    /// Boxed because include resolution loads other tables through here.
    pub(crate) fn load(
        &self,
        filter: Filter,
        options: QueryOptions,
        trashed: TrashedMode,
    ) -> BoxFuture<'_, Result<Vec<Entity>, Error>> {
        async move {
            self.check_options(&options)?;

            let compiled = compile(&self.model, &self.table, &filter, options.order, trashed)?;
            if compiled.is_empty() {
                return Ok(Vec::new());
            }

            let entity_name = self.model.type_name();
            self.db.record(MetricsEvent::ExecStart {
                kind: ExecKind::Load,
                entity: entity_name,
            });
            self.db.record(MetricsEvent::Plan {
                kind: compiled.mode().into(),
                entity: entity_name,
            });
            if self.db.config().debug {
                let expression = compiled.render();
                tracing::debug!(
                    entity = %entity_name,
                    table = %self.table,
                    key_condition = ?expression.key_condition,
                    filter = ?expression.filter,
                    "compiled query"
                );
            }

            let items = self.fetch(&compiled).await?;
            let items = options.paginate(items);

            let mut entities: Vec<Entity> = items
                .into_iter()
                .map(|item| Entity::from_store(Arc::clone(&self.model), item))
                .collect();

            if !options.include.is_empty() {
                relation::resolve(self.db, &self.model, &mut entities, &options.include).await?;
            }

            if let Some(attributes) = &options.attributes {
                for entity in &mut entities {
                    entity.project(attributes);
                }
            }

            self.db.record(MetricsEvent::ExecFinish {
                kind: ExecKind::Load,
                entity: entity_name,
                rows_touched: u64::try_from(entities.len()).unwrap_or(u64::MAX),
            });

            Ok(entities)
        }
        .boxed()
    }

    async fn fetch(&self, compiled: &CompiledQuery) -> Result<Vec<Item>, Error> {
        let driver = self.db.driver();

        match &compiled.access {
            AccessPath::Query(key) => {
                tracing::debug!(entity = %self.model.type_name(), table = %compiled.table, "query");
                let items = driver
                    .query(
                        &compiled.table,
                        key,
                        &compiled.filter,
                        compiled.order.is_asc(),
                    )
                    .await?;

                Ok(items)
            }
            AccessPath::Scan => {
                tracing::debug!(entity = %self.model.type_name(), table = %compiled.table, "scan");
                let mut items = driver.scan(&compiled.table, &compiled.filter).await?;

                let tie_breaker = self
                    .model
                    .partition_key()
                    .map(|field| field.storage().to_string());
                items.sort_by(|a, b| {
                    let ordering = attribute_order(a, b, &compiled.sort_attribute).then_with(|| {
                        tie_breaker
                            .as_deref()
                            .map_or(Ordering::Equal, |attr| attribute_order(a, b, attr))
                    });

                    if compiled.order.is_asc() {
                        ordering
                    } else {
                        ordering.reverse()
                    }
                });

                Ok(items)
            }
        }
    }

    // ---------------------------------------------------------------------
    // Save-time checks
    // ---------------------------------------------------------------------

    /// Lazy validators, then uniqueness of every `unique` field across
    /// all items including trashed ones.
    pub(crate) async fn validate_for_save(&self, entity: &Entity) -> Result<(), Error> {
        entity.run_lazy_validators().await?;

        let signature = entity.key()?.signature();
        for field in self.model.fields().iter().filter(|field| field.is_unique()) {
            let Some(value) = entity.get(field.name()) else {
                continue;
            };

            let clashes = self
                .load(
                    Filter::new().eq(field.name(), value.clone()),
                    QueryOptions::default(),
                    TrashedMode::Include,
                )
                .await?;
            let taken = clashes
                .iter()
                .filter_map(|other| other.key().ok())
                .any(|key| key.signature() != signature);

            if taken {
                return Err(Error::validation(
                    self.model.type_name(),
                    field.name(),
                    "value must be unique",
                ));
            }
        }

        Ok(())
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    fn key(&self, partition: Value, sort: Option<Value>) -> Result<Key, Error> {
        let partition_field = self.model.partition_key().ok_or_else(|| {
            Error::query_unsupported(format!(
                "entity '{}' has no partition key",
                self.model.type_name()
            ))
        })?;
        let mut key = Key::new(
            partition_field.storage(),
            partition_field.pipeline().to_store(partition),
        );

        match (self.model.sort_key(), sort) {
            (Some(sort_field), Some(sort)) => {
                key = key.with_sort(sort_field.storage(), sort_field.pipeline().to_store(sort));
            }
            (None, None) => {}
            (Some(sort_field), None) => {
                return Err(Error::query_unsupported(format!(
                    "entity '{}' needs sort key '{}' for a key lookup",
                    self.model.type_name(),
                    sort_field.name()
                )));
            }
            (None, Some(_)) => {
                return Err(Error::query_unsupported(format!(
                    "entity '{}' has no sort key",
                    self.model.type_name()
                )));
            }
        }

        Ok(key)
    }

    // Attributes and includes must name declared fields and relations.
    fn check_options(&self, options: &QueryOptions) -> Result<(), Error> {
        if let Some(attributes) = &options.attributes
            && let Some(unknown) = attributes
                .iter()
                .find(|name| self.model.field(name).is_none())
        {
            return Err(Error::query_unsupported(format!(
                "entity '{}' has no field '{unknown}' to select",
                self.model.type_name()
            )));
        }

        if let Some(unknown) = options
            .include
            .keys()
            .find(|name| self.model.relation(name).is_none())
        {
            return Err(Error::relation_unsupported(format!(
                "entity '{}' has no relation '{unknown}'",
                self.model.type_name()
            )));
        }

        Ok(())
    }

    fn ensure_owned(&self, entity: &Entity) -> Result<(), Error> {
        if entity.type_name() == self.model.type_name() {
            Ok(())
        } else {
            Err(Error::model(format!(
                "cannot write '{}' through the '{}' table",
                entity.type_name(),
                self.model.type_name()
            )))
        }
    }

    fn on_error(&self, err: &Error) {
        if let Some(detail) = err.validation_detail() {
            tracing::warn!(entity = %detail.entity, field = %detail.field, message = %detail.message, "validation failed");
            self.db.record(MetricsEvent::ValidationFailed {
                entity: self.model.type_name(),
                field: &detail.field,
            });
        }
    }
}

/// Reject two entities of one batch that claim the same `unique` value
/// under different keys. The store-side check cannot see these because
/// neither is written yet.
pub(crate) fn check_batch_unique<'e>(
    entities: impl IntoIterator<Item = &'e Entity>,
) -> Result<(), Error> {
    let mut claimed: BTreeMap<(String, String, String), String> = BTreeMap::new();

    for entity in entities {
        let model = entity.model();
        let signature = entity.key()?.signature();

        for field in model.fields().iter().filter(|field| field.is_unique()) {
            let Some(value) = entity.get(field.name()).filter(|value| !value.is_null()) else {
                continue;
            };
            let slot = (
                model.type_name().to_string(),
                field.name().to_string(),
                value.key_string(),
            );

            match claimed.get(&slot) {
                Some(owner) if *owner != signature => {
                    return Err(Error::validation(
                        model.type_name(),
                        field.name(),
                        "value must be unique",
                    ));
                }
                Some(_) => {}
                None => {
                    claimed.insert(slot, signature.clone());
                }
            }
        }
    }

    Ok(())
}

// Present values order before missing ones.
fn attribute_order(a: &Record, b: &Record, attribute: &str) -> Ordering {
    match (a.get(attribute), b.get(attribute)) {
        (Some(a), Some(b)) => sort_order(a, b),
        (a, b) => a.is_none().cmp(&b.is_none()),
    }
}
