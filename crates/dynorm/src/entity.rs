use crate::{
    db::store::{Item, Key},
    error::Error,
    model::{
        entity::EntityModel,
        pipeline::{AttributePipeline, Lifecycle, WriteMode},
    },
    value::{Record, Value, compare_eq},
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::{collections::BTreeMap, sync::Arc};

///
/// Related
///
/// Transient relation attachment, recomputed per query and never persisted.
///

#[derive(Clone, Debug)]
pub enum Related {
    Many(Vec<Entity>),
    One(Option<Box<Entity>>),
}

impl Related {
    fn to_json(&self) -> JsonValue {
        match self {
            Self::Many(entities) => {
                JsonValue::Array(entities.iter().map(|e| e.to_json(true)).collect())
            }
            Self::One(Some(entity)) => entity.to_json(true),
            Self::One(None) => JsonValue::Null,
        }
    }
}

///
/// Entity
///
/// One instance of a declared entity type: field values keyed by field
/// name (entity form, never store form) plus transient relation
/// attachments. Absent and null are the same state.
///

#[derive(Clone, Debug)]
pub struct Entity {
    model: Arc<EntityModel>,
    values: Record,
    relations: BTreeMap<String, Related>,
    persisted: bool,
}

impl Entity {
    /// Construct from raw input: defaults, mutators and validators run per
    /// field in declaration order, then required fields are checked.
    pub fn new(model: Arc<EntityModel>, mut input: Record) -> Result<Self, Error> {
        if let Some(unknown) = input.keys().find(|name| model.field(name).is_none()) {
            return Err(Error::validation(
                model.type_name(),
                unknown.as_str(),
                "field is not declared",
            ));
        }

        let mut values = Record::new();
        for field in model.fields() {
            let incoming = input.remove(field.name());
            let value = field
                .pipeline()
                .apply(None, incoming)
                .map_err(|message| Error::validation(model.type_name(), field.name(), message))?;

            if let Some(value) = value.filter(|value| !value.is_null()) {
                values.insert(field.name().to_string(), value);
            }
        }

        let entity = Self {
            model,
            values,
            relations: BTreeMap::new(),
            persisted: false,
        };
        entity.check_required()?;

        Ok(entity)
    }

    /// Materialize a stored item. Only `from_store` runs; attributes with
    /// no declared field are ignored.
    #[must_use]
    pub fn from_store(model: Arc<EntityModel>, item: Item) -> Self {
        let mut values = Record::new();
        for (attribute, value) in item {
            if value.is_null() {
                continue;
            }
            if let Some(field) = model.field_by_storage(&attribute) {
                values.insert(field.name().to_string(), field.pipeline().from_store(value));
            }
        }

        Self {
            model,
            values,
            relations: BTreeMap::new(),
            persisted: true,
        }
    }

    // ---------------------------------------------------------------------
    // Field access
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Assign one field through its mutators and validators.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<(), Error> {
        let value = value.into();
        let model = Arc::clone(&self.model);
        let field_model = model.field(field).ok_or_else(|| {
            Error::validation(model.type_name(), field, "field is not declared")
        })?;

        if self.persisted && field_model.key_role().is_some() {
            let unchanged = self
                .values
                .get(field)
                .is_some_and(|current| compare_eq(current, &value) == Some(true));
            if !unchanged {
                return Err(Error::validation(
                    model.type_name(),
                    field,
                    "key fields cannot change on a persisted entity",
                ));
            }
        }

        let next = field_model
            .pipeline()
            .apply(self.values.get(field), Some(value))
            .map_err(|message| Error::validation(model.type_name(), field, message))?;

        match next.filter(|value| !value.is_null()) {
            Some(value) => {
                self.values.insert(field.to_string(), value);
            }
            None if field_model.is_required() => {
                return Err(Error::validation(
                    model.type_name(),
                    field,
                    "value is required",
                ));
            }
            None => {
                self.values.remove(field);
            }
        }

        Ok(())
    }

    /// Clear one field.
    pub fn unset(&mut self, field: &str) -> Result<(), Error> {
        self.set(field, Value::Null)
    }

    /// Apply every key of `patch`. Either all assignments succeed or the
    /// entity is left untouched.
    pub fn update(&mut self, patch: Record) -> Result<(), Error> {
        let mut next = self.clone();
        for (field, value) in patch {
            next.set(&field, value)?;
        }
        self.values = next.values;

        Ok(())
    }

    #[must_use]
    pub const fn values(&self) -> &Record {
        &self.values
    }

    #[must_use]
    pub const fn model(&self) -> &Arc<EntityModel> {
        &self.model
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        self.model.type_name()
    }

    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// True when the soft-delete marker is set.
    #[must_use]
    pub fn is_trashed(&self) -> bool {
        self.model
            .soft_delete_field()
            .is_some_and(|field| self.values.contains_key(field.name()))
    }

    // ---------------------------------------------------------------------
    // Store form
    // ---------------------------------------------------------------------

    /// Primary key in storage names and store form.
    pub fn key(&self) -> Result<Key, Error> {
        let mut parts = self.model.key_fields().map(|field| {
            let value = self
                .values
                .get(field.name())
                .filter(|value| value.is_scalar())
                .ok_or_else(|| {
                    Error::validation(
                        self.model.type_name(),
                        field.name(),
                        "key attribute is missing",
                    )
                })?;

            Ok::<_, Error>((
                field.storage().to_string(),
                field.pipeline().to_store(value.clone()),
            ))
        });

        let partition = parts.next().ok_or_else(|| {
            Error::model(format!(
                "entity '{}' has no partition key",
                self.model.type_name()
            ))
        })??;
        let sort = parts.next().transpose()?;

        Ok(Key { partition, sort })
    }

    /// Store item: storage names, `to_store` applied, nulls omitted.
    #[must_use]
    pub fn to_item(&self) -> Item {
        self.model
            .fields()
            .iter()
            .filter_map(|field| {
                let value = self.values.get(field.name())?;

                Some((
                    field.storage().to_string(),
                    field.pipeline().to_store(value.clone()),
                ))
            })
            .collect()
    }

    /// Overwrite lifecycle timestamps for a write of kind `mode`.
    pub fn stamp(&mut self, mode: WriteMode, now: DateTime<Utc>) {
        let stamped: Vec<(String, Option<Value>)> = self
            .model
            .fields()
            .iter()
            .filter(|field| {
                matches!(
                    field.lifecycle(),
                    Some(Lifecycle::CreatedAt | Lifecycle::UpdatedAt)
                )
            })
            .map(|field| {
                let current = self.values.get(field.name()).cloned();
                let next = AttributePipeline::stamp(field.lifecycle(), mode, now, current);

                (field.name().to_string(), next)
            })
            .collect();

        for (name, value) in stamped {
            match value {
                Some(value) => self.values.insert(name, value),
                None => self.values.remove(&name),
            };
        }
    }

    /// Non-nullable fields without a value fail with "value is required".
    pub fn check_required(&self) -> Result<(), Error> {
        let missing = self
            .model
            .fields()
            .iter()
            .filter(|field| field.is_required())
            .find(|field| !self.values.contains_key(field.name()));

        match missing {
            Some(field) => Err(Error::validation(
                self.model.type_name(),
                field.name(),
                "value is required",
            )),
            None => Ok(()),
        }
    }

    /// Run the save-time lazy validators of every field holding a value.
    pub(crate) async fn run_lazy_validators(&self) -> Result<(), Error> {
        for field in self.model.fields() {
            if !field.pipeline().has_lazy_validators() {
                continue;
            }
            if let Some(value) = self.values.get(field.name()) {
                field
                    .pipeline()
                    .run_lazy(value)
                    .await
                    .map_err(|message| {
                        Error::validation(self.model.type_name(), field.name(), message)
                    })?;
            }
        }

        Ok(())
    }

    pub(crate) const fn mark_persisted(&mut self) {
        self.persisted = true;
    }

    /// Set or clear the soft-delete marker without running the pipeline.
    pub(crate) fn set_trashed(&mut self, at: Option<DateTime<Utc>>) -> Result<(), Error> {
        let field = self.model.soft_delete_field().ok_or_else(|| {
            Error::model(format!(
                "entity '{}' declares no soft-delete field",
                self.model.type_name()
            ))
        })?;
        let name = field.name().to_string();

        match at {
            Some(at) => self.values.insert(name, Value::Timestamp(at)),
            None => self.values.remove(&name),
        };

        Ok(())
    }

    /// Keep only the named fields.
    pub(crate) fn project(&mut self, attributes: &[String]) {
        self.values
            .retain(|name, _| attributes.iter().any(|attribute| attribute == name));
    }

    // ---------------------------------------------------------------------
    // Relations
    // ---------------------------------------------------------------------

    pub fn attach(&mut self, relation: impl Into<String>, related: Related) {
        self.relations.insert(relation.into(), related);
    }

    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&Related> {
        self.relations.get(name)
    }

    /// Loaded collection for `name`; empty when not loaded.
    #[must_use]
    pub fn related_many(&self, name: &str) -> &[Self] {
        match self.relations.get(name) {
            Some(Related::Many(entities)) => entities,
            _ => &[],
        }
    }

    #[must_use]
    pub fn related_one(&self, name: &str) -> Option<&Self> {
        match self.relations.get(name) {
            Some(Related::One(entity)) => entity.as_deref(),
            _ => None,
        }
    }

    // ---------------------------------------------------------------------
    // Serialization
    // ---------------------------------------------------------------------

    /// Field values only; relation attachments are dropped.
    #[must_use]
    pub fn to_record(&self) -> Record {
        self.values.clone()
    }

    /// JSON object of field values, optionally with loaded relations.
    #[must_use]
    pub fn to_json(&self, keep_relations: bool) -> JsonValue {
        let mut map: JsonMap<String, JsonValue> = self
            .values
            .iter()
            .map(|(name, value)| (name.clone(), JsonValue::from(value.clone())))
            .collect();

        if keep_relations {
            for (name, related) in &self.relations {
                map.insert(name.clone(), related.to_json());
            }
        }

        JsonValue::Object(map)
    }

    /// Deserialize into a caller-defined struct via its serde impl.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_value(self.to_json(true)).map_err(|err| {
            Error::serialize(format!(
                "cannot read entity '{}' as the requested type: {err}",
                self.model.type_name()
            ))
        })
    }
}
