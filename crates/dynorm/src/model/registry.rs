use crate::{
    error::Error,
    model::{entity::EntityModel, field::FieldModel, relation::RelationModel},
};
use std::{collections::BTreeMap, sync::Arc};

///
/// TableSchema
///
/// Key layout of one table, as a provisioning step would need it.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TableSchema {
    pub table: String,
    pub partition_key: String,
    pub sort_key: Option<String>,
}

///
/// MetadataRegistry
///
/// Per-entity-type metadata, keyed by type name.
///
/// Registration needs `&mut self`; once the registry is handed to a `Db`
/// it sits behind an `Arc` and is never mutated again, so lookups need no
/// synchronization.
///

#[derive(Clone, Debug, Default)]
pub struct MetadataRegistry {
    entities: BTreeMap<String, Arc<EntityModel>>,
}

impl MetadataRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fully built model.
    pub fn register(&mut self, model: EntityModel) -> Result<(), Error> {
        let type_name = model.type_name().to_string();
        if self.entities.contains_key(&type_name) {
            return Err(Error::registry(format!(
                "entity type '{type_name}' is already registered"
            )));
        }

        self.entities.insert(type_name, Arc::new(model));

        Ok(())
    }

    /// Register one field on an entity type, creating the type on first use.
    pub fn register_field(&mut self, type_name: &str, field: FieldModel) -> Result<(), Error> {
        Arc::make_mut(self.entry(type_name)).add_field(field)
    }

    pub fn register_relation(
        &mut self,
        type_name: &str,
        relation: RelationModel,
    ) -> Result<(), Error> {
        Arc::make_mut(self.entry(type_name)).add_relation(relation)
    }

    pub fn set_storage_name(&mut self, type_name: &str, storage_name: impl Into<String>) {
        Arc::make_mut(self.entry(type_name)).set_storage_name(storage_name);
    }

    /// Look up a usable model.
    ///
    /// A type that never declared a partition key counts as not registered.
    pub fn resolve(&self, type_name: &str) -> Result<Arc<EntityModel>, Error> {
        self.entities
            .get(type_name)
            .filter(|model| model.partition_key().is_some())
            .cloned()
            .ok_or_else(|| {
                Error::registry(format!(
                    "entity type '{type_name}' is not registered (no partition key declared)"
                ))
            })
    }

    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.resolve(type_name).is_ok()
    }

    pub fn models(&self) -> impl Iterator<Item = &Arc<EntityModel>> {
        self.entities.values()
    }

    /// Key layout for every usable entity type.
    #[must_use]
    pub fn table_schemas(&self) -> Vec<TableSchema> {
        self.entities
            .values()
            .filter_map(|model| {
                let partition_key = model.partition_key()?;

                Some(TableSchema {
                    table: model.storage_name().to_string(),
                    partition_key: partition_key.storage().to_string(),
                    sort_key: model.sort_key().map(|field| field.storage().to_string()),
                })
            })
            .collect()
    }

    fn entry(&mut self, type_name: &str) -> &mut Arc<EntityModel> {
        self.entities
            .entry(type_name.to_string())
            .or_insert_with(|| Arc::new(EntityModel::new(type_name)))
    }
}
