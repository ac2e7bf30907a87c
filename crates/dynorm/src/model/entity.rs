use crate::{
    error::Error,
    model::{
        field::{FieldModel, KeyRole},
        pipeline::Lifecycle,
        relation::{RelationKind, RelationModel},
    },
};
use convert_case::{Case, Casing};
use std::collections::BTreeMap;

///
/// EntityModel
///
/// Runtime model for one entity type: storage name, ordered fields and
/// declared relations. Built once at declaration and shared behind an `Arc`.
///

#[derive(Clone, Debug)]
pub struct EntityModel {
    type_name: String,
    storage_name: String,
    fields: Vec<FieldModel>,
    relations: BTreeMap<String, RelationModel>,
}

impl EntityModel {
    /// Empty model; `storage_name` defaults to the snake-cased plural of `type_name`.
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();

        Self {
            storage_name: default_storage_name(&type_name),
            type_name,
            fields: Vec::new(),
            relations: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn builder(type_name: impl Into<String>) -> EntityModelBuilder {
        EntityModelBuilder {
            model: Self::new(type_name),
            error: None,
        }
    }

    // ---------------------------------------------------------------------
    // Registration
    // ---------------------------------------------------------------------

    /// Append a field, enforcing the key and lifecycle invariants.
    pub(crate) fn add_field(&mut self, field: FieldModel) -> Result<(), Error> {
        let type_name = &self.type_name;

        if self.field(field.name()).is_some() {
            return Err(Error::model(format!(
                "entity '{type_name}' already declares field '{}'",
                field.name()
            )));
        }

        match field.key_role() {
            Some(KeyRole::Partition) => {
                if let Some(existing) = self.partition_key() {
                    return Err(Error::model(format!(
                        "entity '{type_name}' already has partition key '{}'; cannot add '{}'",
                        existing.name(),
                        field.name()
                    )));
                }
            }
            Some(KeyRole::Sort) => {
                if self.partition_key().is_none() {
                    return Err(Error::model(format!(
                        "entity '{type_name}' declares sort key '{}' before a partition key",
                        field.name()
                    )));
                }
                if let Some(existing) = self.sort_key() {
                    return Err(Error::model(format!(
                        "entity '{type_name}' already has sort key '{}'; cannot add '{}'",
                        existing.name(),
                        field.name()
                    )));
                }
            }
            None => {}
        }

        if let Some(lifecycle) = field.lifecycle()
            && let Some(existing) = self.lifecycle_field(lifecycle)
        {
            return Err(Error::model(format!(
                "entity '{type_name}' already uses '{}' as its {lifecycle:?} field",
                existing.name()
            )));
        }

        self.fields.push(field);

        Ok(())
    }

    pub(crate) fn add_relation(&mut self, relation: RelationModel) -> Result<(), Error> {
        if self.relations.contains_key(relation.name()) || self.field(relation.name()).is_some() {
            return Err(Error::model(format!(
                "entity '{}' already declares '{}'",
                self.type_name,
                relation.name()
            )));
        }
        if relation.kind() == RelationKind::ManyToMany && relation.pivot().is_none() {
            return Err(Error::model(format!(
                "many-to-many relation '{}' has no pivot",
                relation.name()
            )));
        }

        self.relations.insert(relation.name().to_string(), relation);

        Ok(())
    }

    pub(crate) fn set_storage_name(&mut self, storage_name: impl Into<String>) {
        self.storage_name = storage_name.into();
    }

    // ---------------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[must_use]
    pub fn storage_name(&self) -> &str {
        &self.storage_name
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldModel] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldModel> {
        self.fields.iter().find(|field| field.name() == name)
    }

    #[must_use]
    pub fn field_by_storage(&self, storage_name: &str) -> Option<&FieldModel> {
        self.fields
            .iter()
            .find(|field| field.storage() == storage_name)
    }

    #[must_use]
    pub fn partition_key(&self) -> Option<&FieldModel> {
        self.fields.iter().find(|field| field.is_partition_key())
    }

    #[must_use]
    pub fn sort_key(&self) -> Option<&FieldModel> {
        self.fields.iter().find(|field| field.is_sort_key())
    }

    #[must_use]
    pub fn soft_delete_field(&self) -> Option<&FieldModel> {
        self.lifecycle_field(Lifecycle::SoftDelete)
    }

    #[must_use]
    pub fn lifecycle_field(&self, lifecycle: Lifecycle) -> Option<&FieldModel> {
        self.fields
            .iter()
            .find(|field| field.lifecycle() == Some(lifecycle))
    }

    /// Key fields in key order (partition first).
    pub fn key_fields(&self) -> impl Iterator<Item = &FieldModel> {
        self.partition_key().into_iter().chain(self.sort_key())
    }

    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&RelationModel> {
        self.relations.get(name)
    }

    pub fn relations(&self) -> impl Iterator<Item = &RelationModel> {
        self.relations.values()
    }
}

///
/// EntityModelBuilder
///
/// Declarative front end over [`EntityModel`] registration. The first
/// invariant violation is kept and reported by [`Self::build`].
///

#[must_use]
pub struct EntityModelBuilder {
    model: EntityModel,
    error: Option<Error>,
}

impl EntityModelBuilder {
    pub fn storage_name(mut self, storage_name: impl Into<String>) -> Self {
        self.model.set_storage_name(storage_name);
        self
    }

    pub fn field(mut self, field: FieldModel) -> Self {
        if self.error.is_none()
            && let Err(err) = self.model.add_field(field)
        {
            self.error = Some(err);
        }
        self
    }

    pub fn relation(mut self, relation: RelationModel) -> Self {
        if self.error.is_none()
            && let Err(err) = self.model.add_relation(relation)
        {
            self.error = Some(err);
        }
        self
    }

    pub fn build(self) -> Result<EntityModel, Error> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.model),
        }
    }
}

// Default storage name: snake case, then an English plural.
fn default_storage_name(type_name: &str) -> String {
    pluralize(&type_name.to_case(Case::Snake))
}

fn pluralize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix('y')
        && !stem.is_empty()
        && !stem.ends_with(['a', 'e', 'i', 'o', 'u'])
    {
        return format!("{stem}ies");
    }

    if ["s", "x", "z", "ch", "sh"]
        .iter()
        .any(|suffix| word.ends_with(suffix))
    {
        return format!("{word}es");
    }

    format!("{word}s")
}

#[cfg(test)]
mod naming_tests {
    use super::*;

    #[test]
    fn storage_names_are_snake_case_plurals() {
        assert_eq!(default_storage_name("User"), "users");
        assert_eq!(default_storage_name("OrderItem"), "order_items");
        assert_eq!(default_storage_name("Category"), "categories");
        assert_eq!(default_storage_name("Address"), "addresses");
        assert_eq!(default_storage_name("Day"), "days");
        assert_eq!(default_storage_name("Box"), "boxes");
    }
}
