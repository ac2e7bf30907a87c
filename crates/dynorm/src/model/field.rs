use crate::{
    model::pipeline::{AttributePipeline, DefaultValue, Lifecycle},
    value::Value,
};
use futures_util::future::BoxFuture;
use std::sync::Arc;

///
/// KeyRole
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyRole {
    Partition,
    Sort,
}

///
/// Codec
///
/// Bidirectional converter pair for fields whose store representation
/// differs from the entity representation.
///

#[derive(Clone)]
pub struct Codec {
    pub to_store: Arc<dyn Fn(Value) -> Value + Send + Sync>,
    pub from_store: Arc<dyn Fn(Value) -> Value + Send + Sync>,
}

///
/// FieldModel
///
/// Declared field: storage alias, key role, lifecycle role and the
/// attribute pipeline replayed on every read and write.
///

#[derive(Clone, Debug)]
pub struct FieldModel {
    name: String,
    storage_name: String,
    key: Option<KeyRole>,
    lifecycle: Option<Lifecycle>,
    nullable: bool,
    unique: bool,
    pipeline: AttributePipeline,
}

impl FieldModel {
    /// Declare a plain, nullable field.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();

        Self {
            storage_name: name.clone(),
            name,
            key: None,
            lifecycle: None,
            nullable: true,
            unique: false,
            pipeline: AttributePipeline::default(),
        }
    }

    /// Declare the partition key. Primary key and partition key are the same role.
    #[must_use]
    pub fn partition_key(name: impl Into<String>) -> Self {
        Self {
            key: Some(KeyRole::Partition),
            nullable: false,
            ..Self::new(name)
        }
    }

    /// Alias of [`Self::partition_key`].
    #[must_use]
    pub fn primary_key(name: impl Into<String>) -> Self {
        Self::partition_key(name)
    }

    #[must_use]
    pub fn sort_key(name: impl Into<String>) -> Self {
        Self {
            key: Some(KeyRole::Sort),
            nullable: false,
            ..Self::new(name)
        }
    }

    // ---------------------------------------------------------------------
    // Declaration builders
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn storage_name(mut self, storage_name: impl Into<String>) -> Self {
        self.storage_name = storage_name.into();
        self
    }

    #[must_use]
    pub const fn required(mut self) -> Self {
        self.nullable = false;
        self
    }

    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub const fn created_at(mut self) -> Self {
        self.lifecycle = Some(Lifecycle::CreatedAt);
        self
    }

    #[must_use]
    pub const fn updated_at(mut self) -> Self {
        self.lifecycle = Some(Lifecycle::UpdatedAt);
        self
    }

    #[must_use]
    pub const fn soft_delete(mut self) -> Self {
        self.lifecycle = Some(Lifecycle::SoftDelete);
        self
    }

    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.pipeline.default = Some(DefaultValue::Const(value.into()));
        self
    }

    #[must_use]
    pub fn default_with<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.pipeline.default = Some(DefaultValue::Provider(Arc::new(provider)));
        self
    }

    #[must_use]
    pub fn mutate<F>(mut self, mutator: F) -> Self
    where
        F: Fn(Option<&Value>, Value) -> Value + Send + Sync + 'static,
    {
        self.pipeline.mutators.push(Arc::new(mutator));
        self
    }

    #[must_use]
    pub fn validate<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.pipeline.validators.push(Arc::new(validator));
        self
    }

    #[must_use]
    pub fn validate_lazy<F>(mut self, validator: F) -> Self
    where
        F: Fn(Value) -> BoxFuture<'static, Result<(), String>> + Send + Sync + 'static,
    {
        self.pipeline.lazy_validators.push(Arc::new(validator));
        self
    }

    #[must_use]
    pub fn to_store<F>(mut self, convert: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.pipeline.to_store = Some(Arc::new(convert));
        self
    }

    #[must_use]
    pub fn from_store<F>(mut self, convert: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.pipeline.from_store = Some(Arc::new(convert));
        self
    }

    /// Install both directions of a [`Codec`].
    #[must_use]
    pub fn codec(mut self, codec: Codec) -> Self {
        self.pipeline.to_store = Some(codec.to_store);
        self.pipeline.from_store = Some(codec.from_store);
        self
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn storage(&self) -> &str {
        &self.storage_name
    }

    #[must_use]
    pub const fn key_role(&self) -> Option<KeyRole> {
        self.key
    }

    #[must_use]
    pub const fn lifecycle(&self) -> Option<Lifecycle> {
        self.lifecycle
    }

    #[must_use]
    pub const fn is_partition_key(&self) -> bool {
        matches!(self.key, Some(KeyRole::Partition))
    }

    #[must_use]
    pub const fn is_sort_key(&self) -> bool {
        matches!(self.key, Some(KeyRole::Sort))
    }

    #[must_use]
    pub const fn is_soft_delete(&self) -> bool {
        matches!(self.lifecycle, Some(Lifecycle::SoftDelete))
    }

    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }

    #[must_use]
    pub const fn is_unique(&self) -> bool {
        self.unique
    }

    /// Absent or null values fail the "required" check unless the pipeline
    /// itself fills the field.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        !self.nullable && self.lifecycle.is_none()
    }

    #[must_use]
    pub const fn pipeline(&self) -> &AttributePipeline {
        &self.pipeline
    }
}
