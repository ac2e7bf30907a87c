///
/// TargetProvider
///
/// Zero-argument provider of the related entity type name. It is only
/// invoked at query time, so two entity types may reference each other
/// regardless of declaration order.
///

pub type TargetProvider = fn() -> &'static str;

///
/// RelationKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RelationKind {
    HasMany,
    HasOne,
    BelongsTo,
    ManyToMany,
}

impl RelationKind {
    /// Collection relations attach a list; the others attach one-or-none.
    #[must_use]
    pub const fn is_collection(self) -> bool {
        matches!(self, Self::HasMany | Self::ManyToMany)
    }
}

///
/// Pivot
///
/// Association table linking two entity types for many-to-many relations.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Pivot {
    /// Storage name of the pivot table.
    pub table: String,
    /// Pivot attribute holding the owning entity's key.
    pub foreign_key: String,
    /// Pivot attribute holding the related entity's key.
    pub related_key: String,
}

///
/// RelationModel
///
/// Declared relationship from one entity type to another.
///
/// Key pairing by kind:
/// - `HasMany` / `HasOne`: `owner[local_key] == target[foreign_key]`
/// - `BelongsTo`: `owner[foreign_key] == target[local_key]`
/// - `ManyToMany`: `owner[local_key] == pivot[foreign_key]`, then
///   `pivot[related_key] == target[partition key]`
///
/// `local_key` defaults to the partition key of the side it belongs to.
///

#[derive(Clone, Debug)]
pub struct RelationModel {
    name: String,
    kind: RelationKind,
    target: TargetProvider,
    foreign_key: String,
    local_key: Option<String>,
    pivot: Option<Pivot>,
}

impl RelationModel {
    fn new(
        name: impl Into<String>,
        kind: RelationKind,
        target: TargetProvider,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            target,
            foreign_key: foreign_key.into(),
            local_key: None,
            pivot: None,
        }
    }

    #[must_use]
    pub fn has_many(
        name: impl Into<String>,
        target: TargetProvider,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(name, RelationKind::HasMany, target, foreign_key)
    }

    #[must_use]
    pub fn has_one(
        name: impl Into<String>,
        target: TargetProvider,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(name, RelationKind::HasOne, target, foreign_key)
    }

    #[must_use]
    pub fn belongs_to(
        name: impl Into<String>,
        target: TargetProvider,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(name, RelationKind::BelongsTo, target, foreign_key)
    }

    #[must_use]
    pub fn many_to_many(
        name: impl Into<String>,
        target: TargetProvider,
        pivot_table: impl Into<String>,
        pivot_foreign_key: impl Into<String>,
        pivot_related_key: impl Into<String>,
    ) -> Self {
        let pivot = Pivot {
            table: pivot_table.into(),
            foreign_key: pivot_foreign_key.into(),
            related_key: pivot_related_key.into(),
        };

        Self {
            pivot: Some(pivot.clone()),
            ..Self::new(name, RelationKind::ManyToMany, target, pivot.foreign_key)
        }
    }

    /// Override the local key (see the key pairing table above).
    #[must_use]
    pub fn local_key(mut self, local_key: impl Into<String>) -> Self {
        self.local_key = Some(local_key.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn kind(&self) -> RelationKind {
        self.kind
    }

    /// Invoke the lazy target provider.
    #[must_use]
    pub fn target(&self) -> &'static str {
        (self.target)()
    }

    #[must_use]
    pub fn foreign_key(&self) -> &str {
        &self.foreign_key
    }

    #[must_use]
    pub fn local_key_override(&self) -> Option<&str> {
        self.local_key.as_deref()
    }

    #[must_use]
    pub const fn pivot(&self) -> Option<&Pivot> {
        self.pivot.as_ref()
    }
}
