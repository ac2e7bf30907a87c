use crate::{
    db::{Db, store::MemoryDriver},
    model::{
        builtin::{convert, default, mutate, validate},
        entity::EntityModel,
        field::FieldModel,
        registry::{MetadataRegistry, TableSchema},
        relation::RelationModel,
    },
};
use std::sync::Arc;

///
/// Fixture entity types
///
/// User      → standalone, unique email, lifecycle timestamps
/// Customer  → has many Order, many-to-many Tag through `customer_tags`
/// Order     → partition + sort key, soft delete, bool codec
/// Tag       → plain lookup table
///

pub const CUSTOMER_TAGS: &str = "customer_tags";

pub fn user_model() -> EntityModel {
    EntityModel::builder("User")
        .field(FieldModel::partition_key("id").default_with(default::ulid))
        .field(
            FieldModel::new("email")
                .required()
                .unique()
                .mutate(mutate::trim)
                .mutate(mutate::lowercase)
                .validate(validate::contains("@")),
        )
        .field(FieldModel::new("name"))
        .field(FieldModel::new("createdAt").created_at())
        .field(FieldModel::new("updatedAt").updated_at())
        .build()
        .expect("user model")
}

pub fn customer_model() -> EntityModel {
    EntityModel::builder("Customer")
        .field(FieldModel::partition_key("id"))
        .field(FieldModel::new("name").required())
        .relation(RelationModel::has_many("orders", || "Order", "customerId"))
        .relation(RelationModel::many_to_many(
            "tags",
            || "Tag",
            CUSTOMER_TAGS,
            "customerId",
            "tagId",
        ))
        .build()
        .expect("customer model")
}

pub fn order_model() -> EntityModel {
    EntityModel::builder("Order")
        .field(FieldModel::partition_key("customerId").storage_name("customer_id"))
        .field(FieldModel::sort_key("orderId").storage_name("order_id"))
        .field(FieldModel::new("status").default("pending"))
        .field(FieldModel::new("total"))
        .field(FieldModel::new("paid").codec(convert::bool_as_int()))
        .field(FieldModel::new("deletedAt").soft_delete())
        .relation(RelationModel::belongs_to("customer", || "Customer", "customerId"))
        .build()
        .expect("order model")
}

pub fn tag_model() -> EntityModel {
    EntityModel::builder("Tag")
        .field(FieldModel::partition_key("id"))
        .field(FieldModel::new("label"))
        .build()
        .expect("tag model")
}

pub fn registry() -> MetadataRegistry {
    let mut registry = MetadataRegistry::new();
    for model in [user_model(), customer_model(), order_model(), tag_model()] {
        registry.register(model).expect("register fixture model");
    }

    registry
}

/// Fresh in-memory database with every fixture table provisioned.
/// The driver handle is returned as well so tests can read request stats.
pub fn db() -> (Db, Arc<MemoryDriver>) {
    let registry = registry();

    let pivot = TableSchema {
        table: CUSTOMER_TAGS.to_string(),
        partition_key: "customerId".to_string(),
        sort_key: Some("tagId".to_string()),
    };
    let driver = Arc::new(MemoryDriver::with_schemas(
        registry.table_schemas().into_iter().chain([pivot]),
    ));
    let db = Db::new(driver.clone(), registry);

    (db, driver)
}
