#![allow(dead_code)]

use dynorm::{
    db::store::{MemoryDriver, StoreDriver},
    model::registry::TableSchema,
    obs::MetricsRecorder,
    prelude::*,
};
use futures_util::FutureExt;
use std::sync::Arc;

pub const CUSTOMER_TAGS: &str = "customer_tags";

///
/// Harness
///
/// In-memory database over the shop registry, with request stats from the
/// driver and counters from a metrics recorder.
///

pub struct Harness {
    pub db: Db,
    pub driver: Arc<MemoryDriver>,
    pub metrics: Arc<MetricsRecorder>,
}

impl Harness {
    pub fn new() -> Self {
        let registry = registry();
        let pivot = TableSchema {
            table: CUSTOMER_TAGS.to_string(),
            partition_key: "customerId".to_string(),
            sort_key: Some("tagId".to_string()),
        };
        let driver = Arc::new(MemoryDriver::with_schemas(
            registry.table_schemas().into_iter().chain([pivot]),
        ));
        let metrics = Arc::new(MetricsRecorder::new());
        let db = Db::new(driver.clone(), registry).with_metrics_sink(metrics.clone());

        Self {
            db,
            driver,
            metrics,
        }
    }

    /// Two customers, five orders for `c1`, one for `c2`, one profile, two tags.
    pub async fn seed(&self) {
        let customers = self.db.table("Customer").unwrap();
        customers
            .create(record! { "id" => "c1", "name" => "Acme" })
            .await
            .unwrap();
        customers
            .create(record! { "id" => "c2", "name" => "Globex" })
            .await
            .unwrap();

        let orders = self.db.table("Order").unwrap();
        let statuses = ["completed", "pending", "completed", "completed", "cancelled"];
        for (i, status) in (1..).zip(statuses) {
            orders
                .create(record! {
                    "customerId" => "c1",
                    "orderId" => i,
                    "status" => status,
                    "total" => i * 10,
                    "paid" => status == "completed",
                })
                .await
                .unwrap();
        }
        orders
            .create(record! { "customerId" => "c2", "orderId" => 1, "status" => "completed" })
            .await
            .unwrap();

        self.db
            .table("Profile")
            .unwrap()
            .create(record! { "id" => "p1", "customerId" => "c1", "bio" => "widgets" })
            .await
            .unwrap();

        let tags = self.db.table("Tag").unwrap();
        for (id, label) in [("t1", "wholesale"), ("t2", "priority")] {
            tags.create(record! { "id" => id, "label" => label })
                .await
                .unwrap();
        }
        for (customer, tag) in [("c1", "t1"), ("c1", "t2"), ("c2", "t2")] {
            self.db
                .driver()
                .put_item(
                    CUSTOMER_TAGS,
                    record! { "customerId" => customer, "tagId" => tag },
                    None,
                )
                .await
                .unwrap();
        }
    }
}

pub fn registry() -> MetadataRegistry {
    let mut registry = MetadataRegistry::new();
    for model in [user(), customer(), profile(), order(), tag()] {
        registry.register(model).unwrap();
    }

    registry
}

pub fn user() -> EntityModel {
    EntityModel::builder("User")
        .field(FieldModel::partition_key("id").default_with(builtin::default::ulid))
        .field(
            FieldModel::new("email")
                .required()
                .unique()
                .mutate(builtin::mutate::trim)
                .mutate(builtin::mutate::lowercase)
                .validate(builtin::validate::contains("@")),
        )
        .field(
            FieldModel::new("handle").validate_lazy(|value| {
                async move {
                    if value.as_text() == Some("root") {
                        Err("handle is reserved".to_string())
                    } else {
                        Ok(())
                    }
                }
                .boxed()
            }),
        )
        .field(FieldModel::new("createdAt").created_at())
        .field(FieldModel::new("updatedAt").updated_at())
        .build()
        .unwrap()
}

pub fn customer() -> EntityModel {
    EntityModel::builder("Customer")
        .field(FieldModel::partition_key("id"))
        .field(FieldModel::new("name").required())
        .relation(RelationModel::has_many("orders", || "Order", "customerId"))
        .relation(RelationModel::has_one("profile", || "Profile", "customerId"))
        .relation(RelationModel::many_to_many(
            "tags",
            || "Tag",
            CUSTOMER_TAGS,
            "customerId",
            "tagId",
        ))
        .build()
        .unwrap()
}

pub fn profile() -> EntityModel {
    EntityModel::builder("Profile")
        .field(FieldModel::partition_key("id"))
        .field(FieldModel::new("customerId"))
        .field(FieldModel::new("bio"))
        .build()
        .unwrap()
}

pub fn order() -> EntityModel {
    EntityModel::builder("Order")
        .field(FieldModel::partition_key("customerId").storage_name("customer_id"))
        .field(FieldModel::sort_key("orderId").storage_name("order_id"))
        .field(FieldModel::new("status").default("pending"))
        .field(FieldModel::new("total"))
        .field(FieldModel::new("paid").codec(builtin::convert::bool_as_int()))
        .field(FieldModel::new("deletedAt").soft_delete())
        .relation(RelationModel::belongs_to("customer", || "Customer", "customerId"))
        .build()
        .unwrap()
}

pub fn tag() -> EntityModel {
    EntityModel::builder("Tag")
        .field(FieldModel::partition_key("id"))
        .field(FieldModel::new("label"))
        .build()
        .unwrap()
}

pub fn ids(entities: &[Entity], field: &str) -> Vec<Value> {
    entities
        .iter()
        .filter_map(|entity| entity.get(field).cloned())
        .collect()
}
