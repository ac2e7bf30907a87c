mod support;

use dynorm::{db::store::StoreError, error::ErrorClass, prelude::*};
use serde::{Deserialize, Serialize};
use support::{Harness, ids};

#[derive(Debug, Deserialize, Serialize)]
struct NewUser {
    email: String,
    handle: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserView {
    id: String,
    email: String,
    #[serde(rename = "createdAt")]
    created_at: String,
}

// ---- create ----------------------------------------------------------------

#[tokio::test]
async fn create_normalizes_input_and_fills_defaults() {
    let h = Harness::new();
    let users = h.db.table("User").unwrap();

    let user = users
        .create(record! { "email" => " A@B.COM " })
        .await
        .unwrap();

    assert_eq!(user.get("email"), Some(&Value::from("a@b.com")));
    let id = user.get("id").and_then(Value::as_text).unwrap().to_string();
    assert_eq!(id.len(), 26);
    assert!(matches!(user.get("createdAt"), Some(Value::Timestamp(_))));
    assert_eq!(user.get("createdAt"), user.get("updatedAt"));
    assert!(user.is_persisted());

    let stored = users.get(id.as_str(), None).await.unwrap().unwrap();
    assert_eq!(stored.get("email"), Some(&Value::from("a@b.com")));

    let view: UserView = stored.to_typed().unwrap();
    assert_eq!(view.id, id);
    assert_eq!(view.email, "a@b.com");
    assert!(!view.created_at.is_empty());
}

#[tokio::test]
async fn defaults_differ_per_instance() {
    let h = Harness::new();
    let users = h.db.table("User").unwrap();

    let a = users.create(record! { "email" => "a@x.io" }).await.unwrap();
    let b = users.create(record! { "email" => "b@x.io" }).await.unwrap();

    assert_ne!(a.get("id"), b.get("id"));
}

#[tokio::test]
async fn create_from_serializable_struct() {
    let h = Harness::new();
    let users = h.db.table("User").unwrap();

    let user = users
        .create_from(&NewUser {
            email: "Typed@Example.com".to_string(),
            handle: Some("ada".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(user.get("email"), Some(&Value::from("typed@example.com")));
    assert_eq!(user.get("handle"), Some(&Value::from("ada")));
}

// ---- validation ------------------------------------------------------------

#[tokio::test]
async fn invalid_input_never_reaches_the_store() {
    let h = Harness::new();
    let users = h.db.table("User").unwrap();

    let err = users
        .create(record! { "email" => "not-an-address" })
        .await
        .unwrap_err();

    assert_eq!(err.class, ErrorClass::Validation);
    let detail = err.validation_detail().unwrap();
    assert_eq!(detail.entity, "User");
    assert_eq!(detail.field, "email");
    assert_eq!(h.driver.stats().put, 0);
    assert_eq!(h.metrics.report().ops.validation_failures, 1);
}

#[tokio::test]
async fn lazy_validators_run_at_save_time() {
    let h = Harness::new();
    let users = h.db.table("User").unwrap();

    let mut user = users
        .build(record! { "email" => "root@x.io", "handle" => "root" })
        .unwrap();
    assert!(!user.is_persisted());

    let err = users.save(&mut user).await.unwrap_err();
    assert_eq!(err.validation_detail().unwrap().message, "handle is reserved");
    assert_eq!(h.driver.stats().put, 0);

    user.set("handle", "operator").unwrap();
    users.save(&mut user).await.unwrap();
    assert!(user.is_persisted());
}

#[tokio::test]
async fn unique_fields_are_checked_across_items() {
    let h = Harness::new();
    let users = h.db.table("User").unwrap();
    users.create(record! { "email" => "dup@x.io" }).await.unwrap();

    let err = users
        .create(record! { "email" => "  DUP@x.io" })
        .await
        .unwrap_err();
    let detail = err.validation_detail().unwrap();
    assert_eq!(detail.field, "email");
    assert_eq!(detail.message, "value must be unique");
    assert_eq!(h.driver.item_count("users").unwrap(), 1);
}

#[tokio::test]
async fn create_never_overwrites_an_existing_key() {
    let h = Harness::new();
    let tags = h.db.table("Tag").unwrap();
    tags.create(record! { "id" => "t1", "label" => "first" })
        .await
        .unwrap();

    let err = tags
        .create(record! { "id" => "t1", "label" => "second" })
        .await
        .unwrap_err();

    assert_eq!(err.class, ErrorClass::Store);
    assert!(matches!(
        err.store_error(),
        Some(StoreError::ConditionFailed { .. })
    ));
    let stored = tags.get("t1", None).await.unwrap().unwrap();
    assert_eq!(stored.get("label"), Some(&Value::from("first")));
}

// ---- update ----------------------------------------------------------------

#[tokio::test]
async fn save_refreshes_updated_at_only() {
    let h = Harness::new();
    let users = h.db.table("User").unwrap();

    let mut user = users.create(record! { "email" => "u@x.io" }).await.unwrap();
    let created = user.get("createdAt").cloned();

    user.set("email", " New@X.io ").unwrap();
    users.save(&mut user).await.unwrap();

    assert_eq!(user.get("email"), Some(&Value::from("new@x.io")));
    assert_eq!(user.get("createdAt").cloned(), created);
    assert!(user.get("updatedAt").is_some());
    assert_eq!(h.driver.item_count("users").unwrap(), 1);
}

#[tokio::test]
async fn table_update_patches_every_match() {
    let h = Harness::new();
    h.seed().await;
    let orders = h.db.table("Order").unwrap();

    let patched = orders
        .update(("status", "completed"), record! { "status" => "archived" })
        .await
        .unwrap();
    assert_eq!(patched, 4);
    assert_eq!(orders.count(("status", "archived")).await.unwrap(), 4);
    assert_eq!(orders.count(("status", "completed")).await.unwrap(), 0);

    let err = orders
        .update(("customerId", "c1"), record! { "orderId" => 99 })
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(orders.count(("customerId", "c1")).await.unwrap(), 5);
}

#[tokio::test]
async fn bulk_update_breaking_uniqueness_writes_nothing() {
    let h = Harness::new();
    let users = h.db.table("User").unwrap();
    users.create(record! { "email" => "a@x.com" }).await.unwrap();
    users.create(record! { "email" => "b@x.com" }).await.unwrap();
    let puts = h.driver.stats().put;

    let err = users
        .update((), record! { "email" => "same@x.com" })
        .await
        .unwrap_err();
    assert_eq!(err.validation_detail().unwrap().message, "value must be unique");
    assert_eq!(h.driver.stats().put, puts);

    let mut emails = ids(&users.find(()).await.unwrap(), "email");
    emails.sort_by_key(|email| email.as_text().map(str::to_string));
    assert_eq!(emails, vec![Value::from("a@x.com"), Value::from("b@x.com")]);
}

#[tokio::test]
async fn bulk_update_checks_lazy_validators_before_writing() {
    let h = Harness::new();
    let users = h.db.table("User").unwrap();
    users
        .create(record! { "email" => "a@x.com", "handle" => "ada" })
        .await
        .unwrap();
    users
        .create(record! { "email" => "b@x.com", "handle" => "bob" })
        .await
        .unwrap();

    let err = users
        .update((), record! { "handle" => "root" })
        .await
        .unwrap_err();
    assert_eq!(err.validation_detail().unwrap().message, "handle is reserved");
    assert_eq!(users.count(("handle", "root")).await.unwrap(), 0);
}

#[tokio::test]
async fn key_fields_cannot_change_after_save() {
    let h = Harness::new();
    let tags = h.db.table("Tag").unwrap();
    let mut tag = tags
        .create(record! { "id" => "t1", "label" => "x" })
        .await
        .unwrap();

    let err = tag.set("id", "t2").unwrap_err();
    assert_eq!(err.validation_detail().unwrap().field, "id");
    assert_eq!(tag.get("id"), Some(&Value::from("t1")));
}
