mod support;

use dynorm::{error::ErrorClass, prelude::*};
use serde_json::json;
use support::{Harness, ids};

// ---- access path -----------------------------------------------------------

#[tokio::test]
async fn partition_equality_with_desc_limit_runs_a_key_query() {
    let h = Harness::new();
    h.seed().await;
    let before = h.driver.stats();

    let orders = h.db.table("Order").unwrap();
    let latest = orders
        .find_with(("customerId", "c1"), QueryOptions::new().desc().limit(1))
        .await
        .unwrap();

    assert_eq!(ids(&latest, "orderId"), vec![Value::Int(5)]);

    let after = h.driver.stats();
    assert_eq!(after.query - before.query, 1);
    assert_eq!(after.scan - before.scan, 0);
    assert_eq!(h.metrics.report().ops.plan_query, 1);
    assert_eq!(h.metrics.report().ops.plan_scan, 0);
}

#[tokio::test]
async fn filters_without_the_partition_key_scan_in_key_order() {
    let h = Harness::new();
    h.seed().await;
    let before = h.driver.stats();

    let orders = h.db.table("Order").unwrap();
    let completed = orders.find(("status", "completed")).await.unwrap();

    assert_eq!(
        ids(&completed, "orderId"),
        vec![Value::Int(1), Value::Int(1), Value::Int(3), Value::Int(4)]
    );
    assert_eq!(
        ids(&completed, "customerId"),
        vec![
            Value::from("c1"),
            Value::from("c2"),
            Value::from("c1"),
            Value::from("c1"),
        ]
    );
    assert_eq!(h.driver.stats().scan - before.scan, 1);
    assert_eq!(h.metrics.report().ops.plan_scan, 1);
}

#[tokio::test]
async fn sort_key_ranges_join_the_key_condition() {
    let h = Harness::new();
    h.seed().await;

    let orders = h.db.table("Order").unwrap();
    let filter = Filter::new()
        .eq("customerId", "c1")
        .gte("orderId", 2)
        .lte("orderId", 4);
    let found = orders.find(filter).await.unwrap();

    assert_eq!(
        ids(&found, "orderId"),
        vec![Value::Int(2), Value::Int(3), Value::Int(4)]
    );
    assert_eq!(h.metrics.report().ops.plan_query, 1);
}

// ---- operators -------------------------------------------------------------

#[tokio::test]
async fn list_values_become_set_membership() {
    let h = Harness::new();
    h.seed().await;
    let orders = h.db.table("Order").unwrap();

    let open = orders
        .find(("status", vec!["pending", "cancelled"]))
        .await
        .unwrap();
    assert_eq!(ids(&open, "orderId"), vec![Value::Int(2), Value::Int(5)]);

    let rest = orders
        .find(("status", Operator::Ne, vec!["pending", "cancelled"]))
        .await
        .unwrap();
    assert_eq!(rest.len(), 4);
}

#[tokio::test]
async fn empty_in_list_matches_nothing_without_a_store_call() {
    let h = Harness::new();
    h.seed().await;
    let before = h.driver.stats();

    let orders = h.db.table("Order").unwrap();
    let none = orders
        .find(Filter::new().in_("status", Vec::<&str>::new()))
        .await
        .unwrap();

    assert!(none.is_empty());
    assert_eq!(h.driver.stats(), before);

    let all = orders
        .find(Filter::new().not_in("status", Vec::<&str>::new()))
        .await
        .unwrap();
    assert_eq!(all.len(), 6);
}

#[tokio::test]
async fn filter_values_go_through_the_field_codec() {
    let h = Harness::new();
    h.seed().await;

    let orders = h.db.table("Order").unwrap();
    let paid = orders.find(("paid", true)).await.unwrap();

    assert_eq!(paid.len(), 3);
    assert!(paid.iter().all(|o| o.get("paid") == Some(&Value::Bool(true))));
}

#[tokio::test]
async fn comparison_and_text_operators() {
    let h = Harness::new();
    h.seed().await;
    let orders = h.db.table("Order").unwrap();

    let big = orders.find(("total", Operator::Gt, 30)).await.unwrap();
    assert_eq!(ids(&big, "orderId"), vec![Value::Int(4), Value::Int(5)]);

    let prefixed = orders
        .find(("status", Operator::BeginsWith, "comp"))
        .await
        .unwrap();
    assert_eq!(prefixed.len(), 4);

    let contains = orders
        .find(("status", Operator::Contains, "cel"))
        .await
        .unwrap();
    assert_eq!(ids(&contains, "orderId"), vec![Value::Int(5)]);

    // c2's only order has no total, so it only shows up under not-exists
    let untotalled = orders.find(Filter::new().not_exists("total")).await.unwrap();
    assert_eq!(ids(&untotalled, "customerId"), vec![Value::from("c2")]);
    let below = orders.find(("total", Operator::Lt, 1_000)).await.unwrap();
    assert_eq!(below.len(), 5);
}

// ---- options ---------------------------------------------------------------

#[tokio::test]
async fn skip_limit_and_projection() {
    let h = Harness::new();
    h.seed().await;
    let orders = h.db.table("Order").unwrap();

    let page = orders
        .find_with(
            ("customerId", "c1"),
            QueryOptions::new()
                .skip(1)
                .limit(2)
                .attributes(["orderId", "status"]),
        )
        .await
        .unwrap();

    assert_eq!(ids(&page, "orderId"), vec![Value::Int(2), Value::Int(3)]);
    assert!(page.iter().all(|o| o.values().len() == 2));
}

#[tokio::test]
async fn first_last_and_count() {
    let h = Harness::new();
    h.seed().await;
    let orders = h.db.table("Order").unwrap();

    let first = orders.first(("customerId", "c1")).await.unwrap().unwrap();
    assert_eq!(first.get("orderId"), Some(&Value::Int(1)));

    let last = orders.last(("customerId", "c1")).await.unwrap().unwrap();
    assert_eq!(last.get("orderId"), Some(&Value::Int(5)));

    assert_eq!(orders.count(("customerId", "c1")).await.unwrap(), 5);
    assert_eq!(orders.count(()).await.unwrap(), 6);
    assert!(orders.first(("customerId", "c9")).await.unwrap().is_none());
}

#[tokio::test]
async fn get_by_full_key() {
    let h = Harness::new();
    h.seed().await;
    let orders = h.db.table("Order").unwrap();

    let order = orders.get("c1", Some(Value::Int(3))).await.unwrap().unwrap();
    assert_eq!(order.get("status"), Some(&Value::from("completed")));
    assert!(order.is_persisted());

    assert!(orders.get("c1", Some(Value::Int(9))).await.unwrap().is_none());

    let err = orders.get("c1", None).await.unwrap_err();
    assert_eq!(err.class, ErrorClass::Unsupported);
}

#[tokio::test]
async fn json_queries_use_the_wire_shape() {
    let h = Harness::new();
    h.seed().await;
    let orders = h.db.table("Order").unwrap();

    let found = orders
        .query_json(&json!({
            "where": { "customerId": "c1", "status": { "in": ["completed"] } },
            "order": "DESC",
            "limit": 2,
        }))
        .await
        .unwrap();
    assert_eq!(ids(&found, "orderId"), vec![Value::Int(4), Value::Int(3)]);

    let err = orders
        .query_json(&json!({ "where": {}, "offset": 3 }))
        .await
        .unwrap_err();
    assert_eq!(err.class, ErrorClass::Unsupported);
}

// ---- rejected queries ------------------------------------------------------

#[tokio::test]
async fn unknown_names_fail_before_any_store_call() {
    let h = Harness::new();
    h.seed().await;
    let before = h.driver.stats();
    let orders = h.db.table("Order").unwrap();

    let err = orders.find(("colour", "red")).await.unwrap_err();
    assert_eq!(err.class, ErrorClass::Unsupported);

    let err = orders
        .find_with((), QueryOptions::new().attributes(["colour"]))
        .await
        .unwrap_err();
    assert_eq!(err.class, ErrorClass::Unsupported);

    let err = orders
        .find_with((), QueryOptions::new().include("invoices"))
        .await
        .unwrap_err();
    assert_eq!(err.class, ErrorClass::Unsupported);

    assert_eq!(h.driver.stats(), before);
}

#[tokio::test]
async fn unregistered_types_are_configuration_errors() {
    let h = Harness::new();

    let err = h.db.table("Invoice").unwrap_err();
    assert_eq!(err.class, ErrorClass::Configuration);
}
