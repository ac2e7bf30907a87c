use super::*;
use crate::{
    db::query::{Condition, KeyCondition, Operator},
    model::registry::TableSchema,
    record,
};

fn orders_schema() -> TableSchema {
    TableSchema {
        table: "orders".to_string(),
        partition_key: "customer_id".to_string(),
        sort_key: Some("order_id".to_string()),
    }
}

fn order(customer: &str, order_id: i64, status: &str) -> Item {
    record! {
        "customer_id" => customer,
        "order_id" => order_id,
        "status" => status,
    }
}

fn driver() -> MemoryDriver {
    MemoryDriver::with_schemas([orders_schema()])
}

#[tokio::test]
async fn put_then_get_by_full_key() {
    let driver = driver();
    driver
        .put_item("orders", order("c1", 1, "open"), None)
        .await
        .unwrap();

    let key = Key::new("customer_id", "c1").with_sort("order_id", 1);
    let item = driver.get_item("orders", &key).await.unwrap().unwrap();
    assert_eq!(item.get("status"), Some(&Value::from("open")));

    let missing = Key::new("customer_id", "c1").with_sort("order_id", 2);
    assert!(driver.get_item("orders", &missing).await.unwrap().is_none());
}

#[tokio::test]
async fn numeric_keys_address_the_same_slot() {
    let driver = driver();
    driver
        .put_item("orders", order("c1", 7, "open"), None)
        .await
        .unwrap();

    let key = Key::new("customer_id", "c1").with_sort("order_id", Value::Float(7.0));
    assert!(driver.get_item("orders", &key).await.unwrap().is_some());
}

#[tokio::test]
async fn unknown_table_and_missing_key_are_errors() {
    let driver = driver();

    let err = driver
        .put_item("nope", order("c1", 1, "open"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::TableNotFound(table) if table == "nope"));

    let err = driver
        .put_item("orders", record! { "customer_id" => "c1" }, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::MissingKeyAttribute { attribute, .. } if attribute == "order_id"
    ));
}

#[tokio::test]
async fn not_exists_condition_rejects_overwrite() {
    let driver = driver();
    driver
        .put_item("orders", order("c1", 1, "open"), Some(PutCondition::NotExists))
        .await
        .unwrap();

    let err = driver
        .put_item("orders", order("c1", 1, "paid"), Some(PutCondition::NotExists))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ConditionFailed { .. }));

    // unconditional put overwrites
    driver
        .put_item("orders", order("c1", 1, "paid"), None)
        .await
        .unwrap();
    assert_eq!(driver.item_count("orders").unwrap(), 1);
}

#[tokio::test]
async fn query_orders_by_sort_key_and_filters() {
    let driver = driver();
    for (id, status) in [(3, "open"), (1, "open"), (2, "paid")] {
        driver
            .put_item("orders", order("c1", id, status), None)
            .await
            .unwrap();
    }
    driver
        .put_item("orders", order("c2", 9, "open"), None)
        .await
        .unwrap();

    let key = KeyCondition {
        partition: ("customer_id".to_string(), Value::from("c1")),
        sort: None,
    };

    let ids = |items: Vec<Item>| -> Vec<i64> {
        items
            .iter()
            .filter_map(|item| item.get("order_id").and_then(Value::as_int))
            .collect()
    };

    let forward = driver.query("orders", &key, &[], true).await.unwrap();
    assert_eq!(ids(forward), vec![1, 2, 3]);

    let backward = driver.query("orders", &key, &[], false).await.unwrap();
    assert_eq!(ids(backward), vec![3, 2, 1]);

    let open = [Condition::new("status", Operator::Eq, "open")];
    let filtered = driver.query("orders", &key, &open, true).await.unwrap();
    assert_eq!(ids(filtered), vec![1, 3]);

    let ranged = KeyCondition {
        sort: Some(Condition::new("order_id", Operator::Gte, 2)),
        ..key
    };
    let ranged = driver.query("orders", &ranged, &[], true).await.unwrap();
    assert_eq!(ids(ranged), vec![2, 3]);

    let stats = driver.stats();
    assert_eq!(stats.query, 4);
    assert_eq!(stats.scan, 0);
}

#[tokio::test]
async fn transact_write_is_all_or_nothing() {
    let driver = driver();
    driver
        .put_item("orders", order("c1", 1, "open"), None)
        .await
        .unwrap();

    let ops = vec![
        TransactOp::Put {
            table: "orders".to_string(),
            item: order("c1", 2, "open"),
            condition: Some(PutCondition::NotExists),
        },
        TransactOp::Put {
            table: "orders".to_string(),
            item: order("c1", 1, "dup"),
            condition: Some(PutCondition::NotExists),
        },
    ];
    let err = driver.transact_write(ops).await.unwrap_err();
    assert!(matches!(err, StoreError::TransactionCanceled { .. }));
    assert_eq!(driver.item_count("orders").unwrap(), 1);

    let ops = vec![
        TransactOp::Put {
            table: "orders".to_string(),
            item: order("c1", 2, "open"),
            condition: None,
        },
        TransactOp::Delete {
            table: "orders".to_string(),
            key: Key::new("customer_id", "c1").with_sort("order_id", 1),
        },
    ];
    driver.transact_write(ops).await.unwrap();
    assert_eq!(driver.item_count("orders").unwrap(), 1);
    assert_eq!(driver.stats().transact, 2);
}

#[tokio::test]
async fn transact_write_rejects_the_same_item_twice() {
    let driver = driver();
    let ops = vec![
        TransactOp::Put {
            table: "orders".to_string(),
            item: order("c1", 1, "open"),
            condition: None,
        },
        TransactOp::Delete {
            table: "orders".to_string(),
            key: Key::new("customer_id", "c1").with_sort("order_id", 1),
        },
    ];

    let err = driver.transact_write(ops).await.unwrap_err();
    assert!(matches!(err, StoreError::TransactionCanceled { .. }));
    assert_eq!(driver.item_count("orders").unwrap(), 0);
}

#[test]
fn key_signature_is_stable() {
    let key = Key::new("customer_id", "c1").with_sort("order_id", 1);
    assert_eq!(key.signature(), "s:c1|n:1");
    assert_eq!(Key::new("id", 5).signature(), "n:5");
}
