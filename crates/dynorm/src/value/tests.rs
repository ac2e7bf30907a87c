use super::*;
use chrono::TimeZone;
use serde_json::json;
use std::cmp::Ordering;

#[test]
fn numeric_equality_widens_int_and_float() {
    assert_eq!(compare_eq(&Value::Int(2), &Value::Float(2.0)), Some(true));
    assert_eq!(compare_eq(&Value::Int(2), &Value::Float(2.5)), Some(false));
}

#[test]
fn mixed_families_are_never_equal() {
    assert_eq!(compare_eq(&Value::Int(1), &Value::Text("1".into())), Some(false));
    assert_eq!(compare_eq(&Value::Null, &Value::Bool(false)), Some(false));
    assert_eq!(compare_eq(&Value::Null, &Value::Null), Some(true));
}

#[test]
fn nan_has_no_numeric_comparison() {
    assert_eq!(compare_eq(&Value::Float(f64::NAN), &Value::Int(1)), None);
    assert_eq!(compare_order(&Value::Float(f64::NAN), &Value::Int(1)), None);
}

#[test]
fn ordering_is_defined_for_text_and_timestamps() {
    let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let late = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

    assert_eq!(
        compare_order(&Value::Timestamp(early), &Value::Timestamp(late)),
        Some(Ordering::Less)
    );
    assert_eq!(
        compare_order(&Value::from("b"), &Value::from("a")),
        Some(Ordering::Greater)
    );
    assert_eq!(compare_order(&Value::from("a"), &Value::Int(1)), None);
}

#[test]
fn sort_order_falls_back_to_variant_rank() {
    let mut values = vec![Value::from("x"), Value::Int(3), Value::Null, Value::Int(1)];
    values.sort_by(sort_order);

    assert_eq!(
        values,
        vec![Value::Null, Value::Int(1), Value::Int(3), Value::from("x")]
    );
}

#[test]
fn json_conversion_keeps_structure() {
    let json = json!({ "name": "a", "tags": ["x", "y"], "n": 3, "ratio": 0.5, "none": null });
    let value = Value::from(json.clone());

    let Value::Map(map) = &value else {
        panic!("expected map, got {value:?}");
    };
    assert_eq!(map.get("n"), Some(&Value::Int(3)));
    assert_eq!(map.get("ratio"), Some(&Value::Float(0.5)));
    assert_eq!(map.get("none"), Some(&Value::Null));
    assert_eq!(serde_json::Value::from(value), json);
}

#[test]
fn timestamps_leave_as_rfc3339_text() {
    let ts = Utc.with_ymd_and_hms(2024, 3, 4, 5, 6, 7).unwrap();
    let json = serde_json::Value::from(Value::Timestamp(ts));

    assert_eq!(json, json!("2024-03-04T05:06:07+00:00"));
}

#[test]
fn option_and_vec_conversions() {
    assert_eq!(Value::from(None::<i64>), Value::Null);
    assert_eq!(Value::from(Some("a")), Value::from("a"));
    assert_eq!(
        Value::from(vec!["a", "b"]),
        Value::List(vec![Value::from("a"), Value::from("b")])
    );
}

#[test]
fn key_strings_distinguish_families() {
    assert_ne!(Value::Int(1).key_string(), Value::from("1").key_string());
    assert_eq!(Value::Int(1).key_string(), Value::Float(1.0).key_string());
}
