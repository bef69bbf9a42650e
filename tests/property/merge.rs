use proptest::prelude::*;
use serde_json::{Map, Value};

use queenbee::honeycomb::deep_merge;

fn json_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[a-z]{0,6}".prop_map(Value::String),
    ]
}

fn json_value() -> impl Strategy<Value = Value> {
    json_leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            proptest::collection::btree_map("[a-d]", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

fn json_object() -> impl Strategy<Value = Value> {
    proptest::collection::btree_map("[a-d]", json_value(), 0..4)
        .prop_map(|m| Value::Object(m.into_iter().collect()))
}

proptest! {
    #[test]
    fn merging_into_empty_object_yields_update(update in json_object()) {
        prop_assert_eq!(deep_merge(Value::Object(Map::new()), update.clone()), update);
    }

    #[test]
    fn merging_empty_object_keeps_base(base in json_object()) {
        prop_assert_eq!(deep_merge(base.clone(), Value::Object(Map::new())), base);
    }

    #[test]
    fn merge_is_idempotent(base in json_object(), update in json_object()) {
        let once = deep_merge(base, update.clone());
        let twice = deep_merge(once.clone(), update);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn every_update_key_wins_and_untouched_keys_survive(
        base in json_object(),
        update in json_object(),
    ) {
        let merged = deep_merge(base.clone(), update.clone());
        let (Value::Object(base), Value::Object(update), Value::Object(merged)) =
            (base, update, merged)
        else {
            unreachable!("strategies produce objects");
        };

        for (key, value) in &update {
            match (base.get(key), value) {
                (Some(Value::Object(_)), Value::Object(_)) => {
                    prop_assert!(merged[key].is_object());
                }
                _ => prop_assert_eq!(&merged[key], value),
            }
        }
        for (key, value) in &base {
            if !update.contains_key(key) {
                prop_assert_eq!(&merged[key], value);
            }
        }
    }

    #[test]
    fn non_object_update_replaces_wholesale(base in json_value(), update in json_leaf()) {
        prop_assert_eq!(deep_merge(base, update.clone()), update);
    }
}
