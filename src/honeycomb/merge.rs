// src/honeycomb/merge.rs

use serde_json::Value;

/// Recursively merge `updates` into `base`.
///
/// Objects merge key by key. Every other combination (arrays, scalars, an
/// object meeting a non-object) is replaced wholesale by the update value.
pub fn deep_merge(base: Value, updates: Value) -> Value {
    match (base, updates) {
        (Value::Object(mut base), Value::Object(updates)) => {
            for (key, value) in updates {
                let merged = match base.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (_, updates) => updates,
    }
}
