//! Value conversion from serde_json::Value into CEL interpreter types

use cel_interpreter::objects::Value as CelValue;
use serde_json::Value as JsonValue;

/// Convert serde_json::Value to cel_interpreter::Value
pub fn json_to_cel(value: &JsonValue) -> CelValue {
    match value {
        JsonValue::Null => CelValue::Null,
        JsonValue::Bool(b) => CelValue::Bool(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CelValue::Int(i)
            } else if let Some(u) = n.as_u64() {
                CelValue::UInt(u)
            } else if let Some(f) = n.as_f64() {
                CelValue::Float(f)
            } else {
                CelValue::Null
            }
        }
        JsonValue::String(s) => CelValue::String(s.clone().into()),
        JsonValue::Array(arr) => {
            let items: Vec<CelValue> = arr.iter().map(json_to_cel).collect();
            CelValue::List(items.into())
        }
        JsonValue::Object(obj) => {
            use cel_interpreter::objects::{Key, Map};
            use std::collections::HashMap;
            use std::sync::Arc;

            let mut entries: HashMap<Key, CelValue> = HashMap::new();
            for (k, v) in obj.iter() {
                entries.insert(Key::from(k.clone()), json_to_cel(v));
            }
            CelValue::Map(Map {
                map: Arc::new(entries),
            })
        }
    }
}
