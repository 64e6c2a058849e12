//! JSON cleanup: drop fields that carry no information.

use serde_json::Value;

fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Recursively strip `null` and `""` object fields. Array slots are kept so
/// positional meaning survives.
pub fn strip_blank_fields(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !is_blank(v))
                .map(|(k, v)| (k.clone(), strip_blank_fields(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_blank_fields).collect()),
        other => other.clone(),
    }
}

/// Compact single-line encoding of a cleaned value.
pub fn compact(value: &Value) -> String {
    strip_blank_fields(value).to_string()
}

/// The indented form a caller would otherwise transmit.
pub fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
