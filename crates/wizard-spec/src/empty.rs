use serde_json::Value;

/// Whether a value counts as "no value" for review and required checks.
///
/// `null` and `""` are empty; arrays and objects are empty when every element
/// or member is empty, so `{ "a": "", "b": [] }` is empty. `false` and `0` are
/// values.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.iter().all(is_empty_value),
        Value::Object(map) => map.values().all(is_empty_value),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Same as [`is_empty_value`] but treats a missing value as empty.
pub fn is_missing_or_empty(value: Option<&Value>) -> bool {
    value.is_none_or(is_empty_value)
}
