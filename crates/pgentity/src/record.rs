//! Dynamic row values.

use serde_json::{Map, Value};

/// A row or payload keyed by property name. A missing key is "undefined";
/// `Value::Null` is SQL NULL.
pub type Record = Map<String, Value>;

/// Normalised lookup key for a primary/foreign key value, so that `1` and
/// `"1"` (e.g. a bigint the driver returned as text) match each other.
pub(crate) fn key_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_and_numeric_strings_share_keys() {
        assert_eq!(key_of(&json!(42)), key_of(&json!("42")));
        assert_eq!(key_of(&Value::Null), None);
    }
}
