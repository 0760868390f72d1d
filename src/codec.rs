//! Normalization of values read back from the store.
//!
//! Depending on the backend and on who wrote it, a document may arrive as
//! structured JSON or as a string holding encoded JSON. Everything read by the
//! ledger and the aggregator goes through here and comes out as one typed
//! shape, or as a safe default when the data is unusable.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

/// Decode a stored value, accepting both the structured and the
/// string-encoded form.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, serde_json::Error> {
    match value {
        Value::String(text) => serde_json::from_str(&text),
        other => serde_json::from_value(other),
    }
}

/// Decode or skip. Malformed values are logged and dropped.
pub fn decode_lenient<T: DeserializeOwned>(key: &str, value: Value) -> Option<T> {
    match decode(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            warn!(key, error = %e, "Skipping malformed stored value");
            None
        }
    }
}

/// Decode or fall back to `T::default()` (empty list, zero stats).
pub fn decode_or_default<T: DeserializeOwned + Default>(key: &str, value: Option<Value>) -> T {
    value
        .and_then(|v| decode_lenient(key, v))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Pair {
        a: u32,
        b: String,
    }

    #[test]
    fn test_structured_and_string_forms_agree() {
        let structured: Pair = decode(json!({"a": 1, "b": "x"})).unwrap();
        let encoded: Pair = decode(json!(r#"{"a": 1, "b": "x"}"#)).unwrap();

        assert_eq!(structured, encoded);
    }

    #[test]
    fn test_malformed_falls_back() {
        let pairs: Vec<Pair> = decode_or_default("k", Some(json!("{{garbage")));
        assert!(pairs.is_empty());

        let pairs: Vec<Pair> = decode_or_default("k", Some(json!({"not": "a list"})));
        assert!(pairs.is_empty());

        let pairs: Vec<Pair> = decode_or_default("k", None);
        assert!(pairs.is_empty());

        assert_eq!(decode_lenient::<Pair>("k", json!(42)), None);
    }
}
