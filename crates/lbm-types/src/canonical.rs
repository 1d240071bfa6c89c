//! Canonical JSON encoding.
//!
//! Every hash and signature in the system is computed over this form: UTF-8,
//! object keys sorted, no insignificant whitespace. `serde_json::Value`
//! already sorts map keys when compiled with the `preserve_order` feature
//! disabled (the default), so the only work here is picking a minimal
//! separator style and rejecting non-finite floats the way the rest of the
//! system expects JSON numbers to behave.

use lbm_crypto::{sha256, sha256_hex};
use serde::Serialize;
use serde_json::Value;

/// Errors produced while canonicalizing a value.
#[derive(Debug, thiserror::Error)]
pub enum CanonicalError {
    /// The value could not be serialized to JSON at all.
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Render `value` as canonical JSON bytes: sorted keys, no whitespace.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<Vec<u8>, CanonicalError> {
    let v: Value = serde_json::to_value(value)?;
    Ok(canonical_json_value(&v).into_bytes())
}

/// Render an already-parsed [`Value`] as canonical JSON text.
pub fn canonical_json_value(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            // `serde_json::Map` iterates in insertion order unless the
            // `preserve_order` feature is off, in which case it's a BTreeMap
            // and already sorted. Sort explicitly so behavior does not
            // depend on that feature flag.
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(k).expect("string key always serializes"));
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, v) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(v, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// SHA-256 of `canonical_json(value)`.
pub fn hash_obj<T: Serialize>(value: &T) -> Result<[u8; 32], CanonicalError> {
    Ok(sha256(&canonical_json(value)?))
}

/// Lowercase hex SHA-256 of `canonical_json(value)`.
pub fn hash_obj_hex<T: Serialize>(value: &T) -> Result<String, CanonicalError> {
    Ok(sha256_hex(&canonical_json(value)?))
}

/// Lowercase hex SHA-256 of raw bytes.
pub fn hash_bytes_hex(data: &[u8]) -> String {
    sha256_hex(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_keys() {
        let v = json!({"b": 1, "a": 2});
        assert_eq!(canonical_json_value(&v), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn no_whitespace() {
        let v = json!({"a": [1, 2, 3]});
        assert_eq!(canonical_json_value(&v), r#"{"a":[1,2,3]}"#);
    }

    #[test]
    fn nested_objects_sorted_recursively() {
        let v = json!({"z": {"y": 1, "x": 2}, "a": 1});
        assert_eq!(canonical_json_value(&v), r#"{"a":1,"z":{"x":2,"y":1}}"#);
    }

    #[test]
    fn deterministic_hash() {
        let v1 = json!({"b": 1, "a": 2});
        let v2 = json!({"a": 2, "b": 1});
        assert_eq!(hash_obj(&v1).unwrap(), hash_obj(&v2).unwrap());
    }
}
