//! Checksum utilities for schema fingerprints
//!
//! Schemas are fingerprinted so that re-registering an unchanged document
//! keeps its cached prototype, and so that a whole loaded bundle can be
//! identified by one hash.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA256 checksum of a schema document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Compute checksum from a JSON value.
    ///
    /// Object keys are hashed in sorted order, so equal documents hash
    /// equally regardless of the key order they were written in.
    pub fn from_json(value: &serde_json::Value) -> Self {
        Self::from_bytes(canonical_json(value).as_bytes())
    }

    /// Combine several checksums into one, order-independent
    pub fn combine<'a>(checksums: impl IntoIterator<Item = &'a Checksum>) -> Self {
        let mut parts: Vec<&str> = checksums.into_iter().map(|c| c.as_str()).collect();
        parts.sort_unstable();
        Self::from_bytes(parts.join(",").as_bytes())
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Verify that a JSON value matches this checksum
    pub fn verify_json(&self, value: &serde_json::Value) -> bool {
        Self::from_json(value) == *self
    }
}

/// Compact JSON text with object keys sorted at every level and integral
/// floats written as integers. Equal values give equal text.
pub fn canonical_json(value: &serde_json::Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 9.0e15 => {
                out.push_str(&(f as i64).to_string())
            }
            _ => out.push_str(&n.to_string()),
        },
        scalar => out.push_str(&scalar.to_string()),
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_checksum_ignores_key_order() {
        let a: serde_json::Value = serde_json::from_str(r#"{"b": 1, "a": 2}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"a": 2, "b": 1}"#).unwrap();
        assert_eq!(Checksum::from_json(&a), Checksum::from_json(&b));
    }

    #[test]
    fn test_checksum_different_content() {
        let one = Checksum::from_json(&json!({"title": "Person"}));
        let two = Checksum::from_json(&json!({"title": "Place"}));
        assert_ne!(one, two);
        assert!(one.verify_json(&json!({"title": "Person"})));
    }

    #[test]
    fn test_canonical_json() {
        let a: serde_json::Value = serde_json::from_str(r#"{"b": [1.0, {"y": 2, "x": 1}], "a": "1"}"#).unwrap();
        assert_eq!(canonical_json(&a), r#"{"a":"1","b":[1,{"x":1,"y":2}]}"#);
        assert_eq!(canonical_json(&json!(1.5)), "1.5");
        assert_ne!(canonical_json(&json!("1")), canonical_json(&json!(1)));
    }

    #[test]
    fn test_combine_is_order_independent() {
        let a = Checksum::from_bytes(b"a");
        let b = Checksum::from_bytes(b"b");
        assert_eq!(Checksum::combine([&a, &b]), Checksum::combine([&b, &a]));
    }
}
