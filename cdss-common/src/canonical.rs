//! Canonical JSON and content hashing
//!
//! Used by the audit sink to build its tamper-evident hash chain. Two JSON
//! values with the same content always produce the same canonical string,
//! regardless of key insertion order.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Hash that the first record of a chain links to
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Convert JSON to canonical form (sorted keys, no whitespace)
///
/// # Examples
///
/// ```
/// use cdss_common::canonical::to_canonical_json;
/// use serde_json::json;
///
/// let json = json!({"z": 3, "a": 1, "m": 2});
/// assert_eq!(to_canonical_json(&json), r#"{"a":1,"m":2,"z":3}"#);
/// ```
pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut pairs: Vec<_> = map.iter().collect();
            pairs.sort_by_key(|(k, _)| *k);
            let items: Vec<String> = pairs
                .into_iter()
                .map(|(k, v)| format!("{}:{}", quote(k), to_canonical_json(v)))
                .collect();
            format!("{{{}}}", items.join(","))
        }
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::String(s) => quote(s),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
    }
}

// serde_json string escaping handles control characters as well as quotes
fn quote(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// SHA-256 of a string as 64 lowercase hex characters
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hash of one chain link: `sha256(previous_hash + canonical(value))`
pub fn chain_hash(previous_hash: &str, value: &Value) -> String {
    sha256_hex(&format!("{}{}", previous_hash, to_canonical_json(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_sorts_nested_keys() {
        let value = json!({"b": {"y": 1, "x": [true, null]}, "a": "q\"uote"});
        assert_eq!(
            to_canonical_json(&value),
            r#"{"a":"q\"uote","b":{"x":[true,null],"y":1}}"#
        );
    }

    #[test]
    fn test_canonical_ignores_insertion_order() {
        let mut first = serde_json::Map::new();
        first.insert("service".into(), json!("auth"));
        first.insert("event".into(), json!("login_success"));

        let mut second = serde_json::Map::new();
        second.insert("event".into(), json!("login_success"));
        second.insert("service".into(), json!("auth"));

        assert_eq!(
            to_canonical_json(&Value::Object(first)),
            to_canonical_json(&Value::Object(second))
        );
    }

    #[test]
    fn test_canonical_escapes_control_characters() {
        let value = json!({"text": "line1\nline2"});
        assert_eq!(to_canonical_json(&value), r#"{"text":"line1\nline2"}"#);
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_chain_hash_depends_on_previous() {
        let value = json!({"event": "x"});
        let h1 = chain_hash(GENESIS_HASH, &value);
        let h2 = chain_hash(&h1, &value);
        assert_eq!(h1.len(), 64);
        assert_ne!(h1, h2);
    }
}
