//! Document model and JSON codec.
//!
//! A document is a JSON object; attribute values are whatever JSON can hold.
//! The reserved `_id` attribute carries the primary key. It is never part of
//! the on-disk payload (the key of the primary sub-database is the only
//! copy) and is re-attached to every document handed back to a caller.

use crate::error::{Error, Result};
use serde_json::{Map, Value};

pub type Document = Map<String, Value>;

pub const ID: &str = "_id";

/// Serialize a document payload, leaving `_id` out.
pub fn encode(doc: &Document) -> Result<Vec<u8>> {
    if doc.contains_key(ID) {
        let mut payload = doc.clone();
        payload.remove(ID);
        Ok(serde_json::to_vec(&payload)?)
    } else {
        Ok(serde_json::to_vec(doc)?)
    }
}

pub fn decode(bytes: &[u8]) -> Result<Document> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Attach the primary key to a decoded document.
pub fn set_id(doc: &mut Document, id: &[u8]) {
    doc.insert(
        ID.to_string(),
        Value::String(String::from_utf8_lossy(id).into_owned()),
    );
}

/// Coerce a caller-supplied `_id` value to key bytes. Strings are taken
/// verbatim, integers in decimal form; anything else is refused.
pub fn coerce_id(value: &Value) -> Result<Vec<u8>> {
    match value {
        Value::String(s) => Ok(s.as_bytes().to_vec()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(n.to_string().into_bytes()),
        other => Err(Error::BadId(other.to_string())),
    }
}

/// The `_id` of a document, or `NoKey` when it has none.
pub fn id_of(doc: &Document) -> Result<Vec<u8>> {
    match doc.get(ID) {
        Some(value) => coerce_id(value),
        None => Err(Error::NoKey),
    }
}

/// Shallow structural delta between two payloads: attributes set or changed,
/// and attributes removed. `_id` is not part of either payload.
pub fn diff(old: &Document, new: &Document) -> Value {
    let mut set = Map::new();
    for (name, value) in new {
        if name == ID {
            continue;
        }
        if old.get(name) != Some(value) {
            set.insert(name.clone(), value.clone());
        }
    }
    let unset: Vec<Value> = old
        .keys()
        .filter(|name| *name != ID && !new.contains_key(*name))
        .map(|name| Value::String(name.clone()))
        .collect();

    let mut out = Map::new();
    out.insert("set".to_string(), Value::Object(set));
    out.insert("unset".to_string(), Value::Array(unset));
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn encode_strips_id() {
        let d = doc(json!({"_id": "abc", "name": "x"}));
        let bytes = encode(&d).unwrap();
        let back = decode(&bytes).unwrap();
        assert!(!back.contains_key(ID));
        assert_eq!(back.get("name"), Some(&json!("x")));
    }

    #[test]
    fn id_coercion() {
        assert_eq!(coerce_id(&json!("abc")).unwrap(), b"abc".to_vec());
        assert_eq!(coerce_id(&json!(42)).unwrap(), b"42".to_vec());
        assert!(matches!(coerce_id(&json!(true)), Err(Error::BadId(_))));
        assert!(matches!(coerce_id(&json!([1])), Err(Error::BadId(_))));
    }

    #[test]
    fn missing_id_is_no_key() {
        let d = doc(json!({"name": "x"}));
        assert!(matches!(id_of(&d), Err(Error::NoKey)));
    }

    #[test]
    fn diff_reports_set_and_unset() {
        let old = doc(json!({"a": 1, "b": 2, "c": 3}));
        let new = doc(json!({"a": 1, "b": 20, "d": 4}));
        let delta = diff(&old, &new);
        assert_eq!(delta["set"], json!({"b": 20, "d": 4}));
        let unset = delta["unset"].as_array().unwrap();
        assert_eq!(unset.len(), 1);
        assert_eq!(unset[0], json!("c"));
    }
}
