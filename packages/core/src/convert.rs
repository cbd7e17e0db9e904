//! Conversions between Value, serde types and JSON.
//!
//! `Value` serializes through `serde_json::Value`, which is also the wire form
//! used by the bridge. Bytes travel as base64 strings and come back as strings.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as Json;

use crate::{Error, Result, Value};

/// Decode a typed value, e.g. a remote call's argument struct.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value_to_json(value)).map_err(|e| Error::decode(e.to_string()))
}

/// Encode a typed value.
pub fn to_value<T: Serialize>(data: &T) -> Result<Value> {
    serde_json::to_value(data)
        .map(json_to_value)
        .map_err(|e| Error::encode(e.to_string()))
}

/// Lower a Value to its JSON form.
pub fn value_to_json(value: Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::from(b),
        Value::Integer(i) => Json::from(i),
        // Non-finite floats have no JSON form and become null.
        Value::Float(f) => Json::from(f),
        Value::String(s) => Json::from(s),
        Value::Bytes(b) => Json::from(STANDARD.encode(b)),
        Value::Array(items) => items.into_iter().map(value_to_json).collect(),
        Value::Map(entries) => Json::Object(
            entries
                .into_iter()
                .map(|(key, v)| (key, value_to_json(v)))
                .collect(),
        ),
    }
}

/// Lift JSON into a Value. Integers that fit `i64` stay integers.
pub fn json_to_value(json: Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => n
            .as_i64()
            .map(Value::Integer)
            .or_else(|| n.as_f64().map(Value::Float))
            .unwrap_or_else(|| Value::String(n.to_string())),
        Json::String(s) => Value::String(s),
        Json::Array(items) => Value::Array(items.into_iter().map(json_to_value).collect()),
        Json::Object(entries) => Value::Map(
            entries
                .into_iter()
                .map(|(key, v)| (key, json_to_value(v)))
                .collect(),
        ),
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        value_to_json(self.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Json::deserialize(deserializer).map(json_to_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct AddMarker {
        id: String,
        map_id: String,
        title: Option<String>,
    }

    #[test]
    fn typed_args_roundtrip() {
        let original = AddMarker {
            id: "k1".to_string(),
            map_id: "m1".to_string(),
            title: None,
        };

        let value = to_value(&original).unwrap();
        assert_eq!(value.get("mapId"), Some(&Value::from("m1")));

        let recovered: AddMarker = from_value(value).unwrap();
        assert_eq!(original, recovered);
    }

    #[test]
    fn json_to_value_numbers() {
        let value = json_to_value(serde_json::json!({
            "integer": 42,
            "float": 2.75,
            "negative": -100
        }));
        assert_eq!(value.get("integer"), Some(&Value::Integer(42)));
        assert_eq!(value.get("negative"), Some(&Value::Integer(-100)));
        match value.get("float") {
            Some(Value::Float(f)) => assert!((f - 2.75).abs() < 0.001),
            other => panic!("expected float, got {:?}", other),
        }
    }

    #[test]
    fn value_to_json_nan_becomes_null() {
        assert_eq!(value_to_json(Value::Float(f64::NAN)), serde_json::Value::Null);
    }

    #[test]
    fn value_to_json_bytes_are_base64() {
        let json = value_to_json(Value::Bytes(vec![1, 2, 3, 4]));
        let serde_json::Value::String(s) = json else {
            panic!("expected string");
        };
        let decoded = STANDARD.decode(&s).unwrap();
        assert_eq!(decoded, vec![1, 2, 3, 4]);
    }

    #[test]
    fn value_to_json_map() {
        let mut map = BTreeMap::new();
        map.insert("key".to_string(), Value::from("value"));
        map.insert("num".to_string(), Value::Integer(42));

        let json = value_to_json(Value::Map(map));
        assert_eq!(json, serde_json::json!({"key": "value", "num": 42}));
    }

    #[test]
    fn value_serializes_as_plain_json() {
        let value = Value::Array(vec![Value::from(1), Value::from("two"), Value::Null]);
        let text = serde_json::to_string(&value).unwrap();
        assert_eq!(text, r#"[1,"two",null]"#);

        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn from_value_error() {
        let result: Result<AddMarker> = from_value(Value::from("not a struct"));
        assert!(matches!(result, Err(Error::Decode { .. })));
    }
}
