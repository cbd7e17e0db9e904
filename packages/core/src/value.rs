//! The Value type - a tree-shaped data structure.
//!
//! Config defaults, slot values, bus payloads and remote call arguments are
//! all Values. The tree is encoding-agnostic; the wire form is JSON (see
//! `convert`).

use std::collections::BTreeMap;

use crate::{Error, Result};

/// A dynamically-typed tree value.
///
/// # Design Notes
///
/// - Uses `BTreeMap` for deterministic ordering (stable envelopes, stable comparison)
/// - Includes `Bytes` for binary data; it travels as base64 on the wire
/// - Uses `i64` for integers and keeps floats separate so `8` and `8.0` stay distinct
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    /// Absence of a value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed 64-bit integer.
    Integer(i64),
    /// 64-bit floating point.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// Ordered sequence of values.
    Array(Vec<Value>),
    /// Key-value map with string keys.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Create a null value.
    pub fn null() -> Self {
        Value::Null
    }

    /// Create an empty map.
    pub fn map() -> Self {
        Value::Map(BTreeMap::new())
    }

    /// Create an empty array.
    pub fn array() -> Self {
        Value::Array(Vec::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// Name of the variant, used in type mismatch messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of integers and floats alike.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Get a field of a map value.
    ///
    /// Returns `None` for missing keys and for non-map values.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Get a mutable reference to a field of a map value.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        match self {
            Value::Map(map) => map.get_mut(key),
            _ => None,
        }
    }

    /// Insert a field, turning `Null` into an empty map first.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is neither a map nor null.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        if self.is_null() {
            *self = Value::map();
        }
        match self {
            Value::Map(map) => {
                map.insert(key.into(), value.into());
                Ok(())
            }
            other => Err(Error::UnexpectedType {
                expected: "map",
                found: other.type_name(),
            }),
        }
    }

    /// Remove a field of a map value, returning it if it existed.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        match self {
            Value::Map(map) => map.remove(key),
            _ => None,
        }
    }

    /// Walk a dotted key path (`"center.lat"`) through nested maps.
    pub fn lookup(&self, dotted: &str) -> Option<&Value> {
        dotted
            .split('.')
            .filter(|c| !c.is_empty())
            .try_fold(self, |current, key| current.get(key))
    }
}

macro_rules! impl_from {
    ($($source:ty => $variant:ident as $target:ty),* $(,)?) => {
        $(
            impl From<$source> for Value {
                fn from(v: $source) -> Self {
                    Value::$variant(<$target>::from(v))
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool as bool,
    i64 => Integer as i64,
    i32 => Integer as i64,
    u32 => Integer as i64,
    f64 => Float as f64,
    String => String as String,
    &str => String as String,
    &String => String as String,
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Map(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collection_literals::btree;

    #[test]
    fn get_field_of_map() {
        let value = Value::Map(btree! {
            "zoom".into() => Value::from(8),
        });
        assert_eq!(value.get("zoom"), Some(&Value::Integer(8)));
        assert_eq!(value.get("center"), None);
        assert_eq!(Value::from("m1").get("zoom"), None);
    }

    #[test]
    fn insert_into_null_creates_map() {
        let mut value = Value::Null;
        value.insert("mapId", "m1").unwrap();
        assert!(value.is_map());
        assert_eq!(value.get("mapId").and_then(Value::as_str), Some("m1"));
    }

    #[test]
    fn insert_into_scalar_fails() {
        let mut value = Value::from(3);
        let err = value.insert("k", 1).unwrap_err();
        assert!(format!("{}", err).contains("expected map"));
    }

    #[test]
    fn lookup_walks_nested_maps() {
        let value = Value::Map(btree! {
            "center".into() => Value::Map(btree! {
                "lat".into() => Value::from(-34.397),
            }),
        });
        assert_eq!(
            value.lookup("center.lat").and_then(Value::as_f64),
            Some(-34.397)
        );
        assert_eq!(value.lookup("center.lng"), None);
        assert_eq!(value.lookup(""), Some(&value));
    }

    #[test]
    fn remove_returns_old_field() {
        let mut value = Value::map();
        value.insert("a", 1).unwrap();
        assert_eq!(value.remove("a"), Some(Value::Integer(1)));
        assert_eq!(value.remove("a"), None);
    }

    #[test]
    fn numeric_views() {
        assert_eq!(Value::from(8).as_f64(), Some(8.0));
        assert_eq!(Value::from(8.5).as_i64(), None);
        assert_ne!(Value::from(8), Value::from(8.0));
    }

    #[test]
    fn option_conversion() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::from("x"));
    }
}
