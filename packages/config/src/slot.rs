//! Config slots and the flat slot table.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use trellis_core::Value;

/// Declared type of a slot.
///
/// Null is accepted by every type; slots are nullable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    Any,
    Bool,
    Integer,
    Number,
    String,
    Array,
    Map,
}

impl ValueType {
    /// Check whether a value fits this type.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (ValueType::Any, _) => true,
            (ValueType::Bool, Value::Bool(_)) => true,
            (ValueType::Integer, Value::Integer(_)) => true,
            (ValueType::Number, Value::Integer(_) | Value::Float(_)) => true,
            (ValueType::String, Value::String(_)) => true,
            (ValueType::Array, Value::Array(_)) => true,
            (ValueType::Map, Value::Map(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Any => "any",
            ValueType::Bool => "bool",
            ValueType::Integer => "integer",
            ValueType::Number => "number",
            ValueType::String => "string",
            ValueType::Array => "array",
            ValueType::Map => "map",
        };
        f.write_str(name)
    }
}

/// How a redeclared slot combines with the inherited one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Merge {
    /// The descendant's default replaces the inherited one.
    #[default]
    Replace,
    /// Arrays are unioned and maps are merged key by key.
    Additive,
}

/// A slot default: a literal, or a function producing a fresh value.
#[derive(Clone)]
pub enum SlotDefault {
    Value(Value),
    Factory(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl SlotDefault {
    pub fn factory<F>(f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        SlotDefault::Factory(Arc::new(f))
    }

    /// Materialize the default.
    pub fn produce(&self) -> Value {
        match self {
            SlotDefault::Value(value) => value.clone(),
            SlotDefault::Factory(f) => f(),
        }
    }

    /// The literal default, if this is not a factory.
    pub fn literal(&self) -> Option<&Value> {
        match self {
            SlotDefault::Value(value) => Some(value),
            SlotDefault::Factory(_) => None,
        }
    }
}

impl fmt::Debug for SlotDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotDefault::Value(value) => f.debug_tuple("Value").field(value).finish(),
            SlotDefault::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// One entry of a compiled slot table.
#[derive(Debug, Clone)]
pub struct ConfigSlot {
    pub(crate) name: String,
    pub(crate) default: SlotDefault,
    pub(crate) reactive: bool,
    pub(crate) merge: Merge,
    pub(crate) ty: ValueType,
    pub(crate) declared_by: String,
    pub(crate) overridden_by: Option<String>,
}

impl ConfigSlot {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default(&self) -> &SlotDefault {
        &self.default
    }

    /// Whether assignments run before/after hooks.
    pub fn is_reactive(&self) -> bool {
        self.reactive
    }

    pub fn merge(&self) -> Merge {
        self.merge
    }

    pub fn value_type(&self) -> ValueType {
        self.ty
    }

    /// The class that first declared the slot.
    pub fn declared_by(&self) -> &str {
        &self.declared_by
    }

    /// The last class that redeclared the slot, if any.
    pub fn overridden_by(&self) -> Option<&str> {
        self.overridden_by.as_deref()
    }
}

/// A flat, ordered slot table.
///
/// Order is declaration order along the chain: a slot keeps the position of
/// its first declaration even when a descendant redeclares it.
#[derive(Debug, Clone, Default)]
pub struct SlotTable {
    slots: Vec<ConfigSlot>,
    index: BTreeMap<String, usize>,
}

impl SlotTable {
    pub fn get(&self, name: &str) -> Option<&ConfigSlot> {
        self.index.get(name).map(|&i| &self.slots[i])
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut ConfigSlot> {
        self.index.get(name).map(|&i| &mut self.slots[i])
    }

    /// Position of a slot in declaration order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Slot at a position in declaration order.
    pub fn at(&self, position: usize) -> Option<&ConfigSlot> {
        self.slots.get(position)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConfigSlot> {
        self.slots.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn push(&mut self, slot: ConfigSlot) {
        self.index.insert(slot.name.clone(), self.slots.len());
        self.slots.push(slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(name: &str) -> ConfigSlot {
        ConfigSlot {
            name: name.to_string(),
            default: SlotDefault::Value(Value::Null),
            reactive: false,
            merge: Merge::Replace,
            ty: ValueType::Any,
            declared_by: "Base".to_string(),
            overridden_by: None,
        }
    }

    #[test]
    fn value_type_accepts() {
        assert!(ValueType::Integer.accepts(&Value::from(8)));
        assert!(!ValueType::Integer.accepts(&Value::from(8.5)));
        assert!(ValueType::Number.accepts(&Value::from(8.5)));
        assert!(ValueType::Map.accepts(&Value::Null));
        assert!(!ValueType::String.accepts(&Value::from(true)));
        assert!(ValueType::Any.accepts(&Value::array()));
    }

    #[test]
    fn factory_default_produces_fresh_values() {
        let default = SlotDefault::factory(|| Value::array());
        assert_eq!(default.produce(), Value::array());
        assert!(default.literal().is_none());
        assert_eq!(format!("{:?}", default), "Factory(..)");
    }

    #[test]
    fn table_keeps_declaration_order() {
        let mut table = SlotTable::default();
        table.push(slot("zoom"));
        table.push(slot("center"));

        assert_eq!(table.names().collect::<Vec<_>>(), vec!["zoom", "center"]);
        assert_eq!(table.position("center"), Some(1));
        assert_eq!(table.at(0).map(ConfigSlot::name), Some("zoom"));
        assert!(table.get("missing").is_none());
    }
}
