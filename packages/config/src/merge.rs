//! Additive merge of container values.

use trellis_core::Value;

/// Merge a declared value into an inherited one.
///
/// - arrays: inherited elements first, then declared elements not already present
/// - maps: union of keys; keys present on both sides merge recursively when
///   both values are containers of the same kind, otherwise the declared value wins
///
/// Returns `None` when the two values are not containers of the same kind.
pub fn additive(inherited: &Value, declared: &Value) -> Option<Value> {
    match (inherited, declared) {
        (Value::Array(base), Value::Array(extra)) => {
            let mut merged = base.clone();
            for item in extra {
                if !merged.contains(item) {
                    merged.push(item.clone());
                }
            }
            Some(Value::Array(merged))
        }
        (Value::Map(base), Value::Map(extra)) => {
            let mut merged = base.clone();
            for (key, value) in extra {
                let combined = match merged.get(key) {
                    Some(existing) => additive(existing, value).unwrap_or_else(|| value.clone()),
                    None => value.clone(),
                };
                merged.insert(key.clone(), combined);
            }
            Some(Value::Map(merged))
        }
        _ => None,
    }
}
