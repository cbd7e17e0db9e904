//! Errors raised while compiling class declarations.

use thiserror::Error;

/// A malformed or conflicting config schema.
///
/// Compile errors are fatal for the class being registered: the class is
/// not cached and nothing can be constructed from it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A parent or mixin name was not registered.
    #[error("class {class}: unknown class `{name}`")]
    UnknownClass { class: String, name: String },

    /// A slot key is not a valid slot name.
    #[error("class {class}: invalid slot name `{key}`: {reason}")]
    InvalidSlotName {
        class: String,
        key: String,
        reason: &'static str,
    },

    /// The same slot is declared twice in one declaration set.
    #[error("class {class}: slot `{slot}` declared twice")]
    DuplicateSlot { class: String, slot: String },

    /// A reserved key carries a value of the wrong shape.
    #[error("class {class}: reserved key `{key}`: {reason}")]
    InvalidReserved {
        class: String,
        key: &'static str,
        reason: String,
    },

    /// Declarations given as data were not a map.
    #[error("class {class}: declarations must be a map, found {found}")]
    InvalidDeclarations { class: String, found: &'static str },

    /// An additive slot changes its reactive flag along the chain.
    #[error("class {class}: slot `{slot}` is additive and cannot change its reactive flag")]
    ReactiveConflict { class: String, slot: String },

    /// An additive slot has a default that cannot be merged.
    #[error("class {class}: slot `{slot}` is additive but its default {reason}")]
    NonMergeableDefault {
        class: String,
        slot: String,
        reason: &'static str,
    },

    /// A descendant redeclares a slot with an incompatible type.
    #[error("class {class}: slot `{slot}` declared as {found}, inherited as {expected}")]
    TypeConflict {
        class: String,
        slot: String,
        expected: String,
        found: String,
    },
}

/// Result type alias for compile operations.
pub type Result<T> = std::result::Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_class_and_slot() {
        let e = CompileError::ReactiveConflict {
            class: "Map".to_string(),
            slot: "plugins".to_string(),
        };
        let display = format!("{}", e);
        assert!(display.contains("Map"));
        assert!(display.contains("plugins"));
    }

    #[test]
    fn type_conflict_display() {
        let e = CompileError::TypeConflict {
            class: "Map".to_string(),
            slot: "zoom".to_string(),
            expected: "integer".to_string(),
            found: "string".to_string(),
        };
        assert_eq!(
            format!("{}", e),
            "class Map: slot `zoom` declared as string, inherited as integer"
        );
    }
}
