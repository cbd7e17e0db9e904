//! Error types for the reactive runtime.

use thiserror::Error;
use trellis_config::{CompileError, ValueType};

/// Errors raised by instance construction, assignment and teardown.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// The slot is not part of the class's slot table.
    #[error("class {class}: unknown slot `{slot}`")]
    UnknownSlot { class: String, slot: String },

    /// A before-hook refused the assignment.
    #[error("slot `{slot}` rejected: {message}")]
    Rejected { slot: String, message: String },

    /// The value to be stored does not fit the slot's declared type.
    #[error("slot `{slot}` expects {expected}, got {found}")]
    InvalidType {
        slot: String,
        expected: ValueType,
        found: &'static str,
    },

    /// A hook failed with an error from outside this crate.
    #[error("slot `{slot}`: hook failed: {source}")]
    Hook {
        slot: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Re-entrant assignments nested deeper than the configured limit.
    #[error("slot `{slot}`: assignments nested deeper than {limit}")]
    DepthExceeded { slot: String, limit: usize },

    /// A hook table names a slot the class cannot hook.
    #[error("class {class}: cannot hook slot `{slot}`: {reason}")]
    HookTarget {
        class: String,
        slot: String,
        reason: &'static str,
    },

    /// `Class::extend` was given a descriptor that does not descend from
    /// the class.
    #[error("class {class} does not extend {parent}")]
    NotDescendant { class: String, parent: String },

    /// Initial config was neither a map nor null.
    #[error("class {class}: initial config must be a map, found {found}")]
    InvalidConfig { class: String, found: &'static str },

    /// The instance was destroyed.
    #[error("instance {id} is destroyed")]
    Destroyed { id: String },

    /// Singleton classes are constructed through `InstanceFactory::singleton`.
    #[error("class {class} is a singleton")]
    SingletonClass { class: String },

    /// `InstanceFactory::singleton` was asked for a non-singleton class.
    #[error("class {class} is not a singleton")]
    NotSingleton { class: String },

    /// The cached singleton carries a different state type.
    #[error("singleton {class} was constructed with a different state type")]
    SingletonMismatch { class: String },

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Core(#[from] trellis_core::Error),
}

impl ReactiveError {
    pub fn rejected(slot: impl Into<String>, message: impl Into<String>) -> Self {
        ReactiveError::Rejected {
            slot: slot.into(),
            message: message.into(),
        }
    }

    /// Wrap a foreign error raised inside a hook.
    pub fn hook<E>(slot: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ReactiveError::Hook {
            slot: slot.into(),
            source: Box::new(source),
        }
    }

    /// Whether this error aborted an assignment before anything was stored.
    pub fn is_hook_rejection(&self) -> bool {
        matches!(
            self,
            ReactiveError::Rejected { .. } | ReactiveError::InvalidType { .. }
        )
    }
}

/// Result type alias for reactive operations.
pub type Result<T> = std::result::Result<T, ReactiveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_kinds() {
        assert!(ReactiveError::rejected("zoom", "too far").is_hook_rejection());
        let invalid = ReactiveError::InvalidType {
            slot: "zoom".to_string(),
            expected: ValueType::Integer,
            found: "string",
        };
        assert!(invalid.is_hook_rejection());
        assert_eq!(format!("{}", invalid), "slot `zoom` expects integer, got string");
        assert!(!ReactiveError::Destroyed { id: "m1".into() }.is_hook_rejection());
    }

    #[test]
    fn hook_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "channel gone");
        let e = ReactiveError::hook("mounted", io);
        assert!(std::error::Error::source(&e).is_some());
        assert!(format!("{}", e).contains("channel gone"));
    }
}
