//! A class's own config declarations, before compilation.

use std::sync::Arc;

use trellis_core::Value;

use crate::compile::ClassDescriptor;
use crate::error::{CompileError, Result};
use crate::manifest::RemoteManifest;
use crate::slot::{Merge, SlotDefault, ValueType};

/// Keys with a meaning of their own in the data form of declarations.
pub const RESERVED_KEYS: [&str; 4] = ["className", "singleton", "remote", "mixins"];

/// Suffix marking a slot reactive.
const REACTIVE_MARKER: char = '_';

/// One declared slot.
#[derive(Debug, Clone)]
pub struct SlotDecl {
    pub(crate) default: SlotDefault,
    pub(crate) reactive: Option<bool>,
    pub(crate) merge: Merge,
    pub(crate) ty: Option<ValueType>,
}

impl SlotDecl {
    pub fn new(default: impl Into<Value>) -> Self {
        Self {
            default: SlotDefault::Value(default.into()),
            reactive: None,
            merge: Merge::Replace,
            ty: None,
        }
    }

    /// A slot whose default is produced fresh for every instance.
    pub fn factory<F>(f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self {
            default: SlotDefault::factory(f),
            reactive: None,
            merge: Merge::Replace,
            ty: None,
        }
    }

    /// Set the reactive flag explicitly. Takes precedence over the key marker.
    pub fn reactive(mut self, reactive: bool) -> Self {
        self.reactive = Some(reactive);
        self
    }

    /// Union with the inherited default instead of replacing it.
    pub fn additive(mut self) -> Self {
        self.merge = Merge::Additive;
        self
    }

    pub fn typed(mut self, ty: ValueType) -> Self {
        self.ty = Some(ty);
        self
    }
}

/// The declarations a class contributes on top of its parents.
///
/// Slot keys follow the naming convention: `zoom_` declares a reactive slot
/// named `zoom`, `zoom` a plain one (or inherits the flag when redeclared).
#[derive(Debug, Clone, Default)]
pub struct Declarations {
    pub(crate) slots: Vec<(String, SlotDecl)>,
    pub(crate) class_name: Option<String>,
    pub(crate) singleton: Option<bool>,
    pub(crate) remote: RemoteManifest,
    pub(crate) mixins: Vec<Arc<ClassDescriptor>>,
}

impl Declarations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a slot with a literal default.
    pub fn slot(self, key: impl Into<String>, default: impl Into<Value>) -> Self {
        self.declare(key, SlotDecl::new(default))
    }

    /// Declare a slot with full options.
    pub fn declare(mut self, key: impl Into<String>, decl: SlotDecl) -> Self {
        self.slots.push((key.into(), decl));
        self
    }

    pub fn singleton(mut self, singleton: bool) -> Self {
        self.singleton = Some(singleton);
        self
    }

    /// Expose methods to a calling context.
    pub fn remote<I, S>(mut self, context: impl Into<String>, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.remote.add(context, methods);
        self
    }

    /// Compose a capability set. Its slots are merged in before this class's
    /// own declarations.
    pub fn mixin(mut self, mixin: Arc<ClassDescriptor>) -> Self {
        self.mixins.push(mixin);
        self
    }

    /// Declared slot keys, as written.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|(key, _)| key.as_str())
    }

    /// Build declarations from their data form: a map of slot keys to
    /// literal defaults, plus the reserved keys. Mixins are named and looked
    /// up with `resolve`.
    ///
    /// Map iteration is by key, so slots declared this way are ordered by key.
    pub fn from_value<F>(class: &str, value: &Value, resolve: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<Arc<ClassDescriptor>>,
    {
        let entries = value
            .as_map()
            .ok_or_else(|| CompileError::InvalidDeclarations {
                class: class.to_string(),
                found: value.type_name(),
            })?;

        let mut decls = Declarations::new();
        for (key, entry) in entries {
            match key.as_str() {
                "className" => {
                    let name = entry.as_str().ok_or_else(|| {
                        invalid_reserved(class, "className", "expected a string")
                    })?;
                    decls.class_name = Some(name.to_string());
                }
                "singleton" => {
                    let flag = entry.as_bool().ok_or_else(|| {
                        invalid_reserved(class, "singleton", "expected a bool")
                    })?;
                    decls.singleton = Some(flag);
                }
                "remote" => {
                    decls.remote = RemoteManifest::from_value(entry)
                        .map_err(|reason| invalid_reserved(class, "remote", reason))?;
                }
                "mixins" => {
                    let names = entry.as_array().ok_or_else(|| {
                        invalid_reserved(class, "mixins", "expected an array of class names")
                    })?;
                    for name in names {
                        let name = name.as_str().ok_or_else(|| {
                            invalid_reserved(class, "mixins", "expected an array of class names")
                        })?;
                        let mixin = resolve(name).ok_or_else(|| CompileError::UnknownClass {
                            class: class.to_string(),
                            name: name.to_string(),
                        })?;
                        decls.mixins.push(mixin);
                    }
                }
                _ => decls.slots.push((key.clone(), SlotDecl::new(entry.clone()))),
            }
        }
        Ok(decls)
    }
}

fn invalid_reserved(class: &str, key: &'static str, reason: impl Into<String>) -> CompileError {
    CompileError::InvalidReserved {
        class: class.to_string(),
        key,
        reason: reason.into(),
    }
}

/// Split a declared key into the slot name and whether it carries the
/// reactive marker.
pub(crate) fn parse_key(class: &str, key: &str) -> Result<(String, bool)> {
    let invalid = |reason| CompileError::InvalidSlotName {
        class: class.to_string(),
        key: key.to_string(),
        reason,
    };

    let (name, marked) = match key.strip_suffix(REACTIVE_MARKER) {
        Some(name) => (name, true),
        None => (key, false),
    };

    if name.is_empty() {
        return Err(invalid("empty name"));
    }
    if name.ends_with(REACTIVE_MARKER) {
        return Err(invalid("more than one reactive marker"));
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(invalid("starts with a digit"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid("only ascii letters, digits and `_` are allowed"));
    }
    if RESERVED_KEYS.contains(&name) {
        return Err(invalid("reserved key"));
    }
    Ok((name.to_string(), marked))
}
