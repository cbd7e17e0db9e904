//! Descriptor composition.

use std::sync::Arc;

use tracing::debug;

use crate::declarations::{parse_key, Declarations};
use crate::error::{CompileError, Result};
use crate::manifest::RemoteManifest;
use crate::merge::additive;
use crate::slot::{ConfigSlot, Merge, SlotDefault, SlotTable, ValueType};

/// A compiled class: immutable, shared by every instance of the class.
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    name: String,
    ancestry: Vec<String>,
    mixins: Vec<String>,
    slots: SlotTable,
    singleton: bool,
    remote: RemoteManifest,
}

impl ClassDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Class names root to leaf, ending with this class.
    pub fn ancestry(&self) -> &[String] {
        &self.ancestry
    }

    /// Names of the capability sets composed into this class, including
    /// those inherited from parents.
    pub fn mixins(&self) -> &[String] {
        &self.mixins
    }

    pub fn slots(&self) -> &SlotTable {
        &self.slots
    }

    pub fn slot(&self, name: &str) -> Option<&ConfigSlot> {
        self.slots.get(name)
    }

    /// At most one instance of a singleton class is ever constructed.
    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    pub fn remote(&self) -> &RemoteManifest {
        &self.remote
    }

    /// Whether this class is `name` or descends from or mixes in `name`.
    pub fn is_a(&self, name: &str) -> bool {
        self.ancestry.iter().any(|a| a == name) || self.mixins.iter().any(|m| m == name)
    }
}

/// One slot contribution being layered onto the table.
struct Layer<'a> {
    name: &'a str,
    default: &'a SlotDefault,
    reactive: Option<bool>,
    merge: Merge,
    ty: Option<ValueType>,
    origin: &'a str,
}

/// Compose a class from its ordered parents (root to leaf) and its own
/// declarations.
///
/// Parents are layered first, then the mixins, then the class's own
/// declarations. Inputs are not modified; composing the same inputs twice
/// yields equal descriptors.
pub fn compose(
    name: &str,
    parents: &[Arc<ClassDescriptor>],
    declarations: &Declarations,
) -> Result<ClassDescriptor> {
    if let Some(declared) = &declarations.class_name {
        if declared != name {
            return Err(CompileError::InvalidReserved {
                class: name.to_string(),
                key: "className",
                reason: format!("declares `{}`", declared),
            });
        }
    }

    let mut slots = SlotTable::default();
    let mut ancestry: Vec<String> = Vec::new();
    let mut mixins: Vec<String> = Vec::new();
    let mut remote = RemoteManifest::new();
    let mut singleton = false;

    for parent in parents {
        for ancestor in parent.ancestry() {
            push_unique(&mut ancestry, ancestor);
        }
        for mixin in parent.mixins() {
            push_unique(&mut mixins, mixin);
        }
        layer_table(name, &mut slots, parent.slots())?;
        remote.merge(parent.remote());
        singleton = parent.is_singleton();
    }

    for mixin in &declarations.mixins {
        for composed in mixin.ancestry().iter().chain(mixin.mixins()) {
            push_unique(&mut mixins, composed);
        }
        layer_table(name, &mut slots, mixin.slots())?;
        remote.merge(mixin.remote());
    }

    let mut own: Vec<String> = Vec::new();
    for (key, decl) in &declarations.slots {
        let (slot_name, marked) = parse_key(name, key)?;
        if own.contains(&slot_name) {
            return Err(CompileError::DuplicateSlot {
                class: name.to_string(),
                slot: slot_name,
            });
        }
        let reactive = decl.reactive.or(marked.then_some(true));
        apply(
            name,
            &mut slots,
            Layer {
                name: &slot_name,
                default: &decl.default,
                reactive,
                merge: decl.merge,
                ty: decl.ty,
                origin: name,
            },
        )?;
        own.push(slot_name);
    }

    remote.merge(&declarations.remote);
    if let Some(flag) = declarations.singleton {
        singleton = flag;
    }
    push_unique(&mut ancestry, name);

    debug!(
        class = name,
        slots = slots.len(),
        parents = parents.len(),
        mixins = declarations.mixins.len(),
        "compiled class"
    );

    Ok(ClassDescriptor {
        name: name.to_string(),
        ancestry,
        mixins,
        slots,
        singleton,
        remote,
    })
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|n| n == name) {
        list.push(name.to_string());
    }
}

fn layer_table(class: &str, slots: &mut SlotTable, incoming: &SlotTable) -> Result<()> {
    if slots.is_empty() {
        *slots = incoming.clone();
        return Ok(());
    }
    for slot in incoming.iter() {
        apply(
            class,
            slots,
            Layer {
                name: slot.name(),
                default: slot.default(),
                reactive: Some(slot.is_reactive()),
                merge: slot.merge(),
                ty: Some(slot.value_type()),
                origin: slot.declared_by(),
            },
        )?;
    }
    Ok(())
}

fn apply(class: &str, slots: &mut SlotTable, layer: Layer<'_>) -> Result<()> {
    let Some(existing) = slots.get_mut(layer.name) else {
        let ty = layer.ty.unwrap_or_default();
        if layer.merge == Merge::Additive {
            mergeable(class, layer.name, layer.default)?;
        }
        check_default(class, layer.name, ty, layer.default)?;
        slots.push(ConfigSlot {
            name: layer.name.to_string(),
            default: layer.default.clone(),
            reactive: layer.reactive.unwrap_or(false),
            merge: layer.merge,
            ty,
            declared_by: layer.origin.to_string(),
            overridden_by: None,
        });
        return Ok(());
    };

    let ty = match layer.ty {
        Some(ValueType::Any) | None => existing.ty,
        Some(ty) if existing.ty == ValueType::Any || existing.ty == ty => ty,
        Some(ty) => {
            return Err(CompileError::TypeConflict {
                class: class.to_string(),
                slot: layer.name.to_string(),
                expected: existing.ty.to_string(),
                found: ty.to_string(),
            })
        }
    };

    let merge = if existing.merge == Merge::Additive || layer.merge == Merge::Additive {
        Merge::Additive
    } else {
        Merge::Replace
    };
    let reactive = layer.reactive.unwrap_or(existing.reactive);

    let default = match merge {
        Merge::Replace => layer.default.clone(),
        Merge::Additive => {
            if reactive != existing.reactive {
                return Err(CompileError::ReactiveConflict {
                    class: class.to_string(),
                    slot: layer.name.to_string(),
                });
            }
            let inherited = mergeable(class, layer.name, &existing.default)?;
            let declared = mergeable(class, layer.name, layer.default)?;
            SlotDefault::Value(additive(inherited, declared).ok_or_else(|| {
                CompileError::NonMergeableDefault {
                    class: class.to_string(),
                    slot: layer.name.to_string(),
                    reason: "mixes arrays and maps",
                }
            })?)
        }
    };
    check_default(class, layer.name, ty, &default)?;

    existing.default = default;
    existing.reactive = reactive;
    existing.merge = merge;
    existing.ty = ty;
    existing.overridden_by = Some(layer.origin.to_string());
    Ok(())
}

fn mergeable<'a>(
    class: &str,
    slot: &str,
    default: &'a SlotDefault,
) -> Result<&'a trellis_core::Value> {
    let error = |reason| CompileError::NonMergeableDefault {
        class: class.to_string(),
        slot: slot.to_string(),
        reason,
    };
    match default.literal() {
        None => Err(error("is produced by a function")),
        Some(value) if value.is_array() || value.is_map() => Ok(value),
        Some(_) => Err(error("is neither an array nor a map")),
    }
}

fn check_default(class: &str, slot: &str, ty: ValueType, default: &SlotDefault) -> Result<()> {
    match default.literal() {
        Some(value) if !ty.accepts(value) => Err(CompileError::TypeConflict {
            class: class.to_string(),
            slot: slot.to_string(),
            expected: ty.to_string(),
            found: value.type_name().to_string(),
        }),
        _ => Ok(()),
    }
}
