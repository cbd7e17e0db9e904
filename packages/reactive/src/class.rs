//! A compiled descriptor paired with its hook table.

use std::sync::Arc;

use trellis_config::ClassDescriptor;

use crate::error::{ReactiveError, Result};
use crate::hooks::HookTable;

/// Everything needed to construct instances of one class.
pub struct Class<S> {
    descriptor: Arc<ClassDescriptor>,
    hooks: Arc<HookTable<S>>,
}

impl<S> Class<S> {
    /// Pair a descriptor with its hooks. Every hooked slot must exist and be
    /// reactive.
    pub fn new(descriptor: Arc<ClassDescriptor>, hooks: HookTable<S>) -> Result<Self> {
        validate(&descriptor, &hooks)?;
        Ok(Self {
            descriptor,
            hooks: Arc::new(hooks),
        })
    }

    /// Define a descendant class. Hooks given here override this class's
    /// hooks slot by slot; hooks not overridden are inherited.
    pub fn extend(&self, descriptor: Arc<ClassDescriptor>, hooks: HookTable<S>) -> Result<Self> {
        if !descriptor.is_a(self.name()) {
            return Err(ReactiveError::NotDescendant {
                class: descriptor.name().to_string(),
                parent: self.name().to_string(),
            });
        }
        let mut merged = (*self.hooks).clone();
        merged.overlay(hooks);
        Class::new(descriptor, merged)
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn descriptor(&self) -> &Arc<ClassDescriptor> {
        &self.descriptor
    }

    pub fn hooks(&self) -> &Arc<HookTable<S>> {
        &self.hooks
    }
}

impl<S> Clone for Class<S> {
    fn clone(&self) -> Self {
        Self {
            descriptor: Arc::clone(&self.descriptor),
            hooks: Arc::clone(&self.hooks),
        }
    }
}

impl<S> std::fmt::Debug for Class<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name())
            .field("hooks", &self.hooks)
            .finish()
    }
}

pub(crate) fn validate<S>(descriptor: &ClassDescriptor, hooks: &HookTable<S>) -> Result<()> {
    for slot in hooks.hooked_slots() {
        let reason = match descriptor.slot(slot) {
            None => "no such slot",
            Some(config) if !config.is_reactive() => "slot is not reactive",
            Some(_) => continue,
        };
        return Err(ReactiveError::HookTarget {
            class: descriptor.name().to_string(),
            slot: slot.to_string(),
            reason,
        });
    }
    Ok(())
}
