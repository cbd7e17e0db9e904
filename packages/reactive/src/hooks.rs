//! Per-class hook tables.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use trellis_core::Value;

use crate::error::Result;
use crate::instance::Instance;

/// Runs before a reactive slot is assigned. Receives the incoming value and
/// the current one (`None` during construction) and returns the value to
/// store. Returning the current value leaves the slot unchanged; returning an
/// error aborts the assignment.
pub type BeforeHook<S> =
    Arc<dyn Fn(&mut Instance<S>, Value, Option<&Value>) -> Result<Value> + Send + Sync>;

/// Runs after a reactive slot changed. Receives the stored value and the
/// previous one (`None` during construction).
pub type AfterHook<S> =
    Arc<dyn Fn(&mut Instance<S>, &Value, Option<&Value>) -> Result<()> + Send + Sync>;

/// Runs at the start of teardown, while the instance is still intact.
pub type DestroyHook<S> = Arc<dyn Fn(&mut Instance<S>) -> Result<()> + Send + Sync>;

/// Slot name to hook, filled in explicitly when a class is defined.
pub struct HookTable<S> {
    before: HashMap<String, BeforeHook<S>>,
    after: HashMap<String, AfterHook<S>>,
    destroy: Vec<DestroyHook<S>>,
}

impl<S> HookTable<S> {
    pub fn new() -> Self {
        Self {
            before: HashMap::new(),
            after: HashMap::new(),
            destroy: Vec::new(),
        }
    }

    /// Install the before-hook for a slot, replacing any existing one.
    pub fn before<F>(mut self, slot: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&mut Instance<S>, Value, Option<&Value>) -> Result<Value> + Send + Sync + 'static,
    {
        self.before.insert(slot.into(), Arc::new(hook));
        self
    }

    /// Install the after-hook for a slot, replacing any existing one.
    pub fn after<F>(mut self, slot: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&mut Instance<S>, &Value, Option<&Value>) -> Result<()> + Send + Sync + 'static,
    {
        self.after.insert(slot.into(), Arc::new(hook));
        self
    }

    /// Add a teardown hook. Teardown hooks run in the order they were added,
    /// inherited ones first.
    pub fn on_destroy<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Instance<S>) -> Result<()> + Send + Sync + 'static,
    {
        self.destroy.push(Arc::new(hook));
        self
    }

    pub fn before_hook(&self, slot: &str) -> Option<BeforeHook<S>> {
        self.before.get(slot).cloned()
    }

    pub fn after_hook(&self, slot: &str) -> Option<AfterHook<S>> {
        self.after.get(slot).cloned()
    }

    pub fn destroy_hooks(&self) -> &[DestroyHook<S>] {
        &self.destroy
    }

    /// Slot names that carry at least one hook.
    pub fn hooked_slots(&self) -> impl Iterator<Item = &str> {
        let mut names: Vec<&str> = self
            .before
            .keys()
            .chain(self.after.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names.dedup();
        names.into_iter()
    }

    /// Layer `other` on top of this table: its slot hooks replace ours and
    /// its teardown hooks run after ours.
    pub fn overlay(&mut self, other: HookTable<S>) {
        self.before.extend(other.before);
        self.after.extend(other.after);
        self.destroy.extend(other.destroy);
    }
}

impl<S> Default for HookTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for HookTable<S> {
    fn clone(&self) -> Self {
        Self {
            before: self.before.clone(),
            after: self.after.clone(),
            destroy: self.destroy.clone(),
        }
    }
}

impl<S> fmt::Debug for HookTable<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut before: Vec<&String> = self.before.keys().collect();
        let mut after: Vec<&String> = self.after.keys().collect();
        before.sort();
        after.sort();
        f.debug_struct("HookTable")
            .field("before", &before)
            .field("after", &after)
            .field("destroy", &self.destroy.len())
            .finish()
    }
}
