//! Instances: slot values, hooks, owned children and teardown.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};
use trellis_config::{ClassDescriptor, ConfigSlot};
use trellis_core::{Observable, Selector, SubscriptionId, Value};

use crate::class::Class;
use crate::error::{ReactiveError, Result};
use crate::hooks::HookTable;

/// A sub-instance owned by another instance and destroyed with it.
pub trait Owned: Any + Send {
    fn owned_id(&self) -> &str;

    fn destroy_owned(&mut self);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A constructed object whose schema is its class's slot table.
///
/// `S` is host state carried next to the slots, reachable from hooks.
pub struct Instance<S> {
    id: String,
    descriptor: Arc<ClassDescriptor>,
    hooks: Arc<HookTable<S>>,
    // `None` until assigned or first read.
    values: Vec<Option<Value>>,
    explicit: Vec<bool>,
    bus: Observable,
    owned: BTreeMap<String, Box<dyn Owned>>,
    listening: Vec<(Observable, SubscriptionId)>,
    depth: usize,
    max_depth: usize,
    destroyed: bool,
    state: S,
}

impl<S> Instance<S> {
    pub(crate) fn new(id: String, class: &Class<S>, max_depth: usize, state: S) -> Self {
        let slots = class.descriptor().slots().len();
        Self {
            id,
            descriptor: Arc::clone(class.descriptor()),
            hooks: Arc::clone(class.hooks()),
            values: vec![None; slots],
            explicit: vec![false; slots],
            bus: Observable::new(),
            owned: BTreeMap::new(),
            listening: Vec::new(),
            depth: 0,
            max_depth,
            destroyed: false,
            state,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn class(&self) -> &ClassDescriptor {
        &self.descriptor
    }

    /// This instance's own bus.
    pub fn bus(&self) -> &Observable {
        &self.bus
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Hooks for this instance only. The first call detaches the table from
    /// the class, so later changes do not affect other instances.
    pub fn hooks_mut(&mut self) -> &mut HookTable<S> {
        Arc::make_mut(&mut self.hooks)
    }

    /// Current value of a slot. A slot never assigned yields its default,
    /// which is produced once and cached. Reading never runs hooks.
    pub fn get(&mut self, slot: &str) -> Result<Value> {
        self.ensure_alive()?;
        let index = self.index_of(slot)?;
        Ok(self.materialize(index).clone())
    }

    /// The stored value of a slot, without producing a default.
    pub fn peek(&self, slot: &str) -> Option<&Value> {
        let index = self.descriptor.slots().position(slot)?;
        self.values[index].as_ref()
    }

    /// Whether a slot has been assigned at least once.
    pub fn is_set(&self, slot: &str) -> bool {
        self.descriptor
            .slots()
            .position(slot)
            .is_some_and(|index| self.explicit[index])
    }

    /// Assign a slot. Returns whether the stored value changed.
    ///
    /// For reactive slots the before-hook runs first and decides the value
    /// stored; the after-hook runs only when that value differs from the
    /// previous one. A failing before-hook leaves the slot untouched.
    pub fn set(&mut self, slot: &str, value: impl Into<Value>) -> Result<bool> {
        self.ensure_alive()?;
        let index = self.index_of(slot)?;
        self.enter(slot)?;
        let result = self.assign(index, value.into());
        self.depth -= 1;
        result
    }

    /// Assign several slots as one batch. Every raw value is stored first,
    /// then before-hooks run in slot declaration order, then after-hooks. A
    /// rejected slot and the slots after it keep their previous values.
    pub fn set_many<I, K>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        self.ensure_alive()?;
        let batch = self.resolve_batch(values)?;
        self.enter("*")?;
        let result = self.apply_batch(batch, false);
        self.depth -= 1;
        result
    }

    /// Run the initial-config batch of a freshly constructed instance.
    pub(crate) fn initialize(&mut self, batch: Vec<(usize, Value)>) -> Result<()> {
        self.enter("*")?;
        let result = self.apply_batch(batch, true);
        self.depth -= 1;
        result
    }

    pub(crate) fn resolve_batch<I, K>(&self, values: I) -> Result<Vec<(usize, Value)>>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mut batch = values
            .into_iter()
            .map(|(slot, value)| Ok((self.index_of(slot.as_ref())?, value)))
            .collect::<Result<Vec<_>>>()?;
        batch.sort_by_key(|(index, _)| *index);
        Ok(batch)
    }

    fn apply_batch(&mut self, batch: Vec<(usize, Value)>, initial: bool) -> Result<()> {
        // Every incoming value is stored raw first, so a before-hook reading a
        // sibling sees what the batch brings for it.
        let mut staged = Vec::with_capacity(batch.len());
        for (index, value) in batch {
            let old = if initial {
                None
            } else {
                Some(self.materialize(index).clone())
            };
            staged.push(Staged {
                index,
                explicit: self.explicit[index],
                old,
            });
            self.store(index, value);
        }

        let mut changed: Vec<(usize, Option<Value>)> = Vec::new();
        let mut pending = staged.into_iter();
        while let Some(entry) = pending.next() {
            match self.settle(entry.index, entry.old.as_ref()) {
                Ok(true) => changed.push((entry.index, entry.old)),
                Ok(false) => {}
                Err(error) => {
                    self.unstage(entry);
                    for rest in pending.by_ref() {
                        self.unstage(rest);
                    }
                    return Err(error);
                }
            }
        }

        for (index, old) in changed {
            let slot = self.slot_at(index)?;
            let value = self.values[index].clone().unwrap_or_default();
            self.run_after(slot.name(), &value, old.as_ref())?;
        }
        Ok(())
    }

    /// Runs the before-hook on a staged raw value and stores the result.
    /// Returns whether a reactive slot changed.
    fn settle(&mut self, index: usize, old: Option<&Value>) -> Result<bool> {
        let slot = self.slot_at(index)?;
        let raw = self.values[index].clone().unwrap_or_default();
        let value = if slot.is_reactive() {
            self.run_before(slot.name(), raw, old)?
        } else {
            raw
        };
        check_type(&slot, &value)?;

        let differs = old != Some(&value);
        self.store(index, value);
        Ok(slot.is_reactive() && differs)
    }

    fn unstage(&mut self, entry: Staged) {
        self.values[entry.index] = entry.old;
        self.explicit[entry.index] = entry.explicit;
    }

    fn assign(&mut self, index: usize, value: Value) -> Result<bool> {
        let slot = self.slot_at(index)?;
        let old = self.materialize(index).clone();

        if !slot.is_reactive() {
            check_type(&slot, &value)?;
            let differs = value != old;
            self.store(index, value);
            return Ok(differs);
        }

        let value = self.run_before(slot.name(), value, Some(&old))?;
        check_type(&slot, &value)?;
        let differs = value != old;
        self.store(index, value.clone());
        if differs {
            self.run_after(slot.name(), &value, Some(&old))?;
        }
        Ok(differs)
    }

    fn run_before(&mut self, slot: &str, value: Value, old: Option<&Value>) -> Result<Value> {
        let Some(hook) = self.hooks.before_hook(slot) else {
            return Ok(value);
        };
        hook(self, value, old).map_err(|error| {
            warn!(instance = %self.id, slot, %error, "before hook rejected assignment");
            error
        })
    }

    fn run_after(&mut self, slot: &str, value: &Value, old: Option<&Value>) -> Result<()> {
        let Some(hook) = self.hooks.after_hook(slot) else {
            return Ok(());
        };
        hook(self, value, old).map_err(|error| {
            warn!(instance = %self.id, slot, %error, "after hook failed");
            error
        })
    }

    fn enter(&mut self, slot: &str) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(ReactiveError::DepthExceeded {
                slot: slot.to_string(),
                limit: self.max_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn store(&mut self, index: usize, value: Value) {
        self.values[index] = Some(value);
        self.explicit[index] = true;
    }

    fn materialize(&mut self, index: usize) -> &Value {
        let descriptor = &self.descriptor;
        self.values[index].get_or_insert_with(|| {
            descriptor
                .slots()
                .at(index)
                .map(|slot| slot.default().produce())
                .unwrap_or_default()
        })
    }

    // Cloned so hooks may borrow the instance mutably.
    fn slot_at(&self, index: usize) -> Result<ConfigSlot> {
        self.descriptor
            .slots()
            .at(index)
            .cloned()
            .ok_or_else(|| ReactiveError::UnknownSlot {
                class: self.descriptor.name().to_string(),
                slot: format!("#{}", index),
            })
    }

    fn index_of(&self, slot: &str) -> Result<usize> {
        self.descriptor
            .slots()
            .position(slot)
            .ok_or_else(|| ReactiveError::UnknownSlot {
                class: self.descriptor.name().to_string(),
                slot: slot.to_string(),
            })
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.destroyed {
            return Err(ReactiveError::Destroyed {
                id: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Subscribe to another bus on behalf of this instance. The subscription
    /// is removed when this instance is destroyed.
    pub fn listen<F>(&mut self, bus: &Observable, topic: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&[Value]) -> trellis_core::Result<()> + Send + Sync + 'static,
    {
        let id = bus.on_owned(self.id.clone(), topic, handler);
        self.listening.push((bus.clone(), id));
        id
    }

    /// Drop every subscription this instance made on `bus`.
    pub fn stop_listening(&mut self, bus: &Observable) -> usize {
        let removed = bus.un(Selector::Owner(self.id.clone()));
        self.listening
            .retain(|(listened, _)| !listened.same_bus(bus));
        removed
    }

    /// Take ownership of a child. Any child previously held under `key` is
    /// destroyed.
    pub fn adopt(&mut self, key: impl Into<String>, child: Box<dyn Owned>) {
        let key = key.into();
        debug!(instance = %self.id, key, child = child.owned_id(), "adopting child");
        if let Some(mut previous) = self.owned.insert(key, child) {
            previous.destroy_owned();
        }
    }

    pub fn owned<T: Owned>(&self, key: &str) -> Option<&T> {
        self.owned.get(key)?.as_any().downcast_ref()
    }

    pub fn owned_mut<T: Owned>(&mut self, key: &str) -> Option<&mut T> {
        self.owned.get_mut(key)?.as_any_mut().downcast_mut()
    }

    /// Give up ownership of a child without destroying it.
    pub fn release(&mut self, key: &str) -> Option<Box<dyn Owned>> {
        self.owned.remove(key)
    }

    /// Destroy the child held under `key`, if any.
    pub fn destroy_child(&mut self, key: &str) -> bool {
        match self.owned.remove(key) {
            Some(mut child) => {
                child.destroy_owned();
                true
            }
            None => false,
        }
    }

    /// Tear the instance down.
    ///
    /// Teardown hooks run first, while slots and children are intact, so
    /// remote cleanup goes out before local state is released. A failing
    /// hook is logged and teardown continues. Destroying twice is a no-op.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }

        let hooks: Vec<_> = self.hooks.destroy_hooks().to_vec();
        for hook in hooks {
            if let Err(error) = hook(self) {
                warn!(instance = %self.id, %error, "destroy hook failed");
            }
        }

        for (_, mut child) in std::mem::take(&mut self.owned) {
            child.destroy_owned();
        }
        for (bus, id) in std::mem::take(&mut self.listening) {
            bus.un(id);
        }
        self.bus.clear();
        self.destroyed = true;
        debug!(instance = %self.id, class = self.descriptor.name(), "destroyed");
    }
}

impl<S: Send + 'static> Owned for Instance<S> {
    fn owned_id(&self) -> &str {
        &self.id
    }

    fn destroy_owned(&mut self) {
        self.destroy();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<S> std::fmt::Debug for Instance<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("class", &self.descriptor.name())
            .field("values", &self.values)
            .field("owned", &self.owned.keys().collect::<Vec<_>>())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

/// A batch slot holding its raw value, with what to restore if it fails.
struct Staged {
    index: usize,
    explicit: bool,
    old: Option<Value>,
}

fn check_type(slot: &ConfigSlot, value: &Value) -> Result<()> {
    if slot.value_type().accepts(value) {
        return Ok(());
    }
    Err(ReactiveError::InvalidType {
        slot: slot.name().to_string(),
        expected: slot.value_type(),
        found: value.type_name(),
    })
}
