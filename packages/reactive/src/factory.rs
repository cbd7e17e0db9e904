//! Instance construction.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;
use trellis_core::Value;

use crate::class::Class;
use crate::config::ReactiveConfig;
use crate::error::{ReactiveError, Result};
use crate::instance::Instance;

/// A singleton instance, shared by everyone who asks for it.
pub type Shared<S> = Arc<Mutex<Instance<S>>>;

type SingletonTable = HashMap<String, Arc<dyn Any + Send + Sync>>;

/// Builds instances and keeps the singleton table.
///
/// Cloning the factory yields another handle to the same id counter and
/// singleton table, so hooks can hold one to build owned children.
#[derive(Clone)]
pub struct InstanceFactory {
    config: Arc<ReactiveConfig>,
    counter: Arc<AtomicU64>,
    singletons: Arc<Mutex<SingletonTable>>,
}

impl InstanceFactory {
    pub fn new(config: ReactiveConfig) -> Self {
        Self {
            config: Arc::new(config),
            counter: Arc::new(AtomicU64::new(0)),
            singletons: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &ReactiveConfig {
        &self.config
    }

    /// Construct an instance from an initial config map.
    ///
    /// All configured values are stored raw first. Before-hooks then run in
    /// slot declaration order and see every sibling at its configured value,
    /// and after-hooks follow in the same order with no previous value. Slots left unconfigured keep their defaults and run no
    /// hooks. An `id` string in the config names the instance; otherwise an
    /// id is generated.
    ///
    /// The first failing hook aborts construction. Slots already stored are
    /// not rolled back; the partial instance is dropped.
    pub fn create<S>(&self, class: &Class<S>, config: Value, state: S) -> Result<Instance<S>> {
        if class.descriptor().is_singleton() {
            return Err(ReactiveError::SingletonClass {
                class: class.name().to_string(),
            });
        }
        self.construct(class, config, state)
    }

    /// The one instance of a singleton class, constructed on first request.
    /// Later requests ignore `config` and `state`.
    pub fn singleton<S>(&self, class: &Class<S>, config: Value, state: S) -> Result<Shared<S>>
    where
        S: Send + 'static,
    {
        let name = class.name();
        if !class.descriptor().is_singleton() {
            return Err(ReactiveError::NotSingleton {
                class: name.to_string(),
            });
        }
        if let Some(existing) = self.table().get(name).cloned() {
            return downcast(name, existing);
        }

        // Built without holding the table lock; hooks may ask for other singletons.
        let built: Shared<S> = Arc::new(Mutex::new(self.construct(class, config, state)?));
        let entry = Arc::clone(
            self.table()
                .entry(name.to_string())
                .or_insert_with(|| built as Arc<dyn Any + Send + Sync>),
        );
        downcast(name, entry)
    }

    /// Whether a singleton of this class has been constructed.
    pub fn has_singleton(&self, class: &str) -> bool {
        self.table().contains_key(class)
    }

    fn construct<S>(&self, class: &Class<S>, config: Value, state: S) -> Result<Instance<S>> {
        let mut entries = match config {
            Value::Null => Default::default(),
            Value::Map(entries) => entries,
            other => {
                return Err(ReactiveError::InvalidConfig {
                    class: class.name().to_string(),
                    found: other.type_name(),
                })
            }
        };

        let id = match entries.get("id") {
            Some(Value::String(id)) => id.clone(),
            _ => self.next_id(),
        };
        if !class.descriptor().slots().contains("id") {
            entries.remove("id");
        }

        let mut instance = Instance::new(id, class, self.config.max_hook_depth, state);
        let batch = instance.resolve_batch(entries)?;
        instance.initialize(batch)?;
        debug!(class = class.name(), instance = instance.id(), "constructed");
        Ok(instance)
    }

    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}", self.config.id_prefix, n)
    }

    fn table(&self) -> MutexGuard<'_, SingletonTable> {
        self.singletons.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InstanceFactory {
    fn default() -> Self {
        Self::new(ReactiveConfig::default())
    }
}

impl std::fmt::Debug for InstanceFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceFactory")
            .field("config", &self.config)
            .field("singletons", &self.table().len())
            .finish()
    }
}

fn downcast<S: Send + 'static>(class: &str, entry: Arc<dyn Any + Send + Sync>) -> Result<Shared<S>> {
    entry
        .downcast::<Mutex<Instance<S>>>()
        .map_err(|_| ReactiveError::SingletonMismatch {
            class: class.to_string(),
        })
}
