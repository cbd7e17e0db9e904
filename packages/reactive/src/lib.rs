//! Trellis reactive property runtime
//!
//! Turns a compiled [`ClassDescriptor`](trellis_config::ClassDescriptor) into
//! live [`Instance`]s. Reactive slots run an explicit per-class hook table on
//! assignment:
//!
//! 1. the before-hook receives `(new, old)` and returns the value to store
//! 2. the value is type-checked and stored
//! 3. if it differs from the previous value, the after-hook receives
//!    `(stored, old)`
//!
//! Construction applies the initial config as one batch: raw values first,
//! then before-hooks and after-hooks in slot declaration order, so a hook
//! reading a sibling slot sees its configured value.
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use trellis_config::{ClassRegistry, Declarations};
//! use trellis_core::Value;
//! use trellis_reactive::{Class, HookTable, InstanceFactory};
//!
//! let mut classes = ClassRegistry::new();
//! let descriptor = classes
//!     .register("Map", &[], Declarations::new().slot("zoom_", 8))
//!     .unwrap();
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! let hooks = HookTable::new().after("zoom", move |_, value: &Value, old: Option<&Value>| {
//!     sink.lock().unwrap().push((value.clone(), old.cloned()));
//!     Ok(())
//! });
//! let map = Class::new(descriptor, hooks).unwrap();
//!
//! let factory = InstanceFactory::default();
//! let mut instance = factory.create(&map, Value::Null, ()).unwrap();
//! assert_eq!(instance.get("zoom").unwrap(), Value::from(8));
//! assert!(seen.lock().unwrap().is_empty());
//!
//! instance.set("zoom", 10).unwrap();
//! assert_eq!(
//!     *seen.lock().unwrap(),
//!     vec![(Value::from(10), Some(Value::from(8)))]
//! );
//! ```

mod class;
mod config;
mod error;
mod factory;
mod hooks;
mod instance;

pub use class::Class;
pub use config::ReactiveConfig;
pub use error::{ReactiveError, Result};
pub use factory::{InstanceFactory, Shared};
pub use hooks::{AfterHook, BeforeHook, DestroyHook, HookTable};
pub use instance::{Instance, Owned};
