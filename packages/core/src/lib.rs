//! Core Trellis: values and events
//!
//! Everything that crosses a boundary in Trellis - a config default, a slot
//! value, a bus payload, a remote call argument - is a [`Value`]. This crate
//! provides:
//! - `Value`: a dynamically-typed tree (the universal payload)
//! - `to_value` / `from_value`: typed access through serde
//! - `Observable`: the per-instance publish/subscribe bus
//!
//! # Example
//!
//! ```rust
//! use trellis_core::{Observable, Value};
//!
//! let bus = Observable::new();
//! bus.on("mapCreated", |payload: &[Value]| {
//!     assert_eq!(payload[0], Value::from("m1"));
//!     Ok(())
//! });
//! assert_eq!(bus.fire("mapCreated", &[Value::from("m1")]), 1);
//! ```

mod bus;
mod convert;
mod error;
mod value;

pub use bus::{Handler, Observable, Selector, SubscriptionId};
pub use convert::{from_value, json_to_value, to_value, value_to_json};
pub use error::{Error, Result};
pub use value::Value;
