//! Trellis config compiler
//!
//! A class in Trellis is nothing but a [`ClassDescriptor`]: a name, an
//! ancestry, and a flat table of config slots. Descriptors are composed, not
//! inherited: [`compose`] takes the ordered parent descriptors plus the new
//! class's [`Declarations`] and returns one merged table.
//!
//! Merge rules, applied root to leaf:
//! - a slot declared again replaces the inherited default (leaf wins) but
//!   keeps its position and identity
//! - slots marked additive (and the reserved `remote` and `mixins` keys)
//!   merge by union instead of replacement
//! - a trailing `_` on a declared key marks the slot reactive (`zoom_`)
//!
//! ```rust
//! use trellis_config::{ClassRegistry, Declarations};
//!
//! let mut classes = ClassRegistry::new();
//! classes
//!     .register("Component", &[], Declarations::new().slot("mounted_", false))
//!     .unwrap();
//! let map = classes
//!     .register("Map", &["Component"], Declarations::new().slot("zoom_", 8))
//!     .unwrap();
//!
//! let names: Vec<_> = map.slots().iter().map(|s| s.name()).collect();
//! assert_eq!(names, ["mounted", "zoom"]);
//! ```

mod compile;
mod declarations;
mod error;
mod manifest;
mod merge;
mod registry;
mod slot;

pub use compile::{compose, ClassDescriptor};
pub use declarations::{Declarations, SlotDecl, RESERVED_KEYS};
pub use error::{CompileError, Result};
pub use manifest::RemoteManifest;
pub use merge::additive;
pub use registry::ClassRegistry;
pub use slot::{ConfigSlot, Merge, SlotDefault, SlotTable, ValueType};
