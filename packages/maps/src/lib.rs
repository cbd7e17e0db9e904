//! Trellis maps
//!
//! A map wrapper split across the bridge:
//! - [`MapsAddon`] runs in the privileged context as the `maps` target and
//!   owns every map and marker.
//! - [`MapComponent`] runs in a logic context. It holds only a proxy for the
//!   addon and turns its reactive slot changes into remote calls.
//!
//! Markers may be pushed before their map exists; the addon holds them back
//! until `create` for that map has run.

mod addon;
mod component;
mod error;
mod marker_store;
mod model;

pub use addon::{MapsAddon, MapsInspector, METHODS, TARGET};
pub use component::{MapClasses, MapComponent, MapState};
pub use error::{MapsError, Result};
pub use marker_store::{marker_store_class, MarkerStore, LOAD};
pub use model::{AddMarker, LatLng, MapOptions, MapUpdate, Marker, RemoveMap, DEFAULT_CENTER};
