//! The privileged-context maps addon.
//!
//! Keeps every map and marker in memory in place of a third-party map API.
//! Methods that address a map which does not exist yet reply not-ready with
//! the map id; `create` fires that id once the map exists, so they run then.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;
use trellis_bridge::{arg, Addon, AddonError, AddonRegistry, Reply, Scope};
use trellis_config::{ClassRegistry, Declarations};
use trellis_core::Value;

use crate::error::Result;
use crate::model::{AddMarker, LatLng, MapOptions, MapUpdate, Marker, RemoveMap};

/// Target name the addon registers under.
pub const TARGET: &str = "maps";

/// Methods the application context may call.
pub const METHODS: [&str; 5] = ["addMarker", "create", "removeMap", "setCenter", "setZoom"];

#[derive(Debug, Default)]
struct MapsState {
    maps: BTreeMap<String, MapOptions>,
    markers: BTreeMap<String, BTreeMap<String, Marker>>,
}

fn lock(state: &Mutex<MapsState>) -> MutexGuard<'_, MapsState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The `maps` target.
#[derive(Debug, Default)]
pub struct MapsAddon {
    state: Arc<Mutex<MapsState>>,
}

impl MapsAddon {
    pub fn new() -> Self {
        Self::default()
    }

    /// A read-only view of the addon's maps that stays valid after the
    /// addon moves into a registry.
    pub fn inspector(&self) -> MapsInspector {
        MapsInspector {
            state: Arc::clone(&self.state),
        }
    }

    /// The addon's class declarations: a singleton exposing [`METHODS`] to
    /// the `app` context.
    pub fn declarations() -> Declarations {
        Declarations::new().singleton(true).remote("app", METHODS)
    }

    /// Compile the addon's class and register the addon under [`TARGET`].
    pub fn register(self, classes: &mut ClassRegistry, addons: &mut AddonRegistry) -> Result<()> {
        let descriptor = classes.register("MapsAddon", &[], Self::declarations())?;
        addons.register_class(TARGET, &descriptor, self)?;
        Ok(())
    }

    fn state(&self) -> MutexGuard<'_, MapsState> {
        lock(&self.state)
    }

    fn create(&mut self, scope: &mut Scope<'_>, options: MapOptions) -> Reply {
        let id = options.id.clone();
        debug!(map = %id, zoom = options.zoom, "map created");
        self.state().maps.insert(id.clone(), options);
        scope.ready(&id);
        Reply::Value(Value::from(id))
    }

    fn add_marker(&mut self, add: AddMarker) -> Reply {
        let mut state = self.state();
        if !state.maps.contains_key(&add.map_id) {
            return Reply::not_ready(add.map_id);
        }
        let id = add.marker.id.clone();
        state
            .markers
            .entry(add.map_id)
            .or_default()
            .insert(id.clone(), add.marker);
        Reply::Value(Value::from(id))
    }

    fn update<T>(&mut self, update: MapUpdate<T>, apply: impl FnOnce(&mut MapOptions, T)) -> Reply {
        let mut state = self.state();
        let Some(options) = state.maps.get_mut(&update.id) else {
            return Reply::not_ready(update.id);
        };
        apply(options, update.value);
        Reply::Value(Value::Null)
    }

    fn remove_map(&mut self, remove: RemoveMap) -> Reply {
        let mut state = self.state();
        let existed = state.maps.remove(&remove.map_id).is_some();
        let markers = state.markers.remove(&remove.map_id).map_or(0, |m| m.len());
        debug!(map = %remove.map_id, existed, markers, "map removed");
        Reply::Value(Value::from(existed))
    }
}

impl Addon for MapsAddon {
    fn invoke(
        &mut self,
        scope: &mut Scope<'_>,
        method: &str,
        args: &[Value],
    ) -> std::result::Result<Reply, AddonError> {
        let reply = match method {
            "create" => self.create(scope, arg(method, args, 0)?),
            "addMarker" => self.add_marker(arg(method, args, 0)?),
            "setCenter" => {
                let update: MapUpdate<LatLng> = arg(method, args, 0)?;
                self.update(update, |options, center| options.center = center)
            }
            "setZoom" => {
                let update: MapUpdate<i64> = arg(method, args, 0)?;
                self.update(update, |options, zoom| options.zoom = zoom)
            }
            "removeMap" => self.remove_map(arg(method, args, 0)?),
            other => return Err(AddonError::NoSuchMethod(other.to_string())),
        };
        Ok(reply)
    }
}

/// Shared view of a [`MapsAddon`]'s tables.
#[derive(Debug, Clone)]
pub struct MapsInspector {
    state: Arc<Mutex<MapsState>>,
}

impl MapsInspector {
    pub fn map(&self, id: &str) -> Option<MapOptions> {
        lock(&self.state).maps.get(id).cloned()
    }

    pub fn map_ids(&self) -> Vec<String> {
        lock(&self.state).maps.keys().cloned().collect()
    }

    /// Markers on a map, ordered by marker id.
    pub fn markers(&self, map_id: &str) -> Vec<Marker> {
        lock(&self.state)
            .markers
            .get(map_id)
            .map(|markers| markers.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether any marker table exists for the map.
    pub fn has_markers(&self, map_id: &str) -> bool {
        lock(&self.state).markers.contains_key(map_id)
    }
}
