//! The logic-side map component.
//!
//! A `MapComponent` never touches a map itself. Its reactive slots turn
//! local changes into calls on the `maps` proxy: mounting creates the remote
//! map, moving the center or zoom updates it, and markers pushed into the
//! owned [`MarkerStore`] are added one by one. Nothing is sent while the
//! component is being constructed except what mounting asks for.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;
use trellis_bridge::{PendingCall, RemoteProxy};
use trellis_config::{ClassRegistry, Declarations, SlotDecl, ValueType};
use trellis_core::{from_value, to_value, Value};
use trellis_reactive::{Class, HookTable, Instance, InstanceFactory, ReactiveError};

use crate::error::Result;
use crate::marker_store::{marker_store_class, MarkerStore, LOAD};
use crate::model::{AddMarker, LatLng, MapOptions, MapUpdate, Marker, RemoveMap, DEFAULT_CENTER};

/// Key the owned marker store is held under.
const MARKER_STORE: &str = "markerStore";

/// Host state of a map component instance.
pub struct MapState {
    maps: RemoteProxy,
    factory: InstanceFactory,
    marker_store: Class<()>,
    created: Option<PendingCall>,
}

impl std::fmt::Debug for MapState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapState")
            .field("maps", &self.maps.target())
            .field("creating", &self.created.is_some())
            .finish()
    }
}

/// The compiled classes a map component needs.
#[derive(Debug, Clone)]
pub struct MapClasses {
    map: Class<MapState>,
    marker_store: Class<()>,
}

impl MapClasses {
    /// Compile `Component`, `MarkerStore` and `MapComponent`.
    pub fn register(classes: &mut ClassRegistry) -> Result<Self> {
        let mounted = SlotDecl::new(false).typed(ValueType::Bool);
        classes.register("Component", &[], Declarations::new().declare("mounted_", mounted))?;

        let center = to_value(&DEFAULT_CENTER)?;
        let descriptor = classes.register(
            "MapComponent",
            &["Component"],
            Declarations::new()
                .declare("center_", SlotDecl::new(center).typed(ValueType::Map))
                .declare("zoom_", SlotDecl::new(8).typed(ValueType::Integer))
                .slot("markerStore_", Value::Null)
                .slot("maxZoom", Value::Null)
                .slot("minZoom", Value::Null)
                .declare("zoomControl", SlotDecl::new(true).typed(ValueType::Bool))
                .slot("markerStoreConfig", Value::Null),
        )?;

        let hooks = HookTable::new()
            .before("center", before_center)
            .after("center", after_center)
            .after("zoom", after_zoom)
            .after("mounted", after_mounted)
            .before("markerStore", before_marker_store)
            .after("markerStore", after_marker_store)
            .on_destroy(|map| {
                if !is_mounted(map) {
                    return Ok(());
                }
                remove_map(map, "destroy")
            });

        Ok(Self {
            map: Class::new(descriptor, hooks)?,
            marker_store: marker_store_class(classes)?,
        })
    }

    pub fn map(&self) -> &Class<MapState> {
        &self.map
    }
}

/// A map shown through the `maps` addon.
#[derive(Debug)]
pub struct MapComponent {
    instance: Instance<MapState>,
}

impl MapComponent {
    /// Construct a component talking to the addon through `maps`.
    ///
    /// `config` is the initial slot config, e.g. `{"id": "m1", "zoom": 10}`.
    pub fn create(
        classes: &MapClasses,
        factory: &InstanceFactory,
        maps: RemoteProxy,
        config: Value,
    ) -> Result<Self> {
        let state = MapState {
            maps,
            factory: factory.clone(),
            marker_store: classes.marker_store.clone(),
            created: None,
        };
        let instance = factory.create(&classes.map, config, state)?;
        Ok(Self { instance })
    }

    pub fn id(&self) -> &str {
        self.instance.id()
    }

    pub fn instance(&self) -> &Instance<MapState> {
        &self.instance
    }

    pub fn instance_mut(&mut self) -> &mut Instance<MapState> {
        &mut self.instance
    }

    pub fn mount(&mut self) -> Result<()> {
        self.instance.set("mounted", true)?;
        Ok(())
    }

    pub fn unmount(&mut self) -> Result<()> {
        self.instance.set("mounted", false)?;
        Ok(())
    }

    pub fn set_center(&mut self, center: LatLng) -> Result<()> {
        self.instance.set("center", to_value(&center)?)?;
        Ok(())
    }

    pub fn set_zoom(&mut self, zoom: i64) -> Result<()> {
        self.instance.set("zoom", zoom)?;
        Ok(())
    }

    /// Replace the marker store with one holding `markers`.
    pub fn set_markers(&mut self, markers: &[Marker]) -> Result<()> {
        let items = markers
            .iter()
            .map(to_value)
            .collect::<trellis_core::Result<Vec<_>>>()?;
        self.instance.set("markerStore", Value::Array(items))?;
        Ok(())
    }

    pub fn marker_store(&self) -> Option<&MarkerStore> {
        self.instance.owned(MARKER_STORE)
    }

    pub fn marker_store_mut(&mut self) -> Option<&mut MarkerStore> {
        self.instance.owned_mut(MARKER_STORE)
    }

    /// Wait for the remote map requested by the last mount to exist.
    pub async fn created(&mut self) -> Result<()> {
        if let Some(call) = self.instance.state_mut().created.take() {
            call.await?;
        }
        Ok(())
    }

    /// Remove the remote map if mounted, then the component and its marker
    /// store.
    pub fn destroy(&mut self) {
        self.instance.destroy();
    }
}

fn send<T: Serialize>(
    map: &Instance<MapState>,
    slot: &str,
    method: &str,
    arg: &T,
) -> trellis_reactive::Result<PendingCall> {
    map.state()
        .maps
        .call_with(method, arg)
        .map_err(|e| ReactiveError::hook(slot, e))
}

fn before_center(
    _map: &mut Instance<MapState>,
    value: Value,
    _old: Option<&Value>,
) -> trellis_reactive::Result<Value> {
    from_value::<LatLng>(value.clone())
        .map_err(|e| ReactiveError::rejected("center", e.to_string()))?;
    Ok(value)
}

fn after_center(
    map: &mut Instance<MapState>,
    value: &Value,
    old: Option<&Value>,
) -> trellis_reactive::Result<()> {
    if old.is_none() {
        return Ok(());
    }
    let update = MapUpdate {
        id: map.id().to_string(),
        value: from_value::<LatLng>(value.clone())?,
    };
    send(map, "center", "setCenter", &update).map(drop)
}

fn after_zoom(
    map: &mut Instance<MapState>,
    value: &Value,
    old: Option<&Value>,
) -> trellis_reactive::Result<()> {
    if old.is_none() {
        return Ok(());
    }
    let update = MapUpdate {
        id: map.id().to_string(),
        value: from_value::<i64>(value.clone())?,
    };
    send(map, "zoom", "setZoom", &update).map(drop)
}

fn after_mounted(
    map: &mut Instance<MapState>,
    value: &Value,
    old: Option<&Value>,
) -> trellis_reactive::Result<()> {
    match value.as_bool() {
        Some(true) => {
            let options = map_options(map)?;
            let call = send(map, "mounted", "create", &options)?;
            map.state_mut().created = Some(call);
            Ok(())
        }
        Some(false) if old.is_some() => remove_map(map, "mounted"),
        _ => Ok(()),
    }
}

fn map_options(map: &mut Instance<MapState>) -> trellis_reactive::Result<MapOptions> {
    Ok(MapOptions {
        id: map.id().to_string(),
        center: from_value(map.get("center")?)?,
        max_zoom: from_value(map.get("maxZoom")?)?,
        min_zoom: from_value(map.get("minZoom")?)?,
        zoom: from_value(map.get("zoom")?)?,
        zoom_control: from_value(map.get("zoomControl")?)?,
    })
}

// Unmounting already removed the remote map, and an unmounted map never had one.
fn is_mounted(map: &Instance<MapState>) -> bool {
    map.peek("mounted").and_then(Value::as_bool) == Some(true)
}

fn remove_map(map: &mut Instance<MapState>, slot: &str) -> trellis_reactive::Result<()> {
    let remove = RemoveMap {
        map_id: map.id().to_string(),
    };
    send(map, slot, "removeMap", &remove).map(drop)
}

/// Builds the owned store the slot stands for and stores its id in the slot.
///
/// An item array becomes the store's `items`; a map is taken as the full
/// store config. Either is layered over `markerStoreConfig`. `null` drops the
/// store.
fn before_marker_store(
    map: &mut Instance<MapState>,
    value: Value,
    _old: Option<&Value>,
) -> trellis_reactive::Result<Value> {
    let mut config = match map.get("markerStoreConfig")? {
        Value::Map(config) => config,
        Value::Null => BTreeMap::new(),
        other => {
            return Err(ReactiveError::rejected(
                "markerStore",
                format!("markerStoreConfig must be a map, found {}", other.type_name()),
            ))
        }
    };
    let replacement = match value {
        Value::Null => false,
        Value::Array(items) => {
            config.insert("items".to_string(), Value::Array(items));
            true
        }
        Value::Map(store) => {
            config.extend(store);
            true
        }
        other => {
            return Err(ReactiveError::rejected(
                "markerStore",
                format!("expected marker items or a store config, found {}", other.type_name()),
            ))
        }
    };

    if let Some(previous) = map.owned::<MarkerStore>(MARKER_STORE) {
        let bus = previous.bus().clone();
        map.stop_listening(&bus);
    }
    if !replacement {
        map.destroy_child(MARKER_STORE);
        return Ok(Value::Null);
    }

    let store = {
        let state = map.state();
        state
            .factory
            .create(&state.marker_store, Value::Map(config), ())?
    };
    let store_id = store.id().to_string();
    debug!(map = %map.id(), store = %store_id, "marker store replaced");
    map.adopt(MARKER_STORE, Box::new(store));
    Ok(Value::from(store_id))
}

/// Pushes the store's markers now and whenever it loads again.
fn after_marker_store(
    map: &mut Instance<MapState>,
    _value: &Value,
    _old: Option<&Value>,
) -> trellis_reactive::Result<()> {
    let Some(store) = map.owned_mut::<MarkerStore>(MARKER_STORE) else {
        return Ok(());
    };
    let bus = store.bus().clone();
    let items = store.get("items")?;

    let maps = map.state().maps.clone();
    let map_id = map.id().to_string();
    map.listen(&bus, LOAD, move |payload: &[Value]| {
        let items = payload.first().cloned().unwrap_or_default();
        add_markers(&maps, &map_id, &items)
            .map(drop)
            .map_err(|e| trellis_core::Error::other(e.to_string()))
    });

    add_markers(&map.state().maps, map.id(), &items)
        .map(drop)
        .map_err(|e| ReactiveError::hook("markerStore", e))
}

fn add_markers(maps: &RemoteProxy, map_id: &str, items: &Value) -> trellis_bridge::Result<usize> {
    let items = items.as_array().unwrap_or_default();
    for item in items {
        let marker: Marker = from_value(item.clone())?;
        let add = AddMarker {
            map_id: map_id.to_string(),
            marker,
        };
        maps.notify("addMarker", vec![to_value(&add)?])?;
    }
    Ok(items.len())
}
