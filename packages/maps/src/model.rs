//! Payloads exchanged between the map component and the maps addon.

use serde::{Deserialize, Serialize};

/// A geographic position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Where a map is centered until told otherwise.
pub const DEFAULT_CENTER: LatLng = LatLng::new(-34.397, 150.644);

/// Arguments of `create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapOptions {
    pub id: String,
    pub center: LatLng,
    #[serde(default)]
    pub max_zoom: Option<i64>,
    #[serde(default)]
    pub min_zoom: Option<i64>,
    pub zoom: i64,
    #[serde(default = "zoom_control_default")]
    pub zoom_control: bool,
}

fn zoom_control_default() -> bool {
    true
}

/// One marker as held by a marker store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: String,
    pub position: LatLng,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Marker {
    pub fn new(id: impl Into<String>, position: LatLng) -> Self {
        Self {
            id: id.into(),
            position,
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Arguments of `addMarker`: a marker plus the map it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMarker {
    pub map_id: String,
    #[serde(flatten)]
    pub marker: Marker,
}

/// Arguments of `setCenter` and `setZoom`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapUpdate<T> {
    pub id: String,
    pub value: T,
}

/// Arguments of `removeMap`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveMap {
    pub map_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn add_marker_is_flat_on_the_wire() {
        let add = AddMarker {
            map_id: "m1".to_string(),
            marker: Marker::new("k1", LatLng::new(1.0, 2.0)),
        };
        assert_eq!(
            serde_json::to_value(&add).unwrap(),
            json!({"mapId": "m1", "id": "k1", "position": {"lat": 1.0, "lng": 2.0}})
        );
    }

    #[test]
    fn options_fill_optional_fields() {
        let options: MapOptions = serde_json::from_value(json!({
            "id": "m1",
            "center": {"lat": 0, "lng": 0},
            "zoom": 8
        }))
        .unwrap();
        assert!(options.zoom_control);
        assert_eq!(options.max_zoom, None);
        assert_eq!(options.center, LatLng::new(0.0, 0.0));
    }
}
