//! Geofence records
//!
//! Geofences round-trip: `from_api` normalizes the vendor's nested
//! location shape, `to_api_payload` emits the wire shape expected by
//! create/update requests.

use serde::Serialize;
use serde_json::{json, Map, Value};

use super::parse::{assemble_address, optional_bool, optional_f64, optional_string, pick};

/// A circular geofence attached to an asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Geofence {
    pub id: Option<String>,
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Radius in meters.
    pub radius: Option<f64>,
    pub address: Option<String>,
    pub active: Option<bool>,
    /// 由发起调用的一方补上，报文里不一定有
    pub asset_id: Option<String>,
}

impl Geofence {
    /// Normalize a geofence payload.
    pub fn from_api(data: &Value, asset_id: Option<&str>) -> Self {
        let location = data.get("location");
        let coords = data
            .get("coordinates")
            .or_else(|| location.and_then(|l| l.get("coordinates")));

        let find_coord = |keys: &[&str]| {
            pick(data, keys).or_else(|| coords.and_then(|c| pick(c, keys)))
        };

        let address = pick(data, &["address"])
            .and_then(assemble_address)
            .or_else(|| {
                location
                    .and_then(|l| pick(l, &["address"]))
                    .and_then(assemble_address)
            });

        Geofence {
            id: optional_string(pick(data, &["id", "geofenceId"])),
            name: optional_string(pick(data, &["name", "label"])),
            latitude: optional_f64(find_coord(&["latitude", "lat"])),
            longitude: optional_f64(find_coord(&["longitude", "lng"])),
            radius: optional_f64(
                pick(data, &["radius"]).or_else(|| location.and_then(|l| pick(l, &["radius"]))),
            ),
            address,
            active: optional_bool(pick(data, &["active", "enabled"])),
            asset_id: asset_id
                .map(str::to_string)
                .or_else(|| optional_string(pick(data, &["assetId"]))),
        }
    }

    /// Wire shape for create/update requests.
    pub fn to_api_payload(&self) -> Value {
        let mut coordinates = Map::new();
        if let Some(lat) = self.latitude {
            coordinates.insert("lat".to_string(), json!(lat));
        }
        if let Some(lng) = self.longitude {
            coordinates.insert("lng".to_string(), json!(lng));
        }

        let mut location = Map::new();
        if !coordinates.is_empty() {
            location.insert("coordinates".to_string(), Value::Object(coordinates));
        }
        if let Some(radius) = self.radius {
            location.insert("radius".to_string(), json!(radius));
        }
        if let Some(address) = &self.address {
            location.insert("address".to_string(), json!({ "line1": address }));
        }

        let mut payload = Map::new();
        if let Some(name) = &self.name {
            payload.insert("name".to_string(), json!(name));
        }
        if !location.is_empty() {
            payload.insert("location".to_string(), Value::Object(location));
        }
        if let Some(active) = self.active {
            payload.insert("active".to_string(), json!(active));
        }

        Value::Object(payload)
    }
}

/// Partial geofence update; unset fields are left untouched server-side.
#[derive(Debug, Clone, Default)]
pub struct GeofenceUpdate {
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius: Option<f64>,
    pub address: Option<String>,
    pub active: Option<bool>,
}

impl GeofenceUpdate {
    /// Wire shape for the update request, `None` when nothing is set.
    pub fn to_api_payload(&self) -> Option<Value> {
        let mut payload = Map::new();
        if let Some(name) = &self.name {
            payload.insert("name".to_string(), json!(name));
        }
        if let Some(active) = self.active {
            payload.insert("active".to_string(), json!(active));
        }

        let mut location = Map::new();
        let mut coordinates = Map::new();
        if let Some(lat) = self.latitude {
            coordinates.insert("lat".to_string(), json!(lat));
        }
        if let Some(lng) = self.longitude {
            coordinates.insert("lng".to_string(), json!(lng));
        }
        if !coordinates.is_empty() {
            location.insert("coordinates".to_string(), Value::Object(coordinates));
        }
        if let Some(radius) = self.radius {
            location.insert("radius".to_string(), json!(radius));
        }
        if let Some(address) = &self.address {
            location.insert("address".to_string(), json!({ "line1": address }));
        }
        if !location.is_empty() {
            payload.insert("location".to_string(), Value::Object(location));
        }

        if payload.is_empty() {
            None
        } else {
            Some(Value::Object(payload))
        }
    }
}
