//! Device and vehicle records
//!
//! Whether a payload is a plain tracker or a vehicle is decided exactly
//! once, at parse time, by [`AssetRecord::classify`]; everything
//! downstream matches on the tagged record instead of re-checking for a
//! VIN.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::parse::{optional_f64, optional_i64, optional_string, parse_timestamp, pick};

/// A tracked device.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceInfo {
    /// Vendor asset id. Empty string when the payload carried none.
    pub id: String,
    pub name: Option<String>,
    pub status: Option<String>,
    pub device_type: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl DeviceInfo {
    /// Normalize a device payload. Total: malformed fields degrade to
    /// `None`, an absent id to the empty string.
    pub fn from_api(data: &Value) -> Self {
        let attributes = data.get("attributes");

        DeviceInfo {
            id: optional_string(pick(data, &["id", "device_id", "deviceId", "assetId"]))
                .unwrap_or_default(),
            name: optional_string(pick(data, &["name", "device_name", "deviceName"]))
                .or_else(|| attributes.and_then(|a| optional_string(pick(a, &["name"])))),
            status: optional_string(pick(data, &["status", "state"])),
            device_type: optional_string(pick(data, &["device_type", "deviceType", "type"])),
            last_seen: parse_timestamp(pick(
                data,
                &["last_seen", "lastSeen", "locationLastReported"],
            )),
        }
    }
}

/// A tracked vehicle: the device fields plus vehicle attributes.
///
/// Superset of [`DeviceInfo`] by capability, not by embedding, so both
/// records stay flat value types.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VehicleInfo {
    pub id: String,
    pub name: Option<String>,
    pub status: Option<String>,
    pub device_type: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
    pub vin: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub license_plate: Option<String>,
    pub odometer: Option<f64>,
}

impl VehicleInfo {
    pub fn from_api(data: &Value) -> Self {
        let device = DeviceInfo::from_api(data);
        let attributes = data.get("attributes");

        // 车辆属性既可能在顶层也可能嵌在 attributes 里
        let find = |keys: &[&str]| {
            pick(data, keys).or_else(|| attributes.and_then(|a| pick(a, keys)))
        };

        VehicleInfo {
            id: device.id,
            name: device.name,
            status: device.status,
            device_type: device.device_type,
            last_seen: device.last_seen,
            vin: optional_string(find(&["vin"])).filter(|v| !v.is_empty()),
            make: optional_string(find(&["make"])),
            model: optional_string(find(&["model"])),
            year: optional_i64(find(&["year"])).map(|y| y as i32),
            license_plate: optional_string(find(&["license_plate", "licensePlate", "plate"])),
            odometer: optional_f64(find(&["odometer", "mileage"])),
        }
    }
}

/// A classified asset payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AssetRecord {
    Device(DeviceInfo),
    Vehicle(VehicleInfo),
}

impl AssetRecord {
    /// Classify a payload as vehicle or plain device, then parse it.
    ///
    /// A payload is a vehicle when a non-empty VIN appears at the top
    /// level or under `attributes`, or an explicit `type` marker says
    /// so.
    pub fn classify(data: &Value) -> Self {
        if Self::is_vehicle_payload(data) {
            AssetRecord::Vehicle(VehicleInfo::from_api(data))
        } else {
            AssetRecord::Device(DeviceInfo::from_api(data))
        }
    }

    fn is_vehicle_payload(data: &Value) -> bool {
        let has_vin = optional_string(pick(data, &["vin"]))
            .filter(|v| !v.is_empty())
            .or_else(|| {
                data.get("attributes")
                    .and_then(|a| optional_string(pick(a, &["vin"])))
                    .filter(|v| !v.is_empty())
            })
            .is_some();

        has_vin
            || optional_string(pick(data, &["type"]))
                .map(|t| t.eq_ignore_ascii_case("vehicle"))
                .unwrap_or(false)
    }

    pub fn id(&self) -> &str {
        match self {
            AssetRecord::Device(d) => &d.id,
            AssetRecord::Vehicle(v) => &v.id,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            AssetRecord::Device(d) => d.name.as_deref(),
            AssetRecord::Vehicle(v) => v.name.as_deref(),
        }
    }

    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        match self {
            AssetRecord::Device(d) => d.last_seen,
            AssetRecord::Vehicle(v) => v.last_seen,
        }
    }

    /// VIN, when the record is a vehicle that carries one.
    pub fn vin(&self) -> Option<&str> {
        match self {
            AssetRecord::Device(_) => None,
            AssetRecord::Vehicle(v) => v.vin.as_deref(),
        }
    }

    pub fn is_vehicle(&self) -> bool {
        matches!(self, AssetRecord::Vehicle(_))
    }

    pub fn as_vehicle(&self) -> Option<&VehicleInfo> {
        match self {
            AssetRecord::Vehicle(v) => Some(v),
            AssetRecord::Device(_) => None,
        }
    }
}
