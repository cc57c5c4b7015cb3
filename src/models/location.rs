//! Location record normalization and enrichment
//!
//! Two independently polled sources produce locations: the asset
//! snapshot (`lastLocation`, fresh coordinates, thin telemetry) and the
//! event stream (rich telemetry, possibly older fix). `from_api` /
//! `from_event` normalize either shape; `enrich_from` merges them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::parse::{
    assemble_address, optional_f64, optional_string, parse_gps_accuracy, parse_timestamp, pick,
};

/// A single position fix with whatever telemetry accompanied it.
///
/// This is a value, not an entity: it has no identity beyond its
/// timestamp and the device it was fetched for.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Location {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    /// Approximate accuracy in meters, resolved from HDOP, literal
    /// meters, or a quality label depending on what the payload carried.
    pub accuracy: Option<f64>,
    pub odometer: Option<f64>,
    pub battery_voltage: Option<f64>,
    pub engine_hours: Option<f64>,
    pub distance_driven: Option<f64>,
    pub signal_strength: Option<f64>,
    pub gps_fix_quality: Option<String>,
    pub event_type: Option<String>,
    pub event_id: Option<String>,
    pub address: Option<String>,
    /// 原始报文，原样保留
    #[serde(skip)]
    pub raw: Value,
}

impl Location {
    /// Normalize a location payload (asset `lastLocation` or similar).
    pub fn from_api(data: &Value) -> Self {
        // 只向下递归一层已知容器
        let coords = data
            .get("coordinates")
            .or_else(|| data.get("location").and_then(|l| l.get("coordinates")));
        let find = |keys: &[&str]| {
            pick(data, keys).or_else(|| coords.and_then(|c| pick(c, keys)))
        };

        let quality = optional_string(pick(data, &["gpsFixQuality", "gpsQuality"]));
        let accuracy = parse_gps_accuracy(
            pick(data, &["accuracy"]),
            pick(data, &["hdop"]),
            quality.as_deref(),
        );

        let address = pick(data, &["address", "formattedAddress"])
            .and_then(assemble_address)
            .or_else(|| {
                data.get("location")
                    .and_then(|l| pick(l, &["address"]))
                    .and_then(assemble_address)
            });

        Location {
            latitude: optional_f64(find(&["latitude", "lat"])),
            longitude: optional_f64(find(&["longitude", "lng", "lon"])),
            timestamp: parse_timestamp(pick(data, &["timestamp", "time", "dateTime"])),
            speed: optional_f64(pick(data, &["speed"])),
            heading: optional_f64(pick(data, &["heading", "bearing"])),
            accuracy,
            gps_fix_quality: quality,
            address,
            raw: data.clone(),
            ..Location::default()
        }
    }

    /// Normalize an event payload: a location plus event identity and
    /// the telemetry fields only the event stream reports.
    pub fn from_event(data: &Value) -> Self {
        let mut location = Self::from_api(data);

        if location.timestamp.is_none() {
            location.timestamp = parse_timestamp(pick(data, &["eventDateTime", "date"]));
        }

        location.event_id = optional_string(pick(data, &["eventId", "id"]));
        location.event_type = optional_string(pick(data, &["eventType", "type"]));
        location.odometer = optional_f64(pick(data, &["odometer", "mileage"]));
        location.battery_voltage =
            optional_f64(pick(data, &["batteryVoltage", "battery_voltage", "battery"]));
        location.engine_hours = optional_f64(pick(data, &["engineHours", "engine_hours"]));
        location.distance_driven =
            optional_f64(pick(data, &["distanceDriven", "distance_driven"]));
        location.signal_strength =
            optional_f64(pick(data, &["signalStrength", "signal_strength", "rssi"]));

        location
    }

    /// Both coordinates present.
    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    /// Fill missing fields from a telemetry location.
    ///
    /// Populated fields are never overwritten; the timestamp is the one
    /// exception and is adopted when the telemetry fix is strictly newer
    /// (or no timestamp was known).
    pub fn enrich_from(&mut self, telemetry: &Location) {
        if self.speed.is_none() {
            self.speed = telemetry.speed;
        }
        if self.heading.is_none() {
            self.heading = telemetry.heading;
        }
        if self.odometer.is_none() {
            self.odometer = telemetry.odometer;
        }
        if self.battery_voltage.is_none() {
            self.battery_voltage = telemetry.battery_voltage;
        }
        if self.engine_hours.is_none() {
            self.engine_hours = telemetry.engine_hours;
        }
        if self.distance_driven.is_none() {
            self.distance_driven = telemetry.distance_driven;
        }
        if self.signal_strength.is_none() {
            self.signal_strength = telemetry.signal_strength;
        }
        if self.gps_fix_quality.is_none() {
            self.gps_fix_quality = telemetry.gps_fix_quality.clone();
        }
        if self.event_type.is_none() {
            self.event_type = telemetry.event_type.clone();
        }
        if self.event_id.is_none() {
            self.event_id = telemetry.event_id.clone();
        }
        if self.address.is_none() {
            self.address = telemetry.address.clone();
        }

        if let Some(event_ts) = telemetry.timestamp {
            match self.timestamp {
                Some(own_ts) if event_ts <= own_ts => {}
                _ => self.timestamp = Some(event_ts),
            }
        }
    }
}
