//! Canonical entity records normalized from vendor payloads
//!
//! Every `from_api` constructor is total: malformed or missing fields
//! degrade to `None`/empty values so one bad record never aborts a
//! batch.

pub mod device;
pub mod geofence;
pub mod location;
pub mod maintenance;
mod parse;
pub mod repair_order;

pub use device::{AssetRecord, DeviceInfo, VehicleInfo};
pub use geofence::{Geofence, GeofenceUpdate};
pub use location::Location;
pub use maintenance::{MaintenanceItem, MaintenanceSchedule};
pub use repair_order::RepairOrder;

pub(crate) use parse::{optional_f64, optional_i64, optional_string, parse_timestamp, pick};
