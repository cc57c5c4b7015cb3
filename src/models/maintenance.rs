//! Maintenance schedule records

use serde::Serialize;
use serde_json::Value;

use super::parse::{optional_f64, optional_i64, optional_string, pick};

/// One service item from a vehicle's maintenance schedule.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MaintenanceItem {
    /// Service name. Empty string when the payload carried none.
    pub name: String,
    pub description: Option<String>,
    pub severity: Option<String>,
    pub action: Option<String>,
    pub mileage_due: Option<f64>,
    pub months_due: Option<i64>,
}

impl MaintenanceItem {
    pub fn from_api(data: &Value) -> Self {
        MaintenanceItem {
            name: optional_string(pick(data, &["name", "serviceName"])).unwrap_or_default(),
            description: optional_string(pick(data, &["description", "serviceDescription"])),
            severity: optional_string(pick(data, &["severity", "level"])),
            action: optional_string(pick(data, &["action", "recommendedAction"])),
            mileage_due: optional_f64(pick(data, &["mileageDue", "dueMileage"])),
            months_due: optional_i64(pick(data, &["monthsDue", "dueMonths"])),
        }
    }
}

/// A vehicle's maintenance schedule: an ordered list of service items.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MaintenanceSchedule {
    pub vin: Option<String>,
    pub items: Vec<MaintenanceItem>,
}

impl MaintenanceSchedule {
    /// Normalize a schedule payload. The `vin` parameter, when given by
    /// the caller, overrides whatever the payload carries.
    pub fn from_api(data: &Value, vin: Option<&str>) -> Self {
        let items = pick(data, &["items", "services", "content"])
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| entry.is_object())
                    .map(MaintenanceItem::from_api)
                    .collect()
            })
            .unwrap_or_default();

        MaintenanceSchedule {
            vin: vin
                .map(str::to_string)
                .or_else(|| optional_string(pick(data, &["vin"]))),
            items,
        }
    }
}
