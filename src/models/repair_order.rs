//! Repair order records

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::parse::{optional_f64, optional_string, parse_timestamp, pick};

/// A dealership repair order associated with a vehicle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepairOrder {
    pub id: Option<String>,
    pub vin: Option<String>,
    pub asset_id: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
    pub open_date: Option<DateTime<Utc>>,
    pub close_date: Option<DateTime<Utc>>,
    pub total_amount: Option<f64>,
}

impl RepairOrder {
    pub fn from_api(data: &Value) -> Self {
        RepairOrder {
            id: optional_string(pick(data, &["id", "repairOrderId"])),
            vin: optional_string(pick(data, &["vin"])),
            asset_id: optional_string(pick(data, &["assetId", "asset_id"])),
            status: optional_string(pick(data, &["status"])),
            description: optional_string(pick(data, &["description"])),
            open_date: parse_timestamp(pick(data, &["openDate", "open_date"])),
            close_date: parse_timestamp(pick(data, &["closeDate", "close_date"])),
            total_amount: optional_f64(pick(data, &["totalAmount", "total_amount"])),
        }
    }
}
