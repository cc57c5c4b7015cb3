//! Defensive field extraction from vendor payloads
//!
//! The API reports the same semantic fields under several key spellings,
//! shapes, and units depending on endpoint and device firmware. Every
//! helper here is total: bad input yields `None`, never an error, so a
//! malformed record degrades to empty fields instead of aborting a batch.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

/// HDOP 与米的近似换算系数
const HDOP_METERS_FACTOR: f64 = 5.0;
/// 该阈值以下的数值按 HDOP 处理，以上按米处理
const HDOP_METERS_BOUNDARY: f64 = 15.0;
/// 该数量级以上的 epoch 值按毫秒处理
const EPOCH_MILLIS_BOUNDARY: f64 = 1e12;

/// Return the first present, non-null value among `keys`.
pub(crate) fn pick<'a>(data: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let obj = data.as_object()?;
    for key in keys {
        match obj.get(*key) {
            None | Some(Value::Null) => continue,
            Some(value) => return Some(value),
        }
    }
    None
}

/// String coercion: strings pass through, numbers are rendered.
pub(crate) fn optional_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Float coercion: numbers directly, numeric strings parsed.
pub(crate) fn optional_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Integer coercion: integral numbers, floats truncated, numeric strings parsed.
pub(crate) fn optional_i64(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

pub(crate) fn optional_bool(value: Option<&Value>) -> Option<bool> {
    value?.as_bool()
}

/// Normalize a heterogeneous timestamp value to a UTC instant.
///
/// Accepts epoch seconds, epoch milliseconds, and the string formats the
/// vendor has been observed to emit. Unparseable or out-of-range input
/// yields `None`.
pub(crate) fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::Number(n) => parse_epoch(n.as_f64()?),
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

fn parse_epoch(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    if value.abs() >= EPOCH_MILLIS_BOUNDARY {
        // 毫秒级：float→int 转换饱和，超界由 chrono 拒绝
        DateTime::from_timestamp_millis(value as i64)
    } else {
        DateTime::from_timestamp_millis((value * 1000.0) as i64)
    }
}

pub(crate) fn parse_timestamp_str(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    // ISO-8601，末尾 Z 或带冒号的偏移
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    // 纯数字偏移（如 +0000），vendor 的事件接口用这种格式
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    // 空格分隔的日期时间，无时区信息按 UTC 处理
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt.and_utc());
    }
    // 最后兜底：无偏移的 ISO 形式
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc());
    }

    None
}

/// Resolve a meters-of-accuracy figure from whichever quality signal the
/// payload carries: a numeric HDOP, a numeric accuracy that may itself be
/// HDOP-scale or already meters, or a categorical quality label.
pub(crate) fn parse_gps_accuracy(
    accuracy: Option<&Value>,
    hdop: Option<&Value>,
    gps_quality: Option<&str>,
) -> Option<f64> {
    // 显式 HDOP 优先，恒定 ×5 换算
    if let Some(h) = hdop.and_then(|v| optional_f64(Some(v))) {
        if h > 0.0 {
            return Some(h * HDOP_METERS_FACTOR);
        }
    }

    if let Some(value) = accuracy {
        if let Some(n) = optional_f64(Some(value)) {
            if n > 0.0 {
                // 小数值按 HDOP 处理，大数值按已是米处理
                return Some(if n <= HDOP_METERS_BOUNDARY {
                    n * HDOP_METERS_FACTOR
                } else {
                    n
                });
            }
        } else if let Value::String(label) = value {
            if let Some(meters) = quality_label_meters(label) {
                return Some(meters);
            }
            // 无法识别的标签继续落到 gps_quality 参数
        }
    }

    gps_quality.and_then(quality_label_meters)
}

/// Map a categorical GPS quality label to a fixed meter band.
fn quality_label_meters(label: &str) -> Option<f64> {
    let normalized: String = label
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .collect::<String>()
        .to_uppercase();

    match normalized.as_str() {
        "EXCELLENT" => Some(5.0),
        "GOOD" => Some(10.0),
        "MODERATE" | "FAIR" => Some(25.0),
        "POOR" => Some(50.0),
        "BAD" | "VERYPOOR" => Some(100.0),
        "NOFIX" => Some(200.0),
        _ => None,
    }
}

/// Build one display string from an address value.
///
/// A plain string (or `formattedAddress`) is used verbatim; an address
/// object is assembled from its parts as `line1, city, state zip`. An
/// object with no populated parts yields `None`, not an empty string.
pub(crate) fn assemble_address(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                Some(s.to_string())
            }
        }
        Value::Object(_) => {
            if let Some(formatted) = optional_string(pick(value, &["formattedAddress"])) {
                let formatted = formatted.trim().to_string();
                if !formatted.is_empty() {
                    return Some(formatted);
                }
            }

            let line1 = optional_string(pick(value, &["line1", "address1"]));
            let city = optional_string(pick(value, &["city"]));
            let state = optional_string(pick(value, &["stateOrProvince", "state"]));
            let zip = optional_string(pick(value, &["postalCode", "zip"]));

            // 州与邮编之间用空格，组之间用逗号
            let state_zip = match (state, zip) {
                (Some(s), Some(z)) => Some(format!("{s} {z}")),
                (Some(s), None) => Some(s),
                (None, Some(z)) => Some(z),
                (None, None) => None,
            };

            let parts: Vec<String> = [line1, city, state_zip]
                .into_iter()
                .flatten()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();

            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        _ => None,
    }
}
