//! Shared coercion helpers for schema-flexible payloads.
//!
//! Payload values arrive as strings, numbers, or nulls depending on the
//! source (CSV ingestion stores everything as strings). Analytics and
//! cleaning passes share these helpers so a value is interpreted the same
//! way everywhere.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

/// Coerces a payload value to `f64`.
///
/// JSON numbers pass through; strings are trimmed and parsed. Booleans,
/// nulls, and structured values are not numeric.
#[must_use]
pub fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Parses a datetime string in any of the formats sources commonly emit.
///
/// Tries RFC 3339 first, then ISO 8601 without offset (with or without
/// fractional seconds), then date-only and US-style dates, which resolve
/// to midnight UTC.
#[must_use]
pub fn parse_flexible_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%m/%d/%Y") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    None
}

/// Extracts a timestamp from a payload value.
///
/// Strings go through [`parse_flexible_datetime`]; everything else is not
/// a timestamp.
#[must_use]
pub fn coerce_datetime(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_flexible_datetime(s),
        _ => None,
    }
}
