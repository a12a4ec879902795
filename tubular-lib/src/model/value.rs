//! Helpers for raw JSON record values.

use chrono::DateTime;
use chrono::Datelike;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use serde_json::Value;

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Parses the date formats a grid endpoint typically returns.
///
/// Accepts RFC 3339, ISO 8601 without offset and plain `YYYY-MM-DD`.
/// Offsets are discarded; the result is the wall-clock time as sent.
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }

    for format in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Normalizes a date-typed value.
///
/// Null, empty and pre-1901 values become `""`. Everything else is kept as sent.
pub fn normalize_date(value: Value) -> Value {
    match &value {
        Value::Null => Value::String(String::new()),
        Value::String(s) if s.trim().is_empty() => Value::String(String::new()),
        Value::String(s) => match parse_date(s) {
            Some(dt) if dt.year() <= 1900 => Value::String(String::new()),
            _ => value,
        },
        _ => value,
    }
}

/// Text of a value as it appears inside a row key.
///
/// Strings are used raw, `null` is spelled out, everything else uses its JSON text.
pub fn key_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Text of a value for display and export. `null` is empty.
pub fn display_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Numeric view of a value, accepting numeric strings.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}
