//! Field normalization for schemaless documents
//!
//! Stored documents come from several generations of writers. These helpers
//! read a field leniently and fall back to a default instead of failing.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::core::types::{format_timestamp, Fields, Timestamp};

/// String field, empty when absent or not a string
pub fn str_field(fields: &Fields, key: &str) -> String {
    opt_str_field(fields, key).unwrap_or_default()
}

/// String field, `None` when absent, null or empty
pub fn opt_str_field(fields: &Fields, key: &str) -> Option<String> {
    match fields.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Integer field; accepts numbers and numeric strings, otherwise 0
pub fn int_field(fields: &Fields, key: &str) -> i64 {
    match fields.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Boolean field; accepts `true`/`false` strings, otherwise false
pub fn bool_field(fields: &Fields, key: &str) -> bool {
    match fields.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// List of strings; non-string entries are dropped
pub fn string_list(fields: &Fields, key: &str) -> Vec<String> {
    match fields.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Timestamp field.
///
/// Accepts RFC 3339 strings, epoch milliseconds, and exported server
/// timestamps of the form `{"_seconds": s, "_nanoseconds": n}` (with or
/// without the leading underscores).
pub fn timestamp_field(fields: &Fields, key: &str) -> Option<Timestamp> {
    match fields.get(key)? {
        Value::String(s) => DateTime::parse_from_rfc3339(s).ok().map(|ts| ts.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::Object(obj) => {
            let seconds = obj.get("_seconds").or_else(|| obj.get("seconds"))?.as_i64()?;
            let nanos = obj
                .get("_nanoseconds")
                .or_else(|| obj.get("nanoseconds"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            Utc.timestamp_opt(seconds, nanos as u32).single()
        }
        _ => None,
    }
}

/// Timestamp as stored
pub fn timestamp_value(ts: &Timestamp) -> Value {
    Value::String(format_timestamp(ts))
}

/// Module id derived from a title: lowercased, whitespace runs become `_`
pub fn module_id_from_title(title: &str) -> String {
    title
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Case-insensitive substring match over several fields
pub fn contains_term(haystacks: &[&str], term: &str) -> bool {
    let needle = term.to_lowercase();
    haystacks.iter().any(|h| h.to_lowercase().contains(&needle))
}
