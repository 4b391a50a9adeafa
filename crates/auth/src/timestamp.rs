//! Timestamps as the authority serializes them.
//!
//! The authority stores UTC wall-clock times without an offset, so its
//! payloads carry `2025-03-01T10:00:00.123456` as often as
//! `2025-03-01T10:00:00Z`. Offset-less values are read as UTC.

use chrono::{DateTime, NaiveDateTime, ParseError, Utc};
use serde::{Deserialize, Deserializer, de};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse RFC 3339, falling back to an offset-less timestamp taken as UTC.
pub fn parse(raw: &str) -> Result<DateTime<Utc>, ParseError> {
    let raw = raw.trim();
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(rfc_err) => NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
            .ok_or(rfc_err),
    }
}

/// `deserialize_with` adapter for [`parse`].
pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(|e| de::Error::custom(format!("invalid timestamp '{raw}': {e}")))
}
