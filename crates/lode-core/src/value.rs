//! Scalar values and column data types.
//!
//! Every table cell is a [`Value`]. Merge keys need a deterministic text
//! encoding so composite keys hash and compare identically regardless of how
//! the row was produced:
//!
//! ```text
//! KEY_REPR ::= type_tag ":" encoded_value
//!
//! type_tag ::=
//!   "s" (string) | "i" (int64) | "b" (bool) | "t" (timestamp)
//!
//! encoded_value ::=
//!   For "s": base64url_no_pad(utf8_bytes)
//!   For "i": decimal integer
//!   For "b": "true" | "false"
//!   For "t": "YYYY-MM-DDTHH:MM:SS.ffffffZ"
//! ```
//!
//! Floats and JSON documents are deliberately not keyable: float precision
//! drifts across serialization formats, and JSON has no single canonical
//! byte form worth depending on for identity.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Column data types supported by the warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// UTF-8 string.
    String,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit float.
    Float64,
    /// Boolean value.
    Boolean,
    /// Microsecond-resolution UTC timestamp.
    Timestamp,
    /// Semi-structured JSON document.
    Json,
}

/// A single table cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    /// UTF-8 string.
    String(String),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean value.
    Boolean(bool),
    /// Microsecond-resolution UTC timestamp.
    Timestamp(DateTime<Utc>),
    /// Semi-structured JSON document.
    Json(serde_json::Value),
    /// Explicit null.
    Null,
}

impl Value {
    /// Returns true if this value is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the name of this value's type, for error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Int64(_) => "int64",
            Self::Float64(_) => "float64",
            Self::Boolean(_) => "boolean",
            Self::Timestamp(_) => "timestamp",
            Self::Json(_) => "json",
            Self::Null => "null",
        }
    }

    /// Returns the canonical key representation with type tag, or `None`
    /// for values that cannot participate in a merge key (null, float,
    /// json).
    #[must_use]
    pub fn key_repr(&self) -> Option<String> {
        match self {
            Self::String(s) => {
                let encoded = URL_SAFE_NO_PAD.encode(s.as_bytes());
                Some(format!("s:{encoded}"))
            }
            Self::Int64(n) => Some(format!("i:{n}")),
            Self::Boolean(b) => Some(format!("b:{}", if *b { "true" } else { "false" })),
            Self::Timestamp(ts) => Some(format!("t:{}", ts.format("%Y-%m-%dT%H:%M:%S%.6fZ"))),
            Self::Float64(_) | Self::Json(_) | Self::Null => None,
        }
    }

    /// Returns the string content, if this is a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer content, if this is an int64 value.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int64(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the float content, if this is a float64 value.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float64(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the boolean content, if this is a boolean value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the timestamp content, if this is a timestamp value.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Returns the JSON content, if this is a json value.
    #[must_use]
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }
}

/// Returns the current UTC time truncated to microsecond resolution.
///
/// The warehouse persists timestamps at microsecond precision, so anything
/// stamped into a row goes through this to make written and re-read values
/// compare equal.
#[must_use]
pub fn utc_now_micros() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now)
}

/// Parses a timestamp from the textual forms raw producers emit.
///
/// Accepts RFC 3339 with an offset, and naive `YYYY-MM-DDTHH:MM:SS[.f]` or
/// `YYYY-MM-DD HH:MM:SS[.f]` interpreted as UTC. Returns `None` if the
/// string matches none of these.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn key_repr_is_tagged_and_encoded() {
        assert_eq!(
            Value::String("purchase".into()).key_repr(),
            Some("s:cHVyY2hhc2U".to_string())
        );
        assert_eq!(Value::Int64(42).key_repr(), Some("i:42".to_string()));
        assert_eq!(
            Value::Boolean(true).key_repr(),
            Some("b:true".to_string())
        );
    }

    #[test]
    fn key_repr_uses_microsecond_timestamps() {
        let ts = Utc.with_ymd_and_hms(2026, 8, 25, 10, 30, 0).unwrap();
        assert_eq!(
            Value::Timestamp(ts).key_repr(),
            Some("t:2026-08-25T10:30:00.000000Z".to_string())
        );
    }

    #[test]
    fn unkeyable_values_have_no_repr() {
        assert_eq!(Value::Null.key_repr(), None);
        assert_eq!(Value::Float64(0.5).key_repr(), None);
        assert_eq!(Value::Json(serde_json::json!({"a": 1})).key_repr(), None);
    }

    #[test]
    fn distinct_strings_never_collide() {
        // "a,b" + "c" vs "a" + "b,c" would collide under naive joining.
        let left = format!(
            "{},{}",
            Value::String("a,b".into()).key_repr().unwrap(),
            Value::String("c".into()).key_repr().unwrap()
        );
        let right = format!(
            "{},{}",
            Value::String("a".into()).key_repr().unwrap(),
            Value::String("b,c".into()).key_repr().unwrap()
        );
        assert_ne!(left, right);
    }

    #[test]
    fn parse_timestamp_accepts_producer_formats() {
        let expected = Utc.with_ymd_and_hms(2026, 8, 25, 9, 15, 0).unwrap();
        assert_eq!(parse_timestamp("2026-08-25T09:15:00"), Some(expected));
        assert_eq!(parse_timestamp("2026-08-25 09:15:00"), Some(expected));
        assert_eq!(parse_timestamp("2026-08-25T09:15:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2026-08-25T09:15:00+00:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2026-08-25T09:15:00.250000"),
            Some(expected + chrono::Duration::milliseconds(250))
        );
        assert_eq!(parse_timestamp("not a timestamp"), None);
    }

    #[test]
    fn now_round_trips_through_microseconds() {
        let now = utc_now_micros();
        let micros = now.timestamp_micros();
        assert_eq!(DateTime::from_timestamp_micros(micros), Some(now));
    }
}
