//! Silver-layer cleaners.
//!
//! Both cleaners are pure batch-to-batch functions: validation,
//! normalization, and deduplication happen here, storage happens in the
//! merge engine. Duplicate business keys keep the last row seen, first
//! position in the batch.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use lode_core::{Batch, Row, RowKey, Value, parse_timestamp};

use crate::error::Result;
use crate::tables::INGESTED_AT;

fn has_value(row: &Row, column: &str) -> bool {
    row.get(column).is_some_and(|v| !v.is_null())
}

fn carried(row: &Row, column: &str) -> Value {
    row.get(column).cloned().unwrap_or(Value::Null)
}

/// Keeps the last row per key while preserving first-seen order.
struct Deduper {
    kept: Vec<Row>,
    by_key: HashMap<RowKey, usize>,
}

impl Deduper {
    fn new() -> Self {
        Self {
            kept: Vec::new(),
            by_key: HashMap::new(),
        }
    }

    fn put(&mut self, key: RowKey, row: Row) {
        match self.by_key.entry(key) {
            Entry::Occupied(slot) => self.kept[*slot.get()] = row,
            Entry::Vacant(slot) => {
                slot.insert(self.kept.len());
                self.kept.push(row);
            }
        }
    }

    fn finish(self) -> Batch {
        Batch::from_rows(self.kept)
    }
}

/// Validates, normalizes, and deduplicates raw events.
///
/// `event_type` is lower-cased for consistent grouping. Rows with a null
/// `event_id`, `user_id`, `event_type`, or `timestamp` are dropped.
/// Duplicates by `event_id` keep the last row.
///
/// # Errors
///
/// Returns [`lode_core::Error::InvalidInput`] when `event_id` holds an
/// unkeyable value such as a float.
pub fn clean_events(raw: &Batch) -> Result<Batch> {
    let mut deduper = Deduper::new();
    let mut dropped = 0usize;

    for row in raw.rows() {
        let Some(event_type) = row.str_value("event_type") else {
            dropped += 1;
            continue;
        };
        if !has_value(row, "event_id") || !has_value(row, "user_id") || !has_value(row, "timestamp")
        {
            dropped += 1;
            continue;
        }
        let cleaned = row
            .clone()
            .with("event_type", Value::String(event_type.to_lowercase()));
        let key = cleaned.key(&["event_id"])?;
        deduper.put(key, cleaned);
    }

    let batch = deduper.finish();
    if dropped > 0 {
        tracing::debug!(dropped, kept = batch.len(), "invalid events dropped");
    }
    Ok(batch)
}

/// Explodes raw sessions into one row per (session, event type, timestamp).
///
/// Nested `device` and `location` documents are projected to flat columns;
/// the nested event list becomes individual rows with the session's
/// `ingested_at` carried over. Sessions without a usable event array and
/// nested events without a parsable type or timestamp are dropped.
/// Duplicates by the composite key keep the last row.
///
/// # Errors
///
/// Returns [`lode_core::Error::InvalidInput`] when a composite key column
/// holds an unkeyable value.
pub fn flatten_sessions(raw: &Batch) -> Result<Batch> {
    let mut deduper = Deduper::new();
    let mut dropped = 0usize;

    for session in raw.rows() {
        let Some(session_id) = session.str_value("session_id") else {
            dropped += 1;
            continue;
        };
        let Some(items) = session.get("events").and_then(Value::as_json) else {
            dropped += 1;
            continue;
        };
        let Some(items) = items.as_array() else {
            dropped += 1;
            continue;
        };

        let browser = json_field(session.get("device"), "browser");
        let operating_system = json_field(session.get("device"), "os");
        let country = json_field(session.get("location"), "country");
        let city = json_field(session.get("location"), "city");

        for item in items {
            let Some((event_type, event_timestamp, product_id)) = nested_event(item) else {
                dropped += 1;
                continue;
            };
            let row = Row::new()
                .with("session_id", Value::String(session_id.to_string()))
                .with("event_type", Value::String(event_type))
                .with("event_timestamp", Value::Timestamp(event_timestamp))
                .with("user_id", carried(session, "user_id"))
                .with("start_time", carried(session, "start_time"))
                .with("end_time", carried(session, "end_time"))
                .with("product_id", product_id.map_or(Value::Null, Value::String))
                .with("browser", browser.clone())
                .with("operating_system", operating_system.clone())
                .with("country", country.clone())
                .with("city", city.clone())
                .with(INGESTED_AT, carried(session, INGESTED_AT));
            let key = row.key(&["session_id", "event_type", "event_timestamp"])?;
            deduper.put(key, row);
        }
    }

    let batch = deduper.finish();
    if dropped > 0 {
        tracing::debug!(dropped, kept = batch.len(), "malformed session rows dropped");
    }
    Ok(batch)
}

fn json_field(value: Option<&Value>, field: &str) -> Value {
    value
        .and_then(Value::as_json)
        .and_then(|doc| doc.get(field))
        .and_then(serde_json::Value::as_str)
        .map_or(Value::Null, |s| Value::String(s.to_string()))
}

fn nested_event(item: &serde_json::Value) -> Option<(String, DateTime<Utc>, Option<String>)> {
    let object = item.as_object()?;
    let event_type = object.get("type")?.as_str()?.to_lowercase();
    let timestamp = parse_timestamp(object.get("timestamp")?.as_str()?)?;
    let product_id = object
        .get("product_id")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);
    Some((event_type, timestamp, product_id))
}
