//! File ingestion into the bronze layer.
//!
//! Producer files land in bronze through the same merge discipline as
//! every other stage, so re-ingesting a file updates rows instead of
//! duplicating them. The whole file shares one `ingested_at` stamp taken
//! at load time.

use std::path::Path;

use lode_core::{Batch, MergeOutcome, MergeSpec, Row, Value, parse_timestamp, utc_now_micros};

use crate::error::{Error, Result};
use crate::merge::MergeEngine;
use crate::records::{RawEvent, RawSession};
use crate::tables::{self, INGESTED_AT};

fn parse_or_null(s: &str) -> Value {
    parse_timestamp(s).map_or(Value::Null, Value::Timestamp)
}

fn to_json(value: impl serde::Serialize, path: &Path) -> Result<Value> {
    let doc = serde_json::to_value(value).map_err(|e| Error::source_file(path, e.to_string()))?;
    Ok(Value::Json(doc))
}

/// Loads an events CSV into `bronze.events`, keyed by `event_id`.
///
/// Unparsable timestamps land as nulls for the silver cleaner to drop.
/// An empty file is an INFO-level no-op that creates nothing.
///
/// # Errors
///
/// [`Error::SourceFile`] when the file cannot be read or parsed,
/// [`Error::Merge`] when the upsert into bronze fails.
pub async fn ingest_events_csv(engine: &MergeEngine, path: &Path) -> Result<MergeOutcome> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Error::source_file(path, e.to_string()))?;
    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let mut raws: Vec<RawEvent> = Vec::new();
    for record in reader.deserialize() {
        raws.push(record.map_err(|e| Error::source_file(path, e.to_string()))?);
    }
    if raws.is_empty() {
        tracing::info!(path = %path.display(), "events file empty; nothing ingested");
        return Ok(MergeOutcome::default());
    }

    let stamp = Value::Timestamp(utc_now_micros());
    let batch: Batch = raws
        .into_iter()
        .map(|raw| {
            Row::new()
                .with("event_id", Value::Int64(raw.event_id))
                .with("user_id", Value::String(raw.user_id))
                .with("event_type", Value::String(raw.event_type))
                .with(
                    "product_id",
                    raw.product_id.map_or(Value::Null, Value::String),
                )
                .with("timestamp", parse_or_null(&raw.timestamp))
                .with(INGESTED_AT, stamp.clone())
        })
        .collect();

    let table = tables::bronze_events();
    let schema = tables::bronze_events_schema();
    engine.warehouse().ensure_table(&table, &schema).await?;
    let spec = MergeSpec::upsert(&["event_id"], &schema.column_names());
    let outcome = engine.merge_into(&table, &schema, &batch, &spec).await?;
    tracing::info!(path = %path.display(), rows = batch.len(), "events ingested");
    Ok(outcome)
}

/// Loads a sessions JSON array into `bronze.sessions`, keyed by `session_id`.
///
/// Nested `device`, `location`, and `events` blocks are stored as JSON
/// columns; flattening happens in the silver stage.
///
/// # Errors
///
/// [`Error::SourceFile`] when the file cannot be read or parsed,
/// [`Error::Merge`] when the upsert into bronze fails.
pub async fn ingest_sessions_json(engine: &MergeEngine, path: &Path) -> Result<MergeOutcome> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::source_file(path, e.to_string()))?;
    let sessions: Vec<RawSession> =
        serde_json::from_str(&text).map_err(|e| Error::source_file(path, e.to_string()))?;
    if sessions.is_empty() {
        tracing::info!(path = %path.display(), "sessions file empty; nothing ingested");
        return Ok(MergeOutcome::default());
    }

    let stamp = Value::Timestamp(utc_now_micros());
    let mut rows = Vec::with_capacity(sessions.len());
    for session in sessions {
        rows.push(
            Row::new()
                .with("session_id", Value::String(session.session_id.clone()))
                .with("user_id", Value::String(session.user_id.clone()))
                .with("start_time", parse_or_null(&session.start_time))
                .with("end_time", parse_or_null(&session.end_time))
                .with("device", to_json(&session.device, path)?)
                .with("location", to_json(&session.location, path)?)
                .with("events", to_json(&session.events, path)?)
                .with(INGESTED_AT, stamp.clone()),
        );
    }
    let batch = Batch::from_rows(rows);

    let table = tables::bronze_sessions();
    let schema = tables::bronze_sessions_schema();
    engine.warehouse().ensure_table(&table, &schema).await?;
    let spec = MergeSpec::upsert(&["session_id"], &schema.column_names());
    let outcome = engine.merge_into(&table, &schema, &batch, &spec).await?;
    tracing::info!(path = %path.display(), rows = batch.len(), "sessions ingested");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lode_core::MemoryWarehouse;
    use std::sync::Arc;

    fn engine() -> MergeEngine {
        MergeEngine::new(Arc::new(MemoryWarehouse::new()))
    }

    async fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        tokio::fs::write(&path, body).await.unwrap();
        path
    }

    const EVENTS_CSV: &str = "event_id,user_id,event_type,product_id,timestamp\n\
                              1,user_1,view_product,PROD_001,2026-08-20T10:00:00\n\
                              2,user_2,purchase,PROD_002,2026-08-20T11:00:00\n";

    #[tokio::test]
    async fn events_csv_lands_in_bronze() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "events.csv", EVENTS_CSV).await;
        let engine = engine();

        let outcome = ingest_events_csv(&engine, &path).await.unwrap();
        assert_eq!(outcome, MergeOutcome { inserted: 2, updated: 0 });

        let stored = engine
            .warehouse()
            .scan(&tables::bronze_events(), &[])
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
        let first = &stored.rows()[0];
        assert_eq!(first.int_value("event_id"), Some(1));
        assert!(first.timestamp_value("timestamp").is_some());
        assert!(first.timestamp_value(INGESTED_AT).is_some());
        // One load, one stamp.
        assert_eq!(
            first.timestamp_value(INGESTED_AT),
            stored.rows()[1].timestamp_value(INGESTED_AT)
        );
    }

    #[tokio::test]
    async fn reingesting_updates_instead_of_duplicating() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "events.csv", EVENTS_CSV).await;
        let engine = engine();

        ingest_events_csv(&engine, &path).await.unwrap();
        let second = ingest_events_csv(&engine, &path).await.unwrap();
        assert_eq!(second, MergeOutcome { inserted: 0, updated: 2 });

        let stored = engine
            .warehouse()
            .scan(&tables::bronze_events(), &[])
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn empty_events_file_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "events.csv", "event_id,user_id,event_type,product_id,timestamp\n")
            .await;
        let engine = engine();

        let outcome = ingest_events_csv(&engine, &path).await.unwrap();
        assert_eq!(outcome, MergeOutcome::default());
        assert!(!engine
            .warehouse()
            .table_exists(&tables::bronze_events())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn unreadable_events_file_is_a_source_error() {
        let engine = engine();
        let err = ingest_events_csv(&engine, Path::new("/nonexistent/events.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SourceFile { .. }));
    }

    #[tokio::test]
    async fn sessions_json_lands_with_nested_payloads() {
        let body = r#"[{
            "session_id": "sess_1",
            "user_id": "user_4",
            "start_time": "2026-08-20T09:00:00",
            "end_time": "2026-08-20T09:45:00",
            "device": {"browser": "Safari", "os": "iOS"},
            "location": {"country": "Norway", "city": "Oslo"},
            "events": [
                {"type": "view_product", "product_id": "PROD_003", "timestamp": "2026-08-20T09:10:00"}
            ]
        }]"#;
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "sessions.json", body).await;
        let engine = engine();

        let outcome = ingest_sessions_json(&engine, &path).await.unwrap();
        assert_eq!(outcome, MergeOutcome { inserted: 1, updated: 0 });

        let stored = engine
            .warehouse()
            .scan(&tables::bronze_sessions(), &[])
            .await
            .unwrap();
        let row = &stored.rows()[0];
        assert_eq!(row.str_value("session_id"), Some("sess_1"));
        let events = row.get("events").and_then(Value::as_json).unwrap();
        assert_eq!(events[0]["type"], "view_product");
        let device = row.get("device").and_then(Value::as_json).unwrap();
        assert_eq!(device["os"], "iOS");
    }

    #[tokio::test]
    async fn malformed_sessions_json_is_a_source_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "sessions.json", "{\"not\": \"an array\"}").await;
        let engine = engine();
        let err = ingest_sessions_json(&engine, &path).await.unwrap_err();
        assert!(matches!(err, Error::SourceFile { .. }));
    }
}
