//! Watermark tracking.
//!
//! The watermark of a target table is the highest `ingested_at` it already
//! holds. Reads degrade rather than fail: a missing or unreadable target
//! means "load everything", not "halt the pipeline".

use chrono::{DateTime, Utc};
use lode_core::{TableRef, Warehouse};

use crate::tables::INGESTED_AT;

/// Sentinel watermark signalling a full load.
pub const WATERMARK_SENTINEL: DateTime<Utc> = DateTime::UNIX_EPOCH;

/// Highest `ingested_at` already merged into `target`.
///
/// Empty and unreadable targets both yield [`WATERMARK_SENTINEL`]. This
/// call never fails the stage; read errors are logged and degraded.
pub async fn last_ingested_at(warehouse: &dyn Warehouse, target: &TableRef) -> DateTime<Utc> {
    match warehouse.max_timestamp(target, INGESTED_AT).await {
        Ok(Some(watermark)) => {
            tracing::info!(table = %target, %watermark, "watermark read");
            watermark
        }
        Ok(None) => {
            tracing::info!(table = %target, "target empty, full load");
            WATERMARK_SENTINEL
        }
        Err(error) => {
            tracing::warn!(table = %target, %error, "watermark unreadable, degrading to full load");
            WATERMARK_SENTINEL
        }
    }
}
