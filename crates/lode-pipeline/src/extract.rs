//! Incremental extraction from a source table.

use chrono::{DateTime, Utc};
use lode_core::{Batch, Predicate, TableRef, Value, Warehouse};

use crate::error::Result;
use crate::tables::INGESTED_AT;

/// Rows of `source` whose `ingested_at` lies strictly above the watermark.
///
/// Rows exactly at the watermark are taken to be already merged. An empty
/// batch is a normal result; callers short-circuit on it without touching
/// any table.
///
/// # Errors
///
/// Propagates warehouse scan failures.
pub async fn extract_delta(
    warehouse: &dyn Warehouse,
    source: &TableRef,
    watermark: DateTime<Utc>,
) -> Result<Batch> {
    let filter = [Predicate::Gt(
        INGESTED_AT.to_string(),
        Value::Timestamp(watermark),
    )];
    let delta = warehouse.scan(source, &filter).await?;
    tracing::info!(table = %source, rows = delta.len(), %watermark, "delta extracted");
    Ok(delta)
}
