//! Bronze to silver stage steps.
//!
//! Each step follows the same arc: read the target's watermark, extract
//! the delta above it, clean, merge. Empty deltas and fully-invalid deltas
//! exit early without touching any table.

use lode_core::{MergeSpec, step_span};
use tracing::Instrument;

use crate::clean;
use crate::coordinator::StepOutcome;
use crate::error::Result;
use crate::extract::extract_delta;
use crate::merge::MergeEngine;
use crate::tables;
use crate::watermark::last_ingested_at;

/// Cleans new bronze events into `silver.events_cleaned`.
pub(crate) async fn run_events(engine: &MergeEngine) -> Result<StepOutcome> {
    async {
        let warehouse = engine.warehouse();
        let target = tables::silver_events();
        let watermark = last_ingested_at(warehouse.as_ref(), &target).await;
        let delta = extract_delta(warehouse.as_ref(), &tables::bronze_events(), watermark).await?;
        if delta.is_empty() {
            tracing::info!(table = %target, "no new data; step exits early");
            return Ok(StepOutcome::NoNewData);
        }

        let candidate = clean::clean_events(&delta)?;
        if candidate.is_empty() {
            tracing::info!(table = %target, "no rows survived cleaning");
            return Ok(StepOutcome::NothingValid);
        }

        let schema = tables::silver_events_schema();
        let spec = MergeSpec::upsert(&["event_id"], &schema.column_names());
        let outcome = engine.merge_into(&target, &schema, &candidate, &spec).await?;
        Ok(StepOutcome::Merged(outcome))
    }
    .instrument(step_span("silver", "events"))
    .await
}

/// Flattens new bronze sessions into `silver.session_events`.
pub(crate) async fn run_sessions(engine: &MergeEngine) -> Result<StepOutcome> {
    async {
        let warehouse = engine.warehouse();
        let target = tables::silver_session_events();
        let watermark = last_ingested_at(warehouse.as_ref(), &target).await;
        let delta =
            extract_delta(warehouse.as_ref(), &tables::bronze_sessions(), watermark).await?;
        if delta.is_empty() {
            tracing::info!(table = %target, "no new data; step exits early");
            return Ok(StepOutcome::NoNewData);
        }

        let candidate = clean::flatten_sessions(&delta)?;
        if candidate.is_empty() {
            tracing::info!(table = %target, "no rows survived flattening");
            return Ok(StepOutcome::NothingValid);
        }

        let schema = tables::silver_session_events_schema();
        let spec = MergeSpec::upsert(
            &["session_id", "event_type", "event_timestamp"],
            &schema.column_names(),
        );
        let outcome = engine.merge_into(&target, &schema, &candidate, &spec).await?;
        Ok(StepOutcome::Merged(outcome))
    }
    .instrument(step_span("silver", "sessions"))
    .await
}
