//! Silver to gold stage steps.
//!
//! Gold steps re-read only the cleaned-layer delta and recompute grouped
//! metrics for it; lifetime history is never rescanned. The three steps
//! differ only in source, target, and metric spec.

use lode_core::{MergeSpec, TableRef, TableSchema, step_span};
use tracing::Instrument;

use crate::aggregate::{AggregateSpec, aggregate_delta};
use crate::coordinator::StepOutcome;
use crate::error::Result;
use crate::extract::extract_delta;
use crate::merge::MergeEngine;
use crate::tables;
use crate::watermark::last_ingested_at;

async fn run_metric_step(
    engine: &MergeEngine,
    source: TableRef,
    target: TableRef,
    schema: TableSchema,
    agg: AggregateSpec,
    keys: &[&str],
) -> Result<StepOutcome> {
    let warehouse = engine.warehouse();
    let watermark = last_ingested_at(warehouse.as_ref(), &target).await;
    let delta = extract_delta(warehouse.as_ref(), &source, watermark).await?;
    if delta.is_empty() {
        tracing::info!(table = %target, "no new data; step exits early");
        return Ok(StepOutcome::NoNewData);
    }

    let candidate = aggregate_delta(&agg, &delta)?;
    if candidate.is_empty() {
        tracing::info!(table = %target, "delta produced no aggregate rows");
        return Ok(StepOutcome::NothingValid);
    }

    let spec = MergeSpec::upsert(keys, &schema.column_names());
    let outcome = engine.merge_into(&target, &schema, &candidate, &spec).await?;
    Ok(StepOutcome::Merged(outcome))
}

/// Recomputes `gold.user_metrics` from the cleaned-events delta.
pub(crate) async fn run_user_metrics(engine: &MergeEngine) -> Result<StepOutcome> {
    run_metric_step(
        engine,
        tables::silver_events(),
        tables::gold_user_metrics(),
        tables::gold_user_metrics_schema(),
        crate::aggregate::user_metric_spec(),
        &["user_id"],
    )
    .instrument(step_span("gold", "users"))
    .await
}

/// Recomputes `gold.session_metrics` from the session-events delta.
pub(crate) async fn run_session_metrics(engine: &MergeEngine) -> Result<StepOutcome> {
    run_metric_step(
        engine,
        tables::silver_session_events(),
        tables::gold_session_metrics(),
        tables::gold_session_metrics_schema(),
        crate::aggregate::session_metric_spec(),
        &["session_id"],
    )
    .instrument(step_span("gold", "sessions"))
    .await
}

/// Recomputes `gold.product_metrics` from the cleaned-events delta.
pub(crate) async fn run_product_metrics(engine: &MergeEngine) -> Result<StepOutcome> {
    run_metric_step(
        engine,
        tables::silver_events(),
        tables::gold_product_metrics(),
        tables::gold_product_metrics_schema(),
        crate::aggregate::product_metric_spec(),
        &["product_id"],
    )
    .instrument(step_span("gold", "products"))
    .await
}
