//! Stage sequencing and the run lifecycle.
//!
//! The coordinator owns the warehouse handle for the duration of one run:
//! it ensures the stage's target tables exist, runs the selected steps in
//! order, and releases the handle on every exit path. At most one runner
//! per entity is the caller's contract; nothing here takes locks.

use std::sync::Arc;

use lode_core::{MergeOutcome, TableRef, TableSchema, Warehouse, stage_span};
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::Result;
use crate::merge::MergeEngine;
use crate::settings::Settings;
use crate::tables;
use crate::{gold, silver};

/// Step selector for the silver stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SilverStep {
    /// Both silver tables.
    #[default]
    All,
    /// Only `silver.events_cleaned`.
    Events,
    /// Only `silver.session_events`.
    Sessions,
}

/// Step selector for the gold stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GoldStep {
    /// All three metric tables.
    #[default]
    All,
    /// Only `gold.user_metrics`.
    Users,
    /// Only `gold.session_metrics`.
    Sessions,
    /// Only `gold.product_metrics`.
    Products,
}

/// What one step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// Nothing above the watermark; no table was touched.
    NoNewData,
    /// A delta existed but no row survived cleaning or aggregation.
    NothingValid,
    /// A merge ran with these counts.
    Merged(MergeOutcome),
}

/// One step's entity name and outcome.
#[derive(Debug, Clone, Serialize)]
pub struct StepRun {
    /// Target entity: events, sessions, users, or products.
    pub entity: String,
    /// What happened.
    pub outcome: StepOutcome,
}

/// Everything one stage run did.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    /// Stage name, `silver` or `gold`.
    pub stage: String,
    /// Steps in execution order.
    pub steps: Vec<StepRun>,
}

/// Sequences pipeline stages over one warehouse session.
pub struct Coordinator {
    engine: MergeEngine,
    run_id: Uuid,
}

impl Coordinator {
    /// Coordinator over an explicit warehouse handle, default retry policy.
    #[must_use]
    pub fn new(warehouse: Arc<dyn Warehouse>) -> Self {
        Self {
            engine: MergeEngine::new(warehouse),
            run_id: Uuid::new_v4(),
        }
    }

    /// Coordinator with the retry policy taken from settings.
    #[must_use]
    pub fn with_settings(warehouse: Arc<dyn Warehouse>, settings: &Settings) -> Self {
        Self {
            engine: MergeEngine::with_retry(warehouse, settings.merge_retry.clone()),
            run_id: Uuid::new_v4(),
        }
    }

    /// Identifier stamped on this run's spans.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Warehouse handle this coordinator runs against.
    #[must_use]
    pub fn warehouse(&self) -> &Arc<dyn Warehouse> {
        self.engine.warehouse()
    }

    async fn ensure(&self, defs: Vec<(TableRef, TableSchema)>) -> Result<()> {
        for (table, schema) in defs {
            self.engine.warehouse().ensure_table(&table, &schema).await?;
        }
        Ok(())
    }

    /// Runs the bronze to silver stage for the selected steps.
    ///
    /// # Errors
    ///
    /// Propagates warehouse failures and failed merges; a failed merge
    /// aborts the stage rather than skipping the step.
    pub async fn run_silver(&self, step: SilverStep) -> Result<StageReport> {
        let run_id = self.run_id.to_string();
        async {
            self.ensure(tables::silver_tables()).await?;
            let mut steps = Vec::new();
            if matches!(step, SilverStep::All | SilverStep::Events) {
                let outcome = silver::run_events(&self.engine).await?;
                steps.push(StepRun {
                    entity: "events".into(),
                    outcome,
                });
            }
            if matches!(step, SilverStep::All | SilverStep::Sessions) {
                let outcome = silver::run_sessions(&self.engine).await?;
                steps.push(StepRun {
                    entity: "sessions".into(),
                    outcome,
                });
            }
            Ok(StageReport {
                stage: "silver".into(),
                steps,
            })
        }
        .instrument(stage_span("silver", &run_id))
        .await
    }

    /// Runs the silver to gold stage for the selected steps.
    ///
    /// # Errors
    ///
    /// Propagates warehouse failures and failed merges; a failed merge
    /// aborts the stage rather than skipping the step.
    pub async fn run_gold(&self, step: GoldStep) -> Result<StageReport> {
        let run_id = self.run_id.to_string();
        async {
            self.ensure(tables::gold_tables()).await?;
            let mut steps = Vec::new();
            if matches!(step, GoldStep::All | GoldStep::Users) {
                let outcome = gold::run_user_metrics(&self.engine).await?;
                steps.push(StepRun {
                    entity: "users".into(),
                    outcome,
                });
            }
            if matches!(step, GoldStep::All | GoldStep::Sessions) {
                let outcome = gold::run_session_metrics(&self.engine).await?;
                steps.push(StepRun {
                    entity: "sessions".into(),
                    outcome,
                });
            }
            if matches!(step, GoldStep::All | GoldStep::Products) {
                let outcome = gold::run_product_metrics(&self.engine).await?;
                steps.push(StepRun {
                    entity: "products".into(),
                    outcome,
                });
            }
            Ok(StageReport {
                stage: "gold".into(),
                steps,
            })
        }
        .instrument(stage_span("gold", &run_id))
        .await
    }

    /// Runs silver then gold in full.
    ///
    /// # Errors
    ///
    /// A silver failure aborts before gold runs.
    pub async fn run_all(&self) -> Result<Vec<StageReport>> {
        let silver = self.run_silver(SilverStep::All).await?;
        let gold = self.run_gold(GoldStep::All).await?;
        Ok(vec![silver, gold])
    }

    /// Releases the warehouse session.
    ///
    /// Close failures are logged and swallowed so they never mask the run
    /// result the caller is holding.
    pub async fn close(&self) {
        if let Err(error) = self.engine.warehouse().close().await {
            tracing::warn!(%error, "warehouse close failed");
        }
    }
}
