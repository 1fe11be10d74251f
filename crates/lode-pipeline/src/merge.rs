//! The merge engine: staged conditional upsert with bootstrap and retry.

use std::sync::Arc;

use lode_core::{
    Batch, MergeOutcome, MergeSpec, RetryPolicy, TableRef, TableSchema, Warehouse, retry_transient,
};

use crate::error::{Error, Result};
use crate::tables;

/// Stages candidate batches and upserts them into target tables.
///
/// One engine is shared by every stage of a run. It owns the warehouse
/// handle and the retry policy for the upsert step; stage runners borrow
/// the handle for their reads.
pub struct MergeEngine {
    warehouse: Arc<dyn Warehouse>,
    retry: RetryPolicy,
}

impl MergeEngine {
    /// Engine with the default retry policy.
    #[must_use]
    pub fn new(warehouse: Arc<dyn Warehouse>) -> Self {
        Self {
            warehouse,
            retry: RetryPolicy::default(),
        }
    }

    /// Engine with an explicit retry policy for the upsert step.
    #[must_use]
    pub fn with_retry(warehouse: Arc<dyn Warehouse>, retry: RetryPolicy) -> Self {
        Self { warehouse, retry }
    }

    /// Warehouse handle this engine writes through.
    #[must_use]
    pub fn warehouse(&self) -> &Arc<dyn Warehouse> {
        &self.warehouse
    }

    /// Stages `candidate` and conditionally upserts it into `target`.
    ///
    /// A missing target is created directly from the candidate (bootstrap)
    /// with every row counted as inserted and no predicate evaluation.
    /// Otherwise the candidate replaces the target's staging table
    /// wholesale and a single conditional upsert runs, retried on
    /// transient store errors per the engine's policy. Constraint
    /// violations are never retried.
    ///
    /// # Errors
    ///
    /// [`Error::Warehouse`] for existence-check and staging failures,
    /// [`Error::Merge`] when the upsert itself fails after retries.
    pub async fn merge_into(
        &self,
        target: &TableRef,
        schema: &TableSchema,
        candidate: &Batch,
        spec: &MergeSpec,
    ) -> Result<MergeOutcome> {
        spec.validate()?;

        if !self.warehouse.table_exists(target).await? {
            self.warehouse.overwrite(target, schema, candidate).await?;
            let outcome = MergeOutcome {
                inserted: candidate.len() as u64,
                updated: 0,
            };
            tracing::info!(
                table = %target,
                inserted = outcome.inserted,
                "target bootstrapped from candidate"
            );
            return Ok(outcome);
        }

        let staging = tables::staging_for(target);
        self.warehouse.overwrite(&staging, schema, candidate).await?;

        let outcome = retry_transient(&self.retry, || {
            self.warehouse.merge(target, &staging, spec)
        })
        .await
        .map_err(|source| {
            tracing::error!(
                table = %target,
                staging = %staging,
                error = %source,
                "conditional upsert failed"
            );
            Error::Merge {
                table: target.to_string(),
                source,
            }
        })?;

        tracing::info!(
            table = %target,
            inserted = outcome.inserted,
            updated = outcome.updated,
            "merge complete"
        );
        Ok(outcome)
    }
}
