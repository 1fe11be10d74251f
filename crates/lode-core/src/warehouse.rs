//! Warehouse abstraction: the contract every backing store implements.
//!
//! The contract is deliberately statement-shaped: each method corresponds to
//! one store-side statement and is atomic on its own. Nothing here spans
//! statements; multi-statement sequencing (watermark read, staging write,
//! merge) belongs to the pipeline layer, which also owns the decision of
//! what may be retried.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::batch::{Batch, Row, RowKey};
use crate::error::{Error, Result};
use crate::query::{MergeSpec, Predicate, matches_all};
use crate::table::{TableRef, TableSchema};
use crate::value::Value;

/// Row counts reported by a conditional upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MergeOutcome {
    /// Rows inserted because no target row matched their key.
    pub inserted: u64,
    /// Rows whose matching target row was rewritten.
    pub updated: u64,
}

/// The store contract used by every pipeline stage.
///
/// Implementations must make each method atomic: a concurrent reader sees
/// either the state before a statement or the state after it, never a
/// partial write. The handle is explicitly passed by callers and released
/// via [`Warehouse::close`]; there is no ambient global session.
#[async_trait]
pub trait Warehouse: Send + Sync + 'static {
    /// Creates the table with the given schema if it does not exist.
    /// Existing tables are left untouched, whatever their schema.
    async fn ensure_table(&self, table: &TableRef, schema: &TableSchema) -> Result<()>;

    /// Returns true if the table exists.
    async fn table_exists(&self, table: &TableRef) -> Result<bool>;

    /// Reads rows matching all of the given filters, in stored order.
    ///
    /// An empty filter list reads the whole table. Returns
    /// `Error::NotFound` if the table does not exist.
    async fn scan(&self, table: &TableRef, filters: &[Predicate]) -> Result<Batch>;

    /// Returns the maximum timestamp in the given column, ignoring nulls.
    ///
    /// Returns `Ok(None)` for an empty table or a column with no timestamp
    /// values, and `Error::NotFound` if the table does not exist.
    async fn max_timestamp(&self, table: &TableRef, column: &str)
        -> Result<Option<DateTime<Utc>>>;

    /// Returns the number of rows in the table.
    async fn row_count(&self, table: &TableRef) -> Result<u64>;

    /// Replaces the table's contents and schema with the given batch.
    /// Creates the table if it does not exist. Rows are projected to the
    /// schema: extra columns are dropped, missing columns become null.
    async fn overwrite(&self, table: &TableRef, schema: &TableSchema, batch: &Batch)
        -> Result<()>;

    /// Executes a conditional upsert of `source` into `target` as one
    /// atomic statement: source rows whose key matches a target row rewrite
    /// that row's update columns, all others are inserted.
    ///
    /// Source rows sharing a key are folded last-writer-wins before
    /// application, so the target never ends up with duplicate keys.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if either table is missing and
    /// `Error::Constraint` if a key column is null on any row.
    async fn merge(
        &self,
        target: &TableRef,
        source: &TableRef,
        spec: &MergeSpec,
    ) -> Result<MergeOutcome>;

    /// Releases the session. Implementations flush or drop whatever the
    /// handle holds; callers invoke this on every exit path.
    async fn close(&self) -> Result<()>;
}

/// Projects a row onto a schema: schema columns only, absent values null.
pub(crate) fn project_to_schema(schema: &TableSchema, row: &Row) -> Row {
    let mut out = Row::new();
    for column in &schema.columns {
        let value = row.get(&column.name).cloned().unwrap_or(Value::Null);
        out.set(column.name.as_str(), value);
    }
    out
}

/// Applies the conditional-upsert fold shared by all backends.
///
/// Mutates `target_rows` in place and returns the inserted/updated counts.
pub(crate) fn apply_merge(
    target_rows: &mut Vec<Row>,
    source_rows: &[Row],
    spec: &MergeSpec,
) -> Result<MergeOutcome> {
    spec.validate()?;

    let mut index: HashMap<RowKey, usize> = HashMap::with_capacity(target_rows.len());
    for (position, row) in target_rows.iter().enumerate() {
        let key = row.key(&spec.key_columns)?;
        if index.insert(key.clone(), position).is_some() {
            return Err(Error::constraint(format!(
                "target table has duplicate merge key {key}"
            )));
        }
    }

    // Fold staged rows by key, last writer wins, preserving first-seen order.
    let mut staged: Vec<(RowKey, Row)> = Vec::with_capacity(source_rows.len());
    let mut staged_index: HashMap<RowKey, usize> = HashMap::with_capacity(source_rows.len());
    for row in source_rows {
        let key = row.key(&spec.key_columns)?;
        if let Some(&position) = staged_index.get(&key) {
            staged[position].1 = row.clone();
        } else {
            staged_index.insert(key.clone(), staged.len());
            staged.push((key, row.clone()));
        }
    }

    let mut outcome = MergeOutcome::default();
    for (key, row) in staged {
        if let Some(&position) = index.get(&key) {
            let target = &mut target_rows[position];
            for column in &spec.update_columns {
                let value = row.get(column).cloned().unwrap_or(Value::Null);
                target.set(column.as_str(), value);
            }
            outcome.updated += 1;
        } else {
            let mut inserted = Row::new();
            for column in &spec.insert_columns {
                let value = row.get(column).cloned().unwrap_or(Value::Null);
                inserted.set(column.as_str(), value);
            }
            index.insert(key, target_rows.len());
            target_rows.push(inserted);
            outcome.inserted += 1;
        }
    }

    Ok(outcome)
}

#[derive(Debug, Clone)]
struct StoredTable {
    schema: TableSchema,
    rows: Vec<Row>,
}

/// In-memory warehouse for tests and throwaway runs.
///
/// Thread-safe via `RwLock`; every statement runs under one lock
/// acquisition, which gives it the same statement atomicity as a real
/// store. Holds no durable state.
#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    tables: Arc<RwLock<HashMap<TableRef, StoredTable>>>,
}

impl MemoryWarehouse {
    /// Creates a new empty memory warehouse.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read_lock(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<TableRef, StoredTable>>> {
        self.tables.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })
    }

    fn write_lock(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<TableRef, StoredTable>>> {
        self.tables.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn ensure_table(&self, table: &TableRef, schema: &TableSchema) -> Result<()> {
        let mut tables = self.write_lock()?;
        tables.entry(table.clone()).or_insert_with(|| StoredTable {
            schema: schema.clone(),
            rows: Vec::new(),
        });
        Ok(())
    }

    async fn table_exists(&self, table: &TableRef) -> Result<bool> {
        Ok(self.read_lock()?.contains_key(table))
    }

    async fn scan(&self, table: &TableRef, filters: &[Predicate]) -> Result<Batch> {
        let tables = self.read_lock()?;
        let stored = tables
            .get(table)
            .ok_or_else(|| Error::NotFound(format!("table not found: {table}")))?;

        let mut batch = Batch::new();
        for row in &stored.rows {
            if matches_all(row, filters)? {
                batch.push(row.clone());
            }
        }
        Ok(batch)
    }

    async fn max_timestamp(
        &self,
        table: &TableRef,
        column: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        let tables = self.read_lock()?;
        let stored = tables
            .get(table)
            .ok_or_else(|| Error::NotFound(format!("table not found: {table}")))?;
        Ok(stored
            .rows
            .iter()
            .filter_map(|row| row.timestamp_value(column))
            .max())
    }

    async fn row_count(&self, table: &TableRef) -> Result<u64> {
        let tables = self.read_lock()?;
        let stored = tables
            .get(table)
            .ok_or_else(|| Error::NotFound(format!("table not found: {table}")))?;
        Ok(stored.rows.len() as u64)
    }

    async fn overwrite(
        &self,
        table: &TableRef,
        schema: &TableSchema,
        batch: &Batch,
    ) -> Result<()> {
        let rows = batch
            .rows()
            .iter()
            .map(|row| project_to_schema(schema, row))
            .collect();
        let mut tables = self.write_lock()?;
        tables.insert(
            table.clone(),
            StoredTable {
                schema: schema.clone(),
                rows,
            },
        );
        Ok(())
    }

    async fn merge(
        &self,
        target: &TableRef,
        source: &TableRef,
        spec: &MergeSpec,
    ) -> Result<MergeOutcome> {
        let mut tables = self.write_lock()?;
        let source_rows = tables
            .get(source)
            .ok_or_else(|| Error::NotFound(format!("table not found: {source}")))?
            .rows
            .clone();
        let stored = tables
            .get_mut(target)
            .ok_or_else(|| Error::NotFound(format!("table not found: {target}")))?;
        apply_merge(&mut stored.rows, &source_rows, spec)
    }

    async fn close(&self) -> Result<()> {
        // Nothing held beyond process memory.
        Ok(())
    }
}
