//! Local filesystem warehouse backed by Parquet files.
//!
//! Each table lives under `<root>/<schema>/<name>.parquet` with a JSON
//! sidecar (`<name>.schema.json`) describing the column layout. Writes go
//! through a temp file and an atomic rename so a crashed run never leaves
//! a half-written table behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::batch::Batch;
use crate::error::{Error, Result};
use crate::parquet::{count_rows, decode_table, encode_table};
use crate::query::{MergeSpec, Predicate, matches_all};
use crate::table::{TableRef, TableSchema};
use crate::warehouse::{MergeOutcome, Warehouse, apply_merge, project_to_schema};

/// Warehouse storing one Parquet file per table under a root directory.
#[derive(Debug)]
pub struct LocalWarehouse {
    root: PathBuf,
    // Serializes writers; readers go straight to the filesystem and rely
    // on the atomic rename for a consistent view.
    write_lock: Mutex<()>,
}

impl LocalWarehouse {
    /// Opens a warehouse rooted at the given directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] when the root directory cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            Error::storage_with_source(format!("creating warehouse root {}", root.display()), e)
        })?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// Root directory this warehouse reads and writes under.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn data_path(&self, table: &TableRef) -> PathBuf {
        self.root
            .join(&table.schema)
            .join(format!("{}.parquet", table.name))
    }

    fn sidecar_path(&self, table: &TableRef) -> PathBuf {
        self.root
            .join(&table.schema)
            .join(format!("{}.schema.json", table.name))
    }

    async fn read_bytes(&self, path: &Path, table: &TableRef) -> Result<Bytes> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("table not found: {table}")))
            }
            Err(e) => Err(Error::storage_with_source(
                format!("reading {}", path.display()),
                e,
            )),
        }
    }

    async fn load_schema(&self, table: &TableRef) -> Result<TableSchema> {
        let bytes = self.read_bytes(&self.sidecar_path(table), table).await?;
        serde_json::from_slice(&bytes).map_err(|e| Error::Serialization {
            message: format!("schema sidecar for {table}: {e}"),
        })
    }

    async fn load(&self, table: &TableRef) -> Result<(TableSchema, Batch)> {
        let schema = self.load_schema(table).await?;
        let bytes = self.read_bytes(&self.data_path(table), table).await?;
        let batch = decode_table(&schema, bytes)?;
        Ok((schema, batch))
    }

    /// Writes both files via temp-and-rename. Callers hold `write_lock`.
    async fn store(&self, table: &TableRef, schema: &TableSchema, batch: &Batch) -> Result<()> {
        let dir = self.root.join(&table.schema);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            Error::storage_with_source(format!("creating {}", dir.display()), e)
        })?;

        let data = encode_table(schema, batch)?;
        write_atomic(&self.data_path(table), &data).await?;

        let sidecar = serde_json::to_vec_pretty(schema).map_err(|e| Error::Serialization {
            message: format!("schema sidecar for {table}: {e}"),
        })?;
        write_atomic(&self.sidecar_path(table), &sidecar).await?;
        Ok(())
    }
}

async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, contents)
        .await
        .map_err(|e| Error::storage_with_source(format!("writing {}", tmp.display()), e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| Error::storage_with_source(format!("renaming into {}", path.display()), e))
}

#[async_trait]
impl Warehouse for LocalWarehouse {
    async fn ensure_table(&self, table: &TableRef, schema: &TableSchema) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self.table_exists(table).await? {
            return Ok(());
        }
        self.store(table, schema, &Batch::new()).await
    }

    async fn table_exists(&self, table: &TableRef) -> Result<bool> {
        tokio::fs::try_exists(&self.sidecar_path(table))
            .await
            .map_err(|e| Error::storage_with_source(format!("checking {table}"), e))
    }

    async fn scan(&self, table: &TableRef, filters: &[Predicate]) -> Result<Batch> {
        let (_, batch) = self.load(table).await?;
        let mut out = Batch::new();
        for row in batch.into_rows() {
            if matches_all(&row, filters)? {
                out.push(row);
            }
        }
        Ok(out)
    }

    async fn max_timestamp(
        &self,
        table: &TableRef,
        column: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        let (_, batch) = self.load(table).await?;
        Ok(batch.max_timestamp(column))
    }

    async fn row_count(&self, table: &TableRef) -> Result<u64> {
        let bytes = self.read_bytes(&self.data_path(table), table).await?;
        count_rows(bytes)
    }

    async fn overwrite(&self, table: &TableRef, schema: &TableSchema, batch: &Batch) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let projected: Batch = batch
            .rows()
            .iter()
            .map(|row| project_to_schema(schema, row))
            .collect();
        self.store(table, schema, &projected).await
    }

    async fn merge(
        &self,
        target: &TableRef,
        source: &TableRef,
        spec: &MergeSpec,
    ) -> Result<MergeOutcome> {
        let _guard = self.write_lock.lock().await;
        let (schema, target_batch) = self.load(target).await?;
        let (_, source_batch) = self.load(source).await?;

        let mut rows = target_batch.into_rows();
        let outcome = apply_merge(&mut rows, source_batch.rows(), spec)?;
        self.store(target, &schema, &Batch::from_rows(rows)).await?;
        Ok(outcome)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Row;
    use crate::value::{DataType, Value};

    fn events_schema() -> TableSchema {
        TableSchema::new()
            .with("event_id", DataType::Int64)
            .with("event_type", DataType::String)
            .with("ingested_at", DataType::Timestamp)
    }

    fn event_row(id: i64, event_type: &str, micros: i64) -> Row {
        let ts = DateTime::from_timestamp_micros(micros).unwrap();
        Row::new()
            .with("event_id", Value::Int64(id))
            .with("event_type", Value::String(event_type.into()))
            .with("ingested_at", Value::Timestamp(ts))
    }

    #[tokio::test]
    async fn tables_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let table = TableRef::new("bronze", "events");
        let schema = events_schema();

        {
            let warehouse = LocalWarehouse::open(dir.path()).await.unwrap();
            warehouse
                .overwrite(
                    &table,
                    &schema,
                    &Batch::from_rows(vec![event_row(1, "view", 10), event_row(2, "purchase", 20)]),
                )
                .await
                .unwrap();
        }

        let reopened = LocalWarehouse::open(dir.path()).await.unwrap();
        assert!(reopened.table_exists(&table).await.unwrap());
        assert_eq!(reopened.row_count(&table).await.unwrap(), 2);
        let max = reopened
            .max_timestamp(&table, "ingested_at")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(max.timestamp_micros(), 20);
    }

    #[tokio::test]
    async fn missing_table_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let warehouse = LocalWarehouse::open(dir.path()).await.unwrap();
        let err = warehouse
            .scan(&TableRef::new("bronze", "ghosts"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn ensure_table_keeps_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let warehouse = LocalWarehouse::open(dir.path()).await.unwrap();
        let table = TableRef::new("bronze", "events");
        let schema = events_schema();

        warehouse
            .overwrite(&table, &schema, &Batch::from_rows(vec![event_row(1, "view", 10)]))
            .await
            .unwrap();
        warehouse.ensure_table(&table, &schema).await.unwrap();
        assert_eq!(warehouse.row_count(&table).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn scan_applies_filters() {
        let dir = tempfile::tempdir().unwrap();
        let warehouse = LocalWarehouse::open(dir.path()).await.unwrap();
        let table = TableRef::new("bronze", "events");

        warehouse
            .overwrite(
                &table,
                &events_schema(),
                &Batch::from_rows(vec![
                    event_row(1, "view", 10),
                    event_row(2, "purchase", 20),
                    event_row(3, "purchase", 30),
                ]),
            )
            .await
            .unwrap();

        let after_10 = warehouse
            .scan(
                &table,
                &[Predicate::Gt(
                    "ingested_at".into(),
                    Value::Timestamp(DateTime::from_timestamp_micros(10).unwrap()),
                )],
            )
            .await
            .unwrap();
        assert_eq!(after_10.len(), 2);
    }

    #[tokio::test]
    async fn merge_persists_counts_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let warehouse = LocalWarehouse::open(dir.path()).await.unwrap();
        let target = TableRef::new("silver", "events_cleaned");
        let staging = TableRef::new("staging", "silver_events_cleaned");
        let schema = events_schema();

        warehouse
            .overwrite(&target, &schema, &Batch::from_rows(vec![event_row(1, "VIEW", 10)]))
            .await
            .unwrap();
        warehouse
            .overwrite(
                &staging,
                &schema,
                &Batch::from_rows(vec![event_row(1, "view", 11), event_row(2, "purchase", 12)]),
            )
            .await
            .unwrap();

        let spec = MergeSpec::upsert(
            &["event_id"],
            &["event_id", "event_type", "ingested_at"],
        );
        let outcome = warehouse.merge(&target, &staging, &spec).await.unwrap();
        assert_eq!(outcome, MergeOutcome { inserted: 1, updated: 1 });

        let rows = warehouse.scan(&target, &[]).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.rows()[0].str_value("event_type"), Some("view"));
    }

    #[tokio::test]
    async fn overwrite_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let warehouse = LocalWarehouse::open(dir.path()).await.unwrap();
        let table = TableRef::new("staging", "silver_events_cleaned");
        let schema = events_schema();

        warehouse
            .overwrite(
                &table,
                &schema,
                &Batch::from_rows(vec![event_row(1, "view", 10), event_row(2, "view", 11)]),
            )
            .await
            .unwrap();
        warehouse
            .overwrite(&table, &schema, &Batch::from_rows(vec![event_row(3, "purchase", 12)]))
            .await
            .unwrap();

        let rows = warehouse.scan(&table, &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.rows()[0].int_value("event_id"), Some(3));
    }
}
