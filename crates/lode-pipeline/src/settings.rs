//! Pipeline configuration.
//!
//! Settings come from `LODE_*` environment variables (the CLI layers its
//! own flags on top). Validation happens once, pre-flight, so a broken
//! configuration fails before any stage touches the warehouse.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use lode_core::{LocalWarehouse, LogFormat, MemoryWarehouse, RetryPolicy, Warehouse};

use crate::error::{Error, Result};

/// Which warehouse backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Parquet files under a local directory.
    #[default]
    Local,
    /// In-memory tables, lost when the process exits.
    Memory,
}

/// Pipeline settings.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Warehouse backend to open.
    pub backend: BackendKind,
    /// Root directory for the local backend.
    pub data_dir: Option<PathBuf>,
    /// Log output format.
    pub log_format: LogFormat,
    /// Retry policy applied to the conditional upsert.
    pub merge_retry: RetryPolicy,
}

impl Settings {
    /// Reads settings from `LODE_*` environment variables.
    ///
    /// Unset variables keep their defaults; set-but-invalid values are
    /// configuration errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for unparsable variable values.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let mut settings = Self::default();

        if let Some(raw) = get("LODE_WAREHOUSE") {
            settings.backend = match raw.to_ascii_lowercase().as_str() {
                "local" => BackendKind::Local,
                "memory" => BackendKind::Memory,
                other => {
                    return Err(Error::config(format!(
                        "LODE_WAREHOUSE must be local or memory, got {other}"
                    )))
                }
            };
        }
        if let Some(raw) = get("LODE_DATA_DIR") {
            settings.data_dir = Some(PathBuf::from(raw));
        }
        if let Some(raw) = get("LODE_LOG_FORMAT") {
            settings.log_format = match raw.to_ascii_lowercase().as_str() {
                "pretty" => LogFormat::Pretty,
                "json" => LogFormat::Json,
                other => {
                    return Err(Error::config(format!(
                        "LODE_LOG_FORMAT must be pretty or json, got {other}"
                    )))
                }
            };
        }
        if let Some(raw) = get("LODE_MERGE_MAX_ATTEMPTS") {
            settings.merge_retry.max_attempts = raw.parse().map_err(|_| {
                Error::config(format!("LODE_MERGE_MAX_ATTEMPTS must be an integer, got {raw}"))
            })?;
        }
        if let Some(raw) = get("LODE_MERGE_BACKOFF_MS") {
            let millis: u64 = raw.parse().map_err(|_| {
                Error::config(format!("LODE_MERGE_BACKOFF_MS must be an integer, got {raw}"))
            })?;
            settings.merge_retry.initial_backoff = Duration::from_millis(millis);
        }
        Ok(settings)
    }

    /// Pre-flight completeness check. Called before any stage runs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when required settings are missing.
    pub fn validate(&self) -> Result<()> {
        if self.backend == BackendKind::Local && self.data_dir.is_none() {
            return Err(Error::config(
                "local warehouse requires a data directory (set LODE_DATA_DIR or --data-dir)",
            ));
        }
        if self.merge_retry.max_attempts == 0 {
            return Err(Error::config(
                "merge retry budget must allow at least one attempt",
            ));
        }
        Ok(())
    }

    /// Validates and opens the configured warehouse backend.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on invalid settings and [`Error::Warehouse`]
    /// when the backend cannot be opened.
    pub async fn open_warehouse(&self) -> Result<Arc<dyn Warehouse>> {
        self.validate()?;
        match self.backend {
            BackendKind::Memory => {
                tracing::warn!("memory warehouse selected; tables will not survive the process");
                Ok(Arc::new(MemoryWarehouse::new()))
            }
            BackendKind::Local => {
                let root = self.data_dir.clone().ok_or_else(|| {
                    Error::config("local warehouse requires a data directory")
                })?;
                Ok(Arc::new(LocalWarehouse::open(root).await?))
            }
        }
    }
}
