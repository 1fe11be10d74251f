//! # lode-cli
//!
//! Command-line interface for the Lode warehouse pipeline.
//!
//! ## Commands
//!
//! - `lode generate` - Write synthetic producer files
//! - `lode ingest` - Land producer files in the bronze tables
//! - `lode run` - Run the silver and gold pipeline stages
//! - `lode status` - Show table row counts and watermarks
//!
//! ## Configuration
//!
//! The CLI uses environment variables or command-line flags for settings:
//!
//! - `LODE_WAREHOUSE` - Backend, `local` or `memory` (default: `local`)
//! - `LODE_DATA_DIR` - Root directory for the local backend
//! - `LODE_LOG_FORMAT` - `pretty` or `json` (default: `pretty`)
//! - `LODE_MERGE_MAX_ATTEMPTS` - Merge retry attempt limit (default: 3)
//! - `LODE_MERGE_BACKOFF_MS` - Initial merge retry backoff (default: 100)

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lode_core::LogFormat;
use lode_pipeline::{BackendKind, Settings};

/// Lode CLI - incremental warehouse pipeline from the command line.
#[derive(Debug, Parser)]
#[command(name = "lode")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Warehouse backend.
    #[arg(long, env = "LODE_WAREHOUSE", default_value = "local")]
    pub warehouse: BackendArg,

    /// Root directory for the local backend.
    #[arg(long, env = "LODE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Log output format.
    #[arg(long, env = "LODE_LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormatArg,

    /// Output format.
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Get the effective configuration.
    ///
    /// Settings start from the environment; the flags above override the
    /// backend, data directory, and log format.
    ///
    /// # Errors
    ///
    /// Returns [`lode_pipeline::Error::Config`] when an environment
    /// variable holds an unparsable value.
    pub fn config(&self) -> lode_pipeline::Result<Config> {
        let mut settings = Settings::from_env()?;
        settings.backend = self.warehouse.into();
        settings.data_dir = self.data_dir.clone();
        settings.log_format = self.log_format.into();
        Ok(Config {
            settings,
            format: self.format.clone(),
        })
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Write synthetic producer files.
    Generate(commands::generate::GenerateArgs),
    /// Land producer files in the bronze tables.
    Ingest(commands::ingest::IngestArgs),
    /// Run pipeline stages.
    Run(commands::run::RunArgs),
    /// Show table row counts and watermarks.
    Status(commands::status::StatusArgs),
}

/// Warehouse backend selection.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum BackendArg {
    /// Parquet files under the data directory.
    #[default]
    Local,
    /// In-memory tables, gone when the process exits.
    Memory,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Local => Self::Local,
            BackendArg::Memory => Self::Memory,
        }
    }
}

/// Log output selection.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum LogFormatArg {
    /// Human-readable log lines.
    #[default]
    Pretty,
    /// One JSON object per log line.
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Json => Self::Json,
        }
    }
}

/// Output format.
#[derive(Debug, Clone, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
    /// Table output.
    Table,
}

/// CLI configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Warehouse settings handed to the pipeline.
    pub settings: Settings,
    /// Output format.
    pub format: OutputFormat,
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn flags_override_environment_defaults() {
        let cli = Cli::parse_from([
            "lode",
            "--warehouse",
            "memory",
            "--data-dir",
            "/tmp/lode",
            "--format",
            "json",
            "status",
        ]);

        let config = cli.config().expect("config");
        assert_eq!(config.settings.backend, BackendKind::Memory);
        assert_eq!(config.settings.data_dir.as_deref(), Some(Path::new("/tmp/lode")));
        assert!(matches!(config.format, OutputFormat::Json));
    }

    #[test]
    fn status_needs_no_arguments() {
        let cli = Cli::parse_from(["lode", "status"]);
        assert!(matches!(cli.command, Commands::Status(_)));
    }
}
