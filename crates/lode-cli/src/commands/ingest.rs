//! Ingest command - land producer files in the bronze tables.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use lode_core::MergeOutcome;
use lode_pipeline::MergeEngine;
use lode_pipeline::ingest::{ingest_events_csv, ingest_sessions_json};
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::{Config, OutputFormat};

/// Arguments for the ingest command.
#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Events CSV to land in bronze.events.
    #[arg(long)]
    pub events: Option<PathBuf>,

    /// Sessions JSON to land in bronze.sessions.
    #[arg(long)]
    pub sessions: Option<PathBuf>,
}

/// Per-file merge counts for one ingest invocation.
#[derive(Debug, Serialize)]
struct IngestReport {
    events: Option<MergeOutcome>,
    sessions: Option<MergeOutcome>,
}

/// Execute the ingest command.
///
/// # Errors
///
/// Returns an error if no file was given, a file cannot be read, or the
/// bronze merge fails.
pub async fn execute(args: IngestArgs, config: &Config) -> Result<()> {
    if args.events.is_none() && args.sessions.is_none() {
        anyhow::bail!("Provide --events and/or --sessions");
    }

    let warehouse = config.settings.open_warehouse().await?;
    let engine = MergeEngine::with_retry(warehouse, config.settings.merge_retry.clone());
    let result = land(&engine, &args).await;
    super::close_warehouse(engine.warehouse().as_ref()).await;
    let report = result?;

    match config.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text | OutputFormat::Table => {
            if let Some(outcome) = report.events {
                println!(
                    "Events landed: {} inserted, {} updated",
                    format!("{}", outcome.inserted).green(),
                    outcome.updated
                );
            }
            if let Some(outcome) = report.sessions {
                println!(
                    "Sessions landed: {} inserted, {} updated",
                    format!("{}", outcome.inserted).green(),
                    outcome.updated
                );
            }
        }
    }

    Ok(())
}

async fn land(engine: &MergeEngine, args: &IngestArgs) -> lode_pipeline::Result<IngestReport> {
    let events = match &args.events {
        Some(path) => Some(ingest_events_csv(engine, path).await?),
        None => None,
    };
    let sessions = match &args.sessions {
        Some(path) => Some(ingest_sessions_json(engine, path).await?),
        None => None,
    };
    Ok(IngestReport { events, sessions })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_files_parse_independently() {
        use clap::Parser;

        #[derive(Parser)]
        struct TestCli {
            #[command(flatten)]
            args: IngestArgs,
        }

        let cli = TestCli::parse_from(["test", "--events", "data/raw/events.csv"]);
        assert_eq!(cli.args.events, Some(PathBuf::from("data/raw/events.csv")));
        assert!(cli.args.sessions.is_none());

        let cli = TestCli::parse_from([
            "test",
            "--events",
            "e.csv",
            "--sessions",
            "s.json",
        ]);
        assert!(cli.args.events.is_some());
        assert!(cli.args.sessions.is_some());
    }
}
