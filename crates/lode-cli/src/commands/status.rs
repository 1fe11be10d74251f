//! Status command - table row counts and watermarks.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use lode_core::Warehouse;
use lode_pipeline::tables;
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::{Config, OutputFormat};

/// Arguments for the status command.
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Restrict output to one schema (bronze, silver, or gold).
    #[arg(long)]
    pub schema: Option<String>,
}

/// One table's footprint in the warehouse.
#[derive(Debug, Serialize)]
struct TableStatus {
    table: String,
    exists: bool,
    rows: u64,
    watermark: Option<DateTime<Utc>>,
}

/// Execute the status command.
///
/// # Errors
///
/// Returns an error if the warehouse cannot be opened or read.
pub async fn execute(args: StatusArgs, config: &Config) -> Result<()> {
    let warehouse = config.settings.open_warehouse().await?;
    let result = collect(warehouse.as_ref(), args.schema.as_deref()).await;
    super::close_warehouse(warehouse.as_ref()).await;
    let statuses = result?;

    match config.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&statuses)?);
        }
        OutputFormat::Text => {
            for status in &statuses {
                if status.exists {
                    println!(
                        "  {:<24} {:>8} rows   watermark {}",
                        status.table,
                        status.rows,
                        watermark_label(status.watermark)
                    );
                } else {
                    println!("  {:<24} {}", status.table, "absent".dimmed());
                }
            }
        }
        OutputFormat::Table => {
            use tabled::{Table, Tabled};

            #[derive(Tabled)]
            struct StatusRow {
                #[tabled(rename = "Table")]
                table: String,
                #[tabled(rename = "Rows")]
                rows: String,
                #[tabled(rename = "Watermark")]
                watermark: String,
            }

            let rows: Vec<_> = statuses
                .iter()
                .map(|status| StatusRow {
                    table: status.table.clone(),
                    rows: if status.exists {
                        status.rows.to_string()
                    } else {
                        "absent".to_string()
                    },
                    watermark: watermark_label(status.watermark),
                })
                .collect();

            println!("{}", Table::new(rows));
        }
    }

    Ok(())
}

async fn collect(
    warehouse: &dyn Warehouse,
    schema: Option<&str>,
) -> lode_pipeline::Result<Vec<TableStatus>> {
    let mut statuses = Vec::new();
    for (table, _) in tables::all_tables() {
        if schema.is_some_and(|wanted| table.schema != wanted) {
            continue;
        }
        let exists = warehouse.table_exists(&table).await?;
        let (rows, watermark) = if exists {
            (
                warehouse.row_count(&table).await?,
                warehouse.max_timestamp(&table, tables::INGESTED_AT).await?,
            )
        } else {
            (0, None)
        };
        statuses.push(TableStatus {
            table: table.to_string(),
            exists,
            rows,
            watermark,
        });
    }
    Ok(statuses)
}

fn watermark_label(watermark: Option<DateTime<Utc>>) -> String {
    watermark.map_or_else(|| "-".to_string(), |ts| ts.to_rfc3339())
}
