//! Run command - run the silver and gold pipeline stages.

use anyhow::Result;
use clap::{Args, Subcommand};
use lode_pipeline::{Coordinator, GoldStep, SilverStep, StageReport, StepOutcome};
use owo_colors::OwoColorize;

use crate::{Config, OutputFormat};

/// Arguments for the run command.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Stage to run.
    #[command(subcommand)]
    pub stage: Stage,
}

/// Pipeline stage selection.
#[derive(Debug, Subcommand)]
pub enum Stage {
    /// Bronze to silver cleaning steps.
    Silver {
        /// Restrict the stage to one step.
        #[arg(long, value_enum, default_value = "all")]
        step: SilverStepArg,
    },
    /// Silver to gold aggregation steps.
    Gold {
        /// Restrict the stage to one step.
        #[arg(long, value_enum, default_value = "all")]
        step: GoldStepArg,
    },
    /// Both stages in order.
    All,
}

/// Silver steps selectable from the command line.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum SilverStepArg {
    /// Both silver steps.
    #[default]
    All,
    /// Only cleaned events.
    Events,
    /// Only flattened session events.
    Sessions,
}

impl From<SilverStepArg> for SilverStep {
    fn from(arg: SilverStepArg) -> Self {
        match arg {
            SilverStepArg::All => Self::All,
            SilverStepArg::Events => Self::Events,
            SilverStepArg::Sessions => Self::Sessions,
        }
    }
}

/// Gold steps selectable from the command line.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum GoldStepArg {
    /// All three metric steps.
    #[default]
    All,
    /// Only per-user metrics.
    Users,
    /// Only per-session metrics.
    Sessions,
    /// Only per-product metrics.
    Products,
}

impl From<GoldStepArg> for GoldStep {
    fn from(arg: GoldStepArg) -> Self {
        match arg {
            GoldStepArg::All => Self::All,
            GoldStepArg::Users => Self::Users,
            GoldStepArg::Sessions => Self::Sessions,
            GoldStepArg::Products => Self::Products,
        }
    }
}

/// Execute the run command.
///
/// # Errors
///
/// Returns an error if the warehouse cannot be opened or a stage fails.
pub async fn execute(args: RunArgs, config: &Config) -> Result<()> {
    let warehouse = config.settings.open_warehouse().await?;
    let coordinator = Coordinator::with_settings(warehouse, &config.settings);
    let result = dispatch(&coordinator, &args.stage).await;
    coordinator.close().await;
    let reports = result?;

    render(&reports, config)
}

async fn dispatch(
    coordinator: &Coordinator,
    stage: &Stage,
) -> lode_pipeline::Result<Vec<StageReport>> {
    match stage {
        Stage::Silver { step } => Ok(vec![coordinator.run_silver((*step).into()).await?]),
        Stage::Gold { step } => Ok(vec![coordinator.run_gold((*step).into()).await?]),
        Stage::All => coordinator.run_all().await,
    }
}

fn render(reports: &[StageReport], config: &Config) -> Result<()> {
    match config.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(reports)?);
        }
        OutputFormat::Text => {
            for report in reports {
                println!("{}", report.stage.bold());
                for step in &report.steps {
                    println!("  {:<10} {}", step.entity, outcome_colored(step.outcome));
                }
            }
        }
        OutputFormat::Table => {
            use tabled::{Table, Tabled};

            #[derive(Tabled)]
            struct StepRow {
                #[tabled(rename = "Stage")]
                stage: String,
                #[tabled(rename = "Step")]
                step: String,
                #[tabled(rename = "Outcome")]
                outcome: String,
            }

            let rows: Vec<_> = reports
                .iter()
                .flat_map(|report| {
                    report.steps.iter().map(|step| StepRow {
                        stage: report.stage.clone(),
                        step: step.entity.clone(),
                        outcome: outcome_plain(step.outcome),
                    })
                })
                .collect();

            println!("{}", Table::new(rows));
        }
    }

    Ok(())
}

fn outcome_plain(outcome: StepOutcome) -> String {
    match outcome {
        StepOutcome::NoNewData => "no new data".to_string(),
        StepOutcome::NothingValid => "nothing valid".to_string(),
        StepOutcome::Merged(counts) => {
            format!("{} inserted, {} updated", counts.inserted, counts.updated)
        }
    }
}

fn outcome_colored(outcome: StepOutcome) -> String {
    match outcome {
        StepOutcome::NoNewData => "no new data".dimmed().to_string(),
        StepOutcome::NothingValid => "nothing valid".yellow().to_string(),
        StepOutcome::Merged(counts) => format!(
            "{} ({} inserted, {} updated)",
            "merged".green(),
            counts.inserted,
            counts.updated
        ),
    }
}
