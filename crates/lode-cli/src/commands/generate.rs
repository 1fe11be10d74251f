//! Generate command - write synthetic producer files.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use lode_pipeline::synth::{Generator, write_events_csv, write_sessions_json};

use crate::{Config, OutputFormat};

/// Arguments for the generate command.
#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Distinct users to draw from.
    #[arg(long, default_value = "10")]
    pub users: u32,

    /// Raw events to generate.
    #[arg(long, default_value = "50")]
    pub events: u32,

    /// Raw sessions to generate.
    #[arg(long, default_value = "10")]
    pub sessions: u32,

    /// Seed for reproducible output.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Where to write the events CSV.
    #[arg(long, default_value = "data/raw/events.csv")]
    pub events_out: PathBuf,

    /// Where to write the sessions JSON.
    #[arg(long, default_value = "data/raw/sessions.json")]
    pub sessions_out: PathBuf,
}

/// Execute the generate command.
///
/// # Errors
///
/// Returns an error if an output file cannot be written.
pub async fn execute(args: GenerateArgs, config: &Config) -> Result<()> {
    let mut generator = Generator::new(args.seed);
    let events = generator.events(args.events, args.users);
    let sessions = generator.sessions(args.sessions, args.users);

    write_events_csv(&args.events_out, &events).await?;
    write_sessions_json(&args.sessions_out, &sessions).await?;

    match config.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "events": events.len(),
                    "eventsPath": args.events_out.display().to_string(),
                    "sessions": sessions.len(),
                    "sessionsPath": args.sessions_out.display().to_string(),
                }))?
            );
        }
        OutputFormat::Text | OutputFormat::Table => {
            println!(
                "Wrote {} events to {}",
                events.len(),
                args.events_out.display()
            );
            println!(
                "Wrote {} sessions to {}",
                sessions.len(),
                args.sessions_out.display()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_a_small_dataset() {
        use clap::Parser;

        #[derive(Parser)]
        struct TestCli {
            #[command(flatten)]
            args: GenerateArgs,
        }

        let cli = TestCli::parse_from(["test"]);
        assert_eq!(cli.args.users, 10);
        assert_eq!(cli.args.events, 50);
        assert_eq!(cli.args.sessions, 10);
        assert_eq!(cli.args.events_out, PathBuf::from("data/raw/events.csv"));
        assert_eq!(cli.args.sessions_out, PathBuf::from("data/raw/sessions.json"));
        assert!(cli.args.seed.is_none());
    }

    #[test]
    fn seed_makes_output_reproducible() {
        use clap::Parser;

        #[derive(Parser)]
        struct TestCli {
            #[command(flatten)]
            args: GenerateArgs,
        }

        let cli = TestCli::parse_from(["test", "--seed", "42", "--events", "5"]);
        assert_eq!(cli.args.seed, Some(42));
        assert_eq!(cli.args.events, 5);
    }
}
