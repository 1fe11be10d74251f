//! Lode CLI - incremental warehouse pipeline from the command line.
//!
//! The main entry point for the `lode` CLI binary.

use anyhow::Result;
use clap::Parser;

use lode_cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config()?;
    lode_core::init_logging(config.settings.log_format);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match cli.command {
            Commands::Generate(args) => lode_cli::commands::generate::execute(args, &config).await,
            Commands::Ingest(args) => lode_cli::commands::ingest::execute(args, &config).await,
            Commands::Run(args) => lode_cli::commands::run::execute(args, &config).await,
            Commands::Status(args) => lode_cli::commands::status::execute(args, &config).await,
        }
    })
}
