//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `dbq` library that handles:
//! - Command-line argument parsing
//! - Logger initialization
//! - User-facing output formatting
//!
//! All core functionality is implemented in the library crate.

use anyhow::{Context, Result};
use clap::Parser;
use std::process;

use dbq::app::{print_outcome, run};
use dbq::config::Cli;
use dbq::initialization::init_logger_with;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = cli.log_level.clone();
    let log_format = cli.log_format.clone();
    init_logger_with(log_level.into(), log_format).context("Failed to initialize logger")?;

    match run(cli.command).await {
        Ok(outcome) => {
            print_outcome(&outcome).context("Failed to write results")?;
            Ok(())
        }
        Err(e) => {
            eprintln!("dbq error: {:#}", e);
            process::exit(1);
        }
    }
}
