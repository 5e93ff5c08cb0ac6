//! Entry point for the `entwine` binary.

mod cli;
mod error;
mod scenario;

use std::process;

use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, registry};

use crate::{
    cli::{Cli, Commands},
    error::Result,
    scenario::Scenario,
};

fn main() {
    if let Err(err) = run() {
        error!("{err}");
        eprintln!("error: {err}");
        process::exit(1);
    }
}

/// Parse CLI arguments, install logging, and dispatch to the chosen subcommand.
fn run() -> Result<()> {
    let Cli { log, command } = Cli::parse();
    let log_spec = log.spec();
    let env_filter = logging::env_filter_from_spec(&log_spec);
    registry()
        .with(env_filter)
        .with(fmt::layer().without_time())
        .try_init()
        .ok();

    match command {
        Commands::Run(args) => {
            let scenario = Scenario::from_path(&args.scenario)?;
            for line in scenario.run()? {
                println!("{line}");
            }
        }
        Commands::Rules(args) => {
            let scenario = Scenario::from_path(&args.scenario)?;
            for line in scenario.rule_table()? {
                println!("{line}");
            }
        }
    }
    Ok(())
}
