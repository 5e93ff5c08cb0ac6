//! Command-line interface definitions for the `entwine` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use logging::LogArgs;

/// Command-line interface for the `entwine` binary.
#[derive(Parser, Debug)]
#[command(
    name = "entwine",
    about = "Run scripted entwine scenarios against an in-memory document",
    version
)]
pub struct Cli {
    /// Logging controls shared across entwine binaries.
    #[command(flatten)]
    pub log: LogArgs,

    /// What to do with the scenario.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register the scenario's rules and print the result of each call.
    Run(ScenarioArgs),
    /// Register the scenario's rules and print every namespace's rule table.
    Rules(ScenarioArgs),
}

/// Arguments shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ScenarioArgs {
    /// Scenario file in RON syntax.
    #[arg(value_name = "SCENARIO")]
    pub scenario: PathBuf,
}
