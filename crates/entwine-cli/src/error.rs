//! Error handling for the entwine CLI.

use std::{io, result};

use thiserror::Error;

/// Convenient result type for CLI operations.
pub type Result<T> = result::Result<T, Error>;

/// Errors that can occur while loading or running a scenario.
#[derive(Debug, Error)]
pub enum Error {
    /// Wrapper for standard I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The scenario file is not valid RON for the scenario shape.
    #[error("Scenario parse error: {0}")]
    Scenario(#[from] ron::error::SpannedError),
    /// Errors surfaced by the engine while registering rules.
    #[error("Engine error: {0}")]
    Engine(#[from] entwine::Error),
}
