//! CLI error types.

use thiserror::Error;

/// CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ctk_core::Error),

    /// A scenario could not be set up.
    #[error("setup error: {0}")]
    Setup(#[from] ctk_runner::ScenarioError),

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Some scenarios did not pass.
    #[error("{failed} of {total} scenario(s) did not pass")]
    ScenariosFailed {
        /// Scenarios that failed or errored.
        failed: usize,
        /// Scenarios run.
        total: usize,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// CLI result type.
pub type CliResult<T> = Result<T, CliError>;
