//! CLI command implementations.

pub mod list;
pub mod scenario;

use thiserror::Error;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// No scenario has the given name.
    #[error("unknown scenario `{0}`; run `unitflow list` to see them")]
    UnknownScenario(String),

    /// The scenario ran but did not commit.
    #[error("scenario `{name}` failed: {message}")]
    ScenarioFailed {
        /// Scenario name.
        name: String,
        /// Error of the failed run.
        message: String,
    },

    /// Output could not be encoded.
    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}
