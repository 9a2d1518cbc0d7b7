//! CLI error type.

use crate::config::ConfigError;

/// Errors surfaced by CLI commands.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration could not be loaded or is invalid.
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    /// The claim pipeline failed.
    #[error(transparent)]
    Pipeline(#[from] claimwise::Error),

    /// Reading a batch file or writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A batch file or result could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The async runtime could not be started.
    #[error("failed to start runtime: {0}")]
    Runtime(String),
}

/// Result type for CLI commands.
pub type Result<T> = std::result::Result<T, CliError>;
