//! Error types for the runner.

use flasher_radio::RadioError;
use thiserror::Error;

/// Errors raised while loading configuration or running the tower.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("radio error: {0}")]
    Radio(#[from] RadioError),

    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;
