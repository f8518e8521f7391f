//! CLI-specific error types and exit code mapping

use logsift_core::error::{DissectError, LogsiftError};
use logsift_engine::EngineError;

/// CLI-specific error type.
///
/// `exit_code()` maps each variant to a process exit code.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// Rule table loading or compilation failed.
    #[error("rule error: {0}")]
    Rule(String),

    /// A line could not be dissected.
    #[error("dissect error: {0}")]
    Dissect(#[from] DissectError),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (input read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from logsift-core.
    #[error("{0}")]
    Core(#[from] LogsiftError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                          |
    /// |------|----------------------------------|
    /// | 0    | Success                          |
    /// | 1    | General / command / dissect error |
    /// | 2    | Configuration error              |
    /// | 3    | Invalid rule table               |
    /// | 10   | IO error                         |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Rule(_) => 3,
            Self::Io(_) => 10,
            Self::Core(core) => match core {
                LogsiftError::Config(_) => 2,
                LogsiftError::Rule(_) => 3,
                LogsiftError::Io(_) => 10,
                LogsiftError::Dissect(_) => 1,
            },
            Self::Command(_) | Self::Dissect(_) | Self::JsonSerialize(_) => 1,
        }
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Config { .. } => Self::Config(e.to_string()),
            EngineError::Io(io) => Self::Io(io),
            other => Self::Rule(other.to_string()),
        }
    }
}
