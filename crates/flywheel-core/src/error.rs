//! Error kinds shared across the workspace.

use thiserror::Error;

/// Unified error type for the engine.
///
/// Mutation tools never bubble these as panics; they surface failures as
/// result records with a human-readable message (see `flywheel-tools`).
#[derive(Debug, Error)]
pub enum Error {
    /// Missing path or missing section.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed arguments, including path traversal attempts.
    #[error("invalid: {0}")]
    Invalid(String),

    /// Lock contention during a version-control commit.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Permission denied writing to the vault.
    #[error("read-only: {0}")]
    ReadOnly(String),

    /// Front-matter or YAML that could not be parsed.
    #[error("parse error in {path}: {message}")]
    Parse { path: String, message: String },

    /// Any other underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Store corruption or an unsupported schema version.
    #[error("fatal: {0}")]
    Fatal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True when retrying the same operation could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}
