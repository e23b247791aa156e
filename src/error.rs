use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// Sequence errors
// =============================================================================

/// Errors surfaced by sequence operations.
///
/// An empty result (`reduce`, `min`, `find_first`, ... on an empty sequence)
/// is not an error: those operations return `Ok(None)`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequenceError {
    #[error("sequence has already been operated upon or closed")]
    ClosedSequence,

    #[error("invalid argument for '{operation}': {reason}")]
    InvalidArgument {
        operation: &'static str,
        reason: String,
    },

    #[error("worker pool unavailable: {0}")]
    WorkerPool(String),
}

impl SequenceError {
    pub fn invalid_argument(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            operation,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SequenceError>;

// =============================================================================
// Configuration errors
// =============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
