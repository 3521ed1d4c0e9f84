//! Error types for the memory store.

use std::path::PathBuf;

use thiserror::Error;

/// Store error type.
#[derive(Error, Debug)]
pub enum PensieveError {
    /// An embedding model failed to encode text.
    #[error("Embedding error ({model}): {message}")]
    Embedding {
        /// Name of the model that failed.
        model: String,
        /// Error message from the model runtime.
        message: String,
    },

    /// Reading or writing the snapshot file failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The snapshot was written by an incompatible version.
    #[error("Unsupported snapshot version {found} (expected {expected})")]
    SnapshotVersion {
        /// Version found in the file.
        found: u32,
        /// Version this build reads and writes.
        expected: u32,
    },

    /// The snapshot parsed but its contents are inconsistent.
    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A caller supplied an unusable argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A blocking or background task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl PensieveError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<config::ConfigError> for PensieveError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, PensieveError>;
