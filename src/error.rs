//! Error types for index building and retrieval

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for retrieval operations
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Error types that can occur while building, loading or querying an index
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Empty input: {reason}")]
    EmptyInput { reason: String },

    #[error("Corrupt artifact {}: {reason}", .path.display())]
    CorruptArtifact { path: PathBuf, reason: String },

    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Feature extraction failed for {item}: {reason}")]
    Extraction { item: String, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl RetrievalError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        RetrievalError::CorruptArtifact {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        RetrievalError::InvalidArgument {
            reason: reason.into(),
        }
    }
}
