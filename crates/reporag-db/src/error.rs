//! Error types for reporag-db.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for reporag-db operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur in reporag-db operations.
#[derive(Debug, Error)]
pub enum DbError {
    // ========================================================================
    // Vector index errors
    // ========================================================================
    /// The vector index could not serve the request.
    #[error("Vector index unavailable: {message}")]
    IndexUnavailable { message: String },

    /// The backend cannot answer this kind of query (e.g. a text query
    /// against an index that only stores vectors).
    #[error("Backend '{backend}' does not support {kind} queries")]
    UnsupportedQuery { backend: String, kind: &'static str },

    /// The backend does not implement an optional operation.
    #[error("Operation '{operation}' is not supported by this backend")]
    Unsupported { operation: &'static str },

    /// Vector dimension mismatch.
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A record was added to a vector index without an embedding.
    #[error("Record '{id}' has no vector")]
    MissingVector { id: String },

    /// A record file could not be parsed.
    #[error("Parse error at {path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    // ========================================================================
    // Filter errors
    // ========================================================================
    /// A filter value does not have a shape the filter contract understands.
    #[error("Malformed filter for key '{key}': {message}")]
    MalformedFilter { key: String, message: String },

    // ========================================================================
    // General errors
    // ========================================================================
    /// IO error wrapper.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error wrapper.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DbError {
    /// Create an index unavailable error.
    pub fn index_unavailable(message: impl Into<String>) -> Self {
        Self::IndexUnavailable {
            message: message.into(),
        }
    }

    /// Create a malformed filter error.
    pub fn malformed_filter(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedFilter {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a parse error for a record file.
    pub fn parse(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}
