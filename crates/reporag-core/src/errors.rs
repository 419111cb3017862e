//! Error types for reporag-core.

use std::path::PathBuf;

use reporag_db::DbError;
use thiserror::Error;

/// Result alias for core operations.
pub type RagResult<T> = Result<T, RagError>;

/// Domain-specific errors for RepoRAG operations.
///
/// None of these escape [`crate::QueryEngine::query`]: the engine converts
/// every failure into a failed [`crate::QueryResult`].
#[derive(Error, Debug)]
pub enum RagError {
    /// A configuration value is invalid.
    #[error("Invalid configuration: {message}. {hint}")]
    InvalidConfiguration {
        /// Description of the invalid configuration.
        message: String,
        /// Actionable hint on how to fix it.
        hint: String,
    },

    /// Configuration file could not be read.
    #[error("Cannot read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid YAML for [`crate::RagConfig`].
    #[error("Config invalid at {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    /// The vector index search failed.
    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    /// A filter value could not be evaluated.
    #[error("Malformed filter value for `{key}`: {message}")]
    MalformedFilterValue { key: String, message: String },

    /// Query embedding failed.
    #[error("Query embedding failed: {0}")]
    Embedding(String),

    /// The generator call failed.
    #[error("Generation failed: {0}")]
    GenerationFailure(String),

    /// An external call did not finish within its deadline.
    #[error("{stage} timed out after {after_ms} ms")]
    Timeout { stage: &'static str, after_ms: u64 },
}

impl RagError {
    /// Short machine-readable kind, used in failed query results.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration { .. } | Self::ConfigRead { .. } | Self::ConfigParse { .. } => {
                "invalid_configuration"
            }
            Self::IndexUnavailable(_) => "index_unavailable",
            Self::MalformedFilterValue { .. } => "malformed_filter_value",
            Self::Embedding(_) => "embedding_failure",
            Self::GenerationFailure(_) => "generation_failure",
            Self::Timeout { .. } => "timeout",
        }
    }

    pub(crate) fn invalid_config(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
            hint: hint.into(),
        }
    }
}

impl From<DbError> for RagError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::MalformedFilter { key, message } => Self::MalformedFilterValue { key, message },
            other => Self::IndexUnavailable(other.to_string()),
        }
    }
}
