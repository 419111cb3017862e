//! Error types for reporag-model.

use thiserror::Error;

/// Result type alias for reporag-model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur in reporag-model operations.
#[derive(Debug, Error)]
pub enum ModelError {
    // ========================================================================
    // Provider errors
    // ========================================================================
    /// Provider not available in this build or disabled by configuration.
    #[error("Provider '{provider}' not available: {reason}")]
    ProviderNotAvailable { provider: String, reason: String },

    /// Model configuration invalid.
    #[error("Invalid model configuration: {message}")]
    InvalidConfig { message: String },

    // ========================================================================
    // Inference errors
    // ========================================================================
    /// Embedding generation failed.
    #[error("Embedding failed for model '{model_id}': {message}")]
    EmbeddingFailed { model_id: String, message: String },

    /// Text generation failed.
    #[error("Generation failed for model '{model_id}': {message}")]
    GenerationFailed { model_id: String, message: String },

    // ========================================================================
    // Transport errors
    // ========================================================================
    /// HTTP transport error.
    #[cfg(feature = "ollama")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error constructors
// ============================================================================

impl ModelError {
    /// Create an embedding failed error.
    pub fn embedding_failed(model_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingFailed {
            model_id: model_id.into(),
            message: message.into(),
        }
    }

    /// Create a generation failed error.
    pub fn generation_failed(model_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GenerationFailed {
            model_id: model_id.into(),
            message: message.into(),
        }
    }

    /// Create a provider not available error.
    pub fn provider_not_available(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProviderNotAvailable {
            provider: provider.into(),
            reason: reason.into(),
        }
    }
}
