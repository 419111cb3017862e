//! # reporag-model
//!
//! Model layer for RepoRAG: query embedders and answer generators.
//!
//! The retrieval core never computes embeddings or text itself; it calls
//! these traits. Both are `Send + Sync` so one instance can be shared by
//! every in-flight query.
//!
//! ## Features
//!
//! - `ollama`: generation and embeddings through a local Ollama daemon
//!
//! Without features only the [`HashingEmbedder`] is available, and
//! [`create_generator`] reports the provider as unavailable.
//!
//! ## Usage
//!
//! ```ignore
//! use reporag_model::{create_embedder, create_generator, EmbeddingConfig, GeneratorConfig};
//!
//! let embedder = create_embedder(&EmbeddingConfig::default())?;
//! let vector = embedder.embed_query("where is auth handled?")?;
//!
//! let generator = create_generator(&GeneratorConfig::default())?;
//! let answer = generator.complete("...prompt...")?;
//! ```

pub mod config;
pub mod error;
mod hashing;

#[cfg(feature = "ollama")]
mod ollama;

pub use config::{EmbeddingConfig, EmbeddingProviderKind, GeneratorConfig, GeneratorProviderKind};
pub use error::{ModelError, ModelResult};
pub use hashing::HashingEmbedder;

#[cfg(feature = "ollama")]
pub use ollama::{OllamaEmbedder, OllamaGenerator};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_GENERATOR_MODEL_ID: &str = "llama3.1";
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 256;

// ============================================================================
// Embedding Model Trait
// ============================================================================

/// Trait for embedding models.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow use across threads.
pub trait EmbeddingModel: Send + Sync + std::fmt::Debug {
    /// Generate embeddings for a batch of texts, one vector per input.
    fn embed(&self, texts: &[&str]) -> ModelResult<Vec<Vec<f32>>>;

    /// Embed a single query string.
    fn embed_query(&self, text: &str) -> ModelResult<Vec<f32>> {
        self.embed(&[text])?
            .pop()
            .ok_or_else(|| ModelError::embedding_failed(self.model_id(), "empty batch result"))
    }

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;

    /// Get the model ID.
    fn model_id(&self) -> &str;
}

// ============================================================================
// Generator Trait
// ============================================================================

/// Trait for answer generators (LLMs).
///
/// Called at most once per query with a single assembled prompt.
pub trait Generator: Send + Sync + std::fmt::Debug {
    /// Complete `prompt` and return the generated text.
    fn complete(&self, prompt: &str) -> ModelResult<String>;

    /// Model identifier, used in the response cache key.
    fn model_id(&self) -> &str;
}

// ============================================================================
// Factory Functions
// ============================================================================

/// Create an embedding model from configuration.
///
/// # Errors
///
/// Returns [`ModelError::ProviderNotAvailable`] when the provider's feature
/// is not compiled in.
pub fn create_embedder(config: &EmbeddingConfig) -> ModelResult<Box<dyn EmbeddingModel>> {
    match config.provider {
        EmbeddingProviderKind::Hashing => Ok(Box::new(HashingEmbedder::new(
            &config.model_id,
            config.dimension,
        )?)),
        #[cfg(feature = "ollama")]
        EmbeddingProviderKind::Ollama => Ok(Box::new(OllamaEmbedder::new(config)?)),
        #[cfg(not(feature = "ollama"))]
        EmbeddingProviderKind::Ollama => Err(ModelError::provider_not_available(
            "ollama",
            "Built without the 'ollama' feature.",
        )),
    }
}

/// Create an answer generator from configuration.
///
/// # Errors
///
/// Returns [`ModelError::ProviderNotAvailable`] when generation is disabled
/// or the provider's feature is not compiled in.
pub fn create_generator(config: &GeneratorConfig) -> ModelResult<Box<dyn Generator>> {
    match config.provider {
        GeneratorProviderKind::Disabled => Err(ModelError::provider_not_available(
            "disabled",
            "Generation is disabled in the configuration.",
        )),
        #[cfg(feature = "ollama")]
        GeneratorProviderKind::Ollama => Ok(Box::new(OllamaGenerator::new(config)?)),
        #[cfg(not(feature = "ollama"))]
        GeneratorProviderKind::Ollama => Err(ModelError::provider_not_available(
            "ollama",
            "Built without the 'ollama' feature.",
        )),
    }
}
