//! Configuration types for reporag-model.
//!
//! These types are embedded in the core `RagConfig` under the `embedder`
//! and `generator` sections.

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_EMBEDDING_DIMENSION, DEFAULT_GENERATOR_MODEL_ID, DEFAULT_OLLAMA_URL};

// ============================================================================
// EmbeddingProviderKind
// ============================================================================

/// Embedding provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Local feature-hashing embedder, no model files needed.
    #[default]
    Hashing,
    /// Remote Ollama API.
    Ollama,
}

impl std::fmt::Display for EmbeddingProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hashing => write!(f, "hashing"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for EmbeddingProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hashing" | "local" => Ok(Self::Hashing),
            "ollama" => Ok(Self::Ollama),
            _ => Err(format!(
                "Unknown embedding provider: '{}'. Use 'hashing' or 'ollama'.",
                s
            )),
        }
    }
}

// ============================================================================
// GeneratorProviderKind
// ============================================================================

/// Generator (LLM) provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorProviderKind {
    /// Remote Ollama API.
    #[default]
    Ollama,
    /// No generator; only retrieval is available.
    Disabled,
}

impl std::fmt::Display for GeneratorProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

impl std::str::FromStr for GeneratorProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "disabled" | "none" | "off" => Ok(Self::Disabled),
            _ => Err(format!(
                "Unknown generator provider: '{}'. Use 'ollama' or 'disabled'.",
                s
            )),
        }
    }
}

// ============================================================================
// EmbeddingConfig
// ============================================================================

/// Query embedder configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProviderKind,

    /// Model identifier (Ollama model name; informational for hashing).
    #[serde(default = "default_embedding_model_id")]
    pub model_id: String,

    /// Vector dimension produced by the hashing embedder.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Ollama base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// HTTP timeout in seconds for remote providers.
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_embedding_model_id() -> String {
    "hashing-trigram".to_string()
}

fn default_dimension() -> usize {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_base_url() -> String {
    DEFAULT_OLLAMA_URL.to_string()
}

fn default_embedding_timeout() -> u64 {
    30
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::default(),
            model_id: default_embedding_model_id(),
            dimension: default_dimension(),
            base_url: default_base_url(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

// ============================================================================
// GeneratorConfig
// ============================================================================

/// Answer generator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorConfig {
    #[serde(default)]
    pub provider: GeneratorProviderKind,

    /// Model identifier. Also part of the response cache key.
    #[serde(default = "default_generator_model_id")]
    pub model_id: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// HTTP timeout in seconds.
    #[serde(default = "default_generator_timeout")]
    pub timeout_secs: u64,
}

fn default_generator_model_id() -> String {
    DEFAULT_GENERATOR_MODEL_ID.to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_generator_timeout() -> u64 {
    120
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: GeneratorProviderKind::default(),
            model_id: default_generator_model_id(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            timeout_secs: default_generator_timeout(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
