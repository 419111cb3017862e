//! Configuration for the RepoRAG core.
//!
//! A single YAML document, by default `~/.reporag/config.yaml`. Every field
//! has a default, so a missing file or a partial document is fine.
//!
//! ```yaml
//! retrieval:
//!   hybrid:
//!     semanticWeight: 0.7
//!     lexicalWeight: 0.3
//!   topK:
//!     deep: 8
//! filter:
//!   preFilters:
//!     file_type: code
//! timeouts:
//!   generationMs: 60000
//! generator:
//!   modelId: qwen2.5-coder
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reporag_model::{EmbeddingConfig, GeneratorConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::CacheConfig;
use crate::context::ExpansionConfig;
use crate::errors::{RagError, RagResult};
use crate::fusion::HybridConfig;
use crate::lexical::LexicalConfig;
use crate::query::QueryIntent;
use crate::reranker::RerankConfig;
use crate::sources::DEFAULT_MAX_SOURCES;
use crate::staged_filter::FilterConfig;

// ============================================================================
// RagConfig
// ============================================================================

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagConfig {
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Staged filter defaults. Callers may override per query.
    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub generator: GeneratorConfig,

    #[serde(default)]
    pub embedder: EmbeddingConfig,

    /// Sources reported per answer. Default: 5
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,
}

fn default_max_sources() -> usize {
    DEFAULT_MAX_SOURCES
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            retrieval: RetrievalConfig::default(),
            filter: FilterConfig::default(),
            cache: CacheConfig::default(),
            timeouts: TimeoutConfig::default(),
            generator: GeneratorConfig::default(),
            embedder: EmbeddingConfig::default(),
            max_sources: default_max_sources(),
        }
    }
}

impl RagConfig {
    /// Load from `~/.reporag/config.yaml`, or defaults when there is no
    /// home directory or no file.
    ///
    /// # Errors
    ///
    /// Same as [`RagConfig::from_path`].
    pub fn load_default() -> RagResult<Self> {
        match Self::default_path() {
            Some(path) => Self::from_path(&path),
            None => {
                debug!("Could not determine home directory, using default config");
                Ok(Self::default())
            }
        }
    }

    /// Load from `path`. A missing file yields the defaults. Validation
    /// warnings are logged.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigRead`] if the file exists but cannot be read
    /// - [`RagError::ConfigParse`] if it is not a valid configuration
    /// - [`RagError::InvalidConfiguration`] if validation fails
    pub fn from_path(path: &Path) -> RagResult<Self> {
        if !path.exists() {
            debug!("Config not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| RagError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_yaml_str(&content).map_err(|message| RagError::ConfigParse {
            path: path.to_path_buf(),
            message,
        })?;

        for warning in config.validate()? {
            warn!("Config warning: {}", warning);
        }

        Ok(config)
    }

    /// Parse without validating. An empty document yields the defaults.
    pub fn from_yaml_str(content: &str) -> Result<Self, String> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| e.to_string())
    }

    /// `~/.reporag`
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".reporag"))
    }

    /// `~/.reporag/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        Self::default_dir().map(|d| d.join("config.yaml"))
    }

    /// Validate every section.
    ///
    /// Returns the first hard error, otherwise all warnings.
    pub fn validate(&self) -> RagResult<Vec<String>> {
        let mut all_warnings = Vec::new();

        all_warnings.extend(self.retrieval.hybrid.validate()?);
        all_warnings.extend(self.retrieval.lexical.validate()?);
        all_warnings.extend(self.retrieval.top_k.validate()?);
        all_warnings.extend(self.retrieval.rerank.validate()?);
        all_warnings.extend(self.retrieval.expansion.validate()?);
        all_warnings.extend(self.filter.validate()?);
        all_warnings.extend(self.cache.validate()?);
        all_warnings.extend(self.timeouts.validate()?);

        if self.max_sources == 0 {
            all_warnings.push("maxSources is 0; answers will carry no sources".to_string());
        }

        Ok(all_warnings)
    }
}

// ============================================================================
// RetrievalConfig
// ============================================================================

/// Retrieval and ranking settings (`retrieval`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalConfig {
    #[serde(default)]
    pub hybrid: HybridConfig,

    #[serde(default)]
    pub lexical: LexicalConfig,

    #[serde(default)]
    pub top_k: TopKConfig,

    #[serde(default)]
    pub rerank: RerankConfig,

    #[serde(default)]
    pub expansion: ExpansionConfig,
}

// ============================================================================
// TopKConfig
// ============================================================================

/// Result counts per intent (`retrieval.topK`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopKConfig {
    /// Summary and Q&A queries. Default: 3
    #[serde(default = "default_brief")]
    pub brief: usize,

    /// Coding and debugging queries. Default: 5
    #[serde(default = "default_deep")]
    pub deep: usize,

    /// Everything else. Default: 4
    #[serde(default = "default_standard")]
    pub standard: usize,

    /// Candidates fetched per final result, before fusion and rerank.
    /// The staged retriever over-fetches on top of this, so the index is
    /// asked for `top_k × candidateFactor × overfetchFactor` when
    /// post-filtering is enabled. Default: 2
    #[serde(default = "default_candidate_factor")]
    pub candidate_factor: usize,
}

fn default_brief() -> usize {
    3
}

fn default_deep() -> usize {
    5
}

fn default_standard() -> usize {
    4
}

fn default_candidate_factor() -> usize {
    2
}

impl Default for TopKConfig {
    fn default() -> Self {
        Self {
            brief: default_brief(),
            deep: default_deep(),
            standard: default_standard(),
            candidate_factor: default_candidate_factor(),
        }
    }
}

impl TopKConfig {
    pub fn for_intent(&self, intent: QueryIntent) -> usize {
        match intent {
            QueryIntent::Summary | QueryIntent::Qna => self.brief,
            QueryIntent::Coding | QueryIntent::Debugging => self.deep,
            _ => self.standard,
        }
    }

    /// Candidates the staged retriever should return for a final `top_k`.
    pub fn candidates(&self, top_k: usize) -> usize {
        top_k.saturating_mul(self.candidate_factor.max(1))
    }

    pub fn validate(&self) -> RagResult<Vec<String>> {
        for (name, value) in [
            ("brief", self.brief),
            ("deep", self.deep),
            ("standard", self.standard),
            ("candidateFactor", self.candidate_factor),
        ] {
            if value == 0 {
                return Err(RagError::invalid_config(
                    format!("retrieval.topK.{} cannot be 0", name),
                    "Use a positive count",
                ));
            }
        }

        let mut warnings = Vec::new();
        if self.deep > 50 {
            warnings.push(format!(
                "retrieval.topK.deep ({}) is very high; prompts may exceed the model context",
                self.deep
            ));
        }
        Ok(warnings)
    }
}

// ============================================================================
// TimeoutConfig
// ============================================================================

/// Deadlines for external calls (`timeouts`). Absent means no deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_ms: Option<u64>,
}

impl TimeoutConfig {
    pub fn search(&self) -> Option<Duration> {
        self.search_ms.map(Duration::from_millis)
    }

    pub fn generation(&self) -> Option<Duration> {
        self.generation_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> RagResult<Vec<String>> {
        for (name, value) in [("searchMs", self.search_ms), ("generationMs", self.generation_ms)] {
            if value == Some(0) {
                return Err(RagError::invalid_config(
                    format!("timeouts.{} cannot be 0", name),
                    "Remove the key for no deadline, or use a positive value",
                ));
            }
        }
        Ok(Vec::new())
    }
}
