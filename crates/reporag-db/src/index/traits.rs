//! Vector index traits and core types.

use serde::{Deserialize, Serialize};

use crate::chunk::Chunk;
use crate::error::{DbError, DbResult};
use crate::filter::FilterExpression;

// ============================================================================
// VectorMetric
// ============================================================================

/// Distance metric for vector similarity search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorMetric {
    /// Cosine similarity (default).
    #[default]
    Cosine,
    /// Dot product.
    Dot,
}

impl VectorMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorMetric::Cosine => "cosine",
            VectorMetric::Dot => "dot",
        }
    }
}

impl std::fmt::Display for VectorMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Search request / result
// ============================================================================

/// What to search with. Embeddings are computed outside the index; text
/// queries are for stores that embed on their side.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchQuery {
    Embedding(Vec<f32>),
    Text(String),
}

impl SearchQuery {
    pub fn kind(&self) -> &'static str {
        match self {
            SearchQuery::Embedding(_) => "embedding",
            SearchQuery::Text(_) => "text",
        }
    }
}

/// A single ANN request.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: SearchQuery,
    /// Number of results requested. Always at least 1.
    pub top_k: usize,
    /// Optional native metadata filter.
    pub filter: Option<FilterExpression>,
}

impl SearchRequest {
    pub fn new(query: SearchQuery, top_k: usize) -> Self {
        Self {
            query,
            top_k: top_k.max(1),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: FilterExpression) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// A chunk returned by the index with its similarity score.
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub chunk: Chunk,
    /// Similarity score, higher is better.
    pub score: f32,
}

/// Optional features a backend advertises.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexCapabilities {
    /// The backend can list every chunk of a source file
    /// ([`VectorIndexBackend::chunks_for_path`]).
    pub corpus_scan: bool,
    /// The backend accepts [`SearchQuery::Text`].
    pub text_queries: bool,
}

// ============================================================================
// VectorIndexBackend Trait
// ============================================================================

/// Core trait for vector index backends.
///
/// ## Implementation Notes
///
/// - Backends must be thread-safe (`Send + Sync`); one instance serves many
///   concurrent queries.
/// - `search` returns results sorted by score, best first, at most
///   `request.top_k` of them, all satisfying `request.filter`.
pub trait VectorIndexBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Run an ANN search.
    fn search(&self, request: &SearchRequest) -> DbResult<Vec<IndexHit>>;

    /// Number of chunks in the index.
    fn len(&self) -> DbResult<usize>;

    fn is_empty(&self) -> DbResult<bool> {
        Ok(self.len()? == 0)
    }

    fn capabilities(&self) -> IndexCapabilities {
        IndexCapabilities::default()
    }

    /// All chunks recorded for `path`. Only available when
    /// [`IndexCapabilities::corpus_scan`] is set.
    fn chunks_for_path(&self, _path: &str) -> DbResult<Vec<Chunk>> {
        Err(DbError::Unsupported {
            operation: "chunks_for_path",
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
