//! # reporag-core
//!
//! **RepoRAG** retrieval-and-ranking core.
//!
//! Turns a natural-language question about a code repository into a ranked,
//! filtered set of chunks, a prompt, and a uniform answer with sources and a
//! confidence estimate. The vector index, the query embedder and the answer
//! generator are collaborators behind traits (see `reporag-db` and
//! `reporag-model`).
//!
//! ## Main Types
//!
//! - [`QueryEngine`] – the entry point; returns a [`QueryResult`] for every query
//! - [`RagConfig`] – configuration tree, loaded from YAML
//! - [`RagError`] – domain-specific error type
//!
//! ## Modules
//!
//! - [`query`] – intent detection, entity extraction, expansion, rewriting
//! - [`lexical`] – BM25 term scoring with a fixed IDF
//! - [`fusion`] – reciprocal rank fusion of semantic and lexical rankings
//! - [`reranker`] – intent and query-aware score boosts
//! - [`context`] – neighbor expansion by line position
//! - [`staged_filter`] – pre-filter admission, vector search, post-filter
//! - [`sources`] / [`confidence`] – answer citations and confidence
//! - [`prompt`] – prompt assembly for the generator
//! - [`cache`] – TTL response cache
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use reporag_core::{QueryEngine, RagConfig};
//! use reporag_db::SimpleIndex;
//!
//! let config = RagConfig::load_default()?;
//! let index = Arc::new(SimpleIndex::open("chunks.jsonl")?);
//! let engine = QueryEngine::new(config, index)?
//!     .with_embedder(embedder)
//!     .with_generator(generator);
//!
//! let result = engine.query("how does the parser handle errors?", &[]);
//! println!("{} ({})", result.answer, result.confidence.level);
//! ```

pub mod cache;
pub mod confidence;
pub mod config;
pub mod context;
pub mod deadline;
pub mod engine;
pub mod errors;
pub mod fusion;
pub mod lexical;
pub mod prompt;
pub mod query;
pub mod reranker;
pub mod sources;
pub mod staged_filter;
pub mod types;

pub use cache::{CacheConfig, ResponseCache};
pub use confidence::{estimate_confidence, Confidence, ConfidenceLevel};
pub use config::{RagConfig, RetrievalConfig, TimeoutConfig, TopKConfig};
pub use context::{expand_context, ExpansionConfig};
pub use engine::{
    is_greeting, QueryEngine, QueryError, QueryOptions, QueryResult, RetrievalOutcome,
    GREETING_ANSWER, NO_RESULTS_ANSWER,
};
pub use errors::{RagError, RagResult};
pub use fusion::{rrf_fuse, HybridConfig};
pub use lexical::{keyword_search, Bm25Params, LexicalConfig};
pub use prompt::{build_prompt, intent_instructions};
pub use query::{
    detect_intent, extract_entities, ChatMessage, ChatRole, Entities, ProcessedQuery,
    QueryExpander, QueryIntent, QueryProcessor,
};
pub use reranker::{RelevanceReranker, RerankConfig};
pub use sources::{extract_sources, Source};
pub use staged_filter::{
    apply_post_filter, parse_filter_arg, FilterConfig, FilterMetrics, FilterRule, FilterSet,
    FilterStage, PreFilterDecision, RetrievalStatus, SelectivityTable, StagedRetrieval,
    StagedRetriever,
};
pub use types::{Chunk, ChunkKey, Metadata, MetadataValue, ScoredCandidate};
