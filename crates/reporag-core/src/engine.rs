//! Query engine: the single entry point of the retrieval core.
//!
//! ```text
//! query ─▶ cache? ─▶ greeting? ─▶ process ─▶ embed ─▶ staged retrieval
//!        ─▶ BM25 + RRF ─▶ rerank ─▶ top-K ─▶ expand ─▶ prompt ─▶ generate
//!        ─▶ sources + confidence ─▶ QueryResult
//! ```
//!
//! [`QueryEngine::query`] never returns an error. Every failure becomes a
//! [`QueryResult`] with `success = false`, so callers always get the same
//! shape back.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use reporag_db::{SearchQuery, VectorIndexBackend};
use reporag_model::{EmbeddingModel, Generator};
use serde::Serialize;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::cache::ResponseCache;
use crate::confidence::{estimate_confidence, Confidence};
use crate::config::RagConfig;
use crate::context::expand_context;
use crate::deadline::{run_with_deadline, DeadlineError};
use crate::errors::{RagError, RagResult};
use crate::fusion::rrf_fuse;
use crate::lexical::keyword_search;
use crate::prompt::build_prompt;
use crate::query::{detect_intent, ChatMessage, ProcessedQuery, QueryIntent, QueryProcessor};
use crate::reranker::RelevanceReranker;
use crate::sources::{extract_sources, Source};
use crate::staged_filter::{FilterConfig, FilterMetrics, RetrievalStatus, StagedRetriever};
use crate::types::{Chunk, ChunkKey, ScoredCandidate};

/// Queries answered with [`GREETING_ANSWER`] after normalization.
pub const GREETINGS: [&str; 5] = ["hi", "hello", "hey", "hallo", "greetings"];

pub const GREETING_ANSWER: &str = "Hello! I'm RepoRAG, your code analysis assistant. \
The repository is indexed and I'm ready to answer questions about the codebase. \
What would you like to explore?";

pub const NO_RESULTS_ANSWER: &str = "I couldn't find any relevant code in the indexed \
repository for this question. Try rephrasing it or relaxing the filters.";

/// Model id used in cache keys when no generator is attached.
const NO_GENERATOR: &str = "none";

/// Whether `text` is empty or a bare greeting.
pub fn is_greeting(text: &str) -> bool {
    let lower = text.to_lowercase();
    let normalized = lower.trim().trim_end_matches(['!', '?', '.']);
    normalized.is_empty() || GREETINGS.contains(&normalized)
}

// ============================================================================
// Options
// ============================================================================

/// Per-query overrides of the engine configuration.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Replaces the configured `filter` section for this query.
    pub filter: Option<FilterConfig>,
    /// Replaces the intent-driven result count.
    pub top_k: Option<usize>,
    /// Replaces `retrieval.expansion.enabled`.
    pub expand: Option<bool>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_expansion(mut self, enabled: bool) -> Self {
        self.expand = Some(enabled);
        self
    }

    /// True when nothing is overridden. Only such queries use the cache.
    pub fn is_default(&self) -> bool {
        self.filter.is_none() && self.top_k.is_none() && self.expand.is_none()
    }
}

// ============================================================================
// Results
// ============================================================================

/// Error details of a failed query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryError {
    pub kind: String,
    pub message: String,
}

/// Uniform answer shape returned for every query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub query_id: Uuid,
    pub success: bool,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<QueryError>,
    pub sources: Vec<Source>,
    pub confidence: Confidence,
    pub intent: QueryIntent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<FilterMetrics>,
    /// Served from the response cache.
    pub cached: bool,
    pub generated_at: DateTime<Utc>,
}

impl QueryResult {
    pub fn answered(
        answer: impl Into<String>,
        sources: Vec<Source>,
        confidence: Confidence,
        intent: QueryIntent,
        metrics: Option<FilterMetrics>,
    ) -> Self {
        Self {
            query_id: Uuid::new_v4(),
            success: true,
            answer: answer.into(),
            error: None,
            sources,
            confidence,
            intent,
            metrics,
            cached: false,
            generated_at: Utc::now(),
        }
    }

    pub fn greeting() -> Self {
        Self::answered(
            GREETING_ANSWER,
            Vec::new(),
            Confidence::greeting(),
            QueryIntent::General,
            None,
        )
    }

    pub fn failed(error: &RagError, intent: QueryIntent) -> Self {
        Self {
            query_id: Uuid::new_v4(),
            success: false,
            answer: format!("Error processing query: {}", error),
            error: Some(QueryError {
                kind: error.kind().to_string(),
                message: error.to_string(),
            }),
            sources: Vec::new(),
            confidence: Confidence::error(),
            intent,
            metrics: None,
            cached: false,
            generated_at: Utc::now(),
        }
    }
}

/// Retrieval without generation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalOutcome {
    pub processed: ProcessedQuery,
    pub top_k: usize,
    /// Final ranking, at most `top_k`, best first.
    pub candidates: Vec<ScoredCandidate>,
    /// `candidates` followed by expansion neighbors, for the prompt.
    pub context_chunks: Vec<Chunk>,
    pub sources: Vec<Source>,
    pub confidence: Confidence,
    pub metrics: FilterMetrics,
    pub status: RetrievalStatus,
}

// ============================================================================
// QueryEngine
// ============================================================================

/// Dependency-injected query service. `Send + Sync`; share it with `Arc`.
pub struct QueryEngine {
    config: RagConfig,
    index: Arc<dyn VectorIndexBackend>,
    embedder: Option<Arc<dyn EmbeddingModel>>,
    generator: Option<Arc<dyn Generator>>,
    cache: Option<ResponseCache>,
    processor: QueryProcessor,
    reranker: RelevanceReranker,
    retriever: StagedRetriever,
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("index", &self.index.name())
            .field("embedder", &self.embedder.as_ref().map(|e| e.model_id().to_string()))
            .field("generator", &self.generator.as_ref().map(|g| g.model_id().to_string()))
            .field("cache", &self.cache)
            .finish()
    }
}

impl QueryEngine {
    /// Build an engine over `index`.
    ///
    /// The response cache is created from `config.cache`. Without an
    /// embedder, queries are sent to the index as text.
    ///
    /// # Errors
    ///
    /// [`RagError::InvalidConfiguration`] if `config` does not validate.
    pub fn new(config: RagConfig, index: Arc<dyn VectorIndexBackend>) -> RagResult<Self> {
        for warning in config.validate()? {
            warn!("Config warning: {}", warning);
        }

        let retriever = StagedRetriever::new(Arc::clone(&index))
            .with_search_timeout(config.timeouts.search());
        let reranker = RelevanceReranker::new(config.retrieval.rerank.clone());
        let cache = ResponseCache::from_config(&config.cache);

        Ok(Self {
            config,
            index,
            embedder: None,
            generator: None,
            cache,
            processor: QueryProcessor::new(),
            reranker,
            retriever,
        })
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingModel>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_cache(mut self, cache: Option<ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn processor(&self) -> &QueryProcessor {
        &self.processor
    }

    pub fn cache(&self) -> Option<&ResponseCache> {
        self.cache.as_ref()
    }

    fn generator_id(&self) -> &str {
        self.generator
            .as_ref()
            .map(|g| g.model_id())
            .unwrap_or(NO_GENERATOR)
    }

    // ------------------------------------------------------------------------
    // Query
    // ------------------------------------------------------------------------

    /// Answer `text` with the configured defaults.
    pub fn query(&self, text: &str, history: &[ChatMessage]) -> QueryResult {
        self.query_with(text, history, &QueryOptions::default())
    }

    /// Answer `text`. Never fails; see [`QueryResult::success`].
    pub fn query_with(&self, text: &str, history: &[ChatMessage], opts: &QueryOptions) -> QueryResult {
        let query_id = Uuid::new_v4();
        let span = info_span!("query", id = %query_id);
        let _guard = span.enter();
        let started = Instant::now();

        let cacheable = history.is_empty() && opts.is_default();
        if cacheable {
            if let Some(mut hit) = self
                .cache
                .as_ref()
                .and_then(|cache| cache.get(text, self.generator_id()))
            {
                hit.query_id = query_id;
                hit.cached = true;
                info!("Answered from cache");
                return hit;
            }
        }

        if is_greeting(text) {
            debug!("Greeting short-circuit");
            let mut result = QueryResult::greeting();
            result.query_id = query_id;
            return result;
        }

        let mut result = match self.answer(text, history, opts) {
            Ok(result) => result,
            Err(err) => {
                warn!(kind = err.kind(), error = %err, "Query failed");
                QueryResult::failed(&err, detect_intent(text))
            }
        };
        result.query_id = query_id;

        info!(
            success = result.success,
            intent = %result.intent,
            sources = result.sources.len(),
            confidence = result.confidence.score,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Query complete"
        );

        if cacheable && result.success && !result.sources.is_empty() {
            if let Some(cache) = &self.cache {
                cache.insert(text, self.generator_id(), result.clone());
            }
        }

        result
    }

    fn answer(&self, text: &str, history: &[ChatMessage], opts: &QueryOptions) -> RagResult<QueryResult> {
        let outcome = self.retrieve_with(text, history, opts)?;
        let intent = outcome.processed.intent;

        if outcome.candidates.is_empty() {
            if let RetrievalStatus::NoResults { reason } = &outcome.status {
                info!(reason = %reason, "No candidates, skipping generation");
            }
            return Ok(QueryResult::answered(
                NO_RESULTS_ANSWER,
                Vec::new(),
                Confidence::no_sources(),
                intent,
                Some(outcome.metrics),
            ));
        }

        let generator = self
            .generator
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| RagError::GenerationFailure("no generator configured".to_string()))?;

        let prompt = build_prompt(&outcome.processed, &outcome.context_chunks);
        debug!(
            prompt_chars = prompt.len(),
            context_chunks = outcome.context_chunks.len(),
            "Prompt assembled"
        );

        let started = Instant::now();
        let generated = run_with_deadline("generation", self.config.timeouts.generation(), move || {
            generator.complete(&prompt)
        });
        let answer = match generated {
            Ok(Ok(answer)) => answer,
            Ok(Err(err)) => return Err(RagError::GenerationFailure(err.to_string())),
            Err(DeadlineError::Elapsed(after)) => {
                return Err(RagError::Timeout {
                    stage: "generation",
                    after_ms: after.as_millis() as u64,
                })
            }
            Err(other) => return Err(RagError::GenerationFailure(other.to_string())),
        };
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Generation complete");

        Ok(QueryResult::answered(
            answer,
            outcome.sources,
            outcome.confidence,
            intent,
            Some(outcome.metrics),
        ))
    }

    // ------------------------------------------------------------------------
    // Retrieval
    // ------------------------------------------------------------------------

    /// Run retrieval and ranking with the configured defaults.
    ///
    /// # Errors
    ///
    /// [`RagError::Embedding`] or [`RagError::IndexUnavailable`] when a
    /// collaborator fails. An empty result is not an error.
    pub fn retrieve(&self, text: &str, history: &[ChatMessage]) -> RagResult<RetrievalOutcome> {
        self.retrieve_with(text, history, &QueryOptions::default())
    }

    pub fn retrieve_with(
        &self,
        text: &str,
        history: &[ChatMessage],
        opts: &QueryOptions,
    ) -> RagResult<RetrievalOutcome> {
        let retrieval = &self.config.retrieval;
        let processed = self.processor.process(text, history);
        let intent = processed.intent;
        let top_k = opts
            .top_k
            .unwrap_or_else(|| retrieval.top_k.for_intent(intent))
            .max(1);
        debug!(intent = %intent, top_k, rewritten = %processed.rewritten, "Query processed");

        let search_query = match &self.embedder {
            Some(embedder) => SearchQuery::Embedding(
                embedder
                    .embed_query(&processed.rewritten)
                    .map_err(|e| RagError::Embedding(e.to_string()))?,
            ),
            None => SearchQuery::Text(processed.rewritten.clone()),
        };

        // The pool for fusion and rerank; the retriever adds its own over-fetch
        // for the post-filter.
        let filter = opts.filter.as_ref().unwrap_or(&self.config.filter);
        let staged = self
            .retriever
            .retrieve(search_query, filter, retrieval.top_k.candidates(top_k))?;

        let semantic: HashMap<ChunkKey, f32> = staged
            .candidates
            .iter()
            .map(|c| (c.key(), c.score))
            .collect();

        let ranked = if retrieval.hybrid.enabled && !staged.candidates.is_empty() {
            let pool: Vec<Chunk> = staged.candidates.iter().map(|c| c.chunk.clone()).collect();
            let lexical = keyword_search(&processed.expanded, &pool, &retrieval.lexical);
            rrf_fuse(&staged.candidates, &lexical, &retrieval.hybrid)?
        } else {
            staged.candidates
        };

        let mut candidates = self.reranker.rerank(ranked, &processed.original, intent);
        candidates.truncate(top_k);

        let selected: Vec<Chunk> = candidates.iter().map(|c| c.chunk.clone()).collect();
        let context_chunks = if opts.expand.unwrap_or(retrieval.expansion.enabled) {
            self.expand(selected)
        } else {
            selected
        };

        let sources = extract_sources(&candidates, &semantic, self.config.max_sources);
        let confidence = estimate_confidence(&sources);

        Ok(RetrievalOutcome {
            processed,
            top_k,
            candidates,
            context_chunks,
            sources,
            confidence,
            metrics: staged.metrics,
            status: staged.status,
        })
    }

    /// Add neighbors of `selected` from the same files. Needs an index that
    /// can list a file's chunks; otherwise `selected` is returned as is.
    fn expand(&self, selected: Vec<Chunk>) -> Vec<Chunk> {
        if !self.index.capabilities().corpus_scan {
            info!(
                index = self.index.name(),
                "Context expansion skipped: index cannot list chunks per file"
            );
            return selected;
        }

        let paths: BTreeSet<&str> = selected
            .iter()
            .filter_map(|c| c.metadata.file_path())
            .collect();

        let mut pool = Vec::new();
        for path in paths {
            match self.index.chunks_for_path(path) {
                Ok(chunks) => pool.extend(chunks),
                Err(err) => warn!(path, error = %err, "Could not load neighbors"),
            }
        }

        expand_context(&selected, &pool, &self.config.retrieval.expansion)
    }
}
