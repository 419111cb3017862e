//! Heuristic relevance reranking.
//!
//! Each candidate starts with a boost of 1.0 and every applicable rule
//! multiplies it. Rules never look at each other, so the result does not
//! depend on the order they are applied in.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{RagError, RagResult};
use crate::query::QueryIntent;
use crate::types::{sort_by_score_desc, Chunk, ScoredCandidate};

/// Substrings that mark a definition in chunk text.
pub const DEFINITION_MARKERS: [&str; 3] = ["def ", "class ", "function "];

/// Query terms shorter than this never trigger the path boost.
const MIN_PATH_TERM_LEN: usize = 3;

// ============================================================================
// Configuration
// ============================================================================

/// Boost factors (`retrieval.rerank`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RerankConfig {
    /// Implementation intent, chunk category `code`. Default: 1.3
    #[serde(default = "default_implementation_code")]
    pub implementation_code: f32,

    /// Implementation intent, chunk text contains a definition marker.
    /// Default: 1.2
    #[serde(default = "default_definition_marker")]
    pub definition_marker: f32,

    /// Explanation intent, chunk category `docs`. Default: 1.2
    #[serde(default = "default_explanation_docs")]
    pub explanation_docs: f32,

    /// A query term occurs in the chunk's file path. Default: 1.15
    #[serde(default = "default_path_term")]
    pub path_term: f32,

    /// The whole query occurs in the chunk text. Default: 1.25
    #[serde(default = "default_exact_phrase")]
    pub exact_phrase: f32,
}

fn default_implementation_code() -> f32 {
    1.3
}

fn default_definition_marker() -> f32 {
    1.2
}

fn default_explanation_docs() -> f32 {
    1.2
}

fn default_path_term() -> f32 {
    1.15
}

fn default_exact_phrase() -> f32 {
    1.25
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            implementation_code: default_implementation_code(),
            definition_marker: default_definition_marker(),
            explanation_docs: default_explanation_docs(),
            path_term: default_path_term(),
            exact_phrase: default_exact_phrase(),
        }
    }
}

impl RerankConfig {
    fn factors(&self) -> [(&'static str, f32); 5] {
        [
            ("implementationCode", self.implementation_code),
            ("definitionMarker", self.definition_marker),
            ("explanationDocs", self.explanation_docs),
            ("pathTerm", self.path_term),
            ("exactPhrase", self.exact_phrase),
        ]
    }

    /// # Errors
    /// Any factor below 1.0: a boost must never demote a candidate.
    pub fn validate(&self) -> RagResult<Vec<String>> {
        for (name, factor) in self.factors() {
            if !factor.is_finite() || factor < 1.0 {
                return Err(RagError::invalid_config(
                    format!("retrieval.rerank.{} must be at least 1.0 (got {})", name, factor),
                    "Use 1.0 to disable a boost",
                ));
            }
        }

        Ok(self
            .factors()
            .iter()
            .filter(|(_, factor)| *factor > 3.0)
            .map(|(name, factor)| {
                format!(
                    "retrieval.rerank.{}={} is large; a single rule will dominate the ranking",
                    name, factor
                )
            })
            .collect())
    }
}

// ============================================================================
// RelevanceReranker
// ============================================================================

/// Applies intent- and metadata-driven boosts to a scored list.
#[derive(Debug, Clone, Default)]
pub struct RelevanceReranker {
    config: RerankConfig,
}

struct QueryView {
    lower: String,
    path_terms: Vec<String>,
}

impl QueryView {
    fn new(query: &str) -> Self {
        let lower = query.trim().to_lowercase();
        let path_terms = lower
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric() && c != '_'))
            .filter(|t| t.chars().count() >= MIN_PATH_TERM_LEN)
            .map(str::to_string)
            .collect();
        Self { lower, path_terms }
    }
}

impl RelevanceReranker {
    pub fn new(config: RerankConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RerankConfig {
        &self.config
    }

    /// Multiplicative boost for one chunk.
    pub fn boost(&self, chunk: &Chunk, query: &str, intent: QueryIntent) -> f32 {
        self.boost_with(chunk, &QueryView::new(query), intent)
    }

    fn boost_with(&self, chunk: &Chunk, query: &QueryView, intent: QueryIntent) -> f32 {
        let mut boost = 1.0_f32;
        let text_lower = chunk.text.to_lowercase();
        let category = chunk.metadata.category();

        match intent {
            QueryIntent::Implementation => {
                if category == Some("code") {
                    boost *= self.config.implementation_code;
                }
                if DEFINITION_MARKERS.iter().any(|m| text_lower.contains(m)) {
                    boost *= self.config.definition_marker;
                }
            }
            QueryIntent::Explanation if category == Some("docs") => {
                boost *= self.config.explanation_docs;
            }
            _ => {}
        }

        if let Some(path) = chunk.metadata.file_path() {
            let path = path.to_lowercase();
            if query.path_terms.iter().any(|term| path.contains(term.as_str())) {
                boost *= self.config.path_term;
            }
        }

        if !query.lower.is_empty() && text_lower.contains(&query.lower) {
            boost *= self.config.exact_phrase;
        }

        boost
    }

    /// Boost every candidate and re-sort, best first.
    ///
    /// Negative base scores are divided by the boost instead, so a boost
    /// always moves a candidate up, never down.
    pub fn rerank(
        &self,
        candidates: Vec<ScoredCandidate>,
        query: &str,
        intent: QueryIntent,
    ) -> Vec<ScoredCandidate> {
        let view = QueryView::new(query);
        let mut boosted = 0;

        let mut reranked: Vec<ScoredCandidate> = candidates
            .into_iter()
            .map(|mut candidate| {
                let boost = self.boost_with(&candidate.chunk, &view, intent);
                if boost > 1.0 {
                    boosted += 1;
                }
                candidate.score = if candidate.score >= 0.0 {
                    candidate.score * boost
                } else {
                    candidate.score / boost
                };
                candidate
            })
            .collect();

        sort_by_score_desc(&mut reranked);
        debug!(count = reranked.len(), boosted, intent = %intent, "Rerank complete");
        reranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metadata;

    fn chunk(text: &str, path: &str, category: &str) -> Chunk {
        Chunk::new(
            text,
            Metadata::new()
                .with("file_path", path)
                .with("file_category", category),
        )
    }

    #[test]
    fn test_implementation_boosts_stack() {
        let reranker = RelevanceReranker::default();
        let c = chunk("def load(): pass", "src/x.py", "code");
        let boost = reranker.boost(&c, "show me", QueryIntent::Implementation);
        assert!((boost - 1.3 * 1.2).abs() < 1e-6);
    }

    #[test]
    fn test_explanation_docs_boost() {
        let reranker = RelevanceReranker::default();
        let c = chunk("Overview", "README.md", "docs");
        assert!((reranker.boost(&c, "how", QueryIntent::Explanation) - 1.2).abs() < 1e-6);
        assert_eq!(reranker.boost(&c, "how", QueryIntent::General), 1.0);
    }

    #[test]
    fn test_path_and_phrase_boosts() {
        let reranker = RelevanceReranker::default();
        let c = chunk("the auth middleware checks tokens", "src/Auth/middleware.ts", "code");
        let boost = reranker.boost(&c, "Auth middleware?", QueryIntent::General);
        // "auth" and "middleware" hit the path; the whole query is not in the text
        // because of the trailing "?".
        assert!((boost - 1.15).abs() < 1e-6);

        let boost = reranker.boost(&c, "auth middleware", QueryIntent::General);
        assert!((boost - 1.15 * 1.25).abs() < 1e-6);
    }

    #[test]
    fn test_short_terms_do_not_hit_path() {
        let reranker = RelevanceReranker::default();
        let c = chunk("text", "src/a/b.rs", "code");
        assert_eq!(reranker.boost(&c, "a b", QueryIntent::General), 1.0);
    }

    #[test]
    fn test_rerank_resorts() {
        let reranker = RelevanceReranker::default();
        let candidates = vec![
            ScoredCandidate::new(chunk("plain", "docs/guide.md", "docs"), 1.0),
            ScoredCandidate::new(chunk("class Router:", "src/router.py", "code"), 0.9),
        ];
        let out = reranker.rerank(candidates, "router", QueryIntent::Implementation);
        assert_eq!(out[0].chunk.metadata.file_path(), Some("src/router.py"));
    }

    #[test]
    fn test_negative_scores_move_up() {
        let reranker = RelevanceReranker::default();
        let candidates = vec![
            ScoredCandidate::new(chunk("x", "a.txt", "docs"), -0.1),
            ScoredCandidate::new(chunk("auth", "auth.rs", "code"), -0.11),
        ];
        let out = reranker.rerank(candidates, "auth", QueryIntent::General);
        assert_eq!(out[0].chunk.metadata.file_path(), Some("auth.rs"));
        assert!(out[0].score > -0.11);
    }

    #[test]
    fn test_validate_rejects_demoting_factor() {
        let config = RerankConfig {
            path_term: 0.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(RerankConfig::default().validate().unwrap().is_empty());
    }
}
