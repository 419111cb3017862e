//! Lexical (keyword) scoring over a retrieved candidate batch.
//!
//! Unlike a standing inverted index, the lexical scorer only sees the
//! candidates the vector search returned. It re-ranks that batch by term
//! overlap so the fusion step has a second, independent ranking.

mod scorer;

pub use scorer::{bm25_term_score, document_terms, query_terms, score, Bm25Params, FIXED_IDF};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{RagError, RagResult};
use crate::types::{sort_by_score_desc, Chunk, ScoredCandidate};

// ============================================================================
// Configuration
// ============================================================================

/// Lexical scorer configuration (`retrieval.lexical`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexicalConfig {
    /// Term frequency saturation. Default: 1.5
    #[serde(default = "default_k1")]
    pub k1: f32,

    /// Length normalization. Default: 0.75
    #[serde(default = "default_b")]
    pub b: f32,

    /// Query terms shorter than this are discarded. Default: 3
    #[serde(default = "default_min_term_length")]
    pub min_term_length: usize,

    /// Maximum number of lexical results fed into fusion. Default: 20
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_k1() -> f32 {
    1.5
}

fn default_b() -> f32 {
    0.75
}

fn default_min_term_length() -> usize {
    3
}

fn default_top_k() -> usize {
    20
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self {
            k1: default_k1(),
            b: default_b(),
            min_term_length: default_min_term_length(),
            top_k: default_top_k(),
        }
    }
}

impl LexicalConfig {
    pub fn params(&self) -> Bm25Params {
        Bm25Params {
            k1: self.k1,
            b: self.b,
        }
    }

    /// # Errors
    /// `k1` negative, `b` outside `[0, 1]` or `topK` of 0.
    pub fn validate(&self) -> RagResult<Vec<String>> {
        if self.k1 < 0.0 {
            return Err(RagError::invalid_config(
                "retrieval.lexical.k1 cannot be negative",
                "Set k1 to a value around 1.2-2.0 (default: 1.5)",
            ));
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err(RagError::invalid_config(
                "retrieval.lexical.b must be between 0 and 1",
                "Set b to 0.75",
            ));
        }
        if self.top_k == 0 {
            return Err(RagError::invalid_config(
                "retrieval.lexical.topK cannot be 0",
                "Set topK to at least 1 (default: 20)",
            ));
        }

        let mut warnings = Vec::new();
        if self.min_term_length == 0 {
            warnings.push(
                "retrieval.lexical.minTermLength is 0; every token, including punctuation, will be scored"
                    .to_string(),
            );
        }
        Ok(warnings)
    }
}

// ============================================================================
// Keyword search
// ============================================================================

/// Score `chunks` against `query` and return the positive-scoring ones,
/// best first, at most `config.top_k`.
///
/// The average document length is computed once over the whole batch.
pub fn keyword_search(query: &str, chunks: &[Chunk], config: &LexicalConfig) -> Vec<ScoredCandidate> {
    let terms = query_terms(query, config.min_term_length);
    if terms.is_empty() || chunks.is_empty() {
        return Vec::new();
    }

    let total_len: usize = chunks.iter().map(|c| c.text.split_whitespace().count()).sum();
    let avg_doc_len = total_len as f32 / chunks.len() as f32;
    let params = config.params();

    let mut scored: Vec<ScoredCandidate> = chunks
        .iter()
        .filter_map(|chunk| {
            let s = score(&terms, &chunk.text, avg_doc_len, &params);
            (s > 0.0).then(|| ScoredCandidate::new(chunk.clone(), s))
        })
        .collect();

    sort_by_score_desc(&mut scored);
    scored.truncate(config.top_k);

    debug!(
        terms = terms.len(),
        batch = chunks.len(),
        matched = scored.len(),
        "Keyword search complete"
    );
    scored
}
