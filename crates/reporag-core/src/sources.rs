//! Source references attached to an answer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{ChunkKey, ScoredCandidate};

/// Default number of sources reported per answer.
pub const DEFAULT_MAX_SOURCES: usize = 5;

/// One cited chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub file: String,
    /// `"start-end"`, `"start"` or `"N/A"`.
    pub lines: String,
    /// Final ranking score, rounded to 3 decimals.
    pub score: f64,
    pub category: String,
    /// Similarity reported by the index, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_score: Option<f64>,
}

impl Source {
    pub fn is_code(&self) -> bool {
        self.category == "code"
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

/// Render the first `max` candidates as sources.
///
/// `semantic` maps each retrieved chunk to its index similarity so that
/// confidence is computed on one scale, whatever fusion and reranking did
/// to the ranking score.
pub fn extract_sources(
    candidates: &[ScoredCandidate],
    semantic: &HashMap<ChunkKey, f32>,
    max: usize,
) -> Vec<Source> {
    candidates
        .iter()
        .take(max)
        .map(|candidate| {
            let metadata = &candidate.chunk.metadata;
            Source {
                file: metadata.file_path().unwrap_or("Unknown").to_string(),
                lines: candidate.chunk.line_span(),
                score: round_to(f64::from(candidate.score), 3),
                category: metadata.category().unwrap_or("unknown").to_string(),
                semantic_score: semantic
                    .get(&candidate.key())
                    .map(|s| round_to(f64::from(*s), 3)),
            }
        })
        .collect()
}
