//! Shared value types for the retrieval pipeline.

use serde::Serialize;

pub use reporag_db::{Chunk, ChunkKey, Metadata, MetadataValue};

/// A chunk paired with a stage-local score.
///
/// Semantic, lexical, fused and boosted scores live on different scales;
/// only the fusion and rerank steps turn one into another.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredCandidate {
    pub chunk: Chunk,
    pub score: f32,
}

impl ScoredCandidate {
    pub fn new(chunk: Chunk, score: f32) -> Self {
        Self { chunk, score }
    }

    /// Structural identity of the underlying chunk.
    pub fn key(&self) -> ChunkKey {
        self.chunk.key()
    }
}

/// Sort descending by score. Stable, so equal scores keep input order.
/// NaN scores sort last.
pub(crate) fn sort_by_score_desc(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(|a, b| rank_key(b.score).total_cmp(&rank_key(a.score)));
}

fn rank_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}
