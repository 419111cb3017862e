//! Reciprocal Rank Fusion of the semantic and lexical rankings.
//!
//! ```text
//! RRF(d) = w_sem / (k + rank_sem(d)) + w_lex / (k + rank_lex(d))
//! ```
//!
//! Ranks are 1-based. A chunk missing from one ranking simply gets no
//! contribution from it. Chunks are matched across rankings by
//! [`ChunkKey`], never by instance.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{RagError, RagResult};
use crate::types::{sort_by_score_desc, ChunkKey, ScoredCandidate};

// ============================================================================
// Configuration
// ============================================================================

/// Hybrid retrieval configuration (`retrieval.hybrid`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridConfig {
    /// When false, only the semantic ranking is used.
    /// Default: true
    #[serde(default = "default_hybrid_enabled")]
    pub enabled: bool,

    /// Weight of the semantic ranking. Default: 0.7
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f32,

    /// Weight of the lexical ranking. Default: 0.3
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f32,

    /// RRF smoothing constant. Default: 60
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,
}

fn default_hybrid_enabled() -> bool {
    true
}

fn default_semantic_weight() -> f32 {
    0.7
}

fn default_lexical_weight() -> f32 {
    0.3
}

fn default_rrf_k() -> f32 {
    60.0
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            enabled: default_hybrid_enabled(),
            semantic_weight: default_semantic_weight(),
            lexical_weight: default_lexical_weight(),
            rrf_k: default_rrf_k(),
        }
    }
}

impl HybridConfig {
    /// Validates the hybrid configuration, returning warnings for
    /// questionable values.
    ///
    /// # Errors
    /// - `rrfK` is 0 or negative
    /// - either weight is negative
    pub fn validate(&self) -> RagResult<Vec<String>> {
        let mut warnings = Vec::new();

        if !self.enabled {
            return Ok(warnings);
        }

        self.check_fusable()?;

        let weight_sum = self.semantic_weight + self.lexical_weight;
        if (weight_sum - 1.0).abs() > 0.01 {
            warnings.push(format!(
                "retrieval.hybrid weights sum to {} (semanticWeight={}, lexicalWeight={}); \
                 weights summing to 1.0 are recommended",
                weight_sum, self.semantic_weight, self.lexical_weight
            ));
        }

        if self.rrf_k > 100.0 {
            warnings.push(format!(
                "retrieval.hybrid.rrfK={} is very large; rankings will be heavily smoothed (recommended: 60)",
                self.rrf_k
            ));
        }

        if self.semantic_weight == 0.0 && self.lexical_weight == 0.0 {
            warnings.push(
                "Both semanticWeight and lexicalWeight are 0; every fused score will be 0. \
                 Consider setting enabled=false instead."
                    .to_string(),
            );
        }

        Ok(warnings)
    }

    fn check_fusable(&self) -> RagResult<()> {
        if self.rrf_k <= 0.0 {
            return Err(RagError::invalid_config(
                "retrieval.hybrid.rrfK must be positive",
                "Set rrfK to a positive value (recommended: 60)",
            ));
        }
        if self.semantic_weight < 0.0 {
            return Err(RagError::invalid_config(
                "retrieval.hybrid.semanticWeight cannot be negative",
                "Set semanticWeight to 0.0 or higher (recommended: 0.7)",
            ));
        }
        if self.lexical_weight < 0.0 {
            return Err(RagError::invalid_config(
                "retrieval.hybrid.lexicalWeight cannot be negative",
                "Set lexicalWeight to 0.0 or higher (recommended: 0.3)",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// RRF
// ============================================================================

/// Fuse two rankings into one, best first.
///
/// Input scores are ignored; only positions matter. If a chunk occurs
/// twice in the same ranking, its first (best) position counts. Equal
/// fused scores keep first-seen order, semantic ranking first.
///
/// # Errors
///
/// Returns [`RagError::InvalidConfiguration`] for a non-positive `rrfK` or
/// negative weights, even if validation was bypassed.
pub fn rrf_fuse(
    semantic: &[ScoredCandidate],
    lexical: &[ScoredCandidate],
    config: &HybridConfig,
) -> RagResult<Vec<ScoredCandidate>> {
    config.check_fusable()?;

    let mut fused: Vec<ScoredCandidate> = Vec::with_capacity(semantic.len() + lexical.len());
    let mut slots: HashMap<ChunkKey, usize> = HashMap::new();

    for (ranking, weight) in [
        (semantic, config.semantic_weight),
        (lexical, config.lexical_weight),
    ] {
        let mut seen_in_ranking: HashSet<ChunkKey> = HashSet::new();
        for (idx, candidate) in ranking.iter().enumerate() {
            let key = candidate.key();
            if !seen_in_ranking.insert(key.clone()) {
                continue;
            }
            let contribution = weight / (config.rrf_k + (idx + 1) as f32);
            match slots.get(&key) {
                Some(&slot) => fused[slot].score += contribution,
                None => {
                    slots.insert(key, fused.len());
                    fused.push(ScoredCandidate::new(candidate.chunk.clone(), contribution));
                }
            }
        }
    }

    sort_by_score_desc(&mut fused);

    debug!(
        semantic = semantic.len(),
        lexical = lexical.len(),
        fused = fused.len(),
        "RRF fusion complete"
    );
    Ok(fused)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, Metadata};

    fn candidate(path: &str, score: f32) -> ScoredCandidate {
        let metadata = Metadata::new()
            .with("file_path", path)
            .with("start_line", 1_i64);
        ScoredCandidate::new(Chunk::new(format!("text of {}", path), metadata), score)
    }

    fn paths(list: &[ScoredCandidate]) -> Vec<String> {
        list.iter()
            .map(|c| c.chunk.metadata.file_path().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_rrf_reference_example() {
        let semantic = vec![candidate("A", 0.9), candidate("B", 0.8), candidate("C", 0.7)];
        // Distinct instances carrying the same structural identity.
        let lexical = vec![candidate("B", 5.0), candidate("A", 4.0)];

        let fused = rrf_fuse(&semantic, &lexical, &HybridConfig::default()).unwrap();

        assert_eq!(paths(&fused), vec!["A", "B", "C"]);
        assert!((fused[0].score - (0.7 / 61.0 + 0.3 / 62.0)).abs() < 1e-6);
        assert!((fused[1].score - (0.7 / 62.0 + 0.3 / 61.0)).abs() < 1e-6);
        assert!((fused[2].score - 0.7 / 63.0).abs() < 1e-6);
    }

    #[test]
    fn test_lexical_only_items_are_kept() {
        let semantic = vec![candidate("A", 0.9)];
        let lexical = vec![candidate("Z", 1.0)];
        let fused = rrf_fuse(&semantic, &lexical, &HybridConfig::default()).unwrap();
        assert_eq!(paths(&fused), vec!["A", "Z"]);
        assert!((fused[1].score - 0.3 / 61.0).abs() < 1e-6);
    }

    #[test]
    fn test_duplicate_within_ranking_counts_once() {
        let semantic = vec![candidate("A", 0.9), candidate("A", 0.5)];
        let fused = rrf_fuse(&semantic, &[], &HybridConfig::default()).unwrap();
        assert_eq!(fused.len(), 1);
        assert!((fused[0].score - 0.7 / 61.0).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_k_rejected() {
        let config = HybridConfig {
            rrf_k: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            rrf_fuse(&[], &[], &config),
            Err(RagError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_validate_warns_on_weight_sum() {
        let config = HybridConfig {
            semantic_weight: 0.5,
            lexical_weight: 0.8,
            ..Default::default()
        };
        let warnings = config.validate().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("sum to"));
    }

    #[test]
    fn test_validate_disabled_skips_checks() {
        let config = HybridConfig {
            enabled: false,
            rrf_k: -1.0,
            ..Default::default()
        };
        assert!(config.validate().unwrap().is_empty());
    }
}
