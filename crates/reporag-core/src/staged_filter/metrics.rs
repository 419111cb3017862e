//! Per-query filter metrics.

use serde::Serialize;

use super::FilterStage;

/// What happened to the pre-filter for one query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "camelCase")]
pub enum PreFilterDecision {
    /// No pre-filters were configured.
    NotConfigured,
    /// Pre-filtering is switched off.
    Disabled,
    /// Estimate inside the bounds; the native filter was sent.
    Applied { selectivity: f64 },
    /// Estimate below the minimum; skipped.
    TooRestrictive { selectivity: f64 },
    /// Estimate above the maximum; skipped.
    TooBroad { selectivity: f64 },
    /// Configured, but no key could be translated into a native filter.
    NothingTranslatable { selectivity: f64 },
}

impl PreFilterDecision {
    /// Single inclusive-bounds admission check.
    pub fn admit(selectivity: f64, min: f64, max: f64) -> Self {
        if selectivity < min {
            Self::TooRestrictive { selectivity }
        } else if selectivity > max {
            Self::TooBroad { selectivity }
        } else {
            Self::Applied { selectivity }
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    pub fn selectivity(&self) -> Option<f64> {
        match self {
            Self::Applied { selectivity }
            | Self::TooRestrictive { selectivity }
            | Self::TooBroad { selectivity }
            | Self::NothingTranslatable { selectivity } => Some(*selectivity),
            Self::NotConfigured | Self::Disabled => None,
        }
    }
}

/// Write-once record of one staged retrieval.
///
/// `estimated_recall` is a configured label chosen by whether the
/// pre-filter was applied, not a measurement.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterMetrics {
    pub total_latency_ms: f64,
    pub pre_filter_latency_ms: f64,
    pub vector_search_latency_ms: f64,
    pub post_filter_latency_ms: f64,

    pub pre_filter: PreFilterDecision,
    /// Candidates requested from the index.
    pub requested: usize,
    /// Candidates the index returned.
    pub retrieved_count: usize,
    /// Candidates left after the post-filter.
    pub post_filter_count: usize,
    /// Candidates handed on after truncation.
    pub returned_count: usize,

    /// Estimated share of the corpus excluded by the pre-filter.
    pub pre_filter_reduction: f64,
    pub post_filter_reduction: f64,

    pub estimated_recall: f64,
    pub used_pre_filter: bool,
    pub used_post_filter: bool,

    /// Stages entered, in order.
    pub stages: Vec<FilterStage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_bounds() {
        assert!(matches!(
            PreFilterDecision::admit(0.05, 0.10, 0.50),
            PreFilterDecision::TooRestrictive { .. }
        ));
        assert!(PreFilterDecision::admit(0.30, 0.10, 0.50).is_applied());
        assert!(matches!(
            PreFilterDecision::admit(0.80, 0.10, 0.50),
            PreFilterDecision::TooBroad { .. }
        ));
    }

    #[test]
    fn test_admission_is_inclusive() {
        assert!(PreFilterDecision::admit(0.10, 0.10, 0.50).is_applied());
        assert!(PreFilterDecision::admit(0.50, 0.10, 0.50).is_applied());
    }

    #[test]
    fn test_decision_serializes_tagged() {
        let value = serde_json::to_value(PreFilterDecision::Applied { selectivity: 0.3 }).unwrap();
        assert_eq!(value["decision"], "applied");
        assert_eq!(value["selectivity"], 0.3);
    }
}
