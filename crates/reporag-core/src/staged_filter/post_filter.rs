//! In-process evaluation of non-indexed filters.

use reporag_db::FilterCheck;
use tracing::warn;

use super::{FilterRule, FilterSet};
use crate::types::ScoredCandidate;

/// Result of a post-filter pass.
#[derive(Debug, Clone)]
pub struct PostFilterOutcome {
    pub kept: Vec<ScoredCandidate>,
    pub input_count: usize,
    /// Keys whose value could not be evaluated for at least one candidate.
    pub malformed_keys: Vec<String>,
}

impl PostFilterOutcome {
    pub fn reduction_percent(&self) -> f64 {
        reduction_percent(self.input_count, self.kept.len())
    }
}

/// `(before - after) / before × 100`, or 0 when `before` is 0.
pub fn reduction_percent(before: usize, after: usize) -> f64 {
    if before == 0 {
        return 0.0;
    }
    before.saturating_sub(after) as f64 / before as f64 * 100.0
}

/// Keep candidates that pass every key.
///
/// A malformed rule, or a value the rule cannot be compared against, fails
/// that key for the candidate. Missing metadata fails too. Input order is
/// preserved and the output is never longer than the input.
pub fn apply_post_filter(candidates: Vec<ScoredCandidate>, filters: &FilterSet) -> PostFilterOutcome {
    let input_count = candidates.len();
    let mut malformed_keys: Vec<String> = Vec::new();

    let mut note_malformed = |key: &str, message: &str| {
        if !malformed_keys.iter().any(|k| k == key) {
            warn!(key, message, "Post-filter value malformed; key treated as failing");
            malformed_keys.push(key.to_string());
        }
    };

    let kept = candidates
        .into_iter()
        .filter(|candidate| {
            filters.iter().all(|(key, rule)| match rule {
                FilterRule::Malformed { message, .. } => {
                    note_malformed(key, message);
                    false
                }
                FilterRule::Condition(condition) => {
                    match condition.check(candidate.chunk.metadata.get(key)) {
                        FilterCheck::Pass => true,
                        FilterCheck::Fail => false,
                        FilterCheck::Malformed(message) => {
                            note_malformed(key, &message);
                            false
                        }
                    }
                }
            })
        })
        .collect();

    PostFilterOutcome {
        kept,
        input_count,
        malformed_keys,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, Metadata};
    use reporag_db::{FilterCondition, RangeBounds};

    fn candidate(idx: i64, has_fn: bool, complexity: i64) -> ScoredCandidate {
        ScoredCandidate::new(
            Chunk::new(
                format!("chunk {}", idx),
                Metadata::new()
                    .with("file_path", "src/lib.rs")
                    .with("start_line", idx * 10)
                    .with("has_function_definition", has_fn)
                    .with("complexity_score", complexity),
            ),
            1.0 - idx as f32 * 0.01,
        )
    }

    fn filters(entries: Vec<(&str, FilterCondition)>) -> FilterSet {
        entries
            .into_iter()
            .map(|(k, c)| (k.to_string(), FilterRule::Condition(c)))
            .collect()
    }

    #[test]
    fn test_boolean_filter_reduction() {
        let candidates: Vec<_> = (0..10).map(|i| candidate(i, i < 6, 1)).collect();
        let outcome = apply_post_filter(
            candidates,
            &filters(vec![("has_function_definition", FilterCondition::eq(true))]),
        );
        assert_eq!(outcome.kept.len(), 6);
        assert!((outcome.reduction_percent() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_range_and_membership_combine() {
        let candidates: Vec<_> = (0..5).map(|i| candidate(i, true, i)).collect();
        let outcome = apply_post_filter(
            candidates,
            &filters(vec![
                (
                    "complexity_score",
                    FilterCondition::range(RangeBounds {
                        gte: Some(1.0),
                        lt: Some(4.0),
                        ..Default::default()
                    }),
                ),
                ("start_line", FilterCondition::one_of([10_i64, 30, 40])),
            ]),
        );
        let kept: Vec<i64> = outcome
            .kept
            .iter()
            .filter_map(|c| c.chunk.metadata.start_line().map(|s| s as i64))
            .collect();
        assert_eq!(kept, vec![10, 30]);
    }

    #[test]
    fn test_missing_key_fails() {
        let outcome = apply_post_filter(
            vec![candidate(0, true, 1)],
            &filters(vec![("owner", FilterCondition::eq("core"))]),
        );
        assert!(outcome.kept.is_empty());
        assert!(outcome.malformed_keys.is_empty());
    }

    #[test]
    fn test_malformed_rule_fails_key() {
        let mut set = FilterSet::default();
        set.insert_rule(
            "complexity_score",
            FilterRule::Malformed {
                raw: serde_json::json!({"$between": [1, 2]}),
                message: "unknown operator '$between'".into(),
            },
        );
        let outcome = apply_post_filter(vec![candidate(0, true, 1)], &set);
        assert!(outcome.kept.is_empty());
        assert_eq!(outcome.malformed_keys, vec!["complexity_score"]);
    }

    #[test]
    fn test_range_against_text_is_malformed() {
        let outcome = apply_post_filter(
            vec![candidate(0, true, 1)],
            &filters(vec![(
                "file_path",
                FilterCondition::range(RangeBounds {
                    gte: Some(1.0),
                    ..Default::default()
                }),
            )]),
        );
        assert!(outcome.kept.is_empty());
        assert_eq!(outcome.malformed_keys, vec!["file_path"]);
    }

    #[test]
    fn test_reduction_zero_input() {
        assert_eq!(reduction_percent(0, 0), 0.0);
    }
}
