//! Property tests for the ranking and filtering stages.

use std::collections::HashSet;

use proptest::prelude::*;
use reporag_core::lexical::{score, Bm25Params};
use reporag_core::{
    apply_post_filter, detect_intent, rrf_fuse, Chunk, FilterSet, HybridConfig, Metadata,
    QueryIntent, QueryProcessor, RelevanceReranker, RerankConfig, ScoredCandidate,
    SelectivityTable,
};
use reporag_db::{FilterCondition, RangeBounds};

fn candidate(idx: usize, category: &str, text: &str, score: f32) -> ScoredCandidate {
    ScoredCandidate::new(
        Chunk::new(
            text,
            Metadata::new()
                .with("file_path", format!("src/mod_{}.py", idx % 4))
                .with("start_line", (idx * 50) as i64)
                .with("file_category", category)
                .with("complexity_score", (idx % 7) as i64),
        ),
        score,
    )
}

fn candidates_strategy() -> impl Strategy<Value = Vec<ScoredCandidate>> {
    prop::collection::vec(
        (
            prop::sample::select(vec!["code", "docs", "test"]),
            "[a-z ]{0,40}",
            0.0f32..1.0,
        ),
        0..20,
    )
    .prop_map(|items| {
        items
            .into_iter()
            .enumerate()
            .map(|(idx, (category, text, score))| candidate(idx, category, &text, score))
            .collect()
    })
}

fn intent_strategy() -> impl Strategy<Value = QueryIntent> {
    prop::sample::select(vec![
        QueryIntent::Summary,
        QueryIntent::Qna,
        QueryIntent::Coding,
        QueryIntent::Explanation,
        QueryIntent::Implementation,
        QueryIntent::Debugging,
        QueryIntent::Architecture,
        QueryIntent::Usage,
        QueryIntent::Comparison,
        QueryIntent::General,
    ])
}

fn is_sorted_desc(list: &[ScoredCandidate]) -> bool {
    list.windows(2).all(|w| w[0].score >= w[1].score)
}

proptest! {
    #[test]
    fn intent_detection_is_deterministic(query in ".{0,80}") {
        prop_assert_eq!(detect_intent(&query), detect_intent(&query));
    }

    #[test]
    fn processing_is_idempotent(query in ".{0,80}") {
        let processor = QueryProcessor::new();
        prop_assert_eq!(processor.process(&query, &[]), processor.process(&query, &[]));
    }

    #[test]
    fn rerank_never_lowers_a_score(
        candidates in candidates_strategy(),
        query in "[a-z ]{0,30}",
        intent in intent_strategy(),
    ) {
        let before: Vec<(String, f32)> = candidates
            .iter()
            .map(|c| (c.key().to_string(), c.score))
            .collect();
        let reranked = RelevanceReranker::new(RerankConfig::default()).rerank(candidates, &query, intent);

        prop_assert_eq!(reranked.len(), before.len());
        prop_assert!(is_sorted_desc(&reranked));
        for item in &reranked {
            let key = item.key().to_string();
            let original = before.iter().find(|(k, _)| *k == key).map(|(_, s)| *s);
            prop_assert!(original.is_some());
            prop_assert!(item.score >= original.unwrap_or(f32::MAX));
        }
    }

    #[test]
    fn post_filter_never_grows(candidates in candidates_strategy(), upper in 0.0f64..8.0) {
        let filters = FilterSet::new().with(
            "complexity_score",
            FilterCondition::range(RangeBounds { lte: Some(upper), ..Default::default() }),
        );
        let input_len = candidates.len();
        let outcome = apply_post_filter(candidates, &filters);

        prop_assert!(outcome.kept.len() <= input_len);
        for kept in &outcome.kept {
            let value = kept.chunk.metadata.get("complexity_score").and_then(|v| v.as_f64());
            prop_assert!(value.is_some_and(|v| v <= upper));
        }
        let reduction = outcome.reduction_percent();
        prop_assert!((0.0..=100.0).contains(&reduction));
    }

    #[test]
    fn fusion_is_sorted_and_covers_both_lists(
        semantic in candidates_strategy(),
        lexical in candidates_strategy(),
    ) {
        let fused = rrf_fuse(&semantic, &lexical, &HybridConfig::default()).unwrap();

        prop_assert!(is_sorted_desc(&fused));
        let expected: HashSet<String> = semantic
            .iter()
            .chain(lexical.iter())
            .map(|c| c.key().to_string())
            .collect();
        let actual: HashSet<String> = fused.iter().map(|c| c.key().to_string()).collect();
        prop_assert_eq!(fused.len(), actual.len());
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn selectivity_stays_in_bounds(
        file_types in prop::collection::vec(prop::sample::select(vec!["code", "test", "docs", "config", "other"]), 0..6),
        languages in prop::collection::vec(prop::sample::select(vec!["python", "go", "typescript"]), 0..4),
        depth in 0.0f64..10.0,
    ) {
        let mut filters = FilterSet::new();
        if !file_types.is_empty() {
            filters = filters.with("file_type", FilterCondition::one_of(file_types));
        }
        if !languages.is_empty() {
            filters = filters.with("language", FilterCondition::one_of(languages));
        }
        filters = filters.with(
            "directory_depth",
            FilterCondition::range(RangeBounds { lte: Some(depth), ..Default::default() }),
        );

        let estimate = SelectivityTable::default().estimate(&filters);
        prop_assert!((0.01..=1.0).contains(&estimate));
    }

    #[test]
    fn bm25_is_non_negative(doc in "[a-z ]{0,200}", terms in prop::collection::vec("[a-z]{3,8}", 0..5)) {
        let s = score(&terms, &doc, 10.0, &Bm25Params::default());
        prop_assert!(s >= 0.0);
        prop_assert!(s.is_finite());
    }
}
