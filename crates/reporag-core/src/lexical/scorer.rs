//! Corpus-unaware BM25 scoring.
//!
//! ```text
//! score(D, Q) = Σ IDF · (f(q, D) · (k1 + 1)) / (f(q, D) + k1 · (1 - b + b · |D| / avgdl))
//! ```
//!
//! No document-frequency statistics are kept, so IDF is fixed at
//! [`FIXED_IDF`]. This ranks a candidate batch by term-frequency
//! saturation and length normalization only; it is an approximation of
//! BM25, not the full formula.

use std::collections::HashMap;

/// IDF used for every term.
pub const FIXED_IDF: f32 = 1.0;

/// BM25 scoring parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term frequency saturation.
    pub k1: f32,
    /// Length normalization. 0 disables it, 1 is full normalization.
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// Lower-cased whitespace tokens of a document.
pub fn document_terms(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace().map(str::to_lowercase)
}

/// Lower-cased query terms with at least `min_len` characters.
pub fn query_terms(query: &str, min_len: usize) -> Vec<String> {
    document_terms(query)
        .filter(|term| term.chars().count() >= min_len)
        .collect()
}

/// Score contribution of one term.
#[inline]
pub fn bm25_term_score(term_freq: usize, doc_len: usize, avg_doc_len: f32, params: &Bm25Params) -> f32 {
    let tf = term_freq as f32;
    let dl = doc_len as f32;
    let numerator = tf * (params.k1 + 1.0);
    let denominator = tf + params.k1 * (1.0 - params.b + params.b * dl / avg_doc_len);
    FIXED_IDF * numerator / denominator
}

/// Score `document` against already-filtered `query_terms`.
///
/// `avg_doc_len` is the mean token count over the whole candidate batch.
/// Returns 0 when no query term occurs in the document.
pub fn score(query_terms: &[String], document: &str, avg_doc_len: f32, params: &Bm25Params) -> f32 {
    if query_terms.is_empty() || avg_doc_len <= 0.0 {
        return 0.0;
    }

    let mut term_freq: HashMap<String, usize> = HashMap::new();
    let mut doc_len = 0;
    for term in document_terms(document) {
        *term_freq.entry(term).or_default() += 1;
        doc_len += 1;
    }

    query_terms
        .iter()
        .filter_map(|term| term_freq.get(term))
        .map(|&tf| bm25_term_score(tf, doc_len, avg_doc_len, params))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_query_terms_drop_short_tokens() {
        assert_eq!(query_terms("Is the DB cache ok", 3), terms(&["the", "cache"]));
    }

    #[test]
    fn test_single_term_average_length() {
        // tf=1, |D| = avgdl: 1 * 2.5 / (1 + 1.5) = 1.0
        let s = score(&terms(&["cache"]), "the cache layer", 3.0, &Bm25Params::default());
        assert!((s - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_no_match_scores_zero() {
        let s = score(&terms(&["router"]), "the cache layer", 3.0, &Bm25Params::default());
        assert_eq!(s, 0.0);
    }

    #[test]
    fn test_case_insensitive_document() {
        let s = score(&terms(&["cache"]), "CACHE Cache cache", 3.0, &Bm25Params::default());
        assert!(s > 1.0);
    }

    #[test]
    fn test_length_normalization() {
        let params = Bm25Params::default();
        let short = bm25_term_score(3, 50, 100.0, &params);
        let long = bm25_term_score(3, 200, 100.0, &params);
        assert!(short > long);
    }

    #[test]
    fn test_tf_saturation() {
        let params = Bm25Params::default();
        let s1 = bm25_term_score(1, 100, 100.0, &params);
        let s10 = bm25_term_score(10, 100, 100.0, &params);
        let s100 = bm25_term_score(100, 100, 100.0, &params);
        assert!(s10 > s1 && s100 > s10);
        assert!(s100 < params.k1 + 1.0);
    }

    #[test]
    fn test_zero_average_length_is_guarded() {
        assert_eq!(score(&terms(&["x"]), "", 0.0, &Bm25Params::default()), 0.0);
    }
}
