//! Simple in-memory vector index backend.
//!
//! Chunks are loaded from a JSONL file and searched by linear scan. Intended
//! for tests and small repositories where a full vector database is not
//! justified. Filters are evaluated in-process with the same
//! [`FilterExpression`] semantics a remote store applies natively.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::traits::{
    IndexCapabilities, IndexHit, SearchQuery, SearchRequest, VectorIndexBackend, VectorMetric,
};
use crate::chunk::{Chunk, Metadata};
use crate::error::{DbError, DbResult};

/// One line of a chunk file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    #[serde(default)]
    id: Option<String>,
    text: String,
    #[serde(default)]
    metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    vector: Option<Vec<f32>>,
}

/// A chunk with its (optional) embedding, as read from disk.
///
/// Records without a vector must be embedded by the caller before they can
/// be added to a [`SimpleIndex`].
#[derive(Debug, Clone)]
pub struct IndexRecord {
    pub chunk: Chunk,
    pub vector: Option<Vec<f32>>,
}

impl IndexRecord {
    pub fn new(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self {
            chunk,
            vector: Some(vector),
        }
    }

    fn label(&self) -> String {
        self.chunk
            .id
            .clone()
            .unwrap_or_else(|| self.chunk.key().to_string())
    }
}

/// Read chunk records from a JSONL file.
///
/// Blank lines are skipped; any malformed line is an error.
pub fn load_records(path: impl AsRef<Path>) -> DbResult<Vec<IndexRecord>> {
    let path = path.as_ref();
    debug!("Loading chunk records from {:?}", path);

    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let stored: StoredRecord = serde_json::from_str(&line)
            .map_err(|e| DbError::parse(path, line_num + 1, e.to_string()))?;

        let mut chunk = Chunk::new(stored.text, Metadata::from_json_map(&stored.metadata));
        chunk.id = stored.id;
        records.push(IndexRecord {
            chunk,
            vector: stored.vector,
        });
    }

    debug!("Loaded {} records", records.len());
    Ok(records)
}

struct Entry {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// Brute-force vector index over immutable chunks.
pub struct SimpleIndex {
    dimension: usize,
    metric: VectorMetric,
    entries: Vec<Entry>,
    /// Entry positions per source file, in load order.
    by_path: HashMap<String, Vec<usize>>,
}

impl SimpleIndex {
    /// Build an index from embedded records.
    ///
    /// # Errors
    ///
    /// - [`DbError::MissingVector`] if a record has no embedding
    /// - [`DbError::DimensionMismatch`] if embeddings differ in length
    pub fn from_records(records: Vec<IndexRecord>) -> DbResult<Self> {
        let mut dimension = None;
        let mut entries = Vec::with_capacity(records.len());
        let mut by_path: HashMap<String, Vec<usize>> = HashMap::new();

        for record in records {
            let label = record.label();
            let vector = record
                .vector
                .ok_or(DbError::MissingVector { id: label })?;

            let expected = *dimension.get_or_insert(vector.len());
            if vector.len() != expected {
                return Err(DbError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }

            if let Some(path) = record.chunk.metadata.file_path() {
                by_path
                    .entry(path.to_string())
                    .or_default()
                    .push(entries.len());
            }
            entries.push(Entry {
                chunk: record.chunk,
                vector,
            });
        }

        Ok(Self {
            dimension: dimension.unwrap_or(0),
            metric: VectorMetric::default(),
            entries,
            by_path,
        })
    }

    /// Load and build from a JSONL file where every record carries a vector.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Self::from_records(load_records(path)?)
    }

    pub fn with_metric(mut self, metric: VectorMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Embedding dimension, 0 for an empty index.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> VectorMetric {
        self.metric
    }

    fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        match self.metric {
            VectorMetric::Cosine => cosine_similarity(a, b),
            VectorMetric::Dot => dot_product(a, b),
        }
    }
}

impl VectorIndexBackend for SimpleIndex {
    fn name(&self) -> &str {
        "simple"
    }

    fn search(&self, request: &SearchRequest) -> DbResult<Vec<IndexHit>> {
        let embedding = match &request.query {
            SearchQuery::Embedding(e) => e,
            other => {
                return Err(DbError::UnsupportedQuery {
                    backend: self.name().to_string(),
                    kind: other.kind(),
                })
            }
        };

        if !self.entries.is_empty() && embedding.len() != self.dimension {
            return Err(DbError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        trace!(
            "Searching SimpleIndex, top_k={}, filter={:?}",
            request.top_k,
            request.filter.as_ref().map(|f| f.to_json())
        );

        let mut scored: Vec<(f32, &Entry)> = self
            .entries
            .iter()
            .filter(|e| {
                request
                    .filter
                    .as_ref()
                    .map(|f| f.matches(&e.chunk.metadata))
                    .unwrap_or(true)
            })
            .map(|e| (self.similarity(embedding, &e.vector), e))
            .collect();

        // Descending, NaN last.
        scored.sort_by(|a, b| {
            let key = |s: f32| if s.is_nan() { f32::NEG_INFINITY } else { s };
            key(b.0).total_cmp(&key(a.0))
        });

        let hits: Vec<IndexHit> = scored
            .into_iter()
            .take(request.top_k)
            .map(|(score, entry)| IndexHit {
                chunk: entry.chunk.clone(),
                score,
            })
            .collect();

        trace!("Found {} hits", hits.len());
        Ok(hits)
    }

    fn len(&self) -> DbResult<usize> {
        Ok(self.entries.len())
    }

    fn capabilities(&self) -> IndexCapabilities {
        IndexCapabilities {
            corpus_scan: true,
            text_queries: false,
        }
    }

    fn chunks_for_path(&self, path: &str) -> DbResult<Vec<Chunk>> {
        Ok(self
            .by_path
            .get(path)
            .map(|positions| {
                positions
                    .iter()
                    .map(|&i| self.entries[i].chunk.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}

// ============================================================================
// Similarity Functions
// ============================================================================

/// Compute cosine similarity between two vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot = dot_product(a, b);
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{KEY_FILE_CATEGORY, KEY_FILE_PATH, KEY_START_LINE};
    use crate::filter::{FilterCondition, FilterExpression};
    use std::io::Write;

    fn record(path: &str, start: i64, category: &str, vector: Vec<f32>) -> IndexRecord {
        IndexRecord::new(
            Chunk::new(
                format!("{} at {}", path, start),
                Metadata::new()
                    .with(KEY_FILE_PATH, path)
                    .with(KEY_START_LINE, start)
                    .with(KEY_FILE_CATEGORY, category),
            ),
            vector,
        )
    }

    fn sample_index() -> SimpleIndex {
        SimpleIndex::from_records(vec![
            record("src/auth.rs", 1, "code", vec![1.0, 0.0, 0.0]),
            record("src/auth.rs", 60, "code", vec![0.9, 0.1, 0.0]),
            record("README.md", 1, "docs", vec![0.0, 1.0, 0.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&a, &[0.0, 1.0, 0.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&a, &[0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_search_ranks_and_truncates() {
        let index = sample_index();
        let hits = index
            .search(&SearchRequest::new(
                SearchQuery::Embedding(vec![1.0, 0.0, 0.0]),
                2,
            ))
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.metadata.start_line(), Some(1));
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_search_ranks_nan_similarity_last() {
        let index = SimpleIndex::from_records(vec![
            record("broken.rs", 1, "code", vec![f32::NAN, 0.0, 0.0]),
            record("src/auth.rs", 1, "code", vec![1.0, 0.0, 0.0]),
            record("README.md", 1, "docs", vec![0.0, 1.0, 0.0]),
        ])
        .unwrap();
        let hits = index
            .search(&SearchRequest::new(
                SearchQuery::Embedding(vec![1.0, 0.0, 0.0]),
                3,
            ))
            .unwrap();
        let paths: Vec<_> = hits.iter().filter_map(|h| h.chunk.metadata.file_path()).collect();
        assert_eq!(paths, vec!["src/auth.rs", "README.md", "broken.rs"]);
    }

    #[test]
    fn test_search_applies_filter() {
        let index = sample_index();
        let request = SearchRequest::new(SearchQuery::Embedding(vec![1.0, 0.0, 0.0]), 10)
            .with_filter(FilterExpression::new().with(KEY_FILE_CATEGORY, FilterCondition::eq("docs")));
        let hits = index.search(&request).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.metadata.file_path(), Some("README.md"));
    }

    #[test]
    fn test_text_query_unsupported() {
        let index = sample_index();
        let result = index.search(&SearchRequest::new(SearchQuery::Text("auth".into()), 3));
        assert!(matches!(result, Err(DbError::UnsupportedQuery { .. })));
    }

    #[test]
    fn test_dimension_checks() {
        let mismatched = SimpleIndex::from_records(vec![
            record("a.rs", 1, "code", vec![1.0, 0.0]),
            record("b.rs", 1, "code", vec![1.0, 0.0, 0.0]),
        ]);
        assert!(matches!(mismatched, Err(DbError::DimensionMismatch { .. })));

        let index = sample_index();
        let result = index.search(&SearchRequest::new(SearchQuery::Embedding(vec![1.0]), 3));
        assert!(matches!(result, Err(DbError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_chunks_for_path() {
        let index = sample_index();
        assert!(index.capabilities().corpus_scan);
        assert_eq!(index.chunks_for_path("src/auth.rs").unwrap().len(), 2);
        assert!(index.chunks_for_path("missing.rs").unwrap().is_empty());
    }

    #[test]
    fn test_load_records_from_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.jsonl");
        let mut file = File::create(&path).unwrap();
        writeln!(
            file,
            r#"{{"id":"c1","text":"fn main() {{}}","metadata":{{"file_path":"src/main.rs","start_line":1}},"vector":[1.0,0.0]}}"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(file, r##"{{"text":"# Readme","metadata":{{"file_path":"README.md"}}}}"##).unwrap();
        drop(file);

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].chunk.id.as_deref(), Some("c1"));
        assert!(records[1].vector.is_none());

        assert!(matches!(
            SimpleIndex::open(&path),
            Err(DbError::MissingVector { .. })
        ));
    }

    #[test]
    fn test_load_records_reports_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.jsonl");
        std::fs::write(&path, "{\"text\":\"ok\"}\nnot json\n").unwrap();
        match load_records(&path) {
            Err(DbError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {:?}", other.map(|r| r.len())),
        }
    }
}
