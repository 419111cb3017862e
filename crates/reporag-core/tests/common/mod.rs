//! Shared fixtures for reporag-core integration tests.
//!
//! Collaborators are small structs implementing the public traits.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reporag_core::{Chunk, Metadata, QueryEngine, RagConfig};
use reporag_db::{
    DbError, DbResult, IndexCapabilities, IndexHit, SearchRequest, VectorIndexBackend,
};
use reporag_model::{Generator, ModelError, ModelResult};

/// Build a positioned chunk.
pub fn chunk(path: &str, start: i64, end: i64, category: &str, text: &str) -> Chunk {
    Chunk::new(
        text,
        Metadata::new()
            .with("file_path", path)
            .with("start_line", start)
            .with("end_line", end)
            .with("file_category", category),
    )
}

/// A small repository: chunk text, similarity to "the" query.
pub fn sample_corpus() -> Vec<(Chunk, f32)> {
    vec![
        (
            chunk(
                "src/auth/login.py",
                1,
                40,
                "code",
                "def login(user, password):\n    token = create_token(user)\n    return token",
            )
            .with_id("c1"),
            0.82,
        ),
        (
            chunk(
                "src/auth/login.py",
                41,
                90,
                "code",
                "def logout(session):\n    session.invalidate()",
            )
            .with_id("c2"),
            0.61,
        ),
        (
            chunk(
                "docs/auth.md",
                1,
                30,
                "docs",
                "Authentication overview: users log in with a password and receive a token.",
            )
            .with_id("c3"),
            0.74,
        ),
        (
            chunk(
                "src/db/models.py",
                1,
                60,
                "code",
                "class User:\n    name: str\n    password_hash: str",
            )
            .with_id("c4"),
            0.55,
        ),
        (
            chunk(
                "tests/test_login.py",
                1,
                25,
                "test",
                "def test_login():\n    assert login('a', 'b')",
            )
            .with_id("c5"),
            0.48,
        ),
        (
            chunk(
                "src/auth/login.py",
                300,
                340,
                "code",
                "def rotate_keys():\n    pass",
            )
            .with_id("c6"),
            0.20,
        ),
    ]
}

// ============================================================================
// Index
// ============================================================================

/// Returns its stored chunks with fixed similarities, honoring native
/// filters.
pub struct FakeIndex {
    entries: Vec<(Chunk, f32)>,
    capabilities: IndexCapabilities,
    delay: Option<Duration>,
    fail: bool,
    pub requests: Mutex<Vec<SearchRequest>>,
}

impl FakeIndex {
    pub fn new(entries: Vec<(Chunk, f32)>) -> Self {
        Self {
            entries,
            capabilities: IndexCapabilities {
                corpus_scan: true,
                text_queries: true,
            },
            delay: None,
            fail: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn remote_only(mut self) -> Self {
        self.capabilities.corpus_scan = false;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn last_request(&self) -> Option<SearchRequest> {
        self.requests.lock().ok()?.last().cloned()
    }
}

impl VectorIndexBackend for FakeIndex {
    fn name(&self) -> &str {
        "fake"
    }

    fn search(&self, request: &SearchRequest) -> DbResult<Vec<IndexHit>> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail {
            return Err(DbError::index_unavailable("connection refused"));
        }

        let mut hits: Vec<IndexHit> = self
            .entries
            .iter()
            .filter(|(chunk, _)| {
                request
                    .filter
                    .as_ref()
                    .map(|f| f.matches(&chunk.metadata))
                    .unwrap_or(true)
            })
            .map(|(chunk, score)| IndexHit {
                chunk: chunk.clone(),
                score: *score,
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(request.top_k);
        Ok(hits)
    }

    fn len(&self) -> DbResult<usize> {
        Ok(self.entries.len())
    }

    fn capabilities(&self) -> IndexCapabilities {
        self.capabilities
    }

    fn chunks_for_path(&self, path: &str) -> DbResult<Vec<Chunk>> {
        Ok(self
            .entries
            .iter()
            .filter(|(chunk, _)| chunk.metadata.file_path() == Some(path))
            .map(|(chunk, _)| chunk.clone())
            .collect())
    }
}

// ============================================================================
// Generator
// ============================================================================

/// Echoes a fixed answer and records every prompt.
#[derive(Debug, Default)]
pub struct FakeGenerator {
    pub answer: String,
    pub delay: Option<Duration>,
    pub fail: bool,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().ok()?.last().cloned()
    }
}

impl Generator for FakeGenerator {
    fn complete(&self, prompt: &str) -> ModelResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail {
            return Err(ModelError::generation_failed("fake", "model offline"));
        }
        Ok(self.answer.clone())
    }

    fn model_id(&self) -> &str {
        "fake-llm"
    }
}

/// Engine over the sample corpus with text queries and a fake generator.
pub fn engine_with(
    config: RagConfig,
    index: FakeIndex,
    generator: FakeGenerator,
) -> (QueryEngine, Arc<FakeIndex>, Arc<FakeGenerator>) {
    let index = Arc::new(index);
    let generator = Arc::new(generator);
    let engine = QueryEngine::new(config, index.clone())
        .expect("valid config")
        .with_generator(generator.clone());
    (engine, index, generator)
}

pub fn sample_engine() -> (QueryEngine, Arc<FakeIndex>, Arc<FakeGenerator>) {
    engine_with(
        RagConfig::default(),
        FakeIndex::new(sample_corpus()),
        FakeGenerator::answering("Login creates a token."),
    )
}
