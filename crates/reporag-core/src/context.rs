//! Positional context expansion.
//!
//! Pulls in chunks from the same file whose start line lies within
//! `size × linesPerChunk` lines of a selected chunk. Chunk length is
//! assumed, not measured, so adjacency is coarse.
//!
//! Expansion needs a pool of chunks per file. The engine only runs it
//! against backends that advertise
//! [`IndexCapabilities::corpus_scan`](reporag_db::IndexCapabilities).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{RagError, RagResult};
use crate::types::{Chunk, ChunkKey};

/// Context expansion configuration (`retrieval.expansion`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionConfig {
    /// Default: false
    #[serde(default)]
    pub enabled: bool,

    /// Neighbor distance in chunks. Default: 2
    #[serde(default = "default_size")]
    pub size: u64,

    /// Assumed lines per chunk. Default: 50
    #[serde(default = "default_lines_per_chunk")]
    pub lines_per_chunk: u64,
}

fn default_size() -> u64 {
    2
}

fn default_lines_per_chunk() -> u64 {
    50
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            size: default_size(),
            lines_per_chunk: default_lines_per_chunk(),
        }
    }
}

impl ExpansionConfig {
    /// Maximum start-line distance for a neighbor.
    pub fn window(&self) -> u64 {
        self.size.saturating_mul(self.lines_per_chunk)
    }

    pub fn validate(&self) -> RagResult<Vec<String>> {
        if self.enabled && self.lines_per_chunk == 0 {
            return Err(RagError::invalid_config(
                "retrieval.expansion.linesPerChunk cannot be 0",
                "Set linesPerChunk to the typical chunk length (default: 50)",
            ));
        }
        let mut warnings = Vec::new();
        if self.enabled && self.size == 0 {
            warnings.push(
                "retrieval.expansion.size is 0; only chunks starting on the same line are added"
                    .to_string(),
            );
        }
        Ok(warnings)
    }
}

/// Return `selected` followed by every adjacent chunk from `pool`.
///
/// Selected chunks without a file path or start line are kept but do not
/// expand. A neighbor is never a chunk already in the result, and always
/// shares the file path of the chunk that pulled it in.
pub fn expand_context(selected: &[Chunk], pool: &[Chunk], config: &ExpansionConfig) -> Vec<Chunk> {
    let window = config.window();
    let mut seen: HashSet<ChunkKey> = selected.iter().map(Chunk::key).collect();
    let mut expanded: Vec<Chunk> = selected.to_vec();

    for chunk in selected {
        let (Some(path), Some(start)) = (chunk.metadata.file_path(), chunk.metadata.start_line())
        else {
            continue;
        };

        for other in pool {
            if other.metadata.file_path() != Some(path) {
                continue;
            }
            let Some(other_start) = other.metadata.start_line() else {
                continue;
            };
            if other_start.abs_diff(start) <= window && seen.insert(other.key()) {
                expanded.push(other.clone());
            }
        }
    }

    debug!(
        selected = selected.len(),
        added = expanded.len() - selected.len(),
        window,
        "Context expansion complete"
    );
    expanded
}
