//! Feature-hashing embedder.
//!
//! Projects character trigrams and whole tokens into a fixed number of
//! buckets with xxh3 and L2-normalizes the result. Vectors are stable across
//! builds and platforms, so chunk files embedded once stay searchable.

use xxhash_rust::xxh3::xxh3_64;

use crate::error::{ModelError, ModelResult};
use crate::EmbeddingModel;

const TRIGRAM_WEIGHT: f32 = 1.0;
const TOKEN_WEIGHT: f32 = 0.5;

/// Deterministic embedder that needs no model files.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    model_id: String,
    dimension: usize,
}

impl HashingEmbedder {
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidConfig`] if `dimension` is 0.
    pub fn new(model_id: impl Into<String>, dimension: usize) -> ModelResult<Self> {
        if dimension == 0 {
            return Err(ModelError::InvalidConfig {
                message: "embedder.dimension must be at least 1".to_string(),
            });
        }
        Ok(Self {
            model_id: model_id.into(),
            dimension,
        })
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let normalized = normalize_text(text);
        let mut vector = vec![0.0_f32; self.dimension];

        for trigram in char_ngrams(&normalized, 3) {
            let idx = (xxh3_64(trigram.as_bytes()) % self.dimension as u64) as usize;
            vector[idx] += TRIGRAM_WEIGHT;
        }

        for token in normalized.split_whitespace() {
            let idx = (xxh3_64(token.as_bytes()) % self.dimension as u64) as usize;
            vector[idx] += TOKEN_WEIGHT;
        }

        normalize_l2(&mut vector);
        vector
    }
}

impl EmbeddingModel for HashingEmbedder {
    fn embed(&self, texts: &[&str]) -> ModelResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

fn char_ngrams(input: &str, n: usize) -> Vec<String> {
    if input.is_empty() {
        return Vec::new();
    }

    let padded = format!(" {} ", input);
    let chars: Vec<char> = padded.chars().collect();
    if chars.len() < n {
        return vec![padded];
    }

    (0..=chars.len() - n)
        .map(|idx| chars[idx..idx + n].iter().collect())
        .collect()
}

/// Lowercase, keep alphanumerics and `_`, collapse everything else to one space.
fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_space = true;
    for ch in text.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            out.extend(ch.to_lowercase());
            prev_space = false;
        } else if !prev_space {
            out.push(' ');
            prev_space = true;
        }
    }
    out.trim_end().to_string()
}

fn normalize_l2(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        return;
    }
    for v in vector.iter_mut() {
        *v /= norm;
    }
}
