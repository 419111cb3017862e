//! Ollama HTTP backends (feature `ollama`).
//!
//! Uses the blocking reqwest client: the retrieval pipeline is synchronous
//! per request and callers impose deadlines around these calls.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{EmbeddingConfig, GeneratorConfig};
use crate::error::{ModelError, ModelResult};
use crate::{EmbeddingModel, Generator};

fn build_client(timeout_secs: u64) -> ModelResult<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

// ============================================================================
// Generation
// ============================================================================

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Generator backed by `POST /api/generate`.
#[derive(Debug)]
pub struct OllamaGenerator {
    client: Client,
    url: String,
    model_id: String,
    temperature: f32,
}

impl OllamaGenerator {
    pub fn new(config: &GeneratorConfig) -> ModelResult<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            url: endpoint(&config.base_url, "api/generate"),
            model_id: config.model_id.clone(),
            temperature: config.temperature,
        })
    }
}

impl Generator for OllamaGenerator {
    fn complete(&self, prompt: &str) -> ModelResult<String> {
        debug!(model = %self.model_id, prompt_chars = prompt.len(), "Ollama generate");

        let response = self
            .client
            .post(&self.url)
            .json(&GenerateRequest {
                model: &self.model_id,
                prompt,
                stream: false,
                options: GenerateOptions {
                    temperature: self.temperature,
                },
            })
            .send()?;

        if !response.status().is_success() {
            return Err(ModelError::generation_failed(
                &self.model_id,
                format!("HTTP {}", response.status()),
            ));
        }

        Ok(response.json::<GenerateResponse>()?.response)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Embeddings
// ============================================================================

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

/// Embedder backed by `POST /api/embeddings`.
#[derive(Debug)]
pub struct OllamaEmbedder {
    client: Client,
    url: String,
    model_id: String,
    dimension: usize,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> ModelResult<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            url: endpoint(&config.base_url, "api/embeddings"),
            model_id: config.model_id.clone(),
            dimension: config.dimension,
        })
    }
}

impl EmbeddingModel for OllamaEmbedder {
    fn embed(&self, texts: &[&str]) -> ModelResult<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|text| {
                let response = self
                    .client
                    .post(&self.url)
                    .json(&EmbeddingsRequest {
                        model: &self.model_id,
                        prompt: text,
                    })
                    .send()?;

                if !response.status().is_success() {
                    return Err(ModelError::embedding_failed(
                        &self.model_id,
                        format!("HTTP {}", response.status()),
                    ));
                }

                Ok(response.json::<EmbeddingsResponse>()?.embedding)
            })
            .collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        assert_eq!(
            endpoint("http://localhost:11434/", "api/generate"),
            "http://localhost:11434/api/generate"
        );
    }

    #[test]
    fn test_generate_request_shape() {
        let body = serde_json::to_value(GenerateRequest {
            model: "llama3.1",
            prompt: "hi",
            stream: false,
            options: GenerateOptions { temperature: 0.5 },
        })
        .unwrap();
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["temperature"], 0.5);
    }
}
