//! Embedding client for an Ollama-compatible `/api/embeddings` endpoint.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::ModelConfig;
use crate::error::{ModelError, ModelResult};

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// Blocking embedding client.
///
/// Never returns an empty vector: an empty or missing `embedding` field is
/// reported as [`ModelError::EmbeddingFailed`].
pub struct OllamaEmbedder {
    client: reqwest::blocking::Client,
    config: ModelConfig,
}

impl OllamaEmbedder {
    /// Create a new embedder from configuration.
    pub fn new(config: ModelConfig) -> ModelResult<Self> {
        config.validate()?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ModelError::InvalidConfig {
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client, config })
    }

    /// The embedding model id.
    pub fn model_id(&self) -> &str {
        &self.config.embedding_model
    }

    /// Expected dimension, when configured.
    pub fn dimension(&self) -> Option<usize> {
        self.config.dimension
    }

    /// Embed a single text.
    pub fn embed(&self, text: &str) -> ModelResult<Vec<f32>> {
        let url = self.config.url("/api/embeddings");
        trace!("POST {} ({} chars)", url, text.len());

        let response = self
            .client
            .post(&url)
            .json(&EmbeddingRequest {
                model: &self.config.embedding_model,
                prompt: text,
            })
            .send()
            .map_err(|e| ModelError::from_transport(&url, self.config.request_timeout_secs, e))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| ModelError::from_transport(&url, self.config.request_timeout_secs, e))?;
        if !status.is_success() {
            return Err(ModelError::HttpStatus {
                endpoint: url,
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbeddingResponse = serde_json::from_str(&body)?;
        if parsed.embedding.is_empty() {
            return Err(ModelError::embedding_failed(
                &self.config.embedding_model,
                "server returned an empty embedding",
            ));
        }

        debug!(
            "Embedded query with '{}' ({} dims)",
            self.config.embedding_model,
            parsed.embedding.len()
        );
        Ok(parsed.embedding)
    }
}
