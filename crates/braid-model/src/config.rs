//! Configuration for model server clients.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Default Ollama endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// Default drafting (chat) model.
pub const DEFAULT_DRAFTING_MODEL: &str = "llama3.1";

/// Default sampling temperature for drafting.
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Default HTTP timeout in seconds.
///
/// This is a transport ceiling only; the engine applies its own tighter
/// per-call deadlines on top.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Connection settings for an Ollama-compatible model server.
///
/// # Example YAML
///
/// ```yaml
/// model:
///   endpoint: http://localhost:11434
///   embeddingModel: nomic-embed-text
///   draftingModel: llama3.1
///   temperature: 0.1
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    /// Base URL of the server.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model used for query embeddings. Must match the model used at ingestion.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Model used for drafting answers.
    #[serde(default = "default_drafting_model")]
    pub drafting_model: String,

    /// Sampling temperature for drafting.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Expected embedding dimension, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_drafting_model() -> String {
    DEFAULT_DRAFTING_MODEL.to_string()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            embedding_model: default_embedding_model(),
            drafting_model: default_drafting_model(),
            temperature: default_temperature(),
            dimension: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ModelConfig {
    /// Build the full URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ModelResult<()> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(ModelError::InvalidConfig {
                message: format!(
                    "model.endpoint must be an http(s) URL, got '{}'",
                    self.endpoint
                ),
            });
        }
        if self.embedding_model.trim().is_empty() || self.drafting_model.trim().is_empty() {
            return Err(ModelError::InvalidConfig {
                message: "model.embeddingModel and model.draftingModel cannot be empty"
                    .to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ModelError::InvalidConfig {
                message: format!(
                    "model.temperature must be within 0.0..=2.0, got {}",
                    self.temperature
                ),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ModelError::InvalidConfig {
                message: "model.requestTimeoutSecs cannot be 0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ModelConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let config = ModelConfig {
            endpoint: "http://host:1/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.url("/api/chat"), "http://host:1/api/chat");
    }

    #[test]
    fn test_rejects_non_http_endpoint() {
        let config = ModelConfig {
            endpoint: "localhost:11434".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_camel_case_with_defaults() {
        let config: ModelConfig =
            serde_json::from_str(r#"{"draftingModel": "qwen2.5", "temperature": 0.0}"#).unwrap();
        assert_eq!(config.drafting_model, "qwen2.5");
        assert_eq!(config.embedding_model, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(config.temperature, 0.0);
    }
}
