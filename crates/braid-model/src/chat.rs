//! Chat completion client for an Ollama-compatible `/api/chat` endpoint.
//!
//! The client returns the raw message content. Interpreting that content
//! (and rejecting it when malformed) is the caller's job.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::ModelConfig;
use crate::error::{ModelError, ModelResult};

/// A chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`.
    pub role: String,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
}

/// Blocking chat client constrained to JSON output.
pub struct OllamaChat {
    client: reqwest::blocking::Client,
    config: ModelConfig,
}

impl OllamaChat {
    /// Create a new chat client from configuration.
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

    /// The drafting model id.
    pub fn model_id(&self) -> &str {
        &self.config.drafting_model
    }

    /// Run a JSON-mode completion and return the assistant message content.
    pub fn complete_json(&self, system: &str, user: &str) -> ModelResult<String> {
        let url = self.config.url("/api/chat");
        let body = request_body(&self.config, system, user);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| ModelError::from_transport(&url, self.config.request_timeout_secs, e))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| ModelError::from_transport(&url, self.config.request_timeout_secs, e))?;
        if !status.is_success() {
            return Err(ModelError::HttpStatus {
                endpoint: url,
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&text)?;
        let content = parsed
            .message
            .map(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                ModelError::completion_failed(&self.config.drafting_model, "empty message content")
            })?;

        debug!(
            "Completion from '{}': {} chars",
            self.config.drafting_model,
            content.len()
        );
        Ok(content)
    }
}

fn request_body(config: &ModelConfig, system: &str, user: &str) -> serde_json::Value {
    json!({
        "model": config.drafting_model,
        "messages": [ChatMessage::system(system), ChatMessage::user(user)],
        "stream": false,
        "format": "json",
        "options": { "temperature": config.temperature },
    })
}
