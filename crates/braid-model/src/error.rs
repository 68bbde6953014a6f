//! Error types for braid-model.
//!
//! Errors carry enough context to tell the operator which server and which
//! model failed, and how to fix it.

use thiserror::Error;

/// Result type alias for braid-model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur while talking to a model server.
#[derive(Debug, Error)]
pub enum ModelError {
    // ========================================================================
    // Transport errors
    // ========================================================================
    /// The model server could not be reached.
    #[error("{}", format_unreachable(.endpoint, .message))]
    Unreachable { endpoint: String, message: String },

    /// The request did not complete within the client timeout.
    #[error("Request to {endpoint} timed out after {timeout_secs}s")]
    Timeout { endpoint: String, timeout_secs: u64 },

    /// The server answered with a non-success status.
    #[error("Model server {endpoint} returned HTTP {status}: {body}")]
    HttpStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    // ========================================================================
    // Inference errors
    // ========================================================================
    /// Embedding generation failed.
    #[error("Embedding failed for model '{model_id}': {message}")]
    EmbeddingFailed { model_id: String, message: String },

    /// Chat completion failed or returned no content.
    #[error("Completion failed for model '{model_id}': {message}")]
    CompletionFailed { model_id: String, message: String },

    /// Client configuration is invalid.
    #[error("Invalid model configuration: {message}")]
    InvalidConfig { message: String },

    // ========================================================================
    // I/O errors
    // ========================================================================
    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_unreachable(endpoint: &str, message: &str) -> String {
    format!(
        "Model server unreachable at {endpoint}: {message}\n\n\
        Braid expects an Ollama-compatible server. To fix:\n\
        1. Start the server (e.g. `ollama serve`), OR\n\
        2. Set model.endpoint in ~/.braid/config.yaml to a reachable server."
    )
}

// ============================================================================
// Error constructors
// ============================================================================

impl ModelError {
    /// Create an embedding failed error.
    pub fn embedding_failed(model_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingFailed {
            model_id: model_id.into(),
            message: message.into(),
        }
    }

    /// Create a completion failed error.
    pub fn completion_failed(model_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CompletionFailed {
            model_id: model_id.into(),
            message: message.into(),
        }
    }

    /// Classify a reqwest error against the endpoint it was sent to.
    pub(crate) fn from_transport(endpoint: &str, timeout_secs: u64, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                endpoint: endpoint.to_string(),
                timeout_secs,
            }
        } else {
            Self::Unreachable {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Whether retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unreachable { .. } | Self::Timeout { .. } => true,
            Self::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
