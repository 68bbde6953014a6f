//! Adapter layer for braid-model infrastructure.
//!
//! This module bridges the braid-model HTTP clients with braid-core's traits:
//!
//! - Error conversion from `ModelError` to `BraidError`
//! - [`ModelEmbeddingBackend`]: [`EmbeddingBackend`] over `OllamaEmbedder`
//! - [`ModelAnswerDrafter`]: [`AnswerDrafter`] over `OllamaChat`
//!
//! ## Architecture
//!
//! ```text
//! braid-core engine (ask, health)
//!        ↓
//!   model_adapter (this module) - wrappers + conversions
//!        ↓
//!     braid-model clients (reqwest blocking)
//! ```

use braid_model::{ModelConfig, ModelError, OllamaChat, OllamaEmbedder};

use crate::drafting::{user_prompt, AnswerDrafter, DraftRequest, SYSTEM_PROMPT};
use crate::embedding::EmbeddingBackend;
use crate::errors::BraidError;

// ============================================================================
// Error Conversion
// ============================================================================

/// Which collaborator a model call served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    Embedding,
    Drafting,
}

/// Convert a braid-model error to a braid-core error.
///
/// Transport failures carry no hint of what they were for, so the caller
/// names the collaborator.
pub fn from_model_error(err: ModelError, collaborator: Collaborator) -> BraidError {
    let unavailable = |provider: String, reason: String| match collaborator {
        Collaborator::Embedding => BraidError::EmbeddingUnavailable { provider, reason },
        Collaborator::Drafting => BraidError::DraftingUnavailable { provider, reason },
    };

    match err {
        ModelError::InvalidConfig { message } => BraidError::InvalidConfiguration {
            message,
            hint: "Fix the model section of the config file".to_string(),
        },

        ModelError::EmbeddingFailed { model_id, message } => BraidError::EmbeddingUnavailable {
            provider: model_id,
            reason: message,
        },

        ModelError::CompletionFailed { model_id, message } => BraidError::DraftingUnavailable {
            provider: model_id,
            reason: message,
        },

        err @ ModelError::Unreachable { .. } => unavailable("model-server".to_string(), err.to_string()),

        ModelError::Timeout {
            endpoint,
            timeout_secs,
        } => unavailable(endpoint, format!("timed out after {}s", timeout_secs)),

        ModelError::HttpStatus {
            endpoint,
            status,
            body,
        } => unavailable(endpoint, format!("HTTP {}: {}", status, body)),

        ModelError::Json(json_err) => unavailable(
            "model-server".to_string(),
            format!("unexpected response body: {}", json_err),
        ),
    }
}

/// Extension trait to convert a braid-model Result to Result<T, BraidError>.
pub trait IntoBraidResult<T> {
    /// Convert a braid-model result to a BraidError result.
    fn into_braid_result(self, collaborator: Collaborator) -> Result<T, BraidError>;
}

impl<T> IntoBraidResult<T> for Result<T, ModelError> {
    fn into_braid_result(self, collaborator: Collaborator) -> Result<T, BraidError> {
        self.map_err(|e| from_model_error(e, collaborator))
    }
}

// ============================================================================
// Embedding Backend Wrapper
// ============================================================================

/// [`EmbeddingBackend`] backed by the Ollama embeddings endpoint.
pub struct ModelEmbeddingBackend {
    inner: OllamaEmbedder,
}

impl ModelEmbeddingBackend {
    /// Create a backend from model configuration.
    ///
    /// Builds a blocking HTTP client; call this outside an async context.
    pub fn new(config: &ModelConfig) -> Result<Self, BraidError> {
        let inner = OllamaEmbedder::new(config.clone()).into_braid_result(Collaborator::Embedding)?;
        Ok(Self { inner })
    }

    /// Expected dimension, when configured.
    pub fn dimension(&self) -> Option<usize> {
        self.inner.dimension()
    }
}

impl EmbeddingBackend for ModelEmbeddingBackend {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn embed(&self, input: &str) -> Result<Vec<f32>, BraidError> {
        self.inner.embed(input).into_braid_result(Collaborator::Embedding)
    }
}

impl std::fmt::Debug for ModelEmbeddingBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelEmbeddingBackend")
            .field("model_id", &self.inner.model_id())
            .finish()
    }
}

// ============================================================================
// Drafting Wrapper
// ============================================================================

/// [`AnswerDrafter`] backed by the Ollama chat endpoint in JSON mode.
pub struct ModelAnswerDrafter {
    inner: OllamaChat,
}

impl ModelAnswerDrafter {
    /// Create a drafter from model configuration.
    ///
    /// Builds a blocking HTTP client; call this outside an async context.
    pub fn new(config: &ModelConfig) -> Result<Self, BraidError> {
        let inner = OllamaChat::new(config.clone()).into_braid_result(Collaborator::Drafting)?;
        Ok(Self { inner })
    }
}

impl AnswerDrafter for ModelAnswerDrafter {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn draft(&self, request: &DraftRequest) -> Result<String, BraidError> {
        self.inner
            .complete_json(SYSTEM_PROMPT, &user_prompt(request))
            .into_braid_result(Collaborator::Drafting)
    }
}

impl std::fmt::Debug for ModelAnswerDrafter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelAnswerDrafter")
            .field("model_id", &self.inner.model_id())
            .finish()
    }
}
