//! # braid-model
//!
//! Collaborator layer for Braid: HTTP clients for the embedding service and the
//! answer drafting model.
//!
//! This crate knows nothing about passages, branches or citations. It moves
//! text to an Ollama-compatible server and returns vectors or raw completion
//! strings. `braid-core` wraps these clients behind its own traits
//! (see `braid_core::model_adapter`), which keeps the HTTP stack out of the
//! engine and lets tests substitute fakes.
//!
//! ## Architecture
//!
//! ```text
//! braid-cli → braid-core → (traits: EmbeddingBackend, AnswerDrafter)
//!                 ↑
//!            braid-model (implements the transport)
//! ```

pub mod chat;
pub mod config;
pub mod embedding;
pub mod error;

pub use chat::{ChatMessage, OllamaChat};
pub use config::{
    ModelConfig, DEFAULT_DRAFTING_MODEL, DEFAULT_EMBEDDING_MODEL, DEFAULT_ENDPOINT,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TEMPERATURE,
};
pub use embedding::OllamaEmbedder;
pub use error::{ModelError, ModelResult};
