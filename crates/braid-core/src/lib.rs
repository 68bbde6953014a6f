//! # braid-core
//!
//! **Branch-aware hybrid retrieval and citation validation** – core engine library.
//!
//! Braid answers questions about a document whose narrative splits into
//! mutually exclusive branches. It never mixes passages from incompatible
//! branches, merges a dense (embedding) and a sparse (BM25) signal into one
//! ranking, and only surfaces claims whose quotes verify against a retrieved
//! passage, refusing otherwise.
//!
//! ## Main Types
//!
//! - [`BraidEngine`] – the main entry point; runs the ask pipeline
//! - [`Response`] – an answer with verified citations, or a refusal
//! - [`BraidError`] – domain-specific error type
//!
//! ## Modules
//!
//! - [`branch`] – branch resolution from hints and trigger phrases
//! - [`bm25`] – tokenizer and BM25 lexical index
//! - [`vector_index`] – cosine vector index
//! - [`fusion`] – hybrid fusion, deduplication and the branch filter
//! - [`drafting`] – drafting requests, prompts and draft parsing
//! - [`citation`] – quote verification and confidence scoring
//! - [`response`] – refusal gate and response assembly
//! - [`model_adapter`] – HTTP collaborators from `braid-model`
//! - [`evaluate`] – labelled question sets and answer-quality metrics
//!
//! ## Example
//!
//! ```ignore
//! use braid_core::{AskOptions, BraidConfig, BraidEngine, Query};
//! use std::path::Path;
//!
//! let config = BraidConfig::load_default()?;
//! let engine = BraidEngine::from_config(config, Path::new("passages.jsonl"))?;
//!
//! let query = Query::new("Who wins the race?").with_branch_hint("race");
//! let response = engine.ask(&query, &AskOptions::new()).await?;
//! if response.refused {
//!     println!("Refused: {:?}", response.refusal_reason);
//! }
//! ```

// Modules
pub mod bm25;
pub mod branch;
pub mod citation;
pub mod config;
pub mod drafting;
pub mod embedding;
pub mod engine;
pub mod errors;
pub mod evaluate;
pub mod fusion;
pub mod model_adapter;
pub mod response;
pub mod store;
pub mod types;
pub mod vector_index;

// Re-exports for convenience
pub use bm25::{Bm25Config, Bm25Index, LexicalIndex, LexicalIndexStats};
pub use branch::{default_branch_rules, BranchResolution, BranchResolver, BranchRule, AUTO_HINT};
pub use citation::{CitationValidator, ValidationReport};
pub use config::{BraidConfig, CitationConfig, RefusalConfig, RetrievalConfig, TimeoutConfig};
pub use drafting::{parse_draft, AnswerDrafter, DraftAnswer, DraftPassage, DraftRequest};
pub use embedding::EmbeddingBackend;
pub use engine::{AskOptions, BraidEngine, HealthReport};
pub use errors::BraidError;
pub use evaluate::{evaluate, EvalCaseResult, EvalQuestion, EvalReport, EvalSet};
pub use fusion::{fuse, FusionOutcome, FusionParams};
pub use model_adapter::{ModelAnswerDrafter, ModelEmbeddingBackend};
pub use response::{RefusalReason, Response, ResponseCitation, RetrievalDebug, REFUSAL_TEXT};
pub use store::PassageStore;
pub use types::{
    Branch, BranchLabel, BranchSet, Citation, Locator, Passage, Query, RetrievedPassage,
    ScoredHit, Source, ValidatedCitation,
};
pub use vector_index::{InMemoryVectorIndex, VectorIndex};
