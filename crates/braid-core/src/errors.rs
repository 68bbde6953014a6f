//! Error types for braid-core.

use std::path::PathBuf;

use thiserror::Error;

/// Domain-specific errors for Braid operations.
///
/// The variants follow the engine's failure taxonomy:
/// - caller errors ([`BraidError::InvalidBranchHint`], [`BraidError::InvalidArgument`])
///   are surfaced immediately and never retried;
/// - service errors ([`BraidError::RetrievalUnavailable`], [`BraidError::MalformedDraft`],
///   [`BraidError::DraftingUnavailable`]) mean the engine could not even look at
///   the evidence, which is different from a refusal.
///
/// Citation mismatches are not errors: they are recovered inside the
/// validator and only lower the confidence score.
#[derive(Error, Debug)]
pub enum BraidError {
    // =========================================================================
    // Caller Errors
    // =========================================================================
    /// The explicit branch hint does not name a known branch.
    #[error("Unknown branch hint `{hint}`. Valid hints: {valid}. Use `auto` to let Braid detect the branch.")]
    InvalidBranchHint {
        /// The hint as given by the caller.
        hint: String,
        /// Comma-separated list of accepted hints.
        valid: String,
    },

    /// Invalid argument provided to an operation.
    #[error("{0}")]
    InvalidArgument(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// The configuration file is unreadable or a value is invalid.
    #[error("Invalid configuration: {message}. {hint}")]
    InvalidConfiguration {
        /// Description of the invalid configuration.
        message: String,
        /// Actionable hint on how to fix it.
        hint: String,
    },

    // =========================================================================
    // Passage Store Errors
    // =========================================================================
    /// Passage store I/O error.
    #[error("Passage store I/O error at `{path}`: {message}")]
    PassageStoreIo {
        /// Path to the passage file.
        path: PathBuf,
        /// Description of the I/O error.
        message: String,
    },

    /// Passage store parse error.
    #[error("Passage store parse error at `{path}`: {message}")]
    PassageStoreParse {
        /// Path to the passage file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// The passage corpus violates a store invariant (duplicate id, dimension drift).
    #[error("Passage store is inconsistent: {0}")]
    PassageStoreInvalid(String),

    // =========================================================================
    // Retrieval Errors
    // =========================================================================
    /// The embedding service failed or returned an unusable vector.
    #[error("Embedding provider `{provider}` is unavailable: {reason}")]
    EmbeddingUnavailable {
        /// The provider or model that failed.
        provider: String,
        /// Reason why the provider is unavailable.
        reason: String,
    },

    /// A single retrieval index failed to answer a query.
    #[error("{index} index query failed: {reason}")]
    IndexQueryFailed {
        /// Which index failed (`dense` or `sparse`).
        index: String,
        /// Description of the failure.
        reason: String,
    },

    /// Both retrieval signals are unavailable.
    #[error("Retrieval unavailable: dense ({dense}); sparse ({sparse})")]
    RetrievalUnavailable {
        /// Why dense retrieval failed.
        dense: String,
        /// Why sparse retrieval failed.
        sparse: String,
    },

    // =========================================================================
    // Drafting Errors
    // =========================================================================
    /// The drafting capability returned output that does not parse as a draft.
    #[error("Drafting model returned a malformed draft: {reason}")]
    MalformedDraft {
        /// What was wrong with the structure.
        reason: String,
    },

    /// The drafting capability could not be reached.
    #[error("Drafting provider `{provider}` is unavailable: {reason}")]
    DraftingUnavailable {
        /// The provider or model that failed.
        provider: String,
        /// Reason why the provider is unavailable.
        reason: String,
    },

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A wrapped generic error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BraidError {
    /// Errors caused by the request itself. Retrying the same request is pointless.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidBranchHint { .. } | Self::InvalidArgument(_)
        )
    }

    /// Errors where the engine could not evaluate the evidence at all.
    pub fn is_service_error(&self) -> bool {
        matches!(
            self,
            Self::RetrievalUnavailable { .. }
                | Self::MalformedDraft { .. }
                | Self::DraftingUnavailable { .. }
                | Self::EmbeddingUnavailable { .. }
                | Self::IndexQueryFailed { .. }
        )
    }
}
