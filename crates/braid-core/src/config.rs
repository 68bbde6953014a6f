//! Configuration for Braid.
//!
//! A single YAML file, `~/.braid/config.yaml` by default. Every key is
//! optional; a missing file yields the defaults.
//!
//! ```yaml
//! retrieval:
//!   topK: 10
//!   denseWeight: 0.5
//!   sparseWeight: 0.5
//!   agreementBonus: 0.1
//! citation:
//!   matchThreshold: 85
//! refusal:
//!   minConfidence: 0.5
//! timeouts:
//!   draftingMs: 60000
//! model:
//!   endpoint: http://localhost:11434
//!   embeddingModel: nomic-embed-text
//!   draftingModel: llama3.1
//! branches:
//!   - branch: branch_A
//!     aliases: [race]
//!     triggers: ["race ending", "race scenario"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use braid_model::ModelConfig;
use serde::{Deserialize, Serialize};

use crate::bm25::Bm25Config;
use crate::branch::{default_branch_rules, BranchResolver, BranchRule};
use crate::errors::BraidError;

// ============================================================================
// BraidConfig
// ============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BraidConfig {
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub citation: CitationConfig,

    #[serde(default)]
    pub refusal: RefusalConfig,

    /// Ordered trigger table for branch detection.
    #[serde(default = "default_branch_rules")]
    pub branches: Vec<BranchRule>,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Embedding and drafting model server.
    #[serde(default)]
    pub model: ModelConfig,
}

impl Default for BraidConfig {
    fn default() -> Self {
        Self {
            retrieval: RetrievalConfig::default(),
            citation: CitationConfig::default(),
            refusal: RefusalConfig::default(),
            branches: default_branch_rules(),
            timeouts: TimeoutConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

impl BraidConfig {
    /// Load from the default location (`~/.braid/config.yaml`).
    ///
    /// If the file does not exist, returns the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`BraidError::InvalidConfiguration`] if the file exists but cannot be parsed.
    pub fn load_default() -> Result<Self, BraidError> {
        match Self::default_path() {
            Some(path) => Self::from_path(&path),
            None => {
                tracing::debug!("Could not determine home directory, using default config");
                Ok(Self::default())
            }
        }
    }

    /// Load from a specific path. A missing file yields the defaults.
    ///
    /// Values are not validated here; [`crate::BraidEngine::new`] does that.
    pub fn from_path(path: &Path) -> Result<Self, BraidError> {
        if !path.exists() {
            tracing::debug!("Config not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| BraidError::InvalidConfiguration {
            message: format!("failed to read {}: {}", path.display(), e),
            hint: "Check the file permissions or pass another file with --config".to_string(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| BraidError::InvalidConfiguration {
            message: format!("failed to parse {}: {}", path.display(), e),
            hint: "The config file must be YAML with camelCase keys".to_string(),
        })
    }

    /// The default config directory (`~/.braid`).
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".braid"))
    }

    /// The default config file path (`~/.braid/config.yaml`).
    pub fn default_path() -> Option<PathBuf> {
        Self::default_dir().map(|d| d.join("config.yaml"))
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns the first critical error as [`BraidError::InvalidConfiguration`].
    ///
    /// # Warnings
    ///
    /// Non-fatal issues are returned for the caller to log.
    pub fn validate(&self) -> Result<Vec<String>, BraidError> {
        let mut all_warnings = Vec::new();

        all_warnings.extend(self.retrieval.validate()?);
        all_warnings.extend(self.citation.validate()?);
        all_warnings.extend(self.refusal.validate()?);
        all_warnings.extend(self.timeouts.validate()?);

        // Compiles triggers and checks alias collisions
        BranchResolver::new(&self.branches)?;
        if self.branches.iter().all(|r| r.triggers.is_empty()) {
            all_warnings.push(
                "branches has no trigger phrases; every auto query will be ambiguous".to_string(),
            );
        }

        self.model
            .validate()
            .map_err(|e| BraidError::InvalidConfiguration {
                message: e.to_string(),
                hint: "Fix the model section of the config file".to_string(),
            })?;

        Ok(all_warnings)
    }
}

// ============================================================================
// RetrievalConfig
// ============================================================================

/// Hybrid retrieval and fusion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalConfig {
    /// Passages kept after fusion. Default: 10
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Dense candidates before fusion; 0 means `2 × topK`.
    #[serde(default)]
    pub dense_top_k: usize,

    /// Sparse candidates before fusion; 0 means `2 × topK`.
    #[serde(default)]
    pub sparse_top_k: usize,

    /// Weight of the normalized dense score. Default: 0.5
    #[serde(default = "default_dense_weight")]
    pub dense_weight: f32,

    /// Weight of the normalized sparse score. Default: 0.5
    #[serde(default = "default_sparse_weight")]
    pub sparse_weight: f32,

    /// Added when both retrievers return a passage. Default: 0.1
    #[serde(default = "default_agreement_bonus")]
    pub agreement_bonus: f32,

    #[serde(default)]
    pub bm25: Bm25Config,
}

fn default_top_k() -> usize {
    10
}

fn default_dense_weight() -> f32 {
    0.5
}

fn default_sparse_weight() -> f32 {
    0.5
}

fn default_agreement_bonus() -> f32 {
    0.1
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            dense_top_k: 0,
            sparse_top_k: 0,
            dense_weight: default_dense_weight(),
            sparse_weight: default_sparse_weight(),
            agreement_bonus: default_agreement_bonus(),
            bm25: Bm25Config::default(),
        }
    }
}

impl RetrievalConfig {
    /// Dense candidate count for a given final K.
    pub fn dense_candidates(&self, top_k: usize) -> usize {
        if self.dense_top_k == 0 {
            top_k.saturating_mul(2)
        } else {
            self.dense_top_k
        }
    }

    /// Sparse candidate count for a given final K.
    pub fn sparse_candidates(&self, top_k: usize) -> usize {
        if self.sparse_top_k == 0 {
            top_k.saturating_mul(2)
        } else {
            self.sparse_top_k
        }
    }

    /// Validates the retrieval section, returning warnings for questionable values.
    pub fn validate(&self) -> Result<Vec<String>, BraidError> {
        let mut warnings = Vec::new();

        if self.top_k == 0 {
            return Err(BraidError::InvalidConfiguration {
                message: "retrieval.topK cannot be 0".to_string(),
                hint: "Set topK to at least 1 (recommended: 10)".to_string(),
            });
        }
        for (name, value) in [
            ("denseWeight", self.dense_weight),
            ("sparseWeight", self.sparse_weight),
            ("agreementBonus", self.agreement_bonus),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(BraidError::InvalidConfiguration {
                    message: format!("retrieval.{} cannot be negative", name),
                    hint: format!("Set {} to 0.0 or higher", name),
                });
            }
        }

        if self.dense_top_k != 0 && self.dense_top_k < self.top_k {
            warnings.push(format!(
                "retrieval.denseTopK={} is below topK={}; dense recall is capped",
                self.dense_top_k, self.top_k
            ));
        }
        if self.sparse_top_k != 0 && self.sparse_top_k < self.top_k {
            warnings.push(format!(
                "retrieval.sparseTopK={} is below topK={}; sparse recall is capped",
                self.sparse_top_k, self.top_k
            ));
        }

        let weight_sum = self.dense_weight + self.sparse_weight;
        if (weight_sum - 1.0).abs() > 0.01 {
            warnings.push(format!(
                "retrieval weights sum to {} (denseWeight={}, sparseWeight={}); \
                 weights summing to 1.0 are recommended",
                weight_sum, self.dense_weight, self.sparse_weight
            ));
        }
        if self.dense_weight == 0.0 && self.sparse_weight == 0.0 {
            warnings.push(
                "Both denseWeight and sparseWeight are 0; fused order will only reflect agreement"
                    .to_string(),
            );
        }

        warnings.extend(self.bm25.validate()?);
        Ok(warnings)
    }
}

// ============================================================================
// CitationConfig
// ============================================================================

/// Citation validation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationConfig {
    /// Minimum match score (0–100) for a citation to verify. Default: 85
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f32,

    /// Quotes shorter than this (chars, trimmed) never verify. Default: 10
    #[serde(default = "default_min_quote_chars")]
    pub min_quote_chars: usize,

    /// Surfaced quotes are truncated to this many chars. Default: 300
    #[serde(default = "default_max_quote_chars")]
    pub max_quote_chars: usize,

    /// Subtracted per quote number absent from the passage. Default: 20
    #[serde(default = "default_numeric_mismatch_penalty")]
    pub numeric_mismatch_penalty: f32,
}

fn default_match_threshold() -> f32 {
    85.0
}

fn default_min_quote_chars() -> usize {
    10
}

fn default_max_quote_chars() -> usize {
    300
}

fn default_numeric_mismatch_penalty() -> f32 {
    20.0
}

impl Default for CitationConfig {
    fn default() -> Self {
        Self {
            match_threshold: default_match_threshold(),
            min_quote_chars: default_min_quote_chars(),
            max_quote_chars: default_max_quote_chars(),
            numeric_mismatch_penalty: default_numeric_mismatch_penalty(),
        }
    }
}

impl CitationConfig {
    pub fn validate(&self) -> Result<Vec<String>, BraidError> {
        let mut warnings = Vec::new();

        if !(0.0..=100.0).contains(&self.match_threshold) {
            return Err(BraidError::InvalidConfiguration {
                message: format!(
                    "citation.matchThreshold must be within 0..=100, got {}",
                    self.match_threshold
                ),
                hint: "Set matchThreshold to a value such as 85".to_string(),
            });
        }
        if self.max_quote_chars == 0 {
            return Err(BraidError::InvalidConfiguration {
                message: "citation.maxQuoteChars cannot be 0".to_string(),
                hint: "Set maxQuoteChars to at least minQuoteChars (recommended: 300)".to_string(),
            });
        }
        if !self.numeric_mismatch_penalty.is_finite() || self.numeric_mismatch_penalty < 0.0 {
            return Err(BraidError::InvalidConfiguration {
                message: "citation.numericMismatchPenalty cannot be negative".to_string(),
                hint: "Set numericMismatchPenalty to 0 to disable it".to_string(),
            });
        }

        if self.match_threshold < 70.0 {
            warnings.push(format!(
                "citation.matchThreshold={} is permissive; paraphrases will verify as quotes",
                self.match_threshold
            ));
        }
        if self.min_quote_chars > self.max_quote_chars {
            warnings.push(format!(
                "citation.minQuoteChars={} exceeds maxQuoteChars={}",
                self.min_quote_chars, self.max_quote_chars
            ));
        }

        Ok(warnings)
    }
}

// ============================================================================
// RefusalConfig
// ============================================================================

/// Refusal gate settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefusalConfig {
    /// Responses below this confidence are refused. Default: 0.5
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
}

fn default_min_confidence() -> f32 {
    0.5
}

impl Default for RefusalConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
        }
    }
}

impl RefusalConfig {
    pub fn validate(&self) -> Result<Vec<String>, BraidError> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(BraidError::InvalidConfiguration {
                message: format!(
                    "refusal.minConfidence must be within 0..=1, got {}",
                    self.min_confidence
                ),
                hint: "Set minConfidence to a value such as 0.5".to_string(),
            });
        }
        let mut warnings = Vec::new();
        if self.min_confidence == 0.0 {
            warnings.push(
                "refusal.minConfidence=0 only refuses when no citation verifies".to_string(),
            );
        }
        Ok(warnings)
    }
}

// ============================================================================
// TimeoutConfig
// ============================================================================

/// Per-call deadlines, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutConfig {
    /// Query embedding call. Default: 5000
    #[serde(default = "default_embedding_ms")]
    pub embedding_ms: u64,

    /// Each index query. Default: 5000
    #[serde(default = "default_retrieval_ms")]
    pub retrieval_ms: u64,

    /// Answer drafting call. Default: 60000
    #[serde(default = "default_drafting_ms")]
    pub drafting_ms: u64,

    /// Pause before the single embedding retry. Default: 250
    #[serde(default = "default_embedding_retry_backoff_ms")]
    pub embedding_retry_backoff_ms: u64,
}

fn default_embedding_ms() -> u64 {
    5_000
}

fn default_retrieval_ms() -> u64 {
    5_000
}

fn default_drafting_ms() -> u64 {
    60_000
}

fn default_embedding_retry_backoff_ms() -> u64 {
    250
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            embedding_ms: default_embedding_ms(),
            retrieval_ms: default_retrieval_ms(),
            drafting_ms: default_drafting_ms(),
            embedding_retry_backoff_ms: default_embedding_retry_backoff_ms(),
        }
    }
}

impl TimeoutConfig {
    pub fn embedding(&self) -> Duration {
        Duration::from_millis(self.embedding_ms)
    }

    pub fn retrieval(&self) -> Duration {
        Duration::from_millis(self.retrieval_ms)
    }

    pub fn drafting(&self) -> Duration {
        Duration::from_millis(self.drafting_ms)
    }

    pub fn embedding_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.embedding_retry_backoff_ms)
    }

    pub fn validate(&self) -> Result<Vec<String>, BraidError> {
        for (name, value) in [
            ("embeddingMs", self.embedding_ms),
            ("retrievalMs", self.retrieval_ms),
            ("draftingMs", self.drafting_ms),
        ] {
            if value == 0 {
                return Err(BraidError::InvalidConfiguration {
                    message: format!("timeouts.{} cannot be 0", name),
                    hint: "Use a positive number of milliseconds".to_string(),
                });
            }
        }

        let mut warnings = Vec::new();
        if self.embedding_retry_backoff_ms >= self.embedding_ms {
            warnings.push(format!(
                "timeouts.embeddingRetryBackoffMs={} is not below embeddingMs={}",
                self.embedding_retry_backoff_ms, self.embedding_ms
            ));
        }
        Ok(warnings)
    }
}
