//! BM25 sparse retrieval.
//!
//! Lexical matching complements dense similarity: exact names, years and
//! model numbers ("Agent-4", "2027") are often what the question hinges on,
//! and embeddings blur them.
//!
//! ## Key Components
//!
//! - [`tokenizer`]: Unicode-aware tokenization with English stemming
//! - [`index`]: BM25 inverted index
//! - [`scorer`]: BM25 scoring (k1=1.2, b=0.75, smoothed IDF)
//!
//! ## Usage
//!
//! ```ignore
//! use braid_core::bm25::{Bm25Config, Bm25Index, LexicalIndex};
//!
//! let mut index = Bm25Index::new(&Bm25Config::default());
//! index.build_from_iter(store.passages().iter().map(|p| (p.id.clone(), p.text.clone())));
//!
//! let tokens = index.tokenize("what happens to Agent-4");
//! let hits = index.query(&tokens, 20)?;
//! ```

mod index;
mod scorer;
mod tokenizer;

pub use index::{Bm25Index, DocumentStats, LexicalIndexStats};
pub use scorer::{bm25_term_score, idf, Bm25Params};
pub use tokenizer::{Tokenizer, TokenizerConfig};

use serde::{Deserialize, Serialize};

use crate::errors::BraidError;
use crate::types::ScoredHit;

// ============================================================================
// LexicalIndex
// ============================================================================

/// A read-only lexical index over passage texts.
///
/// `query` must be given tokens produced by the same index's `tokenize`.
pub trait LexicalIndex: Send + Sync {
    /// Tokenize text with the index's tokenizer configuration.
    fn tokenize(&self, text: &str) -> Vec<String>;

    /// Up to `n` hits, score descending, ties by insertion order.
    fn query(&self, tokens: &[String], n: usize) -> Result<Vec<ScoredHit>, BraidError>;

    /// Index statistics.
    fn stats(&self) -> LexicalIndexStats;
}

impl LexicalIndex for Bm25Index {
    fn tokenize(&self, text: &str) -> Vec<String> {
        Bm25Index::tokenize(self, text)
    }

    fn query(&self, tokens: &[String], n: usize) -> Result<Vec<ScoredHit>, BraidError> {
        Ok(self.search_tokens(tokens, n))
    }

    fn stats(&self) -> LexicalIndexStats {
        Bm25Index::stats(self)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// BM25 configuration: tokenization and scoring parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bm25Config {
    /// Term frequency saturation. Default: 1.2
    #[serde(default = "default_k1")]
    pub k1: f32,

    /// Document length normalization, 0..=1. Default: 0.75
    #[serde(default = "default_b")]
    pub b: f32,

    /// Apply English stemming. Default: true
    #[serde(default = "default_stemming")]
    pub stemming: bool,

    /// Remove stop words. Default: true
    #[serde(default = "default_remove_stopwords")]
    pub remove_stopwords: bool,

    /// Minimum token length. Default: 2
    #[serde(default = "default_min_token_length")]
    pub min_token_length: usize,
}

fn default_k1() -> f32 {
    1.2
}

fn default_b() -> f32 {
    0.75
}

fn default_stemming() -> bool {
    true
}

fn default_remove_stopwords() -> bool {
    true
}

fn default_min_token_length() -> usize {
    2
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self {
            k1: default_k1(),
            b: default_b(),
            stemming: default_stemming(),
            remove_stopwords: default_remove_stopwords(),
            min_token_length: default_min_token_length(),
        }
    }
}

impl Bm25Config {
    /// Validates the BM25 parameters, returning warnings for questionable values.
    ///
    /// # Errors
    /// Returns an error if `k1` is negative or `b` is outside `0..=1`.
    pub fn validate(&self) -> Result<Vec<String>, BraidError> {
        let mut warnings = Vec::new();

        if !self.k1.is_finite() || self.k1 < 0.0 {
            return Err(BraidError::InvalidConfiguration {
                message: "retrieval.bm25.k1 must be a non-negative number".to_string(),
                hint: "Set k1 to a value such as 1.2".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err(BraidError::InvalidConfiguration {
                message: format!("retrieval.bm25.b must be within 0..=1, got {}", self.b),
                hint: "Set b to a value such as 0.75".to_string(),
            });
        }

        if self.min_token_length > 4 {
            warnings.push(format!(
                "retrieval.bm25.minTokenLength={} drops short terms such as years and model names",
                self.min_token_length
            ));
        }

        Ok(warnings)
    }
}
