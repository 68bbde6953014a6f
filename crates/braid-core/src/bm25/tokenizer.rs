//! Unicode-aware tokenizer with stemming for BM25.
//!
//! The same tokenizer configuration is used to build the index and to
//! tokenize queries, otherwise terms would never line up.

use std::collections::HashSet;

use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Tokenizer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizerConfig {
    /// Apply English stemming to tokens.
    pub stemming: bool,
    /// Remove common stop words.
    pub remove_stopwords: bool,
    /// Minimum token length (in chars) to include.
    pub min_token_length: usize,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            stemming: true,
            remove_stopwords: true,
            min_token_length: 2,
        }
    }
}

/// Unicode-aware tokenizer with optional stemming.
pub struct Tokenizer {
    config: TokenizerConfig,
    stemmer: Option<Stemmer>,
    stopwords: HashSet<&'static str>,
}

impl Tokenizer {
    /// Create a new tokenizer with the given configuration.
    pub fn new(config: TokenizerConfig) -> Self {
        let stemmer = config
            .stemming
            .then(|| Stemmer::create(Algorithm::English));

        Self {
            config,
            stemmer,
            stopwords: Self::default_stopwords(),
        }
    }

    /// Tokenize text into a vector of processed tokens, in text order.
    ///
    /// Processing steps:
    /// 1. Unicode word segmentation
    /// 2. Lowercase normalization
    /// 3. Minimum length filtering
    /// 4. Stop word removal (if enabled)
    /// 5. Stemming (if enabled)
    ///
    /// Pure numbers are kept: years and model numbers carry meaning in prose.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.unicode_words()
            .filter_map(|word| self.process_token(word))
            .collect()
    }

    fn process_token(&self, word: &str) -> Option<String> {
        let lower = word.to_lowercase();

        if !lower.chars().any(|c| c.is_alphanumeric()) {
            return None;
        }

        if lower.chars().count() < self.config.min_token_length {
            return None;
        }

        if self.config.remove_stopwords && self.stopwords.contains(lower.as_str()) {
            return None;
        }

        let token = match &self.stemmer {
            Some(stemmer) => stemmer.stem(&lower).into_owned(),
            None => lower,
        };

        // Some stems fall under the minimum again
        if token.chars().count() < self.config.min_token_length {
            return None;
        }

        Some(token)
    }

    /// Default English stop words for narrative prose.
    fn default_stopwords() -> HashSet<&'static str> {
        [
            // Articles
            "a", "an", "the", // Prepositions
            "in", "on", "at", "to", "of", "with", "by", "from", "as", "into", "through", "during",
            "above", "below", "between", "under", "over", "out", "up", "down", "off",
            // Conjunctions
            "and", "or", "but", "nor", "so", "yet", // Pronouns
            "i", "you", "he", "she", "it", "we", "they", "me", "him", "her", "us", "them", "my",
            "your", "his", "its", "our", "their", "this", "that", "these", "those", "which", "who",
            "whom", "whose", "what", "where", "when", "how", "why", // Auxiliaries
            "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "having",
            "do", "does", "did", "doing", "will", "would", "could", "should", "may", "might",
            "must", "shall", "can", // Other common words
            "not", "no", "yes", "all", "any", "each", "few", "more", "most", "other", "some",
            "such", "than", "too", "very", "just", "also", "only", "own", "same", "then", "there",
            "here", "now", "about", "whether", "if",
        ]
        .into_iter()
        .collect()
    }

    #[cfg(test)]
    pub fn stopword_count(&self) -> usize {
        self.stopwords.len()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(TokenizerConfig::default())
    }
}
