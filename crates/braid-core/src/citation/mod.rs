//! Citation validation and confidence scoring.
//!
//! Each drafted citation is checked against the passage it names:
//!
//! 1. the passage must be in the fused set, otherwise `verified = false`, score 0
//! 2. the quote is cut to `maxQuoteChars` before any matching; the cut quote is
//!    what gets scored and surfaced
//! 3. the quote must be at least `minQuoteChars` long, otherwise score 0
//! 4. `match_score` = partial ratio of the quote inside the passage text, minus
//!    a penalty for every number in the quote that does not appear in the passage
//! 5. verified ⇔ `match_score ≥ matchThreshold`
//!
//! Confidence is `min(verified score / 100) × (verified / total)²`, and 0 when
//! nothing verifies or the draft's branch label is not admissible.

pub mod fuzzy;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::CitationConfig;
use crate::store::PassageStore;
use crate::types::{BranchLabel, BranchSet, Citation, RetrievedPassage, ValidatedCitation};

pub use fuzzy::{digit_runs, partial_ratio};

/// Validation result for a whole draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Every citation, in draft order.
    pub citations: Vec<ValidatedCitation>,
    pub verified_count: usize,
    /// Whether the draft's branch label fits the admissible set.
    pub branch_consistent: bool,
    /// Aggregate confidence in `0.0..=1.0`.
    pub confidence: f32,
}

impl ValidationReport {
    /// Only the verified citations, in draft order.
    pub fn verified(&self) -> impl Iterator<Item = &ValidatedCitation> {
        self.citations.iter().filter(|c| c.verified)
    }
}

/// Checks drafted citations against retrieved passages.
#[derive(Debug, Clone)]
pub struct CitationValidator {
    config: CitationConfig,
}

impl CitationValidator {
    pub fn new(config: CitationConfig) -> Self {
        Self { config }
    }

    /// Validate a single citation against the fused set.
    pub fn validate_one(
        &self,
        citation: &Citation,
        fused_ids: &HashSet<&str>,
        store: &PassageStore,
    ) -> ValidatedCitation {
        let unverified = |match_score: f32, locator| ValidatedCitation {
            passage_id: citation.passage_id.clone(),
            quote: citation.quote.clone(),
            locator,
            verified: false,
            match_score,
        };

        let passage = match store.get(&citation.passage_id) {
            Some(p) if fused_ids.contains(citation.passage_id.as_str()) => p,
            _ => {
                warn!(
                    "Citation names passage '{}' outside the retrieved set",
                    citation.passage_id
                );
                return unverified(0.0, citation.locator.clone());
            }
        };

        let quote = truncate_chars(strip_quote_marks(&citation.quote), self.config.max_quote_chars);
        let quote = quote.trim_end();
        if quote.chars().count() < self.config.min_quote_chars {
            debug!(
                "Quote for '{}' is shorter than {} chars",
                citation.passage_id, self.config.min_quote_chars
            );
            return unverified(0.0, Some(passage.locator.clone()));
        }

        let raw = partial_ratio(quote, &passage.text);
        let match_score = (raw - self.numeric_penalty(quote, &passage.text)).max(0.0);
        let verified = match_score >= self.config.match_threshold;

        if !verified {
            warn!(
                "Dropping citation of '{}': match score {:.1} < {}",
                citation.passage_id, match_score, self.config.match_threshold
            );
        }

        ValidatedCitation {
            passage_id: citation.passage_id.clone(),
            quote: quote.to_string(),
            locator: Some(passage.locator.clone()),
            verified,
            match_score,
        }
    }

    /// Penalty for numbers quoted but absent from the passage.
    fn numeric_penalty(&self, quote: &str, passage_text: &str) -> f32 {
        let in_passage: HashSet<&str> = digit_runs(passage_text).into_iter().collect();
        let missing = digit_runs(quote)
            .into_iter()
            .filter(|run| !in_passage.contains(run))
            .count();
        missing as f32 * self.config.numeric_mismatch_penalty
    }

    /// Validate every citation and score the draft.
    pub fn validate(
        &self,
        citations: &[Citation],
        branch_label: BranchLabel,
        admissible: &BranchSet,
        fused: &[RetrievedPassage],
        store: &PassageStore,
    ) -> ValidationReport {
        let fused_ids: HashSet<&str> = fused.iter().map(|p| p.passage_id.as_str()).collect();

        let validated: Vec<ValidatedCitation> = citations
            .iter()
            .map(|c| self.validate_one(c, &fused_ids, store))
            .collect();

        let verified_count = validated.iter().filter(|c| c.verified).count();
        let branch_consistent = branch_label.is_consistent_with(admissible);
        let confidence = if branch_consistent {
            confidence(&validated)
        } else {
            warn!(
                "Draft declares branch '{}' outside the admissible set; confidence forced to 0",
                branch_label
            );
            0.0
        };

        debug!(
            "Citations: {}/{} verified, confidence {:.3}",
            verified_count,
            validated.len(),
            confidence
        );

        ValidationReport {
            citations: validated,
            verified_count,
            branch_consistent,
            confidence,
        }
    }
}

/// `min(verified score / 100) × (verified / total)²`; 0 when nothing verifies.
pub fn confidence(citations: &[ValidatedCitation]) -> f32 {
    let total = citations.len();
    let verified: Vec<f32> = citations
        .iter()
        .filter(|c| c.verified)
        .map(|c| c.match_score)
        .collect();

    if total == 0 || verified.is_empty() {
        return 0.0;
    }

    let weakest = verified.iter().copied().fold(f32::INFINITY, f32::min) / 100.0;
    let fraction = verified.len() as f32 / total as f32;
    (weakest * fraction * fraction).clamp(0.0, 1.0)
}

/// Verified citations with one entry per `(passage_id, quote)` pair.
pub fn dedup_verified(report: &ValidationReport) -> Vec<ValidatedCitation> {
    let mut seen = HashSet::new();
    report
        .verified()
        .filter(|c| seen.insert((c.passage_id.as_str(), c.quote.as_str())))
        .cloned()
        .collect()
}

fn strip_quote_marks(quote: &str) -> &str {
    quote
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '“' | '”' | '‘' | '’'))
        .trim()
}

/// Truncate to at most `max` chars on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
