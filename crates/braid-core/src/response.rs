//! Response assembly and the refusal gate.
//!
//! A [`Response`] is either an answer carrying only verified citations, or a
//! refusal with the fixed insufficient-evidence text and no citations. Which
//! one is decided by [`refusal_reason`] from the validation report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::citation::{dedup_verified, truncate_chars, ValidationReport};
use crate::config::RefusalConfig;
use crate::drafting::DraftAnswer;
use crate::store::PassageStore;
use crate::types::{Branch, BranchLabel, Locator, RetrievedPassage, Source};

/// Answer text for every refusal.
pub const REFUSAL_TEXT: &str =
    "I cannot answer this question with confidence: the retrieved passages do not provide sufficient evidence.";

/// Note added when `auto` branch detection matched nothing.
pub const AMBIGUOUS_BRANCH_NOTE: &str =
    "The question does not name a branch; passages from every branch were considered.";

/// Number of fused passages listed in debug output.
pub const DEBUG_TOP_PASSAGES: usize = 5;

/// Characters of passage text shown in debug previews.
pub const DEBUG_PREVIEW_CHARS: usize = 200;

// ============================================================================
// Refusal
// ============================================================================

/// Why a response was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefusalReason {
    /// Retrieval found nothing admissible; drafting was skipped.
    NoPassages,
    /// None of the drafted citations verified.
    NoVerifiedCitations,
    /// Confidence fell below the configured minimum.
    LowConfidence,
    /// The draft declared a branch outside the admissible set.
    BranchMismatch,
    /// The drafting call did not finish in time.
    DraftingTimedOut,
}

impl RefusalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefusalReason::NoPassages => "no_passages",
            RefusalReason::NoVerifiedCitations => "no_verified_citations",
            RefusalReason::LowConfidence => "low_confidence",
            RefusalReason::BranchMismatch => "branch_mismatch",
            RefusalReason::DraftingTimedOut => "drafting_timed_out",
        }
    }

    /// Human-readable explanation.
    pub fn describe(&self) -> &'static str {
        match self {
            RefusalReason::NoPassages => "no passage from an admissible branch was retrieved",
            RefusalReason::NoVerifiedCitations => "no citation could be verified against its passage",
            RefusalReason::LowConfidence => "citation confidence is below the minimum",
            RefusalReason::BranchMismatch => "the draft answered for a branch the question excludes",
            RefusalReason::DraftingTimedOut => "answer drafting timed out",
        }
    }
}

impl std::fmt::Display for RefusalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The refusal gate.
///
/// Returns `None` when the draft may be surfaced.
pub fn refusal_reason(report: &ValidationReport, config: &RefusalConfig) -> Option<RefusalReason> {
    if !report.branch_consistent {
        Some(RefusalReason::BranchMismatch)
    } else if report.verified_count == 0 {
        Some(RefusalReason::NoVerifiedCitations)
    } else if report.confidence < config.min_confidence {
        Some(RefusalReason::LowConfidence)
    } else {
        None
    }
}

// ============================================================================
// Response
// ============================================================================

/// A citation as surfaced to the caller. Always verified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseCitation {
    pub passage_id: String,
    pub quote: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<Locator>,
    pub match_score: f32,
}

/// A fused passage in debug output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugPassage {
    pub passage_id: String,
    pub page: u32,
    pub branch: Branch,
    pub source: Source,
    pub score: f32,
    pub preview: String,
}

/// Retrieval metadata, returned when debug output is requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalDebug {
    pub dense_candidates: usize,
    pub sparse_candidates: usize,
    /// `dense` and/or `sparse` when a signal was unavailable.
    #[serde(default)]
    pub unavailable_signals: Vec<String>,
    pub top_passages: Vec<DebugPassage>,
}

impl RetrievalDebug {
    pub fn new(
        dense_candidates: usize,
        sparse_candidates: usize,
        unavailable_signals: Vec<String>,
        fused: &[RetrievedPassage],
        store: &PassageStore,
    ) -> Self {
        let top_passages = fused
            .iter()
            .take(DEBUG_TOP_PASSAGES)
            .map(|r| DebugPassage {
                passage_id: r.passage_id.clone(),
                page: r.locator.page,
                branch: r.branch,
                source: r.source,
                score: r.score,
                preview: store
                    .get(&r.passage_id)
                    .map(|p| truncate_chars(&p.text, DEBUG_PREVIEW_CHARS))
                    .unwrap_or_default(),
            })
            .collect();

        Self {
            dense_candidates,
            sparse_candidates,
            unavailable_signals,
            top_passages,
        }
    }
}

/// The engine's answer to one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub query_id: Uuid,
    pub answered_at: DateTime<Utc>,
    pub answer_text: String,
    pub branch_label: BranchLabel,
    /// Set when `auto` detection matched no trigger.
    pub ambiguous_branch: bool,
    /// Verified citations only; empty iff refused.
    pub citations: Vec<ResponseCitation>,
    pub confidence_score: f32,
    pub refused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refusal_reason: Option<RefusalReason>,
    /// Set when one retrieval signal was unavailable.
    pub degraded_mode: bool,
    #[serde(default)]
    pub assumptions_or_limits: Vec<String>,
    #[serde(default)]
    pub followup_questions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval: Option<RetrievalDebug>,
}

/// Per-request facts that do not come from the draft.
#[derive(Debug, Clone)]
pub struct ResponseContext {
    pub query_id: Uuid,
    /// Label of the admissible set, used for refusals.
    pub resolved_label: BranchLabel,
    pub ambiguous_branch: bool,
    pub degraded_mode: bool,
    pub retrieval: Option<RetrievalDebug>,
}

impl ResponseContext {
    fn notes(&self) -> Vec<String> {
        let mut notes = Vec::new();
        if self.ambiguous_branch {
            notes.push(AMBIGUOUS_BRANCH_NOTE.to_string());
        }
        if self.degraded_mode {
            notes.push(
                "One retrieval signal was unavailable; results come from a single retriever."
                    .to_string(),
            );
        }
        notes
    }
}

impl Response {
    /// A refusal. Carries no citations.
    pub fn refusal(ctx: ResponseContext, reason: RefusalReason, confidence_score: f32) -> Self {
        let mut assumptions_or_limits = ctx.notes();
        assumptions_or_limits.push(format!("Refused: {}.", reason.describe()));

        Self {
            query_id: ctx.query_id,
            answered_at: Utc::now(),
            answer_text: REFUSAL_TEXT.to_string(),
            branch_label: ctx.resolved_label,
            ambiguous_branch: ctx.ambiguous_branch,
            citations: Vec::new(),
            confidence_score: confidence_score.clamp(0.0, 1.0),
            refused: true,
            refusal_reason: Some(reason),
            degraded_mode: ctx.degraded_mode,
            assumptions_or_limits,
            followup_questions: Vec::new(),
            retrieval: ctx.retrieval,
        }
    }

    /// Apply the refusal gate to a validated draft.
    pub fn from_draft(
        ctx: ResponseContext,
        draft: DraftAnswer,
        report: &ValidationReport,
        config: &RefusalConfig,
    ) -> Self {
        if let Some(reason) = refusal_reason(report, config) {
            return Self::refusal(ctx, reason, report.confidence);
        }

        let citations = dedup_verified(report)
            .into_iter()
            .map(|c| ResponseCitation {
                passage_id: c.passage_id,
                quote: c.quote,
                locator: c.locator,
                match_score: c.match_score,
            })
            .collect();

        let mut assumptions_or_limits = draft.assumptions_or_limits;
        assumptions_or_limits.extend(ctx.notes());

        Self {
            query_id: ctx.query_id,
            answered_at: Utc::now(),
            answer_text: draft.answer_text,
            branch_label: draft.branch_label,
            ambiguous_branch: ctx.ambiguous_branch,
            citations,
            confidence_score: report.confidence,
            refused: false,
            refusal_reason: None,
            degraded_mode: ctx.degraded_mode,
            assumptions_or_limits,
            followup_questions: draft.followup_questions,
            retrieval: ctx.retrieval,
        }
    }
}
