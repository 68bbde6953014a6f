//! Answer drafting: the request sent to the drafting capability and the
//! strict parser for what comes back.
//!
//! The drafting capability is opaque: it receives the question, the fused
//! passages and the branch context, and returns raw text that must parse as
//! a JSON draft. Anything else is a [`BraidError::MalformedDraft`]; a draft
//! is never partially trusted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::branch::BranchResolver;
use crate::errors::BraidError;
use crate::store::PassageStore;
use crate::types::{Branch, BranchLabel, Citation, Locator, RetrievedPassage};

/// Maximum follow-up questions kept from a draft.
pub const MAX_FOLLOWUP_QUESTIONS: usize = 3;

// ============================================================================
// Request
// ============================================================================

/// A passage as shown to the drafting model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftPassage {
    pub passage_id: String,
    pub branch: Branch,
    pub locator: Locator,
    pub text: String,
}

/// Everything the drafting capability gets to see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRequest {
    pub query: String,
    /// Fused passages in rank order.
    pub passages: Vec<DraftPassage>,
    /// Set when the caller named the branch explicitly.
    pub branch_hint: Option<Branch>,
}

impl DraftRequest {
    /// Build a request from fused passages, looking up their text.
    pub fn new(
        query: &str,
        fused: &[RetrievedPassage],
        store: &PassageStore,
        branch_hint: Option<Branch>,
    ) -> Self {
        let passages = fused
            .iter()
            .filter_map(|r| store.get(&r.passage_id))
            .map(|p| DraftPassage {
                passage_id: p.id.clone(),
                branch: p.branch,
                locator: p.locator.clone(),
                text: p.text.clone(),
            })
            .collect();

        Self {
            query: query.to_string(),
            passages,
            branch_hint,
        }
    }
}

/// Trait for drafting capabilities.
///
/// Implementations are blocking and return the model's raw output; the
/// engine parses it with [`parse_draft`].
pub trait AnswerDrafter: Send + Sync {
    /// The drafting model id.
    fn model_id(&self) -> &str;

    /// Produce a raw structured draft.
    fn draft(&self, request: &DraftRequest) -> Result<String, BraidError>;
}

// ============================================================================
// Prompts
// ============================================================================

/// System prompt for JSON-mode drafting models.
pub const SYSTEM_PROMPT: &str = r#"You answer questions about a single scenario document whose timeline splits into branches.

RULES:
1. Use ONLY the retrieved passages below. Do not use outside knowledge.
2. Every factual claim must be backed by a citation with a VERBATIM quote copied from the cited passage, and the passage id exactly as given.
3. If the passages do not answer the question, say so and cite nothing.
4. Keep branches apart:
   - "shared": events before the branch point
   - "branch_A": the race ending
   - "branch_B": the slowdown ending
   - "appendix": supporting material
   Never mix facts from branch_A and branch_B unless the question compares them.
5. Be concise (at most 500 words).

Return a JSON object with exactly this structure:
{
  "answer": "the answer text",
  "branch": "shared|branch_A|branch_B|both|unknown",
  "citations": [
    {"passage_id": "id of the cited passage", "quote": "verbatim quote, at most 200 characters"}
  ],
  "assumptions_or_limits": ["caveats"],
  "followup_questions": ["up to three follow-up questions"]
}"#;

/// User prompt: optional branch context, passages, question.
pub fn user_prompt(request: &DraftRequest) -> String {
    let mut prompt = String::new();

    if let Some(branch) = request.branch_hint {
        prompt.push_str(&format!(
            "BRANCH CONTEXT: the user is asking about the '{}' branch.\n\n",
            branch
        ));
    }

    prompt.push_str("RETRIEVED PASSAGES:\n");
    for passage in &request.passages {
        prompt.push_str(&format!(
            "[Passage {}]\nPage: {}\nBranch: {}\n",
            passage.passage_id, passage.locator.page, passage.branch
        ));
        if let Some(section) = &passage.locator.section {
            prompt.push_str(&format!("Section: {}\n", section));
        }
        prompt.push_str(&format!("Content: {}\n\n", passage.text));
    }

    prompt.push_str(&format!(
        "USER QUESTION:\n{}\n\nRespond with the JSON object described in the rules.",
        request.query
    ));
    prompt
}

// ============================================================================
// Parsing
// ============================================================================

/// A parsed draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftAnswer {
    pub answer_text: String,
    pub branch_label: BranchLabel,
    pub citations: Vec<Citation>,
    pub assumptions_or_limits: Vec<String>,
    pub followup_questions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawDraft {
    answer: String,
    branch: String,
    citations: Vec<RawCitation>,
    #[serde(default)]
    assumptions_or_limits: Vec<String>,
    #[serde(default)]
    followup_questions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawCitation {
    #[serde(alias = "passageId")]
    passage_id: String,
    quote: String,
    #[serde(default)]
    locator: Option<Value>,
}

/// Parse raw drafting output.
///
/// Accepts a bare JSON object, optionally wrapped in a Markdown code fence.
/// Branch values may be labels, aliases, `both` or `unknown`. Locators that
/// do not parse are ignored; the store's locator is authoritative anyway.
///
/// # Errors
///
/// Returns [`BraidError::MalformedDraft`] for invalid JSON, missing fields,
/// an empty answer or an unrecognized branch.
pub fn parse_draft(raw: &str, resolver: &BranchResolver) -> Result<DraftAnswer, BraidError> {
    let json = strip_code_fence(raw);
    let draft: RawDraft = serde_json::from_str(json).map_err(|e| BraidError::MalformedDraft {
        reason: e.to_string(),
    })?;

    let answer_text = draft.answer.trim().to_string();
    if answer_text.is_empty() {
        return Err(BraidError::MalformedDraft {
            reason: "empty answer".to_string(),
        });
    }

    let branch_label =
        resolver
            .parse_label(&draft.branch)
            .ok_or_else(|| BraidError::MalformedDraft {
                reason: format!("unrecognized branch '{}'", draft.branch),
            })?;

    let citations = draft
        .citations
        .into_iter()
        .map(|c| Citation {
            passage_id: c.passage_id.trim().to_string(),
            quote: c.quote,
            locator: c.locator.and_then(|v| serde_json::from_value(v).ok()),
        })
        .collect();

    let mut followup_questions: Vec<String> = draft
        .followup_questions
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();
    followup_questions.truncate(MAX_FOLLOWUP_QUESTIONS);

    Ok(DraftAnswer {
        answer_text,
        branch_label,
        citations,
        assumptions_or_limits: draft
            .assumptions_or_limits
            .into_iter()
            .filter(|a| !a.trim().is_empty())
            .collect(),
        followup_questions,
    })
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop an optional language tag on the opening line
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().trim_end_matches("```").trim()
}
