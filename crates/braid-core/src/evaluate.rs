//! Offline evaluation over a labelled question set.
//!
//! Every question runs through [`BraidEngine::ask`] and is scored on:
//!
//! - **branch accuracy**: the answer's branch label equals the expected label
//! - **citation coverage**: the answer carries at least one verified citation
//! - **key-fact recall**: share of key facts found (case-insensitive) in the answer text
//! - **average confidence**: mean `confidence_score`
//! - **page accuracy**: some citation points at the expected page
//!
//! Key-fact recall and page accuracy average only over questions that define
//! key facts or an expected page. A question whose run fails with a service
//! error scores 0 everywhere and keeps the error message; caller errors abort
//! the run, since they mean the question set itself is wrong.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::branch::AUTO_HINT;
use crate::engine::{AskOptions, BraidEngine};
use crate::errors::BraidError;
use crate::response::{RefusalReason, Response};
use crate::types::{BranchLabel, Query};

// ============================================================================
// Question set
// ============================================================================

/// One labelled question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalQuestion {
    pub query: String,

    /// Hint passed to `ask`. Default: `auto`
    #[serde(default = "default_branch_hint")]
    pub branch_hint: String,

    /// Expected answer branch: a label, an alias, `both` or `unknown`.
    pub expected_branch: String,

    /// Page a correct citation should point at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_page: Option<u32>,

    /// Phrases a complete answer mentions.
    #[serde(default)]
    pub key_facts: Vec<String>,
}

fn default_branch_hint() -> String {
    AUTO_HINT.to_string()
}

/// A question set as stored on disk (`questions:` list in YAML).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalSet {
    pub questions: Vec<EvalQuestion>,
}

impl EvalSet {
    /// Load a YAML question set.
    pub fn from_path(path: &Path) -> Result<Self, BraidError> {
        let content = fs::read_to_string(path).map_err(|e| {
            BraidError::InvalidArgument(format!(
                "cannot read question set {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_yaml::from_str(&content).map_err(|e| {
            BraidError::InvalidArgument(format!(
                "cannot parse question set {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// The built-in question set covering every branch.
    pub fn builtin() -> Self {
        let question = |query: &str, branch: &str, page: u32, facts: &[&str]| EvalQuestion {
            query: query.to_string(),
            branch_hint: default_branch_hint(),
            expected_branch: branch.to_string(),
            expected_page: Some(page),
            key_facts: facts.iter().map(|f| f.to_string()).collect(),
        };

        Self {
            questions: vec![
                question(
                    "What happens in early 2026?",
                    "shared",
                    5,
                    &["Agent-1", "50% faster", "algorithmic progress"],
                ),
                question(
                    "In the race ending, how does control fail?",
                    "race",
                    23,
                    &["Agent-4", "Agent-5", "committee votes 6-4"],
                ),
                question(
                    "What is neuralese and why does it matter?",
                    "appendix",
                    46,
                    &["neuralese", "high-dimensional", "chain of thought"],
                ),
                question(
                    "When does China steal Agent-2?",
                    "shared",
                    8,
                    &["February 2027", "China", "Agent-2", "theft"],
                ),
                question(
                    "What happens in 2030 in the slowdown ending?",
                    "slowdown",
                    42,
                    &["peaceful protests", "democracy", "China"],
                ),
            ],
        }
    }
}

// ============================================================================
// Report
// ============================================================================

/// Outcome of one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalCaseResult {
    pub query: String,
    pub expected_branch: BranchLabel,
    /// `None` when the run failed.
    pub actual_branch: Option<BranchLabel>,
    pub branch_correct: bool,
    pub num_citations: usize,
    /// `None` when the question has no expected page.
    pub page_hit: Option<bool>,
    /// `None` when the question lists no key facts.
    pub fact_recall: Option<f32>,
    pub confidence: f32,
    pub refused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refusal_reason: Option<RefusalReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate metrics for a question set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalReport {
    pub total_questions: usize,
    pub branch_accuracy: f32,
    pub citation_coverage: f32,
    /// `None` when no question lists key facts.
    pub key_fact_recall: Option<f32>,
    pub avg_confidence: f32,
    /// `None` when no question has an expected page.
    pub page_accuracy: Option<f32>,
    pub refusals: usize,
    pub errors: usize,
    pub results: Vec<EvalCaseResult>,
}

impl EvalReport {
    fn from_results(results: Vec<EvalCaseResult>) -> Self {
        let total = results.len();
        let share = |count: usize| {
            if total == 0 {
                0.0
            } else {
                count as f32 / total as f32
            }
        };

        let branch_accuracy = share(results.iter().filter(|r| r.branch_correct).count());
        let citation_coverage = share(results.iter().filter(|r| r.num_citations > 0).count());
        let avg_confidence = if total == 0 {
            0.0
        } else {
            results.iter().map(|r| r.confidence).sum::<f32>() / total as f32
        };
        let key_fact_recall = mean(results.iter().filter_map(|r| r.fact_recall));
        let page_accuracy = mean(
            results
                .iter()
                .filter_map(|r| r.page_hit.map(|hit| if hit { 1.0 } else { 0.0 })),
        );

        Self {
            total_questions: total,
            branch_accuracy,
            citation_coverage,
            key_fact_recall,
            avg_confidence,
            page_accuracy,
            refusals: results.iter().filter(|r| r.refused).count(),
            errors: results.iter().filter(|r| r.error.is_some()).count(),
            results,
        }
    }
}

fn mean(values: impl Iterator<Item = f32>) -> Option<f32> {
    let (sum, count) = values.fold((0.0f32, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f32)
}

/// Share of `facts` that occur in `answer`, ignoring case.
pub fn fact_recall(answer: &str, facts: &[String]) -> Option<f32> {
    if facts.is_empty() {
        return None;
    }
    let answer = answer.to_lowercase();
    let found = facts
        .iter()
        .filter(|fact| answer.contains(&fact.to_lowercase()))
        .count();
    Some(found as f32 / facts.len() as f32)
}

// ============================================================================
// Runner
// ============================================================================

/// Run every question and aggregate the metrics.
///
/// # Errors
///
/// Returns [`BraidError::InvalidArgument`] for an empty set or an unknown
/// expected branch, and any caller error raised by `ask`.
pub async fn evaluate(
    engine: &BraidEngine,
    set: &EvalSet,
    options: &AskOptions,
) -> Result<EvalReport, BraidError> {
    if set.questions.is_empty() {
        return Err(BraidError::InvalidArgument(
            "question set has no questions".to_string(),
        ));
    }

    let expected: Vec<BranchLabel> = set
        .questions
        .iter()
        .map(|q| {
            engine.resolver().parse_label(&q.expected_branch).ok_or_else(|| {
                BraidError::InvalidArgument(format!(
                    "unknown expected branch '{}' for question '{}'",
                    q.expected_branch, q.query
                ))
            })
        })
        .collect::<Result<_, _>>()?;

    let mut results = Vec::with_capacity(set.questions.len());
    for (question, expected_branch) in set.questions.iter().zip(expected) {
        let query = Query::new(question.query.clone()).with_branch_hint(question.branch_hint.clone());
        let result = match engine.ask(&query, options).await {
            Ok(response) => score_response(question, expected_branch, &response),
            Err(e) if e.is_caller_error() => return Err(e),
            Err(e) => {
                warn!("Evaluation question '{}' failed: {}", question.query, e);
                failed_case(question, expected_branch, &e)
            }
        };
        results.push(result);
    }

    let report = EvalReport::from_results(results);
    info!(
        "Evaluated {} questions: branch accuracy {:.2}, citation coverage {:.2}, avg confidence {:.2}",
        report.total_questions, report.branch_accuracy, report.citation_coverage, report.avg_confidence
    );
    Ok(report)
}

fn score_response(
    question: &EvalQuestion,
    expected_branch: BranchLabel,
    response: &Response,
) -> EvalCaseResult {
    let page_hit = question.expected_page.map(|page| {
        response
            .citations
            .iter()
            .any(|c| c.locator.as_ref().is_some_and(|l| l.page == page))
    });

    EvalCaseResult {
        query: question.query.clone(),
        expected_branch,
        actual_branch: Some(response.branch_label),
        branch_correct: response.branch_label == expected_branch,
        num_citations: response.citations.len(),
        page_hit,
        fact_recall: fact_recall(&response.answer_text, &question.key_facts),
        confidence: response.confidence_score,
        refused: response.refused,
        refusal_reason: response.refusal_reason,
        error: None,
    }
}

fn failed_case(question: &EvalQuestion, expected_branch: BranchLabel, err: &BraidError) -> EvalCaseResult {
    EvalCaseResult {
        query: question.query.clone(),
        expected_branch,
        actual_branch: None,
        branch_correct: false,
        num_citations: 0,
        page_hit: question.expected_page.map(|_| false),
        fact_recall: (!question.key_facts.is_empty()).then_some(0.0),
        confidence: 0.0,
        refused: false,
        refusal_reason: None,
        error: Some(err.to_string()),
    }
}
