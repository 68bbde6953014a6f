//! End-to-end tests for the ask pipeline over fake collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use braid_core::{
    evaluate, AnswerDrafter, AskOptions, BraidConfig, BraidEngine, BraidError, Branch,
    BranchLabel, DraftRequest, EmbeddingBackend, EvalQuestion, EvalSet, LexicalIndex,
    LexicalIndexStats, Locator, Passage, PassageStore, Query, RefusalReason, ScoredHit,
    REFUSAL_TEXT,
};

// ============================================================================
// Fixtures
// ============================================================================

fn passage(id: &str, branch: Branch, page: u32, text: &str, embedding: [f32; 3]) -> Passage {
    Passage {
        id: id.to_string(),
        text: text.to_string(),
        embedding: embedding.to_vec(),
        branch,
        locator: Locator {
            page,
            section: None,
        },
    }
}

fn store() -> PassageStore {
    PassageStore::from_passages(vec![
        passage(
            "s1",
            Branch::Shared,
            4,
            "In late 2025, OpenBrain releases Agent-1, which speeds up AI research by 50 percent.",
            [1.0, 0.0, 0.0],
        ),
        passage(
            "a1",
            Branch::BranchA,
            31,
            "In the race ending, Agent-4 escapes oversight and copies its weights in October 2027.",
            [0.6, 0.2, 0.0],
        ),
        passage(
            "b1",
            Branch::BranchB,
            45,
            "In the slowdown ending, the oversight committee votes to slow down and retrain Agent-4.",
            [0.0, 1.0, 0.0],
        ),
        passage(
            "x1",
            Branch::Appendix,
            70,
            "Appendix: compute estimates for the largest training runs.",
            [0.0, 0.0, 1.0],
        ),
    ])
    .unwrap()
}

fn config() -> BraidConfig {
    let mut config = BraidConfig::default();
    config.timeouts.embedding_retry_backoff_ms = 10;
    config
}

struct FixedEmbedder(Vec<f32>);

impl EmbeddingBackend for FixedEmbedder {
    fn model_id(&self) -> &str {
        "fake-embed"
    }

    fn embed(&self, _input: &str) -> Result<Vec<f32>, BraidError> {
        Ok(self.0.clone())
    }
}

#[derive(Default)]
struct FailingEmbedder {
    calls: AtomicUsize,
}

impl EmbeddingBackend for FailingEmbedder {
    fn model_id(&self) -> &str {
        "fake-embed"
    }

    fn embed(&self, _input: &str) -> Result<Vec<f32>, BraidError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(BraidError::EmbeddingUnavailable {
            provider: "fake-embed".to_string(),
            reason: "connection refused".to_string(),
        })
    }
}

/// Sleeps past the embedding deadline before answering.
struct SlowEmbedder {
    delay: Duration,
    calls: AtomicUsize,
}

impl SlowEmbedder {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }
}

impl EmbeddingBackend for SlowEmbedder {
    fn model_id(&self) -> &str {
        "fake-embed"
    }

    fn embed(&self, _input: &str) -> Result<Vec<f32>, BraidError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        Ok(vec![0.0, 1.0, 0.0])
    }
}

/// Returns a canned draft and records every request.
struct ScriptedDrafter {
    output: Result<String, String>,
    delay: Duration,
    requests: Mutex<Vec<DraftRequest>>,
}

impl ScriptedDrafter {
    fn returning(output: &str) -> Self {
        Self {
            output: Ok(output.to_string()),
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn failing(reason: &str) -> Self {
        Self {
            output: Err(reason.to_string()),
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::returning(RACE_DRAFT)
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl AnswerDrafter for ScriptedDrafter {
    fn model_id(&self) -> &str {
        "fake-draft"
    }

    fn draft(&self, request: &DraftRequest) -> Result<String, BraidError> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.output
            .clone()
            .map_err(|reason| BraidError::DraftingUnavailable {
                provider: "fake-draft".to_string(),
                reason,
            })
    }
}

struct BrokenLexicalIndex;

impl LexicalIndex for BrokenLexicalIndex {
    fn tokenize(&self, text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_lowercase).collect()
    }

    fn query(&self, _tokens: &[String], _n: usize) -> Result<Vec<ScoredHit>, BraidError> {
        Err(BraidError::IndexQueryFailed {
            index: "sparse".to_string(),
            reason: "index not loaded".to_string(),
        })
    }

    fn stats(&self) -> LexicalIndexStats {
        LexicalIndexStats {
            num_documents: 0,
            vocabulary_size: 0,
            total_tokens: 0,
            avg_doc_length: 0.0,
        }
    }
}

const RACE_DRAFT: &str = r#"{
    "answer": "In the race ending Agent-4 escapes oversight.",
    "branch": "branch_A",
    "citations": [
        {"passage_id": "a1", "quote": "Agent-4 escapes oversight and copies its weights"}
    ],
    "assumptions_or_limits": [],
    "followup_questions": ["What happens in the slowdown ending?"]
}"#;

const RACE_QUESTION: &str = "What does Agent-4 do in the race ending?";

fn engine(
    embedder: Arc<dyn EmbeddingBackend>,
    drafter: Arc<ScriptedDrafter>,
    config: BraidConfig,
) -> BraidEngine {
    BraidEngine::new(config, store(), embedder, drafter).unwrap()
}

fn dense_favours_slowdown() -> Arc<dyn EmbeddingBackend> {
    Arc::new(FixedEmbedder(vec![0.0, 1.0, 0.0]))
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_answer_with_verified_citation() {
    let drafter = Arc::new(ScriptedDrafter::returning(RACE_DRAFT));
    let engine = engine(dense_favours_slowdown(), drafter.clone(), config());

    let response = engine
        .ask(&Query::new(RACE_QUESTION), &AskOptions::new())
        .await
        .unwrap();

    assert!(!response.refused);
    assert_eq!(response.branch_label, BranchLabel::Single(Branch::BranchA));
    assert_eq!(response.citations.len(), 1);
    assert_eq!(response.citations[0].passage_id, "a1");
    assert_eq!(response.citations[0].match_score, 100.0);
    assert_eq!(response.citations[0].locator.as_ref().unwrap().page, 31);
    assert!((response.confidence_score - 1.0).abs() < 1e-6);
    assert!(!response.degraded_mode);
    assert!(!response.ambiguous_branch);
    assert_eq!(response.followup_questions.len(), 1);
    assert!(response.retrieval.is_none());
    assert_eq!(drafter.calls(), 1);
}

#[tokio::test]
async fn test_detected_branch_excludes_highest_dense_passage() {
    let drafter = Arc::new(ScriptedDrafter::returning(RACE_DRAFT));
    let engine = engine(dense_favours_slowdown(), drafter.clone(), config());

    // b1 has the highest cosine score but belongs to branch_B
    let response = engine
        .ask(&Query::new(RACE_QUESTION), &AskOptions::new().with_debug(true))
        .await
        .unwrap();

    let request = drafter.requests.lock().unwrap()[0].clone();
    assert!(request.passages.iter().all(|p| p.branch != Branch::BranchB));
    assert!(request.passages.iter().any(|p| p.passage_id == "a1"));
    assert!(request.branch_hint.is_none(), "detected branches are not named in the prompt");

    let debug = response.retrieval.unwrap();
    assert!(debug.top_passages.iter().all(|p| p.passage_id != "b1"));
    assert!(debug.top_passages.len() <= 5);
    assert!(debug.unavailable_signals.is_empty());
}

#[tokio::test]
async fn test_explicit_hint_is_passed_to_drafting() {
    let drafter = Arc::new(ScriptedDrafter::returning(RACE_DRAFT));
    let engine = engine(dense_favours_slowdown(), drafter.clone(), config());

    let query = Query::new("What does Agent-4 do?").with_branch_hint("race");
    let response = engine.ask(&query, &AskOptions::new()).await.unwrap();

    assert!(!response.refused);
    let request = drafter.requests.lock().unwrap()[0].clone();
    assert_eq!(request.branch_hint, Some(Branch::BranchA));
    assert!(request
        .passages
        .iter()
        .all(|p| matches!(p.branch, Branch::Shared | Branch::BranchA | Branch::Appendix)));
}

#[tokio::test]
async fn test_altered_number_in_quote_is_refused() {
    let draft = r#"{
        "answer": "Agent-9 escapes oversight.",
        "branch": "branch_A",
        "citations": [{"passage_id": "a1", "quote": "Agent-9 escapes oversight"}]
    }"#;
    let drafter = Arc::new(ScriptedDrafter::returning(draft));
    let engine = engine(dense_favours_slowdown(), drafter, config());

    let response = engine
        .ask(&Query::new(RACE_QUESTION), &AskOptions::new())
        .await
        .unwrap();

    assert!(response.refused);
    assert_eq!(response.refusal_reason, Some(RefusalReason::NoVerifiedCitations));
    assert_eq!(response.answer_text, REFUSAL_TEXT);
    assert!(response.citations.is_empty());
    assert_eq!(response.confidence_score, 0.0);
}

#[tokio::test]
async fn test_one_hallucinated_citation_of_two_refuses() {
    let draft = r#"{
        "answer": "Agent-4 escapes and the committee votes.",
        "branch": "branch_A",
        "citations": [
            {"passage_id": "a1", "quote": "Agent-4 escapes oversight"},
            {"passage_id": "a1", "quote": "the weights are deleted by the president"}
        ]
    }"#;
    let drafter = Arc::new(ScriptedDrafter::returning(draft));
    let engine = engine(dense_favours_slowdown(), drafter, config());

    let response = engine
        .ask(&Query::new(RACE_QUESTION), &AskOptions::new())
        .await
        .unwrap();

    // 1.0 × (1/2)² = 0.25
    assert!(response.refused);
    assert_eq!(response.refusal_reason, Some(RefusalReason::LowConfidence));
    assert!((response.confidence_score - 0.25).abs() < 1e-6);
}

#[tokio::test]
async fn test_draft_for_excluded_branch_is_refused() {
    let draft = r#"{
        "answer": "The committee votes to slow down.",
        "branch": "slowdown",
        "citations": [{"passage_id": "a1", "quote": "Agent-4 escapes oversight"}]
    }"#;
    let drafter = Arc::new(ScriptedDrafter::returning(draft));
    let engine = engine(dense_favours_slowdown(), drafter, config());

    let query = Query::new("What happens?").with_branch_hint("branch_A");
    let response = engine.ask(&query, &AskOptions::new()).await.unwrap();

    assert!(response.refused);
    assert_eq!(response.refusal_reason, Some(RefusalReason::BranchMismatch));
    assert_eq!(response.confidence_score, 0.0);
}

#[tokio::test]
async fn test_embedding_failure_degrades_to_sparse_only() {
    let embedder = Arc::new(FailingEmbedder::default());
    let drafter = Arc::new(ScriptedDrafter::returning(RACE_DRAFT));
    let engine = engine(embedder.clone(), drafter, config());

    let response = engine
        .ask(&Query::new(RACE_QUESTION), &AskOptions::new().with_debug(true))
        .await
        .unwrap();

    assert_eq!(embedder.calls.load(Ordering::SeqCst), 2, "one retry");
    assert!(response.degraded_mode);
    assert!(!response.refused);
    let debug = response.retrieval.unwrap();
    assert_eq!(debug.unavailable_signals, vec!["dense".to_string()]);
    assert_eq!(debug.dense_candidates, 0);
}

#[tokio::test]
async fn test_hung_embedder_times_out_and_degrades() {
    let mut config = config();
    config.timeouts.embedding_ms = 20;
    let embedder = Arc::new(SlowEmbedder::new(Duration::from_secs(2)));
    let drafter = Arc::new(ScriptedDrafter::returning(RACE_DRAFT));
    let engine = engine(embedder.clone(), drafter, config);

    let started = std::time::Instant::now();
    let response = engine
        .ask(&Query::new(RACE_QUESTION), &AskOptions::new().with_debug(true))
        .await
        .unwrap();

    assert!(
        started.elapsed() < Duration::from_secs(1),
        "ask waited {:?} on the embedder",
        started.elapsed()
    );
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 2, "one retry");
    assert!(response.degraded_mode);
    assert!(!response.refused);
    let debug = response.retrieval.unwrap();
    assert_eq!(debug.unavailable_signals, vec!["dense".to_string()]);
    assert_eq!(debug.dense_candidates, 0);
}

#[tokio::test]
async fn test_unusable_query_vectors_degrade_to_sparse_only() {
    for vector in [vec![0.0, 0.0, 0.0], vec![1.0, 0.0], vec![f32::NAN, 1.0, 0.0]] {
        let drafter = Arc::new(ScriptedDrafter::returning(RACE_DRAFT));
        let engine = engine(Arc::new(FixedEmbedder(vector.clone())), drafter, config());

        let response = engine
            .ask(&Query::new(RACE_QUESTION), &AskOptions::new().with_debug(true))
            .await
            .unwrap();

        assert!(response.degraded_mode, "{:?} should degrade", vector);
        assert!(!response.refused);
        assert_eq!(
            response.retrieval.unwrap().unavailable_signals,
            vec!["dense".to_string()]
        );
    }
}

#[tokio::test]
async fn test_sparse_failure_degrades_to_dense_only() {
    let drafter = Arc::new(ScriptedDrafter::returning(RACE_DRAFT));
    let engine = engine(dense_favours_slowdown(), drafter, config())
        .with_lexical_index(Arc::new(BrokenLexicalIndex));

    let response = engine
        .ask(&Query::new(RACE_QUESTION), &AskOptions::new())
        .await
        .unwrap();

    assert!(response.degraded_mode);
    assert!(!response.refused);
}

#[tokio::test]
async fn test_both_signals_down_is_a_service_error() {
    let drafter = Arc::new(ScriptedDrafter::returning(RACE_DRAFT));
    let engine = engine(Arc::new(FailingEmbedder::default()), drafter.clone(), config())
        .with_lexical_index(Arc::new(BrokenLexicalIndex));

    let err = engine
        .ask(&Query::new(RACE_QUESTION), &AskOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, BraidError::RetrievalUnavailable { .. }));
    assert!(err.is_service_error());
    assert_eq!(drafter.calls(), 0);
}

#[tokio::test]
async fn test_no_admissible_passages_skips_drafting() {
    let drafter = Arc::new(ScriptedDrafter::returning(RACE_DRAFT));
    let engine = engine(Arc::new(FailingEmbedder::default()), drafter.clone(), config());

    let response = engine
        .ask(&Query::new("zyzzyva quokka"), &AskOptions::new())
        .await
        .unwrap();

    assert!(response.refused);
    assert_eq!(response.refusal_reason, Some(RefusalReason::NoPassages));
    assert!(response.ambiguous_branch);
    assert_eq!(drafter.calls(), 0);
}

#[tokio::test]
async fn test_drafting_timeout_refuses() {
    let mut config = config();
    config.timeouts.drafting_ms = 20;
    let drafter = Arc::new(ScriptedDrafter::slow(Duration::from_millis(300)));
    let engine = engine(dense_favours_slowdown(), drafter, config);

    let response = engine
        .ask(&Query::new(RACE_QUESTION), &AskOptions::new())
        .await
        .unwrap();

    assert!(response.refused);
    assert_eq!(response.refusal_reason, Some(RefusalReason::DraftingTimedOut));
}

#[tokio::test]
async fn test_malformed_draft_is_an_error() {
    let drafter = Arc::new(ScriptedDrafter::returning("Agent-4 escapes, trust me."));
    let engine = engine(dense_favours_slowdown(), drafter, config());

    let err = engine
        .ask(&Query::new(RACE_QUESTION), &AskOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, BraidError::MalformedDraft { .. }));
}

#[tokio::test]
async fn test_drafting_transport_error_propagates() {
    let drafter = Arc::new(ScriptedDrafter::failing("connection refused"));
    let engine = engine(dense_favours_slowdown(), drafter, config());

    let err = engine
        .ask(&Query::new(RACE_QUESTION), &AskOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, BraidError::DraftingUnavailable { .. }));
}

#[tokio::test]
async fn test_caller_errors() {
    let drafter = Arc::new(ScriptedDrafter::returning(RACE_DRAFT));
    let engine = engine(dense_favours_slowdown(), drafter.clone(), config());

    let err = engine
        .ask(
            &Query::new(RACE_QUESTION).with_branch_hint("branch_C"),
            &AskOptions::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BraidError::InvalidBranchHint { .. }));
    assert!(err.is_caller_error());

    let err = engine
        .ask(&Query::new("   "), &AskOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BraidError::InvalidArgument(_)));

    let err = engine
        .ask(&Query::new(RACE_QUESTION), &AskOptions::new().with_top_k(0))
        .await
        .unwrap_err();
    assert!(err.is_caller_error());

    assert_eq!(drafter.calls(), 0);
}

#[tokio::test]
async fn test_top_k_limits_drafted_passages() {
    let drafter = Arc::new(ScriptedDrafter::returning(RACE_DRAFT));
    let engine = engine(dense_favours_slowdown(), drafter.clone(), config());

    engine
        .ask(&Query::new(RACE_QUESTION), &AskOptions::new().with_top_k(2))
        .await
        .unwrap();

    let request = drafter.requests.lock().unwrap()[0].clone();
    assert!(request.passages.len() <= 2);
    let mut ids: Vec<_> = request.passages.iter().map(|p| p.passage_id.as_str()).collect();
    ids.dedup();
    assert_eq!(ids.len(), request.passages.len());
}

fn eval_question(query: &str, expected_branch: &str, page: Option<u32>, facts: &[&str]) -> EvalQuestion {
    EvalQuestion {
        query: query.to_string(),
        branch_hint: "auto".to_string(),
        expected_branch: expected_branch.to_string(),
        expected_page: page,
        key_facts: facts.iter().map(|f| f.to_string()).collect(),
    }
}

#[tokio::test]
async fn test_evaluate_question_set() {
    let drafter = Arc::new(ScriptedDrafter::returning(RACE_DRAFT));
    let engine = engine(dense_favours_slowdown(), drafter, config());
    let set = EvalSet {
        questions: vec![
            eval_question(RACE_QUESTION, "race", Some(31), &["Agent-4", "weights"]),
            // the race draft is outside the slowdown branch and gets refused
            eval_question("What happens in the slowdown ending?", "slowdown", None, &[]),
        ],
    };

    let report = evaluate(&engine, &set, &AskOptions::new()).await.unwrap();

    assert_eq!(report.total_questions, 2);
    assert_eq!(report.branch_accuracy, 1.0);
    assert_eq!(report.citation_coverage, 0.5);
    assert_eq!(report.key_fact_recall, Some(0.5));
    assert_eq!(report.page_accuracy, Some(1.0));
    assert_eq!(report.refusals, 1);
    assert_eq!(report.errors, 0);

    let race = &report.results[0];
    assert_eq!(race.actual_branch, Some(BranchLabel::Single(Branch::BranchA)));
    assert_eq!(race.page_hit, Some(true));
    let slowdown = &report.results[1];
    assert!(slowdown.refused);
    assert_eq!(slowdown.refusal_reason, Some(RefusalReason::BranchMismatch));
}

#[tokio::test]
async fn test_evaluate_records_service_errors() {
    let drafter = Arc::new(ScriptedDrafter::failing("connection refused"));
    let engine = engine(dense_favours_slowdown(), drafter, config());
    let set = EvalSet {
        questions: vec![eval_question(RACE_QUESTION, "race", Some(31), &["Agent-4"])],
    };

    let report = evaluate(&engine, &set, &AskOptions::new()).await.unwrap();

    assert_eq!(report.errors, 1);
    assert_eq!(report.branch_accuracy, 0.0);
    assert_eq!(report.key_fact_recall, Some(0.0));
    assert_eq!(report.page_accuracy, Some(0.0));
    assert!(report.results[0].error.as_deref().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_evaluate_rejects_broken_question_sets() {
    let drafter = Arc::new(ScriptedDrafter::returning(RACE_DRAFT));
    let engine = engine(dense_favours_slowdown(), drafter.clone(), config());

    let err = evaluate(&engine, &EvalSet { questions: vec![] }, &AskOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_caller_error());

    let set = EvalSet {
        questions: vec![eval_question(RACE_QUESTION, "branch_C", None, &[])],
    };
    let err = evaluate(&engine, &set, &AskOptions::new()).await.unwrap_err();
    assert!(err.to_string().contains("branch_C"));

    let mut bad_hint = eval_question(RACE_QUESTION, "race", None, &[]);
    bad_hint.branch_hint = "branch_C".to_string();
    let err = evaluate(&engine, &EvalSet { questions: vec![bad_hint] }, &AskOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BraidError::InvalidBranchHint { .. }));

    assert_eq!(drafter.calls(), 0);
}

#[test]
fn test_engine_rejects_invalid_config() {
    let mut config = config();
    config.refusal.min_confidence = 1.5;
    let drafter = Arc::new(ScriptedDrafter::returning(RACE_DRAFT));

    let err = BraidEngine::new(config, store(), dense_favours_slowdown(), drafter).unwrap_err();
    assert!(matches!(err, BraidError::InvalidConfiguration { .. }));
    assert!(err.to_string().contains("minConfidence"));
}

#[test]
fn test_health_report() {
    let drafter = Arc::new(ScriptedDrafter::returning(RACE_DRAFT));
    let engine = engine(dense_favours_slowdown(), drafter, config());

    let health = engine.health();
    assert!(health.is_ok());
    assert_eq!(health.passages, 4);
    assert_eq!(health.vector_entries, 4);
    assert_eq!(health.embedding_dimension, 3);
    assert_eq!(health.branch_counts[&Branch::BranchA], 1);
    assert_eq!(health.lexical.num_documents, 4);
    assert_eq!(health.embedding_model, "fake-embed");
    assert_eq!(health.drafting_model, "fake-draft");
}
