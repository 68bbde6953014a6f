//! Braid engine – the orchestrator for the ask pipeline.
//!
//! The [`BraidEngine`] owns the read-only resources (passage store, vector
//! index, lexical index, branch resolver) and the collaborators (embedding
//! backend, answer drafter), and runs one query through:
//!
//! ```text
//! resolve branch → {dense ∥ sparse} → fuse → draft → validate → gate
//! ```
//!
//! Shared state is never mutated after construction, so one engine can serve
//! concurrent requests through `&self`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::bm25::{Bm25Index, LexicalIndex, LexicalIndexStats};
use crate::branch::{BranchResolution, BranchResolver};
use crate::citation::CitationValidator;
use crate::config::BraidConfig;
use crate::drafting::{parse_draft, AnswerDrafter, DraftRequest};
use crate::embedding::{check_query_embedding, EmbeddingBackend};
use crate::errors::BraidError;
use crate::fusion::{fuse, FusionParams};
use crate::model_adapter::{ModelAnswerDrafter, ModelEmbeddingBackend};
use crate::response::{RefusalReason, Response, ResponseContext, RetrievalDebug};
use crate::store::PassageStore;
use crate::types::{Branch, Query, ScoredHit};
use crate::vector_index::{InMemoryVectorIndex, VectorIndex};

// ============================================================================
// AskOptions
// ============================================================================

/// Per-request options for [`BraidEngine::ask`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AskOptions {
    /// Override `retrieval.topK`.
    pub top_k: Option<usize>,
    /// Attach retrieval metadata to the response.
    pub include_debug: bool,
}

impl AskOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of fused passages.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Attach retrieval metadata to the response.
    pub fn with_debug(mut self, include: bool) -> Self {
        self.include_debug = include;
        self
    }
}

// ============================================================================
// HealthReport
// ============================================================================

/// Snapshot of the engine's loaded resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// `ok`, or `degraded` when an index does not cover the whole store.
    pub status: String,
    pub passages: usize,
    pub branch_counts: BTreeMap<Branch, usize>,
    pub lexical: LexicalIndexStats,
    pub vector_entries: usize,
    pub embedding_dimension: usize,
    pub embedding_model: String,
    pub drafting_model: String,
}

impl HealthReport {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

// ============================================================================
// BraidEngine
// ============================================================================

/// The main engine for Braid queries.
///
/// # Construction
///
/// Use [`BraidEngine::from_config`] for typical usage, or [`BraidEngine::new`]
/// with custom collaborators for testing.
///
/// # Example
///
/// ```ignore
/// use braid_core::{AskOptions, BraidConfig, BraidEngine, Query};
///
/// let config = BraidConfig::load_default()?;
/// let engine = BraidEngine::from_config(config, Path::new("passages.jsonl"))?;
/// let response = engine.ask(&Query::new("What happens in the race ending?"), &AskOptions::new()).await?;
/// ```
pub struct BraidEngine {
    config: BraidConfig,
    store: Arc<PassageStore>,
    vector_index: Arc<dyn VectorIndex>,
    lexical_index: Arc<dyn LexicalIndex>,
    resolver: Arc<BranchResolver>,
    embedder: Arc<dyn EmbeddingBackend>,
    drafter: Arc<dyn AnswerDrafter>,
    validator: CitationValidator,
}

impl BraidEngine {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create an engine over a loaded store with the given collaborators.
    ///
    /// Builds the in-memory vector index and the BM25 index from the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        config: BraidConfig,
        store: PassageStore,
        embedder: Arc<dyn EmbeddingBackend>,
        drafter: Arc<dyn AnswerDrafter>,
    ) -> Result<Self, BraidError> {
        for warning in config.validate()? {
            warn!("Config: {}", warning);
        }

        let vector_index = InMemoryVectorIndex::from_store(&store)?;

        let mut lexical_index = Bm25Index::new(&config.retrieval.bm25);
        lexical_index.build_from_iter(
            store
                .passages()
                .iter()
                .map(|p| (p.id.as_str(), p.text.as_str())),
        );

        let resolver = BranchResolver::new(&config.branches)?;
        let validator = CitationValidator::new(config.citation.clone());

        info!(
            "Loaded {} passages ({}-dim embeddings, {} terms)",
            store.len(),
            store.embedding_dimension(),
            lexical_index.vocabulary_size()
        );

        Ok(Self {
            config,
            store: Arc::new(store),
            vector_index: Arc::new(vector_index),
            lexical_index: Arc::new(lexical_index),
            resolver: Arc::new(resolver),
            embedder,
            drafter,
            validator,
        })
    }

    /// Create an engine from configuration and a passage file, using the
    /// HTTP model adapters.
    ///
    /// Builds blocking HTTP clients; call this outside an async context.
    pub fn from_config(config: BraidConfig, passages_path: &Path) -> Result<Self, BraidError> {
        let store = PassageStore::load_jsonl(passages_path)?;

        let embedder = ModelEmbeddingBackend::new(&config.model)?;
        if let Some(dim) = embedder.dimension() {
            if dim != store.embedding_dimension() {
                return Err(BraidError::InvalidConfiguration {
                    message: format!(
                        "model.dimension is {} but the passages have {}-dim embeddings",
                        dim,
                        store.embedding_dimension()
                    ),
                    hint: "Use the embedding model the passages were ingested with".to_string(),
                });
            }
        }
        let drafter = ModelAnswerDrafter::new(&config.model)?;

        Self::new(config, store, Arc::new(embedder), Arc::new(drafter))
    }

    /// Replace the vector index.
    pub fn with_vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector_index = index;
        self
    }

    /// Replace the lexical index.
    pub fn with_lexical_index(mut self, index: Arc<dyn LexicalIndex>) -> Self {
        self.lexical_index = index;
        self
    }

    pub fn config(&self) -> &BraidConfig {
        &self.config
    }

    pub fn store(&self) -> &PassageStore {
        &self.store
    }

    pub fn resolver(&self) -> &BranchResolver {
        &self.resolver
    }

    // -------------------------------------------------------------------------
    // Ask
    // -------------------------------------------------------------------------

    /// Answer a question with validated citations, or refuse.
    ///
    /// A refusal is a normal `Ok` response with `refused = true`.
    ///
    /// # Errors
    ///
    /// - [`BraidError::InvalidArgument`] for an empty question or `top_k = 0`
    /// - [`BraidError::InvalidBranchHint`] for an unknown hint
    /// - [`BraidError::RetrievalUnavailable`] when both retrieval signals fail
    /// - [`BraidError::DraftingUnavailable`] when the drafting call fails
    /// - [`BraidError::MalformedDraft`] when the draft does not parse
    pub async fn ask(&self, query: &Query, options: &AskOptions) -> Result<Response, BraidError> {
        let query_id = Uuid::new_v4();
        let span = info_span!("ask", %query_id);
        self.run_ask(query, options, query_id).instrument(span).await
    }

    async fn run_ask(
        &self,
        query: &Query,
        options: &AskOptions,
        query_id: Uuid,
    ) -> Result<Response, BraidError> {
        let started = Instant::now();

        let text = query.text.trim();
        if text.is_empty() {
            return Err(BraidError::InvalidArgument(
                "Question cannot be empty".to_string(),
            ));
        }
        let top_k = options.top_k.unwrap_or(self.config.retrieval.top_k);
        if top_k == 0 {
            return Err(BraidError::InvalidArgument(
                "top_k must be at least 1".to_string(),
            ));
        }

        let resolution = self.resolver.resolve(text, query.branch_hint.as_deref())?;
        debug!(
            "Admissible branches: {:?} (ambiguous: {})",
            resolution.admissible, resolution.ambiguous
        );

        // Retrieval
        let dense_n = self.config.retrieval.dense_candidates(top_k);
        let sparse_n = self.config.retrieval.sparse_candidates(top_k);
        let (dense, sparse) = tokio::join!(
            self.dense_hits(text.to_string(), dense_n),
            self.sparse_hits(text.to_string(), sparse_n)
        );

        let mut unavailable_signals = Vec::new();
        let (dense, sparse) = match (dense, sparse) {
            (Ok(d), Ok(s)) => (d, s),
            (Err(e), Ok(s)) => {
                warn!("Dense retrieval unavailable, continuing sparse-only: {}", e);
                unavailable_signals.push("dense".to_string());
                (Vec::new(), s)
            }
            (Ok(d), Err(e)) => {
                warn!("Sparse retrieval unavailable, continuing dense-only: {}", e);
                unavailable_signals.push("sparse".to_string());
                (d, Vec::new())
            }
            (Err(dense_err), Err(sparse_err)) => {
                return Err(BraidError::RetrievalUnavailable {
                    dense: dense_err.to_string(),
                    sparse: sparse_err.to_string(),
                });
            }
        };
        let degraded_mode = !unavailable_signals.is_empty();

        let params = FusionParams::from_config(&self.config.retrieval, Some(top_k));
        let outcome = fuse(&dense, &sparse, &self.store, &resolution.admissible, &params);
        debug!(
            "Fused {} dense + {} sparse -> {} passages ({} filtered by branch)",
            dense.len(),
            sparse.len(),
            outcome.passages.len(),
            outcome.filtered_out
        );

        let retrieval = options.include_debug.then(|| {
            RetrievalDebug::new(
                dense.len(),
                sparse.len(),
                unavailable_signals.clone(),
                &outcome.passages,
                &self.store,
            )
        });
        let ctx = ResponseContext {
            query_id,
            resolved_label: resolution.label(),
            ambiguous_branch: resolution.ambiguous,
            degraded_mode,
            retrieval,
        };

        if outcome.passages.is_empty() {
            info!("No admissible passages; refusing without drafting");
            return Ok(Response::refusal(ctx, RefusalReason::NoPassages, 0.0));
        }

        // Drafting
        let request = DraftRequest::new(
            text,
            &outcome.passages,
            &self.store,
            explicit_branch(&resolution),
        );
        let raw = match self.draft(request).await? {
            Some(raw) => raw,
            None => {
                warn!(
                    "Drafting timed out after {:?}; refusing",
                    self.config.timeouts.drafting()
                );
                return Ok(Response::refusal(ctx, RefusalReason::DraftingTimedOut, 0.0));
            }
        };

        let draft = parse_draft(&raw, &self.resolver).map_err(|e| {
            error!("Discarding draft: {}", e);
            e
        })?;

        // Validation and gate
        let report = self.validator.validate(
            &draft.citations,
            draft.branch_label,
            &resolution.admissible,
            &outcome.passages,
            &self.store,
        );
        let response = Response::from_draft(ctx, draft, &report, &self.config.refusal);

        info!(
            "Answered in {}ms: refused={} confidence={:.3} citations={}",
            started.elapsed().as_millis(),
            response.refused,
            response.confidence_score,
            response.citations.len()
        );
        Ok(response)
    }

    /// Embed the query (one retry) and query the vector index.
    async fn dense_hits(&self, text: String, n: usize) -> Result<Vec<ScoredHit>, BraidError> {
        let vector = self.embed_with_retry(text).await?;

        let index = Arc::clone(&self.vector_index);
        let hits = run_blocking(self.config.timeouts.retrieval(), move || {
            index.query(&vector, n)
        })
        .await
        .unwrap_or_else(|| {
            Err(BraidError::IndexQueryFailed {
                index: "dense".to_string(),
                reason: "timed out".to_string(),
            })
        })?;

        debug!("Dense retrieval: {} hits", hits.len());
        Ok(hits)
    }

    async fn embed_with_retry(&self, text: String) -> Result<Vec<f32>, BraidError> {
        let mut last_err = None;
        for attempt in 0..2 {
            if attempt > 0 {
                tokio::time::sleep(self.config.timeouts.embedding_retry_backoff()).await;
            }
            match self.embed_once(text.clone()).await {
                Ok(vector) => return Ok(vector),
                Err(e) => {
                    debug!("Embedding attempt {} failed: {}", attempt + 1, e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| BraidError::EmbeddingUnavailable {
            provider: self.embedder.model_id().to_string(),
            reason: "no attempt made".to_string(),
        }))
    }

    async fn embed_once(&self, text: String) -> Result<Vec<f32>, BraidError> {
        let embedder = Arc::clone(&self.embedder);
        let timeout = self.config.timeouts.embedding();
        let vector = run_blocking(timeout, move || embedder.embed(&text))
            .await
            .unwrap_or_else(|| {
                Err(BraidError::EmbeddingUnavailable {
                    provider: self.embedder.model_id().to_string(),
                    reason: format!("timed out after {:?}", timeout),
                })
            })?;

        check_query_embedding(
            &vector,
            self.store.embedding_dimension(),
            self.embedder.model_id(),
        )?;
        Ok(vector)
    }

    /// Tokenize the query and query the lexical index.
    async fn sparse_hits(&self, text: String, n: usize) -> Result<Vec<ScoredHit>, BraidError> {
        let index = Arc::clone(&self.lexical_index);
        let hits = run_blocking(self.config.timeouts.retrieval(), move || {
            let tokens = index.tokenize(&text);
            index.query(&tokens, n)
        })
        .await
        .unwrap_or_else(|| {
            Err(BraidError::IndexQueryFailed {
                index: "sparse".to_string(),
                reason: "timed out".to_string(),
            })
        })?;

        debug!("Sparse retrieval: {} hits", hits.len());
        Ok(hits)
    }

    /// Raw draft, or `None` on timeout.
    async fn draft(&self, request: DraftRequest) -> Result<Option<String>, BraidError> {
        let drafter = Arc::clone(&self.drafter);
        match run_blocking(self.config.timeouts.drafting(), move || drafter.draft(&request)).await {
            Some(result) => result.map(Some),
            None => Ok(None),
        }
    }

    // -------------------------------------------------------------------------
    // Health
    // -------------------------------------------------------------------------

    /// Report what the engine has loaded.
    pub fn health(&self) -> HealthReport {
        let lexical = self.lexical_index.stats();
        let vector_entries = self.vector_index.len();
        let passages = self.store.len();

        let status = if lexical.num_documents == passages && vector_entries == passages {
            "ok"
        } else {
            "degraded"
        };

        HealthReport {
            status: status.to_string(),
            passages,
            branch_counts: self.store.branch_counts(),
            lexical,
            vector_entries,
            embedding_dimension: self.store.embedding_dimension(),
            embedding_model: self.embedder.model_id().to_string(),
            drafting_model: self.drafter.model_id().to_string(),
        }
    }
}

impl std::fmt::Debug for BraidEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BraidEngine")
            .field("passages", &self.store.len())
            .field("embedding_model", &self.embedder.model_id())
            .field("drafting_model", &self.drafter.model_id())
            .finish()
    }
}

/// The branch to name in the drafting prompt: only when the caller chose it.
fn explicit_branch(resolution: &BranchResolution) -> Option<Branch> {
    if resolution.explicit {
        resolution.selected
    } else {
        None
    }
}

/// Run a blocking call on the blocking pool under a timeout.
///
/// Returns `None` on timeout. The blocking call is not cancelled; its result
/// is discarded.
async fn run_blocking<T, F>(timeout: Duration, f: F) -> Option<Result<T, BraidError>>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, BraidError> + Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(f)).await {
        Ok(Ok(result)) => Some(result),
        Ok(Err(join_err)) => Some(Err(BraidError::Other(anyhow::anyhow!(
            "blocking task failed: {}",
            join_err
        )))),
        Err(_) => None,
    }
}
