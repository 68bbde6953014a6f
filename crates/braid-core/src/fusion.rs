//! Hybrid fusion of dense and sparse results.
//!
//! Order of operations is fixed:
//!
//! 1. drop hits whose id the store does not know
//! 2. interleave `dense[0], sparse[0], dense[1], sparse[1], …`
//! 3. deduplicate by passage id, first occurrence wins; ids seen in both lists
//!    become `Source::Both`
//! 4. score: `w_d·norm(dense) + w_s·norm(sparse) + bonus·both`, where `norm`
//!    divides by the list maximum and clamps negatives to 0
//! 5. branch filter (after fusion, never before)
//! 6. stable sort: score desc, then `Both` first, then page asc, then interleave order
//! 7. truncate to K
//!
//! An empty result after filtering stays empty; it is never widened.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::RetrievalConfig;
use crate::store::PassageStore;
use crate::types::{BranchSet, RetrievedPassage, ScoredHit, Source};

/// Weights and cut-off for one fusion run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionParams {
    pub dense_weight: f32,
    pub sparse_weight: f32,
    pub agreement_bonus: f32,
    pub top_k: usize,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self::from_config(&RetrievalConfig::default(), None)
    }
}

impl FusionParams {
    /// Parameters from config, with an optional per-request K.
    pub fn from_config(config: &RetrievalConfig, top_k: Option<usize>) -> Self {
        Self {
            dense_weight: config.dense_weight,
            sparse_weight: config.sparse_weight,
            agreement_bonus: config.agreement_bonus,
            top_k: top_k.unwrap_or(config.top_k),
        }
    }
}

/// Result of a fusion run with bookkeeping for logs and debug output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FusionOutcome {
    /// Final ranked passages, at most K.
    pub passages: Vec<RetrievedPassage>,
    /// Hits dropped because the store does not know their id.
    pub unknown_ids: usize,
    /// Distinct passages after deduplication, before the branch filter.
    pub deduplicated: usize,
    /// Passages removed by the branch filter.
    pub filtered_out: usize,
}

struct Candidate<'a> {
    passage_id: &'a str,
    order: usize,
    dense_score: Option<f32>,
    sparse_score: Option<f32>,
}

impl Candidate<'_> {
    fn source(&self) -> Source {
        match (self.dense_score, self.sparse_score) {
            (Some(_), Some(_)) => Source::Both,
            (Some(_), None) => Source::Dense,
            _ => Source::Sparse,
        }
    }
}

/// Fuse dense and sparse hits into a branch-consistent top-K.
///
/// Either list may be empty, which is how a degraded single-signal run
/// looks to this function.
pub fn fuse(
    dense: &[ScoredHit],
    sparse: &[ScoredHit],
    store: &PassageStore,
    admissible: &BranchSet,
    params: &FusionParams,
) -> FusionOutcome {
    let (dense, unknown_dense) = known_hits(dense, store, "dense");
    let (sparse, unknown_sparse) = known_hits(sparse, store, "sparse");

    let max_dense = list_max(&dense);
    let max_sparse = list_max(&sparse);

    // Interleave and deduplicate
    let mut candidates: Vec<Candidate<'_>> = Vec::with_capacity(dense.len() + sparse.len());
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut order = 0;
    for i in 0..dense.len().max(sparse.len()) {
        for (hit, is_dense) in [(dense.get(i).copied(), true), (sparse.get(i).copied(), false)] {
            let Some(hit) = hit else {
                continue;
            };
            let idx = *positions.entry(hit.passage_id.as_str()).or_insert_with(|| {
                candidates.push(Candidate {
                    passage_id: hit.passage_id.as_str(),
                    order,
                    dense_score: None,
                    sparse_score: None,
                });
                candidates.len() - 1
            });
            order += 1;

            let slot = if is_dense {
                &mut candidates[idx].dense_score
            } else {
                &mut candidates[idx].sparse_score
            };
            // A retriever repeating an id keeps its first (higher) score
            if slot.is_none() {
                *slot = Some(hit.score);
            }
        }
    }
    let deduplicated = candidates.len();

    let mut fused: Vec<(RetrievedPassage, usize)> = Vec::with_capacity(candidates.len());
    let mut filtered_out = 0;
    for candidate in &candidates {
        // known_hits guarantees the lookup
        let Some(passage) = store.get(candidate.passage_id) else {
            continue;
        };
        if !admissible.contains(&passage.branch) {
            filtered_out += 1;
            continue;
        }

        let source = candidate.source();
        let mut score = params.dense_weight * normalize(candidate.dense_score, max_dense)
            + params.sparse_weight * normalize(candidate.sparse_score, max_sparse);
        if source == Source::Both {
            score += params.agreement_bonus;
        }

        fused.push((
            RetrievedPassage {
                passage_id: candidate.passage_id.to_string(),
                score,
                source,
                dense_score: candidate.dense_score,
                sparse_score: candidate.sparse_score,
                branch: passage.branch,
                locator: passage.locator.clone(),
            },
            candidate.order,
        ));
    }

    fused.sort_by(|(a, a_order), (b, b_order)| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| (b.source == Source::Both).cmp(&(a.source == Source::Both)))
            .then_with(|| a.locator.page.cmp(&b.locator.page))
            .then_with(|| a_order.cmp(b_order))
    });
    fused.truncate(params.top_k);

    debug!(
        "Fusion: {} dense + {} sparse -> {} distinct -> {} admissible (top {})",
        dense.len(),
        sparse.len(),
        deduplicated,
        deduplicated - filtered_out,
        fused.len()
    );

    FusionOutcome {
        passages: fused.into_iter().map(|(p, _)| p).collect(),
        unknown_ids: unknown_dense + unknown_sparse,
        deduplicated,
        filtered_out,
    }
}

fn known_hits<'a>(
    hits: &'a [ScoredHit],
    store: &PassageStore,
    signal: &str,
) -> (Vec<&'a ScoredHit>, usize) {
    let mut unknown = 0;
    let known = hits
        .iter()
        .filter(|hit| {
            let ok = store.contains(&hit.passage_id);
            if !ok {
                warn!(
                    "Discarding {} hit with unknown passage id '{}'",
                    signal, hit.passage_id
                );
                unknown += 1;
            }
            ok
        })
        .collect();
    (known, unknown)
}

fn list_max(hits: &[&ScoredHit]) -> f32 {
    hits.iter()
        .map(|h| h.score)
        .filter(|s| s.is_finite())
        .fold(0.0f32, f32::max)
}

fn normalize(score: Option<f32>, max: f32) -> f32 {
    match score {
        Some(s) if max > 0.0 && s.is_finite() => s.max(0.0) / max,
        _ => 0.0,
    }
}
