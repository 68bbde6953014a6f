//! Exact in-memory vector index.
//!
//! The corpus is a single document, a few hundred passages at most, so a
//! linear scan is exact and fast enough.

use std::cmp::Ordering;

use tracing::trace;

use super::VectorIndex;
use crate::errors::BraidError;
use crate::store::PassageStore;
use crate::types::ScoredHit;

#[derive(Debug, Clone)]
struct StoredVector {
    id: String,
    vector: Vec<f32>,
    norm: f32,
}

/// Linear-scan cosine index. Entries keep store order.
#[derive(Debug, Clone)]
pub struct InMemoryVectorIndex {
    dimension: usize,
    vectors: Vec<StoredVector>,
}

impl InMemoryVectorIndex {
    /// Create an empty index for vectors of `dimension`.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
        }
    }

    /// Index every passage embedding in store order.
    pub fn from_store(store: &PassageStore) -> Result<Self, BraidError> {
        let mut index = Self::new(store.embedding_dimension());
        for passage in store.passages() {
            index.insert(passage.id.clone(), passage.embedding.clone())?;
        }
        Ok(index)
    }

    /// Append a vector.
    pub fn insert(&mut self, id: String, vector: Vec<f32>) -> Result<(), BraidError> {
        if vector.len() != self.dimension {
            return Err(BraidError::PassageStoreInvalid(format!(
                "embedding for '{}' has {} dimensions, index expects {}",
                id,
                vector.len(),
                self.dimension
            )));
        }
        let norm = l2_norm(&vector);
        self.vectors.push(StoredVector { id, vector, norm });
        Ok(())
    }
}

impl VectorIndex for InMemoryVectorIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn query(&self, vector: &[f32], n: usize) -> Result<Vec<ScoredHit>, BraidError> {
        if vector.len() != self.dimension {
            return Err(BraidError::IndexQueryFailed {
                index: "dense".to_string(),
                reason: format!(
                    "query vector has {} dimensions, index expects {}",
                    vector.len(),
                    self.dimension
                ),
            });
        }
        if n == 0 {
            return Ok(Vec::new());
        }

        let query_norm = l2_norm(vector);
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(idx, stored)| (idx, cosine_with_norms(vector, query_norm, stored)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(n);

        trace!("Dense query scanned {} vectors", self.vectors.len());

        Ok(scored
            .into_iter()
            .map(|(idx, score)| ScoredHit::new(self.vectors[idx].id.clone(), score))
            .collect())
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine_with_norms(query: &[f32], query_norm: f32, stored: &StoredVector) -> f32 {
    if query_norm == 0.0 || stored.norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = query
        .iter()
        .zip(stored.vector.iter())
        .map(|(x, y)| x * y)
        .sum();
    dot / (query_norm * stored.norm)
}

/// Cosine similarity between two vectors; 0 when either is all-zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
