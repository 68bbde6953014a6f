//! Vector index abstraction for dense retrieval.
//!
//! This module provides:
//! - [`VectorIndex`] - trait for nearest-neighbour lookups by cosine similarity
//! - [`InMemoryVectorIndex`] - exact linear-scan index over the passage store
//!
//! The trait is **synchronous**; the engine runs queries on the blocking pool.

mod memory;

pub use memory::{cosine_similarity, InMemoryVectorIndex};

use crate::errors::BraidError;
use crate::types::ScoredHit;

/// A read-only vector index.
pub trait VectorIndex: Send + Sync {
    /// Vector dimension of the indexed embeddings.
    fn dimension(&self) -> usize;

    /// Number of indexed vectors.
    fn len(&self) -> usize;

    /// Whether the index is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Up to `n` hits by descending cosine similarity, ties by store order.
    ///
    /// # Errors
    ///
    /// Returns [`BraidError::IndexQueryFailed`] on a dimension mismatch.
    fn query(&self, vector: &[f32], n: usize) -> Result<Vec<ScoredHit>, BraidError>;
}
