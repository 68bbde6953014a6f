//! Query embedding abstraction.
//!
//! - [`EmbeddingBackend`] - trait for embedding providers
//! - [`check_query_embedding`] - rejects vectors that would make dense scores meaningless
//!
//! The HTTP implementation lives in `braid-model` and is wrapped by
//! [`crate::model_adapter::ModelEmbeddingBackend`]. Tests use fakes.

use crate::errors::BraidError;

/// Trait for embedding providers.
///
/// Implementations are blocking; the engine calls them on the blocking pool
/// under a timeout.
pub trait EmbeddingBackend: Send + Sync {
    /// The model this backend uses. Must match the model used at ingestion.
    fn model_id(&self) -> &str;

    /// Embed a single text.
    fn embed(&self, input: &str) -> Result<Vec<f32>, BraidError>;
}

/// Validate a query embedding against the index dimension.
///
/// # Errors
///
/// Returns [`BraidError::EmbeddingUnavailable`] for empty, all-zero,
/// non-finite or wrong-dimension vectors.
pub fn check_query_embedding(
    vector: &[f32],
    expected_dimension: usize,
    provider: &str,
) -> Result<(), BraidError> {
    let reason = if vector.is_empty() {
        Some("empty embedding".to_string())
    } else if vector.len() != expected_dimension {
        Some(format!(
            "embedding has {} dimensions, passage index has {}",
            vector.len(),
            expected_dimension
        ))
    } else if vector.iter().any(|v| !v.is_finite()) {
        Some("embedding contains non-finite values".to_string())
    } else if vector.iter().all(|v| *v == 0.0) {
        Some("embedding is all zeros".to_string())
    } else {
        None
    };

    match reason {
        Some(reason) => Err(BraidError::EmbeddingUnavailable {
            provider: provider.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_valid_vector() {
        assert!(check_query_embedding(&[0.1, -0.2, 0.3], 3, "fake").is_ok());
    }

    #[test]
    fn test_rejects_bad_vectors() {
        for bad in [
            vec![],
            vec![0.0, 0.0, 0.0],
            vec![0.1, f32::NAN, 0.3],
            vec![0.1, 0.2],
        ] {
            let err = check_query_embedding(&bad, 3, "fake").unwrap_err();
            assert!(matches!(err, BraidError::EmbeddingUnavailable { .. }));
        }
    }

    #[test]
    fn test_reason_mentions_dimension() {
        let err = check_query_embedding(&[1.0; 4], 768, "nomic-embed-text").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("nomic-embed-text"));
        assert!(msg.contains("768"));
    }
}
