//! Okapi BM25 scoring.
//!
//! ```text
//! score(D, Q) = Σ IDF(q_i) * (f(q_i, D) * (k1 + 1)) / (f(q_i, D) + k1 * (1 - b + b * |D| / avgdl))
//! ```

use serde::{Deserialize, Serialize};

/// BM25 scoring parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term frequency saturation. Default: 1.2
    pub k1: f32,
    /// Document length normalization (0 = none, 1 = full). Default: 0.75
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// Smoothed IDF: `ln((N - df + 0.5) / (df + 0.5) + 1)`.
///
/// Always positive, even for terms present in every passage.
#[inline]
pub fn idf(num_docs: usize, doc_freq: usize) -> f32 {
    let n = num_docs as f32;
    let df = doc_freq as f32;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

/// Score contribution of one query term to one document.
#[inline]
pub fn bm25_term_score(
    term_freq: usize,
    doc_len: usize,
    avg_doc_len: f32,
    idf_value: f32,
    params: &Bm25Params,
) -> f32 {
    let tf = term_freq as f32;
    let dl = doc_len as f32;
    // avg_doc_len is 0 only when every passage tokenized to nothing
    let norm = if avg_doc_len > 0.0 { dl / avg_doc_len } else { 1.0 };

    let numerator = tf * (params.k1 + 1.0);
    let denominator = tf + params.k1 * (1.0 - params.b + params.b * norm);

    idf_value * numerator / denominator
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idf_common_vs_rare() {
        assert!(idf(1000, 900) < 0.5);
        assert!(idf(1000, 900) > 0.0);
        assert!(idf(1000, 10) > 3.0);
    }

    #[test]
    fn test_idf_all_docs_still_positive() {
        let v = idf(4, 4);
        assert!(v > 0.0);
        assert!((v - (0.5f32 / 4.5 + 1.0).ln()).abs() < 1e-6);
    }

    #[test]
    fn test_length_normalization() {
        let params = Bm25Params::default();
        let idf_val = idf(100, 10);

        let short = bm25_term_score(3, 50, 100.0, idf_val, &params);
        let long = bm25_term_score(3, 200, 100.0, idf_val, &params);
        assert!(short > long);

        let flat = Bm25Params { k1: 1.2, b: 0.0 };
        assert!(bm25_term_score(3, 200, 100.0, idf_val, &flat) > long);
    }

    #[test]
    fn test_tf_saturation() {
        let params = Bm25Params::default();
        let idf_val = idf(100, 10);

        let s1 = bm25_term_score(1, 100, 100.0, idf_val, &params);
        let s5 = bm25_term_score(5, 100, 100.0, idf_val, &params);
        let s50 = bm25_term_score(50, 100, 100.0, idf_val, &params);

        assert!(s5 > s1);
        assert!(s50 > s5);
        // bounded by idf * (k1 + 1)
        assert!(s50 < idf_val * (params.k1 + 1.0));
    }

    #[test]
    fn test_zero_average_length_is_finite() {
        let score = bm25_term_score(1, 0, 0.0, 1.0, &Bm25Params::default());
        assert!(score.is_finite());
    }
}
