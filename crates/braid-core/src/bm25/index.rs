//! BM25 inverted index.
//!
//! Term → postings with term frequencies, plus per-document lengths.
//! Built once from the passage store and read-only afterwards.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::scorer::{bm25_term_score, idf, Bm25Params};
use super::tokenizer::{Tokenizer, TokenizerConfig};
use super::Bm25Config;
use crate::types::ScoredHit;

/// Statistics for a single document in the index.
#[derive(Debug, Clone)]
pub struct DocumentStats {
    /// Number of tokens in the document.
    pub length: usize,
    /// Passage id.
    pub doc_id: String,
}

/// Posting entry: document index and term frequency.
#[derive(Debug, Clone)]
struct Posting {
    doc_idx: usize,
    term_freq: usize,
}

/// BM25 inverted index.
///
/// Document indices follow insertion order, which is also the tie-break
/// order for equal scores.
pub struct Bm25Index {
    params: Bm25Params,
    tokenizer: Tokenizer,
    /// Term → (document frequency, postings).
    inverted_index: HashMap<String, (usize, Vec<Posting>)>,
    documents: Vec<DocumentStats>,
    avg_doc_len: f32,
    total_tokens: usize,
}

impl Bm25Index {
    /// Create a new empty BM25 index.
    pub fn new(config: &Bm25Config) -> Self {
        let tokenizer = Tokenizer::new(TokenizerConfig {
            stemming: config.stemming,
            remove_stopwords: config.remove_stopwords,
            min_token_length: config.min_token_length,
        });

        Self {
            params: Bm25Params {
                k1: config.k1,
                b: config.b,
            },
            tokenizer,
            inverted_index: HashMap::new(),
            documents: Vec::new(),
            avg_doc_len: 0.0,
            total_tokens: 0,
        }
    }

    /// Add a document and return its internal index.
    pub fn add_document(&mut self, doc_id: String, text: &str) -> usize {
        let tokens = self.tokenizer.tokenize(text);
        let doc_len = tokens.len();

        let mut term_freqs: HashMap<String, usize> = HashMap::new();
        for token in tokens {
            *term_freqs.entry(token).or_insert(0) += 1;
        }

        let doc_idx = self.documents.len();
        self.documents.push(DocumentStats {
            length: doc_len,
            doc_id,
        });

        for (term, tf) in term_freqs {
            let entry = self.inverted_index.entry(term).or_insert((0, Vec::new()));
            entry.0 += 1;
            entry.1.push(Posting {
                doc_idx,
                term_freq: tf,
            });
        }

        self.total_tokens += doc_len;
        self.avg_doc_len = self.total_tokens as f32 / self.documents.len() as f32;

        doc_idx
    }

    /// Build the index from an iterator of `(doc_id, text)` pairs.
    pub fn build_from_iter<I, S1, S2>(&mut self, documents: I)
    where
        I: IntoIterator<Item = (S1, S2)>,
        S1: Into<String>,
        S2: AsRef<str>,
    {
        for (doc_id, text) in documents {
            self.add_document(doc_id.into(), text.as_ref());
        }
    }

    /// Tokenize text with the index's own tokenizer configuration.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.tokenizer.tokenize(text)
    }

    /// Score documents against already-tokenized query terms.
    ///
    /// Repeated query terms count once. Results are sorted by score
    /// descending, ties by insertion order.
    pub fn search_tokens(&self, query_tokens: &[String], top_k: usize) -> Vec<ScoredHit> {
        if self.documents.is_empty() || query_tokens.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let num_docs = self.documents.len();
        let mut seen = HashSet::new();
        let mut scores: HashMap<usize, f32> = HashMap::new();

        for term in query_tokens {
            if !seen.insert(term.as_str()) {
                continue;
            }
            let Some((df, postings)) = self.inverted_index.get(term) else {
                continue;
            };
            let idf_val = idf(num_docs, *df);
            for posting in postings {
                let doc = &self.documents[posting.doc_idx];
                let term_score = bm25_term_score(
                    posting.term_freq,
                    doc.length,
                    self.avg_doc_len,
                    idf_val,
                    &self.params,
                );
                *scores.entry(posting.doc_idx).or_insert(0.0) += term_score;
            }
        }

        let mut scored_docs: Vec<(usize, f32)> = scores.into_iter().collect();
        scored_docs.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        scored_docs
            .into_iter()
            .take(top_k)
            .map(|(doc_idx, score)| ScoredHit::new(self.documents[doc_idx].doc_id.clone(), score))
            .collect()
    }

    /// Tokenize `query` and search.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<ScoredHit> {
        let tokens = self.tokenize(query);
        self.search_tokens(&tokens, top_k)
    }

    pub fn num_documents(&self) -> usize {
        self.documents.len()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.inverted_index.len()
    }

    pub fn avg_doc_length(&self) -> f32 {
        self.avg_doc_len
    }

    /// Number of documents containing `term` (already tokenized).
    pub fn document_frequency(&self, term: &str) -> usize {
        self.inverted_index
            .get(term)
            .map(|(df, _)| *df)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Index statistics for health reports.
    pub fn stats(&self) -> LexicalIndexStats {
        LexicalIndexStats {
            num_documents: self.documents.len(),
            vocabulary_size: self.inverted_index.len(),
            total_tokens: self.total_tokens,
            avg_doc_length: self.avg_doc_len,
        }
    }
}

/// Statistics about a lexical index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexicalIndexStats {
    pub num_documents: usize,
    pub vocabulary_size: usize,
    pub total_tokens: usize,
    pub avg_doc_length: f32,
}
