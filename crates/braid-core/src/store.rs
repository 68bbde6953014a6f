//! Passage store: the immutable, branch-labeled corpus.
//!
//! Passages are produced by ingestion (outside this crate) as JSONL, one
//! passage per line:
//!
//! ```json
//! {"id":"p-012","text":"...","embedding":[0.1,...],"branch":"branch_A","locator":{"page":12,"section":"Mid 2027"}}
//! ```
//!
//! The store is loaded once and shared read-only between requests.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use crate::errors::BraidError;
use crate::types::{Branch, Passage};

/// Immutable collection of passages with lookup by id.
#[derive(Debug, Clone)]
pub struct PassageStore {
    passages: Vec<Passage>,
    by_id: HashMap<String, usize>,
    dimension: usize,
}

impl PassageStore {
    /// Build a store from passages, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns [`BraidError::PassageStoreInvalid`] if the corpus is empty, an
    /// id repeats, or embeddings are empty, non-finite or of differing length.
    pub fn from_passages(passages: Vec<Passage>) -> Result<Self, BraidError> {
        let Some(first) = passages.first() else {
            return Err(BraidError::PassageStoreInvalid(
                "the passage corpus is empty".to_string(),
            ));
        };
        let dimension = first.embedding.len();
        if dimension == 0 {
            return Err(BraidError::PassageStoreInvalid(format!(
                "passage '{}' has an empty embedding",
                first.id
            )));
        }

        let mut by_id = HashMap::with_capacity(passages.len());
        for (idx, passage) in passages.iter().enumerate() {
            if passage.id.trim().is_empty() {
                return Err(BraidError::PassageStoreInvalid(format!(
                    "passage #{} has an empty id",
                    idx + 1
                )));
            }
            if passage.embedding.len() != dimension {
                return Err(BraidError::PassageStoreInvalid(format!(
                    "passage '{}' has {} embedding dimensions, expected {}",
                    passage.id,
                    passage.embedding.len(),
                    dimension
                )));
            }
            if passage.embedding.iter().any(|v| !v.is_finite()) {
                return Err(BraidError::PassageStoreInvalid(format!(
                    "passage '{}' has a non-finite embedding value",
                    passage.id
                )));
            }
            if by_id.insert(passage.id.clone(), idx).is_some() {
                return Err(BraidError::PassageStoreInvalid(format!(
                    "duplicate passage id '{}'",
                    passage.id
                )));
            }
        }

        Ok(Self {
            passages,
            by_id,
            dimension,
        })
    }

    /// Load a JSONL passage file.
    ///
    /// Blank lines are skipped. Unknown branch labels fail the parse.
    pub fn load_jsonl(path: &Path) -> Result<Self, BraidError> {
        let file = File::open(path).map_err(|e| BraidError::PassageStoreIo {
            path: path.to_path_buf(),
            message: format!("Failed to open: {}", e),
        })?;

        let reader = BufReader::new(file);
        let mut passages = Vec::new();

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result.map_err(|e| BraidError::PassageStoreIo {
                path: path.to_path_buf(),
                message: format!("Failed to read line {}: {}", line_num + 1, e),
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let passage: Passage =
                serde_json::from_str(&line).map_err(|e| BraidError::PassageStoreParse {
                    path: path.to_path_buf(),
                    message: format!("Failed to parse line {}: {}", line_num + 1, e),
                })?;

            passages.push(passage);
        }

        let store = Self::from_passages(passages)?;
        debug!(
            "Loaded {} passages ({} dims) from {}",
            store.len(),
            store.dimension,
            path.display()
        );
        Ok(store)
    }

    /// Look up a passage by id.
    pub fn get(&self, id: &str) -> Option<&Passage> {
        self.by_id.get(id).map(|&idx| &self.passages[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// All passages in store order.
    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Embedding dimension shared by every passage.
    pub fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    /// Passage count per branch. Every branch is present, possibly with 0.
    pub fn branch_counts(&self) -> BTreeMap<Branch, usize> {
        let mut counts: BTreeMap<Branch, usize> = Branch::ALL.into_iter().map(|b| (b, 0)).collect();
        for passage in &self.passages {
            *counts.entry(passage.branch).or_insert(0) += 1;
        }
        counts
    }
}
