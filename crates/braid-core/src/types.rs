//! Core data model: passages, queries, retrieval hits and citations.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================================================
// Branch
// ============================================================================

/// A narrative branch of the document.
///
/// `Shared` is the common prefix, `BranchA`/`BranchB` are the mutually
/// exclusive continuations, `Appendix` is supporting material that is valid
/// alongside any branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Branch {
    #[serde(rename = "shared")]
    Shared,
    #[serde(rename = "branch_A")]
    BranchA,
    #[serde(rename = "branch_B")]
    BranchB,
    #[serde(rename = "appendix")]
    Appendix,
}

/// A set of branches, ordered by declaration order.
pub type BranchSet = BTreeSet<Branch>;

impl Branch {
    /// All branches in declaration order.
    pub const ALL: [Branch; 4] = [
        Branch::Shared,
        Branch::BranchA,
        Branch::BranchB,
        Branch::Appendix,
    ];

    /// Canonical label as stored in the corpus.
    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::Shared => "shared",
            Branch::BranchA => "branch_A",
            Branch::BranchB => "branch_B",
            Branch::Appendix => "appendix",
        }
    }

    /// Parse a canonical label, ignoring ASCII case.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(label.trim()))
    }

    /// Whether this branch is admissible regardless of the resolved scenario.
    pub fn is_always_admissible(&self) -> bool {
        matches!(self, Branch::Shared | Branch::Appendix)
    }

    /// The full set of branches.
    pub fn all() -> BranchSet {
        Self::ALL.into_iter().collect()
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Branch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| {
            format!(
                "unknown branch '{}' (expected one of: shared, branch_A, branch_B, appendix)",
                s
            )
        })
    }
}

// ============================================================================
// BranchLabel
// ============================================================================

/// The branch an answer declares it is about.
///
/// Serialized as a plain string: a branch label, `both` or `unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BranchLabel {
    /// A single branch.
    Single(Branch),
    /// The answer compares both divergent continuations.
    Both,
    /// The answer does not commit to a branch.
    Unknown,
}

impl BranchLabel {
    /// Branches this label claims. `Both` = {branch_A, branch_B}, `Unknown` = ∅.
    pub fn branches(&self) -> BranchSet {
        match self {
            BranchLabel::Single(b) => [*b].into_iter().collect(),
            BranchLabel::Both => [Branch::BranchA, Branch::BranchB].into_iter().collect(),
            BranchLabel::Unknown => BranchSet::new(),
        }
    }

    /// Whether every claimed branch is in `admissible`.
    pub fn is_consistent_with(&self, admissible: &BranchSet) -> bool {
        self.branches().is_subset(admissible)
    }

    /// Label describing an admissible set: the single divergent branch when
    /// the set names exactly one, `unknown` otherwise.
    pub fn for_admissible(admissible: &BranchSet) -> Self {
        let divergent: Vec<Branch> = admissible
            .iter()
            .copied()
            .filter(|b| !b.is_always_admissible())
            .collect();
        match divergent.as_slice() {
            [single] => BranchLabel::Single(*single),
            [] if admissible.contains(&Branch::Shared) => BranchLabel::Single(Branch::Shared),
            _ => BranchLabel::Unknown,
        }
    }
}

impl fmt::Display for BranchLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchLabel::Single(b) => f.write_str(b.as_str()),
            BranchLabel::Both => f.write_str("both"),
            BranchLabel::Unknown => f.write_str("unknown"),
        }
    }
}

impl TryFrom<String> for BranchLabel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("both") {
            return Ok(BranchLabel::Both);
        }
        if trimmed.eq_ignore_ascii_case("unknown") {
            return Ok(BranchLabel::Unknown);
        }
        trimmed.parse::<Branch>().map(BranchLabel::Single)
    }
}

impl From<BranchLabel> for String {
    fn from(label: BranchLabel) -> Self {
        label.to_string()
    }
}

// ============================================================================
// Passage
// ============================================================================

/// Where a passage sits in the source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    /// 1-based page number.
    pub page: u32,
    /// Section heading, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.section {
            Some(section) => write!(f, "p.{} ({})", self.page, section),
            None => write!(f, "p.{}", self.page),
        }
    }
}

/// An immutable, branch-labeled segment of the source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Unique passage id.
    pub id: String,
    /// Raw passage text.
    pub text: String,
    /// Embedding produced at ingestion time.
    pub embedding: Vec<f32>,
    /// The branch this passage belongs to.
    pub branch: Branch,
    /// Source location.
    pub locator: Locator,
}

// ============================================================================
// Query
// ============================================================================

/// A question plus an optional branch hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// The natural-language question.
    pub text: String,
    /// A branch label, an alias, or `auto`. `None` behaves like `auto`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_hint: Option<String>,
}

impl Query {
    /// A query with automatic branch detection.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            branch_hint: None,
        }
    }

    /// Set an explicit branch hint.
    pub fn with_branch_hint(mut self, hint: impl Into<String>) -> Self {
        self.branch_hint = Some(hint.into());
        self
    }
}

// ============================================================================
// Retrieval
// ============================================================================

/// A single `(passage_id, score)` hit from one retriever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredHit {
    pub passage_id: String,
    pub score: f32,
}

impl ScoredHit {
    pub fn new(passage_id: impl Into<String>, score: f32) -> Self {
        Self {
            passage_id: passage_id.into(),
            score,
        }
    }
}

/// Which retriever(s) surfaced a passage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Dense,
    Sparse,
    Both,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Dense => f.write_str("dense"),
            Source::Sparse => f.write_str("sparse"),
            Source::Both => f.write_str("both"),
        }
    }
}

/// A passage after hybrid fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub passage_id: String,
    /// Fused score.
    pub score: f32,
    pub source: Source,
    /// Raw cosine similarity, when the dense retriever returned it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dense_score: Option<f32>,
    /// Raw BM25 score, when the sparse retriever returned it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparse_score: Option<f32>,
    pub branch: Branch,
    pub locator: Locator,
}

// ============================================================================
// Citations
// ============================================================================

/// A citation claim made by the drafting capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub passage_id: String,
    pub quote: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<Locator>,
}

/// A citation after validation against the fused passage set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedCitation {
    pub passage_id: String,
    pub quote: String,
    /// Authoritative locator from the store, or the claimed one if the passage is unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<Locator>,
    pub verified: bool,
    /// Similarity between quote and passage text, 0–100.
    pub match_score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_serde_labels() {
        let json = serde_json::to_string(&Branch::BranchA).unwrap();
        assert_eq!(json, "\"branch_A\"");
        let parsed: Branch = serde_json::from_str("\"appendix\"").unwrap();
        assert_eq!(parsed, Branch::Appendix);
        assert!(serde_json::from_str::<Branch>("\"branch_C\"").is_err());
    }

    #[test]
    fn test_branch_from_label_ignores_case() {
        assert_eq!(Branch::from_label("BRANCH_b"), Some(Branch::BranchB));
        assert_eq!(Branch::from_label("race"), None);
    }

    #[test]
    fn test_branch_label_sets() {
        assert_eq!(
            BranchLabel::Both.branches(),
            [Branch::BranchA, Branch::BranchB].into_iter().collect()
        );
        assert!(BranchLabel::Unknown.branches().is_empty());

        let admissible: BranchSet = [Branch::Shared, Branch::BranchA, Branch::Appendix]
            .into_iter()
            .collect();
        assert!(BranchLabel::Single(Branch::BranchA).is_consistent_with(&admissible));
        assert!(BranchLabel::Unknown.is_consistent_with(&admissible));
        assert!(!BranchLabel::Both.is_consistent_with(&admissible));
    }

    #[test]
    fn test_branch_label_string_form() {
        let label: BranchLabel = serde_json::from_str("\"both\"").unwrap();
        assert_eq!(label, BranchLabel::Both);
        let label: BranchLabel = serde_json::from_str("\"branch_B\"").unwrap();
        assert_eq!(label, BranchLabel::Single(Branch::BranchB));
        assert_eq!(
            serde_json::to_string(&BranchLabel::Unknown).unwrap(),
            "\"unknown\""
        );
        assert!(serde_json::from_str::<BranchLabel>("\"sideways\"").is_err());
    }

    #[test]
    fn test_branch_label_for_admissible() {
        let explicit: BranchSet = [Branch::Shared, Branch::BranchB, Branch::Appendix]
            .into_iter()
            .collect();
        assert_eq!(
            BranchLabel::for_admissible(&explicit),
            BranchLabel::Single(Branch::BranchB)
        );
        assert_eq!(
            BranchLabel::for_admissible(&Branch::all()),
            BranchLabel::Unknown
        );
    }

    #[test]
    fn test_locator_display() {
        let loc = Locator {
            page: 12,
            section: Some("Mid 2027".to_string()),
        };
        assert_eq!(loc.to_string(), "p.12 (Mid 2027)");
    }
}
