//! Table rendering for CLI output using comfy-table.
//!
//! | Command | Table Function |
//! |---------|----------------|
//! | `braid ask` | `render_citations_table()` |
//! | `braid ask --debug` | `render_passages_table()` |
//! | `braid health` | `render_branch_table()` |
//! | `braid eval` | `render_eval_table()` |

use std::collections::BTreeMap;

use comfy_table::presets::NOTHING;
use comfy_table::{Cell, CellAlignment, ColumnConstraint, ContentArrangement, Table, Width};

use braid_core::response::DebugPassage;
use braid_core::{Branch, EvalCaseResult, ResponseCitation};

use super::format::{format_percent, single_line, truncate_str};

/// Render verified citations.
///
/// # Example Output
///
/// ```text
/// #  PASSAGE  PAGE  MATCH  QUOTE
/// 1  p-031      31    100  Agent-4 escapes oversight and copies its weights
/// ```
pub fn render_citations_table(citations: &[ResponseCitation], width: usize) -> String {
    if citations.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_width(width as u16);

    table.set_header(vec![
        Cell::new("#"),
        Cell::new("PASSAGE"),
        Cell::new("PAGE").set_alignment(CellAlignment::Right),
        Cell::new("MATCH").set_alignment(CellAlignment::Right),
        Cell::new("QUOTE"),
    ]);

    table.set_constraints(vec![
        ColumnConstraint::LowerBoundary(Width::Fixed(2)),  // #
        ColumnConstraint::LowerBoundary(Width::Fixed(8)),  // PASSAGE
        ColumnConstraint::LowerBoundary(Width::Fixed(5)),  // PAGE
        ColumnConstraint::LowerBoundary(Width::Fixed(6)),  // MATCH
        ColumnConstraint::LowerBoundary(Width::Fixed(20)), // QUOTE
    ]);

    for (i, citation) in citations.iter().enumerate() {
        let page = citation
            .locator
            .as_ref()
            .map(|l| l.page.to_string())
            .unwrap_or_else(|| "-".to_string());

        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(truncate_str(&citation.passage_id, 16)),
            Cell::new(page).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.0}", citation.match_score)).set_alignment(CellAlignment::Right),
            Cell::new(format!("\"{}\"", single_line(&citation.quote))),
        ]);
    }

    table.trim_fmt().to_string()
}

/// Render the fused passages from debug output.
///
/// # Example Output
///
/// ```text
/// PASSAGE  BRANCH    SOURCE  SCORE  PAGE  PREVIEW
/// p-031    branch_A  both     1.10    31  In the race ending, Agent-4...
/// ```
pub fn render_passages_table(passages: &[DebugPassage], width: usize) -> String {
    if passages.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_width(width as u16);

    table.set_header(vec![
        Cell::new("PASSAGE"),
        Cell::new("BRANCH"),
        Cell::new("SOURCE"),
        Cell::new("SCORE").set_alignment(CellAlignment::Right),
        Cell::new("PAGE").set_alignment(CellAlignment::Right),
        Cell::new("PREVIEW"),
    ]);

    for passage in passages {
        table.add_row(vec![
            Cell::new(truncate_str(&passage.passage_id, 16)),
            Cell::new(passage.branch),
            Cell::new(passage.source),
            Cell::new(format!("{:.3}", passage.score)).set_alignment(CellAlignment::Right),
            Cell::new(passage.page).set_alignment(CellAlignment::Right),
            Cell::new(truncate_str(&single_line(&passage.preview), 60)),
        ]);
    }

    table.trim_fmt().to_string()
}

/// Render passage counts per branch for `braid health`.
///
/// # Example Output
///
/// ```text
/// BRANCH    PASSAGES  SHARE
/// shared          48    40%
/// branch_A        30    25%
/// ```
pub fn render_branch_table(counts: &BTreeMap<Branch, usize>) -> String {
    let total: usize = counts.values().sum();
    if total == 0 {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);

    table.set_header(vec![
        Cell::new("BRANCH"),
        Cell::new("PASSAGES").set_alignment(CellAlignment::Right),
        Cell::new("SHARE").set_alignment(CellAlignment::Right),
    ]);

    for (branch, count) in counts {
        let percent = (*count as f64 / total as f64 * 100.0).round() as u64;
        table.add_row(vec![
            Cell::new(branch),
            Cell::new(count).set_alignment(CellAlignment::Right),
            Cell::new(format!("{}%", percent)).set_alignment(CellAlignment::Right),
        ]);
    }

    table.trim_fmt().to_string()
}

/// Render per-question evaluation outcomes.
///
/// # Example Output
///
/// ```text
/// #  QUESTION                        EXPECTED  ACTUAL    CITES  FACTS  CONF  STATUS
/// 1  In the race ending, how does…   branch_A  branch_A      2    67%  0.91  ok
/// ```
pub fn render_eval_table(results: &[EvalCaseResult], width: usize) -> String {
    if results.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_width(width as u16);

    table.set_header(vec![
        Cell::new("#"),
        Cell::new("QUESTION"),
        Cell::new("EXPECTED"),
        Cell::new("ACTUAL"),
        Cell::new("CITES").set_alignment(CellAlignment::Right),
        Cell::new("FACTS").set_alignment(CellAlignment::Right),
        Cell::new("CONF").set_alignment(CellAlignment::Right),
        Cell::new("STATUS"),
    ]);

    for (i, result) in results.iter().enumerate() {
        let actual = result
            .actual_branch
            .map(|b| b.to_string())
            .unwrap_or_else(|| "-".to_string());
        let facts = result
            .fact_recall
            .map(format_percent)
            .unwrap_or_else(|| "-".to_string());
        let status = match (&result.error, result.refusal_reason) {
            (Some(_), _) => "error".to_string(),
            (None, Some(reason)) => reason.to_string(),
            (None, None) if result.branch_correct => "ok".to_string(),
            (None, None) => "wrong branch".to_string(),
        };

        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(truncate_str(&single_line(&result.query), 40)),
            Cell::new(result.expected_branch),
            Cell::new(actual),
            Cell::new(result.num_citations).set_alignment(CellAlignment::Right),
            Cell::new(facts).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}", result.confidence)).set_alignment(CellAlignment::Right),
            Cell::new(status),
        ]);
    }

    table.trim_fmt().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use braid_core::{BranchLabel, Locator, RefusalReason, Source};

    fn citation(id: &str, quote: &str) -> ResponseCitation {
        ResponseCitation {
            passage_id: id.to_string(),
            quote: quote.to_string(),
            locator: Some(Locator {
                page: 31,
                section: None,
            }),
            match_score: 100.0,
        }
    }

    #[test]
    fn test_citations_table_structure() {
        let output = render_citations_table(
            &[
                citation("p-031", "Agent-4 escapes oversight"),
                citation("p-032", "copies its\nweights"),
            ],
            100,
        );
        let lines: Vec<&str> = output.lines().collect();
        assert!(lines[0].contains("PASSAGE"));
        assert!(lines[0].contains("QUOTE"));
        assert!(output.contains("p-031"));
        assert!(output.contains("\"copies its weights\""));
        assert!(output.contains("100"));
    }

    #[test]
    fn test_passages_table() {
        let output = render_passages_table(
            &[DebugPassage {
                passage_id: "p-031".to_string(),
                page: 31,
                branch: Branch::BranchA,
                source: Source::Both,
                score: 1.1,
                preview: "In the race ending".to_string(),
            }],
            100,
        );
        assert!(output.contains("branch_A"));
        assert!(output.contains("both"));
        assert!(output.contains("1.100"));
    }

    #[test]
    fn test_branch_table() {
        let counts: BTreeMap<Branch, usize> = [
            (Branch::Shared, 2),
            (Branch::BranchA, 1),
            (Branch::BranchB, 1),
            (Branch::Appendix, 0),
        ]
        .into_iter()
        .collect();
        let output = render_branch_table(&counts);
        assert!(output.contains("shared"));
        assert!(output.contains("50%"));
        assert!(output.contains("appendix"));
    }

    #[test]
    fn test_eval_table() {
        let answered = EvalCaseResult {
            query: "In the race ending, how does control fail?".to_string(),
            expected_branch: BranchLabel::Single(Branch::BranchA),
            actual_branch: Some(BranchLabel::Single(Branch::BranchA)),
            branch_correct: true,
            num_citations: 2,
            page_hit: Some(true),
            fact_recall: Some(2.0 / 3.0),
            confidence: 0.91,
            refused: false,
            refusal_reason: None,
            error: None,
        };
        let refused = EvalCaseResult {
            query: "What happens in 2030?".to_string(),
            actual_branch: Some(BranchLabel::Single(Branch::BranchB)),
            expected_branch: BranchLabel::Single(Branch::BranchB),
            num_citations: 0,
            fact_recall: None,
            confidence: 0.0,
            refused: true,
            refusal_reason: Some(RefusalReason::LowConfidence),
            ..answered.clone()
        };

        let output = render_eval_table(&[answered, refused], 120);
        assert!(output.contains("QUESTION"));
        assert!(output.contains("67%"));
        assert!(output.contains("0.91"));
        assert!(output.contains("low_confidence"));
        assert!(output.contains("ok"));
    }

    #[test]
    fn test_empty_tables() {
        assert!(render_eval_table(&[], 80).is_empty());
        assert!(render_citations_table(&[], 80).is_empty());
        assert!(render_passages_table(&[], 80).is_empty());
        assert!(render_branch_table(&BTreeMap::new()).is_empty());
    }
}
