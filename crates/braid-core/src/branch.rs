//! Branch resolution: query + hint → admissible branch set.
//!
//! `shared` and `appendix` are always admissible. An explicit hint `X`
//! yields `{shared, X, appendix}`. With `auto`, an ordered trigger-phrase
//! table is matched against the query (case-insensitive, whole words); the
//! first matching rule wins. No match admits every branch and flags the
//! resolution as ambiguous.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::BraidError;
use crate::types::{Branch, BranchLabel, BranchSet};

/// Hint value that requests trigger-phrase detection.
pub const AUTO_HINT: &str = "auto";

/// One row of the trigger table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchRule {
    /// Branch selected when this rule matches.
    pub branch: Branch,
    /// Alternative names accepted as explicit hints.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Phrases that select this branch in `auto` mode.
    #[serde(default)]
    pub triggers: Vec<String>,
}

/// The default trigger table.
pub fn default_branch_rules() -> Vec<BranchRule> {
    fn rule(branch: Branch, aliases: &[&str], triggers: &[&str]) -> BranchRule {
        BranchRule {
            branch,
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
            triggers: triggers.iter().map(|s| s.to_string()).collect(),
        }
    }

    vec![
        rule(
            Branch::BranchA,
            &["race"],
            &["race ending", "race scenario", "race branch"],
        ),
        rule(
            Branch::BranchB,
            &["slowdown"],
            &["slowdown ending", "slowdown scenario", "slowdown branch"],
        ),
        rule(
            Branch::Shared,
            &[],
            &[
                "shared timeline",
                "before the branch",
                "2025",
                "2026",
                "early 2027",
                "mid 2027",
            ],
        ),
    ]
}

/// Outcome of branch resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchResolution {
    /// Branches whose passages may be used.
    pub admissible: BranchSet,
    /// The branch chosen by hint or trigger, if any.
    pub selected: Option<Branch>,
    /// Set when `auto` matched nothing and every branch is admissible.
    pub ambiguous: bool,
    /// Set when the caller named the branch.
    pub explicit: bool,
}

impl BranchResolution {
    fn selecting(branch: Branch, explicit: bool) -> Self {
        let mut admissible: BranchSet = [Branch::Shared, Branch::Appendix].into_iter().collect();
        admissible.insert(branch);
        Self {
            admissible,
            selected: Some(branch),
            ambiguous: false,
            explicit,
        }
    }

    fn ambiguous() -> Self {
        Self {
            admissible: Branch::all(),
            selected: None,
            ambiguous: true,
            explicit: false,
        }
    }

    /// Whether passages from `branch` may be used.
    pub fn admits(&self, branch: Branch) -> bool {
        self.admissible.contains(&branch)
    }

    /// Label describing the resolved scenario.
    pub fn label(&self) -> BranchLabel {
        BranchLabel::for_admissible(&self.admissible)
    }
}

struct CompiledRule {
    branch: Branch,
    aliases: Vec<String>,
    pattern: Option<Regex>,
}

/// Maps queries and hints to admissible branch sets.
///
/// Built once from the rule table; read-only afterwards.
pub struct BranchResolver {
    rules: Vec<CompiledRule>,
}

impl BranchResolver {
    /// Compile a rule table.
    ///
    /// # Errors
    ///
    /// Returns [`BraidError::InvalidConfiguration`] if an alias shadows a
    /// branch label or `auto`, or two rules claim the same alias.
    pub fn new(rules: &[BranchRule]) -> Result<Self, BraidError> {
        let mut compiled: Vec<CompiledRule> = Vec::with_capacity(rules.len());

        for rule in rules {
            let mut aliases = Vec::with_capacity(rule.aliases.len());
            for alias in &rule.aliases {
                let alias = alias.trim().to_lowercase();
                let reserved = [AUTO_HINT, "both", "unknown"].contains(&alias.as_str());
                if reserved || Branch::from_label(&alias).is_some() {
                    return Err(BraidError::InvalidConfiguration {
                        message: format!("branch alias '{}' shadows a reserved hint", alias),
                        hint: "Remove the alias from the branches table".to_string(),
                    });
                }
                let taken_by = compiled
                    .iter()
                    .find(|c| c.branch != rule.branch && c.aliases.contains(&alias));
                if let Some(other) = taken_by {
                    return Err(BraidError::InvalidConfiguration {
                        message: format!(
                            "branch alias '{}' is claimed by both {} and {}",
                            alias, other.branch, rule.branch
                        ),
                        hint: "Give each alias to exactly one branch".to_string(),
                    });
                }
                aliases.push(alias);
            }

            compiled.push(CompiledRule {
                branch: rule.branch,
                aliases,
                pattern: trigger_pattern(&rule.triggers)?,
            });
        }

        Ok(Self { rules: compiled })
    }

    /// Resolve the admissible set for a query.
    ///
    /// `hint` may be `None`, `auto`, a branch label or an alias (any case).
    ///
    /// # Errors
    ///
    /// Returns [`BraidError::InvalidBranchHint`] for an unknown hint.
    pub fn resolve(&self, query: &str, hint: Option<&str>) -> Result<BranchResolution, BraidError> {
        let hint = hint.map(str::trim).filter(|h| !h.is_empty());

        match hint {
            None => Ok(self.detect(query)),
            Some(h) if h.eq_ignore_ascii_case(AUTO_HINT) => Ok(self.detect(query)),
            Some(h) => {
                let branch = self.parse_hint(h).ok_or_else(|| BraidError::InvalidBranchHint {
                    hint: h.to_string(),
                    valid: self.valid_hints().join(", "),
                })?;
                debug!("Explicit branch hint '{}' -> {}", h, branch);
                Ok(BranchResolution::selecting(branch, true))
            }
        }
    }

    fn parse_hint(&self, hint: &str) -> Option<Branch> {
        if let Some(branch) = Branch::from_label(hint) {
            return Some(branch);
        }
        let lower = hint.to_lowercase();
        self.rules
            .iter()
            .find(|r| r.aliases.contains(&lower))
            .map(|r| r.branch)
    }

    fn detect(&self, query: &str) -> BranchResolution {
        for rule in &self.rules {
            let Some(pattern) = &rule.pattern else {
                continue;
            };
            if let Some(m) = pattern.find(query) {
                debug!("Trigger '{}' selected {}", m.as_str(), rule.branch);
                return BranchResolution::selecting(rule.branch, false);
            }
        }
        debug!("No branch trigger matched; all branches admissible");
        BranchResolution::ambiguous()
    }

    /// Parse a declared answer branch: a label, an alias, `both` or `unknown`.
    pub fn parse_label(&self, value: &str) -> Option<BranchLabel> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("both") {
            return Some(BranchLabel::Both);
        }
        if value.eq_ignore_ascii_case("unknown") {
            return Some(BranchLabel::Unknown);
        }
        self.parse_hint(value).map(BranchLabel::Single)
    }

    /// Every accepted hint: `auto`, the branch labels, then aliases.
    pub fn valid_hints(&self) -> Vec<String> {
        let mut hints = vec![AUTO_HINT.to_string()];
        hints.extend(Branch::ALL.iter().map(|b| b.as_str().to_string()));
        for rule in &self.rules {
            hints.extend(rule.aliases.iter().cloned());
        }
        hints
    }
}

/// `(?i)\b(?:p1|p2)\b`, with runs of whitespace inside a phrase matching any whitespace.
fn trigger_pattern(triggers: &[String]) -> Result<Option<Regex>, BraidError> {
    let alternatives: Vec<String> = triggers
        .iter()
        .map(|t| t.split_whitespace().map(regex::escape).collect::<Vec<_>>())
        .filter(|words| !words.is_empty())
        .map(|words| words.join(r"\s+"))
        .collect();

    if alternatives.is_empty() {
        return Ok(None);
    }

    let source = format!(r"(?i)\b(?:{})\b", alternatives.join("|"));
    Regex::new(&source)
        .map(Some)
        .map_err(|e| BraidError::InvalidConfiguration {
            message: format!("branch trigger pattern failed to compile: {}", e),
            hint: "Check the triggers in the branches table".to_string(),
        })
}
