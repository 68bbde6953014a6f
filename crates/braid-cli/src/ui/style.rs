//! Message styling for CLI output.
//!
//! | Prefix | Meaning | Color |
//! |--------|---------|-------|
//! | `[ok]` | Success | Green |
//! | `[err]` | Error | Red |
//! | `[warn]` | Warning | Yellow |
//! | `[info]` | Information | Blue |
//! | `[refused]` | Abstained for lack of evidence | Magenta |
//!
//! Without colors every helper returns the plain text, so output stays
//! greppable under `NO_COLOR` and in pipes.

use owo_colors::OwoColorize;

use braid_core::{Branch, BranchLabel, RefusalReason};

use super::color::ColorMode;

/// Message severity/type for CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Ok,
    Err,
    Warn,
    Info,
    /// The engine declined to answer.
    Refused,
}

impl MessageType {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Ok => "[ok]",
            Self::Err => "[err]",
            Self::Warn => "[warn]",
            Self::Info => "[info]",
            Self::Refused => "[refused]",
        }
    }
}

/// Styling for one CLI run. Color support is decided once, at construction.
#[derive(Debug, Clone, Copy)]
pub struct Style {
    colors: bool,
}

impl Style {
    pub fn new(color_mode: ColorMode) -> Self {
        Self {
            colors: color_mode.is_enabled(),
        }
    }

    /// Apply `paint` only when colors are on.
    fn paint(&self, text: &str, paint: impl FnOnce(&str) -> String) -> String {
        if self.colors {
            paint(text)
        } else {
            text.to_string()
        }
    }

    /// `[ok] Engine ready`
    pub fn message(&self, msg_type: MessageType, text: &str) -> String {
        let prefix = self.paint(msg_type.prefix(), |p| match msg_type {
            MessageType::Ok => p.green().to_string(),
            MessageType::Err => p.red().to_string(),
            MessageType::Warn => p.yellow().to_string(),
            MessageType::Info => p.blue().to_string(),
            MessageType::Refused => p.magenta().to_string(),
        });
        format!("{} {}", prefix, text)
    }

    pub fn section(&self, title: &str) -> String {
        self.paint(title, |t| t.bold().to_string())
    }

    /// An `[err]` line followed by indented `Cause:` and `Hint:` lines.
    pub fn error_with_context(&self, msg: &str, cause: Option<&str>, hint: Option<&str>) -> String {
        let mut output = self.message(MessageType::Err, msg);
        for (label, text) in [("Cause", cause), ("Hint", hint)] {
            if let Some(text) = text {
                output.push_str(&format!("\n      {}: {}", label, text));
            }
        }
        output
    }

    pub fn list_item(&self, text: &str) -> String {
        format!("  {} {}", self.paint("-", |d| d.dimmed().to_string()), text)
    }

    pub fn key_value(&self, key: &str, value: &str) -> String {
        format!("{}: {}", self.paint(key, |k| k.dimmed().to_string()), value)
    }

    /// Branch label; each divergent branch gets its own color.
    pub fn branch(&self, label: &BranchLabel) -> String {
        self.paint(&label.to_string(), |text| match label {
            BranchLabel::Single(Branch::BranchA) => text.red().to_string(),
            BranchLabel::Single(Branch::BranchB) => text.green().to_string(),
            BranchLabel::Single(_) => text.cyan().to_string(),
            BranchLabel::Both => text.yellow().to_string(),
            BranchLabel::Unknown => text.dimmed().to_string(),
        })
    }

    /// Two-decimal score: green from 0.8, yellow from 0.5, red below.
    pub fn score(&self, value: f32) -> String {
        self.paint(&format!("{:.2}", value), |text| {
            if value >= 0.8 {
                text.green().to_string()
            } else if value >= 0.5 {
                text.yellow().to_string()
            } else {
                text.red().to_string()
            }
        })
    }

    /// `[refused] low_confidence: citation confidence is below the minimum`
    pub fn refusal(&self, reason: RefusalReason) -> String {
        self.message(
            MessageType::Refused,
            &format!("{}: {}", reason, reason.describe()),
        )
    }
}
