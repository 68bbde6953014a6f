//! # CLI UI Module
//!
//! A consistent styling and formatting layer for Braid CLI output.
//!
//! - Readable without colors (respects `NO_COLOR`)
//! - Machine-parseable with `--json`
//!
//! ## Module Structure
//!
//! - `color`: Color mode detection and terminal width
//! - `style`: Message types, prefixes, and styling functions
//! - `format`: Truncation, wrapping and number formatting
//! - `table`: Table rendering with comfy-table

pub mod color;
pub mod format;
pub mod style;
pub mod table;

pub use color::ColorMode;
pub use style::{MessageType, Style};
