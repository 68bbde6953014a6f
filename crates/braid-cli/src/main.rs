//! # braid CLI
//!
//! Command-line interface for the Braid branch-aware question answering engine.
//!
//! This binary provides human-friendly access to `braid-core` functionality.
//! Run `braid --help` for usage information.

mod cli;
pub mod ui;

use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run()
}
