//! Shared test utilities for braid-cli integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// Get a Command for the braid binary.
///
/// Color is disabled and `RUST_LOG` cleared so output is stable.
#[allow(deprecated)]
pub fn braid_cmd() -> Command {
    let mut cmd = Command::cargo_bin("braid").expect("braid binary should exist");
    cmd.env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("BRAID_CONFIG")
        .env_remove("BRAID_PASSAGES")
        .env_remove("BRAID_VERBOSE")
        .env_remove("BRAID_QUIET");
    cmd
}

/// The passage fixture shipped with the tests.
pub fn fixture_passages() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("passages.jsonl")
}

/// Write a config file into `dir` and return its path.
pub fn write_config(dir: &TempDir, yaml: &str) -> PathBuf {
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, yaml).expect("write config");
    path
}

/// A config pointing at a port nothing listens on.
pub fn unreachable_model_config(dir: &TempDir) -> PathBuf {
    write_config(
        dir,
        r#"
model:
  endpoint: http://127.0.0.1:9
  requestTimeoutSecs: 2
timeouts:
  embeddingRetryBackoffMs: 10
"#,
    )
}
