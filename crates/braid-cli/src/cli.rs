//! CLI definition and command dispatch for Braid.
//!
//! ## Configuration Precedence
//!
//! 1. CLI flags (`--config`, `--passages`, `--verbose`)
//! 2. Environment variables (`BRAID_CONFIG`, `BRAID_PASSAGES`, `BRAID_VERBOSE`)
//! 3. Config file (`~/.braid/config.yaml` or the path from `--config`)
//! 4. Built-in defaults
//!
//! ## Exit Codes
//!
//! - `0`: answered or refused (a refusal is a normal outcome)
//! - `1`: service or setup error (retrieval down, malformed draft, bad config)
//! - `2`: caller error (unknown branch hint, empty question)

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::ui::color::text_width;
use crate::ui::{format, table, ColorMode, MessageType, Style};

use braid_core::{
    evaluate, AskOptions, BraidConfig, BraidEngine, BraidError, EvalReport, EvalSet, Query,
    Response, AUTO_HINT,
};

// ============================================================================
// CLI Definition
// ============================================================================

/// Exit code for caller errors.
const EXIT_CALLER_ERROR: u8 = 2;

/// Default passage file name inside `~/.braid`.
const DEFAULT_PASSAGES_FILE: &str = "passages.jsonl";

/// Braid – branch-aware question answering with verified citations
#[derive(Parser, Debug)]
#[command(name = "braid")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, env = "BRAID_VERBOSE")]
    pub verbose: bool,

    /// Only print results and errors
    #[arg(short, long, global = true, env = "BRAID_QUIET", conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to configuration file (default: ~/.braid/config.yaml)
    #[arg(long, global = true, env = "BRAID_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the passage file (default: ~/.braid/passages.jsonl)
    #[arg(long, global = true, env = "BRAID_PASSAGES")]
    pub passages: Option<PathBuf>,

    /// Color output mode
    #[arg(long, global = true, env = "BRAID_COLOR", value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Answer a question with verified citations
    #[command(after_help = r#"EXAMPLES:
    # Let Braid detect the branch from the question
    braid ask "What happens to Agent-4 in the race ending?"

    # Name the branch explicitly (label or alias)
    braid ask "Who sits on the oversight committee?" --branch slowdown

    # Show the fused passages behind the answer
    braid ask "When does the branch point happen?" --debug

    # Output as JSON for scripting
    braid ask "What is Agent-1?" --json | jq '.confidence_score'
"#)]
    Ask {
        /// The question to ask
        question: String,

        /// Branch hint: auto, a branch label (shared, branch_A, branch_B, appendix) or an alias
        #[arg(short, long, default_value = AUTO_HINT)]
        branch: String,

        /// Number of fused passages handed to drafting (default: retrieval.topK)
        #[arg(long)]
        top_k: Option<usize>,

        /// Include retrieval metadata
        #[arg(long)]
        debug: bool,

        /// Output in JSON format
        #[arg(long, conflicts_with = "pretty")]
        json: bool,

        /// Output in pretty-printed JSON format
        #[arg(long)]
        pretty: bool,
    },

    /// Check the loaded passages and indices
    #[command(after_help = r#"EXAMPLES:
    braid health
    braid health --json
"#)]
    Health {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Score answers against a labelled question set
    #[command(after_help = r#"EXAMPLES:
    # Run the built-in question set
    braid eval

    # Run your own set and keep the full report
    braid eval questions.yaml --output eval_results.json

QUESTION SET FORMAT (YAML):
    questions:
      - query: "In the race ending, how does control fail?"
        expectedBranch: race        # label, alias, both or unknown
        expectedPage: 23            # optional
        keyFacts: ["Agent-4", "Agent-5"]
        branchHint: auto            # optional
"#)]
    Eval {
        /// Question set file (default: the built-in set)
        questions: Option<PathBuf>,

        /// Number of fused passages handed to drafting (default: retrieval.topK)
        #[arg(long)]
        top_k: Option<usize>,

        /// Write the full JSON report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

// ============================================================================
// Entry point
// ============================================================================

/// Parse arguments, build the engine and dispatch.
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(&cli);
    let style = Style::new(cli.color);

    let engine = match build_engine(&cli) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!(
                "{}",
                style.error_with_context(
                    "Failed to initialize Braid engine",
                    Some(&e.to_string()),
                    Some(&setup_hint(&e, &cli)),
                )
            );
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Ask {
            question,
            branch,
            top_k,
            debug,
            json,
            pretty,
        } => handle_ask(&style, &engine, question, branch, top_k, debug, json, pretty, cli.quiet),
        Command::Health { json } => handle_health(&style, &engine, json),
        Command::Eval {
            questions,
            top_k,
            output,
            json,
        } => handle_eval(&style, &engine, questions, top_k, output, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let hint = error_hint(&e);
            eprintln!(
                "{}",
                style.error_with_context(&e.to_string(), None, hint.as_deref())
            );
            exit_code_for(&e)
        }
    }
}

/// `warn` by default, `debug` with `--verbose`, `error` with `--quiet`.
/// `RUST_LOG` overrides all three.
fn init_tracing(cli: &Cli) {
    let log_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "braid_core={lvl},braid_model={lvl},braid_cli={lvl}",
            lvl = log_level
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_engine(cli: &Cli) -> Result<BraidEngine, BraidError> {
    let config = match &cli.config {
        Some(path) => BraidConfig::from_path(path)?,
        None => BraidConfig::load_default()?,
    };
    let passages = resolve_passages_path(cli)?;
    debug!("Loading passages from {}", passages.display());
    BraidEngine::from_config(config, &passages)
}

fn resolve_passages_path(cli: &Cli) -> Result<PathBuf, BraidError> {
    if let Some(path) = &cli.passages {
        return Ok(path.clone());
    }
    BraidConfig::default_dir()
        .map(|dir| dir.join(DEFAULT_PASSAGES_FILE))
        .ok_or_else(|| BraidError::InvalidConfiguration {
            message: "cannot locate the home directory".to_string(),
            hint: "Pass --passages or set BRAID_PASSAGES".to_string(),
        })
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")
}

fn exit_code_for(err: &BraidError) -> ExitCode {
    if err.is_caller_error() {
        ExitCode::from(EXIT_CALLER_ERROR)
    } else {
        ExitCode::FAILURE
    }
}

fn setup_hint(err: &BraidError, cli: &Cli) -> String {
    match err {
        BraidError::PassageStoreIo { .. } => {
            "Pass --passages <FILE> or set BRAID_PASSAGES to the ingested passage file".to_string()
        }
        BraidError::PassageStoreParse { .. } | BraidError::PassageStoreInvalid(_) => {
            "Re-run ingestion; every line must be one passage with a known branch".to_string()
        }
        _ => match &cli.config {
            Some(path) => format!("Check your config at {}", path.display()),
            None => "Check your config at ~/.braid/config.yaml".to_string(),
        },
    }
}

fn error_hint(err: &BraidError) -> Option<String> {
    match err {
        BraidError::InvalidBranchHint { .. } => {
            Some("Use --branch auto to let Braid detect the branch".to_string())
        }
        BraidError::RetrievalUnavailable { .. } | BraidError::DraftingUnavailable { .. } => Some(
            "Check that the model server in model.endpoint is running (e.g. `ollama serve`)"
                .to_string(),
        ),
        BraidError::MalformedDraft { .. } => Some(
            "The drafting model did not return the expected JSON; try a stronger model.draftingModel"
                .to_string(),
        ),
        _ => None,
    }
}

// ============================================================================
// Command handlers
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn handle_ask(
    style: &Style,
    engine: &BraidEngine,
    question: String,
    branch: String,
    top_k: Option<usize>,
    debug: bool,
    json: bool,
    pretty: bool,
    quiet: bool,
) -> Result<(), BraidError> {
    let query = Query::new(question).with_branch_hint(branch);
    let mut options = AskOptions::new().with_debug(debug);
    if let Some(k) = top_k {
        options = options.with_top_k(k);
    }

    let rt = runtime()?;
    let response = rt.block_on(engine.ask(&query, &options))?;

    if json || pretty {
        let output = if pretty {
            serde_json::to_string_pretty(&response)?
        } else {
            serde_json::to_string(&response)?
        };
        println!("{}", output);
    } else {
        print_response(style, &response, quiet);
    }
    Ok(())
}

fn print_response(style: &Style, response: &Response, quiet: bool) {
    let width = text_width();

    if let Some(reason) = response.refusal_reason {
        println!("{}", style.refusal(reason));
        println!();
    }

    println!("{}", style.section("ANSWER"));
    println!();
    for line in format::wrap_text(&response.answer_text, width.saturating_sub(2)) {
        println!("  {}", line);
    }
    println!();
    println!(
        "  {}   {}",
        style.key_value("Branch", &style.branch(&response.branch_label)),
        style.key_value(
            "Confidence",
            &format!(
                "{} ({})",
                style.score(response.confidence_score),
                format::format_percent(response.confidence_score)
            )
        )
    );

    if !response.citations.is_empty() {
        println!();
        println!("{}", style.section("CITATIONS"));
        println!();
        println!("{}", table::render_citations_table(&response.citations, width));
    }

    if response.degraded_mode {
        println!();
        println!(
            "{}",
            style.message(
                MessageType::Warn,
                "Degraded mode: one retrieval signal was unavailable"
            )
        );
    }

    if !quiet && !response.assumptions_or_limits.is_empty() {
        println!();
        println!("{}", style.section("NOTES"));
        println!();
        for note in &response.assumptions_or_limits {
            println!("{}", style.list_item(note));
        }
    }

    if !quiet && !response.followup_questions.is_empty() {
        println!();
        println!("{}", style.section("FOLLOW-UP"));
        println!();
        for question in &response.followup_questions {
            println!("{}", style.list_item(question));
        }
    }

    if let Some(debug) = &response.retrieval {
        println!();
        println!("{}", style.section("RETRIEVAL"));
        println!();
        println!(
            "  {}   {}",
            style.key_value("Dense", &debug.dense_candidates.to_string()),
            style.key_value("Sparse", &debug.sparse_candidates.to_string())
        );
        if !debug.unavailable_signals.is_empty() {
            println!(
                "  {}",
                style.key_value("Unavailable", &debug.unavailable_signals.join(", "))
            );
        }
        println!();
        println!("{}", table::render_passages_table(&debug.top_passages, width));
        println!();
        println!(
            "  {}",
            style.key_value("Query", &response.query_id.to_string())
        );
        println!(
            "  {}",
            style.key_value("Answered", &format::format_timestamp(response.answered_at))
        );
    }
}

fn handle_health(style: &Style, engine: &BraidEngine, json: bool) -> Result<(), BraidError> {
    let health = engine.health();

    if json {
        println!("{}", serde_json::to_string_pretty(&health)?);
        return Ok(());
    }

    let status = if health.is_ok() {
        style.message(MessageType::Ok, "Engine ready")
    } else {
        style.message(MessageType::Warn, "Indices do not cover every passage")
    };
    println!("{}", status);
    println!();
    println!("{}", style.section("PASSAGES"));
    println!();
    println!("  {}", style.key_value("Total", &health.passages.to_string()));
    println!(
        "  {}",
        style.key_value("Embedding dimension", &health.embedding_dimension.to_string())
    );
    println!();
    println!("{}", table::render_branch_table(&health.branch_counts));
    println!();
    println!("{}", style.section("LEXICAL INDEX"));
    println!();
    println!(
        "  {}",
        style.key_value("Documents", &health.lexical.num_documents.to_string())
    );
    println!(
        "  {}",
        style.key_value("Vocabulary", &health.lexical.vocabulary_size.to_string())
    );
    println!(
        "  {}",
        style.key_value(
            "Avg length",
            &format!("{:.1} tokens", health.lexical.avg_doc_length)
        )
    );
    println!();
    println!("{}", style.section("MODELS"));
    println!();
    println!("  {}", style.key_value("Embedding", &health.embedding_model));
    println!("  {}", style.key_value("Drafting", &health.drafting_model));
    Ok(())
}

fn handle_eval(
    style: &Style,
    engine: &BraidEngine,
    questions: Option<PathBuf>,
    top_k: Option<usize>,
    output: Option<PathBuf>,
    json: bool,
) -> Result<(), BraidError> {
    let set = match &questions {
        Some(path) => EvalSet::from_path(path)?,
        None => EvalSet::builtin(),
    };
    debug!("Evaluating {} questions", set.questions.len());

    let mut options = AskOptions::new();
    if let Some(k) = top_k {
        options = options.with_top_k(k);
    }

    let rt = runtime()?;
    let report = rt.block_on(evaluate(engine, &set, &options))?;

    if let Some(path) = &output {
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_eval_report(style, &report, output.as_deref());
    }
    Ok(())
}

fn print_eval_report(style: &Style, report: &EvalReport, output: Option<&std::path::Path>) {
    let width = text_width();
    let optional = |value: Option<f32>| {
        value
            .map(format::format_percent)
            .unwrap_or_else(|| "-".to_string())
    };

    println!("{}", style.section("QUESTIONS"));
    println!();
    println!("{}", table::render_eval_table(&report.results, width));
    println!();
    println!("{}", style.section("SUMMARY"));
    println!();
    println!(
        "  {}",
        style.key_value("Branch accuracy", &format::format_percent(report.branch_accuracy))
    );
    println!(
        "  {}",
        style.key_value("Citation coverage", &format::format_percent(report.citation_coverage))
    );
    println!(
        "  {}",
        style.key_value("Key fact recall", &optional(report.key_fact_recall))
    );
    println!("  {}", style.key_value("Page accuracy", &optional(report.page_accuracy)));
    println!(
        "  {}",
        style.key_value("Avg confidence", &style.score(report.avg_confidence))
    );
    println!(
        "  {}",
        style.key_value(
            "Refused / failed",
            &format!("{} / {} of {}", report.refusals, report.errors, report.total_questions)
        )
    );

    if let Some(path) = output {
        println!();
        println!(
            "{}",
            style.message(
                MessageType::Info,
                &format!("Report written to {}", path.display())
            )
        );
    }
}
