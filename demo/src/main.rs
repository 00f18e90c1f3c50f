//! Symptom Triage Reference Runtime Demo CLI
//!
//! Runs the reference scenarios against scripted model replies, or a single
//! live quick scan against an OpenAI-compatible endpoint.
//!
//! Usage:
//!   cargo run -p triage-demo -- run-all
//!   cargo run -p triage-demo -- deep-dive
//!   cargo run -p triage-demo -- --config demo/triage.toml tiers
//!   cargo run -p triage-demo -- scan head '{"symptoms": "throbbing pain"}'

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

use triage_audit::InMemoryAuditWriter;
use triage_config::EngineConfig;
use triage_contracts::{
    context::AnalysisRequest,
    error::{TriageError, TriageResult},
};
use triage_core::SessionEngine;
use triage_llm::HttpLlmProvider;
use triage_ref::scenarios::{ask_more, deep_dive, quick_scan, tier_progression};
use triage_store::{InMemoryRecordSource, InMemorySessionStore};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Symptom triage runtime demo.
#[derive(Parser)]
#[command(
    name = "triage-demo",
    about = "Symptom triage reference runtime demo",
    long_about = "Runs the triage reference scenarios showing tolerant model-output\n\
                  extraction, the session lifecycle, tiered re-analysis, and audit chain integrity."
)]
struct Cli {
    /// Engine configuration TOML. Built-in defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all four scenarios in sequence.
    RunAll,
    /// Scenario 1: Quick Scan (clean, fenced and unparseable replies).
    QuickScan,
    /// Scenario 2: Deep Dive (questions, base analysis, finalize).
    DeepDive,
    /// Scenario 3: Ask Me More (follow-ups until the question cap).
    AskMore,
    /// Scenario 4: Tier Progression (Think Harder, Ultra Think, best available).
    Tiers,
    /// One quick scan against the configured live model.
    Scan {
        /// Body part or symptom category.
        category: String,
        /// Symptom form as a JSON object.
        form: String,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match load_config(cli.config.as_ref()) {
        Ok(config) => dispatch(cli.command, &config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            println!("All selected scenarios completed successfully.");
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> TriageResult<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_file(path),
        None => Ok(EngineConfig::default()),
    }
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

async fn dispatch(command: Command, config: &EngineConfig) -> TriageResult<()> {
    if let Command::Scan { category, form } = command {
        return run_live_scan(config, category, &form).await;
    }

    print_banner();
    let reports = match command {
        Command::RunAll => vec![
            quick_scan::run_scenario(config).await?,
            deep_dive::run_scenario(config).await?,
            ask_more::run_scenario(config).await?,
            tier_progression::run_scenario(config).await?,
        ],
        Command::QuickScan => vec![quick_scan::run_scenario(config).await?],
        Command::DeepDive => vec![deep_dive::run_scenario(config).await?],
        Command::AskMore => vec![ask_more::run_scenario(config).await?],
        Command::Tiers => vec![tier_progression::run_scenario(config).await?],
        Command::Scan { .. } => Vec::new(),
    };

    if let Some(broken) = reports.iter().find(|r| !r.chain_verified) {
        return Err(TriageError::AuditWriteFailed {
            reason: format!("audit chain broken in scenario '{}'", broken.name),
        });
    }
    Ok(())
}

async fn run_live_scan(config: &EngineConfig, category: String, form: &str) -> TriageResult<()> {
    let form_data: Map<String, Value> = serde_json::from_str(form).map_err(|e| TriageError::InvalidInput {
        reason: format!("form must be a JSON object: {e}"),
    })?;

    let engine = SessionEngine::new(
        Box::new(HttpLlmProvider::new(&config.llm)?),
        Box::new(InMemorySessionStore::new()),
        Box::new(InMemoryRecordSource::new()),
        Box::new(InMemoryAuditWriter::new()),
        config.clone(),
    );

    let request = AnalysisRequest {
        category,
        form_data,
        prior_context: None,
    };
    let result = engine.quick_scan("cli-user", &request).await?;

    let rendered = serde_json::to_string_pretty(&result).map_err(|e| TriageError::InvalidInput {
        reason: format!("cannot render analysis: {e}"),
    })?;
    println!("{rendered}");
    if result.fallback {
        eprintln!("note: the model reply was incomplete; defaults were substituted");
    }
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("Symptom Triage Runtime");
    println!("Reference Demo");
    println!("======================");
    println!();
    println!("Pipeline per operation:");
    println!("  [1] Load the session and check the operation is allowed in its status");
    println!("  [2] Gather selected history and build the prompt");
    println!("  [3] Call the model, retrying once on the fallback model");
    println!("  [4] Extract JSON from the raw reply and validate it field by field");
    println!("  [5] Apply, store with a version check, append to the SHA-256 audit chain");
    println!();
}
