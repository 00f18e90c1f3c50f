//! Scenario 1: Quick Scan
//!
//! Three single-shot analyses through the same pipeline:
//!   1. Clean JSON reply → parsed as is
//!   2. Fenced JSON reply with prior history as context → fence stripped
//!   3. A refusal with no JSON at all → conservative defaults, `fallback`
//!
//! Quick scans persist nothing and write no audit events.

use triage_config::EngineConfig;
use triage_contracts::{
    analysis::AnalysisResult,
    context::{AnalysisRequest, RecordSelection},
    error::TriageResult,
};

use crate::{
    mock_data::{self, USER_ID},
    runtime::{print_audit, ReferenceRuntime, ScenarioReport},
};

fn print_result(label: &str, result: &AnalysisResult) {
    println!("  {label}");
    println!("    Condition:       {}", result.primary_condition);
    println!("    Confidence:      {}%", result.confidence);
    println!("    Urgency:         {}", result.urgency.as_str());
    println!("    Fallback:        {}", result.fallback);
}

pub async fn run_scenario(config: &EngineConfig) -> TriageResult<ScenarioReport> {
    println!("=== Scenario 1: Quick Scan ===");
    println!();

    let runtime = ReferenceRuntime::seeded(config.clone()).await;
    runtime
        .llm
        .reply(mock_data::clean_reply(&mock_data::analysis(
            "Costochondritis",
            72,
            ("Pleurisy", 20),
            "low",
        )))
        .reply(mock_data::fenced_reply(&mock_data::analysis(
            "Migraine without aura",
            81,
            ("Tension-type headache", 15),
            "medium",
        )))
        .reply(mock_data::REFUSAL);

    let chest = runtime
        .engine
        .quick_scan(
            USER_ID,
            &AnalysisRequest {
                category: "chest".to_string(),
                form_data: mock_data::chest_form(),
                prior_context: None,
            },
        )
        .await?;
    print_result("Scan 1 (chest, clean JSON)", &chest);

    let history = runtime
        .engine
        .gather(
            USER_ID,
            &RecordSelection {
                quick_scan_ids: None,
                deep_dive_ids: Some(Vec::new()),
                tracking_ids: None,
            },
        )
        .await?;
    println!();
    println!(
        "  Prior context:     {} scan(s), {} deep dive(s), {} tracking point(s)",
        history.quick_scans.len(),
        history.deep_dives.len(),
        history.tracking.len()
    );
    let head = runtime
        .engine
        .quick_scan(
            USER_ID,
            &AnalysisRequest {
                category: "head".to_string(),
                form_data: mock_data::headache_form(),
                prior_context: Some(history),
            },
        )
        .await?;
    print_result("Scan 2 (head, fenced JSON with history)", &head);

    println!();
    let knee = runtime
        .engine
        .quick_scan(
            USER_ID,
            &AnalysisRequest {
                category: "right knee".to_string(),
                form_data: mock_data::knee_form(),
                prior_context: None,
            },
        )
        .await?;
    print_result("Scan 3 (knee, refusal)", &knee);
    println!();

    let report = runtime.report("quick_scan", None).await?;
    println!("  Sessions stored:   {}", runtime.store.len().await);
    print_audit(&report);
    Ok(report)
}
