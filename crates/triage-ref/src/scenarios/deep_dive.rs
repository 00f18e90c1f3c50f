//! Scenario 2: Deep Dive
//!
//! A full questioning session for a recurring headache.
//!
//! Pipeline walk-through for the demo run:
//!   1. Session starts with one selected prior scan as context
//!   2. Three questions are asked and answered; replies arrive as clean
//!      JSON, JSON inside prose, and clean JSON flagging readiness
//!   3. The base analysis arrives fenced and moves the session to AnalysisReady
//!   4. Completing again returns the stored analysis without a model call
//!   5. The session is finalized and the audit chain verified

use triage_config::EngineConfig;
use triage_contracts::{context::RecordSelection, error::TriageResult, session::SessionView};

use crate::{
    mock_data::{self, USER_ID},
    runtime::{print_audit, ReferenceRuntime, ScenarioReport},
};

const ANSWERS: [&str; 3] = [
    "No flashing lights, but bright light makes it worse",
    "It usually lasts most of the day and sleep helps",
    "Yes, it often starts after a late night or skipped meal",
];

fn script(runtime: &ReferenceRuntime) {
    runtime
        .llm
        .reply(mock_data::clean_reply(&mock_data::question(
            "Do you see flashing lights or zigzag lines before the pain starts?",
            55,
            false,
        )))
        .reply(mock_data::prose_reply(&mock_data::question(
            "How long does a typical episode last, and does sleep relieve it?",
            72,
            false,
        )))
        .reply(mock_data::clean_reply(&mock_data::question(
            "Do the headaches follow poor sleep, stress or missed meals?",
            88,
            true,
        )))
        .reply(mock_data::fenced_reply(&mock_data::analysis(
            "Migraine without aura",
            78,
            ("Tension-type headache", 18),
            "medium",
        )));
}

fn print_view(view: &SessionView) {
    println!(
        "  Q{}: {}",
        view.question_number,
        view.next_question.as_deref().unwrap_or("(none)")
    );
}

pub async fn run_scenario(config: &EngineConfig) -> TriageResult<ScenarioReport> {
    println!("=== Scenario 2: Deep Dive ===");
    println!();

    let runtime = ReferenceRuntime::seeded(config.clone()).await;
    script(&runtime);
    let engine = &runtime.engine;

    let selection = RecordSelection {
        quick_scan_ids: Some(vec!["qs-0001".to_string()]),
        deep_dive_ids: Some(Vec::new()),
        tracking_ids: None,
    };
    let session = engine
        .start(USER_ID, "head", mock_data::headache_form(), selection)
        .await?;
    println!("  Patient:           {USER_ID}");
    println!("  Session:           {}", session.id);
    println!("  Body part:         {}", session.body_part);
    println!();

    let mut ready = false;
    for answer in ANSWERS {
        let view = engine.next_question(&session.id).await?;
        print_view(&view);
        println!("      → {answer}");
        engine.submit_answer(&session.id, answer).await?;
        ready = view.ready_for_analysis;
        if ready {
            break;
        }
    }
    println!();
    println!("  Ready for analysis: {ready}");

    let base = engine.complete_analysis(&session.id).await?;
    println!("  Base analysis:     {} ({}%)", base.primary_condition, base.confidence);
    if let Some(rival) = base.strongest_differential() {
        println!("  Strongest rival:   {} ({}%)", rival.condition, rival.probability);
    }

    let again = engine.complete_analysis(&session.id).await?;
    println!(
        "  Repeat complete:   {}",
        if again == base { "stored analysis returned" } else { "UNEXPECTED: analysis changed" }
    );

    let view = engine.finalize(&session.id).await?;
    println!("  Status:            {}", view.status.as_str());
    println!("  Model calls:       {}", runtime.llm.calls().len());
    println!();

    let report = runtime.report("deep_dive", Some(&session.id)).await?;
    print_audit(&report);
    Ok(report)
}
