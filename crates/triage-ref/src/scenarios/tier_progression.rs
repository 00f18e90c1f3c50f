//! Scenario 4: Tier Progression
//!
//! Think Harder and Ultra Think on a chest pain assessment.
//!
//! Pipeline walk-through for the demo run:
//!   1. Base analysis at 70%
//!   2. Think Harder returns 65%; the lower figure is stored verbatim, and
//!      the best-available view shows the enhanced content at 70%
//!   3. Ultra Think: the ultra model is unreachable, the fallback model
//!      answers with a reasoning chain at 82%
//!   4. Requesting Think Harder again returns the stored tier, no model call
//!   5. The session is finalized and the audit chain verified

use triage_config::EngineConfig;
use triage_contracts::{
    analysis::{BestAvailable, Tier, TierOutcome},
    context::RecordSelection,
    error::TriageResult,
};

use crate::{
    mock_data::{self, USER_ID},
    runtime::{print_audit, ReferenceRuntime, ScenarioReport},
};

fn script(runtime: &ReferenceRuntime) {
    runtime
        .llm
        .reply(mock_data::clean_reply(&mock_data::question(
            "Does the pain change when you press on your ribs?",
            64,
            false,
        )))
        .reply(mock_data::clean_reply(&mock_data::analysis(
            "Pleurisy",
            70,
            ("Costochondritis", 30),
            "medium",
        )))
        .reply(mock_data::fenced_reply(&mock_data::analysis(
            "Viral pleurisy",
            65,
            ("Costochondritis", 35),
            "medium",
        )))
        .fail("upstream returned 503")
        .reply(mock_data::prose_reply(&mock_data::ultra(
            "Viral pleurisy",
            82,
            ("Costochondritis", 15),
        )));
}

fn print_outcome(label: &str, outcome: &TierOutcome) {
    println!(
        "  {label:<18} {} ({}%, delta {:+}, model {})",
        outcome.result.primary_condition,
        outcome.result.confidence,
        outcome.confidence_delta,
        outcome.result.model.as_deref().unwrap_or("-")
    );
}

fn print_best(best: &BestAvailable) {
    let progression: Vec<String> = best
        .progression
        .iter()
        .map(|tc| format!("{} {}%", tc.tier, tc.confidence))
        .collect();
    println!(
        "  Best available:    {} from {} tier, {}%",
        best.analysis.primary_condition, best.tier, best.confidence
    );
    println!("  Progression:       {}", progression.join(" → "));
}

pub async fn run_scenario(config: &EngineConfig) -> TriageResult<ScenarioReport> {
    println!("=== Scenario 4: Tier Progression ===");
    println!();

    let runtime = ReferenceRuntime::seeded(config.clone()).await;
    script(&runtime);
    let engine = &runtime.engine;

    let session = engine
        .start(USER_ID, "chest", mock_data::chest_form(), RecordSelection::none())
        .await?;
    engine.next_question(&session.id).await?;
    engine.submit_answer(&session.id, "No, pressing does not hurt").await?;
    let base = engine.complete_analysis(&session.id).await?;
    println!("  Session:           {}", session.id);
    println!("  Base:              {} ({}%)", base.primary_condition, base.confidence);

    let enhanced = engine.reanalyze(&session.id, Tier::Enhanced).await?;
    print_outcome("Think Harder:", &enhanced);
    print_best(&engine.best_available(&session.id).await?);
    println!();

    let ultra = engine.reanalyze(&session.id, Tier::Ultra).await?;
    print_outcome("Ultra Think:", &ultra);
    if let Some(chain) = &ultra.result.reasoning_chain {
        for (idx, step) in chain.iter().enumerate() {
            println!("    {}. {step}", idx + 1);
        }
    }
    print_best(&engine.best_available(&session.id).await?);
    println!();

    let calls = runtime.llm.calls().len();
    let repeat = engine.reanalyze(&session.id, Tier::Enhanced).await?;
    print_outcome("Think Harder again:", &repeat);
    println!("  New model calls:   {}", runtime.llm.calls().len() - calls);

    let view = engine.finalize(&session.id).await?;
    println!("  Status:            {}", view.status.as_str());
    println!();

    let report = runtime.report("tier_progression", Some(&session.id)).await?;
    print_audit(&report);
    Ok(report)
}
