//! Scenario 3: Ask Me More
//!
//! A knee assessment that the base analysis leaves at 70% confidence, with
//! follow-up questions requested until the additional-question cap is hit.
//!
//! Pipeline walk-through for the demo run:
//!   1. One Deep Dive question, then a base analysis at 70%
//!   2. Asking with a 65% target stops at once: target reached, no model call
//!   3. Asking with a 95% target appends follow-ups one by one; the question
//!      model is down for one of them and the default question is used
//!   4. The sixth request reports the limit and recommends finalizing
//!   5. The session is finalized and the audit chain verified

use triage_config::EngineConfig;
use triage_contracts::{context::RecordSelection, error::TriageResult, session::AskMoreOutcome};

use crate::{
    mock_data::{self, USER_ID},
    runtime::{print_audit, ReferenceRuntime, ScenarioReport},
};

pub const TARGET_CONFIDENCE: u8 = 95;
pub const MAX_ADDITIONAL: u32 = 5;

const FOLLOW_UPS: [(&str, &str); 4] = [
    ("Does the knee lock or give way when you turn?", "Medial meniscus tear"),
    ("Is the pain at the front of the knee when climbing stairs?", "Patellofemoral pain"),
    ("Did the swelling appear within two hours of the injury?", "ACL sprain"),
    ("Is there tenderness along the inner joint line?", "Medial meniscus tear"),
];

const FOLLOW_UP_ANSWERS: [&str; 5] = [
    "Sometimes it catches when I pivot",
    "Not really, stairs are fine",
    "It swelled up the next morning",
    "Yes, pressing there hurts",
    "Only after long walks",
];

fn script(runtime: &ReferenceRuntime) {
    runtime
        .llm
        .reply(mock_data::clean_reply(&mock_data::question(
            "Can you fully straighten the knee?",
            60,
            false,
        )))
        .reply(mock_data::clean_reply(&mock_data::analysis(
            "Medial meniscus tear",
            70,
            ("Patellofemoral pain", 25),
            "medium",
        )));

    for (idx, (question, target)) in FOLLOW_UPS.iter().enumerate() {
        if idx == 2 {
            runtime.llm.fail("connection reset by peer");
        }
        runtime
            .llm
            .reply(mock_data::clean_reply(&mock_data::follow_up(question, target)));
    }
}

pub async fn run_scenario(config: &EngineConfig) -> TriageResult<ScenarioReport> {
    println!("=== Scenario 3: Ask Me More ===");
    println!();

    let runtime = ReferenceRuntime::seeded(config.clone()).await;
    script(&runtime);
    let engine = &runtime.engine;

    let session = engine
        .start(USER_ID, "right knee", mock_data::knee_form(), RecordSelection::none())
        .await?;
    engine.next_question(&session.id).await?;
    engine.submit_answer(&session.id, "Almost, it feels tight at the end").await?;
    let base = engine.complete_analysis(&session.id).await?;
    println!("  Session:           {}", session.id);
    println!("  Base analysis:     {} ({}%)", base.primary_condition, base.confidence);
    println!();

    let early = engine.ask_more(&session.id, 65, MAX_ADDITIONAL).await?;
    println!("  Target 65%:        {early:?}");
    println!("  Target {TARGET_CONFIDENCE}%:");

    let mut answers = FOLLOW_UP_ANSWERS.iter();
    loop {
        match engine.ask_more(&session.id, TARGET_CONFIDENCE, MAX_ADDITIONAL).await? {
            AskMoreOutcome::Asked {
                question,
                question_number,
                additional_question_count,
            } => {
                println!("    Q{question_number} (+{additional_question_count}): {question}");
                if let Some(answer) = answers.next() {
                    println!("        → {answer}");
                    engine.answer_additional(&session.id, answer).await?;
                }
            }
            AskMoreOutcome::LimitReached {
                should_finalize,
                confidence,
            } => {
                println!("    Limit reached at {confidence}%; finalize: {should_finalize}");
                break;
            }
            AskMoreOutcome::TargetReached { confidence } => {
                println!("    Target reached at {confidence}%");
                break;
            }
        }
    }

    let stored = engine.session(&session.id).await?;
    println!();
    println!("  Questions total:   {}", stored.questions.len());
    println!("  Additional:        {}", stored.additional_question_count);

    let view = engine.finalize(&session.id).await?;
    println!("  Status:            {}", view.status.as_str());
    println!();

    let report = runtime.report("ask_more", Some(&session.id)).await?;
    print_audit(&report);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use triage_config::EngineConfig;
    use triage_contracts::{
        context::RecordSelection,
        fields::DEFAULT_QUESTION,
        session::{AskMoreOutcome, QuestionPhase},
    };

    use crate::{mock_data, runtime::ReferenceRuntime};

    use super::{run_scenario, script, MAX_ADDITIONAL, TARGET_CONFIDENCE};

    #[tokio::test]
    async fn test_ask_more_scenario_reaches_limit() {
        let report = run_scenario(&EngineConfig::default()).await.unwrap();
        assert!(report.chain_verified);
        assert_eq!(report.final_confidence, Some(70));
        // One follow-up used the default question.
        assert_eq!(report.fallback_events, 1);
        // start, question, answer, complete, target check,
        // 5 × (ask + answer), limit, finalize
        assert_eq!(report.audit_events, 17);
    }

    #[tokio::test]
    async fn test_exhaustion_from_seventy_towards_ninety_five() {
        let runtime = ReferenceRuntime::seeded(EngineConfig::default()).await;
        script(&runtime);
        let engine = &runtime.engine;

        let session = engine
            .start(mock_data::USER_ID, "right knee", mock_data::knee_form(), RecordSelection::none())
            .await
            .unwrap();
        engine.next_question(&session.id).await.unwrap();
        engine.submit_answer(&session.id, "Almost").await.unwrap();
        engine.complete_analysis(&session.id).await.unwrap();

        for n in 1..=MAX_ADDITIONAL {
            match engine.ask_more(&session.id, TARGET_CONFIDENCE, MAX_ADDITIONAL).await.unwrap() {
                AskMoreOutcome::Asked { additional_question_count, .. } => {
                    assert_eq!(additional_question_count, n);
                }
                other => panic!("call {n} should ask, got {other:?}"),
            }
            engine.answer_additional(&session.id, "noted").await.unwrap();
        }

        let sixth = engine.ask_more(&session.id, TARGET_CONFIDENCE, MAX_ADDITIONAL).await.unwrap();
        assert_eq!(
            sixth,
            AskMoreOutcome::LimitReached {
                should_finalize: true,
                confidence: 70
            }
        );

        let stored = engine.session(&session.id).await.unwrap();
        assert_eq!(stored.additional_question_count, 5);
        assert_eq!(stored.count_in_phase(QuestionPhase::Additional), 5);
        assert_eq!(stored.questions[3].question, DEFAULT_QUESTION, "failed call used the default question");
        assert!(runtime.llm.calls()[2].prompt.contains("Patellofemoral pain (25%)"));
    }

    #[tokio::test]
    async fn test_target_already_met_asks_nothing() {
        let runtime = ReferenceRuntime::seeded(EngineConfig::default()).await;
        script(&runtime);
        let engine = &runtime.engine;

        let session = engine
            .start(mock_data::USER_ID, "right knee", mock_data::knee_form(), RecordSelection::none())
            .await
            .unwrap();
        engine.next_question(&session.id).await.unwrap();
        engine.submit_answer(&session.id, "Almost").await.unwrap();
        engine.complete_analysis(&session.id).await.unwrap();
        let calls = runtime.llm.calls().len();

        let outcome = engine.ask_more(&session.id, 65, MAX_ADDITIONAL).await.unwrap();
        assert_eq!(outcome, AskMoreOutcome::TargetReached { confidence: 70 });
        assert_eq!(runtime.llm.calls().len(), calls);
        assert_eq!(engine.session(&session.id).await.unwrap().additional_question_count, 0);
    }
}
