//! The diagnostic session state machine.
//!
//! Pure and synchronous: the transition table, the guards that enforce it,
//! and the mutations each operation applies to a `DiagnosticSession`. The
//! engine loads and stores sessions around these functions; nothing in here
//! performs I/O or calls a model.

use tracing::debug;

use triage_contracts::{
    analysis::{AnalysisResult, Tier},
    error::{TriageError, TriageResult},
    session::{AskMoreOutcome, DiagnosticSession, QuestionAnswer, QuestionPhase, SessionStatus},
    transition::Operation,
};

/// Whether `operation` may run while a session is in `status`.
///
/// `Start` creates a session and is never checked against an existing one.
pub fn permits(status: SessionStatus, operation: Operation) -> bool {
    use Operation::*;
    use SessionStatus::*;

    match operation {
        Start => false,
        NextQuestion | SubmitAnswer => status == Active,
        CompleteAnalysis => matches!(status, Active | AnalysisReady | Completed),
        AskMore | AnswerAdditional | Reanalyze => matches!(status, AnalysisReady | Completed),
        Finalize => matches!(status, AnalysisReady | Completed),
        Abandon => matches!(status, Active | AnalysisReady),
    }
}

/// Reject `operation` with `StateConflict` unless the table allows it.
pub fn ensure(session: &DiagnosticSession, operation: Operation) -> TriageResult<()> {
    if permits(session.status, operation) {
        debug!(session_id = %session.id, status = %session.status, operation = %operation, "guard passed");
        Ok(())
    } else {
        Err(TriageError::conflict(
            operation.as_str(),
            session.status,
            "operation not permitted in this status",
        ))
    }
}

/// Append an unanswered question in `phase`.
///
/// A Deep Dive question is rejected while another is still pending. Ask-more
/// questions may pile up unanswered; only the latest can be answered.
pub fn push_question(
    session: &mut DiagnosticSession,
    question: impl Into<String>,
    phase: QuestionPhase,
    operation: Operation,
) -> TriageResult<()> {
    if phase == QuestionPhase::Initial && session.pending_question().is_some() {
        return Err(TriageError::conflict(
            operation.as_str(),
            session.status,
            "a question is already pending",
        ));
    }
    session.questions.push(QuestionAnswer::unanswered(question, phase));
    if phase == QuestionPhase::Additional {
        session.additional_question_count += 1;
    }
    Ok(())
}

/// Record `answer` against the pending question of `phase`.
pub fn record_answer(
    session: &mut DiagnosticSession,
    answer: &str,
    phase: QuestionPhase,
    operation: Operation,
) -> TriageResult<()> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(TriageError::InvalidInput {
            reason: "answer must not be empty".to_string(),
        });
    }

    let status = session.status;
    match session.pending_question_mut() {
        Some(pending) if pending.phase == phase => {
            pending.answer = Some(answer.to_string());
            Ok(())
        }
        Some(_) => Err(TriageError::conflict(
            operation.as_str(),
            status,
            "the pending question belongs to another phase",
        )),
        None => Err(TriageError::conflict(operation.as_str(), status, "no question is pending")),
    }
}

/// Store the base analysis and move an active session to `AnalysisReady`.
pub fn apply_base_analysis(session: &mut DiagnosticSession, result: AnalysisResult) {
    session.initial_question_count = Some(session.questions.len() as u32);
    session.final_confidence = Some(result.confidence);
    session.analysis_tiers.set(Tier::Base, result);
    session.status = SessionStatus::AnalysisReady;
}

/// Store a re-analysis tier. Questions and status are untouched.
pub fn apply_tier(session: &mut DiagnosticSession, tier: Tier, result: AnalysisResult) {
    session.final_confidence = Some(result.confidence);
    session.analysis_tiers.set(tier, result);
}

/// The tier a re-analysis at `tier` builds on.
///
/// Enhanced needs the base tier; Ultra takes whichever tier is highest.
pub fn prior_for(session: &DiagnosticSession, tier: Tier) -> TriageResult<Tier> {
    let tiers = &session.analysis_tiers;
    let prior = match tier {
        Tier::Base => {
            return Err(TriageError::InvalidInput {
                reason: "the base tier is produced by complete_analysis, not reanalyze".to_string(),
            })
        }
        Tier::Enhanced => tiers.get(Tier::Base).map(|_| Tier::Base),
        Tier::Ultra => [Tier::Enhanced, Tier::Base]
            .into_iter()
            .find(|t| tiers.get(*t).is_some()),
    };

    prior.ok_or_else(|| {
        TriageError::conflict(
            Operation::Reanalyze.as_str(),
            session.status,
            format!("tier '{tier}' requires a prior analysis"),
        )
    })
}

/// Decide whether ask-more must stop before asking the model anything.
///
/// Returns `None` when another question may be asked. The cap is checked
/// before the confidence target, so an exhausted session always reports
/// `LimitReached`.
pub fn ask_more_stop(
    session: &DiagnosticSession,
    target_confidence: u8,
    max_additional: u32,
) -> Option<AskMoreOutcome> {
    let confidence = session.final_confidence.unwrap_or(0);
    if session.additional_question_count >= max_additional {
        return Some(AskMoreOutcome::LimitReached {
            should_finalize: true,
            confidence,
        });
    }
    if confidence >= target_confidence {
        return Some(AskMoreOutcome::TargetReached { confidence });
    }
    None
}

/// Heuristic shown to the caller after a Deep Dive question.
pub fn ready_for_analysis(
    session: &DiagnosticSession,
    model_flag: bool,
    model_confidence: Option<u8>,
    ready_confidence: u8,
    max_initial: u32,
) -> bool {
    model_flag
        || model_confidence.is_some_and(|c| c >= ready_confidence)
        || session.count_in_phase(QuestionPhase::Initial) as u32 >= max_initial
}
