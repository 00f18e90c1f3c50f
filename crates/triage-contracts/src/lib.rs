//! # triage-contracts
//!
//! Shared types and contracts for the triage runtime.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions, field contracts, and error types.

pub mod analysis;
pub mod context;
pub mod error;
pub mod fields;
pub mod llm;
pub mod session;
pub mod transition;

#[cfg(test)]
mod tests {
    use serde_json::{json, Map};

    use super::*;
    use analysis::{AnalysisResult, AnalysisTiers, Tier, Urgency};
    use error::TriageError;
    use fields::{names, EndpointKind, FieldKind};
    use session::{DiagnosticSession, QuestionAnswer, QuestionPhase, SessionId, SessionStatus};

    fn analysis(condition: &str, confidence: u8) -> AnalysisResult {
        let mut object = Map::new();
        object.insert(names::PRIMARY_CONDITION.into(), json!(condition));
        object.insert(names::CONFIDENCE.into(), json!(confidence));
        AnalysisResult::from_validated(&object, false, None)
    }

    // ── Tier map ─────────────────────────────────────────────────────────────

    #[test]
    fn tiers_serialize_as_named_fields() {
        let mut tiers = AnalysisTiers::default();
        tiers.set(Tier::Base, analysis("Migraine", 70));

        let doc = serde_json::to_value(&tiers).unwrap();
        assert!(doc.get("baseAnalysis").unwrap().is_object());
        assert!(doc.get("enhancedAnalysis").unwrap().is_null());
        assert!(doc.get("ultraAnalysis").unwrap().is_null());
    }

    #[test]
    fn highest_tier_prefers_ultra() {
        let mut tiers = AnalysisTiers::default();
        assert!(tiers.highest().is_none());

        tiers.set(Tier::Base, analysis("A", 60));
        tiers.set(Tier::Ultra, analysis("C", 90));
        let (tier, result) = tiers.highest().unwrap();
        assert_eq!(tier, Tier::Ultra);
        assert_eq!(result.primary_condition, "C");
    }

    #[test]
    fn best_available_reports_max_confidence_with_latest_content() {
        let mut tiers = AnalysisTiers::default();
        tiers.set(Tier::Base, analysis("Tension Headache", 70));
        tiers.set(Tier::Enhanced, analysis("Cluster Headache", 65));

        let best = tiers.best_available().unwrap();
        assert_eq!(best.tier, Tier::Enhanced);
        assert_eq!(best.analysis.primary_condition, "Cluster Headache");
        assert_eq!(best.confidence, 70);

        let progression: Vec<u8> = best.progression.iter().map(|p| p.confidence).collect();
        assert_eq!(progression, vec![70, 65], "progression must be recorded verbatim");
    }

    // ── AnalysisResult ───────────────────────────────────────────────────────

    #[test]
    fn from_validated_clamps_and_parses() {
        let object = json!({
            "primaryCondition": "Sinusitis",
            "confidence": 140,
            "urgency": "HIGH",
            "differentials": [
                { "condition": "Common Cold", "probability": 40 },
                { "condition": "Allergy", "probability": -5 },
                { "probability": 10 }
            ],
            "recommendations": ["Rest", 4],
        });
        let result = AnalysisResult::from_validated(object.as_object().unwrap(), false, None);

        assert_eq!(result.confidence, 100);
        assert_eq!(result.urgency, Urgency::High);
        assert_eq!(result.differentials.len(), 2);
        assert_eq!(result.differentials[1].probability, 0);
        assert_eq!(result.recommendations, vec!["Rest".to_string()]);
        assert!(result.reasoning_chain.is_none());
    }

    #[test]
    fn strongest_differential_skips_primary() {
        let object = json!({
            "primaryCondition": "Migraine",
            "confidence": 70,
            "differentials": [
                { "condition": "migraine", "probability": 90 },
                { "condition": "Tension Headache", "probability": 35 },
                { "condition": "Sinusitis", "probability": 20 }
            ]
        });
        let result = AnalysisResult::from_validated(object.as_object().unwrap(), false, None);
        assert_eq!(
            result.strongest_differential().unwrap().condition,
            "Tension Headache"
        );
    }

    // ── Session ──────────────────────────────────────────────────────────────

    #[test]
    fn new_session_is_active_and_empty() {
        let session = DiagnosticSession::new("user-1", "head", Map::new());
        assert_eq!(session.status, SessionStatus::Active);
        assert!(session.questions.is_empty());
        assert!(session.analysis_tiers.is_empty());
        assert_eq!(session.version, 0);
        assert!(session.pending_question().is_none());
    }

    #[test]
    fn pending_question_is_last_unanswered() {
        let mut session = DiagnosticSession::new("user-1", "head", Map::new());
        session
            .questions
            .push(QuestionAnswer::unanswered("Where does it hurt?", QuestionPhase::Initial));
        assert_eq!(session.pending_question().unwrap().question, "Where does it hurt?");

        session.pending_question_mut().unwrap().answer = Some("Forehead".into());
        assert!(session.pending_question().is_none());
        assert_eq!(session.count_in_phase(QuestionPhase::Initial), 1);
        assert_eq!(session.count_in_phase(QuestionPhase::Additional), 0);
    }

    #[test]
    fn session_id_new_produces_unique_values() {
        let ids: std::collections::HashSet<String> =
            (0..100).map(|_| SessionId::new().to_string()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&SessionStatus::AnalysisReady).unwrap();
        assert_eq!(json, "\"analysis_ready\"");
    }

    // ── Field specs ──────────────────────────────────────────────────────────

    #[test]
    fn ultra_think_adds_reasoning_chain() {
        let base = EndpointKind::ThinkHarder.field_specs();
        let ultra = EndpointKind::UltraThink.field_specs();
        assert_eq!(ultra.len(), base.len() + 1);
        assert!(ultra.iter().any(|f| f.name == names::REASONING_CHAIN));
    }

    #[test]
    fn urgency_field_is_closed_enum_defaulting_to_medium() {
        let spec = EndpointKind::QuickScan
            .field_specs()
            .into_iter()
            .find(|f| f.name == names::URGENCY)
            .unwrap();
        assert_eq!(spec.default, json!("medium"));
        match spec.kind {
            FieldKind::Enum { allowed } => assert_eq!(allowed.len(), 4),
            other => panic!("expected enum kind, got {:?}", other),
        }
    }

    // ── Error display messages ───────────────────────────────────────────────

    #[test]
    fn error_state_conflict_display() {
        let err = TriageError::conflict("ask_more", SessionStatus::Active, "no analysis yet");
        let msg = err.to_string();
        assert!(msg.contains("ask_more"));
        assert!(msg.contains("active"));
        assert!(msg.contains("no analysis yet"));
    }

    #[test]
    fn error_version_conflict_display() {
        let err = TriageError::VersionConflict {
            id: "s-1".into(),
            expected: 3,
            found: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("expected version 3"));
        assert!(msg.contains("found 4"));
    }

    #[test]
    fn error_not_found_display() {
        let msg = TriageError::session_not_found("abc").to_string();
        assert_eq!(msg, "session 'abc' not found");
    }
}
