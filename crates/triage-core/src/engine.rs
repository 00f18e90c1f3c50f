//! The session engine: every diagnostic-session operation, end to end.
//!
//! Each operation follows the same order:
//!
//!   Load → Guard → [Gather → Prompt → Model → Extract → Validate] → Apply → Store → Audit
//!
//! Model failures never abort an operation. A transport failure on both the
//! primary and fallback model, or output nothing usable can be recovered
//! from, still completes the transition with the validator's defaults and
//! `fallback = true`. Store and audit failures are fatal and surface as
//! errors; the session is left as last stored.

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use triage_config::EngineConfig;
use triage_contracts::{
    analysis::{clamp_percent, AnalysisResult, BestAvailable, Tier, TierOutcome},
    context::{AnalysisRequest, ContextBundle, RecordSelection},
    error::{TriageError, TriageResult},
    fields::{names, EndpointKind},
    session::{AskMoreOutcome, DiagnosticSession, QuestionPhase, SessionId, SessionStatus, SessionView},
    transition::{Operation, TransitionRecord},
};

use crate::{
    gather::DataGatherer,
    machine,
    orchestrator::{outcome_for, TierOrchestrator},
    prompts,
    traits::{AuditWriter, LlmProvider, RecordSource, SessionStore},
};

/// Drives diagnostic sessions through their lifecycle.
///
/// The engine holds no per-session state; every call loads the session from
/// the store and writes it back with an optimistic version check.
pub struct SessionEngine {
    llm: Box<dyn LlmProvider>,
    store: Box<dyn SessionStore>,
    records: Box<dyn RecordSource>,
    audit: Box<dyn AuditWriter>,
    config: EngineConfig,
}

impl SessionEngine {
    pub fn new(
        llm: Box<dyn LlmProvider>,
        store: Box<dyn SessionStore>,
        records: Box<dyn RecordSource>,
        audit: Box<dyn AuditWriter>,
        config: EngineConfig,
    ) -> Self {
        Self { llm, store, records, audit, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Open a new session in `Active`.
    pub async fn start(
        &self,
        user_id: &str,
        body_part: &str,
        form_data: Map<String, Value>,
        context_selection: RecordSelection,
    ) -> TriageResult<DiagnosticSession> {
        if body_part.trim().is_empty() {
            return Err(TriageError::InvalidInput {
                reason: "body part must not be empty".to_string(),
            });
        }

        let mut session = DiagnosticSession::new(user_id, body_part.trim(), form_data);
        session.context_selection = context_selection;
        self.store.insert(&session).await?;

        info!(session_id = %session.id, user_id, body_part = %session.body_part, "session started");
        self.record(&session, Operation::Start, SessionStatus::Active, false, None)?;
        Ok(session)
    }

    /// Ask the model for the next Deep Dive question and append it.
    ///
    /// A question that is still pending is offered again without a model
    /// call. Once the initial question cap is reached no question is asked
    /// and the view reports the session ready for analysis.
    pub async fn next_question(&self, id: &SessionId) -> TriageResult<SessionView> {
        let mut session = self.load(id).await?;
        machine::ensure(&session, Operation::NextQuestion)?;
        let from = session.status;
        let limits = &self.config.limits;

        if session.pending_question().is_some() {
            let ready = self.cap_ready(&session);
            self.record(&session, Operation::NextQuestion, from, false, Some("pending question re-offered"))?;
            return Ok(SessionView::of(&session, ready));
        }

        let asked = session.count_in_phase(QuestionPhase::Initial) as u32;
        if asked >= limits.max_initial_questions {
            debug!(session_id = %id, asked, "initial question cap reached");
            self.record(&session, Operation::NextQuestion, from, false, Some("initial question cap reached"))?;
            return Ok(SessionView::of(&session, true));
        }

        let context = self.context_for(&session).await?;
        let prompt = prompts::deep_dive_question(&session, &context);
        let orchestrator = TierOrchestrator::new(self.llm.as_ref());
        let models = &self.config.models;
        let answer = match orchestrator
            .ask(&prompt, EndpointKind::DeepDiveQuestion, &models.question, models.fallback_for(&models.question))
            .await
        {
            Ok((validated, _)) => validated,
            Err(TriageError::Transport { model, reason }) => {
                warn!(session_id = %id, %model, %reason, "question model unavailable, using default question");
                orchestrator.fallback_answer(EndpointKind::DeepDiveQuestion)
            }
            Err(e) => return Err(e),
        };

        let model_confidence = answer
            .gaps
            .iter()
            .all(|gap| gap.field != names::CONFIDENCE)
            .then(|| clamp_percent(answer.integer(names::CONFIDENCE)));

        machine::push_question(&mut session, answer.text(names::QUESTION), QuestionPhase::Initial, Operation::NextQuestion)?;
        let ready = machine::ready_for_analysis(
            &session,
            answer.flag(names::READY_FOR_ANALYSIS),
            model_confidence,
            limits.ready_confidence,
            limits.max_initial_questions,
        );

        self.save(&mut session).await?;
        self.record(&session, Operation::NextQuestion, from, answer.fallback, None)?;
        Ok(SessionView::of(&session, ready))
    }

    /// Answer the pending Deep Dive question. Never changes status.
    pub async fn submit_answer(&self, id: &SessionId, answer: &str) -> TriageResult<SessionView> {
        let mut session = self.load(id).await?;
        machine::ensure(&session, Operation::SubmitAnswer)?;
        let from = session.status;

        machine::record_answer(&mut session, answer, QuestionPhase::Initial, Operation::SubmitAnswer)?;
        self.save(&mut session).await?;
        self.record(&session, Operation::SubmitAnswer, from, false, None)?;

        Ok(SessionView::of(&session, self.cap_ready(&session)))
    }

    /// End questioning and run the base analysis.
    ///
    /// Repeating the call after the session has been analysed returns the
    /// stored base analysis without calling the model.
    pub async fn complete_analysis(&self, id: &SessionId) -> TriageResult<AnalysisResult> {
        let mut session = self.load(id).await?;
        machine::ensure(&session, Operation::CompleteAnalysis)?;
        let from = session.status;

        if from != SessionStatus::Active {
            let base = session.analysis_tiers.get(Tier::Base).cloned().ok_or_else(|| {
                TriageError::conflict(Operation::CompleteAnalysis.as_str(), from, "no base analysis stored")
            })?;
            self.record(&session, Operation::CompleteAnalysis, from, false, Some("already analysed"))?;
            return Ok(base);
        }

        let context = self.context_for(&session).await?;
        let prompt = prompts::base_analysis(&session, &context);
        let model = &self.config.models.base;
        let result = self
            .analyze_or_fallback(&session, &prompt, EndpointKind::DeepDiveAnalysis, model)
            .await?;

        machine::apply_base_analysis(&mut session, result.clone());
        self.save(&mut session).await?;

        info!(
            session_id = %id,
            questions = session.questions.len(),
            confidence = result.confidence,
            fallback = result.fallback,
            "base analysis complete"
        );
        self.record(&session, Operation::CompleteAnalysis, from, result.fallback, Some("tier base"))?;
        Ok(result)
    }

    /// Ask one more targeted question, unless the session is done asking.
    ///
    /// `max_additional` cannot raise the configured cap, only lower it.
    pub async fn ask_more(
        &self,
        id: &SessionId,
        target_confidence: u8,
        max_additional: u32,
    ) -> TriageResult<AskMoreOutcome> {
        let mut session = self.load(id).await?;
        machine::ensure(&session, Operation::AskMore)?;
        let from = session.status;
        let cap = max_additional.min(self.config.limits.max_additional_questions);

        if let Some(stop) = machine::ask_more_stop(&session, target_confidence, cap) {
            let detail = match &stop {
                AskMoreOutcome::LimitReached { .. } => "question limit reached",
                _ => "target confidence reached",
            };
            info!(session_id = %id, additional = session.additional_question_count, cap, detail, "ask-more stopped");
            self.record(&session, Operation::AskMore, from, false, Some(detail))?;
            return Ok(stop);
        }

        let prompt = {
            let (_, current) = session.analysis_tiers.highest().ok_or_else(|| {
                TriageError::conflict(Operation::AskMore.as_str(), from, "no analysis to refine")
            })?;
            prompts::ask_more(&session, current, target_confidence)
        };

        let orchestrator = TierOrchestrator::new(self.llm.as_ref());
        let models = &self.config.models;
        let answer = match orchestrator
            .ask(&prompt, EndpointKind::AskMoreQuestion, &models.question, models.fallback_for(&models.question))
            .await
        {
            Ok((validated, _)) => validated,
            Err(TriageError::Transport { model, reason }) => {
                warn!(session_id = %id, %model, %reason, "question model unavailable, using default question");
                orchestrator.fallback_answer(EndpointKind::AskMoreQuestion)
            }
            Err(e) => return Err(e),
        };

        let question = answer.text(names::QUESTION).to_string();
        machine::push_question(&mut session, question.clone(), QuestionPhase::Additional, Operation::AskMore)?;
        self.save(&mut session).await?;

        let target = answer.text(names::TARGET_CONDITION);
        let detail = (!target.is_empty()).then(|| format!("targets {target}"));
        self.record(&session, Operation::AskMore, from, answer.fallback, detail.as_deref())?;

        Ok(AskMoreOutcome::Asked {
            question,
            question_number: session.question_number(),
            additional_question_count: session.additional_question_count,
        })
    }

    /// `ask_more` with the configured target and cap.
    pub async fn ask_more_with_defaults(&self, id: &SessionId) -> TriageResult<AskMoreOutcome> {
        let limits = &self.config.limits;
        self.ask_more(id, limits.target_confidence, limits.max_additional_questions)
            .await
    }

    /// Answer the most recent ask-more question.
    pub async fn answer_additional(&self, id: &SessionId, answer: &str) -> TriageResult<SessionView> {
        let mut session = self.load(id).await?;
        machine::ensure(&session, Operation::AnswerAdditional)?;
        let from = session.status;

        machine::record_answer(&mut session, answer, QuestionPhase::Additional, Operation::AnswerAdditional)?;
        self.save(&mut session).await?;
        self.record(&session, Operation::AnswerAdditional, from, false, None)?;

        Ok(SessionView::of(&session, true))
    }

    /// Re-analyse at `Enhanced` or `Ultra`.
    ///
    /// A tier that is already stored is returned as is.
    pub async fn reanalyze(&self, id: &SessionId, tier: Tier) -> TriageResult<TierOutcome> {
        let mut session = self.load(id).await?;
        machine::ensure(&session, Operation::Reanalyze)?;
        let from = session.status;
        let prior_tier = machine::prior_for(&session, tier)?;

        if let Some(stored) = session.analysis_tiers.get(tier) {
            let outcome = outcome_for(tier, stored.clone(), Some(prior_tier), session.analysis_tiers.get(prior_tier));
            let detail = format!("tier {tier} already stored");
            self.record(&session, Operation::Reanalyze, from, false, Some(detail.as_str()))?;
            return Ok(outcome);
        }

        let models = &self.config.models;
        let model = models.for_tier(tier);
        let orchestrator = TierOrchestrator::new(self.llm.as_ref());
        let outcome = match orchestrator
            .run_tier(&session, tier, model, models.fallback_for(model))
            .await
        {
            Ok(outcome) => outcome,
            Err(TriageError::Transport { model, reason }) => {
                warn!(session_id = %id, %tier, %model, %reason, "tier model unavailable, storing fallback analysis");
                let fallback = orchestrator.fallback_analysis(prompts::endpoint_for(tier));
                outcome_for(tier, fallback, Some(prior_tier), session.analysis_tiers.get(prior_tier))
            }
            Err(e) => return Err(e),
        };

        machine::apply_tier(&mut session, tier, outcome.result.clone());
        self.save(&mut session).await?;

        let detail = format!("tier {tier}, delta {:+}", outcome.confidence_delta);
        self.record(&session, Operation::Reanalyze, from, outcome.result.fallback, Some(detail.as_str()))?;
        Ok(outcome)
    }

    /// Move the session to `Completed`. Repeating the call is harmless.
    pub async fn finalize(&self, id: &SessionId) -> TriageResult<SessionView> {
        self.close(id, Operation::Finalize, SessionStatus::Completed).await
    }

    /// Move an unfinished session to `Abandoned`.
    pub async fn abandon(&self, id: &SessionId) -> TriageResult<SessionView> {
        self.close(id, Operation::Abandon, SessionStatus::Abandoned).await
    }

    /// The caller-facing view of a session. Read-only; nothing is audited.
    pub async fn view(&self, id: &SessionId) -> TriageResult<SessionView> {
        let session = self.load(id).await?;
        let ready = match session.status {
            SessionStatus::Active => self.cap_ready(&session),
            _ => !session.analysis_tiers.is_empty(),
        };
        Ok(SessionView::of(&session, ready))
    }

    pub async fn session(&self, id: &SessionId) -> TriageResult<DiagnosticSession> {
        self.load(id).await
    }

    /// The highest tier's analysis with the best confidence seen across tiers.
    pub async fn best_available(&self, id: &SessionId) -> TriageResult<BestAvailable> {
        let session = self.load(id).await?;
        session
            .analysis_tiers
            .best_available()
            .ok_or_else(|| TriageError::conflict("best_available", session.status, "no analysis has been run"))
    }

    /// Single-shot analysis of a symptom form. Nothing is persisted.
    pub async fn quick_scan(&self, user_id: &str, request: &AnalysisRequest) -> TriageResult<AnalysisResult> {
        if request.category.trim().is_empty() {
            return Err(TriageError::InvalidInput {
                reason: "category must not be empty".to_string(),
            });
        }

        let context = request.prior_context.clone().unwrap_or_default();
        let prompt = prompts::quick_scan(request, &context);
        let model = &self.config.models.base;
        let orchestrator = TierOrchestrator::new(self.llm.as_ref());

        let result = match orchestrator
            .analyze(&prompt, EndpointKind::QuickScan, model, self.config.models.fallback_for(model))
            .await
        {
            Ok(result) => result,
            Err(TriageError::Transport { model, reason }) => {
                warn!(user_id, %model, %reason, "quick scan model unavailable, returning fallback analysis");
                orchestrator.fallback_analysis(EndpointKind::QuickScan)
            }
            Err(e) => return Err(e),
        };

        info!(
            user_id,
            category = %request.category,
            confidence = result.confidence,
            fallback = result.fallback,
            "quick scan complete"
        );
        Ok(result)
    }

    /// Gather `user_id`'s records as `selection` asks.
    pub async fn gather(&self, user_id: &str, selection: &RecordSelection) -> TriageResult<ContextBundle> {
        DataGatherer::new(self.records.as_ref()).gather(user_id, selection).await
    }

    // ── Internals ────────────────────────────────────────────────────────────

    async fn load(&self, id: &SessionId) -> TriageResult<DiagnosticSession> {
        self.store.get(id).await
    }

    async fn save(&self, session: &mut DiagnosticSession) -> TriageResult<()> {
        let expected = session.version;
        session.updated_at = Utc::now();
        match self.store.update(session, expected).await {
            Ok(version) => {
                session.version = version;
                Ok(())
            }
            Err(e) => {
                if let TriageError::VersionConflict { found, .. } = &e {
                    warn!(session_id = %session.id, expected, found, "concurrent session update rejected");
                }
                Err(e)
            }
        }
    }

    async fn context_for(&self, session: &DiagnosticSession) -> TriageResult<ContextBundle> {
        self.gather(&session.user_id, &session.context_selection).await
    }

    async fn analyze_or_fallback(
        &self,
        session: &DiagnosticSession,
        prompt: &str,
        endpoint: EndpointKind,
        model: &str,
    ) -> TriageResult<AnalysisResult> {
        let orchestrator = TierOrchestrator::new(self.llm.as_ref());
        match orchestrator
            .analyze(prompt, endpoint, model, self.config.models.fallback_for(model))
            .await
        {
            Ok(result) => Ok(result),
            Err(TriageError::Transport { model, reason }) => {
                warn!(session_id = %session.id, %endpoint, %model, %reason, "analysis model unavailable, using fallback analysis");
                Ok(orchestrator.fallback_analysis(endpoint))
            }
            Err(e) => Err(e),
        }
    }

    async fn close(&self, id: &SessionId, operation: Operation, to: SessionStatus) -> TriageResult<SessionView> {
        let mut session = self.load(id).await?;
        machine::ensure(&session, operation)?;
        let from = session.status;

        if from != to {
            session.status = to;
            self.save(&mut session).await?;
            info!(session_id = %id, %from, %to, "session closed");
        }
        self.record(&session, operation, from, false, None)?;

        let ready = !session.analysis_tiers.is_empty();
        Ok(SessionView::of(&session, ready))
    }

    fn cap_ready(&self, session: &DiagnosticSession) -> bool {
        let limits = &self.config.limits;
        machine::ready_for_analysis(session, false, None, limits.ready_confidence, limits.max_initial_questions)
    }

    /// Write one audit record; seal the session's log on its first terminal transition.
    fn record(
        &self,
        session: &DiagnosticSession,
        operation: Operation,
        from: SessionStatus,
        fallback: bool,
        detail: Option<&str>,
    ) -> TriageResult<()> {
        let record = TransitionRecord {
            session_id: session.id.to_string(),
            operation,
            from,
            to: session.status,
            confidence: session.final_confidence,
            fallback,
            detail: detail.map(str::to_string),
            timestamp: Utc::now(),
        };
        self.audit.write(&record)?;

        let terminal = matches!(session.status, SessionStatus::Completed | SessionStatus::Abandoned);
        if terminal && from != session.status {
            self.audit.finalize(&record.session_id)?;
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{
        collections::{HashMap, VecDeque},
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc, Mutex,
        },
    };

    use async_trait::async_trait;
    use serde_json::{json, Map};

    use triage_config::EngineConfig;
    use triage_contracts::{
        analysis::Tier,
        context::{DeepDiveRecord, RecordSelection, ScanRecord, TrackingPoint},
        error::{TriageError, TriageResult},
        llm::{LlmRequest, LlmResponse},
        session::{AskMoreOutcome, DiagnosticSession, SessionId, SessionStatus},
        transition::{Operation, TransitionRecord},
    };

    use crate::traits::{AuditWriter, LlmProvider, RecordSource, SessionStore};

    use super::SessionEngine;

    // ── Mock helpers ─────────────────────────────────────────────────────────

    /// Replays scripted replies in order; `Err` entries are transport failures.
    struct MockLlm {
        replies: Arc<Mutex<VecDeque<Result<String, String>>>>,
        calls: Arc<Mutex<Vec<LlmRequest>>>,
    }

    impl MockLlm {
        fn new() -> Self {
            Self {
                replies: Arc::new(Mutex::new(VecDeque::new())),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlm {
        async fn complete(&self, request: &LlmRequest) -> TriageResult<LlmResponse> {
            self.calls.lock().unwrap().push(request.clone());
            match self.replies.lock().unwrap().pop_front() {
                Some(Ok(text)) => Ok(LlmResponse { text }),
                Some(Err(reason)) => Err(TriageError::Transport {
                    model: request.model.clone(),
                    reason,
                }),
                None => Err(TriageError::Transport {
                    model: request.model.clone(),
                    reason: "no scripted reply".to_string(),
                }),
            }
        }
    }

    /// In-memory store with a version check. `race` simulates another writer
    /// landing between our load and our update.
    struct MockStore {
        sessions: Arc<Mutex<HashMap<SessionId, DiagnosticSession>>>,
        race: Arc<AtomicBool>,
    }

    #[async_trait]
    impl SessionStore for MockStore {
        async fn get(&self, id: &SessionId) -> TriageResult<DiagnosticSession> {
            self.sessions
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or_else(|| TriageError::session_not_found(id))
        }

        async fn insert(&self, session: &DiagnosticSession) -> TriageResult<()> {
            self.sessions.lock().unwrap().insert(session.id, session.clone());
            Ok(())
        }

        async fn update(&self, session: &DiagnosticSession, expected_version: u64) -> TriageResult<u64> {
            let mut sessions = self.sessions.lock().unwrap();
            let stored = sessions
                .get_mut(&session.id)
                .ok_or_else(|| TriageError::session_not_found(session.id))?;
            if self.race.load(Ordering::SeqCst) {
                stored.version += 1;
            }
            if stored.version != expected_version {
                return Err(TriageError::VersionConflict {
                    id: session.id.to_string(),
                    expected: expected_version,
                    found: stored.version,
                });
            }
            let mut next = session.clone();
            next.version = expected_version + 1;
            *stored = next;
            Ok(expected_version + 1)
        }
    }

    struct EmptySource;

    #[async_trait]
    impl RecordSource for EmptySource {
        async fn quick_scans(&self, _user_id: &str) -> TriageResult<Vec<ScanRecord>> {
            Ok(vec![])
        }
        async fn deep_dives(&self, _user_id: &str) -> TriageResult<Vec<DeepDiveRecord>> {
            Ok(vec![])
        }
        async fn tracking_points(&self, _user_id: &str) -> TriageResult<Vec<TrackingPoint>> {
            Ok(vec![])
        }
    }

    struct MockAudit {
        records: Arc<Mutex<Vec<TransitionRecord>>>,
        finalized: Arc<Mutex<Vec<String>>>,
    }

    impl AuditWriter for MockAudit {
        fn write(&self, record: &TransitionRecord) -> TriageResult<()> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }

        fn finalize(&self, session_id: &str) -> TriageResult<()> {
            self.finalized.lock().unwrap().push(session_id.to_string());
            Ok(())
        }
    }

    /// Handles onto the mocks after they have been boxed into the engine.
    struct Harness {
        engine: SessionEngine,
        replies: Arc<Mutex<VecDeque<Result<String, String>>>>,
        calls: Arc<Mutex<Vec<LlmRequest>>>,
        sessions: Arc<Mutex<HashMap<SessionId, DiagnosticSession>>>,
        race: Arc<AtomicBool>,
        records: Arc<Mutex<Vec<TransitionRecord>>>,
        finalized: Arc<Mutex<Vec<String>>>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_config(EngineConfig::default())
        }

        fn with_config(config: EngineConfig) -> Self {
            let llm = MockLlm::new();
            let store = MockStore {
                sessions: Arc::new(Mutex::new(HashMap::new())),
                race: Arc::new(AtomicBool::new(false)),
            };
            let audit = MockAudit {
                records: Arc::new(Mutex::new(vec![])),
                finalized: Arc::new(Mutex::new(vec![])),
            };

            Self {
                replies: llm.replies.clone(),
                calls: llm.calls.clone(),
                sessions: store.sessions.clone(),
                race: store.race.clone(),
                records: audit.records.clone(),
                finalized: audit.finalized.clone(),
                engine: SessionEngine::new(Box::new(llm), Box::new(store), Box::new(EmptySource), Box::new(audit), config),
            }
        }

        fn reply(&self, text: impl Into<String>) {
            self.replies.lock().unwrap().push_back(Ok(text.into()));
        }

        fn fail(&self, reason: &str) {
            self.replies.lock().unwrap().push_back(Err(reason.to_string()));
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn stored(&self, id: &SessionId) -> DiagnosticSession {
            self.sessions.lock().unwrap()[id].clone()
        }

        async fn start(&self) -> SessionId {
            let form = json!({ "pain_level": 6, "onset": "two days ago" });
            self.engine
                .start("user-1", "abdomen", form.as_object().unwrap().clone(), RecordSelection::default())
                .await
                .unwrap()
                .id
        }

        /// A session that has been through one question and a base analysis.
        async fn analysed(&self, base_confidence: u8) -> SessionId {
            let id = self.start().await;
            self.reply(r#"{"question": "Where exactly is the pain?", "confidence": 40, "readyForAnalysis": false}"#);
            self.engine.next_question(&id).await.unwrap();
            self.engine.submit_answer(&id, "Lower right side").await.unwrap();
            self.reply(analysis_json("Appendicitis", base_confidence));
            self.engine.complete_analysis(&id).await.unwrap();
            id
        }
    }

    fn analysis_json(condition: &str, confidence: u8) -> String {
        json!({
            "primaryCondition": condition,
            "confidence": confidence,
            "differentials": [
                { "condition": "Gastroenteritis", "probability": 30 },
                { "condition": "Ovarian cyst", "probability": 15 }
            ],
            "recommendations": ["Seek in-person evaluation today"],
            "redFlags": ["Fever above 38.5C", "Rigid abdomen"],
            "selfCare": ["Avoid eating until assessed"],
            "urgency": "high"
        })
        .to_string()
    }

    // ── Test cases ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_start_is_active_and_audited() {
        let h = Harness::new();
        let id = h.start().await;

        let session = h.stored(&id);
        assert_eq!(session.status, SessionStatus::Active);
        assert!(session.questions.is_empty());

        let records = h.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].operation, Operation::Start);
    }

    #[tokio::test]
    async fn test_blank_body_part_rejected() {
        let h = Harness::new();
        let err = h.engine.start("u", "  ", Map::new(), RecordSelection::default()).await.unwrap_err();
        assert!(matches!(err, TriageError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_next_question_appends_and_reoffers_pending() {
        let h = Harness::new();
        let id = h.start().await;
        h.reply("Sure! {\"question\": \"Is the pain worse when you move?\", \"confidence\": 30}");

        let view = h.engine.next_question(&id).await.unwrap();
        assert_eq!(view.next_question.as_deref(), Some("Is the pain worse when you move?"));
        assert_eq!(view.question_number, 1);
        assert!(!view.ready_for_analysis);

        // Asking again before answering must not call the model or append.
        let again = h.engine.next_question(&id).await.unwrap();
        assert_eq!(again.next_question, view.next_question);
        assert_eq!(h.call_count(), 1);
        assert_eq!(h.stored(&id).questions.len(), 1);
    }

    #[tokio::test]
    async fn test_model_confidence_marks_ready() {
        let h = Harness::new();
        let id = h.start().await;
        h.reply(r#"{"question": "Any vomiting?", "confidence": 88, "readyForAnalysis": false}"#);
        let view = h.engine.next_question(&id).await.unwrap();
        assert!(view.ready_for_analysis);
    }

    #[tokio::test]
    async fn test_question_model_down_uses_default_question() {
        let mut config = EngineConfig::default();
        config.models.fallback = Some("backup-model".to_string());
        let h = Harness::with_config(config);
        let id = h.start().await;
        h.fail("connection refused");
        h.fail("connection refused");

        let view = h.engine.next_question(&id).await.unwrap();
        assert!(view.next_question.is_some());
        assert_eq!(h.call_count(), 2, "primary then fallback model");
        assert!(h.records.lock().unwrap().last().unwrap().fallback);
    }

    #[tokio::test]
    async fn test_submit_answer_never_transitions() {
        let mut config = EngineConfig::default();
        config.limits.max_initial_questions = 1;
        let h = Harness::with_config(config);
        let id = h.start().await;

        h.reply(r#"{"question": "When did it start?", "confidence": 20}"#);
        h.engine.next_question(&id).await.unwrap();
        let view = h.engine.submit_answer(&id, "Yesterday").await.unwrap();

        assert_eq!(view.status, SessionStatus::Active);
        assert!(view.ready_for_analysis, "cap of one question reached");
        assert_eq!(h.stored(&id).status, SessionStatus::Active);

        // The cap stops further questions without a model call.
        let capped = h.engine.next_question(&id).await.unwrap();
        assert!(capped.next_question.is_none());
        assert!(capped.ready_for_analysis);
        assert_eq!(h.call_count(), 1);
    }

    #[tokio::test]
    async fn test_submit_without_pending_question_is_conflict() {
        let h = Harness::new();
        let id = h.start().await;
        let err = h.engine.submit_answer(&id, "hello").await.unwrap_err();
        assert!(matches!(err, TriageError::StateConflict { .. }));
    }

    #[tokio::test]
    async fn test_complete_analysis_and_idempotent_repeat() {
        let h = Harness::new();
        let id = h.analysed(70).await;

        let session = h.stored(&id);
        assert_eq!(session.status, SessionStatus::AnalysisReady);
        assert_eq!(session.initial_question_count, Some(1));
        assert_eq!(session.final_confidence, Some(70));
        let calls_before = h.call_count();

        let again = h.engine.complete_analysis(&id).await.unwrap();
        assert_eq!(again.primary_condition, "Appendicitis");
        assert_eq!(h.call_count(), calls_before);
        assert_eq!(h.stored(&id).version, session.version, "idempotent repeat does not write");
    }

    #[tokio::test]
    async fn test_unparseable_analysis_still_completes() {
        let h = Harness::new();
        let id = h.start().await;
        h.reply("I'm sorry, I can't provide a diagnosis. Please see a doctor.");

        let result = h.engine.complete_analysis(&id).await.unwrap();
        assert!(result.fallback);
        assert_eq!(result.confidence, 50);
        assert_eq!(result.primary_condition, "Assessment unavailable - AI analysis could not be completed");
        assert_eq!(h.stored(&id).status, SessionStatus::AnalysisReady);
    }

    #[tokio::test]
    async fn test_ask_more_exhaustion() {
        let h = Harness::new();
        let id = h.analysed(70).await;

        for n in 1..=5u32 {
            h.reply(format!(r#"{{"question": "Follow-up {n}?", "targetCondition": "Gastroenteritis", "rationale": "r"}}"#));
            match h.engine.ask_more(&id, 95, 5).await.unwrap() {
                AskMoreOutcome::Asked { additional_question_count, question, .. } => {
                    assert_eq!(additional_question_count, n);
                    assert_eq!(question, format!("Follow-up {n}?"));
                }
                other => panic!("expected Asked, got {:?}", other),
            }
        }

        let calls_before = h.call_count();
        let sixth = h.engine.ask_more(&id, 95, 5).await.unwrap();
        assert_eq!(sixth, AskMoreOutcome::LimitReached { should_finalize: true, confidence: 70 });
        assert_eq!(h.call_count(), calls_before);

        let session = h.stored(&id);
        assert_eq!(session.additional_question_count, 5);
        assert_eq!(session.questions.len(), 6);
    }

    #[tokio::test]
    async fn test_caller_cannot_raise_the_cap() {
        let mut config = EngineConfig::default();
        config.limits.max_additional_questions = 1;
        let h = Harness::with_config(config);
        let id = h.analysed(70).await;

        h.reply(r#"{"question": "Fever?"}"#);
        h.engine.ask_more(&id, 95, 10).await.unwrap();
        let second = h.engine.ask_more(&id, 95, 10).await.unwrap();
        assert!(matches!(second, AskMoreOutcome::LimitReached { .. }));
    }

    #[tokio::test]
    async fn test_target_reached_asks_nothing() {
        let h = Harness::new();
        let id = h.analysed(92).await;
        let calls_before = h.call_count();

        let outcome = h.engine.ask_more(&id, 90, 5).await.unwrap();
        assert_eq!(outcome, AskMoreOutcome::TargetReached { confidence: 92 });
        assert_eq!(h.call_count(), calls_before);
    }

    #[tokio::test]
    async fn test_ask_more_prompt_carries_history_and_rival() {
        let h = Harness::new();
        let id = h.analysed(70).await;
        h.reply(r#"{"question": "Any diarrhoea?", "targetCondition": "Gastroenteritis"}"#);
        h.engine.ask_more(&id, 95, 5).await.unwrap();

        let calls = h.calls.lock().unwrap();
        let prompt = &calls.last().unwrap().prompt;
        assert!(prompt.contains("Where exactly is the pain?"));
        assert!(prompt.contains("Lower right side"));
        assert!(prompt.contains("STRONGEST ALTERNATIVE: Gastroenteritis (30%)"));
    }

    #[tokio::test]
    async fn test_answer_additional_fills_latest() {
        let h = Harness::new();
        let id = h.analysed(70).await;
        h.reply(r#"{"question": "Any diarrhoea?"}"#);
        h.engine.ask_more(&id, 95, 5).await.unwrap();

        h.engine.answer_additional(&id, "No").await.unwrap();
        let session = h.stored(&id);
        assert_eq!(session.questions.last().unwrap().answer.as_deref(), Some("No"));

        let err = h.engine.answer_additional(&id, "Again").await.unwrap_err();
        assert!(matches!(err, TriageError::StateConflict { .. }));
    }

    #[tokio::test]
    async fn test_bare_follow_up_question_is_not_audited_as_fallback() {
        let h = Harness::new();
        let id = h.analysed(70).await;
        h.reply(r#"{"question": "Fever?"}"#);

        match h.engine.ask_more(&id, 95, 5).await.unwrap() {
            AskMoreOutcome::Asked { question, .. } => assert_eq!(question, "Fever?"),
            other => panic!("expected Asked, got {other:?}"),
        }
        let records = h.records.lock().unwrap();
        let last = records.last().unwrap();
        assert_eq!(last.operation, Operation::AskMore);
        assert!(!last.fallback);
    }

    #[tokio::test]
    async fn test_tier_progression_recorded_verbatim() {
        let h = Harness::new();
        let id = h.analysed(70).await;
        h.reply(analysis_json("Mesenteric adenitis", 65));

        let outcome = h.engine.reanalyze(&id, Tier::Enhanced).await.unwrap();
        assert_eq!(outcome.confidence_delta, -5);
        assert_eq!(h.stored(&id).final_confidence, Some(65));

        let best = h.engine.best_available(&id).await.unwrap();
        assert_eq!(best.tier, Tier::Enhanced);
        assert_eq!(best.analysis.primary_condition, "Mesenteric adenitis");
        assert_eq!(best.confidence, 70);
        let progression: Vec<_> = best.progression.iter().map(|p| (p.tier, p.confidence)).collect();
        assert_eq!(progression, vec![(Tier::Base, 70), (Tier::Enhanced, 65)]);
    }

    #[tokio::test]
    async fn test_reanalyze_never_touches_questions() {
        let h = Harness::new();
        let id = h.analysed(70).await;
        let before = h.stored(&id).questions;

        h.reply(analysis_json("Appendicitis", 80));
        h.engine.reanalyze(&id, Tier::Ultra).await.unwrap();
        let after = h.stored(&id);
        assert_eq!(after.questions, before);
        assert!(after.analysis_tiers.ultra_analysis.is_some());
        assert!(after.analysis_tiers.enhanced_analysis.is_none());
    }

    #[tokio::test]
    async fn test_stored_tier_is_returned_not_recomputed() {
        let h = Harness::new();
        let id = h.analysed(70).await;
        h.reply(analysis_json("Appendicitis", 78));
        h.engine.reanalyze(&id, Tier::Enhanced).await.unwrap();
        let calls_before = h.call_count();

        let again = h.engine.reanalyze(&id, Tier::Enhanced).await.unwrap();
        assert_eq!(again.result.confidence, 78);
        assert_eq!(again.confidence_delta, 8);
        assert_eq!(h.call_count(), calls_before);
    }

    #[tokio::test]
    async fn test_tier_model_down_stores_fallback() {
        let h = Harness::new();
        let id = h.analysed(70).await;
        h.fail("503");
        h.fail("503");

        let outcome = h.engine.reanalyze(&id, Tier::Enhanced).await.unwrap();
        assert!(outcome.result.fallback);
        assert_eq!(outcome.result.confidence, 50);
        assert_eq!(h.stored(&id).final_confidence, Some(50));
    }

    #[tokio::test]
    async fn test_reanalyze_before_analysis_is_conflict() {
        let h = Harness::new();
        let id = h.start().await;
        let err = h.engine.reanalyze(&id, Tier::Enhanced).await.unwrap_err();
        assert!(matches!(err, TriageError::StateConflict { .. }));
    }

    #[tokio::test]
    async fn test_finalize_seals_audit_once() {
        let h = Harness::new();
        let id = h.analysed(70).await;

        let view = h.engine.finalize(&id).await.unwrap();
        assert_eq!(view.status, SessionStatus::Completed);
        h.engine.finalize(&id).await.unwrap();
        assert_eq!(h.finalized.lock().unwrap().len(), 1);

        // Ask-more is still allowed after completion.
        h.reply(r#"{"question": "Any fever?"}"#);
        assert!(matches!(h.engine.ask_more(&id, 95, 5).await.unwrap(), AskMoreOutcome::Asked { .. }));
        assert_eq!(h.stored(&id).status, SessionStatus::Completed);

        let err = h.engine.abandon(&id).await.unwrap_err();
        assert!(matches!(err, TriageError::StateConflict { .. }));
    }

    #[tokio::test]
    async fn test_abandoned_session_rejects_everything() {
        let h = Harness::new();
        let id = h.start().await;
        h.engine.abandon(&id).await.unwrap();

        assert!(h.engine.next_question(&id).await.is_err());
        assert!(h.engine.complete_analysis(&id).await.is_err());
        assert!(h.engine.finalize(&id).await.is_err());
        assert_eq!(h.call_count(), 0);
    }

    #[tokio::test]
    async fn test_every_operation_is_audited() {
        let h = Harness::new();
        let id = h.analysed(92).await;
        h.engine.ask_more(&id, 90, 5).await.unwrap();
        h.engine.finalize(&id).await.unwrap();

        let ops: Vec<Operation> = h.records.lock().unwrap().iter().map(|r| r.operation).collect();
        assert_eq!(
            ops,
            vec![
                Operation::Start,
                Operation::NextQuestion,
                Operation::SubmitAnswer,
                Operation::CompleteAnalysis,
                Operation::AskMore,
                Operation::Finalize,
            ]
        );
    }

    #[tokio::test]
    async fn test_concurrent_update_is_version_conflict() {
        let h = Harness::new();
        let id = h.analysed(70).await;
        h.race.store(true, Ordering::SeqCst);
        h.reply(r#"{"question": "Any fever?"}"#);

        let err = h.engine.ask_more(&id, 95, 5).await.unwrap_err();
        assert!(matches!(err, TriageError::VersionConflict { .. }));
        // The losing write left no question behind.
        assert_eq!(h.stored(&id).additional_question_count, 0);
    }

    #[tokio::test]
    async fn test_unknown_session_not_found() {
        let h = Harness::new();
        let err = h.engine.view(&SessionId::new()).await.unwrap_err();
        assert!(matches!(err, TriageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_quick_scan_fenced_reply() {
        let h = Harness::new();
        h.reply(format!("Here is the assessment:\n```json\n{}\n```", analysis_json("Tension headache", 82)));
        let request = triage_contracts::context::AnalysisRequest {
            category: "head".to_string(),
            form_data: Map::new(),
            prior_context: None,
        };

        let result = h.engine.quick_scan("user-1", &request).await.unwrap();
        assert_eq!(result.primary_condition, "Tension headache");
        assert_eq!(result.confidence, 82);
        assert!(!result.fallback);
        assert!(h.sessions.lock().unwrap().is_empty());
    }
}
