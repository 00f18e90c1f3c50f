//! Diagnostic session identity and state types.
//!
//! A `DiagnosticSession` is the durable record of one multi-turn dialog. It is
//! stored as a single document keyed by `SessionId`; the field names below are
//! the document's field names (camelCase on the wire).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{analysis::AnalysisTiers, context::RecordSelection};

/// Unique identifier for one diagnostic session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    /// Create a new, unique session ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle status of a session.
///
/// `Active → AnalysisReady → Completed`, with `Abandoned` reachable from the
/// first two. Which operations each status admits lives in the transition
/// table in `triage-core::machine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    AnalysisReady,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::AnalysisReady => "analysis_ready",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which phase of the dialog a question was asked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionPhase {
    /// Asked before the first analysis (Deep Dive questioning).
    Initial,
    /// Asked through Ask Me More after an analysis exists.
    Additional,
}

/// One question and, once the user replies, its answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAnswer {
    pub question: String,
    /// `None` until the user answers.
    pub answer: Option<String>,
    pub phase: QuestionPhase,
    pub asked_at: DateTime<Utc>,
}

impl QuestionAnswer {
    pub fn unanswered(question: impl Into<String>, phase: QuestionPhase) -> Self {
        Self {
            question: question.into(),
            answer: None,
            phase,
            asked_at: Utc::now(),
        }
    }

    pub fn is_answered(&self) -> bool {
        self.answer.is_some()
    }
}

/// The durable record of one multi-turn diagnostic conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticSession {
    pub id: SessionId,
    /// Owner of the session; used to scope gathered context.
    pub user_id: String,
    pub body_part: String,
    /// Free-form form fields supplied when the session started.
    pub form_data: Map<String, Value>,
    pub status: SessionStatus,
    /// Owned exclusively by this session, in the order asked.
    pub questions: Vec<QuestionAnswer>,
    /// Number of questions asked when analysis was first reached.
    pub initial_question_count: Option<u32>,
    /// Questions asked through Ask Me More. Never exceeds the configured cap.
    pub additional_question_count: u32,
    /// Confidence of the most recently produced tier, 0–100.
    pub final_confidence: Option<u8>,
    pub analysis_tiers: AnalysisTiers,
    /// Which historical records prompts for this session may draw on.
    #[serde(default)]
    pub context_selection: RecordSelection,
    /// Optimistic-concurrency counter; bumped by the store on every write.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DiagnosticSession {
    /// Build a fresh `Active` session with no questions and no tiers.
    pub fn new(
        user_id: impl Into<String>,
        body_part: impl Into<String>,
        form_data: Map<String, Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            user_id: user_id.into(),
            body_part: body_part.into(),
            form_data,
            status: SessionStatus::Active,
            questions: Vec::new(),
            initial_question_count: None,
            additional_question_count: 0,
            final_confidence: None,
            analysis_tiers: AnalysisTiers::default(),
            context_selection: RecordSelection::default(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// The last question, if it is still waiting for an answer.
    pub fn pending_question(&self) -> Option<&QuestionAnswer> {
        self.questions.last().filter(|qa| !qa.is_answered())
    }

    pub fn pending_question_mut(&mut self) -> Option<&mut QuestionAnswer> {
        self.questions.last_mut().filter(|qa| !qa.is_answered())
    }

    /// Count of questions asked in `phase`.
    pub fn count_in_phase(&self, phase: QuestionPhase) -> usize {
        self.questions.iter().filter(|qa| qa.phase == phase).count()
    }

    /// 1-based number of the latest question (0 when none asked yet).
    pub fn question_number(&self) -> usize {
        self.questions.len()
    }
}

/// The caller-facing snapshot returned by session operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: SessionId,
    pub status: SessionStatus,
    pub question_number: usize,
    pub next_question: Option<String>,
    /// Hint for the caller that enough has been asked to request an analysis.
    /// The session never transitions on its own because of this flag.
    pub ready_for_analysis: bool,
}

impl SessionView {
    /// A view with no new question; `next_question` echoes a pending one.
    pub fn of(session: &DiagnosticSession, ready_for_analysis: bool) -> Self {
        Self {
            id: session.id,
            status: session.status,
            question_number: session.question_number(),
            next_question: session.pending_question().map(|qa| qa.question.clone()),
            ready_for_analysis,
        }
    }
}

/// Result of an Ask Me More request.
///
/// Only `Asked` mutates the session. The others are signals for the caller,
/// which decides what to do next; the session never transitions because of
/// them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AskMoreOutcome {
    /// A new follow-up question was appended.
    Asked {
        question: String,
        question_number: usize,
        additional_question_count: u32,
    },
    /// Current confidence already meets the target.
    TargetReached { confidence: u8 },
    /// The additional-question cap was reached before the target.
    LimitReached { should_finalize: bool, confidence: u8 },
}
