//! Session operations and the records written for each transition.
//!
//! Every operation the state machine performs produces exactly one
//! `TransitionRecord`, including idempotent ones where `from == to`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionStatus;

/// The operations a diagnostic session accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Start,
    NextQuestion,
    SubmitAnswer,
    CompleteAnalysis,
    AskMore,
    AnswerAdditional,
    Reanalyze,
    Finalize,
    Abandon,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::NextQuestion => "next_question",
            Self::SubmitAnswer => "submit_answer",
            Self::CompleteAnalysis => "complete_analysis",
            Self::AskMore => "ask_more",
            Self::AnswerAdditional => "answer_additional",
            Self::Reanalyze => "reanalyze",
            Self::Finalize => "finalize",
            Self::Abandon => "abandon",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable record of one session transition, written to the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub session_id: String,
    pub operation: Operation,
    pub from: SessionStatus,
    pub to: SessionStatus,
    /// Session confidence after the operation, if any analysis exists.
    pub confidence: Option<u8>,
    /// True when this operation had to use a synthesized fallback result.
    pub fallback: bool,
    /// Short operation-specific note (tier name, limit reason, ...).
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}
