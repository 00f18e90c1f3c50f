//! Audit event and log types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use triage_contracts::transition::TransitionRecord;

/// A single entry in one session's hash chain.
///
/// Modifying any field, including those of the embedded `record`,
/// invalidates `this_hash` and every later `prev_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Position in the session's chain, starting at 0.
    pub sequence: u64,
    pub session_id: String,
    pub record: TransitionRecord,
    /// `this_hash` of the previous event, or `GENESIS_HASH` for the first.
    pub prev_hash: String,
    pub this_hash: String,
}

impl AuditEvent {
    /// The `prev_hash` of the first event in every chain.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// A snapshot of one session's audit chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub session_id: String,
    /// All events in chain order (sequence 0 first).
    pub events: Vec<AuditEvent>,
    /// When the session first reached a terminal status, if it has.
    pub finalized_at: Option<DateTime<Utc>>,
    /// The `this_hash` of the last event. Empty if the log is empty.
    pub terminal_hash: String,
}

impl AuditLog {
    /// Number of events that had to use a fallback result.
    pub fn fallback_count(&self) -> usize {
        self.events.iter().filter(|e| e.record.fallback).count()
    }
}
