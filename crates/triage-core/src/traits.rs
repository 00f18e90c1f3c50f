//! Core trait definitions for the triage pipeline.
//!
//! These four traits are the engine's only contact with the outside world:
//!
//! - `LlmProvider`: untrusted text source (its output is always extracted
//!   and validated before use)
//! - `SessionStore`: persistence for diagnostic sessions, versioned
//! - `RecordSource`: read-only access to a user's historical records
//! - `AuditWriter`: trusted sink (records every transition immutably)
//!
//! The first three are async because real implementations do I/O. The audit
//! writer is synchronous: it must complete before an operation returns.

use async_trait::async_trait;

use triage_contracts::{
    context::{DeepDiveRecord, ScanRecord, TrackingPoint},
    error::TriageResult,
    llm::{LlmRequest, LlmResponse},
    session::{DiagnosticSession, SessionId},
    transition::TransitionRecord,
};

/// A language model reachable by prompt and model name.
///
/// Any failure to obtain text (network, auth, quota, timeout) must be
/// reported as `TriageError::Transport`. Returning text that is not JSON is
/// not an error; the extractor deals with it.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> TriageResult<LlmResponse>;
}

/// Keyed persistence for diagnostic sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session. Returns `TriageError::NotFound` for unknown ids.
    async fn get(&self, id: &SessionId) -> TriageResult<DiagnosticSession>;

    /// Persist a brand-new session.
    async fn insert(&self, session: &DiagnosticSession) -> TriageResult<()>;

    /// Replace the stored session if its version still equals
    /// `expected_version`, and return the new version.
    ///
    /// Implementations must return `TriageError::VersionConflict` when another
    /// writer got there first. The stored version must strictly increase.
    async fn update(&self, session: &DiagnosticSession, expected_version: u64) -> TriageResult<u64>;
}

/// Read-only source of a user's earlier scans, sessions and tracking data.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn quick_scans(&self, user_id: &str) -> TriageResult<Vec<ScanRecord>>;
    async fn deep_dives(&self, user_id: &str) -> TriageResult<Vec<DeepDiveRecord>>;
    async fn tracking_points(&self, user_id: &str) -> TriageResult<Vec<TrackingPoint>>;
}

/// The audit writer: the immutable transition record.
///
/// Every operation the engine performs, including idempotent repeats and
/// rejected ask-more requests, produces exactly one `TransitionRecord`. A
/// failed write is fatal and surfaces as `TriageError::AuditWriteFailed`.
pub trait AuditWriter: Send + Sync {
    /// Append one record. Records are never modified or deleted.
    fn write(&self, record: &TransitionRecord) -> TriageResult<()>;

    /// Called once a session reaches `Completed` or `Abandoned`.
    fn finalize(&self, session_id: &str) -> TriageResult<()>;
}
