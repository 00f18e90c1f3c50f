//! Runtime error types for the triage pipeline.
//!
//! Only outcomes the calling layer must act on are errors. Unparseable model
//! output and missing fields are absorbed by the validator and never appear
//! here; they surface as `fallback = true` on the resulting analysis instead.

use thiserror::Error;

/// The unified error type for the triage runtime.
#[derive(Debug, Error)]
pub enum TriageError {
    /// The operation is not permitted in the session's current status, or a
    /// precondition such as "a question is pending" does not hold.
    #[error("operation '{operation}' rejected in status '{status}': {reason}")]
    StateConflict {
        operation: String,
        status: String,
        reason: String,
    },

    /// The caller supplied an unusable value (empty answer, unknown tier, ...).
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// The referenced session or record does not exist.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: String, id: String },

    /// The LLM provider call failed (network, auth, quota, timeout).
    #[error("model '{model}' call failed: {reason}")]
    Transport { model: String, reason: String },

    /// The persistence store could not complete a read or write.
    ///
    /// Fatal for the request; never retried inside the core.
    #[error("store operation failed: {reason}")]
    Store { reason: String },

    /// A concurrent writer updated the session first.
    #[error("session '{id}' was modified concurrently (expected version {expected}, found {found})")]
    VersionConflict { id: String, expected: u64, found: u64 },

    /// The audit writer could not record a transition.
    #[error("audit write failed: {reason}")]
    AuditWriteFailed { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },
}

impl TriageError {
    /// Shorthand for a `StateConflict` built from display-able parts.
    pub fn conflict(
        operation: impl Into<String>,
        status: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::StateConflict {
            operation: operation.into(),
            status: status.to_string(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a missing session.
    pub fn session_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "session".to_string(),
            id: id.to_string(),
        }
    }
}

/// Convenience alias used throughout the triage crates.
pub type TriageResult<T> = Result<T, TriageError>;
