//! Hash-chain primitives: hashing and chain integrity verification.
//!
//! Hash input layout (bytes, in order):
//!   1. session_id as UTF-8 bytes
//!   2. sequence as 8-byte little-endian
//!   3. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   4. compact JSON of the transition record

use sha2::{Digest, Sha256};

use triage_contracts::{
    error::{TriageError, TriageResult},
    transition::TransitionRecord,
};

use crate::event::AuditEvent;

/// Compute the SHA-256 hash for one event of a session's chain.
///
/// Returns a lowercase 64-character hex string.
pub fn hash_event(
    session_id: &str,
    sequence: u64,
    record: &TransitionRecord,
    prev_hash: &str,
) -> TriageResult<String> {
    let record_json = serde_json::to_vec(record).map_err(|e| TriageError::AuditWriteFailed {
        reason: format!("transition record is not serializable: {e}"),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(session_id.as_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&record_json);

    Ok(hex::encode(hasher.finalize()))
}

/// Verify one session's chain.
///
/// Valid when every event links to its predecessor (the first to
/// `GENESIS_HASH`), carries the next sequence number, and its `this_hash`
/// matches the recomputed value. An empty chain is valid.
pub fn verify_chain(events: &[AuditEvent]) -> bool {
    let mut expected_prev = AuditEvent::GENESIS_HASH.to_string();

    for (position, event) in events.iter().enumerate() {
        if event.prev_hash != expected_prev || event.sequence != position as u64 {
            return false;
        }

        match hash_event(&event.session_id, event.sequence, &event.record, &event.prev_hash) {
            Ok(recomputed) if recomputed == event.this_hash => {}
            _ => return false,
        }

        expected_prev = event.this_hash.clone();
    }

    true
}
