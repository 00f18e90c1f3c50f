//! In-memory implementation of `AuditWriter`.
//!
//! `InMemoryAuditWriter` keeps one hash chain per session behind a `Mutex`.
//! Clones share the same chains, so a caller can keep a handle for
//! inspection after boxing another into the engine.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use triage_contracts::{
    error::{TriageError, TriageResult},
    transition::TransitionRecord,
};
use triage_core::traits::AuditWriter;

use crate::{
    chain::{hash_event, verify_chain},
    event::{AuditEvent, AuditLog},
};

/// One session's chain.
pub(crate) struct SessionChain {
    pub(crate) events: Vec<AuditEvent>,
    pub(crate) last_hash: String,
    pub(crate) finalized_at: Option<DateTime<Utc>>,
}

impl SessionChain {
    fn new() -> Self {
        Self {
            events: Vec::new(),
            last_hash: AuditEvent::GENESIS_HASH.to_string(),
            finalized_at: None,
        }
    }
}

/// An in-memory, append-only audit writer with a SHA-256 chain per session.
#[derive(Clone, Default)]
pub struct InMemoryAuditWriter {
    pub(crate) chains: Arc<Mutex<BTreeMap<String, SessionChain>>>,
}

impl InMemoryAuditWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one session's chain, or `None` if nothing was written.
    pub fn export_log(&self, session_id: &str) -> TriageResult<Option<AuditLog>> {
        let chains = self.lock()?;
        Ok(chains.get(session_id).map(|chain| AuditLog {
            session_id: session_id.to_string(),
            events: chain.events.clone(),
            finalized_at: chain.finalized_at,
            terminal_hash: chain.events.last().map(|e| e.this_hash.clone()).unwrap_or_default(),
        }))
    }

    /// Sessions with at least one event, in id order.
    pub fn session_ids(&self) -> TriageResult<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    /// True when every session's chain verifies.
    pub fn verify_integrity(&self) -> bool {
        match self.chains.lock() {
            Ok(chains) => chains.values().all(|chain| verify_chain(&chain.events)),
            Err(_) => false,
        }
    }

    /// Records across all sessions that used a fallback result.
    ///
    /// Counts model outputs the pipeline could not use as returned.
    pub fn fallback_count(&self) -> TriageResult<usize> {
        Ok(self
            .lock()?
            .values()
            .flat_map(|chain| chain.events.iter())
            .filter(|event| event.record.fallback)
            .count())
    }

    fn lock(&self) -> TriageResult<MutexGuard<'_, BTreeMap<String, SessionChain>>> {
        self.chains.lock().map_err(|e| TriageError::AuditWriteFailed {
            reason: format!("audit state lock poisoned: {}", e),
        })
    }
}

impl AuditWriter for InMemoryAuditWriter {
    /// Append `record` to its session's chain.
    fn write(&self, record: &TransitionRecord) -> TriageResult<()> {
        let mut chains = self.lock()?;
        let chain = chains
            .entry(record.session_id.clone())
            .or_insert_with(SessionChain::new);

        let sequence = chain.events.len() as u64;
        let prev_hash = chain.last_hash.clone();
        let this_hash = hash_event(&record.session_id, sequence, record, &prev_hash)?;

        debug!(
            session_id = %record.session_id,
            sequence,
            operation = %record.operation,
            fallback = record.fallback,
            "audit event appended"
        );

        chain.events.push(AuditEvent {
            sequence,
            session_id: record.session_id.clone(),
            record: record.clone(),
            prev_hash,
            this_hash: this_hash.clone(),
        });
        chain.last_hash = this_hash;
        Ok(())
    }

    /// Stamp the session's chain as finalized. Later writes still append.
    fn finalize(&self, session_id: &str) -> TriageResult<()> {
        let mut chains = self.lock()?;
        let chain = chains.get_mut(session_id).ok_or_else(|| TriageError::AuditWriteFailed {
            reason: format!("cannot finalize session '{session_id}' with no audit events"),
        })?;

        let finalized_at = *chain.finalized_at.get_or_insert_with(Utc::now);
        info!(
            session_id = %session_id,
            event_count = chain.events.len(),
            terminal_hash = %chain.last_hash,
            %finalized_at,
            "audit log finalized"
        );
        Ok(())
    }
}
