//! Versioned session documents.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use triage_contracts::{
    error::{TriageError, TriageResult},
    session::{DiagnosticSession, SessionId},
};
use triage_core::traits::SessionStore;

/// Sessions stored as JSON documents in a `HashMap` behind a `RwLock`.
///
/// Clones share the same map.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    documents: Arc<RwLock<HashMap<SessionId, Value>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The raw stored document, as an external reader would see it.
    pub async fn document(&self, id: &SessionId) -> Option<Value> {
        self.documents.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

fn encode(session: &DiagnosticSession) -> TriageResult<Value> {
    serde_json::to_value(session).map_err(|e| TriageError::Store {
        reason: format!("cannot encode session {}: {e}", session.id),
    })
}

fn decode(id: &SessionId, document: &Value) -> TriageResult<DiagnosticSession> {
    serde_json::from_value(document.clone()).map_err(|e| TriageError::Store {
        reason: format!("stored session {id} is corrupt: {e}"),
    })
}

fn stored_version(id: &SessionId, document: &Value) -> TriageResult<u64> {
    document
        .get("version")
        .and_then(Value::as_u64)
        .ok_or_else(|| TriageError::Store {
            reason: format!("stored session {id} has no version"),
        })
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, id: &SessionId) -> TriageResult<DiagnosticSession> {
        let documents = self.documents.read().await;
        let document = documents.get(id).ok_or_else(|| TriageError::session_not_found(id))?;
        decode(id, document)
    }

    async fn insert(&self, session: &DiagnosticSession) -> TriageResult<()> {
        let document = encode(session)?;
        let mut documents = self.documents.write().await;
        if documents.contains_key(&session.id) {
            return Err(TriageError::Store {
                reason: format!("session {} already exists", session.id),
            });
        }
        documents.insert(session.id, document);
        debug!(session_id = %session.id, "session inserted");
        Ok(())
    }

    async fn update(&self, session: &DiagnosticSession, expected_version: u64) -> TriageResult<u64> {
        let mut next = session.clone();
        next.version = expected_version + 1;
        let document = encode(&next)?;

        let mut documents = self.documents.write().await;
        let current = documents
            .get(&session.id)
            .ok_or_else(|| TriageError::session_not_found(session.id))?;

        let found = stored_version(&session.id, current)?;
        if found != expected_version {
            return Err(TriageError::VersionConflict {
                id: session.id.to_string(),
                expected: expected_version,
                found,
            });
        }

        documents.insert(session.id, document);
        debug!(session_id = %session.id, version = next.version, "session updated");
        Ok(next.version)
    }
}
