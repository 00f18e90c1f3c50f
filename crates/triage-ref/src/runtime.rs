//! Wiring shared by the reference scenarios.

use triage_audit::InMemoryAuditWriter;
use triage_config::EngineConfig;
use triage_contracts::{error::TriageResult, session::SessionId};
use triage_core::SessionEngine;
use triage_store::{InMemoryRecordSource, InMemorySessionStore};

use crate::{mock_data, scripted::ScriptedLlm};

/// An engine over in-memory components, plus handles to inspect them.
///
/// The handles are clones of what the engine owns; all in-memory components
/// share their state across clones.
pub struct ReferenceRuntime {
    pub engine: SessionEngine,
    pub llm: ScriptedLlm,
    pub store: InMemorySessionStore,
    pub records: InMemoryRecordSource,
    pub audit: InMemoryAuditWriter,
}

/// What a scenario leaves behind in the audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    pub name: &'static str,
    pub audit_events: usize,
    pub fallback_events: usize,
    pub chain_verified: bool,
    pub final_confidence: Option<u8>,
}

impl ReferenceRuntime {
    /// Build a runtime whose record source is seeded with the reference history.
    pub async fn seeded(config: EngineConfig) -> Self {
        let llm = ScriptedLlm::new();
        let store = InMemorySessionStore::new();
        let records = InMemoryRecordSource::new();
        let audit = InMemoryAuditWriter::new();
        mock_data::seed_history(&records).await;

        let engine = SessionEngine::new(
            Box::new(llm.clone()),
            Box::new(store.clone()),
            Box::new(records.clone()),
            Box::new(audit.clone()),
            config,
        );

        Self { engine, llm, store, records, audit }
    }

    /// Summarise the audit trail of `session`, or of every session when `None`.
    pub async fn report(&self, name: &'static str, session: Option<&SessionId>) -> TriageResult<ScenarioReport> {
        let (audit_events, fallback_events, final_confidence) = match session {
            Some(id) => {
                let log = self.audit.export_log(&id.to_string())?;
                let stored = self.engine.session(id).await?;
                (
                    log.as_ref().map(|l| l.events.len()).unwrap_or(0),
                    log.as_ref().map(|l| l.fallback_count()).unwrap_or(0),
                    stored.final_confidence,
                )
            }
            None => {
                let mut events = 0;
                for id in self.audit.session_ids()? {
                    events += self.audit.export_log(&id)?.map(|l| l.events.len()).unwrap_or(0);
                }
                (events, self.audit.fallback_count()?, None)
            }
        };

        Ok(ScenarioReport {
            name,
            audit_events,
            fallback_events,
            chain_verified: self.audit.verify_integrity(),
            final_confidence,
        })
    }
}

/// Print the closing lines every scenario shares.
pub fn print_audit(report: &ScenarioReport) {
    println!("  Audit events:      {}", report.audit_events);
    println!("  Fallback events:   {}", report.fallback_events);
    println!(
        "  Audit chain:       {}",
        if report.chain_verified { "VERIFIED" } else { "BROKEN" }
    );
    println!();
}
