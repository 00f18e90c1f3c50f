//! # triage-audit
//!
//! Append-only, SHA-256 hash-chained log of session transitions.
//!
//! ## Overview
//!
//! Every `TransitionRecord` the engine writes is wrapped in an `AuditEvent`
//! that links to the previous event of the same session via its SHA-256
//! hash. Tampering with any event breaks its session's chain and is detected
//! by `verify_chain`. Sessions are never deleted; this log is their history.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use triage_audit::InMemoryAuditWriter;
//! use triage_core::traits::AuditWriter;
//!
//! let writer = InMemoryAuditWriter::new();
//! writer.write(&record)?;
//! writer.finalize(&record.session_id)?;
//!
//! assert!(writer.verify_integrity());
//! let log = writer.export_log(&record.session_id)?;
//! ```

pub mod chain;
pub mod event;
pub mod memory;

pub use chain::{hash_event, verify_chain};
pub use event::{AuditEvent, AuditLog};
pub use memory::InMemoryAuditWriter;

// ── Tests ─────────────────────────────────────────────────────────────────────
