//! # triage-core
//!
//! The diagnostic session runtime.
//!
//! This crate provides:
//! - The four I/O seams (`LlmProvider`, `SessionStore`, `RecordSource`, `AuditWriter`)
//! - The pure session state machine (`machine`)
//! - Prompt builders, context gathering and the tier orchestrator
//! - The `SessionEngine` that wires them together for every session operation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use triage_core::{SessionEngine, traits::{LlmProvider, SessionStore, RecordSource, AuditWriter}};
//! ```

pub mod engine;
pub mod gather;
pub mod machine;
pub mod orchestrator;
pub mod prompts;
pub mod traits;

pub use engine::SessionEngine;
pub use gather::DataGatherer;
pub use orchestrator::{Completion, TierOrchestrator};
