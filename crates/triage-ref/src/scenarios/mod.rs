//! Reference scenarios.
//!
//! Each scenario builds its own `ReferenceRuntime`, scripts the model
//! replies it needs, drives the engine and prints what happened. Every
//! scenario ends by checking the audit hash chain.

pub mod ask_more;
pub mod deep_dive;
pub mod quick_scan;
pub mod tier_progression;
