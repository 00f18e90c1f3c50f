//! # triage-ref
//!
//! Reference runtime for the triage engine.
//!
//! Demonstrates four scenarios using scripted model replies:
//!
//! 1. **Quick Scan**: clean JSON, fenced JSON and an unparseable refusal
//!    through the same extract/validate pipeline.
//! 2. **Deep Dive**: the question loop, the base analysis and finalization.
//! 3. **Ask Me More**: follow-up questions until the question cap is hit.
//! 4. **Tier Progression**: Think Harder and Ultra Think on top of the base
//!    analysis, with a lower-confidence tier recorded verbatim.
//!
//! All data is hardcoded and fictional. No external API calls are made.

pub mod mock_data;
pub mod runtime;
pub mod scenarios;
pub mod scripted;

pub use runtime::{ReferenceRuntime, ScenarioReport};
pub use scripted::ScriptedLlm;
