//! # triage-config
//!
//! TOML-driven configuration for the triage engine: model names per tier,
//! question caps, confidence thresholds, and LLM transport settings.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use triage_config::EngineConfig;
//!
//! let config = EngineConfig::from_file(Path::new("triage.toml"))?;
//! ```
//!
//! Every field has a default, so partial documents only override what they
//! name.

pub mod config;
pub mod loader;

pub use config::{EngineConfig, LimitConfig, LlmConfig, ModelConfig};

// ── Tests ─────────────────────────────────────────────────────────────────────
