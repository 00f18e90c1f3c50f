//! # triage-llm
//!
//! `HttpLlmProvider` speaks the OpenAI-compatible chat completions API. Any
//! failure to get text back (connection, timeout, non-2xx status, a reply
//! with no choices) is reported as `TriageError::Transport` so the engine can
//! retry on the fallback model.

pub mod openai;

pub use openai::HttpLlmProvider;
