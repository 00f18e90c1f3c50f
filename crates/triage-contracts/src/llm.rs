//! The opaque text channel to an LLM provider.
//!
//! The core sends a prompt and a model name and receives text. Nothing about
//! the text is trusted: it goes through extraction and validation before any
//! of it reaches a typed record.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmRequest {
    pub prompt: String,
    pub model: String,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
}
