//! Engine configuration schema.
//!
//! An `EngineConfig` is deserialized from TOML. Every section and field has a
//! default, so an empty document is a valid configuration.
//!
//! Example:
//! ```toml
//! [models]
//! base = "gpt-4o-mini"
//! enhanced = "gpt-4o"
//! ultra = "o1"
//! fallback = "gpt-4o-mini"
//!
//! [limits]
//! max_additional_questions = 5
//! target_confidence = 90
//! ```

use serde::{Deserialize, Serialize};

use triage_contracts::analysis::Tier;

/// Model names per call type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Quick scans and the base Deep Dive analysis.
    pub base: String,
    /// Think Harder.
    pub enhanced: String,
    /// Ultra Think.
    pub ultra: String,
    /// Deep Dive and Ask Me More questions.
    pub question: String,
    /// Retried once when the primary model's call fails at transport level.
    pub fallback: Option<String>,
}

impl ModelConfig {
    pub fn for_tier(&self, tier: Tier) -> &str {
        match tier {
            Tier::Base => &self.base,
            Tier::Enhanced => &self.enhanced,
            Tier::Ultra => &self.ultra,
        }
    }

    /// The fallback model, unless it is the same as `primary`.
    pub fn fallback_for(&self, primary: &str) -> Option<&str> {
        self.fallback.as_deref().filter(|f| *f != primary)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base: "gpt-4o-mini".to_string(),
            enhanced: "gpt-4o".to_string(),
            ultra: "o1".to_string(),
            question: "gpt-4o-mini".to_string(),
            fallback: Some("gpt-4o-mini".to_string()),
        }
    }
}

/// Question caps and confidence thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitConfig {
    /// Hard cap on Ask Me More questions per session.
    pub max_additional_questions: u32,
    /// Ask Me More stops once the session reaches this confidence.
    pub target_confidence: u8,
    /// Deep Dive questions after which the session is ready for analysis.
    pub max_initial_questions: u32,
    /// Model-reported confidence at which questioning may stop early.
    pub ready_confidence: u8,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_additional_questions: 5,
            target_confidence: 90,
            max_initial_questions: 6,
            ready_confidence: 85,
        }
    }
}

/// HTTP settings for the OpenAI-compatible provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    /// A call exceeding this is treated as a transport failure.
    pub timeout_secs: u64,
    /// Environment variable holding the bearer token, if any.
    pub api_key_env: Option<String>,
    pub max_tokens: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            timeout_secs: 60,
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            max_tokens: Some(2048),
        }
    }
}

/// The top-level structure deserialized from a TOML config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub models: ModelConfig,
    pub limits: LimitConfig,
    pub llm: LlmConfig,
}
