//! Loading and validating `EngineConfig` from TOML.

use std::path::Path;

use tracing::{debug, warn};

use triage_contracts::error::{TriageError, TriageResult};

use crate::config::EngineConfig;

impl EngineConfig {
    /// Parse `s` as TOML and validate the result.
    ///
    /// Returns `TriageError::ConfigError` if the TOML is malformed, does not
    /// match the `EngineConfig` schema, or fails `validate`.
    pub fn from_toml_str(s: &str) -> TriageResult<Self> {
        let config: EngineConfig = toml::from_str(s).map_err(|e| TriageError::ConfigError {
            reason: format!("failed to parse engine TOML: {}", e),
        })?;
        config.validate()?;
        debug!(
            base_model = %config.models.base,
            max_additional = config.limits.max_additional_questions,
            target_confidence = config.limits.target_confidence,
            "engine configuration loaded"
        );
        Ok(config)
    }

    /// Read the file at `path` and parse it as TOML engine configuration.
    pub fn from_file(path: &Path) -> TriageResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| TriageError::ConfigError {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Reject values the engine cannot honour.
    pub fn validate(&self) -> TriageResult<()> {
        let limits = &self.limits;
        for (name, value) in [
            ("limits.target_confidence", limits.target_confidence),
            ("limits.ready_confidence", limits.ready_confidence),
        ] {
            if value > 100 {
                return Err(TriageError::ConfigError {
                    reason: format!("{name} must be between 0 and 100, got {value}"),
                });
            }
        }

        if limits.max_initial_questions == 0 {
            return Err(TriageError::ConfigError {
                reason: "limits.max_initial_questions must be at least 1".to_string(),
            });
        }

        for (name, model) in [
            ("models.base", &self.models.base),
            ("models.enhanced", &self.models.enhanced),
            ("models.ultra", &self.models.ultra),
            ("models.question", &self.models.question),
        ] {
            if model.trim().is_empty() {
                return Err(TriageError::ConfigError {
                    reason: format!("{name} must name a model"),
                });
            }
        }

        if self.llm.timeout_secs == 0 {
            warn!("llm.timeout_secs is 0; every call will time out immediately");
        }

        Ok(())
    }
}
