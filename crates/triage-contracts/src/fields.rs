//! Field specifications: the per-endpoint contract for model output.
//!
//! Each endpoint declares the fields its response must carry, their semantic
//! type, and the conservative default substituted when the model omits or
//! mangles a field. All shape knowledge lives here; the extractor is generic.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Wire names of the fields used across endpoints.
pub mod names {
    pub const PRIMARY_CONDITION: &str = "primaryCondition";
    pub const CONFIDENCE: &str = "confidence";
    pub const DIFFERENTIALS: &str = "differentials";
    pub const RECOMMENDATIONS: &str = "recommendations";
    pub const RED_FLAGS: &str = "redFlags";
    pub const SELF_CARE: &str = "selfCare";
    pub const URGENCY: &str = "urgency";
    pub const REASONING_CHAIN: &str = "reasoningChain";
    pub const QUESTION: &str = "question";
    pub const READY_FOR_ANALYSIS: &str = "readyForAnalysis";
    pub const TARGET_CONDITION: &str = "targetCondition";
    pub const RATIONALE: &str = "rationale";
}

/// Placeholder for free-text fields the model did not provide.
pub const UNAVAILABLE_TEXT: &str = "Assessment unavailable - AI analysis could not be completed";

/// Confidence reported when the model gave none.
pub const DEFAULT_CONFIDENCE: i64 = 50;

/// Urgency reported when the model gave none.
pub const DEFAULT_URGENCY: &str = "medium";

/// Question asked when the model failed to produce one.
pub const DEFAULT_QUESTION: &str =
    "Can you describe any other symptoms or changes you have noticed?";

/// The semantic type a field must have.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Non-empty string.
    Text,
    /// Annotation string; may be empty, null or absent without a gap.
    OptionalText,
    /// Integer clamped to `[min, max]`.
    Integer { min: i64, max: i64 },
    Boolean,
    /// One of a closed set of lower-case members.
    Enum { allowed: Vec<String> },
    /// Array of strings.
    TextList,
    /// Array of `{condition, probability}` objects, probability 0–100.
    DifferentialList,
}

impl FieldKind {
    /// Whether a missing value is acceptable model output.
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::OptionalText)
    }
}

/// One required field: name, semantic type, and fallback default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub default: Value,
}

impl FieldSpec {
    pub fn text(name: &str, default: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Text,
            default: Value::String(default.to_string()),
        }
    }

    pub fn optional_text(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::OptionalText,
            default: Value::String(String::new()),
        }
    }

    pub fn integer(name: &str, min: i64, max: i64, default: i64) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Integer { min, max },
            default: json!(default.clamp(min, max)),
        }
    }

    /// An integer field in the 0–100 range.
    pub fn percent(name: &str, default: i64) -> Self {
        Self::integer(name, 0, 100, default)
    }

    pub fn boolean(name: &str, default: bool) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Boolean,
            default: Value::Bool(default),
        }
    }

    pub fn one_of(name: &str, allowed: &[&str], default: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Enum {
                allowed: allowed.iter().map(|s| s.to_ascii_lowercase()).collect(),
            },
            default: Value::String(default.to_string()),
        }
    }

    pub fn text_list(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::TextList,
            default: Value::Array(Vec::new()),
        }
    }

    pub fn differential_list(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::DifferentialList,
            default: Value::Array(Vec::new()),
        }
    }
}

/// The calling context of an LLM request; each has its own field contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    /// Single-shot analysis of a symptom form.
    QuickScan,
    /// Next question in the Deep Dive questioning phase.
    DeepDiveQuestion,
    /// Base-tier analysis at the end of Deep Dive questioning.
    DeepDiveAnalysis,
    /// One targeted Ask Me More follow-up question.
    AskMoreQuestion,
    /// Enhanced tier re-analysis.
    ThinkHarder,
    /// Ultra tier re-analysis.
    UltraThink,
}

impl EndpointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuickScan => "quick_scan",
            Self::DeepDiveQuestion => "deep_dive_question",
            Self::DeepDiveAnalysis => "deep_dive_analysis",
            Self::AskMoreQuestion => "ask_more_question",
            Self::ThinkHarder => "think_harder",
            Self::UltraThink => "ultra_think",
        }
    }

    /// The required fields this endpoint promises its callers.
    pub fn field_specs(&self) -> Vec<FieldSpec> {
        match self {
            Self::QuickScan | Self::DeepDiveAnalysis | Self::ThinkHarder => analysis_fields(),
            Self::UltraThink => {
                let mut fields = analysis_fields();
                fields.push(FieldSpec::text_list(names::REASONING_CHAIN));
                fields
            }
            Self::DeepDiveQuestion => vec![
                FieldSpec::text(names::QUESTION, DEFAULT_QUESTION),
                FieldSpec::percent(names::CONFIDENCE, DEFAULT_CONFIDENCE),
                FieldSpec::boolean(names::READY_FOR_ANALYSIS, false),
            ],
            Self::AskMoreQuestion => vec![
                FieldSpec::text(names::QUESTION, DEFAULT_QUESTION),
                FieldSpec::optional_text(names::TARGET_CONDITION),
                FieldSpec::optional_text(names::RATIONALE),
            ],
        }
    }
}

impl std::fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn analysis_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::text(names::PRIMARY_CONDITION, UNAVAILABLE_TEXT),
        FieldSpec::percent(names::CONFIDENCE, DEFAULT_CONFIDENCE),
        FieldSpec::differential_list(names::DIFFERENTIALS),
        FieldSpec::text_list(names::RECOMMENDATIONS),
        FieldSpec::text_list(names::RED_FLAGS),
        FieldSpec::text_list(names::SELF_CARE),
        FieldSpec::one_of(
            names::URGENCY,
            &["low", "medium", "high", "emergency"],
            DEFAULT_URGENCY,
        ),
    ]
}
