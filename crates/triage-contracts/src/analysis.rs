//! Analysis results and the per-session tier map.
//!
//! An `AnalysisResult` is only ever built from a validated object (see
//! `AnalysisResult::from_validated`), so every field the endpoint contract
//! promises is present by construction.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::fields::names;

/// How soon the user should seek care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Emergency,
}

impl Urgency {
    pub const ALL: [Urgency; 4] = [Self::Low, Self::Medium, Self::High, Self::Emergency];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Emergency => "emergency",
        }
    }

    /// Case-insensitive lookup of a member name.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|u| u.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A competing diagnosis with its independent likelihood.
///
/// Probabilities across a list do not need to sum to 100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Differential {
    pub condition: String,
    /// 0–100.
    pub probability: u8,
}

/// Escalating re-analysis levels applied to the same session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// The first analysis produced when questioning ends.
    Base,
    /// "Think Harder".
    Enhanced,
    /// "Ultra Think".
    Ultra,
}

impl Tier {
    /// Tiers in ascending priority order.
    pub const ALL: [Tier; 3] = [Self::Base, Self::Enhanced, Self::Ultra];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Enhanced => "enhanced",
            Self::Ultra => "ultra",
        }
    }

    pub fn previous(&self) -> Option<Tier> {
        match self {
            Self::Base => None,
            Self::Enhanced => Some(Self::Base),
            Self::Ultra => Some(Self::Enhanced),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The structured output of one LLM analysis pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub primary_condition: String,
    /// 0–100.
    pub confidence: u8,
    pub differentials: Vec<Differential>,
    pub recommendations: Vec<String>,
    pub red_flags: Vec<String>,
    pub self_care: Vec<String>,
    pub urgency: Urgency,
    /// Step-by-step reasoning; populated by the ultra tier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_chain: Option<Vec<String>>,
    /// True when any field was synthesized because the model output was
    /// unusable. Tracked so fallback frequency can be measured.
    pub fallback: bool,
    /// Model that produced the text, if a call succeeded.
    #[serde(default)]
    pub model: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl AnalysisResult {
    /// Convert a validated object into the typed record.
    ///
    /// The validator guarantees shapes, so lookups here only ever fall back to
    /// the same conservative values the field specs declare.
    pub fn from_validated(object: &Map<String, Value>, fallback: bool, model: Option<String>) -> Self {
        let text = |key: &str| object.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
        let list = |key: &str| -> Vec<String> {
            object
                .get(key)
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default()
        };

        let differentials = object
            .get(names::DIFFERENTIALS)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        Some(Differential {
                            condition: item.get("condition")?.as_str()?.to_string(),
                            probability: clamp_percent(item.get("probability").and_then(Value::as_i64).unwrap_or(0)),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let reasoning_chain = object
            .get(names::REASONING_CHAIN)
            .and_then(Value::as_array)
            .map(|steps| steps.iter().filter_map(Value::as_str).map(str::to_string).collect());

        Self {
            primary_condition: text(names::PRIMARY_CONDITION),
            confidence: clamp_percent(
                object.get(names::CONFIDENCE).and_then(Value::as_i64).unwrap_or(50),
            ),
            differentials,
            recommendations: list(names::RECOMMENDATIONS),
            red_flags: list(names::RED_FLAGS),
            self_care: list(names::SELF_CARE),
            urgency: object
                .get(names::URGENCY)
                .and_then(Value::as_str)
                .and_then(Urgency::parse)
                .unwrap_or(Urgency::Medium),
            reasoning_chain,
            fallback,
            model,
            generated_at: Utc::now(),
        }
    }

    /// The most likely competing diagnosis other than the primary one.
    pub fn strongest_differential(&self) -> Option<&Differential> {
        self.differentials
            .iter()
            .filter(|d| !d.condition.eq_ignore_ascii_case(&self.primary_condition))
            .max_by_key(|d| d.probability)
    }
}

/// Clamp any integer into the 0–100 percentage range.
pub fn clamp_percent(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}

/// One tier's reported confidence, in the order tiers were produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfidence {
    pub tier: Tier,
    pub confidence: u8,
}

/// Per-session analysis results, one named slot per tier.
///
/// Stored as `baseAnalysis` / `enhancedAnalysis` / `ultraAnalysis` so each
/// tier is a direct field lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisTiers {
    #[serde(default)]
    pub base_analysis: Option<AnalysisResult>,
    #[serde(default)]
    pub enhanced_analysis: Option<AnalysisResult>,
    #[serde(default)]
    pub ultra_analysis: Option<AnalysisResult>,
}

impl AnalysisTiers {
    pub fn get(&self, tier: Tier) -> Option<&AnalysisResult> {
        match tier {
            Tier::Base => self.base_analysis.as_ref(),
            Tier::Enhanced => self.enhanced_analysis.as_ref(),
            Tier::Ultra => self.ultra_analysis.as_ref(),
        }
    }

    pub fn set(&mut self, tier: Tier, result: AnalysisResult) {
        let slot = match tier {
            Tier::Base => &mut self.base_analysis,
            Tier::Enhanced => &mut self.enhanced_analysis,
            Tier::Ultra => &mut self.ultra_analysis,
        };
        *slot = Some(result);
    }

    pub fn is_empty(&self) -> bool {
        Tier::ALL.iter().all(|t| self.get(*t).is_none())
    }

    /// The highest tier that has a stored result.
    pub fn highest(&self) -> Option<(Tier, &AnalysisResult)> {
        Tier::ALL
            .iter()
            .rev()
            .find_map(|t| self.get(*t).map(|result| (*t, result)))
    }

    /// Every stored tier's confidence, verbatim and in tier order.
    pub fn confidence_progression(&self) -> Vec<TierConfidence> {
        Tier::ALL
            .iter()
            .filter_map(|t| {
                self.get(*t).map(|r| TierConfidence {
                    tier: *t,
                    confidence: r.confidence,
                })
            })
            .collect()
    }

    /// Highest tier's content paired with the maximum confidence over all
    /// tiers.
    pub fn best_available(&self) -> Option<BestAvailable> {
        let (tier, analysis) = self.highest()?;
        let progression = self.confidence_progression();
        let confidence = progression
            .iter()
            .map(|tc| tc.confidence)
            .max()
            .unwrap_or(analysis.confidence);

        Some(BestAvailable {
            tier,
            analysis: analysis.clone(),
            confidence,
            progression,
        })
    }
}

/// The "best available" presentation of a session's analyses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BestAvailable {
    /// Tier whose content is shown.
    pub tier: Tier,
    pub analysis: AnalysisResult,
    /// max(confidence) across all stored tiers.
    pub confidence: u8,
    pub progression: Vec<TierConfidence>,
}

/// Result of one re-analysis tier run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierOutcome {
    pub tier: Tier,
    pub result: AnalysisResult,
    /// The tier whose result was fed into the prompt.
    pub prior_tier: Option<Tier>,
    /// `result.confidence - prior.confidence`; may be negative.
    pub confidence_delta: i16,
}
