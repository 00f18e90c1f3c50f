//! Model calls with fallback, and tiered re-analysis.
//!
//! Every call goes the same way: prompt → model (retry once on the fallback
//! model if the primary fails at transport level) → extract → validate. The
//! orchestrator never touches persistence; it returns values the engine
//! applies to a session.

use tracing::{debug, info, warn};

use triage_contracts::{
    analysis::{AnalysisResult, Tier, TierOutcome},
    error::{TriageError, TriageResult},
    fields::EndpointKind,
    llm::LlmRequest,
    session::DiagnosticSession,
};
use triage_extract::{Extraction, ResponseExtractor, SchemaValidator, Validated};

use crate::{machine, prompts, traits::LlmProvider};

/// Text returned by a model together with the model that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub model: String,
}

pub struct TierOrchestrator<'a> {
    llm: &'a dyn LlmProvider,
    extractor: ResponseExtractor,
    validator: SchemaValidator,
}

impl<'a> TierOrchestrator<'a> {
    pub fn new(llm: &'a dyn LlmProvider) -> Self {
        Self {
            llm,
            extractor: ResponseExtractor::new(),
            validator: SchemaValidator::new(),
        }
    }

    /// Call `model`; on a transport failure retry once with `fallback_model`.
    ///
    /// Returns the second failure if both calls fail. Errors other than
    /// `Transport` are returned immediately.
    pub async fn call_with_fallback(
        &self,
        prompt: &str,
        model: &str,
        fallback_model: Option<&str>,
    ) -> TriageResult<Completion> {
        match self.llm.complete(&LlmRequest::new(prompt, model)).await {
            Ok(response) => Ok(Completion {
                text: response.text,
                model: model.to_string(),
            }),
            Err(TriageError::Transport { reason, .. }) => {
                let Some(fallback) = fallback_model else {
                    warn!(model, %reason, "model call failed, no fallback configured");
                    return Err(TriageError::Transport {
                        model: model.to_string(),
                        reason,
                    });
                };
                warn!(model, fallback, %reason, "model call failed, retrying on fallback model");
                let response = self.llm.complete(&LlmRequest::new(prompt, fallback)).await?;
                Ok(Completion {
                    text: response.text,
                    model: fallback.to_string(),
                })
            }
            Err(other) => Err(other),
        }
    }

    /// Run `prompt` and hold the answer to `endpoint`'s field contract.
    pub async fn ask(
        &self,
        prompt: &str,
        endpoint: EndpointKind,
        model: &str,
        fallback_model: Option<&str>,
    ) -> TriageResult<(Validated, String)> {
        let completion = self.call_with_fallback(prompt, model, fallback_model).await?;
        Ok((self.validate_text(&completion.text, endpoint), completion.model))
    }

    /// Run `prompt` as an analysis and convert the answer into a typed result.
    pub async fn analyze(
        &self,
        prompt: &str,
        endpoint: EndpointKind,
        model: &str,
        fallback_model: Option<&str>,
    ) -> TriageResult<AnalysisResult> {
        let (validated, used) = self.ask(prompt, endpoint, model, fallback_model).await?;
        Ok(AnalysisResult::from_validated(&validated.object, validated.fallback, Some(used)))
    }

    /// Re-analyse `session` at `tier` on top of the prior tier.
    ///
    /// Surfaces `Transport` when both the primary and fallback model fail, so
    /// the caller decides whether to fall back.
    pub async fn run_tier(
        &self,
        session: &DiagnosticSession,
        tier: Tier,
        model: &str,
        fallback_model: Option<&str>,
    ) -> TriageResult<TierOutcome> {
        let prior_tier = machine::prior_for(session, tier)?;
        let prior = session.analysis_tiers.get(prior_tier);

        let prompt = prompts::tier(session, tier, prior.map(|r| (prior_tier, r)));
        debug!(session_id = %session.id, %tier, %prior_tier, model, "running tier");

        let result = self
            .analyze(&prompt, prompts::endpoint_for(tier), model, fallback_model)
            .await?;
        let outcome = outcome_for(tier, result, Some(prior_tier), prior);

        info!(
            session_id = %session.id,
            %tier,
            confidence = outcome.result.confidence,
            delta = outcome.confidence_delta,
            fallback = outcome.result.fallback,
            "tier analysis complete"
        );
        Ok(outcome)
    }

    /// The fully defaulted result for `endpoint`, used when no model answered.
    pub fn fallback_analysis(&self, endpoint: EndpointKind) -> AnalysisResult {
        let validated = self.validator.validate(&Extraction::NotFound, &endpoint.field_specs());
        AnalysisResult::from_validated(&validated.object, true, None)
    }

    /// The fully defaulted answer for a non-analysis endpoint.
    pub fn fallback_answer(&self, endpoint: EndpointKind) -> Validated {
        self.validator.validate(&Extraction::NotFound, &endpoint.field_specs())
    }

    fn validate_text(&self, text: &str, endpoint: EndpointKind) -> Validated {
        let extracted = self.extractor.extract(text, Some(endpoint));
        self.validator.validate(&extracted, &endpoint.field_specs())
    }
}

/// Wrap `result` with its delta against `prior`.
pub fn outcome_for(
    tier: Tier,
    result: AnalysisResult,
    prior_tier: Option<Tier>,
    prior: Option<&AnalysisResult>,
) -> TierOutcome {
    let confidence_delta = prior.map_or(0, |p| i16::from(result.confidence) - i16::from(p.confidence));
    TierOutcome {
        tier,
        result,
        prior_tier,
        confidence_delta,
    }
}
