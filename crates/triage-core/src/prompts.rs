//! Prompt construction for every endpoint.
//!
//! Prompts are plain text. Each one ends with the JSON shape the validator
//! will hold the answer to, rendered from the endpoint's field specs, so the
//! contract the model is told about and the contract we enforce are the same
//! list.

use serde_json::{Map, Value};

use triage_contracts::{
    analysis::{AnalysisResult, Tier},
    context::{AnalysisRequest, ContextBundle},
    fields::{EndpointKind, FieldKind},
    session::{DiagnosticSession, QuestionPhase},
};

const ROLE: &str = "You are a careful clinical triage assistant. You do not replace a \
doctor; you help the user understand what their symptoms may indicate and how urgently \
they should seek care.";

/// Single-shot analysis of a symptom form.
pub fn quick_scan(request: &AnalysisRequest, context: &ContextBundle) -> String {
    let mut prompt = header();
    prompt.push_str(&format!("BODY AREA: {}\n", request.category));
    prompt.push_str(&form_section(&request.form_data));
    push_context(&mut prompt, context);
    prompt.push_str("\nAssess the most likely condition and its differentials.\n");
    prompt.push_str(&response_shape(EndpointKind::QuickScan));
    prompt
}

/// The next question of the Deep Dive questioning phase.
pub fn deep_dive_question(session: &DiagnosticSession, context: &ContextBundle) -> String {
    let mut prompt = header();
    prompt.push_str(&session_section(session));
    push_context(&mut prompt, context);
    prompt.push_str(
        "\nAsk the single most informative next question. Do not repeat a question \
         that was already asked. Set readyForAnalysis to true once further questions \
         would not change your assessment.\n",
    );
    prompt.push_str(&response_shape(EndpointKind::DeepDiveQuestion));
    prompt
}

/// The base-tier analysis at the end of questioning.
pub fn base_analysis(session: &DiagnosticSession, context: &ContextBundle) -> String {
    let mut prompt = header();
    prompt.push_str(&session_section(session));
    push_context(&mut prompt, context);
    prompt.push_str("\nGive your assessment based on everything above.\n");
    prompt.push_str(&response_shape(EndpointKind::DeepDiveAnalysis));
    prompt
}

/// One Ask Me More question aimed at separating the current diagnosis from
/// its strongest competitor.
pub fn ask_more(session: &DiagnosticSession, current: &AnalysisResult, target_confidence: u8) -> String {
    let mut prompt = header();
    prompt.push_str(&session_section(session));
    prompt.push_str(&format!(
        "\nCURRENT ASSESSMENT: {} ({}% confidence)\n",
        current.primary_condition, current.confidence
    ));
    match current.strongest_differential() {
        Some(rival) => prompt.push_str(&format!(
            "STRONGEST ALTERNATIVE: {} ({}%)\n",
            rival.condition, rival.probability
        )),
        None => prompt.push_str("STRONGEST ALTERNATIVE: none recorded\n"),
    }
    prompt.push_str(&format!(
        "\nAsk one question whose answer would best confirm or rule out the current \
         assessment against the alternative, to move confidence toward {target_confidence}%. \
         Name the condition the question targets.\n"
    ));
    prompt.push_str(&response_shape(EndpointKind::AskMoreQuestion));
    prompt
}

/// Re-analysis at `tier`, building on the `prior` tier's result.
pub fn tier(session: &DiagnosticSession, tier: Tier, prior: Option<(Tier, &AnalysisResult)>) -> String {
    let mut prompt = header();
    prompt.push_str(&session_section(session));

    if let Some((prior_tier, result)) = prior {
        prompt.push_str(&format!(
            "\nPREVIOUS {} ANALYSIS: {} ({}% confidence, {} urgency)\n",
            prior_tier.as_str().to_uppercase(),
            result.primary_condition,
            result.confidence,
            result.urgency
        ));
        for d in &result.differentials {
            prompt.push_str(&format!("- alternative: {} ({}%)\n", d.condition, d.probability));
        }
    }

    let endpoint = endpoint_for(tier);
    match tier {
        Tier::Ultra => prompt.push_str(
            "\nReason step by step. Challenge the previous analysis, weigh every \
             alternative against each answer, and record each reasoning step in \
             reasoningChain. Report your own confidence honestly even if it is lower.\n",
        ),
        _ => prompt.push_str(
            "\nThink harder than the previous analysis. Re-examine each answer for \
             details that were missed and revise the assessment if warranted. Report \
             your own confidence honestly even if it is lower.\n",
        ),
    }
    prompt.push_str(&response_shape(endpoint));
    prompt
}

/// The endpoint whose field specs apply to an analysis at `tier`.
pub fn endpoint_for(tier: Tier) -> EndpointKind {
    match tier {
        Tier::Base => EndpointKind::DeepDiveAnalysis,
        Tier::Enhanced => EndpointKind::ThinkHarder,
        Tier::Ultra => EndpointKind::UltraThink,
    }
}

fn header() -> String {
    format!("{ROLE}\n\n")
}

fn form_section(form: &Map<String, Value>) -> String {
    if form.is_empty() {
        return "SYMPTOM FORM: (empty)\n".to_string();
    }
    let mut out = String::from("SYMPTOM FORM:\n");
    for (key, value) in form {
        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        out.push_str(&format!("- {key}: {rendered}\n"));
    }
    out
}

fn session_section(session: &DiagnosticSession) -> String {
    let mut out = format!("BODY AREA: {}\n", session.body_part);
    out.push_str(&form_section(&session.form_data));
    if session.questions.is_empty() {
        return out;
    }

    out.push_str("\nQUESTIONS SO FAR:\n");
    for (i, qa) in session.questions.iter().enumerate() {
        let tag = match qa.phase {
            QuestionPhase::Initial => "",
            QuestionPhase::Additional => " [follow-up]",
        };
        out.push_str(&format!("Q{}{}: {}\n", i + 1, tag, qa.question));
        out.push_str(&format!("A{}: {}\n", i + 1, qa.answer.as_deref().unwrap_or("(not answered)")));
    }
    out
}

fn push_context(prompt: &mut String, context: &ContextBundle) {
    if !context.is_empty() {
        prompt.push('\n');
        prompt.push_str(&context.summary());
    }
}

/// "Respond with JSON only" plus one line per required field.
fn response_shape(endpoint: EndpointKind) -> String {
    let mut out = String::from("\nRespond with a single JSON object and nothing else, with these fields:\n");
    for field in endpoint.field_specs() {
        let shape = match &field.kind {
            FieldKind::Text => "string".to_string(),
            FieldKind::OptionalText => "string, may be empty".to_string(),
            FieldKind::Integer { min, max } => format!("integer {min}-{max}"),
            FieldKind::Boolean => "boolean".to_string(),
            FieldKind::Enum { allowed } => format!("one of {}", allowed.join(" | ")),
            FieldKind::TextList => "array of strings".to_string(),
            FieldKind::DifferentialList => {
                "array of {\"condition\": string, \"probability\": integer 0-100}".to_string()
            }
        };
        out.push_str(&format!("- \"{}\": {}\n", field.name, shape));
    }
    out
}
