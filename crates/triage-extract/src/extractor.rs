//! Recovering a JSON object from raw model text.
//!
//! Models asked to "return only JSON" routinely wrap it in prose, fence it in
//! markdown, or prepend a greeting. `ResponseExtractor` tries an ordered list
//! of strategies, from strict to permissive, and stops at the first one that
//! yields a JSON object:
//!
//! 1. **Structured**: the input is already a JSON object.
//! 2. **Direct parse**: the whole trimmed string parses as an object.
//! 3. **Balanced braces**: the first `{...}` span, found by depth counting
//!    that respects string literals, parses as an object.
//! 4. **Fenced block**: the contents of a triple-backtick block (optionally
//!    tagged `json`) parse as an object.
//!
//! When all strategies fail the result is `Extraction::NotFound`. The
//! extractor never invents content; defaulting is the validator's job because
//! only the caller knows which shape it expects.

use serde_json::{Map, Value};
use tracing::debug;

use triage_contracts::fields::EndpointKind;

/// What the LLM channel handed back.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResponse {
    Text(String),
    /// Some providers return parsed JSON directly.
    Structured(Value),
}

impl From<&str> for RawResponse {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for RawResponse {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Value> for RawResponse {
    fn from(v: Value) -> Self {
        Self::Structured(v)
    }
}

/// The outcome of extraction. `NotFound` is expected and common.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Found(Map<String, Value>),
    NotFound,
}

impl Extraction {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Found(object) => Some(object),
            Self::NotFound => None,
        }
    }
}

/// The individual extraction strategies, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Structured,
    DirectParse,
    BalancedBraces,
    FencedBlock,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::DirectParse => "direct_parse",
            Self::BalancedBraces => "balanced_braces",
            Self::FencedBlock => "fenced_block",
        }
    }
}

/// One strategy's result. Transient; used for tracing and tests only.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionAttempt {
    pub strategy: Strategy,
    pub succeeded: bool,
    pub parsed: Option<Map<String, Value>>,
    pub raw_input: String,
}

/// Stateless, pure extractor over model output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseExtractor;

impl ResponseExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract the first JSON object from `raw`.
    ///
    /// `hint` names the calling endpoint for log context only; it never
    /// changes which object is returned.
    pub fn extract(&self, raw: impl Into<RawResponse>, hint: Option<EndpointKind>) -> Extraction {
        self.extract_with_trace(raw, hint).0
    }

    /// Like `extract`, also returning every attempt made.
    pub fn extract_with_trace(
        &self,
        raw: impl Into<RawResponse>,
        hint: Option<EndpointKind>,
    ) -> (Extraction, Vec<ExtractionAttempt>) {
        let endpoint = hint.map(|h| h.as_str()).unwrap_or("unspecified");
        let mut attempts = Vec::new();

        let text = match raw.into() {
            RawResponse::Structured(Value::Object(object)) => {
                attempts.push(ExtractionAttempt {
                    strategy: Strategy::Structured,
                    succeeded: true,
                    parsed: Some(object.clone()),
                    raw_input: String::new(),
                });
                return (Extraction::Found(object), attempts);
            }
            // A JSON string is still model text; run the text strategies on it.
            RawResponse::Structured(Value::String(s)) | RawResponse::Text(s) => s,
            RawResponse::Structured(other) => {
                attempts.push(ExtractionAttempt {
                    strategy: Strategy::Structured,
                    succeeded: false,
                    parsed: None,
                    raw_input: other.to_string(),
                });
                debug!(endpoint, "structured response is not an object");
                return (Extraction::NotFound, attempts);
            }
        };

        let strategies: [(Strategy, fn(&str) -> Option<Map<String, Value>>); 3] = [
            (Strategy::DirectParse, direct_parse),
            (Strategy::BalancedBraces, balanced_braces),
            (Strategy::FencedBlock, fenced_block),
        ];

        for (strategy, run) in strategies {
            let parsed = run(&text);
            let succeeded = parsed.is_some();
            attempts.push(ExtractionAttempt {
                strategy,
                succeeded,
                parsed: parsed.clone(),
                raw_input: text.clone(),
            });

            if let Some(object) = parsed {
                debug!(
                    endpoint,
                    strategy = strategy.as_str(),
                    keys = object.len(),
                    "extracted JSON object"
                );
                return (Extraction::Found(object), attempts);
            }
        }

        debug!(endpoint, input_len = text.len(), "no JSON object found in model output");
        (Extraction::NotFound, attempts)
    }
}

// ── Strategies ────────────────────────────────────────────────────────────────

fn parse_object(s: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(s.trim()) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

fn direct_parse(text: &str) -> Option<Map<String, Value>> {
    parse_object(text)
}

/// Walk the top-level `{...}` spans in order; return the first that parses.
///
/// A span that fails to parse is skipped whole, so an object nested inside a
/// malformed outer object is never returned as the answer.
fn balanced_braces(text: &str) -> Option<Map<String, Value>> {
    let mut from = 0;
    while let Some(found) = text[from..].find('{') {
        let start = from + found;
        // Everything after an unclosed brace is inside it.
        let span = balanced_span(text, start)?;
        if let Some(object) = parse_object(span) {
            return Some(object);
        }
        from = start + span.len();
    }
    None
}

/// The `{...}` span starting at byte `start`, or `None` if it never closes.
///
/// Braces inside JSON string literals are ignored, as are escaped quotes.
fn balanced_span(text: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn fenced_block(text: &str) -> Option<Map<String, Value>> {
    fenced_bodies(text).into_iter().find_map(parse_object)
}

/// Contents of every closed triple-backtick block, language tag removed.
fn fenced_bodies(text: &str) -> Vec<&str> {
    let mut bodies = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        let body = strip_fence_tag(after);
        let Some(close) = body.find("```") else {
            break;
        };
        bodies.push(body[..close].trim());
        rest = &body[close + 3..];
    }
    bodies
}

/// Drop a `json`-style language tag directly after the opening fence.
fn strip_fence_tag(after_fence: &str) -> &str {
    if let Some(newline) = after_fence.find('\n') {
        let tag = after_fence[..newline].trim();
        if tag.chars().all(|c| c.is_ascii_alphanumeric()) {
            return &after_fence[newline + 1..];
        }
    }
    let trimmed = after_fence.trim_start();
    trimmed
        .strip_prefix("json")
        .or_else(|| trimmed.strip_prefix("JSON"))
        .unwrap_or(trimmed)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
