//! Field-spec validation and fallback construction.
//!
//! `SchemaValidator` turns an `Extraction` (possibly `NotFound`) into an
//! object that carries every field the calling endpoint promises. It runs in
//! two phases:
//!
//! 1. **Structural report**: the extracted object is checked against a JSON
//!    Schema compiled from the field specs, using the `jsonschema` crate. The
//!    report is diagnostic only and goes to the log.
//! 2. **Repair**: each field is coerced to its semantic type or replaced by
//!    the spec default. Every replacement is recorded as a `ValidationGap`.
//!
//! Validation is total: it never fails and never omits a required field.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use triage_contracts::{
    analysis::clamp_percent,
    fields::{FieldKind, FieldSpec},
};

use crate::extractor::Extraction;

/// A required field that had to be replaced by its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationGap {
    pub field: String,
    pub reason: String,
}

/// A contract-complete object plus what it took to get there.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub object: Map<String, Value>,
    pub gaps: Vec<ValidationGap>,
    /// True when extraction failed or any field was defaulted.
    pub fallback: bool,
}

impl Validated {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.object.get(field)
    }

    pub fn text(&self, field: &str) -> &str {
        self.object.get(field).and_then(Value::as_str).unwrap_or_default()
    }

    pub fn integer(&self, field: &str) -> i64 {
        self.object.get(field).and_then(Value::as_i64).unwrap_or_default()
    }

    pub fn flag(&self, field: &str) -> bool {
        self.object.get(field).and_then(Value::as_bool).unwrap_or_default()
    }
}

/// Validates extracted model output against per-endpoint field specs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl SchemaValidator {
    pub fn new() -> Self {
        Self
    }

    /// Produce an object satisfying every field in `spec`.
    ///
    /// Fields the model returned that `spec` does not name are passed through
    /// untouched.
    pub fn validate(&self, extracted: &Extraction, spec: &[FieldSpec]) -> Validated {
        let mut gaps = Vec::new();

        let mut object = match extracted {
            Extraction::Found(found) => {
                for problem in self.structural_report(found, spec) {
                    debug!(%problem, "structural check");
                }
                found.clone()
            }
            Extraction::NotFound => Map::new(),
        };

        for field in spec {
            if field.kind.is_optional() && object.get(&field.name).map_or(true, Value::is_null) {
                object.insert(field.name.clone(), field.default.clone());
                continue;
            }

            let coerced = object.get(&field.name).map(|value| coerce(&field.kind, value));

            let reason = match coerced {
                Some(Ok(value)) => {
                    object.insert(field.name.clone(), value);
                    continue;
                }
                Some(Err(reason)) => reason,
                None => "missing".to_string(),
            };

            gaps.push(ValidationGap {
                field: field.name.clone(),
                reason,
            });
            object.insert(field.name.clone(), field.default.clone());
        }

        let fallback = !extracted.is_found() || !gaps.is_empty();
        if fallback {
            warn!(
                extracted = extracted.is_found(),
                gap_count = gaps.len(),
                fields = ?gaps.iter().map(|g| g.field.as_str()).collect::<Vec<_>>(),
                "model output required fallback defaults"
            );
        }

        Validated {
            object,
            gaps,
            fallback,
        }
    }

    /// JSON Schema violations of `object` against `spec`, as messages.
    pub fn structural_report(&self, object: &Map<String, Value>, spec: &[FieldSpec]) -> Vec<String> {
        let schema = schema_for(spec);
        match jsonschema::validator_for(&schema) {
            Ok(validator) => {
                let instance = Value::Object(object.clone());
                let messages: Vec<String> = validator
                    .iter_errors(&instance)
                    .map(|error| format!("JSON Schema violation at {}: {}", error.instance_path, error))
                    .collect();
                messages
            }
            Err(e) => vec![format!("invalid JSON Schema document: {e}")],
        }
    }
}

/// Compile a field-spec list into a JSON Schema document.
pub fn schema_for(spec: &[FieldSpec]) -> Value {
    let mut properties = Map::new();
    for field in spec {
        let property = match &field.kind {
            FieldKind::Text | FieldKind::OptionalText => json!({ "type": "string" }),
            FieldKind::Integer { min, max } => {
                json!({ "type": "integer", "minimum": min, "maximum": max })
            }
            FieldKind::Boolean => json!({ "type": "boolean" }),
            FieldKind::Enum { allowed } => json!({ "type": "string", "enum": allowed }),
            FieldKind::TextList => json!({ "type": "array", "items": { "type": "string" } }),
            FieldKind::DifferentialList => json!({
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["condition", "probability"],
                    "properties": {
                        "condition": { "type": "string" },
                        "probability": { "type": "integer", "minimum": 0, "maximum": 100 }
                    }
                }
            }),
        };
        properties.insert(field.name.clone(), property);
    }

    let required: Vec<&str> = spec.iter().map(|f| f.name.as_str()).collect();
    json!({
        "type": "object",
        "required": required,
        "properties": properties,
    })
}

// ── Coercion ──────────────────────────────────────────────────────────────────

/// Coerce `value` to `kind`, or explain why it cannot be.
fn coerce(kind: &FieldKind, value: &Value) -> Result<Value, String> {
    match kind {
        FieldKind::Text => match value.as_str() {
            Some(s) if !s.trim().is_empty() => Ok(Value::String(s.to_string())),
            Some(_) => Err("empty string".to_string()),
            None => Err(format!("expected string, got {}", type_name(value))),
        },

        FieldKind::OptionalText => value
            .as_str()
            .map(|s| Value::String(s.trim().to_string()))
            .ok_or_else(|| format!("expected string, got {}", type_name(value))),

        FieldKind::Integer { min, max } => as_integer(value)
            .map(|n| json!(n.clamp(*min, *max)))
            .ok_or_else(|| format!("expected integer, got {}", type_name(value))),

        FieldKind::Boolean => match value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" => Ok(Value::Bool(true)),
                "false" | "no" => Ok(Value::Bool(false)),
                _ => Err(format!("expected boolean, got string '{s}'")),
            },
            other => Err(format!("expected boolean, got {}", type_name(other))),
        },

        FieldKind::Enum { allowed } => {
            let Some(s) = value.as_str() else {
                return Err(format!("expected string, got {}", type_name(value)));
            };
            allowed
                .iter()
                .find(|member| member.eq_ignore_ascii_case(s.trim()))
                .map(|member| Value::String(member.clone()))
                .ok_or_else(|| format!("'{s}' is not one of {allowed:?}"))
        }

        FieldKind::TextList => match value {
            Value::Array(items) => Ok(Value::Array(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| Value::String(s.to_string()))
                    .collect(),
            )),
            // A lone string is a one-item list.
            Value::String(s) if !s.trim().is_empty() => Ok(json!([s.trim()])),
            other => Err(format!("expected array, got {}", type_name(other))),
        },

        FieldKind::DifferentialList => match value {
            Value::Array(items) => Ok(Value::Array(items.iter().filter_map(differential).collect())),
            other => Err(format!("expected array, got {}", type_name(other))),
        },
    }
}

/// Normalise one differential entry; entries without a condition are dropped.
fn differential(item: &Value) -> Option<Value> {
    let (condition, probability) = match item {
        Value::String(s) => (s.trim(), 0),
        Value::Object(entry) => {
            let condition = entry
                .get("condition")
                .or_else(|| entry.get("name"))
                .and_then(Value::as_str)?
                .trim();
            let probability = entry
                .get("probability")
                .or_else(|| entry.get("likelihood"))
                .and_then(as_integer)
                .unwrap_or(0);
            (condition, probability)
        }
        _ => return None,
    };

    if condition.is_empty() {
        return None;
    }
    Some(json!({ "condition": condition, "probability": clamp_percent(probability) }))
}

/// Accept integers, finite floats (rounded), and numeric strings like "82%".
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
        Value::String(s) => {
            let s = s.trim().trim_end_matches('%').trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.round() as i64))
        }
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
