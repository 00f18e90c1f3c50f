//! Hardcoded, fictional data for the reference scenarios.
//!
//! Model replies are raw text exactly as a chat model might return them:
//! clean JSON, fenced JSON, JSON buried in prose, and plain refusals.

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

use triage_contracts::context::{DeepDiveRecord, ScanRecord, TrackingPoint};
use triage_store::InMemoryRecordSource;

pub const USER_ID: &str = "patient-ref-001";

// ── Symptom forms ────────────────────────────────────────────────────────────

fn as_form(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub fn headache_form() -> Map<String, Value> {
    as_form(json!({
        "symptoms": "Throbbing pain behind the left eye, worse with light",
        "painLevel": 7,
        "duration": "6 hours",
        "nausea": true,
        "previousEpisodes": "About twice a month"
    }))
}

pub fn knee_form() -> Map<String, Value> {
    as_form(json!({
        "symptoms": "Swelling and a catching sensation in the right knee after football",
        "painLevel": 5,
        "duration": "3 days",
        "canBearWeight": true,
        "heardPop": false
    }))
}

pub fn chest_form() -> Map<String, Value> {
    as_form(json!({
        "symptoms": "Sharp pain on the left side of the chest when breathing in",
        "painLevel": 6,
        "duration": "2 days",
        "recentCold": true
    }))
}

// ── Prior records ────────────────────────────────────────────────────────────

/// Seed the history the scenarios draw context from.
pub async fn seed_history(records: &InMemoryRecordSource) {
    let now = Utc::now();

    records
        .add_quick_scan(ScanRecord {
            id: "qs-0001".to_string(),
            user_id: USER_ID.to_string(),
            body_part: "head".to_string(),
            primary_condition: "Migraine without aura".to_string(),
            confidence: 74,
            urgency: "medium".to_string(),
            created_at: now - Duration::days(21),
        })
        .await;
    records
        .add_quick_scan(ScanRecord {
            id: "qs-0002".to_string(),
            user_id: USER_ID.to_string(),
            body_part: "right knee".to_string(),
            primary_condition: "Patellar tendinopathy".to_string(),
            confidence: 61,
            urgency: "low".to_string(),
            created_at: now - Duration::days(90),
        })
        .await;
    // Another user's record; never visible to USER_ID.
    records
        .add_quick_scan(ScanRecord {
            id: "qs-9000".to_string(),
            user_id: "patient-ref-002".to_string(),
            body_part: "head".to_string(),
            primary_condition: "Cluster headache".to_string(),
            confidence: 80,
            urgency: "high".to_string(),
            created_at: now - Duration::days(3),
        })
        .await;

    records
        .add_deep_dive(DeepDiveRecord {
            id: "dd-0001".to_string(),
            user_id: USER_ID.to_string(),
            body_part: "right knee".to_string(),
            primary_condition: "Medial meniscus irritation".to_string(),
            final_confidence: Some(68),
            created_at: now - Duration::days(60),
        })
        .await;

    for (idx, (days_ago, level)) in [(14, 6.0), (7, 5.0), (1, 7.0)].into_iter().enumerate() {
        records
            .add_tracking_point(TrackingPoint {
                id: format!("tp-{:04}", idx + 1),
                user_id: USER_ID.to_string(),
                metric: "headache_pain".to_string(),
                value: level,
                recorded_at: now - Duration::days(days_ago),
            })
            .await;
    }
}

// ── Model replies ────────────────────────────────────────────────────────────

/// An analysis object with the given condition, confidence and rival.
pub fn analysis(condition: &str, confidence: u8, rival: (&str, u8), urgency: &str) -> Value {
    json!({
        "primaryCondition": condition,
        "confidence": confidence,
        "differentials": [
            { "condition": rival.0, "probability": rival.1 }
        ],
        "recommendations": [
            "Keep a symptom diary for the next two weeks",
            "Book a routine appointment with your GP"
        ],
        "redFlags": ["Sudden severe pain", "Fever above 39C"],
        "selfCare": ["Rest", "Stay hydrated"],
        "urgency": urgency
    })
}

pub fn clean_reply(value: &Value) -> String {
    value.to_string()
}

pub fn fenced_reply(value: &Value) -> String {
    let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    format!("Here is my assessment:\n\n```json\n{pretty}\n```\n\nLet me know if anything changes.")
}

pub fn prose_reply(value: &Value) -> String {
    format!("Based on the information provided, I would ask: {value} Please answer as precisely as you can.")
}

pub const REFUSAL: &str =
    "I'm sorry, but I can't provide a medical assessment. Please consult a healthcare professional.";

pub fn question(text: &str, confidence: u8, ready: bool) -> Value {
    json!({ "question": text, "confidence": confidence, "readyForAnalysis": ready })
}

pub fn follow_up(text: &str, target: &str) -> Value {
    json!({
        "question": text,
        "targetCondition": target,
        "rationale": format!("Separates the current assessment from {target}")
    })
}

/// Ultra tier output: an analysis plus its reasoning chain.
pub fn ultra(condition: &str, confidence: u8, rival: (&str, u8)) -> Value {
    let mut value = analysis(condition, confidence, rival, "medium");
    if let Value::Object(map) = &mut value {
        map.insert(
            "reasoningChain".to_string(),
            json!([
                "Pain is pleuritic and localised",
                "Recent viral illness raises the prior for pleurisy",
                "No exertional component argues against cardiac cause"
            ]),
        );
    }
    value
}

#[cfg(test)]
mod tests {
    use triage_contracts::context::RecordSelection;
    use triage_core::{traits::RecordSource, DataGatherer};
    use triage_store::InMemoryRecordSource;

    use super::*;

    #[test]
    fn test_forms_are_objects() {
        assert!(headache_form().contains_key("symptoms"));
        assert!(knee_form().contains_key("painLevel"));
        assert!(chest_form().contains_key("duration"));
    }

    #[test]
    fn test_reply_wrappers_keep_payload() {
        let value = analysis("Migraine", 80, ("Tension headache", 20), "low");
        assert!(fenced_reply(&value).contains("```json"));
        assert!(prose_reply(&value).contains("\"primaryCondition\":\"Migraine\""));
        assert_eq!(ultra("Pleurisy", 82, ("Costochondritis", 30))["reasoningChain"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_history_is_scoped_to_reference_user() {
        let records = InMemoryRecordSource::new();
        seed_history(&records).await;

        assert_eq!(records.quick_scans(USER_ID).await.unwrap().len(), 2);
        let bundle = DataGatherer::new(&records)
            .gather(USER_ID, &RecordSelection::default())
            .await
            .unwrap();
        assert_eq!(bundle.deep_dives.len(), 1);
        assert_eq!(bundle.tracking.len(), 3);
    }
}
