//! Historical records and the context bundle handed to prompts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A previously completed single-shot scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub id: String,
    pub user_id: String,
    pub body_part: String,
    pub primary_condition: String,
    pub confidence: u8,
    pub urgency: String,
    pub created_at: DateTime<Utc>,
}

/// A summary of a previous diagnostic session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepDiveRecord {
    pub id: String,
    pub user_id: String,
    pub body_part: String,
    pub primary_condition: String,
    pub final_confidence: Option<u8>,
    pub created_at: DateTime<Utc>,
}

/// One measurement in a symptom-tracking series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingPoint {
    pub id: String,
    pub user_id: String,
    pub metric: String,
    pub value: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Which historical records to gather, per category.
///
/// `None` selects every record the user owns; `Some(vec![])` explicitly
/// excludes the category; `Some(ids)` selects only those ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSelection {
    #[serde(default)]
    pub quick_scan_ids: Option<Vec<String>>,
    #[serde(default)]
    pub deep_dive_ids: Option<Vec<String>>,
    #[serde(default)]
    pub tracking_ids: Option<Vec<String>>,
}

impl RecordSelection {
    /// Select nothing from any category.
    pub fn none() -> Self {
        Self {
            quick_scan_ids: Some(Vec::new()),
            deep_dive_ids: Some(Vec::new()),
            tracking_ids: Some(Vec::new()),
        }
    }
}

/// The assembled historical data passed into a prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextBundle {
    pub quick_scans: Vec<ScanRecord>,
    pub deep_dives: Vec<DeepDiveRecord>,
    pub tracking: Vec<TrackingPoint>,
}

impl ContextBundle {
    pub fn is_empty(&self) -> bool {
        self.quick_scans.is_empty() && self.deep_dives.is_empty() && self.tracking.is_empty()
    }

    /// Render the bundle as plain lines for inclusion in a prompt.
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return String::new();
        }

        let mut out = String::from("PRIOR HEALTH HISTORY:\n");
        for scan in &self.quick_scans {
            out.push_str(&format!(
                "- {} scan ({}): {} ({}% confidence, {} urgency)\n",
                scan.created_at.format("%Y-%m-%d"),
                scan.body_part,
                scan.primary_condition,
                scan.confidence,
                scan.urgency
            ));
        }
        for dive in &self.deep_dives {
            let confidence = dive
                .final_confidence
                .map(|c| format!("{c}%"))
                .unwrap_or_else(|| "no".to_string());
            out.push_str(&format!(
                "- {} deep dive ({}): {} ({} confidence)\n",
                dive.created_at.format("%Y-%m-%d"),
                dive.body_part,
                dive.primary_condition,
                confidence
            ));
        }
        for point in &self.tracking {
            out.push_str(&format!(
                "- {} tracked {}: {}\n",
                point.recorded_at.format("%Y-%m-%d"),
                point.metric,
                point.value
            ));
        }
        out
    }
}

/// Inbound request for a single-shot analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    /// Body part or symptom category.
    pub category: String,
    pub form_data: Map<String, Value>,
    #[serde(default)]
    pub prior_context: Option<ContextBundle>,
}
