//! Historical records a user has accumulated.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use triage_contracts::{
    context::{DeepDiveRecord, ScanRecord, TrackingPoint},
    error::TriageResult,
};
use triage_core::traits::RecordSource;

#[derive(Default)]
struct Records {
    quick_scans: Vec<ScanRecord>,
    deep_dives: Vec<DeepDiveRecord>,
    tracking: Vec<TrackingPoint>,
}

/// A `RecordSource` over in-memory lists. Clones share the same lists.
#[derive(Clone, Default)]
pub struct InMemoryRecordSource {
    records: Arc<RwLock<Records>>,
}

impl InMemoryRecordSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_quick_scan(&self, record: ScanRecord) {
        self.records.write().await.quick_scans.push(record);
    }

    pub async fn add_deep_dive(&self, record: DeepDiveRecord) {
        self.records.write().await.deep_dives.push(record);
    }

    pub async fn add_tracking_point(&self, point: TrackingPoint) {
        self.records.write().await.tracking.push(point);
    }
}

#[async_trait]
impl RecordSource for InMemoryRecordSource {
    async fn quick_scans(&self, user_id: &str) -> TriageResult<Vec<ScanRecord>> {
        let records = self.records.read().await;
        Ok(records.quick_scans.iter().filter(|r| r.user_id == user_id).cloned().collect())
    }

    async fn deep_dives(&self, user_id: &str) -> TriageResult<Vec<DeepDiveRecord>> {
        let records = self.records.read().await;
        Ok(records.deep_dives.iter().filter(|r| r.user_id == user_id).cloned().collect())
    }

    /// Oldest first, so prompts read as a timeline.
    async fn tracking_points(&self, user_id: &str) -> TriageResult<Vec<TrackingPoint>> {
        let records = self.records.read().await;
        let mut points: Vec<TrackingPoint> =
            records.tracking.iter().filter(|p| p.user_id == user_id).cloned().collect();
        points.sort_by_key(|p| p.recorded_at);
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use triage_contracts::context::{ScanRecord, TrackingPoint};
    use triage_core::traits::RecordSource;

    use super::InMemoryRecordSource;

    fn point(id: &str, user: &str, days_ago: i64) -> TrackingPoint {
        TrackingPoint {
            id: id.to_string(),
            user_id: user.to_string(),
            metric: "pain_level".to_string(),
            value: 4.0,
            recorded_at: Utc::now() - Duration::days(days_ago),
        }
    }

    #[tokio::test]
    async fn test_records_scoped_to_user() {
        let source = InMemoryRecordSource::new();
        source
            .add_quick_scan(ScanRecord {
                id: "s1".to_string(),
                user_id: "alice".to_string(),
                body_part: "head".to_string(),
                primary_condition: "Migraine".to_string(),
                confidence: 77,
                urgency: "medium".to_string(),
                created_at: Utc::now(),
            })
            .await;

        assert_eq!(source.quick_scans("alice").await.unwrap().len(), 1);
        assert!(source.quick_scans("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tracking_is_chronological() {
        let source = InMemoryRecordSource::new();
        source.add_tracking_point(point("recent", "alice", 1)).await;
        source.add_tracking_point(point("old", "alice", 10)).await;
        source.add_tracking_point(point("other", "bob", 5)).await;

        let ids: Vec<String> = source
            .tracking_points("alice")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["old".to_string(), "recent".to_string()]);
    }
}
