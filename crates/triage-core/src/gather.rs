//! Assembles a user's historical records into a `ContextBundle`.

use tracing::debug;

use triage_contracts::{
    context::{ContextBundle, RecordSelection},
    error::TriageResult,
};

use crate::traits::RecordSource;

/// Read-only gatherer over a `RecordSource`.
pub struct DataGatherer<'a> {
    source: &'a dyn RecordSource,
}

impl<'a> DataGatherer<'a> {
    pub fn new(source: &'a dyn RecordSource) -> Self {
        Self { source }
    }

    /// Collect the records `selection` asks for, restricted to `user_id`.
    ///
    /// A category selected with an empty id list is not fetched at all.
    pub async fn gather(&self, user_id: &str, selection: &RecordSelection) -> TriageResult<ContextBundle> {
        let mut bundle = ContextBundle::default();

        if wants(&selection.quick_scan_ids) {
            let records = self.source.quick_scans(user_id).await?;
            bundle.quick_scans = select(records, &selection.quick_scan_ids, user_id, |r| (&r.id, &r.user_id));
        }
        if wants(&selection.deep_dive_ids) {
            let records = self.source.deep_dives(user_id).await?;
            bundle.deep_dives = select(records, &selection.deep_dive_ids, user_id, |r| (&r.id, &r.user_id));
        }
        if wants(&selection.tracking_ids) {
            let records = self.source.tracking_points(user_id).await?;
            bundle.tracking = select(records, &selection.tracking_ids, user_id, |r| (&r.id, &r.user_id));
        }

        debug!(
            user_id,
            quick_scans = bundle.quick_scans.len(),
            deep_dives = bundle.deep_dives.len(),
            tracking = bundle.tracking.len(),
            "context gathered"
        );
        Ok(bundle)
    }
}

fn wants(ids: &Option<Vec<String>>) -> bool {
    !matches!(ids, Some(ids) if ids.is_empty())
}

fn select<T>(
    records: Vec<T>,
    ids: &Option<Vec<String>>,
    user_id: &str,
    key: impl Fn(&T) -> (&String, &String),
) -> Vec<T> {
    records
        .into_iter()
        .filter(|record| {
            let (id, owner) = key(record);
            owner == user_id && ids.as_ref().map_or(true, |ids| ids.contains(id))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use triage_contracts::{
        context::{DeepDiveRecord, RecordSelection, ScanRecord, TrackingPoint},
        error::TriageResult,
    };

    use super::*;

    /// A record source that also counts which categories were fetched.
    struct MockSource {
        fetched: Mutex<Vec<&'static str>>,
    }

    fn scan(id: &str, user: &str) -> ScanRecord {
        ScanRecord {
            id: id.to_string(),
            user_id: user.to_string(),
            body_part: "head".to_string(),
            primary_condition: "Tension headache".to_string(),
            confidence: 80,
            urgency: "low".to_string(),
            created_at: Utc::now(),
        }
    }

    #[async_trait]
    impl RecordSource for MockSource {
        async fn quick_scans(&self, _user_id: &str) -> TriageResult<Vec<ScanRecord>> {
            self.fetched.lock().unwrap().push("quick_scans");
            // A foreign record slipped in by a sloppy source must still be filtered.
            Ok(vec![scan("s1", "u1"), scan("s2", "u1"), scan("s3", "someone-else")])
        }

        async fn deep_dives(&self, _user_id: &str) -> TriageResult<Vec<DeepDiveRecord>> {
            self.fetched.lock().unwrap().push("deep_dives");
            Ok(vec![DeepDiveRecord {
                id: "d1".to_string(),
                user_id: "u1".to_string(),
                body_part: "knee".to_string(),
                primary_condition: "Meniscus tear".to_string(),
                final_confidence: Some(75),
                created_at: Utc::now(),
            }])
        }

        async fn tracking_points(&self, _user_id: &str) -> TriageResult<Vec<TrackingPoint>> {
            self.fetched.lock().unwrap().push("tracking_points");
            Ok(vec![TrackingPoint {
                id: "t1".to_string(),
                user_id: "u1".to_string(),
                metric: "pain_level".to_string(),
                value: 6.0,
                recorded_at: Utc::now(),
            }])
        }
    }

    fn source() -> MockSource {
        MockSource { fetched: Mutex::new(Vec::new()) }
    }

    #[tokio::test]
    async fn test_default_selection_takes_everything_owned() {
        let source = source();
        let bundle = DataGatherer::new(&source).gather("u1", &RecordSelection::default()).await.unwrap();
        assert_eq!(bundle.quick_scans.len(), 2);
        assert_eq!(bundle.deep_dives.len(), 1);
        assert_eq!(bundle.tracking.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_list_excludes_without_fetching() {
        let source = source();
        let selection = RecordSelection {
            quick_scan_ids: Some(vec!["s2".to_string(), "s3".to_string()]),
            deep_dive_ids: Some(vec![]),
            tracking_ids: Some(vec![]),
        };
        let bundle = DataGatherer::new(&source).gather("u1", &selection).await.unwrap();

        let ids: Vec<_> = bundle.quick_scans.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s2"], "s3 belongs to another user");
        assert!(bundle.deep_dives.is_empty());
        assert!(bundle.tracking.is_empty());
        assert_eq!(*source.fetched.lock().unwrap(), vec!["quick_scans"]);
    }

    #[tokio::test]
    async fn test_none_selection_is_empty_bundle() {
        let source = source();
        let bundle = DataGatherer::new(&source).gather("u1", &RecordSelection::none()).await.unwrap();
        assert!(bundle.is_empty());
        assert!(source.fetched.lock().unwrap().is_empty());
    }
}
