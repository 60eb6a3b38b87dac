use crate::domain::{Bucket, BucketIdentity};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Buckets held in process memory, keyed by identity.
///
/// Nothing survives a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    buckets: Arc<Mutex<HashMap<BucketIdentity, Bucket>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, id: BucketIdentity, value: f64) {
        let mut buckets = self.buckets.lock();
        buckets
            .entry(id)
            .or_insert_with_key(|id| Bucket::new(id.clone()))
            .add(value);
    }

    pub fn len(&self) -> usize {
        self.buckets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.lock().is_empty()
    }

    /// Remove and return every bucket whose window ended at or before `now`.
    pub fn drain_ready(&self, now: DateTime<Utc>) -> Vec<Bucket> {
        let mut buckets = self.buckets.lock();
        let ready: Vec<BucketIdentity> = buckets
            .keys()
            .filter(|id| id.end_time() <= now)
            .cloned()
            .collect();
        ready
            .into_iter()
            .filter_map(|id| buckets.remove(&id))
            .collect()
    }

    /// Remove and return every bucket, finished or not.
    pub fn drain_all(&self) -> Vec<Bucket> {
        self.buckets.lock().drain().map(|(_, bucket)| bucket).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    fn identity(name: &str, minute: u32) -> BucketIdentity {
        BucketIdentity {
            name: name.to_string(),
            source: "web.1".to_string(),
            user: "u".to_string(),
            pass: "p".to_string(),
            time: Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap(),
            resolution: Duration::from_secs(60),
            units: "ms".to_string(),
        }
    }

    #[test]
    fn test_put_aggregates_by_identity() {
        let store = MemoryStore::new();
        store.put(identity("a", 0), 1.0);
        store.put(identity("a", 0), 3.0);
        store.put(identity("b", 0), 5.0);
        assert_eq!(store.len(), 2);

        let mut buckets = store.drain_all();
        buckets.sort_by(|l, r| l.id.name.cmp(&r.id.name));
        assert_eq!(buckets[0].vals, vec![1.0, 3.0]);
        assert_eq!(buckets[1].vals, vec![5.0]);
        assert!(store.is_empty());
    }

    #[test]
    fn test_drain_ready_only_returns_finished_windows() {
        let store = MemoryStore::new();
        store.put(identity("a", 0), 1.0);
        store.put(identity("a", 1), 2.0);

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 30).unwrap();
        let ready = store.drain_ready(now);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id.time, identity("a", 0).time);
        assert_eq!(store.len(), 1);
    }
}
