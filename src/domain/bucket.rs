use super::credential::Credential;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Key of a bucket: one metric, from one source, for one account, over
/// one time window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketIdentity {
    pub name: String,
    pub source: String,
    pub user: String,
    pub pass: String,
    /// Start of the window.
    pub time: DateTime<Utc>,
    pub resolution: Duration,
    pub units: String,
}

impl BucketIdentity {
    /// End of the window; this is also when the bucket is due for delivery.
    pub fn end_time(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.resolution)
            .map(|resolution| self.time + resolution)
            .unwrap_or(self.time)
    }

    /// Seconds between the scheduled delivery time and `now`.
    pub fn delay(&self, now: DateTime<Utc>) -> i64 {
        (now - self.end_time()).num_seconds()
    }

    pub fn credential(&self) -> Credential {
        Credential::new(self.user.clone(), self.pass.clone())
    }
}

/// The values recorded for one identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub id: BucketIdentity,
    pub vals: Vec<f64>,
}

impl Bucket {
    pub fn new(id: BucketIdentity) -> Self {
        Self {
            id,
            vals: Vec::new(),
        }
    }

    pub fn with_values(id: BucketIdentity, vals: Vec<f64>) -> Self {
        Self { id, vals }
    }

    pub fn add(&mut self, value: f64) {
        self.vals.push(value);
    }

    pub fn has_values(&self) -> bool {
        !self.vals.is_empty()
    }

    pub fn count(&self) -> usize {
        self.vals.len()
    }

    pub fn sum(&self) -> f64 {
        self.vals.iter().sum()
    }

    pub fn mean(&self) -> f64 {
        if self.vals.is_empty() {
            return 0.0;
        }
        self.sum() / self.vals.len() as f64
    }

    pub fn min(&self) -> f64 {
        self.vals.iter().copied().reduce(f64::min).unwrap_or(0.0)
    }

    pub fn max(&self) -> f64 {
        self.vals.iter().copied().reduce(f64::max).unwrap_or(0.0)
    }

    pub fn last(&self) -> f64 {
        self.vals.last().copied().unwrap_or(0.0)
    }

    pub fn median(&self) -> f64 {
        self.percentile(0.50)
    }

    pub fn p95(&self) -> f64 {
        self.percentile(0.95)
    }

    pub fn p99(&self) -> f64 {
        self.percentile(0.99)
    }

    /// Nearest-rank percentile over a sorted copy of the values.
    pub fn percentile(&self, percentile: f64) -> f64 {
        if self.vals.is_empty() {
            return 0.0;
        }
        let mut sorted = self.vals.clone();
        sorted.sort_by(f64::total_cmp);

        let percentile = percentile.clamp(0.0, 1.0);
        let rank = (percentile * sorted.len() as f64).ceil() as usize;
        let index = rank.saturating_sub(1).min(sorted.len() - 1);
        sorted[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn identity() -> BucketIdentity {
        BucketIdentity {
            name: "myapp.response_time".to_string(),
            source: "web.1".to_string(),
            user: "u".to_string(),
            pass: "p".to_string(),
            time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            resolution: Duration::from_secs(60),
            units: "ms".to_string(),
        }
    }

    #[test]
    fn test_reducers() {
        let bucket = Bucket::with_values(identity(), vec![4.0, 1.0, 3.0, 2.0]);
        assert_eq!(bucket.count(), 4);
        assert_eq!(bucket.sum(), 10.0);
        assert_eq!(bucket.mean(), 2.5);
        assert_eq!(bucket.min(), 1.0);
        assert_eq!(bucket.max(), 4.0);
        assert_eq!(bucket.last(), 2.0);
        assert_eq!(bucket.median(), 2.0);
        assert_eq!(bucket.p95(), 4.0);
        assert_eq!(bucket.p99(), 4.0);
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let bucket = Bucket::with_values(identity(), (1..=100).map(f64::from).collect());
        assert_eq!(bucket.median(), 50.0);
        assert_eq!(bucket.p95(), 95.0);
        assert_eq!(bucket.p99(), 99.0);
    }

    #[test]
    fn test_empty_bucket() {
        let bucket = Bucket::new(identity());
        assert!(!bucket.has_values());
        assert_eq!(bucket.mean(), 0.0);
        assert_eq!(bucket.p99(), 0.0);
    }

    #[test]
    fn test_end_time_and_delay() {
        let id = identity();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 0).unwrap();
        assert_eq!(id.end_time(), end);
        assert_eq!(id.delay(end + chrono::Duration::seconds(7)), 7);
    }
}
