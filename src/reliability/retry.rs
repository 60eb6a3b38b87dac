use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryStrategy {
    /// Retry straight away.
    Immediate,
    /// Wait `base_delay` before every retry.
    FixedDelay,
}

/// How many times a failed post is repeated, and how long to wait in between.
///
/// `retries` counts additional attempts, so a batch is posted at most
/// `retries + 1` times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub retries: u32,
    pub strategy: RetryStrategy,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            strategy: RetryStrategy::Immediate,
            base_delay: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    pub fn immediate(retries: u32) -> Self {
        Self {
            retries,
            ..Self::default()
        }
    }

    /// A zero delay keeps the immediate behaviour.
    pub fn with_delay(retries: u32, delay: Duration) -> Self {
        if delay.is_zero() {
            return Self::immediate(retries);
        }
        Self {
            retries,
            strategy: RetryStrategy::FixedDelay,
            base_delay: delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Whether another attempt follows a failed `attempt` (zero-based).
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.retries
    }

    pub fn delay(&self) -> Duration {
        match self.strategy {
            RetryStrategy::Immediate => Duration::ZERO,
            RetryStrategy::FixedDelay => self.base_delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_bounds() {
        let policy = RetryPolicy::immediate(2);
        assert_eq!(policy.max_attempts(), 3);
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(1));
        assert!(!policy.should_retry(2));

        let policy = RetryPolicy::immediate(0);
        assert_eq!(policy.max_attempts(), 1);
        assert!(!policy.should_retry(0));
    }

    #[test]
    fn test_default_has_no_delay() {
        assert_eq!(RetryPolicy::default().delay(), Duration::ZERO);
        assert_eq!(
            RetryPolicy::with_delay(3, Duration::ZERO).strategy,
            RetryStrategy::Immediate
        );
    }

    #[test]
    fn test_fixed_delay() {
        let policy = RetryPolicy::with_delay(3, Duration::from_millis(250));
        assert_eq!(policy.strategy, RetryStrategy::FixedDelay);
        assert_eq!(policy.delay(), Duration::from_millis(250));
    }
}
