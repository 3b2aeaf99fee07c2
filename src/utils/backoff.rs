use std::time::Duration;
use tokio::time::Instant;

use crate::config::RetryConfig;

// ============================================================================
// Exponential Backoff
// ============================================================================
//
// Tracks failed attempts for one recreation slot. The actor loop must never
// sleep, so instead of waiting between attempts this only computes the
// instant before which the slot should be skipped.
//
// ============================================================================

/// Smallest delay the backoff grows from
const MIN_GROWTH_DELAY: Duration = Duration::from_millis(100);

#[derive(Clone, Debug)]
pub struct Backoff {
    config: RetryConfig,
    attempts: u32,
    delay: Duration,
}

/// Outcome of recording a failed attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackoffStep {
    /// Try again once this instant has passed
    RetryAt(Instant),
    /// No attempts left
    Exhausted,
}

impl Backoff {
    pub fn new(config: RetryConfig) -> Self {
        let delay = config.initial_delay.min(config.max_delay);
        Self {
            config,
            attempts: 0,
            delay,
        }
    }

    /// Number of failed attempts recorded so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn record_failure(&mut self, now: Instant) -> BackoffStep {
        self.attempts += 1;

        if self.attempts >= self.config.max_attempts {
            return BackoffStep::Exhausted;
        }

        let retry_at = now + self.delay;

        // Calculate next delay with exponential backoff, growing from the
        // floor when the first retry was immediate
        let base = self.delay.max(MIN_GROWTH_DELAY);
        self.delay = Duration::from_millis(
            ((base.as_millis() as f64) * self.config.multiplier) as u64,
        );
        self.delay = self.delay.min(self.config.max_delay);

        BackoffStep::RetryAt(retry_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            multiplier: 2.0,
        }
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let mut backoff = Backoff::new(config(10));
        let now = Instant::now();

        let delays: Vec<Duration> = (0..4)
            .map(|_| match backoff.record_failure(now) {
                BackoffStep::RetryAt(at) => at - now,
                BackoffStep::Exhausted => Duration::MAX,
            })
            .collect();

        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(300),
                Duration::from_millis(300),
            ]
        );
    }

    #[test]
    fn test_exhausted_after_max_attempts() {
        let mut backoff = Backoff::new(config(2));
        let now = Instant::now();

        assert!(matches!(backoff.record_failure(now), BackoffStep::RetryAt(_)));
        assert_eq!(backoff.record_failure(now), BackoffStep::Exhausted);
        assert_eq!(backoff.attempts(), 2);
    }

    #[test]
    fn test_zero_initial_delay_retries_immediately_then_grows() {
        let mut backoff = Backoff::new(RetryConfig::aggressive());
        let now = Instant::now();

        assert_eq!(backoff.record_failure(now), BackoffStep::RetryAt(now));
        assert_eq!(
            backoff.record_failure(now),
            BackoffStep::RetryAt(now + Duration::from_millis(150))
        );
        assert_eq!(
            backoff.record_failure(now),
            BackoffStep::RetryAt(now + Duration::from_millis(225))
        );
    }

    #[test]
    fn test_zero_max_delay_keeps_retrying_immediately() {
        let mut backoff = Backoff::new(RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 2.0,
        });
        let now = Instant::now();

        for _ in 0..3 {
            assert_eq!(backoff.record_failure(now), BackoffStep::RetryAt(now));
        }
    }
}
