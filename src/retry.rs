use std::time::Duration;

use tokio_retry::strategy::{ExponentialBackoff, jitter};

use crate::config::RetryConfig;

/// Exponential backoff with jitter for calls to the agent service
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay,
        }
    }

    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self::new(
            cfg.max_attempts,
            Duration::from_millis(cfg.initial_delay_ms),
            Duration::from_millis(cfg.max_delay_ms),
        )
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delays before each retry, without jitter: initial, 2x initial, 4x initial ... capped at max.
    pub fn backoff(&self) -> impl Iterator<Item = Duration> + use<> {
        let half = (self.initial_delay.as_millis() as u64 / 2).max(1);
        ExponentialBackoff::from_millis(2)
            .factor(half)
            .max_delay(self.max_delay)
            .take(self.max_attempts.saturating_sub(1) as usize)
    }

    /// Strategy handed to `tokio_retry`
    pub fn strategy(&self) -> impl Iterator<Item = Duration> + use<> {
        self.backoff().map(jitter)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_millis(200), Duration::from_millis(1000));
        let delays: Vec<_> = policy.backoff().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(800),
                Duration::from_millis(1000),
            ]
        );
    }

    #[test]
    fn test_single_attempt_never_sleeps() {
        assert_eq!(RetryPolicy::none().strategy().count(), 0);
        assert_eq!(RetryPolicy::new(0, Duration::ZERO, Duration::ZERO).max_attempts(), 1);
    }

    #[test]
    fn test_jitter_stays_under_backoff() {
        let policy = RetryPolicy::new(4, Duration::from_millis(100), Duration::from_secs(1));
        for (jittered, base) in policy.strategy().zip(policy.backoff()) {
            assert!(jittered <= base);
        }
    }
}
