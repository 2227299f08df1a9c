use crate::executor::config::ExecutorConfig;
use std::time::Duration;

/// Exponential backoff between attempts of the same task.
///
/// The delay before attempt `n + 1` is `base * multiplier^(n - 1)`, capped at
/// `max` and then spread by `jitter`.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    base: Duration,
    multiplier: f64,
    max: Duration,
    jitter: f64,
    max_attempts: u32,
}

impl BackoffPolicy {
    pub fn new(base: Duration, multiplier: f64, max: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            multiplier,
            max,
            jitter: 0.0,
            max_attempts,
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(
            Duration::from_millis(config.retry_delay_ms),
            config.backoff_multiplier,
            Duration::from_millis(config.max_retry_delay_ms),
            config.retry_attempts,
        )
        .with_jitter(config.retry_jitter)
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Whether a task that has failed `attempts` times gets another go
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// Delay after the `attempts`-th failed attempt
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(64) as i32;
        let base_ms = self.base.as_millis() as f64;
        let max_ms = self.max.as_millis() as f64;

        let mut delay_ms = (base_ms * self.multiplier.powi(exponent)).min(max_ms);

        if self.jitter > 0.0 {
            let factor = 1.0 + rand::random_range(-self.jitter..=self.jitter);
            delay_ms = (delay_ms * factor).clamp(0.0, max_ms);
        }

        Duration::from_millis(delay_ms.round() as u64)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(2000),
            1.5,
            Duration::from_secs(60),
            3,
        )
    }

    #[test]
    fn test_delay_grows_by_multiplier() {
        let policy = policy();
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(3000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(4500));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = policy();
        assert_eq!(policy.delay_for(50), Duration::from_secs(60));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_should_retry_counts_total_attempts() {
        let policy = policy();
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = policy().with_jitter(0.25);
        for _ in 0..200 {
            let delay = policy.delay_for(1).as_millis();
            assert!((1500..=2500).contains(&delay), "delay {} out of range", delay);
        }
    }

    #[test]
    fn test_from_config() {
        let config = ExecutorConfig::default();
        let policy = BackoffPolicy::from_config(&config);
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
    }
}
