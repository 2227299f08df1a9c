//! Executor configuration.
//!
//! Every field has a default so that a TOML file only needs to name what it
//! changes. Durations are plain milliseconds.

use crate::executor::error::ExecutorError;
use crate::limits::TuningMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutorConfig {
    /// Initial concurrency ceiling
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Upper bound the tuner may raise the ceiling to
    #[serde(default = "default_max_concurrency_limit")]
    pub max_concurrency_limit: usize,

    /// Dispatches allowed per rate window
    #[serde(default = "default_rate_limit")]
    pub rate_limit: usize,

    #[serde(default = "default_rate_window_ms")]
    pub rate_window_ms: u64,

    /// Total execution attempts per task, including the first
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Backoff before the second attempt
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Random spread applied to backoff delays, as a fraction (0.0-1.0)
    #[serde(default)]
    pub retry_jitter: f64,

    /// Per-attempt timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Interval between concurrency tuner ticks
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,

    /// Interval between dispatch attempts
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    #[serde(default)]
    pub tuning_mode: TuningMode,
}

fn default_max_concurrency() -> usize {
    3
}

fn default_max_concurrency_limit() -> usize {
    5
}

fn default_rate_limit() -> usize {
    10
}

fn default_rate_window_ms() -> u64 {
    1000
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_max_retry_delay_ms() -> u64 {
    60_000
}

fn default_backoff_multiplier() -> f64 {
    1.5
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_health_check_interval_ms() -> u64 {
    5000
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_max_queue_size() -> usize {
    100
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            max_concurrency_limit: default_max_concurrency_limit(),
            rate_limit: default_rate_limit(),
            rate_window_ms: default_rate_window_ms(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            retry_jitter: 0.0,
            timeout_ms: default_timeout_ms(),
            health_check_interval_ms: default_health_check_interval_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            max_queue_size: default_max_queue_size(),
            tuning_mode: TuningMode::default(),
        }
    }
}

impl ExecutorConfig {
    /// Reject values the executor cannot run with
    pub fn validate(&self) -> Result<(), ExecutorError> {
        let invalid = |message: &str| Err(ExecutorError::InvalidConfig(message.to_string()));

        if self.max_concurrency == 0 {
            return invalid("max_concurrency must be at least 1");
        }
        if self.max_concurrency_limit == 0 {
            return invalid("max_concurrency_limit must be at least 1");
        }
        if self.rate_limit == 0 {
            return invalid("rate_limit must be at least 1");
        }
        if self.retry_attempts == 0 {
            return invalid("retry_attempts must be at least 1");
        }
        if self.max_queue_size == 0 {
            return invalid("max_queue_size must be at least 1");
        }
        if self.rate_window_ms == 0
            || self.timeout_ms == 0
            || self.health_check_interval_ms == 0
            || self.poll_interval_ms == 0
        {
            return invalid("intervals and timeouts must be greater than zero");
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return invalid("backoff_multiplier must be a finite number >= 1.0");
        }
        if !(0.0..=1.0).contains(&self.retry_jitter) {
            return invalid("retry_jitter must be between 0.0 and 1.0");
        }
        if self.max_retry_delay_ms < self.retry_delay_ms {
            return invalid("max_retry_delay_ms must not be smaller than retry_delay_ms");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_millis(self.rate_window_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = delay.as_millis() as u64;
        self.max_retry_delay_ms = self.max_retry_delay_ms.max(self.retry_delay_ms);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    pub fn with_tuning_mode(mut self, mode: TuningMode) -> Self {
        self.tuning_mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_config_default() {
        let config = ExecutorConfig::default();
        assert_eq!(config.max_concurrency, 3);
        assert_eq!(config.max_concurrency_limit, 5);
        assert_eq!(config.rate_limit, 10);
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.retry_delay_ms, 2000);
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.backoff_multiplier, 1.5);
        assert_eq!(config.health_check_interval_ms, 5000);
        assert_eq!(config.max_queue_size, 100);
        assert_eq!(config.tuning_mode, TuningMode::Cumulative);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ExecutorConfig = toml::from_str(
            "max_concurrency = 2\n\
             tuning_mode = \"windowed\"\n",
        )
        .unwrap();

        assert_eq!(config.max_concurrency, 2);
        assert_eq!(config.tuning_mode, TuningMode::Windowed);
        assert_eq!(config.rate_limit, 10);
        assert_eq!(config.poll_interval_ms, 100);
    }

    #[test]
    fn test_config_serialization() {
        let config = ExecutorConfig::default().with_max_concurrency(4);
        let toml_string = toml::to_string(&config).unwrap();

        let deserialized: ExecutorConfig = toml::from_str(&toml_string).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let cases = [
            ExecutorConfig::default().with_max_concurrency(0),
            ExecutorConfig::default().with_retry_attempts(0),
            ExecutorConfig::default().with_max_queue_size(0),
            ExecutorConfig {
                backoff_multiplier: 0.5,
                ..Default::default()
            },
            ExecutorConfig {
                retry_jitter: 1.5,
                ..Default::default()
            },
            ExecutorConfig {
                poll_interval_ms: 0,
                ..Default::default()
            },
        ];

        for config in cases {
            assert!(
                matches!(config.validate(), Err(ExecutorError::InvalidConfig(_))),
                "expected {:?} to be rejected",
                config
            );
        }
    }

    #[test]
    fn test_with_retry_delay_keeps_cap_consistent() {
        let config = ExecutorConfig::default().with_retry_delay(Duration::from_secs(120));
        assert_eq!(config.retry_delay_ms, 120_000);
        assert_eq!(config.max_retry_delay_ms, 120_000);
        assert!(config.validate().is_ok());
    }
}
