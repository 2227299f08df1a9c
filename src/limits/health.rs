use crate::limits::rate_limiter::RateLimiter;
use serde::Serialize;
use std::fmt;
use tokio::time::Instant;

/// Why the gate refused a dispatch, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnhealthyReason {
    MaxConcurrency,
    QueueTooLarge,
    RateLimit,
}

impl fmt::Display for UnhealthyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UnhealthyReason::MaxConcurrency => "max_concurrency",
            UnhealthyReason::QueueTooLarge => "queue_too_large",
            UnhealthyReason::RateLimit => "rate_limit",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub reason: Option<UnhealthyReason>,
}

impl HealthStatus {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            reason: None,
        }
    }

    pub fn unhealthy(reason: UnhealthyReason) -> Self {
        Self {
            healthy: false,
            reason: Some(reason),
        }
    }
}

/// Admission check run by the dispatch loop before every pop.
///
/// The gate owns the rate limiter; apart from the limiter's lazy pruning a
/// check has no side effects, so polling it repeatedly is fine.
#[derive(Debug)]
pub struct HealthGate {
    limiter: RateLimiter,
}

impl HealthGate {
    pub fn new(limiter: RateLimiter) -> Self {
        Self { limiter }
    }

    pub fn check(&mut self, running: usize, queue_len: usize, ceiling: usize) -> HealthStatus {
        self.check_at(running, queue_len, ceiling, Instant::now())
    }

    pub fn check_at(
        &mut self,
        running: usize,
        queue_len: usize,
        ceiling: usize,
        now: Instant,
    ) -> HealthStatus {
        // Evaluated before the candidate joins the running set, so running == ceiling passes
        if running > ceiling {
            return HealthStatus::unhealthy(UnhealthyReason::MaxConcurrency);
        }
        if running + queue_len > ceiling * 2 {
            return HealthStatus::unhealthy(UnhealthyReason::QueueTooLarge);
        }
        if !self.limiter.admit_at(now) {
            return HealthStatus::unhealthy(UnhealthyReason::RateLimit);
        }
        HealthStatus::healthy()
    }

    /// Rate-limit check alone, for callers that treat the backlog check as advisory
    pub fn rate_admits(&mut self) -> bool {
        self.limiter.admit()
    }

    /// Consume a rate-limit slot for a dispatch that went ahead
    pub fn record_dispatch(&mut self) {
        self.limiter.record();
    }

    pub fn record_dispatch_at(&mut self, now: Instant) {
        self.limiter.record_at(now);
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}
