use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Sliding-window rate limiter.
///
/// Admits at most `limit` recorded operations within any rolling `window`.
/// Checking and recording are separate so that a caller only consumes a slot
/// when it actually goes ahead with the operation.
#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    admitted: VecDeque<Instant>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RateLimiterStatus {
    pub limit: usize,
    pub window_ms: u64,
    pub in_window: usize,
    pub available: usize,
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            admitted: VecDeque::with_capacity(limit),
        }
    }

    /// Whether another operation may proceed right now
    pub fn admit(&mut self) -> bool {
        self.admit_at(Instant::now())
    }

    pub fn admit_at(&mut self, now: Instant) -> bool {
        self.prune(now);
        self.admitted.len() < self.limit
    }

    /// Record that an admitted operation went ahead
    pub fn record(&mut self) {
        self.record_at(Instant::now());
    }

    pub fn record_at(&mut self, now: Instant) {
        self.admitted.push_back(now);
    }

    /// Drop timestamps that fell out of the window ending at `now`
    fn prune(&mut self, now: Instant) {
        let Some(cutoff) = now.checked_sub(self.window) else {
            return;
        };
        while let Some(&oldest) = self.admitted.front() {
            if oldest < cutoff {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }

    /// Remaining permits as of the last prune
    pub fn available(&self) -> usize {
        self.limit.saturating_sub(self.admitted.len())
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn status(&self) -> RateLimiterStatus {
        RateLimiterStatus {
            limit: self.limit,
            window_ms: self.window.as_millis() as u64,
            in_window: self.admitted.len(),
            available: self.available(),
        }
    }
}
