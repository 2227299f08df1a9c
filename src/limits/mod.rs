//! Dispatch limits: the sliding-window rate limiter, the health gate that
//! combines it with concurrency and backlog checks, and the tuner that moves
//! the concurrency ceiling.

pub mod health;
pub mod rate_limiter;
pub mod tuner;

#[cfg(test)]
mod tests;

pub use health::{HealthGate, HealthStatus, UnhealthyReason};
pub use rate_limiter::{RateLimiter, RateLimiterStatus};
pub use tuner::{Adjustment, ConcurrencyTuner, TuningMode};
