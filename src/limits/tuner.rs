use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

/// Failure ratio above which the ceiling is lowered
pub const DECREASE_FAILURE_RATIO: f64 = 0.10;

/// Failure ratio below which the ceiling is raised
pub const INCREASE_FAILURE_RATIO: f64 = 0.05;

/// Which counts the tuner compares on each tick
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TuningMode {
    /// Lifetime completed/failed counts. Grows less sensitive as a run gets long.
    #[default]
    Cumulative,
    /// Only what completed/failed since the previous tick
    Windowed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    Increased { from: usize, to: usize },
    Decreased { from: usize, to: usize },
    Unchanged,
}

/// Raises or lowers the concurrency ceiling from the observed failure ratio.
///
/// The ceiling lives in an atomic so that handles can read it; only the tuner
/// writes it.
#[derive(Debug)]
pub struct ConcurrencyTuner {
    ceiling: Arc<AtomicUsize>,
    max: usize,
    mode: TuningMode,
    last_completed: u64,
    last_failed: u64,
}

impl ConcurrencyTuner {
    /// `initial` is clamped into `[1, max]`
    pub fn new(initial: usize, max: usize, mode: TuningMode) -> Self {
        let max = max.max(1);
        Self {
            ceiling: Arc::new(AtomicUsize::new(initial.clamp(1, max))),
            max,
            mode,
            last_completed: 0,
            last_failed: 0,
        }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling.load(Ordering::Acquire)
    }

    pub fn shared_ceiling(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.ceiling)
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn mode(&self) -> TuningMode {
        self.mode
    }

    /// Apply the tuning policy to the current completed/failed totals
    pub fn tick(&mut self, completed: u64, failed: u64) -> Adjustment {
        let (completed_seen, failed_seen) = match self.mode {
            TuningMode::Cumulative => (completed, failed),
            TuningMode::Windowed => (
                completed.saturating_sub(self.last_completed),
                failed.saturating_sub(self.last_failed),
            ),
        };
        self.last_completed = completed;
        self.last_failed = failed;

        let current = self.ceiling();
        let failed_f = failed_seen as f64;
        let completed_f = completed_seen as f64;

        let target = if failed_f > completed_f * DECREASE_FAILURE_RATIO {
            current.saturating_sub(1).max(1)
        } else if failed_f < completed_f * INCREASE_FAILURE_RATIO && current < self.max {
            current + 1
        } else {
            current
        };

        if target == current {
            debug!(
                ceiling = current,
                completed = completed_seen,
                failed = failed_seen,
                "Concurrency ceiling unchanged"
            );
            return Adjustment::Unchanged;
        }

        self.ceiling.store(target, Ordering::Release);
        info!(
            from = current,
            to = target,
            completed = completed_seen,
            failed = failed_seen,
            "Adjusted concurrency ceiling"
        );

        if target > current {
            Adjustment::Increased {
                from: current,
                to: target,
            }
        } else {
            Adjustment::Decreased {
                from: current,
                to: target,
            }
        }
    }
}
