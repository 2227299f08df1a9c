//! # taskgate
//!
//! A local async task executor: tasks are queued, dispatched under an
//! adaptive concurrency ceiling and a sliding-window rate limit, bounded by a
//! per-attempt timeout, and retried with exponential backoff.
//!
//! ## Architecture Overview
//!
//! - **[`task`]**: Task descriptors, lifecycle records, the bounded queue and task runners
//! - **[`limits`]**: Rate limiter, health gate and concurrency tuner
//! - **[`executor`]**: The dispatch loop, retry policy, trackers and run statistics
//! - **[`cli`]**: Argument parsing, configuration discovery and task file loading
//!
//! ## Features
//!
//! ### 🚦 Admission Control
//! - **Concurrency Ceiling**: At most `ceiling` tasks in flight, tuned between 1 and a hard limit
//! - **Rate Limiting**: Sliding window over dispatch timestamps
//! - **Bounded Queue**: Submissions beyond `max_queue_size` are rejected and counted as skipped
//!
//! ### 🔁 Failure Handling
//! - **Timeouts**: Each attempt races its timeout; the loser is cancelled through its token
//! - **Retries**: Failed attempts cool down and rejoin the tail of the queue
//! - **Panics**: A panicking runner is a failed attempt, not a crashed executor
//!
//! ### 📊 Reporting
//! - **Trackers**: Async hooks for every settled task, including a JSON-lines event log
//! - **Run Report**: Counters, success rate, timings and failed task details
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use taskgate::{ExecutorConfig, FnRunner, TaskExecutor, TaskSpec};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut executor = TaskExecutor::new(ExecutorConfig::default())?;
//!
//!     executor.submit(TaskSpec::new(
//!         "hello",
//!         FnRunner::new(|_: CancellationToken| async { Ok(serde_json::json!("hello")) }),
//!     ))?;
//!
//!     let report = executor.run().await;
//!     println!("{}", report.render());
//!     Ok(())
//! }
//! ```

/// Task descriptors, queue and runners.
pub mod task;

/// Dispatch limits: rate limiter, health gate and concurrency tuner.
pub mod limits;

/// The executor and its dispatch loop.
pub mod executor;

/// Environment constants and path utilities.
pub mod env;

// CLI module for command-line interface
pub mod cli;

pub use executor::{
    BackoffPolicy, ExecutorConfig, ExecutorError, ExecutorHandle, ExecutorStatistics, RunReport,
    TaskExecutor, TaskTracker,
};
pub use limits::{ConcurrencyTuner, HealthGate, RateLimiter, TuningMode};
pub use task::{
    CommandRunner, FnRunner, HttpRunner, TaskError, TaskId, TaskRecord, TaskRunner, TaskSpec,
    TaskStatus,
};
