//! # Task Executor
//!
//! Runs queued tasks on the local tokio runtime under a concurrency ceiling,
//! a dispatch rate limit, per-attempt timeouts and retry with backoff.
//!
//! ## Core Components
//!
//! - **[`TaskExecutor`]**: Owns the queue, limits and statistics and drives the dispatch loop
//! - **[`ExecutorHandle`]**: Cloneable handle for submitting tasks and stopping a run
//! - **[`ExecutorConfig`]**: Serde-backed configuration with per-field defaults
//! - **[`BackoffPolicy`]**: Exponential backoff between attempts of one task
//! - **[`TaskTracker`]**: Async hooks called once per settled task
//! - **[`RunReport`]**: Summary statistics returned when a run ends
//!
//! ## Dispatch Loop
//!
//! ```text
//!  submit ──► pending ──(poll tick, gate ok)──► in flight ──► completed
//!                ▲                                  │
//!                │                                  ▼ failed attempt
//!                └──────(backoff elapsed)──── cooling ──► failed
//! ```
//!
//! - One task is popped per poll tick, and only while fewer tasks are in
//!   flight than the current ceiling and the rate limiter has room
//! - Every attempt runs on its own tokio task with a child cancellation token
//!   and reports its outcome back over a channel
//! - Failed attempts cool down for the backoff delay and rejoin the tail of the
//!   queue until `retry_attempts` is used up
//! - The concurrency tuner runs on its own interval and moves the ceiling
//!   between 1 and `max_concurrency_limit` based on the failure ratio
//! - The run ends once nothing is pending, in flight or cooling
//!
//! ## Shutdown
//!
//! Cancelling the executor's token (or calling [`ExecutorHandle::shutdown`])
//! stops dispatching, cancels pending and cooling tasks and signals in-flight
//! attempts through their tokens. The run then waits for the in-flight
//! attempts to settle and returns a report as usual.
//!
//! ## Usage Example
//!
//! ```no_run
//! use taskgate::executor::{ExecutorConfig, TaskExecutor};
//! use taskgate::task::{CommandRunner, TaskSpec};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut executor = TaskExecutor::new(ExecutorConfig::default())?;
//! executor.submit(TaskSpec::new("build", CommandRunner::new("cargo", vec!["build".into()])?))?;
//!
//! let report = executor.run().await;
//! println!("{}", report.render());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod handle;
pub mod retry;
pub mod stats;
pub mod tracker;


pub use config::ExecutorConfig;
pub use dispatch::TaskExecutor;
pub use error::ExecutorError;
pub use handle::ExecutorHandle;
pub use retry::BackoffPolicy;
pub use stats::{ExecutorStatistics, FailedTaskReport, RunReport};
pub use tracker::{JsonlTracker, LogTracker, NoopTracker, TaskTracker, TrackerSet};
