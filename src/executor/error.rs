use crate::task::TaskId;

/// Errors surfaced by the executor itself, as opposed to a task's own failure
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutorError {
    #[error("Queue is full ({capacity} pending tasks), task rejected")]
    EnqueueRejected { capacity: usize },
    #[error("Executor is no longer accepting tasks")]
    Closed,
    #[error("Invalid executor configuration: {0}")]
    InvalidConfig(String),
    #[error("Unknown task {0}")]
    UnknownTask(TaskId),
}
