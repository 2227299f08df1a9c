use crate::executor::error::ExecutorError;
use crate::task::{TaskId, TaskRecord, TaskSpec};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// A task submitted through a handle, with the channel for its admission result
pub(crate) struct Submission {
    pub(crate) spec: TaskSpec,
    pub(crate) reply: oneshot::Sender<Result<TaskId, ExecutorError>>,
}

/// Cloneable view of a running executor.
///
/// Submissions are forwarded to the dispatch loop, which applies the same
/// queue-capacity rules as [`TaskExecutor::submit`](super::TaskExecutor::submit).
/// Once the run has ended every submission fails with [`ExecutorError::Closed`].
#[derive(Clone)]
pub struct ExecutorHandle {
    submit_tx: mpsc::Sender<Submission>,
    registry: Arc<DashMap<TaskId, TaskRecord>>,
    ceiling: Arc<AtomicUsize>,
    shutdown: CancellationToken,
}

impl ExecutorHandle {
    pub(crate) fn new(
        submit_tx: mpsc::Sender<Submission>,
        registry: Arc<DashMap<TaskId, TaskRecord>>,
        ceiling: Arc<AtomicUsize>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            submit_tx,
            registry,
            ceiling,
            shutdown,
        }
    }

    pub async fn submit(&self, spec: TaskSpec) -> Result<TaskId, ExecutorError> {
        let (reply, response) = oneshot::channel();
        self.submit_tx
            .send(Submission { spec, reply })
            .await
            .map_err(|_| ExecutorError::Closed)?;
        response.await.map_err(|_| ExecutorError::Closed)?
    }

    /// Latest snapshot of a task admitted by this executor
    pub fn task(&self, id: TaskId) -> Option<TaskRecord> {
        self.registry.get(&id).map(|entry| entry.value().clone())
    }

    /// Current concurrency ceiling as set by the tuner
    pub fn ceiling(&self) -> usize {
        self.ceiling.load(Ordering::Acquire)
    }

    /// Stop dispatching, cancel waiting tasks and signal in-flight ones
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
