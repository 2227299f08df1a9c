use crate::executor::config::ExecutorConfig;
use crate::executor::error::ExecutorError;
use crate::executor::handle::{ExecutorHandle, Submission};
use crate::executor::retry::BackoffPolicy;
use crate::executor::stats::{ExecutorStatistics, RunReport};
use crate::executor::tracker::{NoopTracker, TaskTracker};
use crate::limits::{ConcurrencyTuner, HealthGate, RateLimiter, UnhealthyReason};
use crate::task::{Task, TaskError, TaskId, TaskQueue, TaskRecord, TaskRunner, TaskSpec};
use chrono::Utc;
use dashmap::DashMap;
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval, interval_at};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker as HookTasks;
use tracing::{debug, error, info, warn};

/// Messages sent back to the dispatch loop by the work it spawned
#[derive(Debug)]
enum LoopEvent {
    /// An execution attempt settled, successfully or not
    Finished {
        id: TaskId,
        outcome: Result<Value, TaskError>,
        elapsed: Duration,
    },
    /// A cooling task's backoff delay elapsed
    RetryReady { id: TaskId },
}

/// Local task executor.
///
/// All scheduling state (queue, limiter, tuner, statistics) is owned by the
/// executor and only touched from the dispatch loop. Executions and retry
/// timers run as separate tokio tasks and report back through a channel.
pub struct TaskExecutor {
    config: ExecutorConfig,
    queue: TaskQueue,
    gate: HealthGate,
    tuner: ConcurrencyTuner,
    backoff: BackoffPolicy,
    stats: ExecutorStatistics,
    tracker: Arc<dyn TaskTracker>,
    /// In-progress tracker hooks, awaited before a run returns
    hooks: HookTasks,
    registry: Arc<DashMap<TaskId, TaskRecord>>,
    finished: Vec<TaskRecord>,
    shutdown: CancellationToken,
    events_tx: mpsc::UnboundedSender<LoopEvent>,
    events_rx: mpsc::UnboundedReceiver<LoopEvent>,
    submit_tx: mpsc::Sender<Submission>,
    submit_rx: mpsc::Receiver<Submission>,
}

impl TaskExecutor {
    pub fn new(config: ExecutorConfig) -> Result<Self, ExecutorError> {
        config.validate()?;

        let limiter = RateLimiter::new(config.rate_limit, config.rate_window());
        let tuner = ConcurrencyTuner::new(
            config.max_concurrency,
            config.max_concurrency_limit,
            config.tuning_mode,
        );
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (submit_tx, submit_rx) = mpsc::channel(config.max_queue_size);

        info!(
            max_concurrency = tuner.ceiling(),
            max_concurrency_limit = tuner.max(),
            rate_limit = config.rate_limit,
            max_queue_size = config.max_queue_size,
            "Created task executor"
        );

        Ok(Self {
            queue: TaskQueue::new(config.max_queue_size),
            gate: HealthGate::new(limiter),
            backoff: BackoffPolicy::from_config(&config),
            tuner,
            stats: ExecutorStatistics::default(),
            tracker: Arc::new(NoopTracker),
            hooks: HookTasks::new(),
            registry: Arc::new(DashMap::new()),
            finished: Vec::new(),
            shutdown: CancellationToken::new(),
            events_tx,
            events_rx,
            submit_tx,
            submit_rx,
            config,
        })
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn TaskTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    /// Admit a task, or count it as skipped when the queue is full
    pub fn submit(&mut self, spec: TaskSpec) -> Result<TaskId, ExecutorError> {
        let task = Task::new(spec);
        let record = task.record();
        let name = task.name.clone();

        match self.queue.push(task) {
            Ok(id) => {
                self.stats.total_tasks += 1;
                self.registry.insert(id, record);
                debug!(task_id = %id, task = %name, pending = self.queue.pending_len(), "Task queued");
                Ok(id)
            }
            Err(rejected) => {
                self.stats.skipped += 1;
                warn!(
                    task = %rejected.name,
                    capacity = self.queue.max_size(),
                    "Queue full, skipping task"
                );
                Err(ExecutorError::EnqueueRejected {
                    capacity: self.queue.max_size(),
                })
            }
        }
    }

    /// Like [`submit`](Self::submit), reporting only whether the task was admitted
    pub fn enqueue(&mut self, spec: TaskSpec) -> bool {
        self.submit(spec).is_ok()
    }

    /// Cloneable handle for submitting tasks and observing the run from elsewhere
    pub fn handle(&self) -> ExecutorHandle {
        ExecutorHandle::new(
            self.submit_tx.clone(),
            Arc::clone(&self.registry),
            self.tuner.shared_ceiling(),
            self.shutdown.clone(),
        )
    }

    /// Token that stops the run when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn statistics(&self) -> &ExecutorStatistics {
        &self.stats
    }

    pub fn ceiling(&self) -> usize {
        self.tuner.ceiling()
    }

    pub fn pending_len(&self) -> usize {
        self.queue.pending_len()
    }

    pub fn task(&self, id: TaskId) -> Option<TaskRecord> {
        self.registry.get(&id).map(|entry| entry.value().clone())
    }

    /// Run until every admitted task has settled, or until shutdown.
    ///
    /// Always produces a report; an internal loop error is logged and the
    /// report is built from whatever was accumulated.
    pub async fn run(mut self) -> RunReport {
        let run_started = Instant::now();
        self.stats.started_at = Some(Utc::now());

        info!(
            pending = self.queue.pending_len(),
            ceiling = self.tuner.ceiling(),
            "Starting executor run"
        );

        if let Err(e) = self.drive().await {
            error!(error = %e, "Dispatch loop stopped unexpectedly");
            self.abandon_remaining();
        }

        self.hooks.close();
        if !self.hooks.is_empty() {
            debug!(hooks = self.hooks.len(), "Waiting for tracker hooks");
        }
        self.hooks.wait().await;

        self.stats.finished_at = Some(Utc::now());
        let report = RunReport::new(
            &self.stats,
            run_started.elapsed(),
            self.tuner.ceiling(),
            std::mem::take(&mut self.finished),
        );

        info!(
            total = report.total_tasks,
            completed = report.completed,
            failed = report.failed,
            skipped = report.skipped,
            retried = report.retried,
            cancelled = report.cancelled,
            duration_ms = report.duration_ms,
            "Executor run finished"
        );
        report
    }

    async fn drive(&mut self) -> Result<(), ExecutorError> {
        let mut poll = interval(self.config.poll_interval());
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let tuning_period = self.config.health_check_interval();
        let mut tuning = interval_at(Instant::now() + tuning_period, tuning_period);
        tuning.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let shutdown = self.shutdown.clone();
        let mut shutting_down = false;

        while !self.queue.is_idle() {
            tokio::select! {
                biased;

                _ = shutdown.cancelled(), if !shutting_down => {
                    shutting_down = true;
                    self.begin_shutdown();
                }
                Some(event) = self.events_rx.recv() => {
                    self.handle_event(event, shutting_down)?;
                }
                Some(submission) = self.submit_rx.recv() => {
                    let result = if shutting_down {
                        Err(ExecutorError::Closed)
                    } else {
                        self.submit(submission.spec)
                    };
                    // The submitter may have given up waiting
                    let _ = submission.reply.send(result);
                }
                _ = tuning.tick() => {
                    self.tuner.tick(self.stats.completed, self.stats.failed);
                }
                _ = poll.tick(), if !shutting_down => {
                    self.try_dispatch();
                }
            }
        }

        Ok(())
    }

    /// Start at most one pending task if the limits allow it
    fn try_dispatch(&mut self) {
        if self.queue.pending_len() == 0 {
            return;
        }

        let ceiling = self.tuner.ceiling();
        let running = self.queue.in_flight_len();
        if running >= ceiling {
            return;
        }

        let status = self
            .gate
            .check(running, self.queue.pending_len(), ceiling);
        match status.reason {
            None => {}
            // A deep backlog alone never stops dispatch, or a queue deeper
            // than twice the ceiling could not drain
            Some(UnhealthyReason::QueueTooLarge) => {
                debug!(
                    running,
                    pending = self.queue.pending_len(),
                    ceiling,
                    "Backlog exceeds twice the concurrency ceiling"
                );
                if !self.gate.rate_admits() {
                    debug!("Dispatch deferred by rate limit");
                    return;
                }
            }
            Some(reason) => {
                debug!(%reason, running, ceiling, "Dispatch deferred");
                return;
            }
        }

        self.gate.record_dispatch();
        let Some(task) = self.queue.start_next() else {
            return;
        };

        let id = task.id;
        let runner = Arc::clone(&task.runner);
        info!(
            task_id = %id,
            task = %task.name,
            attempt = task.attempts + 1,
            running = running + 1,
            ceiling,
            "Dispatching task"
        );
        self.registry.insert(id, task.record());
        self.spawn_execution(id, runner);
    }

    fn spawn_execution(&self, id: TaskId, runner: Arc<dyn TaskRunner>) {
        let timeout = self.config.timeout();
        let cancel = self.shutdown.child_token();
        let events = self.events_tx.clone();

        tokio::spawn(async move {
            let started = Instant::now();
            let outcome = execute_attempt(runner, cancel, timeout).await;
            // The loop keeps its receiver while anything is in flight
            let _ = events.send(LoopEvent::Finished {
                id,
                outcome,
                elapsed: started.elapsed(),
            });
        });
    }

    fn handle_event(&mut self, event: LoopEvent, shutting_down: bool) -> Result<(), ExecutorError> {
        match event {
            LoopEvent::Finished {
                id,
                outcome,
                elapsed,
            } => {
                let task = self
                    .queue
                    .finish(id)
                    .ok_or(ExecutorError::UnknownTask(id))?;
                match outcome {
                    Ok(value) => self.complete(task, value, elapsed),
                    Err(error) => self.fail_attempt(task, error, elapsed, shutting_down),
                }
            }
            LoopEvent::RetryReady { id } => match self.queue.release(id) {
                Some(task) => {
                    debug!(task_id = %id, attempts = task.attempts, "Task re-queued for retry");
                    let record = task.record();
                    self.registry.insert(id, record);
                }
                // Shutdown already drained it
                None if shutting_down => {}
                None => return Err(ExecutorError::UnknownTask(id)),
            },
        }
        Ok(())
    }

    fn complete(&mut self, mut task: Task, value: Value, elapsed: Duration) {
        task.mark_completed(value, elapsed);
        self.stats.completed += 1;
        info!(
            task_id = %task.id,
            task = %task.name,
            attempts = task.attempts + 1,
            duration_ms = elapsed.as_millis() as u64,
            "Task completed"
        );
        self.settle(task.record(), true);
    }

    fn fail_attempt(
        &mut self,
        mut task: Task,
        error: TaskError,
        elapsed: Duration,
        shutting_down: bool,
    ) {
        task.record_failure(&error, elapsed);

        if shutting_down {
            task.mark_cancelled();
            self.stats.cancelled += 1;
            warn!(task_id = %task.id, task = %task.name, "Task cancelled by shutdown");
            self.settle(task.record(), false);
            return;
        }

        if self.backoff.should_retry(task.attempts) {
            let delay = self.backoff.delay_for(task.attempts);
            warn!(
                task_id = %task.id,
                task = %task.name,
                attempt = task.attempts,
                max_attempts = self.backoff.max_attempts(),
                retry_in_ms = delay.as_millis() as u64,
                error = %error,
                "Task attempt failed, retrying"
            );
            self.stats.retried += 1;
            self.schedule_retry(task.id, delay);
            self.queue.cool(task);
            return;
        }

        task.mark_failed();
        self.stats.failed += 1;
        error!(
            task_id = %task.id,
            task = %task.name,
            attempts = task.attempts,
            error = %error,
            "Task failed permanently"
        );
        self.settle(task.record(), false);
    }

    fn schedule_retry(&self, id: TaskId, delay: Duration) {
        let events = self.events_tx.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    let _ = events.send(LoopEvent::RetryReady { id });
                }
                _ = shutdown.cancelled() => {}
            }
        });
    }

    /// Cancel everything that has not started; in-flight attempts see their
    /// child tokens cancelled and settle as cancelled
    fn begin_shutdown(&mut self) {
        let waiting = self.queue.drain_waiting();
        warn!(
            in_flight = self.queue.in_flight_len(),
            cancelled = waiting.len(),
            "Shutdown requested, cancelling waiting tasks"
        );
        for task in waiting {
            self.cancel_waiting(task);
        }
    }

    fn cancel_waiting(&mut self, mut task: Task) {
        task.mark_cancelled();
        self.stats.cancelled += 1;
        self.settle(task.record(), false);
    }

    /// After a loop error nothing will settle the remaining tasks
    fn abandon_remaining(&mut self) {
        self.shutdown.cancel();
        for task in self.queue.drain_waiting() {
            self.cancel_waiting(task);
        }
        for task in self.queue.drain_in_flight() {
            self.cancel_waiting(task);
        }
    }

    fn settle(&mut self, record: TaskRecord, completed: bool) {
        self.registry.insert(record.id, record.clone());
        self.finished.push(record.clone());

        let tracker = Arc::clone(&self.tracker);
        self.hooks.spawn(async move {
            let result = if completed {
                tracker.on_task_complete(&record).await
            } else {
                tracker.on_task_failed(&record).await
            };
            if let Err(e) = result {
                warn!(task_id = %record.id, error = %e, "Task tracker hook failed");
            }
        });
    }
}

/// One attempt: the runner races the timeout, and a panic counts as a failure
async fn execute_attempt(
    runner: Arc<dyn TaskRunner>,
    cancel: CancellationToken,
    timeout: Duration,
) -> Result<Value, TaskError> {
    let attempt = AssertUnwindSafe(runner.execute(cancel.clone())).catch_unwind();

    match tokio::time::timeout(timeout, attempt).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(panic)) => Err(TaskError::Panicked(panic_message(panic.as_ref()))),
        Err(_) => {
            // The attempt future is already dropped; the token reaches
            // whatever the runner spawned
            cancel.cancel();
            Err(TaskError::Timeout(timeout))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
