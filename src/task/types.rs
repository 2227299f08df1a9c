use crate::task::runner::TaskRunner;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier for tasks
pub type TaskId = Uuid;

/// Grouping metadata passed through untouched to the task tracker
pub type TaskGroup = BTreeMap<String, String>;

/// Lifecycle status of a task
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting in the pending queue, or cooling down before a retry
    Queued,
    /// Currently executing
    Running,
    /// Finished successfully
    Completed,
    /// Exhausted its attempts, or was cancelled by shutdown
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Errors produced by a single execution of a task
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TaskError {
    #[error("Task timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("{message}")]
    Execution { message: String },
    #[error("Task cancelled")]
    Cancelled,
    #[error("Task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Build an execution error from anything printable
    pub fn execution(message: impl Into<String>) -> Self {
        TaskError::Execution {
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(error: anyhow::Error) -> Self {
        TaskError::execution(format!("{:#}", error))
    }
}

/// Specification for submitting a new task
#[derive(Clone)]
pub struct TaskSpec {
    pub name: String,
    pub runner: Arc<dyn TaskRunner>,
    pub group: Option<TaskGroup>,
}

impl TaskSpec {
    pub fn new(name: impl Into<String>, runner: impl TaskRunner + 'static) -> Self {
        Self {
            name: name.into(),
            runner: Arc::new(runner),
            group: None,
        }
    }

    /// Attach grouping metadata for the tracker
    pub fn with_group(mut self, group: TaskGroup) -> Self {
        self.group = Some(group);
        self
    }
}

impl fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpec")
            .field("name", &self.name)
            .field("runner", &self.runner.describe())
            .field("group", &self.group)
            .finish()
    }
}

/// Task descriptor owned by the executor once admitted
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub runner: Arc<dyn TaskRunner>,
    pub group: Option<TaskGroup>,
    pub status: TaskStatus,
    pub attempts: u32,
    pub added_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub result: Option<serde_json::Value>,
    pub duration: Option<Duration>,
    /// Settled by shutdown rather than by its own outcome
    pub cancelled: bool,
}

impl Task {
    /// Create a queued task with a fresh id
    pub fn new(spec: TaskSpec) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: spec.name,
            runner: spec.runner,
            group: spec.group,
            status: TaskStatus::Queued,
            attempts: 0,
            added_at: Utc::now(),
            started_at: None,
            completed_at: None,
            failed_at: None,
            last_error: None,
            result: None,
            duration: None,
            cancelled: false,
        }
    }

    pub fn mark_running(&mut self) {
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self, result: serde_json::Value, duration: Duration) {
        self.status = TaskStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.result = Some(result);
        self.duration = Some(duration);
    }

    /// Record a failed attempt; the caller decides whether it is terminal
    pub fn record_failure(&mut self, error: &TaskError, duration: Duration) {
        self.attempts += 1;
        self.last_error = Some(error.to_string());
        self.duration = Some(duration);
    }

    pub fn mark_failed(&mut self) {
        self.status = TaskStatus::Failed;
        self.failed_at = Some(Utc::now());
    }

    pub fn mark_cancelled(&mut self) {
        self.last_error = Some(TaskError::Cancelled.to_string());
        self.cancelled = true;
        self.mark_failed();
    }

    pub fn requeue(&mut self) {
        self.status = TaskStatus::Queued;
    }

    /// Serializable snapshot of the task
    pub fn record(&self) -> TaskRecord {
        TaskRecord {
            id: self.id,
            name: self.name.clone(),
            group: self.group.clone(),
            status: self.status,
            attempts: self.attempts,
            added_at: self.added_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            failed_at: self.failed_at,
            last_error: self.last_error.clone(),
            result: self.result.clone(),
            duration_ms: self.duration.map(|d| d.as_millis() as u64),
            cancelled: self.cancelled,
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status)
            .field("attempts", &self.attempts)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

/// Point-in-time view of a task, safe to share and serialize
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TaskRecord {
    pub id: TaskId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<TaskGroup>,
    pub status: TaskStatus,
    pub attempts: u32,
    pub added_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub result: Option<serde_json::Value>,
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub cancelled: bool,
}
