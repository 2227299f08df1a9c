use crate::task::{TaskId, TaskRecord, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;

/// Running counters kept by the dispatch loop.
///
/// `total_tasks` counts admitted tasks only; every admitted task ends up in
/// exactly one of `completed`, `failed` or `cancelled`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutorStatistics {
    pub total_tasks: u64,
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub retried: u64,
    pub cancelled: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExecutorStatistics {
    /// Admitted plus rejected
    pub fn submitted(&self) -> u64 {
        self.total_tasks + self.skipped
    }

    pub fn settled(&self) -> u64 {
        self.completed + self.failed + self.cancelled
    }
}

/// A task that did not complete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedTaskReport {
    pub id: TaskId,
    pub name: String,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl From<&TaskRecord> for FailedTaskReport {
    fn from(record: &TaskRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            attempts: record.attempts,
            last_error: record.last_error.clone(),
        }
    }
}

/// Summary returned when a run ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub total_tasks: u64,
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub retried: u64,
    pub cancelled: u64,
    /// Completed over admitted, 0.0 when nothing was admitted
    pub success_rate: f64,
    pub duration_ms: u64,
    /// Wall time of the run divided by completed tasks
    pub average_task_duration_ms: u64,
    pub final_ceiling: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failed_tasks: Vec<FailedTaskReport>,
    #[serde(default)]
    pub cancelled_tasks: Vec<FailedTaskReport>,
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
}

impl RunReport {
    pub fn new(
        stats: &ExecutorStatistics,
        duration: Duration,
        final_ceiling: usize,
        tasks: Vec<TaskRecord>,
    ) -> Self {
        let success_rate = if stats.total_tasks == 0 {
            0.0
        } else {
            stats.completed as f64 / stats.total_tasks as f64
        };
        let duration_ms = duration.as_millis() as u64;
        let average_task_duration_ms = duration_ms.checked_div(stats.completed).unwrap_or(0);

        let failed_tasks = tasks
            .iter()
            .filter(|record| record.status == TaskStatus::Failed && !record.cancelled)
            .map(FailedTaskReport::from)
            .collect();
        let cancelled_tasks = tasks
            .iter()
            .filter(|record| record.cancelled)
            .map(FailedTaskReport::from)
            .collect();

        Self {
            total_tasks: stats.total_tasks,
            submitted: stats.submitted(),
            completed: stats.completed,
            failed: stats.failed,
            skipped: stats.skipped,
            retried: stats.retried,
            cancelled: stats.cancelled,
            success_rate,
            duration_ms,
            average_task_duration_ms,
            final_ceiling,
            started_at: stats.started_at,
            finished_at: stats.finished_at,
            failed_tasks,
            cancelled_tasks,
            tasks,
        }
    }

    /// No admitted task failed or was cancelled
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }

    /// Human-readable summary for terminal output
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Run summary");
        let _ = writeln!(out, "  submitted:    {}", self.submitted);
        let _ = writeln!(out, "  admitted:     {}", self.total_tasks);
        let _ = writeln!(out, "  completed:    {}", self.completed);
        let _ = writeln!(out, "  failed:       {}", self.failed);
        let _ = writeln!(out, "  cancelled:    {}", self.cancelled);
        let _ = writeln!(out, "  skipped:      {}", self.skipped);
        let _ = writeln!(out, "  retried:      {}", self.retried);
        let _ = writeln!(out, "  success rate: {:.1}%", self.success_rate * 100.0);
        let _ = writeln!(out, "  duration:     {}ms", self.duration_ms);
        let _ = writeln!(out, "  avg per task: {}ms", self.average_task_duration_ms);
        let _ = writeln!(out, "  concurrency:  {}", self.final_ceiling);

        if !self.failed_tasks.is_empty() {
            let _ = writeln!(out, "Failed tasks:");
            for task in &self.failed_tasks {
                let _ = writeln!(
                    out,
                    "  - {} after {} attempt(s): {}",
                    task.name,
                    task.attempts,
                    task.last_error.as_deref().unwrap_or("unknown error")
                );
            }
        }
        if !self.cancelled_tasks.is_empty() {
            let _ = writeln!(out, "Cancelled tasks:");
            for task in &self.cancelled_tasks {
                let _ = writeln!(out, "  - {}", task.name);
            }
        }
        out
    }
}
