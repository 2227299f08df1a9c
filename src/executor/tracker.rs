//! Completion hooks.
//!
//! The dispatch loop reports every terminal outcome to a [`TaskTracker`].
//! Hooks run on their own tokio task, so a slow or failing tracker never
//! holds up dispatching; errors are logged and dropped.

use crate::task::TaskRecord;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[async_trait]
pub trait TaskTracker: Send + Sync {
    async fn on_task_complete(&self, _record: &TaskRecord) -> Result<()> {
        Ok(())
    }

    /// Called once per task, after its last attempt failed or it was cancelled
    async fn on_task_failed(&self, _record: &TaskRecord) -> Result<()> {
        Ok(())
    }
}

/// Tracker that ignores every outcome
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracker;

impl TaskTracker for NoopTracker {}

/// Writes one log line per outcome
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTracker;

#[async_trait]
impl TaskTracker for LogTracker {
    async fn on_task_complete(&self, record: &TaskRecord) -> Result<()> {
        info!(
            task_id = %record.id,
            task = %record.name,
            attempts = record.attempts,
            duration_ms = record.duration_ms,
            "Tracked task completion"
        );
        Ok(())
    }

    async fn on_task_failed(&self, record: &TaskRecord) -> Result<()> {
        warn!(
            task_id = %record.id,
            task = %record.name,
            attempts = record.attempts,
            error = record.last_error.as_deref().unwrap_or("unknown"),
            "Tracked task failure"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct TrackedEvent<'a> {
    event: &'static str,
    task: &'a TaskRecord,
}

/// Appends one JSON object per outcome to a file
#[derive(Debug)]
pub struct JsonlTracker {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlTracker {
    /// Open `path` for appending, creating it and its parent directory if needed
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open event log {}", path.display()))?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, event: &'static str, task: &TaskRecord) -> Result<()> {
        let mut line = serde_json::to_string(&TrackedEvent { event, task })?;
        line.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl TaskTracker for JsonlTracker {
    async fn on_task_complete(&self, record: &TaskRecord) -> Result<()> {
        self.append("completed", record).await
    }

    async fn on_task_failed(&self, record: &TaskRecord) -> Result<()> {
        self.append("failed", record).await
    }
}

/// Forwards every outcome to several trackers in order
#[derive(Default)]
pub struct TrackerSet {
    trackers: Vec<Arc<dyn TaskTracker>>,
}

impl TrackerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, tracker: Arc<dyn TaskTracker>) -> Self {
        self.trackers.push(tracker);
        self
    }

    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }
}

#[async_trait]
impl TaskTracker for TrackerSet {
    async fn on_task_complete(&self, record: &TaskRecord) -> Result<()> {
        for tracker in &self.trackers {
            if let Err(e) = tracker.on_task_complete(record).await {
                warn!(task_id = %record.id, error = %e, "Tracker hook failed");
            }
        }
        Ok(())
    }

    async fn on_task_failed(&self, record: &TaskRecord) -> Result<()> {
        for tracker in &self.trackers {
            if let Err(e) = tracker.on_task_failed(record).await {
                warn!(task_id = %record.id, error = %e, "Tracker hook failed");
            }
        }
        Ok(())
    }
}
