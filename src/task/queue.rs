use crate::task::types::*;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Bounded FIFO of pending tasks plus the in-flight and cooling sets.
///
/// Ownership of a [`Task`] moves between the three collections, so a task id
/// can never be pending, in flight and cooling at the same time.
#[derive(Debug)]
pub struct TaskQueue {
    pending: VecDeque<Task>,
    in_flight: HashMap<TaskId, Task>,
    cooling: HashMap<TaskId, Task>,
    max_size: usize,
}

impl TaskQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            in_flight: HashMap::new(),
            cooling: HashMap::new(),
            max_size,
        }
    }

    /// Whether a new task would be admitted
    pub fn has_capacity(&self) -> bool {
        self.pending.len() < self.max_size
    }

    /// Append a new task to the tail, handing it back when the queue is full
    pub fn push(&mut self, task: Task) -> Result<TaskId, Task> {
        if !self.has_capacity() {
            return Err(task);
        }
        let id = task.id;
        self.pending.push_back(task);
        Ok(id)
    }

    /// Pop the head of the pending queue, mark it running and move it in flight
    pub fn start_next(&mut self) -> Option<&Task> {
        let mut task = self.pending.pop_front()?;
        task.mark_running();
        let id = task.id;
        self.in_flight.insert(id, task);
        self.in_flight.get(&id)
    }

    /// Remove a settled task from the in-flight set
    pub fn finish(&mut self, id: TaskId) -> Option<Task> {
        self.in_flight.remove(&id)
    }

    /// Park a failed task until its backoff delay elapses
    pub fn cool(&mut self, task: Task) {
        debug!(task_id = %task.id, attempts = task.attempts, "Task cooling down");
        self.cooling.insert(task.id, task);
    }

    /// Move a cooled task back to the tail of the pending queue.
    ///
    /// Retries bypass the capacity check: they were admitted already.
    pub fn release(&mut self, id: TaskId) -> Option<&Task> {
        let mut task = self.cooling.remove(&id)?;
        task.requeue();
        self.pending.push_back(task);
        self.pending.back()
    }

    /// Take every task that is not in flight, pending first
    pub fn drain_waiting(&mut self) -> Vec<Task> {
        let mut drained: Vec<Task> = self.pending.drain(..).collect();
        drained.extend(self.cooling.drain().map(|(_, task)| task));
        drained
    }

    /// Forget every in-flight task, for when their outcomes will never arrive
    pub fn drain_in_flight(&mut self) -> Vec<Task> {
        self.in_flight.drain().map(|(_, task)| task).collect()
    }

    pub fn in_flight(&self, id: &TaskId) -> Option<&Task> {
        self.in_flight.get(id)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn cooling_len(&self) -> usize {
        self.cooling.len()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Nothing pending, running or waiting to be retried
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty() && self.cooling.is_empty()
    }

    /// Ids of pending tasks in dispatch order
    pub fn pending_ids(&self) -> Vec<TaskId> {
        self.pending.iter().map(|t| t.id).collect()
    }
}
