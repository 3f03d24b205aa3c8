//! Task registry
//!
//! The registry is the only place that knows whether a task is scheduled in
//! this process. All access goes through one coarse lock.

use chrono::{DateTime, Local};
use std::collections::HashMap;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::scheduler::WorkerState;
use crate::task::{CloudSyncTask, TaskId};
use crate::trigger::Period;

/// State of a task scheduled in this process
#[derive(Debug, Clone)]
pub struct RunningTaskState {
    /// Task id
    pub task_id: TaskId,
    /// Parsed schedule
    pub period: Period,
    /// Minutes until the first firing, computed at start
    pub next_trigger_minutes: i64,
    /// Task parameters at start time
    pub task: CloudSyncTask,
    /// Stops the worker at its next wait point
    pub cancel: CancellationToken,
    /// When scheduling started
    pub started_at: DateTime<Local>,
    /// Live worker state
    pub state: watch::Receiver<WorkerState>,
}

impl RunningTaskState {
    /// Current worker state
    pub fn worker_state(&self) -> WorkerState {
        *self.state.borrow()
    }
}

/// Process-wide map of running tasks
pub struct TaskRegistry {
    tasks: Mutex<HashMap<TaskId, RunningTaskState>>,
    root: CancellationToken,
}

impl TaskRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            root: CancellationToken::new(),
        }
    }

    /// Token for a new worker; cancelled on shutdown
    pub fn child_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    /// Insert `state` iff its task is absent.
    ///
    /// Returns `false` when the task is already registered or the registry
    /// has been shut down.
    pub async fn register(&self, state: RunningTaskState) -> bool {
        let mut tasks = self.tasks.lock().await;
        if self.root.is_cancelled() || tasks.contains_key(&state.task_id) {
            return false;
        }
        debug!(task_id = state.task_id, "Task registered");
        tasks.insert(state.task_id, state);
        true
    }

    /// Current state of a task
    pub async fn lookup(&self, task_id: TaskId) -> Option<RunningTaskState> {
        self.tasks.lock().await.get(&task_id).cloned()
    }

    /// Remove a task and return its state
    pub async fn remove(&self, task_id: TaskId) -> Option<RunningTaskState> {
        self.tasks.lock().await.remove(&task_id)
    }

    /// Whether a task is registered
    pub async fn contains(&self, task_id: TaskId) -> bool {
        self.tasks.lock().await.contains_key(&task_id)
    }

    /// Number of registered tasks
    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Whether nothing is registered
    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }

    /// Registered task ids, sorted
    pub async fn task_ids(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self.tasks.lock().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Whether `shutdown` has been called
    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Cancel every worker and clear the registry
    pub async fn shutdown(&self) {
        let mut tasks = self.tasks.lock().await;
        self.root.cancel();
        let count = tasks.len();
        tasks.clear();
        info!(tasks = count, "Task registry shut down");
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}
