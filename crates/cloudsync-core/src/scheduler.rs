//! Per-task scheduler
//!
//! One worker per active task:
//! - `Waiting`: timer armed, cancellation preempts the wait
//! - `Running`: a reconciliation run, never interrupted
//! - `Stopped`: terminal
//!
//! Only the first wait uses the fine-grained trigger calculation; later
//! waits use the fixed step for the period type.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::history::SyncHistory;
use crate::registry::{RunningTaskState, TaskRegistry};
use crate::signal::StartAnnouncement;
use crate::task::{CloudSyncTask, TaskId};
use crate::trigger::{next_trigger_minutes, Period};

/// Worker lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Timer armed
    Waiting,
    /// Reconciliation in flight
    Running,
    /// Terminated
    Stopped,
}

/// Executes one reconciliation run of a task
#[async_trait]
pub trait SyncRunner: Send + Sync {
    /// Run once; failures are reported through the returned history
    async fn run(&self, task: &CloudSyncTask) -> SyncHistory;
}

/// Control loop for a single task
pub struct TaskWorker {
    task: CloudSyncTask,
    period: Period,
    first_wait_minutes: i64,
    runner: Arc<dyn SyncRunner>,
    cancel: CancellationToken,
    state: watch::Sender<WorkerState>,
}

impl TaskWorker {
    /// Run until cancelled
    pub async fn run(self) {
        let task_id = self.task.task_id;
        let mut wait_minutes = self.first_wait_minutes;

        loop {
            self.state.send_replace(WorkerState::Waiting);
            debug!(task_id, wait_minutes, "Task waiting for next trigger");

            let wait = Duration::from_secs(wait_minutes.max(0) as u64 * 60);
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            self.state.send_replace(WorkerState::Running);
            let history = self.runner.run(&self.task).await;
            info!(
                task_id,
                status = %history.status,
                new_add = history.new_add,
                attr_changed = history.attr_changed,
                elapsed = %history.time_consume,
                "Cloud sync run finished"
            );

            wait_minutes = self.period.rearm_minutes();
        }

        self.state.send_replace(WorkerState::Stopped);
        info!(task_id, "Cloud sync task stopped");
    }
}

/// Starts and stops task workers in this process
#[derive(Clone)]
pub struct TaskLauncher {
    registry: Arc<TaskRegistry>,
    runner: Arc<dyn SyncRunner>,
    owner_id: String,
}

impl TaskLauncher {
    /// Create a launcher for the local tenant `owner_id`
    pub fn new(
        registry: Arc<TaskRegistry>,
        runner: Arc<dyn SyncRunner>,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            runner,
            owner_id: owner_id.into(),
        }
    }

    /// Registry backing this launcher
    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Local tenant
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Schedule `task` if it is not already scheduled here.
    ///
    /// Returns the announcement to publish when a worker was started and
    /// `None` when the task was already present.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPeriod` when the task's period cannot be parsed
    pub async fn start(
        &self,
        task: &CloudSyncTask,
        now: DateTime<Local>,
    ) -> Result<Option<StartAnnouncement>> {
        if self.registry.contains(task.task_id).await {
            return Ok(None);
        }

        let period = task.schedule()?;
        let first_wait_minutes = next_trigger_minutes(&period, &now);
        let cancel = self.registry.child_token();
        let (state_tx, state_rx) = watch::channel(WorkerState::Waiting);

        let state = RunningTaskState {
            task_id: task.task_id,
            period,
            next_trigger_minutes: first_wait_minutes,
            task: task.clone(),
            cancel: cancel.clone(),
            started_at: now,
            state: state_rx,
        };
        if !self.registry.register(state).await {
            return Ok(None);
        }

        let worker = TaskWorker {
            task: task.clone(),
            period,
            first_wait_minutes,
            runner: self.runner.clone(),
            cancel,
            state: state_tx,
        };
        tokio::spawn(worker.run());

        info!(
            task_id = task.task_id,
            task_name = %task.name,
            period = %period,
            first_wait_minutes,
            "Cloud sync task started"
        );

        Ok(Some(StartAnnouncement {
            task_id: task.task_id,
            admin: task.account_admin.clone(),
            start_time: now,
            owner_id: self.owner_id.clone(),
        }))
    }

    /// Cancel and deregister a task; `false` when it was not running here
    pub async fn stop(&self, task_id: TaskId) -> bool {
        match self.registry.remove(task_id).await {
            Some(state) => {
                state.cancel.cancel();
                info!(task_id, "Stop signal sent to cloud sync task");
                true
            }
            None => {
                warn!(task_id, "Stop requested for a task not running here");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests;
