//! Task creation and the enable/disable toggle

use chrono::Local;
use std::sync::Arc;
use tracing::info;

use crate::error::{Error, Result};
use crate::inventory::InventoryService;
use crate::scheduler::TaskLauncher;
use crate::signal::{SignalBus, StopRequest};
use crate::task::{CloudSyncTask, TaskFilter, TaskId};

/// What `switch_task` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// A worker was started and announced in this process
    Started,
    /// The task was already scheduled here
    AlreadyRunning,
    /// A stop request was queued for whichever instance runs the task
    StopRequested,
}

/// Caller-facing task operations
#[derive(Clone)]
pub struct TaskService {
    inventory: Arc<dyn InventoryService>,
    launcher: TaskLauncher,
    signals: SignalBus,
}

impl TaskService {
    /// Create a service
    pub fn new(
        inventory: Arc<dyn InventoryService>,
        launcher: TaskLauncher,
        signals: SignalBus,
    ) -> Self {
        Self {
            inventory,
            launcher,
            signals,
        }
    }

    /// Create a task after validating its name and period.
    ///
    /// # Errors
    ///
    /// `DuplicateTaskName` when the name is taken, `InvalidPeriod` when the
    /// period encoding is malformed; nothing is created in either case.
    pub async fn add_task(&self, task: &CloudSyncTask) -> Result<TaskId> {
        if !self.inventory.check_task_name_unique(&task.name).await? {
            return Err(Error::DuplicateTaskName(task.name.clone()));
        }
        task.schedule()?;

        let task_id = self.inventory.create_task(task).await?;
        info!(task_id, task_name = %task.name, "Cloud sync task created");
        Ok(task_id)
    }

    /// Apply a task's current enabled flag.
    ///
    /// Enabled tasks are started here if absent; disabled tasks get a stop
    /// request on the shared queue.
    pub async fn switch_task(&self, task_id: TaskId) -> Result<SwitchOutcome> {
        let task = self
            .inventory
            .list_tasks(&TaskFilter::by_id(task_id))
            .await?
            .into_iter()
            .next()
            .ok_or(Error::TaskNotFound(task_id))?;

        if !task.enabled {
            let request = StopRequest {
                task_id,
                owner_id: self.launcher.owner_id().to_string(),
            };
            self.signals.request_stop(&request).await?;
            info!(task_id, "Stop requested for cloud sync task");
            return Ok(SwitchOutcome::StopRequested);
        }

        match self.launcher.start(&task, Local::now()).await? {
            Some(announcement) => {
                self.signals.announce_started(&[announcement]).await?;
                Ok(SwitchOutcome::Started)
            }
            None => Ok(SwitchOutcome::AlreadyRunning),
        }
    }
}
