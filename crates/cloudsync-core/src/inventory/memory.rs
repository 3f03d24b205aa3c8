//! In-memory inventory service
//!
//! Keeps everything in process. Used by tests and by `sync-once` dry runs.
//! Individual operations can be made to fail to exercise error paths.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use tokio::sync::Mutex;

use super::InventoryService;
use crate::error::{Error, Result};
use crate::history::{SyncHistory, TaskSummary};
use crate::host::{
    CloudHost, ConfirmationFilter, ConfirmationRequest, HostFilter, HostId, BK_HOST_ID,
    BK_HOST_INNERIP,
};
use crate::task::{CloudSyncTask, TaskFilter, TaskId};

/// Inventory operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InventoryOp {
    /// `check_task_name_unique`
    CheckTaskName,
    /// `create_task`
    CreateTask,
    /// `list_tasks`
    ListTasks,
    /// `update_task_summary`
    UpdateTaskSummary,
    /// `append_history`
    AppendHistory,
    /// `list_hosts`
    ListHosts,
    /// `create_hosts`
    CreateHosts,
    /// `update_host`
    UpdateHost,
    /// `list_pending_confirmations`
    ListConfirmations,
    /// `submit_confirmation`
    SubmitConfirmation,
}

#[derive(Default)]
struct State {
    tasks: Vec<CloudSyncTask>,
    next_task_id: TaskId,
    hosts: Vec<Value>,
    next_host_id: HostId,
    created: Vec<CloudHost>,
    updates: Vec<(HostId, CloudHost)>,
    confirmations: Vec<ConfirmationRequest>,
    summaries: Vec<(TaskId, TaskSummary)>,
    history: Vec<SyncHistory>,
    failing: HashSet<InventoryOp>,
}

/// Inventory service backed by process memory
#[derive(Default)]
pub struct InMemoryInventory {
    state: Mutex<State>,
}

impl InMemoryInventory {
    /// Create an empty inventory
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a task as-is, assigning an id when it has none
    pub async fn insert_task(&self, mut task: CloudSyncTask) -> TaskId {
        let mut state = self.state.lock().await;
        if task.task_id == 0 {
            state.next_task_id += 1;
            task.task_id = state.next_task_id;
        } else {
            state.next_task_id = state.next_task_id.max(task.task_id);
        }
        let id = task.task_id;
        state.tasks.retain(|t| t.task_id != id);
        state.tasks.push(task);
        id
    }

    /// Flip a stored task's enabled flag
    pub async fn set_enabled(&self, task_id: TaskId, enabled: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        let task = state
            .tasks
            .iter_mut()
            .find(|t| t.task_id == task_id)
            .ok_or(Error::TaskNotFound(task_id))?;
        task.enabled = enabled;
        Ok(())
    }

    /// Look up a stored task
    pub async fn task(&self, task_id: TaskId) -> Option<CloudSyncTask> {
        let state = self.state.lock().await;
        state.tasks.iter().find(|t| t.task_id == task_id).cloned()
    }

    /// Store a raw host record
    pub async fn insert_raw_host(&self, record: Value) {
        self.state.lock().await.hosts.push(record);
    }

    /// Store a host record, returning its id
    pub async fn insert_host(&self, inner_ip: &str, outer_ip: &str, os_name: &str) -> HostId {
        let mut state = self.state.lock().await;
        state.next_host_id += 1;
        let id = state.next_host_id;
        state.hosts.push(json!({
            "bk_host_id": id,
            "bk_host_innerip": inner_ip,
            "bk_host_outerip": outer_ip,
            "bk_os_name": os_name,
        }));
        id
    }

    /// Store a pending confirmation
    pub async fn insert_confirmation(&self, request: ConfirmationRequest) {
        self.state.lock().await.confirmations.push(request);
    }

    /// Make an operation fail (or succeed again)
    pub async fn set_failing(&self, op: InventoryOp, failing: bool) {
        let mut state = self.state.lock().await;
        if failing {
            state.failing.insert(op);
        } else {
            state.failing.remove(&op);
        }
    }

    /// Hosts passed to `create_hosts`
    pub async fn created_hosts(&self) -> Vec<CloudHost> {
        self.state.lock().await.created.clone()
    }

    /// Calls made to `update_host`
    pub async fn host_updates(&self) -> Vec<(HostId, CloudHost)> {
        self.state.lock().await.updates.clone()
    }

    /// Current raw host records
    pub async fn hosts(&self) -> Vec<Value> {
        self.state.lock().await.hosts.clone()
    }

    /// Current confirmation queue
    pub async fn confirmations(&self) -> Vec<ConfirmationRequest> {
        self.state.lock().await.confirmations.clone()
    }

    /// Summaries written so far
    pub async fn summaries(&self) -> Vec<(TaskId, TaskSummary)> {
        self.state.lock().await.summaries.clone()
    }

    /// History rows appended so far
    pub async fn history(&self) -> Vec<SyncHistory> {
        self.state.lock().await.history.clone()
    }

    fn check(state: &State, op: InventoryOp) -> Result<()> {
        if state.failing.contains(&op) {
            return Err(Error::Inventory(format!("{:?} unavailable", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryService for InMemoryInventory {
    async fn check_task_name_unique(&self, name: &str) -> Result<bool> {
        let state = self.state.lock().await;
        Self::check(&state, InventoryOp::CheckTaskName)?;
        Ok(!state.tasks.iter().any(|t| t.name == name))
    }

    async fn create_task(&self, task: &CloudSyncTask) -> Result<TaskId> {
        {
            let state = self.state.lock().await;
            Self::check(&state, InventoryOp::CreateTask)?;
        }
        let mut task = task.clone();
        task.task_id = 0;
        Ok(self.insert_task(task).await)
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<CloudSyncTask>> {
        let state = self.state.lock().await;
        Self::check(&state, InventoryOp::ListTasks)?;
        Ok(state
            .tasks
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    async fn update_task_summary(&self, task_id: TaskId, summary: &TaskSummary) -> Result<()> {
        let mut state = self.state.lock().await;
        Self::check(&state, InventoryOp::UpdateTaskSummary)?;
        state.summaries.push((task_id, summary.clone()));
        Ok(())
    }

    async fn append_history(&self, entry: &SyncHistory) -> Result<()> {
        let mut state = self.state.lock().await;
        Self::check(&state, InventoryOp::AppendHistory)?;
        state.history.push(entry.clone());
        Ok(())
    }

    async fn list_hosts(&self, _filter: &HostFilter) -> Result<Vec<Value>> {
        let state = self.state.lock().await;
        Self::check(&state, InventoryOp::ListHosts)?;
        Ok(state.hosts.clone())
    }

    async fn create_hosts(&self, hosts: &[CloudHost]) -> Result<()> {
        let mut state = self.state.lock().await;
        Self::check(&state, InventoryOp::CreateHosts)?;
        for host in hosts {
            state.next_host_id += 1;
            let id = state.next_host_id;
            let mut record = serde_json::to_value(host)?;
            record[BK_HOST_ID] = json!(id);
            record["import_from"] = json!("3");
            record["bk_cloud_id"] = json!(1);
            state.hosts.push(record);
            state.created.push(host.clone());
        }
        Ok(())
    }

    async fn update_host(&self, host_id: HostId, host: &CloudHost) -> Result<()> {
        let mut state = self.state.lock().await;
        Self::check(&state, InventoryOp::UpdateHost)?;
        let attributes = serde_json::to_value(host)?;
        for record in state.hosts.iter_mut() {
            if record.get(BK_HOST_ID).and_then(Value::as_i64) == Some(host_id) {
                if let (Some(target), Some(source)) =
                    (record.as_object_mut(), attributes.as_object())
                {
                    for (key, value) in source {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        state.updates.push((host_id, host.clone()));
        Ok(())
    }

    async fn list_pending_confirmations(
        &self,
        filter: &ConfirmationFilter,
    ) -> Result<Vec<ConfirmationRequest>> {
        let state = self.state.lock().await;
        Self::check(&state, InventoryOp::ListConfirmations)?;
        Ok(state
            .confirmations
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect())
    }

    async fn submit_confirmation(&self, request: &ConfirmationRequest) -> Result<()> {
        let mut state = self.state.lock().await;
        Self::check(&state, InventoryOp::SubmitConfirmation)?;
        state.confirmations.push(request.clone());
        Ok(())
    }
}
