//! Inventory service interface
//!
//! The inventory service persists task definitions, host records, the
//! confirmation queue and sync history. The engine only talks to it through
//! this request/response trait.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::history::{SyncHistory, TaskSummary};
use crate::host::{CloudHost, ConfirmationFilter, ConfirmationRequest, HostFilter, HostId};
use crate::task::{CloudSyncTask, TaskFilter, TaskId};

mod memory;

pub use memory::{InMemoryInventory, InventoryOp};

/// Operations the engine needs from the inventory service
#[async_trait]
pub trait InventoryService: Send + Sync {
    /// `true` when no task uses `name` yet
    async fn check_task_name_unique(&self, name: &str) -> Result<bool>;

    /// Persist a new task and return its id
    async fn create_task(&self, task: &CloudSyncTask) -> Result<TaskId>;

    /// List tasks matching `filter`
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<CloudSyncTask>>;

    /// Write the last-sync summary onto a task
    async fn update_task_summary(&self, task_id: TaskId, summary: &TaskSummary) -> Result<()>;

    /// Append a history row
    async fn append_history(&self, entry: &SyncHistory) -> Result<()>;

    /// Raw host records; coerced by the caller
    async fn list_hosts(&self, filter: &HostFilter) -> Result<Vec<Value>>;

    /// Create hosts discovered in the cloud
    async fn create_hosts(&self, hosts: &[CloudHost]) -> Result<()>;

    /// Overwrite the cloud-tracked attributes of a host
    async fn update_host(&self, host_id: HostId, host: &CloudHost) -> Result<()>;

    /// Confirmation requests awaiting an operator
    async fn list_pending_confirmations(
        &self,
        filter: &ConfirmationFilter,
    ) -> Result<Vec<ConfirmationRequest>>;

    /// Queue a change for operator approval
    async fn submit_confirmation(&self, request: &ConfirmationRequest) -> Result<()>;
}
