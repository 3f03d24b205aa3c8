//! Sync history recording
//!
//! Every reconciliation run ends with one task-summary update and one
//! appended history row, whether the run succeeded or failed.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::inventory::InventoryService;
use crate::task::{CloudSyncTask, TaskId};

/// Layout of `bk_start_time`
pub const START_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Outcome of a reconciliation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Every step completed
    Success,
    /// A step failed and the rest of the run was skipped
    Fail,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// One history row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncHistory {
    /// Target object type
    #[serde(rename = "bk_obj_id")]
    pub obj_id: String,
    /// Task that ran
    #[serde(rename = "bk_task_id")]
    pub task_id: TaskId,
    /// Newly discovered (or newly queued) hosts
    pub new_add: usize,
    /// Hosts with changed attributes
    pub attr_changed: usize,
    /// Run status
    #[serde(rename = "bk_status")]
    pub status: SyncStatus,
    /// Human readable duration (`42s`, `3min5s`)
    #[serde(rename = "bk_time_consume")]
    pub time_consume: String,
    /// Local start time
    #[serde(rename = "bk_start_time")]
    pub start_time: String,
}

impl SyncHistory {
    /// An empty, failed outcome for a task run starting at `started_at`.
    ///
    /// The engine flips the status once every step has completed.
    pub fn begin(task: &CloudSyncTask, started_at: DateTime<Local>) -> Self {
        Self {
            obj_id: task.obj_id.clone(),
            task_id: task.task_id,
            new_add: 0,
            attr_changed: 0,
            status: SyncStatus::Fail,
            time_consume: String::new(),
            start_time: started_at.format(START_TIME_FORMAT).to_string(),
        }
    }
}

/// Last-sync summary written back onto the task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    /// When the run finished
    #[serde(rename = "bk_last_sync_time")]
    pub last_sync_time: DateTime<Local>,
    /// Run status
    #[serde(rename = "bk_sync_status")]
    pub sync_status: SyncStatus,
    /// Newly discovered hosts
    pub new_add: usize,
    /// Hosts with changed attributes
    pub attr_changed: usize,
}

/// Format an elapsed duration: `{m}min{s}s` from one minute up, `{s}s` below
pub fn format_elapsed(seconds: i64) -> String {
    let seconds = seconds.max(0);
    if seconds >= 60 {
        format!("{}min{}s", seconds / 60, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

/// Writes task summaries and history rows to the inventory service
#[derive(Clone)]
pub struct HistoryRecorder {
    inventory: Arc<dyn InventoryService>,
}

impl HistoryRecorder {
    /// Create a recorder
    pub fn new(inventory: Arc<dyn InventoryService>) -> Self {
        Self { inventory }
    }

    /// Finalize the timing fields of `history` and persist it.
    ///
    /// Status and counts must already be set. Both the summary update and
    /// the history append are attempted; the first error is returned.
    pub async fn record(&self, history: &mut SyncHistory, started_at: DateTime<Local>) -> Result<()> {
        let finished_at = Local::now();
        let elapsed = finished_at.signed_duration_since(started_at).num_seconds();
        history.time_consume = format_elapsed(elapsed);
        history.start_time = started_at.format(START_TIME_FORMAT).to_string();

        debug!(
            task_id = history.task_id,
            status = %history.status,
            elapsed = %history.time_consume,
            "Recording sync history"
        );

        let summary = TaskSummary {
            last_sync_time: finished_at,
            sync_status: history.status,
            new_add: history.new_add,
            attr_changed: history.attr_changed,
        };
        let summary_result = self
            .inventory
            .update_task_summary(history.task_id, &summary)
            .await;
        if let Err(e) = &summary_result {
            warn!(task_id = history.task_id, error = %e, "Failed to update task summary");
        }
        let append_result = self.inventory.append_history(history).await;
        summary_result.and(append_result)
    }
}
