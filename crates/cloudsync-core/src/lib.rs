//! Cloudsync Core - Task Scheduling and Reconciliation Engine
//!
//! This crate keeps an inventory of hosts in step with a cloud provider,
//! including:
//! - Trigger: Minutes until a task's next firing
//! - Registry: Tasks scheduled in this process
//! - Scheduler: One worker per active task
//! - Poller: Periodic adoption of new tasks and eviction of stopped ones
//! - Signal: Cross-instance start/stop sets
//! - Reconcile: Diffing cloud hosts against the inventory
//! - History: Summary and history rows for every run

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cloud;
pub mod config;
pub mod error;
pub mod history;
pub mod host;
pub mod inventory;
pub mod poller;
pub mod reconcile;
pub mod registry;
pub mod scheduler;
pub mod signal;
pub mod task;
pub mod task_service;
pub mod trigger;

pub use cloud::{collect_cloud_hosts, CloudInstance, CloudProvider, InMemoryCloud, Region};
pub use config::SyncConfig;
pub use error::{Error, Result};
pub use history::{format_elapsed, HistoryRecorder, SyncHistory, SyncStatus, TaskSummary};
pub use host::{
    ChangedHost, CloudHost, ConfirmationFilter, ConfirmationRequest, HostFilter, HostId,
    HostRecord, ResourceType,
};
pub use inventory::{InMemoryInventory, InventoryOp, InventoryService};
pub use poller::PollLoop;
pub use reconcile::{diff_hosts, HostDiff, ReconciliationEngine};
pub use registry::{RunningTaskState, TaskRegistry};
pub use scheduler::{SyncRunner, TaskLauncher, WorkerState};
pub use signal::{
    InMemorySignalQueue, RedisSignalQueue, SignalBus, SignalQueue, SignalSets, StartAnnouncement,
    StopRequest,
};
pub use task::{CloudCredential, CloudSyncTask, SecretString, TaskFilter, TaskId};
pub use task_service::{SwitchOutcome, TaskService};
pub use trigger::{next_trigger_minutes, Period};
