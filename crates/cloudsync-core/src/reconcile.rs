//! Reconciliation engine
//!
//! One run of a task: fetch inventory hosts, fetch cloud hosts, diff by
//! inner IP, then apply or queue for confirmation. Hosts are written
//! directly only when neither confirm policy is set. The first failing step
//! ends the run as `fail`. Nothing is retried or rolled back.

use async_trait::async_trait;
use chrono::Local;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::cloud::{collect_cloud_hosts, CloudProvider};
use crate::error::Result;
use crate::history::{HistoryRecorder, SyncHistory, SyncStatus};
use crate::host::{
    ChangedHost, CloudHost, ConfirmationFilter, ConfirmationRequest, HostFilter, HostRecord,
};
use crate::inventory::InventoryService;
use crate::scheduler::SyncRunner;
use crate::task::CloudSyncTask;

/// Classification of cloud hosts against the inventory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostDiff {
    /// Cloud hosts whose inner IP is absent from the inventory
    pub new_hosts: Vec<CloudHost>,
    /// Cloud hosts whose tracked attributes drifted
    pub changed: Vec<ChangedHost>,
}

/// Split cloud hosts into new and changed.
///
/// When several inventory records share an inner IP the first one wins.
pub fn diff_hosts(existing: &[HostRecord], cloud: &[CloudHost]) -> HostDiff {
    let mut by_ip: HashMap<&str, &HostRecord> = HashMap::with_capacity(existing.len());
    for record in existing {
        by_ip.entry(record.inner_ip.as_str()).or_insert(record);
    }

    let mut diff = HostDiff::default();
    for host in cloud {
        match by_ip.get(host.inner_ip.as_str()) {
            None => diff.new_hosts.push(host.clone()),
            Some(record) if record.differs_from(host) => diff.changed.push(ChangedHost {
                host_id: record.host_id,
                host: host.clone(),
            }),
            Some(_) => {}
        }
    }
    diff
}

/// Runs reconciliations and records their outcome
pub struct ReconciliationEngine {
    inventory: Arc<dyn InventoryService>,
    cloud: Arc<dyn CloudProvider>,
    recorder: HistoryRecorder,
}

impl ReconciliationEngine {
    /// Create an engine
    pub fn new(inventory: Arc<dyn InventoryService>, cloud: Arc<dyn CloudProvider>) -> Self {
        Self {
            recorder: HistoryRecorder::new(inventory.clone()),
            inventory,
            cloud,
        }
    }

    /// Run one reconciliation and write its history entry.
    ///
    /// The entry is written on both the success and the failure path.
    pub async fn sync_once(&self, task: &CloudSyncTask) -> SyncHistory {
        let started_at = Local::now();
        let mut history = SyncHistory::begin(task, started_at);

        match self.reconcile(task, &mut history).await {
            Ok(()) => history.status = SyncStatus::Success,
            Err(e) => {
                history.status = SyncStatus::Fail;
                error!(task_id = task.task_id, error = %e, "Cloud sync run failed");
            }
        }

        if let Err(e) = self.recorder.record(&mut history, started_at).await {
            error!(task_id = task.task_id, error = %e, "Failed to record sync history");
        }
        history
    }

    async fn reconcile(&self, task: &CloudSyncTask, history: &mut SyncHistory) -> Result<()> {
        let raw = self.inventory.list_hosts(&HostFilter::for_task(task)).await?;
        let existing = raw
            .iter()
            .map(HostRecord::from_attributes)
            .collect::<Result<Vec<_>>>()?;

        let cloud_hosts = collect_cloud_hosts(self.cloud.as_ref(), &task.credential).await?;
        let diff = diff_hosts(&existing, &cloud_hosts);
        debug!(
            task_id = task.task_id,
            existing = existing.len(),
            cloud = cloud_hosts.len(),
            new = diff.new_hosts.len(),
            changed = diff.changed.len(),
            "Host diff computed"
        );

        history.new_add = diff.new_hosts.len();
        history.attr_changed = diff.changed.len();

        if !task.confirm_new && !task.confirm_attr_change {
            return self.apply_directly(task, &diff).await;
        }

        // With either policy set nothing is written directly; a concern
        // without its own policy waits until both are cleared.
        if task.confirm_new {
            history.new_add = self.confirm_new_hosts(task, &diff.new_hosts).await?;
        }
        if task.confirm_attr_change {
            for changed in &diff.changed {
                self.inventory
                    .submit_confirmation(&ConfirmationRequest::changed_host(task, &changed.host))
                    .await?;
            }
            if !diff.changed.is_empty() {
                info!(
                    task_id = task.task_id,
                    count = diff.changed.len(),
                    "Queued attribute changes for confirmation"
                );
            }
        }

        Ok(())
    }

    async fn apply_directly(&self, task: &CloudSyncTask, diff: &HostDiff) -> Result<()> {
        if !diff.new_hosts.is_empty() {
            self.inventory.create_hosts(&diff.new_hosts).await?;
            info!(task_id = task.task_id, count = diff.new_hosts.len(), "Created cloud hosts");
        }
        for changed in &diff.changed {
            self.inventory
                .update_host(changed.host_id, &changed.host)
                .await?;
        }
        if !diff.changed.is_empty() {
            info!(task_id = task.task_id, count = diff.changed.len(), "Updated cloud hosts");
        }
        Ok(())
    }

    /// Queue new hosts not already awaiting confirmation; returns how many
    /// were queued
    async fn confirm_new_hosts(&self, task: &CloudSyncTask, hosts: &[CloudHost]) -> Result<usize> {
        let pending = self
            .inventory
            .list_pending_confirmations(&ConfirmationFilter::default())
            .await?;
        let pending_ips: HashSet<&str> = pending.iter().map(|c| c.inner_ip.as_str()).collect();

        let mut queued = 0;
        for host in hosts
            .iter()
            .filter(|h| !pending_ips.contains(h.inner_ip.as_str()))
        {
            self.inventory
                .submit_confirmation(&ConfirmationRequest::new_host(task, host))
                .await?;
            queued += 1;
        }

        if queued > 0 {
            info!(task_id = task.task_id, count = queued, "Queued new hosts for confirmation");
        }
        Ok(queued)
    }
}

#[async_trait]
impl SyncRunner for ReconciliationEngine {
    async fn run(&self, task: &CloudSyncTask) -> SyncHistory {
        self.sync_once(task).await
    }
}
