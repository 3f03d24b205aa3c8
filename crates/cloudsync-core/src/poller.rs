//! Global poll loop
//!
//! Every poll interval two independent passes are spawned and not awaited:
//! adoption starts enabled tasks missing from the registry, eviction drains
//! the pending-stop set. Overlapping passes are possible when a pass takes
//! longer than the interval.

use chrono::Local;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::error::Result;
use crate::inventory::InventoryService;
use crate::scheduler::TaskLauncher;
use crate::signal::{SignalBus, StopRequest};
use crate::task::TaskFilter;

/// Fixed-interval driver of adoption and eviction
#[derive(Clone)]
pub struct PollLoop {
    inventory: Arc<dyn InventoryService>,
    launcher: TaskLauncher,
    signals: SignalBus,
    config: SyncConfig,
}

impl PollLoop {
    /// Create a poll loop
    pub fn new(
        inventory: Arc<dyn InventoryService>,
        launcher: TaskLauncher,
        signals: SignalBus,
        config: SyncConfig,
    ) -> Self {
        Self {
            inventory,
            launcher,
            signals,
            config,
        }
    }

    /// Spawn both passes every poll interval until `shutdown` fires
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            owner = %self.config.owner_id,
            interval_secs = self.config.poll_interval.as_secs(),
            "Cloud sync poll loop starting"
        );

        loop {
            self.spawn_passes();

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = shutdown.cancelled() => {
                    info!("Cloud sync poll loop shutting down");
                    break;
                }
            }
        }
    }

    fn spawn_passes(&self) {
        let adopt = self.clone();
        tokio::spawn(async move {
            if let Err(e) = adopt.adoption_pass().await {
                error!(error = %e, "Task adoption pass failed");
            }
        });

        let evict = self.clone();
        tokio::spawn(async move {
            evict.eviction_pass().await;
        });
    }

    /// Start every enabled task not yet scheduled here and announce the
    /// started ones in one batch.
    ///
    /// Returns the number of tasks started.
    pub async fn adoption_pass(&self) -> Result<usize> {
        let tasks = self.inventory.list_tasks(&TaskFilter::enabled()).await?;
        let now = Local::now();
        let mut announcements = Vec::new();

        for task in tasks.iter().filter(|t| t.enabled) {
            match self.launcher.start(task, now).await {
                Ok(Some(announcement)) => announcements.push(announcement),
                Ok(None) => {}
                Err(e) => {
                    warn!(task_id = task.task_id, error = %e, "Skipping task with invalid schedule");
                }
            }
        }

        if let Err(e) = self.signals.announce_started(&announcements).await {
            error!(error = %e, "Failed to announce started tasks");
        }

        debug!(listed = tasks.len(), started = announcements.len(), "Adoption pass done");
        Ok(announcements.len())
    }

    /// Drain the pending-stop set, stopping matching local tasks.
    ///
    /// Ends when a timed pop comes back empty or the queue transport
    /// fails. Returns the number of tasks stopped.
    pub async fn eviction_pass(&self) -> usize {
        let mut stopped = 0;

        loop {
            let raw = match self.signals.take_stop(self.config.stop_pop_timeout).await {
                Ok(Some(raw)) => raw,
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "Failed to pop stop request");
                    break;
                }
            };

            let request = match StopRequest::decode(&raw) {
                Ok(request) => request,
                Err(e) => {
                    warn!(error = %e, entry = %raw, "Skipping malformed stop request");
                    continue;
                }
            };

            if request.owner_id == self.config.owner_id {
                if self.launcher.stop(request.task_id).await {
                    stopped += 1;
                }
            } else {
                debug!(
                    task_id = request.task_id,
                    owner = %request.owner_id,
                    "Ignoring stop request for another tenant"
                );
            }

            if let Err(e) = self.signals.compact_started(&request).await {
                error!(task_id = request.task_id, error = %e, "Failed to compact started set");
            }
        }

        debug!(stopped, "Eviction pass done");
        stopped
    }
}
