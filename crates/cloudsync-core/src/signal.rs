//! Cross-instance start/stop signaling
//!
//! Two shared sets coordinate instances:
//! - `started`: announcements of tasks an instance began scheduling
//! - `pending_stop`: requests to stop a task wherever it runs
//!
//! The sets are unordered multisets with "pop any" semantics; no ordering
//! or exactly-once delivery is assumed. Once a stop request is consumed,
//! the started entries for the same task and tenant are removed.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::Result;
use crate::task::TaskId;

mod memory;
mod redis_queue;

pub use memory::InMemorySignalQueue;
pub use redis_queue::RedisSignalQueue;

/// Default key prefix for the shared sets
pub const DEFAULT_KEY_PREFIX: &str = "cc:v3:";

/// Storage backend for the shared sets
#[async_trait]
pub trait SignalQueue: Send + Sync {
    /// Add messages to a set
    async fn announce(&self, set: &str, messages: &[String]) -> Result<()>;

    /// Remove and return any one member, `None` when the set is empty
    async fn try_take(&self, set: &str) -> Result<Option<String>>;

    /// All members of a set
    async fn list(&self, set: &str) -> Result<Vec<String>>;

    /// Remove the given members from a set, returning how many were removed
    async fn remove(&self, set: &str, messages: &[String]) -> Result<usize>;
}

/// Announcement that an instance began scheduling a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartAnnouncement {
    /// Task id
    pub task_id: TaskId,
    /// Account administrator of the task
    pub admin: String,
    /// When scheduling started
    pub start_time: DateTime<Local>,
    /// Tenant whose instance runs the task
    pub owner_id: String,
}

/// Request to stop a task on whichever instance runs it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopRequest {
    /// Task id
    pub task_id: TaskId,
    /// Tenant that owns the task
    pub owner_id: String,
}

impl StopRequest {
    /// Decode a raw queue entry
    pub fn decode(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Names of the two shared sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalSets {
    /// Start announcements
    pub started: String,
    /// Pending stop requests
    pub pending_stop: String,
}

impl SignalSets {
    /// Set names under a key prefix
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            started: format!("{}cloud_sync:instance_started", prefix),
            pending_stop: format!("{}cloud_sync:instance_pending_stop", prefix),
        }
    }
}

impl Default for SignalSets {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_KEY_PREFIX)
    }
}

/// Typed access to the shared sets
#[derive(Clone)]
pub struct SignalBus {
    queue: Arc<dyn SignalQueue>,
    sets: SignalSets,
    backoff: Duration,
}

impl SignalBus {
    /// Wrap a queue backend
    pub fn new(queue: Arc<dyn SignalQueue>, sets: SignalSets) -> Self {
        Self {
            queue,
            sets,
            backoff: Duration::from_millis(200),
        }
    }

    /// Set the poll backoff used by timed pops
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set names in use
    pub fn sets(&self) -> &SignalSets {
        &self.sets
    }

    /// Announce started tasks
    pub async fn announce_started(&self, announcements: &[StartAnnouncement]) -> Result<()> {
        if announcements.is_empty() {
            return Ok(());
        }
        let messages = announcements
            .iter()
            .map(serde_json::to_string)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.queue.announce(&self.sets.started, &messages).await
    }

    /// Queue a stop request
    pub async fn request_stop(&self, request: &StopRequest) -> Result<()> {
        let message = serde_json::to_string(request)?;
        self.queue
            .announce(&self.sets.pending_stop, &[message])
            .await
    }

    /// Pop one raw stop entry, waiting up to `timeout` for one to appear
    pub async fn take_stop(&self, timeout: Duration) -> Result<Option<String>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(raw) = self.queue.try_take(&self.sets.pending_stop).await? {
                return Ok(Some(raw));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.backoff.min(deadline - now)).await;
        }
    }

    /// Drop started announcements for the task a stop request names.
    ///
    /// Entries are matched on `task_id` and `owner_id`; entries that fail to
    /// decode are left in place. Returns how many were removed.
    pub async fn compact_started(&self, request: &StopRequest) -> Result<usize> {
        let stale: Vec<String> = self
            .queue
            .list(&self.sets.started)
            .await?
            .into_iter()
            .filter(|raw| {
                serde_json::from_str::<StartAnnouncement>(raw).is_ok_and(|a| {
                    a.task_id == request.task_id && a.owner_id == request.owner_id
                })
            })
            .collect();
        if stale.is_empty() {
            return Ok(0);
        }
        self.queue.remove(&self.sets.started, &stale).await
    }
}
