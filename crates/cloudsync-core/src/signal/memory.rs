//! In-process signal queue

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::SignalQueue;
use crate::error::{Error, Result};

/// Signal queue shared only by tasks of this process.
///
/// Sets are multisets: duplicate messages are kept, `try_take` pops the
/// oldest member.
#[derive(Default)]
pub struct InMemorySignalQueue {
    sets: Mutex<HashMap<String, Vec<String>>>,
    unavailable: Mutex<bool>,
}

impl InMemorySignalQueue {
    /// Create empty sets
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a set's members
    pub async fn members(&self, set: &str) -> Vec<String> {
        self.sets
            .lock()
            .await
            .get(set)
            .cloned()
            .unwrap_or_default()
    }

    /// Make every operation fail
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().await = unavailable;
    }

    async fn check(&self) -> Result<()> {
        if *self.unavailable.lock().await {
            return Err(Error::Signal("queue unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SignalQueue for InMemorySignalQueue {
    async fn announce(&self, set: &str, messages: &[String]) -> Result<()> {
        self.check().await?;
        self.sets
            .lock()
            .await
            .entry(set.to_string())
            .or_default()
            .extend(messages.iter().cloned());
        Ok(())
    }

    async fn try_take(&self, set: &str) -> Result<Option<String>> {
        self.check().await?;
        let mut sets = self.sets.lock().await;
        Ok(sets
            .get_mut(set)
            .filter(|members| !members.is_empty())
            .map(|members| members.remove(0)))
    }

    async fn list(&self, set: &str) -> Result<Vec<String>> {
        self.check().await?;
        Ok(self.members(set).await)
    }

    async fn remove(&self, set: &str, messages: &[String]) -> Result<usize> {
        self.check().await?;
        let mut sets = self.sets.lock().await;
        let Some(members) = sets.get_mut(set) else {
            return Ok(0);
        };
        let before = members.len();
        members.retain(|m| !messages.contains(m));
        Ok(before - members.len())
    }
}
