//! Engine configuration

use std::time::Duration;

use crate::signal::{SignalSets, DEFAULT_KEY_PREFIX};

/// Default poll interval in seconds
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

/// Settings for the poll loop and signal handling
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Local tenant context; stop requests for other tenants are ignored
    pub owner_id: String,
    /// Interval between adoption/eviction rounds
    pub poll_interval: Duration,
    /// How long one stop pop waits for an entry
    pub stop_pop_timeout: Duration,
    /// Poll backoff inside a stop pop
    pub stop_pop_backoff: Duration,
    /// Prefix of the shared signal set keys
    pub key_prefix: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            owner_id: "0".to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            stop_pop_timeout: Duration::from_secs(1),
            stop_pop_backoff: Duration::from_millis(200),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl SyncConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the local tenant
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = owner_id.into();
        self
    }

    /// Set the poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the stop pop timeout
    pub fn with_stop_pop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_pop_timeout = timeout;
        self
    }

    /// Set the stop pop backoff
    pub fn with_stop_pop_backoff(mut self, backoff: Duration) -> Self {
        self.stop_pop_backoff = backoff;
        self
    }

    /// Set the signal key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Signal set names under the configured prefix
    pub fn signal_sets(&self) -> SignalSets {
        SignalSets::with_prefix(&self.key_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::new();
        assert_eq!(config.poll_interval, Duration::from_secs(300));
        assert_eq!(config.owner_id, "0");
        assert_eq!(
            config.signal_sets().pending_stop,
            "cc:v3:cloud_sync:instance_pending_stop"
        );
    }

    #[test]
    fn test_builder() {
        let config = SyncConfig::new()
            .with_owner("tenant-a")
            .with_poll_interval(Duration::from_secs(10))
            .with_stop_pop_timeout(Duration::from_millis(500))
            .with_key_prefix("x:");

        assert_eq!(config.owner_id, "tenant-a");
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.stop_pop_timeout, Duration::from_millis(500));
        assert_eq!(config.signal_sets().started, "x:cloud_sync:instance_started");
    }
}
