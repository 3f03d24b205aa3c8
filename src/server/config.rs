//! Application configuration types

use cloudsync_core::SyncConfig;
use cloudsync_tencent::TencentConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_owner")]
    pub owner_id: String,
    pub redis: RedisConfig,
    pub inventory: InventoryConfig,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub tencent: TencentSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_owner() -> String {
    "0".to_string()
}

impl AppConfig {
    /// Engine settings for this instance
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig::new()
            .with_owner(self.owner_id.clone())
            .with_poll_interval(Duration::from_secs(self.sync.poll_interval_secs))
            .with_stop_pop_timeout(Duration::from_millis(self.sync.stop_pop_timeout_ms))
            .with_stop_pop_backoff(Duration::from_millis(self.sync.stop_pop_backoff_ms))
            .with_key_prefix(self.redis.key_prefix.clone())
    }

    /// Tencent client settings
    pub fn tencent_config(&self) -> TencentConfig {
        TencentConfig::default()
            .with_endpoint(self.tencent.endpoint.clone())
            .with_bootstrap_region(self.tencent.bootstrap_region.clone())
            .with_timeout(Duration::from_secs(self.tencent.timeout_secs))
    }
}

/// Shared signal store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_key_prefix() -> String {
    cloudsync_core::signal::DEFAULT_KEY_PREFIX.to_string()
}

/// Inventory service endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    pub base_url: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_user() -> String {
    "admin".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Poll loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    pub poll_interval_secs: u64,
    pub stop_pop_timeout_ms: u64,
    pub stop_pop_backoff_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: cloudsync_core::config::DEFAULT_POLL_INTERVAL_SECS,
            stop_pop_timeout_ms: 1000,
            stop_pop_backoff_ms: 200,
        }
    }
}

/// Tencent Cloud API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TencentSettings {
    pub endpoint: String,
    pub bootstrap_region: String,
    pub timeout_secs: u64,
}

impl Default for TencentSettings {
    fn default() -> Self {
        let defaults = TencentConfig::default();
        Self {
            endpoint: defaults.endpoint,
            bootstrap_region: defaults.bootstrap_region,
            timeout_secs: defaults.timeout.as_secs(),
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub json: bool,
}
