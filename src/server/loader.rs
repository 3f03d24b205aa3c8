//! Layered configuration
//!
//! Sources, lowest priority first: the embedded `config/default.toml`,
//! `config/default.*`, `config/{CLOUDSYNC_ENV}.*`, `config/local.*`, then
//! `CLOUDSYNC_*` variables. `CLOUDSYNC_REDIS__URL` sets `redis.url`.

use super::config::AppConfig;
use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};

/// Defaults compiled into the binary
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Variable selecting the deployment profile file
const PROFILE_VAR: &str = "CLOUDSYNC_ENV";
const DEFAULT_PROFILE: &str = "development";

fn file_layers(profile: &str) -> ConfigBuilder<DefaultState> {
    Config::builder()
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{profile}")).required(false))
        .add_source(File::with_name("config/local").required(false))
}

fn env_layer() -> Environment {
    Environment::with_prefix("CLOUDSYNC")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn finish(builder: ConfigBuilder<DefaultState>) -> Result<AppConfig> {
    builder
        .build()
        .context("Failed to build configuration")?
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

/// Load the application configuration
pub fn load_config() -> Result<AppConfig> {
    let profile = std::env::var(PROFILE_VAR).unwrap_or_else(|_| DEFAULT_PROFILE.to_string());
    finish(file_layers(&profile).add_source(env_layer()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn embedded() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
    }

    #[test]
    fn test_embedded_defaults_parse() {
        let config = finish(embedded()).unwrap();

        assert_eq!(config.owner_id, "0");
        assert_eq!(config.redis.key_prefix, "cc:v3:");
        assert_eq!(config.sync.poll_interval_secs, 300);
        assert!(!config.logging.json);

        let sync = config.sync_config();
        assert_eq!(sync.poll_interval.as_secs(), 300);
        assert_eq!(sync.stop_pop_timeout.as_millis(), 1000);
        assert_eq!(config.tencent_config().bootstrap_region, "ap-guangzhou");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let config = finish(embedded().add_source(File::from_str(
            "owner_id = \"tenant-a\"\n[sync]\npoll_interval_secs = 60\nstop_pop_timeout_ms = 10\nstop_pop_backoff_ms = 5\n",
            FileFormat::Toml,
        )))
        .unwrap();

        assert_eq!(config.owner_id, "tenant-a");
        assert_eq!(config.sync_config().owner_id, "tenant-a");
        assert_eq!(config.sync.poll_interval_secs, 60);
        assert_eq!(config.inventory.user, "admin");
    }

    #[test]
    fn test_env_overrides_nested_keys() {
        let vars = HashMap::from([
            ("CLOUDSYNC_REDIS__URL".to_string(), "redis://cache:6379".to_string()),
            ("CLOUDSYNC_SYNC__POLL_INTERVAL_SECS".to_string(), "30".to_string()),
        ]);
        let config = finish(embedded().add_source(env_layer().source(Some(vars)))).unwrap();

        assert_eq!(config.redis.url, "redis://cache:6379");
        assert_eq!(config.sync.poll_interval_secs, 30);
    }
}
