//! Process wiring and the serve loop

use super::adapters::HttpInventory;
use super::config::AppConfig;
use anyhow::{Context, Result};
use cloudsync_core::{
    CloudProvider, InventoryService, PollLoop, RedisSignalQueue, ReconciliationEngine, SignalBus,
    TaskLauncher, TaskRegistry, TaskService,
};
use cloudsync_tencent::TencentCvmClient;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Every long-lived component of one instance
pub struct Components {
    pub inventory: Arc<dyn InventoryService>,
    pub engine: Arc<ReconciliationEngine>,
    pub registry: Arc<TaskRegistry>,
    pub service: TaskService,
    pub poller: PollLoop,
}

/// Build the engine against the configured collaborators
pub fn build(config: &AppConfig) -> Result<Components> {
    let sync = config.sync_config();

    let inventory: Arc<dyn InventoryService> = Arc::new(
        HttpInventory::new(
            config.inventory.base_url.clone(),
            config.owner_id.clone(),
            config.inventory.user.clone(),
            Duration::from_secs(config.inventory.timeout_secs),
        )
        .context("Failed to create inventory client")?,
    );
    let cloud: Arc<dyn CloudProvider> = Arc::new(
        TencentCvmClient::new(config.tencent_config())
            .context("Failed to create Tencent Cloud client")?,
    );
    let queue = Arc::new(
        RedisSignalQueue::new(&config.redis.url).context("Failed to create Redis client")?,
    );

    let engine = Arc::new(ReconciliationEngine::new(inventory.clone(), cloud));
    let registry = Arc::new(TaskRegistry::new());
    let launcher = TaskLauncher::new(registry.clone(), engine.clone(), sync.owner_id.clone());
    let signals = SignalBus::new(queue, sync.signal_sets()).with_backoff(sync.stop_pop_backoff);

    Ok(Components {
        service: TaskService::new(inventory.clone(), launcher.clone(), signals.clone()),
        poller: PollLoop::new(inventory.clone(), launcher, signals, sync),
        inventory,
        engine,
        registry,
    })
}

/// Run the poll loop until Ctrl+C or SIGTERM
pub async fn run(config: AppConfig) -> Result<()> {
    info!(
        "Starting Cloudsync v{} (owner {})",
        env!("CARGO_PKG_VERSION"),
        config.owner_id
    );

    let components = build(&config)?;
    let shutdown = CancellationToken::new();

    let poll = tokio::spawn(components.poller.clone().run(shutdown.clone()));

    wait_for_shutdown_signal().await;
    shutdown.cancel();
    components.registry.shutdown().await;
    poll.await.context("Poll loop task panicked")?;

    info!("Cloudsync stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
