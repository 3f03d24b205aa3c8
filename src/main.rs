//! Cloudsync - Cloud Host Inventory Synchronization
//!
//! CLI entry point for the Cloudsync server.

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod server;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    let _ = dotenvy::dotenv();

    let config = server::load_config().context("Failed to load configuration")?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cloudsync=info,cloudsync_core=info,cloudsync_tencent=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    cli::run(cli, config).await
}
