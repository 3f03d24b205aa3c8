//! CLI module for Cloudsync
//!
//! Provides commands:
//! - `serve`: Run the poll loop until shutdown
//! - `add-task`: Create a task from a JSON file
//! - `switch`: Apply a task's enabled flag
//! - `sync-once`: Run one reconciliation immediately

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cloudsync_core::{CloudSyncTask, TaskFilter, TaskId};
use std::path::PathBuf;

use crate::server::{self, config::AppConfig};

/// Cloud host inventory synchronization
#[derive(Parser, Debug)]
#[command(name = "cloudsync")]
#[command(about = "Keeps the host inventory in step with cloud accounts")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the poll loop until Ctrl+C or SIGTERM
    Serve,
    /// Create a task from a JSON definition
    AddTask {
        /// Task definition file
        file: PathBuf,
    },
    /// Start or stop a task according to its enabled flag
    Switch {
        /// Task id
        task_id: TaskId,
    },
    /// Run one reconciliation now and print the outcome
    SyncOnce {
        /// Task id
        task_id: TaskId,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    match cli.command {
        Some(Commands::Serve) => server::run(config).await,
        Some(Commands::AddTask { file }) => add_task(&config, file).await,
        Some(Commands::Switch { task_id }) => switch(&config, task_id).await,
        Some(Commands::SyncOnce { task_id }) => sync_once(&config, task_id).await,
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

async fn add_task(config: &AppConfig, file: PathBuf) -> Result<()> {
    let raw = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let mut task: CloudSyncTask =
        serde_json::from_str(&raw).context("Failed to parse task definition")?;
    if task.owner_id.is_empty() {
        task.owner_id = config.owner_id.clone();
    }

    let components = server::build(config)?;
    let task_id = components.service.add_task(&task).await?;
    println!("Created task {} ({})", task_id, task.name);
    Ok(())
}

async fn switch(config: &AppConfig, task_id: TaskId) -> Result<()> {
    let components = server::build(config)?;
    let outcome = components.service.switch_task(task_id).await?;
    println!("Task {}: {:?}", task_id, outcome);
    Ok(())
}

async fn sync_once(config: &AppConfig, task_id: TaskId) -> Result<()> {
    let components = server::build(config)?;
    let task = components
        .inventory
        .list_tasks(&TaskFilter::by_id(task_id))
        .await?
        .into_iter()
        .next()
        .ok_or(cloudsync_core::Error::TaskNotFound(task_id))?;

    let history = components.engine.sync_once(&task).await;
    println!("{}", serde_json::to_string_pretty(&history)?);
    Ok(())
}
