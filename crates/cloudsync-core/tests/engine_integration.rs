//! Integration tests for cloudsync-core
//!
//! These tests wire the full engine with in-memory collaborators:
//! - Task creation and toggling through `TaskService`
//! - Adoption and eviction through `PollLoop`
//! - Scheduled reconciliation runs writing hosts and history

use std::sync::Arc;
use std::time::Duration;

use cloudsync_core::{
    CloudCredential, CloudInstance, CloudSyncTask, InMemoryCloud, InMemoryInventory,
    InMemorySignalQueue, Period, PollLoop, ReconciliationEngine, SignalBus, SwitchOutcome,
    SyncConfig, SyncStatus, TaskLauncher, TaskRegistry, TaskService,
};
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

struct Engine {
    inventory: Arc<InMemoryInventory>,
    cloud: Arc<InMemoryCloud>,
    registry: Arc<TaskRegistry>,
    service: TaskService,
    poller: PollLoop,
}

fn engine(owner: &str, queue: Arc<InMemorySignalQueue>, inventory: Arc<InMemoryInventory>) -> Engine {
    let config = SyncConfig::new()
        .with_owner(owner)
        .with_stop_pop_timeout(Duration::from_millis(100));
    let cloud = Arc::new(InMemoryCloud::new());
    let registry = Arc::new(TaskRegistry::new());
    let runner = Arc::new(ReconciliationEngine::new(inventory.clone(), cloud.clone()));
    let launcher = TaskLauncher::new(registry.clone(), runner, owner);
    let signals = SignalBus::new(queue, config.signal_sets()).with_backoff(Duration::from_millis(20));

    Engine {
        service: TaskService::new(inventory.clone(), launcher.clone(), signals.clone()),
        poller: PollLoop::new(inventory.clone(), launcher, signals, config),
        inventory,
        cloud,
        registry,
    }
}

fn instance(ip: &str, os: &str) -> CloudInstance {
    CloudInstance {
        instance_id: format!("ins-{}", ip),
        os_name: os.to_string(),
        private_ips: vec![ip.to_string()],
        public_ips: vec![],
    }
}

// ============================================================================
// Scheduled reconciliation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_adopted_task_syncs_on_schedule() {
    let e = engine(
        "0",
        Arc::new(InMemorySignalQueue::new()),
        Arc::new(InMemoryInventory::new()),
    );
    e.inventory.insert_host("10.0.0.1", "", "A").await;
    e.cloud
        .set_region("ap-guangzhou", vec![instance("10.0.0.1", "B"), instance("10.0.0.2", "A")])
        .await;

    let task = CloudSyncTask::new("five", Period::EveryFiveMinutes, CloudCredential::new("id", "key"))
        .with_owner("0");
    let task_id = assert_ok!(e.service.add_task(&task).await);

    assert_eq!(assert_ok!(e.poller.adoption_pass().await), 1);
    assert!(e.registry.contains(task_id).await);

    tokio::time::sleep(Duration::from_secs(5 * 60 + 1)).await;

    let history = e.inventory.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].task_id, task_id);
    assert_eq!(history[0].status, SyncStatus::Success);
    assert_eq!((history[0].new_add, history[0].attr_changed), (1, 1));
    assert_eq!(e.inventory.created_hosts().await[0].inner_ip, "10.0.0.2");

    tokio::time::sleep(Duration::from_secs(5 * 60)).await;
    let history = e.inventory.history().await;
    assert_eq!(history.len(), 2);
    assert_eq!((history[1].new_add, history[1].attr_changed), (0, 0));
}

#[tokio::test]
async fn test_duplicate_task_name_is_rejected() {
    let e = engine(
        "0",
        Arc::new(InMemorySignalQueue::new()),
        Arc::new(InMemoryInventory::new()),
    );
    let task = CloudSyncTask::new("dup", Period::Hourly { minute: 10 }, CloudCredential::default());

    assert_ok!(e.service.add_task(&task).await);
    assert_err!(e.service.add_task(&task).await);
}

// ============================================================================
// Cross-instance stop
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_disable_on_one_instance_evicts_on_another() {
    let queue = Arc::new(InMemorySignalQueue::new());
    let inventory = Arc::new(InMemoryInventory::new());
    let runner_side = engine("0", queue.clone(), inventory.clone());
    let front_side = engine("0", queue.clone(), inventory.clone());

    let task_id = inventory
        .insert_task(CloudSyncTask::new(
            "daily",
            Period::Daily { hour: 4, minute: 0 },
            CloudCredential::default(),
        ))
        .await;
    assert_eq!(assert_ok!(runner_side.poller.adoption_pass().await), 1);

    assert_ok!(inventory.set_enabled(task_id, false).await);
    assert_eq!(
        assert_ok!(front_side.service.switch_task(task_id).await),
        SwitchOutcome::StopRequested
    );

    assert_eq!(runner_side.poller.eviction_pass().await, 1);
    assert!(runner_side.registry.is_empty().await);

    assert_eq!(assert_ok!(runner_side.poller.adoption_pass().await), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_for_other_tenant_is_ignored() {
    let queue = Arc::new(InMemorySignalQueue::new());
    let inventory = Arc::new(InMemoryInventory::new());
    let local = engine("0", queue.clone(), inventory.clone());
    let foreign = engine("tenant-b", queue.clone(), inventory.clone());

    let task_id = inventory
        .insert_task(CloudSyncTask::new("t", Period::EveryFiveMinutes, CloudCredential::default()))
        .await;
    local.poller.adoption_pass().await.unwrap();

    inventory.set_enabled(task_id, false).await.unwrap();
    foreign.service.switch_task(task_id).await.unwrap();

    assert_eq!(local.poller.eviction_pass().await, 0);
    assert!(local.registry.contains(task_id).await);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_tears_down_running_tasks() {
    let e = engine(
        "0",
        Arc::new(InMemorySignalQueue::new()),
        Arc::new(InMemoryInventory::new()),
    );
    e.inventory
        .insert_task(CloudSyncTask::new("t", Period::EveryFiveMinutes, CloudCredential::default()))
        .await;

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(e.poller.clone().run(shutdown.clone()));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(e.registry.len().await, 1);

    shutdown.cancel();
    handle.await.unwrap();
    e.registry.shutdown().await;

    assert!(e.registry.is_empty().await);
    tokio::time::sleep(Duration::from_secs(10 * 60)).await;
    assert!(e.inventory.history().await.is_empty());
}
