use super::*;
use crate::history::SyncStatus;
use crate::task::CloudCredential;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts runs; each run takes `duration` of (virtual) time
struct CountingRunner {
    started: AtomicUsize,
    finished: AtomicUsize,
    duration: Duration,
}

impl CountingRunner {
    fn new(duration: Duration) -> Arc<Self> {
        Arc::new(Self {
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
            duration,
        })
    }
}

#[async_trait]
impl SyncRunner for CountingRunner {
    async fn run(&self, task: &CloudSyncTask) -> SyncHistory {
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.duration).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        let mut history = SyncHistory::begin(task, Local::now());
        history.status = SyncStatus::Success;
        history
    }
}

fn task(task_id: TaskId, period: Period) -> CloudSyncTask {
    let mut task = CloudSyncTask::new("t", period, CloudCredential::default()).with_admin("alice");
    task.task_id = task_id;
    task
}

fn launcher(runner: Arc<CountingRunner>) -> TaskLauncher {
    TaskLauncher::new(Arc::new(TaskRegistry::new()), runner, "0")
}

async fn wait_stopped(state: &RunningTaskState) {
    let mut rx = state.state.clone();
    rx.wait_for(|s| *s == WorkerState::Stopped).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_worker_fires_then_rearms() {
    let runner = CountingRunner::new(Duration::ZERO);
    let launcher = launcher(runner.clone());

    launcher
        .start(&task(1, Period::EveryFiveMinutes), Local::now())
        .await
        .unwrap()
        .unwrap();

    tokio::time::sleep(Duration::from_secs(4 * 60)).await;
    assert_eq!(runner.finished.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_secs(2 * 60)).await;
    assert_eq!(runner.finished.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(5 * 60)).await;
    assert_eq!(runner.finished.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_start_returns_announcement_once() {
    let runner = CountingRunner::new(Duration::ZERO);
    let launcher = launcher(runner);
    let now = Local::now();

    let announcement = launcher
        .start(&task(7, Period::Hourly { minute: 15 }), now)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(announcement.task_id, 7);
    assert_eq!(announcement.admin, "alice");
    assert_eq!(announcement.owner_id, "0");
    assert_eq!(announcement.start_time, now);

    let again = launcher
        .start(&task(7, Period::Hourly { minute: 15 }), now)
        .await
        .unwrap();
    assert!(again.is_none());
    assert_eq!(launcher.registry().len().await, 1);

    let state = launcher.registry().lookup(7).await.unwrap();
    assert_eq!(state.period, Period::Hourly { minute: 15 });
    assert!(state.next_trigger_minutes >= 0 && state.next_trigger_minutes < 60);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_period_is_not_registered() {
    let launcher = launcher(CountingRunner::new(Duration::ZERO));
    let mut bad = task(3, Period::EveryFiveMinutes);
    bad.period_type = "week".to_string();

    let err = launcher.start(&bad, Local::now()).await.unwrap_err();
    assert!(matches!(err, crate::Error::InvalidPeriod { .. }));
    assert!(!launcher.registry().contains(3).await);
}

#[tokio::test(start_paused = true)]
async fn test_stop_preempts_wait() {
    let runner = CountingRunner::new(Duration::ZERO);
    let launcher = launcher(runner.clone());
    launcher
        .start(&task(2, Period::Daily { hour: 3, minute: 0 }), Local::now())
        .await
        .unwrap();
    let state = launcher.registry().lookup(2).await.unwrap();

    assert!(launcher.stop(2).await);
    wait_stopped(&state).await;

    assert_eq!(runner.started.load(Ordering::SeqCst), 0);
    assert!(!launcher.registry().contains(2).await);
    assert!(!launcher.stop(2).await);
}

#[tokio::test(start_paused = true)]
async fn test_stop_lets_in_flight_run_finish() {
    let runner = CountingRunner::new(Duration::from_secs(60));
    let launcher = launcher(runner.clone());
    launcher
        .start(&task(4, Period::EveryFiveMinutes), Local::now())
        .await
        .unwrap();
    let state = launcher.registry().lookup(4).await.unwrap();

    let mut rx = state.state.clone();
    rx.wait_for(|s| *s == WorkerState::Running).await.unwrap();
    assert!(launcher.stop(4).await);

    wait_stopped(&state).await;
    assert_eq!(runner.started.load(Ordering::SeqCst), 1);
    assert_eq!(runner.finished.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_registry_shutdown_stops_workers() {
    let runner = CountingRunner::new(Duration::ZERO);
    let launcher = launcher(runner.clone());
    launcher
        .start(&task(5, Period::EveryFiveMinutes), Local::now())
        .await
        .unwrap();
    launcher
        .start(&task(6, Period::Hourly { minute: 0 }), Local::now())
        .await
        .unwrap();
    let five = launcher.registry().lookup(5).await.unwrap();
    let six = launcher.registry().lookup(6).await.unwrap();

    launcher.registry().shutdown().await;

    wait_stopped(&five).await;
    wait_stopped(&six).await;
    assert_eq!(runner.started.load(Ordering::SeqCst), 0);

    let refused = launcher
        .start(&task(8, Period::EveryFiveMinutes), Local::now())
        .await
        .unwrap();
    assert!(refused.is_none());
}
