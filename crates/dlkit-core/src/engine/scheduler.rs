//! Scheduler - runs download tasks with bounded concurrency
//!
//! A single coordinator task admits queued downloads in FIFO order whenever a
//! concurrency permit is free. Each admitted task runs in its own unit of
//! work; a unit whose task pauses parks on the task's resume gate while
//! keeping its permit, and re-executes the task once [`Scheduler::resume_all`]
//! opens the gate. The gate is armed together with the paused status.

use crate::engine::download_task::{DownloadTask, TaskOptions};
use crate::engine::events::{noop_sink, SharedSink};
use crate::engine::platform::PlatformDownloadHandler;
use crate::error::DlkitError;
use dlkit_types::{CoreEvent, DownloadStatus, Settings};
use parking_lot::{Mutex, RwLock};
use reqwest::Client;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum number of tasks running at once
    pub max_concurrency: usize,
    /// Park paused tasks until `resume_all` instead of finishing their unit
    pub supports_pause_resume: bool,
    /// Stop the coordinator once every queued task has finished
    pub exit_when_idle: bool,
    /// Options applied to tasks built with [`Scheduler::create_task`]
    pub task_options: TaskOptions,
    pub user_agent: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 3,
            supports_pause_resume: true,
            exit_when_idle: false,
            task_options: TaskOptions::default(),
            user_agent: format!("dlkit/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl From<&Settings> for SchedulerConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            max_concurrency: settings.max_concurrent_downloads as usize,
            supports_pause_resume: settings.resume_on_pause,
            exit_when_idle: false,
            task_options: TaskOptions::from(settings),
            user_agent: settings.user_agent.clone(),
        }
    }
}

/// Queue and active set, guarded together
#[derive(Default)]
struct Queues {
    pending: VecDeque<Arc<DownloadTask>>,
    active: Vec<Arc<DownloadTask>>,
}

struct Inner {
    config: SchedulerConfig,
    queues: Mutex<Queues>,
    semaphore: Mutex<Arc<Semaphore>>,
    max_concurrency: AtomicUsize,
    completed: AtomicUsize,
    total: AtomicUsize,
    running: AtomicBool,
    submitted: Notify,
    token: CancellationToken,
    client: Client,
    sink: RwLock<SharedSink>,
    platform: RwLock<Option<Arc<dyn PlatformDownloadHandler>>>,
}

impl Inner {
    fn emit(&self, event: CoreEvent) {
        let sink = self.sink.read().clone();
        sink.emit(event);
    }

    fn platform(&self) -> Option<Arc<dyn PlatformDownloadHandler>> {
        self.platform.read().clone()
    }

    fn next_task(&self) -> Option<Arc<DownloadTask>> {
        let mut queues = self.queues.lock();
        let task = queues.pending.pop_front()?;
        queues.active.push(task.clone());
        Some(task)
    }

    fn queue_empty(&self) -> bool {
        self.queues.lock().pending.is_empty()
    }

    /// Cancel everything still queued or running; queued tasks leave the queue uncounted
    fn cancel_tasks(&self) {
        let (pending, active) = {
            let mut queues = self.queues.lock();
            (std::mem::take(&mut queues.pending), queues.active.clone())
        };
        for task in pending.iter().chain(active.iter()) {
            task.cancel();
        }
    }

    /// Park a paused task until resumed; returns false when it should not run again
    async fn park(&self, task: &DownloadTask) -> bool {
        let Some(gate) = task.take_resume_gate() else {
            return false;
        };
        let task_cancelled = task.cancellation_token();
        debug!("Download {} parked until resume", task.id());

        let released = tokio::select! {
            biased;
            _ = self.token.cancelled() => false,
            _ = task_cancelled.cancelled() => false,
            opened = gate => opened.is_ok(),
        };

        released && task.status() == DownloadStatus::Paused
    }
}

/// Bookkeeping for one finished unit; runs even if the unit panics
struct UnitGuard {
    inner: Arc<Inner>,
    task: Arc<DownloadTask>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for UnitGuard {
    fn drop(&mut self) {
        self.inner
            .queues
            .lock()
            .active
            .retain(|task| !Arc::ptr_eq(task, &self.task));

        let completed = self.inner.completed.fetch_add(1, Ordering::SeqCst) + 1;
        let total = self.inner.total.load(Ordering::SeqCst);
        debug!(
            "Download {} finished as {} ({}/{})",
            self.task.id(),
            self.task.status(),
            completed,
            total
        );

        self.inner
            .emit(CoreEvent::TaskCountChanged { completed, total });
        if let Some(platform) = self.inner.platform() {
            platform.update_active_task_count(completed, total);
        }
    }
}

async fn run_unit(inner: Arc<Inner>, task: Arc<DownloadTask>, permit: OwnedSemaphorePermit) {
    let _guard = UnitGuard {
        inner: inner.clone(),
        task: task.clone(),
        _permit: permit,
    };

    loop {
        match task.execute(&inner.token).await {
            Ok(DownloadStatus::Paused) if inner.config.supports_pause_resume => {
                if !inner.park(&task).await {
                    break;
                }
            }
            Ok(_) => break,
            Err(e) => {
                debug!("Download {} not executed: {}", task.id(), e);
                break;
            }
        }
    }
}

async fn coordinate(inner: Arc<Inner>) {
    let mut units = JoinSet::new();
    let mut batch_started = false;
    info!(
        "Scheduler started (max concurrency {})",
        inner.max_concurrency.load(Ordering::SeqCst)
    );

    loop {
        while !inner.token.is_cancelled() {
            let semaphore = inner.semaphore.lock().clone();
            let Ok(permit) = semaphore.try_acquire_owned() else {
                break;
            };
            let Some(task) = inner.next_task() else {
                break;
            };
            debug!("Admitting download {} ({})", task.id(), task.tag());
            batch_started = true;
            units.spawn(run_unit(inner.clone(), task, permit));
        }

        if units.is_empty() && inner.queue_empty() {
            if batch_started {
                batch_started = false;
                info!(
                    "All downloads finished ({}/{})",
                    inner.completed.load(Ordering::SeqCst),
                    inner.total.load(Ordering::SeqCst)
                );
                inner.emit(CoreEvent::AllCompleted);
            }
            if inner.config.exit_when_idle {
                break;
            }
        }

        tokio::select! {
            biased;
            _ = inner.token.cancelled() => break,
            Some(joined) = units.join_next(), if !units.is_empty() => {
                if let Err(e) = joined {
                    warn!("Download unit ended abnormally: {}", e);
                }
            }
            _ = inner.submitted.notified() => {}
        }
    }

    if inner.token.is_cancelled() {
        inner.cancel_tasks();
    }
    while units.join_next().await.is_some() {}

    inner.running.store(false, Ordering::SeqCst);
    info!("Scheduler stopped");
}

/// Bounded-concurrency download scheduler
pub struct Scheduler {
    inner: Arc<Inner>,
    coordinator: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self, DlkitError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.task_options.connect_timeout)
            .build()
            .map_err(|e| DlkitError::Unknown(e.to_string()))?;
        Ok(Self::with_client(config, client))
    }

    /// Build a scheduler around an existing HTTP client
    pub fn with_client(config: SchedulerConfig, client: Client) -> Self {
        let max_concurrency = config.max_concurrency.max(1);
        Self {
            inner: Arc::new(Inner {
                config,
                queues: Mutex::new(Queues::default()),
                semaphore: Mutex::new(Arc::new(Semaphore::new(max_concurrency))),
                max_concurrency: AtomicUsize::new(max_concurrency),
                completed: AtomicUsize::new(0),
                total: AtomicUsize::new(0),
                running: AtomicBool::new(false),
                submitted: Notify::new(),
                token: CancellationToken::new(),
                client,
                sink: RwLock::new(noop_sink()),
                platform: RwLock::new(None),
            }),
            coordinator: Mutex::new(None),
        }
    }

    pub fn with_event_sink(self, sink: SharedSink) -> Self {
        self.set_event_sink(sink);
        self
    }

    /// Sink for scheduler events; tasks from `create_task` share it
    pub fn set_event_sink(&self, sink: SharedSink) {
        *self.inner.sink.write() = sink;
    }

    pub fn set_platform_handler(&self, handler: Arc<dyn PlatformDownloadHandler>) {
        *self.inner.platform.write() = Some(handler);
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Build a task with this scheduler's options, HTTP client and event sink
    pub fn create_task(
        &self,
        url: impl Into<String>,
        save_path: impl Into<PathBuf>,
    ) -> Arc<DownloadTask> {
        Arc::new(self.build_task(url, save_path))
    }

    /// Like [`Self::create_task`], leaving the task open for further builder calls
    pub fn build_task(&self, url: impl Into<String>, save_path: impl Into<PathBuf>) -> DownloadTask {
        DownloadTask::new(url, save_path)
            .with_options(self.inner.config.task_options.clone())
            .with_client(self.inner.client.clone())
            .with_event_sink(self.inner.sink.read().clone())
    }

    /// Queue a task; it starts once a slot is free and the scheduler runs
    pub fn add_task(&self, task: Arc<DownloadTask>) {
        if self.inner.token.is_cancelled() {
            warn!(
                "Scheduler was cancelled, rejecting download {} ({})",
                task.id(),
                task.tag()
            );
            task.cancel();
            return;
        }

        debug!("Queued download {} ({})", task.id(), task.tag());
        self.inner.queues.lock().pending.push_back(task);
        self.inner.total.fetch_add(1, Ordering::SeqCst);
        self.inner.submitted.notify_one();
    }

    pub fn add_tasks(&self, tasks: impl IntoIterator<Item = Arc<DownloadTask>>) {
        for task in tasks {
            self.add_task(task);
        }
    }

    /// Start the coordinator; calling it again while running does nothing
    pub fn start(&self) -> Result<(), DlkitError> {
        if self.inner.token.is_cancelled() {
            return Err(DlkitError::InvalidOperation(
                "scheduler was cancelled and cannot be restarted".to_string(),
            ));
        }
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(platform) = self.inner.platform() {
            platform.update_active_task_count(0, self.inner.total.load(Ordering::SeqCst));
        }

        let handle = tokio::spawn(coordinate(self.inner.clone()));
        *self.coordinator.lock() = Some(handle);
        Ok(())
    }

    /// Start, and cancel everything once `external` is cancelled
    pub fn start_with_token(&self, external: CancellationToken) -> Result<(), DlkitError> {
        let token = self.inner.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = external.cancelled() => token.cancel(),
                _ = token.cancelled() => {}
            }
        });
        self.start()
    }

    /// Wait for the coordinator to exit (idle exit or cancellation)
    pub async fn wait(&self) {
        let handle = self.coordinator.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Scheduler coordinator ended abnormally: {}", e);
            }
        }
    }

    /// Pause every running task; queued tasks are unaffected
    pub fn pause_all(&self) {
        let active = self.active_tasks();
        info!("Pausing {} active download(s)", active.len());
        for task in active {
            task.pause();
        }
    }

    /// Release every paused task held by a unit
    pub fn resume_all(&self) {
        let resumed = self
            .active_tasks()
            .iter()
            .filter(|task| task.release_pause())
            .count();
        if resumed > 0 {
            info!("Resumed {} paused download(s)", resumed);
        }
    }

    /// Stop the scheduler and cancel all running and queued tasks
    pub fn cancel_all(&self) {
        info!("Cancelling all downloads");
        self.inner.token.cancel();
        self.inner.cancel_tasks();
    }

    /// Change the concurrency limit; only while stopped
    pub fn set_max_concurrency(&self, max_concurrency: usize) -> Result<(), DlkitError> {
        if self.is_running() {
            return Err(DlkitError::InvalidOperation(
                "cannot change concurrency while the scheduler is running".to_string(),
            ));
        }
        if max_concurrency == 0 {
            return Err(DlkitError::InvalidOperation(
                "concurrency must be at least 1".to_string(),
            ));
        }
        *self.inner.semaphore.lock() = Arc::new(Semaphore::new(max_concurrency));
        self.inner
            .max_concurrency
            .store(max_concurrency, Ordering::SeqCst);
        Ok(())
    }

    /// Zero the completed and total counters; only while stopped
    pub fn reset_counters(&self) -> Result<(), DlkitError> {
        if self.is_running() {
            return Err(DlkitError::InvalidOperation(
                "cannot reset counters while the scheduler is running".to_string(),
            ));
        }
        self.inner.completed.store(0, Ordering::SeqCst);
        self.inner.total.store(self.pending_count(), Ordering::SeqCst);
        Ok(())
    }

    /// Snapshot of the tasks currently admitted
    pub fn active_tasks(&self) -> Vec<Arc<DownloadTask>> {
        self.inner.queues.lock().active.clone()
    }

    pub fn max_concurrency(&self) -> usize {
        self.inner.max_concurrency.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.queues.lock().pending.len()
    }

    pub fn active_count(&self) -> usize {
        self.inner.queues.lock().active.len()
    }

    /// Admitted tasks currently paused
    pub fn paused_count(&self) -> usize {
        self.inner
            .queues
            .lock()
            .active
            .iter()
            .filter(|task| task.status() == DownloadStatus::Paused)
            .count()
    }

    pub fn completed_count(&self) -> usize {
        self.inner.completed.load(Ordering::SeqCst)
    }

    pub fn total_count(&self) -> usize {
        self.inner.total.load(Ordering::SeqCst)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.inner.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::events::FnSink;
    use std::time::Duration;

    fn quick_config() -> SchedulerConfig {
        SchedulerConfig {
            max_concurrency: 2,
            exit_when_idle: true,
            task_options: TaskOptions {
                max_retries: 0,
                retry_delay: Duration::from_millis(1),
                ..TaskOptions::default()
            },
            ..SchedulerConfig::default()
        }
    }

    #[test]
    fn settings_map_onto_config() {
        let settings = Settings {
            max_concurrent_downloads: 5,
            max_retries: 7,
            resume_on_pause: false,
            ..Settings::default()
        };
        let config = SchedulerConfig::from(&settings);
        assert_eq!(config.max_concurrency, 5);
        assert!(!config.supports_pause_resume);
        assert_eq!(config.task_options.max_retries, 7);
    }

    #[tokio::test]
    async fn concurrency_changes_only_while_stopped() {
        let scheduler = Scheduler::new(SchedulerConfig::default()).unwrap();
        scheduler.set_max_concurrency(4).unwrap();
        assert_eq!(scheduler.max_concurrency(), 4);
        assert!(scheduler.set_max_concurrency(0).is_err());

        scheduler.start().unwrap();
        assert!(scheduler.is_running());
        assert!(matches!(
            scheduler.set_max_concurrency(1),
            Err(DlkitError::InvalidOperation(_))
        ));
        assert!(scheduler.reset_counters().is_err());
        scheduler.cancel_all();
        scheduler.wait().await;
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn cancelled_scheduler_cannot_restart() {
        let scheduler = Scheduler::new(SchedulerConfig::default()).unwrap();
        scheduler.cancel_all();
        assert!(scheduler.start().is_err());

        let task = scheduler.create_task("http://example.com/a", "a");
        scheduler.add_task(task.clone());
        assert_eq!(task.status(), DownloadStatus::Cancelled);
        assert_eq!(scheduler.total_count(), 0);
    }

    #[tokio::test]
    async fn failing_batch_emits_all_completed_once() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink: SharedSink = Arc::new(FnSink({
            let events = events.clone();
            move |event: CoreEvent| events.lock().push(event)
        }));
        let scheduler = Scheduler::new(quick_config()).unwrap().with_event_sink(sink);
        let dir = tempfile::tempdir().unwrap();

        let tasks: Vec<_> = (0..3)
            .map(|i| scheduler.create_task("not a url", dir.path().join(format!("{i}"))))
            .collect();
        scheduler.add_tasks(tasks.clone());
        assert_eq!(scheduler.total_count(), 3);

        scheduler.start().unwrap();
        scheduler.wait().await;

        assert_eq!(scheduler.completed_count(), 3);
        assert_eq!(scheduler.active_count(), 0);
        assert!(tasks.iter().all(|t| t.status() == DownloadStatus::Failed));

        let events = events.lock();
        let all_completed = events
            .iter()
            .filter(|e| matches!(e, CoreEvent::AllCompleted))
            .count();
        assert_eq!(all_completed, 1);
        assert!(matches!(events.last(), Some(CoreEvent::AllCompleted)));
        assert!(matches!(
            events.iter().rev().nth(1),
            Some(CoreEvent::TaskCountChanged {
                completed: 3,
                total: 3
            })
        ));
    }

    #[tokio::test]
    async fn resume_all_without_parked_tasks_is_noop() {
        let scheduler = Scheduler::new(SchedulerConfig::default()).unwrap();
        scheduler.resume_all();
        scheduler.pause_all();
        assert_eq!(scheduler.paused_count(), 0);
        assert_eq!(scheduler.pending_count(), 0);
    }
}
