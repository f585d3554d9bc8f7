//! Download task - one resumable HTTP transfer
//!
//! A task downloads a single URL into a single file. It negotiates byte-range
//! resumption with the server, streams the body through a fixed-size buffer,
//! samples transfer speed, retries failed attempts and reacts to pause and
//! cancel requests at every network wait.
//!
//! Tasks are shared as `Arc<DownloadTask>`: the scheduler drives
//! [`DownloadTask::execute`] while the caller keeps its own handle for
//! [`DownloadTask::pause`] and [`DownloadTask::cancel`].

use crate::engine::events::{noop_sink, SharedSink};
use crate::error::DlkitError;
use chrono::{DateTime, Utc};
use dlkit_types::{CoreEvent, DownloadProgress, DownloadStatus, ErrorKind, Settings, TaskReport};
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use reqwest::header::{HeaderMap, ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

/// Minimum time between two speed recomputations
pub const SPEED_SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

const MIN_BUFFER_SIZE: usize = 1024;
const MIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Per-task transfer configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOptions {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay between a failed attempt and the next one
    pub retry_delay: Duration,
    /// Size of the copy buffer; progress is reported once per buffer
    pub buffer_size: usize,
    /// Time allowed to connect and receive response headers
    pub connect_timeout: Duration,
    /// Time allowed for a single body read
    pub read_timeout: Duration,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
            buffer_size: 8192,
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(30),
        }
    }
}

impl TaskOptions {
    fn clamped(mut self) -> Self {
        self.buffer_size = self.buffer_size.max(MIN_BUFFER_SIZE);
        self.connect_timeout = self.connect_timeout.max(MIN_TIMEOUT);
        self.read_timeout = self.read_timeout.max(MIN_TIMEOUT);
        self
    }
}

impl From<&Settings> for TaskOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            max_retries: settings.max_retries,
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
            buffer_size: settings.buffer_size,
            connect_timeout: Duration::from_millis(settings.connect_timeout_ms),
            read_timeout: Duration::from_millis(settings.read_timeout_ms),
        }
    }
}

/// Why a running attempt stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Paused,
    Cancelled,
}

#[derive(Debug)]
enum AttemptError {
    Interrupted(Interrupt),
    Failed(DlkitError),
}

impl From<Interrupt> for AttemptError {
    fn from(interrupt: Interrupt) -> Self {
        AttemptError::Interrupted(interrupt)
    }
}

impl From<DlkitError> for AttemptError {
    fn from(error: DlkitError) -> Self {
        AttemptError::Failed(error)
    }
}

impl From<reqwest::Error> for AttemptError {
    fn from(error: reqwest::Error) -> Self {
        AttemptError::Failed(error.into())
    }
}

impl From<std::io::Error> for AttemptError {
    fn from(error: std::io::Error) -> Self {
        AttemptError::Failed(error.into())
    }
}

/// Stop signals observed by one `execute` run
#[derive(Clone)]
struct Signals {
    pause: CancellationToken,
    cancel: CancellationToken,
    external: CancellationToken,
}

impl Signals {
    fn cancel_requested(&self) -> bool {
        self.cancel.is_cancelled() || self.external.is_cancelled()
    }

    /// Cancellation wins over a pending pause
    fn check(&self) -> Option<Interrupt> {
        if self.cancel_requested() {
            Some(Interrupt::Cancelled)
        } else if self.pause.is_cancelled() {
            Some(Interrupt::Paused)
        } else {
            None
        }
    }

    async fn interrupted(&self) -> Interrupt {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Interrupt::Cancelled,
            _ = self.external.cancelled() => Interrupt::Cancelled,
            _ = self.pause.cancelled() => Interrupt::Paused,
        }
    }

    /// Run `fut` unless a stop signal fires first; the future is dropped then
    async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, Interrupt> {
        tokio::select! {
            biased;
            interrupt = self.interrupted() => Err(interrupt),
            output = fut => Ok(output),
        }
    }
}

/// Mutable run state of a task
struct RunState {
    status: DownloadStatus,
    retry_count: u32,
    /// Bytes of the resource already in the destination file
    cursor: u64,
    server_supports_resume: bool,
    pause: CancellationToken,
    cancel: CancellationToken,
    /// Armed together with `Paused`; the receiver waits for the release
    resume_tx: Option<oneshot::Sender<()>>,
    resume_rx: Option<oneshot::Receiver<()>>,
    last_error: Option<ErrorKind>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl RunState {
    fn new() -> Self {
        Self {
            status: DownloadStatus::Pending,
            retry_count: 0,
            cursor: 0,
            server_supports_resume: false,
            pause: CancellationToken::new(),
            cancel: CancellationToken::new(),
            resume_tx: None,
            resume_rx: None,
            last_error: None,
            started_at: None,
            finished_at: None,
        }
    }

    fn enter_terminal(&mut self, status: DownloadStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
        self.disarm_resume();
    }

    fn enter_paused(&mut self) {
        let (tx, rx) = oneshot::channel();
        self.status = DownloadStatus::Paused;
        self.resume_tx = Some(tx);
        self.resume_rx = Some(rx);
    }

    fn disarm_resume(&mut self) {
        self.resume_tx = None;
        self.resume_rx = None;
    }
}

/// Rolling transfer speed, recomputed at most every [`SPEED_SAMPLE_INTERVAL`]
#[derive(Debug)]
struct SpeedMeter {
    window_start: Instant,
    window_bytes: u64,
    current: f64,
}

impl SpeedMeter {
    fn new(now: Instant, previous: f64) -> Self {
        Self {
            window_start: now,
            window_bytes: 0,
            current: previous,
        }
    }

    fn record(&mut self, bytes: u64, now: Instant) -> f64 {
        self.window_bytes += bytes;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= SPEED_SAMPLE_INTERVAL {
            self.current = self.window_bytes as f64 / elapsed.as_secs_f64();
            self.window_bytes = 0;
            self.window_start = now;
        }
        self.current
    }
}

/// A single resumable download
pub struct DownloadTask {
    id: Uuid,
    url: String,
    save_path: PathBuf,
    tag: String,
    options: TaskOptions,
    client: Client,
    state: Mutex<RunState>,
    progress: Mutex<DownloadProgress>,
    sink: RwLock<SharedSink>,
}

impl std::fmt::Debug for DownloadTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadTask")
            .field("id", &self.id)
            .field("tag", &self.tag)
            .field("url", &self.url)
            .field("status", &self.status())
            .finish()
    }
}

impl DownloadTask {
    /// Create a task with default options; the tag is the file name of `save_path`
    pub fn new(url: impl Into<String>, save_path: impl Into<PathBuf>) -> Self {
        let save_path = save_path.into();
        let tag = save_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            save_path,
            tag,
            options: TaskOptions::default(),
            client: Client::new(),
            state: Mutex::new(RunState::new()),
            progress: Mutex::new(DownloadProgress::default()),
            sink: RwLock::new(noop_sink()),
        }
    }

    pub fn with_options(mut self, options: TaskOptions) -> Self {
        self.options = options.clamped();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Share an HTTP client (connection pool) between tasks
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_event_sink(self, sink: SharedSink) -> Self {
        *self.sink.write() = sink;
        self
    }

    /// Replace the event sink; takes effect for the next emitted event
    pub fn set_event_sink(&self, sink: SharedSink) {
        *self.sink.write() = sink;
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn options(&self) -> &TaskOptions {
        &self.options
    }

    pub fn max_retries(&self) -> u32 {
        self.options.max_retries
    }

    pub fn status(&self) -> DownloadStatus {
        self.state.lock().status
    }

    pub fn progress(&self) -> DownloadProgress {
        *self.progress.lock()
    }

    /// Index of the current (or last) attempt; 0 for the first
    pub fn retry_count(&self) -> u32 {
        self.state.lock().retry_count
    }

    /// Bytes already on disk that the next attempt continues from
    pub fn resume_offset(&self) -> u64 {
        self.state.lock().cursor
    }

    pub fn server_supports_resume(&self) -> bool {
        self.state.lock().server_supports_resume
    }

    /// Failure classification, set once the task is `Failed`
    pub fn error(&self) -> Option<ErrorKind> {
        self.state.lock().last_error
    }

    /// Fires when the task is cancelled; replaced by `reset()`
    pub(crate) fn cancellation_token(&self) -> CancellationToken {
        self.state.lock().cancel.clone()
    }

    /// Receiver that resolves once [`Self::release_pause`] is called for the
    /// current pause; `None` unless paused and not already taken
    pub(crate) fn take_resume_gate(&self) -> Option<oneshot::Receiver<()>> {
        let mut state = self.state.lock();
        match state.status {
            DownloadStatus::Paused => state.resume_rx.take(),
            _ => None,
        }
    }

    /// Open the resume gate of a paused task; false if there is nothing to release
    pub(crate) fn release_pause(&self) -> bool {
        let mut state = self.state.lock();
        if state.status != DownloadStatus::Paused {
            return false;
        }
        state
            .resume_tx
            .take()
            .map(|tx| tx.send(()).is_ok())
            .unwrap_or(false)
    }

    pub fn report(&self) -> TaskReport {
        let progress = self.progress();
        let state = self.state.lock();
        TaskReport {
            id: self.id,
            tag: self.tag.clone(),
            url: self.url.clone(),
            save_path: self.save_path.clone(),
            status: state.status,
            progress,
            retry_count: state.retry_count,
            error: state.last_error,
            started_at: state.started_at,
            finished_at: state.finished_at,
        }
    }

    /// Request a pause; only effective while downloading
    pub fn pause(&self) {
        let state = self.state.lock();
        if state.status == DownloadStatus::Downloading && !state.pause.is_cancelled() {
            info!("Pause requested for download {} ({})", self.id, self.tag);
            state.pause.cancel();
        }
    }

    /// Request cancellation
    ///
    /// A running task stops at its next network wait. A task that is not
    /// running (pending or paused) becomes `Cancelled` immediately.
    pub fn cancel(&self) {
        let idle = {
            let mut state = self.state.lock();
            match state.status {
                DownloadStatus::Completed | DownloadStatus::Failed | DownloadStatus::Cancelled => {
                    return
                }
                DownloadStatus::Downloading => {
                    state.cancel.cancel();
                    false
                }
                DownloadStatus::Pending | DownloadStatus::Paused => {
                    state.cancel.cancel();
                    state.enter_terminal(DownloadStatus::Cancelled);
                    true
                }
            }
        };

        if idle {
            info!("Download {} ({}) cancelled", self.id, self.tag);
            self.emit(CoreEvent::TaskCancelled { id: self.id });
        } else {
            info!("Cancel requested for download {} ({})", self.id, self.tag);
        }
    }

    /// Return to `Pending` and forget all progress, for a fresh download from zero
    pub fn reset(&self) -> Result<(), DlkitError> {
        {
            let mut state = self.state.lock();
            if state.status == DownloadStatus::Downloading {
                return Err(DlkitError::InvalidOperation(format!(
                    "cannot reset download {} while it is running",
                    self.tag
                )));
            }
            state.cancel.cancel();
            *state = RunState::new();
        }
        *self.progress.lock() = DownloadProgress::default();
        debug!("Download {} reset", self.id);
        Ok(())
    }

    /// Run the download until it completes, fails, is paused or cancelled
    ///
    /// Allowed from `Pending` and `Paused`; a paused task continues from the
    /// bytes already on disk. `external` cancels the run like [`Self::cancel`].
    pub async fn execute(&self, external: &CancellationToken) -> Result<DownloadStatus, DlkitError> {
        let signals = {
            let mut state = self.state.lock();
            match state.status {
                DownloadStatus::Pending | DownloadStatus::Paused => {}
                other => {
                    return Err(DlkitError::InvalidOperation(format!(
                        "cannot execute download {} in state {}",
                        self.tag, other
                    )))
                }
            }
            state.pause = CancellationToken::new();
            state.disarm_resume();
            state.status = DownloadStatus::Downloading;
            state.started_at.get_or_insert_with(Utc::now);
            Signals {
                pause: state.pause.clone(),
                cancel: state.cancel.clone(),
                external: external.clone(),
            }
        };

        self.validate_resume_state().await;

        info!(
            "Starting download {} ({}): {} from byte {}",
            self.id,
            self.tag,
            self.url,
            self.resume_offset()
        );
        self.emit(CoreEvent::TaskStarted {
            id: self.id,
            tag: self.tag.clone(),
        });

        let max_retries = self.options.max_retries;
        let mut attempt = 0;
        loop {
            self.state.lock().retry_count = attempt;
            if attempt > 0 {
                self.validate_resume_state().await;
            }

            let result = match signals.check() {
                Some(interrupt) => Err(AttemptError::Interrupted(interrupt)),
                None => self.attempt(&signals).await,
            };

            let error = match result {
                Ok(()) if signals.pause.is_cancelled() => {
                    return Ok(self.stop(Interrupt::Paused, &signals))
                }
                Ok(()) => return Ok(self.complete()),
                Err(AttemptError::Interrupted(interrupt)) => {
                    return Ok(self.stop(interrupt, &signals))
                }
                Err(AttemptError::Failed(error)) => match signals.check() {
                    Some(interrupt) => return Ok(self.stop(interrupt, &signals)),
                    None => error,
                },
            };

            if attempt >= max_retries {
                return Ok(self.fail(error, attempt + 1));
            }

            warn!(
                "Download {} ({}) attempt {}/{} failed: {}. Retrying in {:?}",
                self.id,
                self.tag,
                attempt + 1,
                max_retries + 1,
                error,
                self.options.retry_delay
            );
            if let Err(interrupt) = signals
                .guard(tokio::time::sleep(self.options.retry_delay))
                .await
            {
                return Ok(self.stop(interrupt, &signals));
            }
            attempt += 1;
        }
    }

    /// Trust the file on disk over the in-memory cursor
    async fn validate_resume_state(&self) {
        let cursor = self.state.lock().cursor;
        if cursor == 0 {
            return;
        }

        let on_disk = tokio::fs::metadata(&self.save_path)
            .await
            .ok()
            .map(|meta| meta.len());

        let cursor = {
            let mut state = self.state.lock();
            match on_disk {
                Some(len) if len != state.cursor => {
                    debug!(
                        "Download {}: file holds {} bytes, expected {}",
                        self.id, len, state.cursor
                    );
                    state.cursor = len;
                }
                Some(_) => {}
                None => {
                    debug!("Download {}: partial file missing, starting over", self.id);
                    state.cursor = 0;
                    state.server_supports_resume = false;
                }
            }
            state.cursor
        };
        self.progress.lock().bytes_downloaded = cursor;
    }

    /// One HTTP exchange: request, range negotiation and body copy
    async fn attempt(&self, signals: &Signals) -> Result<(), AttemptError> {
        let url = parse_url(&self.url)?;
        let (cursor, supports_resume) = {
            let state = self.state.lock();
            (state.cursor, state.server_supports_resume)
        };
        let ranged = supports_resume && cursor > 0;

        let mut request = self.client.get(url);
        if ranged {
            debug!("Download {}: requesting range bytes={}-", self.id, cursor);
            request = request.header(RANGE, format!("bytes={}-", cursor));
        }

        let connect_timeout = self.options.connect_timeout;
        let response = signals
            .guard(tokio::time::timeout(connect_timeout, request.send()))
            .await?
            .map_err(|_| {
                DlkitError::Timeout(format!("no response within {:?}", connect_timeout))
            })??;

        let status = response.status();
        if status == StatusCode::RANGE_NOT_SATISFIABLE && ranged {
            if content_range_total(response.headers()) == Some(cursor) {
                info!("Download {}: file already complete at {} bytes", self.id, cursor);
                self.progress.lock().total_bytes = Some(cursor);
                return Ok(());
            }
            let mut state = self.state.lock();
            state.cursor = 0;
            state.server_supports_resume = false;
            return Err(DlkitError::ServerError {
                status: status.as_u16(),
                message: "requested range not satisfiable".to_string(),
            }
            .into());
        }
        if !status.is_success() {
            return Err(DlkitError::ServerError {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unexpected status").to_string(),
            }
            .into());
        }

        if cursor == 0 {
            let accepts = accepts_byte_ranges(response.headers());
            self.state.lock().server_supports_resume = accepts;
        }

        let append = ranged && status == StatusCode::PARTIAL_CONTENT;
        let content_length = header_u64(response.headers(), CONTENT_LENGTH.as_str()).filter(|len| *len > 0);
        let base = if append { cursor } else { 0 };
        {
            let mut progress = self.progress.lock();
            if let Some(len) = content_length {
                progress.total_bytes = Some(base + len);
            }
            if !append {
                progress.bytes_downloaded = 0;
                progress.speed = 0.0;
            }
        }
        if !append {
            if cursor > 0 {
                info!(
                    "Download {}: server answered {} to a range request, restarting from zero",
                    self.id, status
                );
            }
            self.state.lock().cursor = 0;
        }

        let mut file = self.open_destination(append).await?;
        let buffer_size = self.options.buffer_size;
        let read_timeout = self.options.read_timeout;
        let mut buffer: Vec<u8> = Vec::with_capacity(buffer_size);
        let mut meter = SpeedMeter::new(Instant::now(), self.progress.lock().speed);
        let mut stream = response.bytes_stream();

        loop {
            let next = signals
                .guard(tokio::time::timeout(read_timeout, stream.next()))
                .await?
                .map_err(|_| DlkitError::Timeout(format!("no data within {:?}", read_timeout)))?;

            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;
            let mut data = &chunk[..];
            while !data.is_empty() {
                let take = (buffer_size - buffer.len()).min(data.len());
                buffer.extend_from_slice(&data[..take]);
                data = &data[take..];
                if buffer.len() == buffer_size {
                    self.write_block(&mut file, &mut buffer, &mut meter).await?;
                }
            }
        }

        if !buffer.is_empty() {
            self.write_block(&mut file, &mut buffer, &mut meter).await?;
        }

        debug!(
            "Download {}: stream finished at {} bytes",
            self.id,
            self.resume_offset()
        );
        Ok(())
    }

    async fn open_destination(&self, append: bool) -> Result<File, DlkitError> {
        if let Some(parent) = self.save_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let file = if append {
            OpenOptions::new().append(true).open(&self.save_path).await?
        } else {
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.save_path)
                .await?
        };
        Ok(file)
    }

    /// Write one buffer, advance the cursor and report progress
    async fn write_block(
        &self,
        file: &mut File,
        buffer: &mut Vec<u8>,
        meter: &mut SpeedMeter,
    ) -> Result<(), DlkitError> {
        file.write_all(buffer).await?;
        file.flush().await?;

        let written = buffer.len() as u64;
        buffer.clear();

        let downloaded = {
            let mut state = self.state.lock();
            state.cursor += written;
            state.cursor
        };
        let speed = meter.record(written, Instant::now());
        let snapshot = {
            let mut progress = self.progress.lock();
            progress.bytes_downloaded = downloaded;
            progress.speed = speed;
            *progress
        };

        self.emit(CoreEvent::TaskProgress {
            id: self.id,
            progress: snapshot,
        });
        Ok(())
    }

    fn complete(&self) -> DownloadStatus {
        self.state.lock().enter_terminal(DownloadStatus::Completed);
        info!("Download {} ({}) completed: {:?}", self.id, self.tag, self.save_path);
        self.emit(CoreEvent::TaskCompleted { id: self.id });
        DownloadStatus::Completed
    }

    /// Leave `Downloading` after a pause or cancel request
    ///
    /// A cancel that arrives after the pause was observed still wins; the
    /// decision is made under the state lock so `cancel()` sees one outcome.
    fn stop(&self, interrupt: Interrupt, signals: &Signals) -> DownloadStatus {
        let status = {
            let mut state = self.state.lock();
            if interrupt == Interrupt::Cancelled || signals.cancel_requested() {
                state.cancel.cancel();
                state.enter_terminal(DownloadStatus::Cancelled);
            } else {
                state.enter_paused();
            }
            state.status
        };

        match status {
            DownloadStatus::Cancelled => {
                info!("Download {} ({}) cancelled", self.id, self.tag);
                self.emit(CoreEvent::TaskCancelled { id: self.id });
            }
            _ => info!(
                "Download {} ({}) paused at byte {}",
                self.id,
                self.tag,
                self.resume_offset()
            ),
        }
        status
    }

    fn fail(&self, error: DlkitError, attempts: u32) -> DownloadStatus {
        let kind = error.kind();
        {
            let mut state = self.state.lock();
            state.last_error = Some(kind);
            state.enter_terminal(DownloadStatus::Failed);
        }
        error!(
            "Download {} ({}) failed after {} attempt(s) [{}]: {:?}",
            self.id, self.tag, attempts, kind, error
        );
        self.emit(CoreEvent::TaskFailed {
            id: self.id,
            error: kind,
        });
        DownloadStatus::Failed
    }

    fn emit(&self, event: CoreEvent) {
        let sink = self.sink.read().clone();
        sink.emit(event);
    }
}

impl Drop for DownloadTask {
    fn drop(&mut self) {
        self.state.get_mut().cancel.cancel();
    }
}

fn parse_url(raw: &str) -> Result<Url, DlkitError> {
    let url = Url::parse(raw)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(DlkitError::InvalidUrl(format!(
            "unsupported scheme `{}` in {}",
            other, raw
        ))),
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn accepts_byte_ranges(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("bytes"))
        .unwrap_or(false)
}

/// Total length from a `Content-Range` header ("bytes 0-99/1234" or "bytes */1234")
fn content_range_total(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit('/').next())
        .filter(|total| *total != "*")
        .and_then(|total| total.trim().parse().ok())
}
