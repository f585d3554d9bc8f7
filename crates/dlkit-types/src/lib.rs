//! Shared types for dlkit
//!
//! This crate contains the plain data structures used by the download
//! engine and the CLI: transfer status, progress snapshots, the error
//! taxonomy, events, notification settings and application settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

// ============================================================================
// Download Types
// ============================================================================

/// Status of a download task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Pending,
    Downloading,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl DownloadStatus {
    /// Completed, Failed and Cancelled never transition on their own.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadStatus::Completed | DownloadStatus::Failed | DownloadStatus::Cancelled
        )
    }

    /// Whether `self -> next` is an edge of the task state machine.
    ///
    /// `reset()` is not covered here; it is an explicit reinitialisation.
    pub fn can_transition_to(&self, next: DownloadStatus) -> bool {
        use DownloadStatus::*;
        matches!(
            (self, next),
            (Pending, Downloading)
                | (Downloading, Completed)
                | (Downloading, Failed)
                | (Downloading, Cancelled)
                | (Downloading, Paused)
                | (Paused, Downloading)
                | (Pending, Cancelled)
                | (Paused, Cancelled)
        )
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DownloadStatus::Pending => "pending",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Paused => "paused",
            DownloadStatus::Completed => "completed",
            DownloadStatus::Failed => "failed",
            DownloadStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Point-in-time progress of a single transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgress {
    /// Bytes written to the destination file so far
    pub bytes_downloaded: u64,
    /// Total size of the resource, `None` while unknown
    pub total_bytes: Option<u64>,
    /// Transfer speed in bytes per second
    pub speed: f64,
}

impl DownloadProgress {
    /// Completion ratio in `0.0..=1.0`, `None` when the total is unknown
    pub fn ratio(&self) -> Option<f64> {
        match self.total_bytes {
            Some(total) if total > 0 => Some(self.bytes_downloaded as f64 / total as f64),
            _ => None,
        }
    }

    /// Estimated seconds left at the current speed
    pub fn eta(&self) -> Option<u64> {
        let total = self.total_bytes?;
        if self.speed <= 0.0 {
            return None;
        }
        let remaining = total.saturating_sub(self.bytes_downloaded);
        Some((remaining as f64 / self.speed).ceil() as u64)
    }
}

/// Classification of a terminal download failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unknown,
    Network,
    Server,
    InvalidUrl,
    Storage,
    Cancelled,
    Timeout,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Unknown => "unknown error",
            ErrorKind::Network => "network error",
            ErrorKind::Server => "server error",
            ErrorKind::InvalidUrl => "invalid url",
            ErrorKind::Storage => "storage error",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Timeout => "timed out",
        };
        f.write_str(s)
    }
}

/// Summary of a task, suitable for printing or serializing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub id: Uuid,
    pub tag: String,
    pub url: String,
    pub save_path: PathBuf,
    pub status: DownloadStatus,
    pub progress: DownloadProgress,
    pub retry_count: u32,
    pub error: Option<ErrorKind>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Event Types
// ============================================================================

/// Events emitted by download tasks and the scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    TaskStarted {
        id: Uuid,
        tag: String,
    },
    TaskProgress {
        id: Uuid,
        progress: DownloadProgress,
    },
    TaskCompleted {
        id: Uuid,
    },
    TaskFailed {
        id: Uuid,
        error: ErrorKind,
    },
    TaskCancelled {
        id: Uuid,
    },
    TaskCountChanged {
        completed: usize,
        total: usize,
    },
    AllCompleted,
}

impl CoreEvent {
    /// The task this event belongs to, if any
    pub fn task_id(&self) -> Option<Uuid> {
        match self {
            CoreEvent::TaskStarted { id, .. }
            | CoreEvent::TaskProgress { id, .. }
            | CoreEvent::TaskCompleted { id }
            | CoreEvent::TaskFailed { id, .. }
            | CoreEvent::TaskCancelled { id } => Some(*id),
            CoreEvent::TaskCountChanged { .. } | CoreEvent::AllCompleted => None,
        }
    }
}

// ============================================================================
// Notification Types
// ============================================================================

/// When the platform notification should be visible
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationDisplayMode {
    /// Shown whenever downloads are running, foreground included
    Always,
    /// Shown only while the application is in the background
    #[default]
    BackgroundOnly,
}

/// Notification policy handed to the platform handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub show_notification: bool,
    #[serde(default)]
    pub display_mode: NotificationDisplayMode,
    /// Platform icon resource; `None` uses the platform default
    #[serde(default)]
    pub small_icon_name: Option<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            show_notification: true,
            display_mode: NotificationDisplayMode::BackgroundOnly,
            small_icon_name: None,
        }
    }
}

/// Content of a download notification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    /// Progress in `0.0..=1.0`
    pub progress: f32,
}

impl NotificationContent {
    pub fn new(title: impl Into<String>, body: impl Into<String>, progress: f32) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            progress: progress.clamp(0.0, 1.0),
        }
    }
}

// ============================================================================
// Settings Types
// ============================================================================

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub download_dir: PathBuf,
    pub max_concurrent_downloads: u32,
    /// Retries after the first attempt
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub buffer_size: usize,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Whether paused tasks stay parked in the scheduler until resumed
    #[serde(default = "default_true")]
    pub resume_on_pause: bool,
    #[serde(default)]
    pub notification: NotificationConfig,
}

fn default_user_agent() -> String {
    format!("dlkit/{}", env!("CARGO_PKG_VERSION"))
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            download_dir: dirs::download_dir()
                .map(|p| p.join("dlkit"))
                .unwrap_or_else(|| PathBuf::from(".")),
            max_concurrent_downloads: 3,
            max_retries: 3,
            retry_delay_ms: 1000,
            buffer_size: 8192,
            connect_timeout_ms: 30_000,
            read_timeout_ms: 30_000,
            user_agent: default_user_agent(),
            resume_on_pause: true,
            notification: NotificationConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_is_none_when_total_unknown() {
        let progress = DownloadProgress {
            bytes_downloaded: 10,
            total_bytes: None,
            speed: 0.0,
        };
        assert_eq!(progress.ratio(), None);

        let progress = DownloadProgress {
            bytes_downloaded: 25,
            total_bytes: Some(100),
            speed: 0.0,
        };
        assert_eq!(progress.ratio(), Some(0.25));
    }

    #[test]
    fn eta_uses_remaining_bytes() {
        let progress = DownloadProgress {
            bytes_downloaded: 500,
            total_bytes: Some(1500),
            speed: 250.0,
        };
        assert_eq!(progress.eta(), Some(4));
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        use DownloadStatus::*;
        let all = [Pending, Downloading, Paused, Completed, Failed, Cancelled];
        for from in [Completed, Failed, Cancelled] {
            assert!(from.is_terminal());
            for to in all {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
        assert!(Paused.can_transition_to(Downloading));
        assert!(!Pending.can_transition_to(Completed));
    }

    #[test]
    fn settings_fill_missing_fields_with_defaults() {
        let json = r#"{
            "download_dir": "/tmp/dl",
            "max_concurrent_downloads": 2,
            "max_retries": 1,
            "retry_delay_ms": 10,
            "buffer_size": 4096,
            "connect_timeout_ms": 1000,
            "read_timeout_ms": 1000
        }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert!(settings.resume_on_pause);
        assert_eq!(settings.notification, NotificationConfig::default());
        assert!(settings.user_agent.starts_with("dlkit/"));
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = CoreEvent::TaskFailed {
            id: Uuid::nil(),
            error: ErrorKind::InvalidUrl,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "TaskFailed");
        assert_eq!(value["payload"]["error"], "invalid_url");
    }
}
