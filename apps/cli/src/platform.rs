//! Terminal implementation of the platform download hooks
//!
//! A terminal process has no background service; "notifications" are rendered
//! as the message of the aggregate progress bar.

use dlkit_core::{notification_visible, PlatformDownloadHandler};
use dlkit_types::{NotificationConfig, NotificationContent};
use indicatif::ProgressBar;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

pub struct ConsolePlatform {
    config: Mutex<NotificationConfig>,
    overall: ProgressBar,
    in_background: AtomicBool,
}

impl ConsolePlatform {
    pub fn new(config: NotificationConfig, overall: ProgressBar) -> Self {
        Self {
            config: Mutex::new(config),
            overall,
            in_background: AtomicBool::new(false),
        }
    }
}

impl PlatformDownloadHandler for ConsolePlatform {
    fn supports_background_download(&self) -> bool {
        false
    }

    fn notification_config(&self) -> NotificationConfig {
        self.config.lock().clone()
    }

    fn set_notification_config(&self, config: NotificationConfig) {
        *self.config.lock() = config;
    }

    fn on_enter_background(&self) {
        self.in_background.store(true, Ordering::SeqCst);
    }

    fn on_enter_foreground(&self) {
        self.in_background.store(false, Ordering::SeqCst);
        self.hide_notification();
    }

    fn update_active_task_count(&self, completed: usize, total: usize) {
        debug!("Downloads finished: {}/{}", completed, total);
        self.overall.set_length(total as u64);
        self.overall.set_position(completed as u64);

        let visible = notification_visible(
            &self.config.lock(),
            self.in_background.load(Ordering::SeqCst),
        );
        if visible && total > 0 {
            let content = NotificationContent::new(
                "dlkit",
                format!("{} of {} downloads finished", completed, total),
                completed as f32 / total as f32,
            );
            self.show_notification(&content);
        }
    }

    fn show_notification(&self, content: &NotificationContent) {
        self.overall.set_message(format!(
            "{}: {} ({:.0}%)",
            content.title,
            content.body,
            content.progress * 100.0
        ));
    }

    fn hide_notification(&self) {
        self.overall.set_message("");
    }
}
