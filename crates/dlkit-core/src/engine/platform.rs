//! Platform integration hooks
//!
//! Background execution and notifications are platform specific. The engine
//! only reports task counts; everything else on this trait is driven by the
//! embedding application.

use dlkit_types::{NotificationConfig, NotificationContent, NotificationDisplayMode};

/// Platform-specific download support (background service, notifications)
pub trait PlatformDownloadHandler: Send + Sync {
    /// Whether downloads keep running while the application is backgrounded
    fn supports_background_download(&self) -> bool;

    fn notification_config(&self) -> NotificationConfig;

    fn set_notification_config(&self, config: NotificationConfig);

    /// Called when the application moves to the background
    fn on_enter_background(&self);

    /// Called when the application returns to the foreground
    fn on_enter_foreground(&self);

    /// Called by the scheduler on start and whenever a task finishes
    fn update_active_task_count(&self, completed: usize, total: usize);

    fn show_notification(&self, content: &NotificationContent);

    fn hide_notification(&self);
}

/// Whether a notification may be shown under `config`
pub fn notification_visible(config: &NotificationConfig, in_background: bool) -> bool {
    if !config.show_notification {
        return false;
    }
    match config.display_mode {
        NotificationDisplayMode::Always => true,
        NotificationDisplayMode::BackgroundOnly => in_background,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_only_hides_in_foreground() {
        let config = NotificationConfig::default();
        assert!(!notification_visible(&config, false));
        assert!(notification_visible(&config, true));
    }

    #[test]
    fn disabled_notifications_never_show() {
        let config = NotificationConfig {
            show_notification: false,
            display_mode: NotificationDisplayMode::Always,
            small_icon_name: None,
        };
        assert!(!notification_visible(&config, true));
    }
}
