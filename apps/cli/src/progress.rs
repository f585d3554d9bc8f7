//! Progress bar utilities for CLI downloads

use crate::output::format_speed;
use console::style;
use dlkit_core::DownloadTask;
use dlkit_types::CoreEvent;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Progress bars for a batch of downloads, driven by [`CoreEvent`]s
pub struct ProgressView {
    multi: MultiProgress,
    bars: Arc<RwLock<HashMap<Uuid, ProgressBar>>>,
    overall: ProgressBar,
}

impl ProgressView {
    /// `visible = false` draws nothing (machine-readable output modes)
    pub fn new(visible: bool) -> Self {
        let multi = if visible {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        let overall = multi.add(ProgressBar::new(0));
        overall.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:.bold} {pos}/{len} downloads {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        overall.set_prefix("Total");

        Self {
            multi,
            bars: Arc::new(RwLock::new(HashMap::new())),
            overall,
        }
    }

    /// Aggregate bar, updated by the platform handler
    pub fn overall(&self) -> ProgressBar {
        self.overall.clone()
    }

    /// Create a progress bar for a task
    pub async fn add_task(&self, task: &DownloadTask) -> ProgressBar {
        let progress = task.progress();
        let pb = self.multi.add(ProgressBar::new(progress.total_bytes.unwrap_or(0)));

        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {prefix:20!} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓▒░  "),
        );

        pb.set_prefix(task.tag().to_string());
        pb.set_message(format!("{}", style("queued").dim()));
        pb.set_position(progress.bytes_downloaded);

        self.bars.write().await.insert(task.id(), pb.clone());
        pb
    }

    /// Update progress bars from an event
    pub async fn handle_event(&self, event: &CoreEvent) {
        if let CoreEvent::AllCompleted = event {
            self.overall.finish_with_message(format!(
                "{} all downloads finished",
                style("✓").green().bold()
            ));
            return;
        }

        let Some(id) = event.task_id() else {
            return;
        };
        let bars = self.bars.read().await;
        let Some(pb) = bars.get(&id) else {
            return;
        };

        match event {
            CoreEvent::TaskStarted { .. } => {
                pb.set_message(format!("{}", style("downloading").cyan()));
            }

            CoreEvent::TaskProgress { progress, .. } => {
                if let Some(total) = progress.total_bytes {
                    pb.set_length(total);
                }
                pb.set_position(progress.bytes_downloaded);
                pb.set_message(format_speed(progress.speed));
            }

            CoreEvent::TaskCompleted { .. } => {
                pb.finish_with_message(format!("{} done", style("✓").green().bold()));
            }

            CoreEvent::TaskFailed { error, .. } => {
                pb.abandon_with_message(format!(
                    "{} failed: {}",
                    style("✗").red().bold(),
                    error
                ));
            }

            CoreEvent::TaskCancelled { .. } => {
                pb.abandon_with_message(format!("{} cancelled", style("○").dim()));
            }

            CoreEvent::TaskCountChanged { .. } | CoreEvent::AllCompleted => {}
        }
    }

    /// Clear all progress bars
    pub async fn clear(&self) {
        for (_, pb) in self.bars.write().await.drain() {
            pb.finish_and_clear();
        }
        self.overall.finish_and_clear();
    }
}
