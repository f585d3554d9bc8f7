//! CLI command implementations

use crate::output::{file_name_for, format_bytes, format_eta, format_speed, print_output};
use crate::platform::ConsolePlatform;
use crate::progress::ProgressView;
use crate::{ConfigAction, GetArgs, OutputFormat};
use anyhow::{bail, Result};
use console::style;
use dlkit_core::{get_setting, set_setting, Scheduler, SchedulerConfig, SettingsStore};
use dlkit_types::{DownloadStatus, TaskReport};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Download Commands
// ============================================================================

pub async fn get(store: &SettingsStore, args: GetArgs, format: OutputFormat) -> Result<()> {
    if args.tag.is_some() && args.urls.len() > 1 {
        bail!("--tag can only be used with a single URL");
    }

    let settings = store.load().await?;
    let mut config = SchedulerConfig::from(&settings);
    config.exit_when_idle = true;
    if let Some(concurrency) = args.concurrency {
        config.max_concurrency = concurrency.max(1);
    }
    if let Some(retries) = args.retries {
        config.task_options.max_retries = retries;
    }

    let destination = args.output.unwrap_or(settings.download_dir.clone());
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let scheduler = Scheduler::new(config)?.with_event_sink(Arc::new(event_tx));

    let view = ProgressView::new(format == OutputFormat::Human);
    scheduler.set_platform_handler(Arc::new(ConsolePlatform::new(
        settings.notification.clone(),
        view.overall(),
    )));

    let mut tasks = Vec::with_capacity(args.urls.len());
    for url in &args.urls {
        let mut task = scheduler.build_task(url.as_str(), destination.join(file_name_for(url)?));
        if let Some(tag) = &args.tag {
            task = task.with_tag(tag.as_str());
        }
        let task = Arc::new(task);
        view.add_task(&task).await;
        tasks.push(task);
    }
    scheduler.add_tasks(tasks.iter().cloned());

    let token = CancellationToken::new();
    tokio::spawn({
        let token = token.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                token.cancel();
            }
        }
    });
    scheduler.start_with_token(token)?;

    let finished = scheduler.wait();
    tokio::pin!(finished);
    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => view.handle_event(&event).await,
            _ = &mut finished => break,
        }
    }
    while let Ok(event) = event_rx.try_recv() {
        view.handle_event(&event).await;
    }
    if format != OutputFormat::Human {
        view.clear().await;
    }

    let reports: Vec<TaskReport> = tasks.iter().map(|task| task.report()).collect();
    print_reports(&reports, format)?;

    let failed = reports
        .iter()
        .filter(|r| r.status != DownloadStatus::Completed)
        .count();
    if failed > 0 {
        bail!("{} of {} download(s) did not complete", failed, reports.len());
    }
    Ok(())
}

fn print_reports(reports: &[TaskReport], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(reports)?);
        }
        OutputFormat::Table => {
            use tabled::{Table, Tabled};

            #[derive(Tabled)]
            struct DownloadRow {
                tag: String,
                status: String,
                size: String,
                retries: u32,
                path: String,
            }

            let rows: Vec<DownloadRow> = reports
                .iter()
                .map(|r| DownloadRow {
                    tag: r.tag.clone(),
                    status: match r.error {
                        Some(kind) => format!("{} ({})", r.status, kind),
                        None => r.status.to_string(),
                    },
                    size: format_bytes(r.progress.bytes_downloaded),
                    retries: r.retry_count,
                    path: r.save_path.display().to_string(),
                })
                .collect();

            println!("{}", Table::new(rows));
        }
        OutputFormat::Human => {
            println!();
            for report in reports {
                print_report_summary(report);
            }
        }
    }
    Ok(())
}

fn print_report_summary(report: &TaskReport) {
    let status_icon = match report.status {
        DownloadStatus::Completed => style("✓").green(),
        DownloadStatus::Downloading => style("↓").cyan(),
        DownloadStatus::Paused => style("⏸").yellow(),
        DownloadStatus::Failed => style("✗").red(),
        DownloadStatus::Cancelled => style("○").dim(),
        DownloadStatus::Pending => style("·").dim(),
    };

    println!(
        "{} {} {} [{}]",
        status_icon,
        style(&report.tag).bold(),
        style(format_bytes(report.progress.bytes_downloaded)).dim(),
        style(report.status).dim()
    );
    println!("    URL: {}", report.url);
    println!("    Saved to: {}", report.save_path.display());
    if report.retry_count > 0 {
        println!("    Retries: {}", report.retry_count);
    }
    if let Some(error) = report.error {
        println!("    Error: {}", style(error).red());
    }
    if report.status == DownloadStatus::Paused {
        println!(
            "    Stopped at {} ({}, eta {})",
            format_bytes(report.progress.bytes_downloaded),
            format_speed(report.progress.speed),
            format_eta(report.progress.eta())
        );
    }
}

// ============================================================================
// Config Commands
// ============================================================================

pub async fn config_action(
    store: &SettingsStore,
    action: Option<ConfigAction>,
    format: OutputFormat,
) -> Result<()> {
    match action {
        None | Some(ConfigAction::Show) => {
            let settings = store.load().await?;

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&settings)?);
                }
                _ => {
                    println!("dlkit Configuration ({}):", store.path().display());
                    println!();
                    println!("  Download directory: {}", settings.download_dir.display());
                    println!(
                        "  Max concurrent downloads: {}",
                        settings.max_concurrent_downloads
                    );
                    println!(
                        "  Retries: {} (delay {} ms)",
                        settings.max_retries, settings.retry_delay_ms
                    );
                    println!("  Buffer size: {}", format_bytes(settings.buffer_size as u64));
                    println!(
                        "  Timeouts: connect {} ms, read {} ms",
                        settings.connect_timeout_ms, settings.read_timeout_ms
                    );
                    println!("  User agent: {}", settings.user_agent);
                    println!("  Resume after pause: {}", settings.resume_on_pause);
                    println!(
                        "  Notifications: {} ({:?})",
                        settings.notification.show_notification,
                        settings.notification.display_mode
                    );
                }
            }
        }

        Some(ConfigAction::Get { key }) => {
            let settings = store.load().await?;
            let value = get_setting(&settings, &key)?;
            match (&value, format) {
                (serde_json::Value::String(s), OutputFormat::Human) => println!("{}", s),
                _ => print_output(&value, format)?,
            }
        }

        Some(ConfigAction::Set { key, value }) => {
            let settings = store.load().await?;
            let updated = set_setting(&settings, &key, &value)?;
            store.save(&updated).await?;
            println!("{} Config updated", style("✓").green().bold());
        }

        Some(ConfigAction::Reset { yes }) => {
            use dialoguer::Confirm;

            let confirmed = yes
                || Confirm::new()
                    .with_prompt("Reset all settings to defaults?")
                    .default(false)
                    .interact()?;

            if confirmed {
                store.reset().await?;
                println!("{} Settings reset to defaults", style("✓").green().bold());
            }
        }
    }

    Ok(())
}
