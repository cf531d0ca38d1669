// jsontable - paginated, sortable tables over polled JSON endpoints
//
// Each configured table, list or select is bound to a refresh controller
// that fetches its endpoint, skips unchanged payloads, and renders the rest.
//
// Architecture:
// - Refresh worker (dedicated thread): owns the controller, runs every
//   fetch and the shared poll timer
// - Transport (reqwest blocking): one GET per cycle, retried on timeout
// - History (JSON file): pagination state per table between runs
// - TUI (ratatui): one tab per instance; key presses become table actions
// - Headless mode: renders printed to stdout as plain-text tables

mod cli;
mod config;
mod logging;
mod pagination;
mod persistence;
mod table;
mod transport;
mod tui;

use anyhow::{Context, Result};
use config::{Config, LogRotation, LoggingConfig};
use logging::{LogBuffer, TuiLogLayer};
use persistence::FileStore;
use std::sync::Arc;
use std::time::Duration;
use table::{InstanceId, LogSink, RefreshWorker, RenderSink, TableRefreshController};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use transport::HttpTransport;
use tui::sink::SharedViews;

/// Rolling file writer for the configured rotation
fn file_appender(logging: &LoggingConfig) -> tracing_appender::rolling::RollingFileAppender {
    let dir = &logging.file_dir;
    let prefix = &logging.file_prefix;
    match logging.file_rotation {
        LogRotation::Hourly => tracing_appender::rolling::hourly(dir, prefix),
        LogRotation::Daily => tracing_appender::rolling::daily(dir, prefix),
        LogRotation::Never => tracing_appender::rolling::never(dir, prefix),
    }
}

/// Initialize tracing
///
/// In TUI mode logs go to the in-memory buffer (stderr would garble the
/// display); in headless mode to stderr, leaving stdout for renders. File
/// logging adds a JSON layer on top of either. The returned guard must live
/// until exit so file logs flush.
///
/// Precedence: RUST_LOG env var > config file > default "info"
fn init_tracing(config: &Config, log_buffer: &LogBuffer) -> Option<WorkerGuard> {
    let default_filter = format!("jsontable={}", config.logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    let console = if config.enable_tui {
        TuiLogLayer::new(log_buffer.clone()).boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    let mut guard = None;
    let file_layer = if config.logging.file_enabled {
        match std::fs::create_dir_all(&config.logging.file_dir) {
            Ok(()) => {
                let (non_blocking, file_guard) =
                    tracing_appender::non_blocking(file_appender(&config.logging));
                guard = Some(file_guard);
                Some(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking)
                        .with_ansi(false),
                )
            }
            Err(e) => {
                // Fall back to non-file logging
                eprintln!(
                    "Warning: Could not create log directory {:?}: {}",
                    config.logging.file_dir, e
                );
                None
            }
        }
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .init();

    guard
}

/// Spawn the refresh worker with the given render sink
fn spawn_worker<S>(config: &Config, sink: S) -> Result<RefreshWorker>
where
    S: RenderSink + 'static,
{
    let state_dir = config.state_dir.clone();
    let tick = Duration::from_secs(config.tick_secs);

    RefreshWorker::spawn(move || {
        let history = FileStore::in_dir(&state_dir);
        tracing::debug!("Pagination history at {}", history.path().display());

        Ok(TableRefreshController::new(
            Arc::new(HttpTransport::new()),
            Box::new(history),
            Box::new(sink),
        )
        .with_tick(tick))
    })
    .context("Failed to start refresh worker")
}

/// Bind everything, print renders as they happen, wait for Ctrl+C
async fn run_headless(config: &Config, worker: &RefreshWorker) -> Result<()> {
    let handle = worker.handle();

    for (id, instance) in config.instances() {
        let ack = handle.bind(InstanceId::new(id.clone()), instance.clone(), None);
        if let Ok(outcomes) = ack.await {
            for (id, outcome) in outcomes {
                tracing::info!("{}: initial load -> {:?}", id, outcome);
            }
        }
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle CLI commands first (config --show, load, ...)
    // If a command was handled, exit early
    if cli::handle_cli() {
        return Ok(());
    }

    // Ensure config template exists (helps users discover options)
    Config::ensure_config_exists();

    let config = Config::from_env();

    let log_buffer = LogBuffer::new();
    let _file_guard = init_tracing(&config, &log_buffer);

    let instance_count = config.instances().count();
    tracing::info!(
        "jsontable {} starting ({} instances, tick {}s)",
        config::VERSION,
        instance_count,
        config.tick_secs
    );
    if instance_count == 0 {
        tracing::warn!(
            "No [tables.X] or [selects.X] sections in {}",
            Config::config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "the config file".to_string())
        );
    }

    let worker = if config.enable_tui {
        let views = SharedViews::new();
        let worker = spawn_worker(&config, views.sink())?;

        tracing::info!("Starting TUI");
        if let Err(e) = tui::run_tui(&config, log_buffer, views, worker.handle()).await {
            tracing::error!("TUI error: {:?}", e);
        }
        worker
    } else {
        tracing::info!("TUI disabled, running in headless mode");
        let worker = spawn_worker(&config, LogSink::new())?;
        run_headless(&config, &worker).await?;
        worker
    };

    tracing::info!("Shutting down...");

    // A fetch in progress finishes first; join off the runtime
    tokio::task::spawn_blocking(move || worker.shutdown())
        .await
        .context("Refresh worker shutdown task failed")??;

    tracing::info!("Shutdown complete");
    Ok(())
}
