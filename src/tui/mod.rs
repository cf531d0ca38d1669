// TUI module - Terminal User Interface
//
// This module manages the terminal UI using ratatui. It handles:
// - Terminal initialization and cleanup
// - Event loop (keyboard input, timer ticks, cycle outcomes)
// - Forwarding user actions to the refresh worker
//
// Renders themselves arrive out of band through SharedViews; the loop just
// redraws whatever is latest.

pub mod app;
pub mod input;
pub mod sink;
pub mod ui;

use crate::config::Config;
use crate::logging::LogBuffer;
use crate::table::worker::Outcomes;
use crate::table::{InstanceId, WorkerHandle};
use anyhow::{Context, Result};
use app::{App, Request, Tab};
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use sink::SharedViews;
use std::io;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};

type Term = Terminal<CrosstermBackend<io::Stdout>>;

/// Run the TUI until the user quits
///
/// Binds every configured instance through `worker`, then serves input.
pub async fn run_tui(
    config: &Config,
    log_buffer: LogBuffer,
    views: SharedViews,
    worker: WorkerHandle,
) -> Result<()> {
    // Set up terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to setup terminal")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    let mut app = App::new(views, log_buffer);
    let result = run_event_loop(&mut terminal, &mut app, config, &worker).await;

    // Restore terminal
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to restore terminal")?;
    terminal.show_cursor().context("Failed to show cursor")?;

    result
}

/// Main event loop
///
/// Waits on three sources with tokio::select!:
/// 1. Keyboard input
/// 2. Redraw ticks (renders from the worker show up on the next one)
/// 3. Outcomes of fire-and-forget cycles
async fn run_event_loop(
    terminal: &mut Term,
    app: &mut App,
    config: &Config,
    worker: &WorkerHandle,
) -> Result<()> {
    let mut tick_interval = tokio::time::interval(Duration::from_millis(200));
    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<Outcomes>();

    for (id, instance) in config.instances() {
        let id = InstanceId::new(id.clone());
        app.add_tab(Tab::new(id.clone(), instance));
        let ack = worker.bind(id.clone(), instance.clone(), None);
        if instance.ajax.synchronous {
            await_ack(terminal, app, ack).await?;
        } else {
            forward(ack, &outcome_tx);
        }
    }

    loop {
        terminal
            .draw(|f| ui::draw(f, app))
            .context("Failed to draw terminal")?;

        let mut request = None;
        tokio::select! {
            // Keyboard input
            _ = async {
                if event::poll(Duration::from_millis(10)).unwrap_or(false) {
                    if let Ok(Event::Key(key)) = event::read() {
                        if !app.input.accept(&key, Instant::now()) {
                            return;
                        }
                        let searching = matches!(app.mode, app::Mode::Search(_));
                        if let Some(intent) = input::map_key(&key, searching) {
                            request = app.handle_intent(intent);
                        }
                    }
                }
            } => {}

            _ = tick_interval.tick() => {}

            Some(outcomes) = outcome_rx.recv() => {
                app.record_outcomes(&outcomes);
            }
        }

        if let Some(request) = request {
            dispatch(terminal, app, worker, &outcome_tx, request).await?;
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

async fn dispatch(
    terminal: &mut Term,
    app: &mut App,
    worker: &WorkerHandle,
    outcome_tx: &mpsc::UnboundedSender<Outcomes>,
    request: Request,
) -> Result<()> {
    match request {
        Request::Act { id, action, wait } => {
            tracing::debug!("{}: {:?}", id, action);
            let ack = worker.act(id, action);
            if wait {
                await_ack(terminal, app, ack).await?;
            } else {
                forward(ack, outcome_tx);
            }
        }
        Request::Reload(id) => worker.reload(id),
    }
    Ok(())
}

/// Wait for a synchronous cycle, redrawing but ignoring input meanwhile
async fn await_ack(
    terminal: &mut Term,
    app: &mut App,
    mut ack: oneshot::Receiver<Outcomes>,
) -> Result<()> {
    let mut redraw = tokio::time::interval(Duration::from_millis(200));
    loop {
        terminal
            .draw(|f| ui::draw(f, app))
            .context("Failed to draw terminal")?;

        tokio::select! {
            result = &mut ack => {
                if let Ok(outcomes) = result {
                    app.record_outcomes(&outcomes);
                }
                return Ok(());
            }
            _ = redraw.tick() => {}
        }
    }
}

/// Relay an acknowledgement to the event loop without waiting for it
fn forward(ack: oneshot::Receiver<Outcomes>, outcome_tx: &mpsc::UnboundedSender<Outcomes>) {
    let tx = outcome_tx.clone();
    tokio::spawn(async move {
        if let Ok(outcomes) = ack.await {
            let _ = tx.send(outcomes);
        }
    });
}
