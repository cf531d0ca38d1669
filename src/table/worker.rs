//! Refresh worker: owns the controller on a dedicated thread
//!
//! Fetches block, so the controller never runs on the UI runtime. The UI
//! talks to it through a [`WorkerHandle`] and, for synchronous instances,
//! awaits the acknowledgement carrying the cycle outcomes before handling
//! more input. All cycles for all instances run on this one thread, so two
//! fetches for the same instance can never be in flight at once.

use super::controller::{CycleOutcome, TableAction, TableRefreshController};
use super::instance::InstanceId;
use crate::config::{InstanceConfig, WidgetKind};
use serde_json::Value;
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;

/// Outcomes of every cycle a command caused
pub type Outcomes = Vec<(InstanceId, CycleOutcome)>;

type Ack = oneshot::Sender<Outcomes>;

/// Commands sent to the worker thread
pub enum Command {
    /// Bind (or rebind) an instance, optionally with supplied data
    Bind {
        id: InstanceId,
        config: Box<InstanceConfig>,
        data: Option<Value>,
        ack: Option<Ack>,
    },
    /// User interaction on one instance
    Action {
        id: InstanceId,
        action: TableAction,
        ack: Option<Ack>,
    },
    /// Reload one instance, or every instance when `id` is `None`
    Reload { id: Option<InstanceId>, ack: Option<Ack> },
    Shutdown,
}

/// Drop redundant commands from a batch
///
/// Unacknowledged reloads are idempotent: a repeat of one already queued,
/// or any single reload queued alongside a reload of everything, adds
/// nothing. Commands carrying an ack are always kept so their sender hears
/// back.
pub fn coalesce(batch: Vec<Command>) -> Vec<Command> {
    let reload_all = batch
        .iter()
        .any(|c| matches!(c, Command::Reload { id: None, ack: None }));
    let mut seen: Vec<Option<InstanceId>> = Vec::new();
    let mut kept = Vec::with_capacity(batch.len());

    for command in batch {
        if let Command::Reload { id, ack: None } = &command {
            if (reload_all && id.is_some()) || seen.contains(id) {
                tracing::trace!("Coalesced reload of {:?}", id);
                continue;
            }
            seen.push(id.clone());
        }
        kept.push(command);
    }

    kept
}

/// Clonable handle for sending commands to the worker
#[derive(Clone)]
pub struct WorkerHandle {
    tx: SyncSender<Command>,
}

impl WorkerHandle {
    /// Bind an instance; the receiver resolves after its initial load
    pub fn bind(
        &self,
        id: InstanceId,
        config: InstanceConfig,
        data: Option<Value>,
    ) -> oneshot::Receiver<Outcomes> {
        let (ack, rx) = oneshot::channel();
        self.send(Command::Bind {
            id,
            config: Box::new(config),
            data,
            ack: Some(ack),
        });
        rx
    }

    /// Apply a user action; the receiver resolves when its cycle is done
    pub fn act(&self, id: InstanceId, action: TableAction) -> oneshot::Receiver<Outcomes> {
        let (ack, rx) = oneshot::channel();
        self.send(Command::Action {
            id,
            action,
            ack: Some(ack),
        });
        rx
    }

    /// Queue a reload without waiting for it
    pub fn reload(&self, id: Option<InstanceId>) {
        match self.tx.try_send(Command::Reload { id, ack: None }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => tracing::debug!("Worker busy, reload dropped"),
            Err(TrySendError::Disconnected(_)) => tracing::warn!("Refresh worker is gone"),
        }
    }

    fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            tracing::warn!("Refresh worker is gone");
        }
    }
}

/// Background refresh worker
pub struct RefreshWorker {
    tx: SyncSender<Command>,
    thread: Option<JoinHandle<()>>,
}

impl RefreshWorker {
    /// Spawn the worker thread
    ///
    /// The controller is built on the worker thread by `factory`, so
    /// blocking resources (HTTP client, history file) live there.
    pub fn spawn<F>(factory: F) -> anyhow::Result<Self>
    where
        F: FnOnce() -> anyhow::Result<TableRefreshController> + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel::<Command>(64);

        let thread = thread::Builder::new()
            .name("refresh-worker".into())
            .spawn(move || {
                let result = factory().and_then(|controller| Self::run(rx, controller));
                if let Err(e) = result {
                    tracing::error!("Refresh worker stopped: {:#}", e);
                }
            })?;

        Ok(Self {
            tx,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> WorkerHandle {
        WorkerHandle {
            tx: self.tx.clone(),
        }
    }

    /// Stop the worker and wait for its thread
    ///
    /// A cycle already running (including retry waits) finishes first.
    pub fn shutdown(mut self) -> anyhow::Result<()> {
        let _ = self.tx.send(Command::Shutdown);

        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| anyhow::anyhow!("Refresh worker panicked"))?;
        }

        tracing::debug!("Refresh worker shutdown complete");
        Ok(())
    }

    fn run(
        rx: mpsc::Receiver<Command>,
        mut controller: TableRefreshController,
    ) -> anyhow::Result<()> {
        tracing::debug!("Refresh worker started");

        loop {
            // Sleep until the next command or poll tick; block outright
            // while the timer is disarmed.
            let first = match controller.time_until_tick() {
                Some(wait) => match rx.recv_timeout(wait) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match rx.recv() {
                    Ok(command) => Some(command),
                    Err(_) => break,
                },
            };

            if let Some(first) = first {
                let mut batch = vec![first];
                batch.extend(rx.try_iter());

                for command in coalesce(batch) {
                    if !Self::execute(&mut controller, command) {
                        tracing::debug!("Refresh worker received shutdown");
                        return Ok(());
                    }
                }
            }

            for (id, outcome) in controller.tick_if_due() {
                tracing::debug!("{}: scheduled reload -> {:?}", id, outcome);
            }
        }

        Ok(())
    }

    /// Execute one command; `false` means stop
    fn execute(controller: &mut TableRefreshController, command: Command) -> bool {
        let (outcomes, ack) = match command {
            Command::Bind {
                id,
                config,
                data,
                ack,
            } => {
                let config = *config;
                let outcome = match data {
                    Some(data) => controller.bind_with_data(id.clone(), config, data),
                    None if config.kind == WidgetKind::Select => {
                        controller.bind_select(id.clone(), config)
                    }
                    None => controller.bind(id.clone(), config),
                };
                (vec![(id, outcome)], ack)
            }
            Command::Action { id, action, ack } => {
                let outcome = controller.apply(&id, action);
                (vec![(id, outcome)], ack)
            }
            Command::Reload { id: Some(id), ack } => {
                let outcome = controller.reload(&id);
                (vec![(id, outcome)], ack)
            }
            Command::Reload { id: None, ack } => (controller.reload_all(), ack),
            Command::Shutdown => return false,
        };

        if let Some(ack) = ack {
            // The UI may have stopped waiting; that is fine
            let _ = ack.send(outcomes);
        }
        true
    }
}

impl Drop for RefreshWorker {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.tx.try_send(Command::Shutdown);
        }
    }
}
