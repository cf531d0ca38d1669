//! Bound tables and their refresh machinery
//!
//! - `payload`: interpreting fetched JSON
//! - `cache`: change detection against the last payload
//! - `retry`: bounded retry on timeout
//! - `instance`: per-widget state and the instance store
//! - `scheduler`: the shared poll timer
//! - `render` / `sink`: render instructions and where they go
//! - `controller`: the refresh cycle itself
//! - `worker`: runs the controller on its own thread

pub mod cache;
pub mod controller;
pub mod instance;
pub mod payload;
pub mod render;
pub mod retry;
pub mod scheduler;
pub mod sink;
pub mod worker;

pub use controller::{CycleObserver, CycleOutcome, TableAction, TableRefreshController};
pub use instance::{InstanceId, TargetHandle};
pub use render::RenderInstruction;
pub use sink::{LogSink, RenderSink};
pub use worker::{RefreshWorker, WorkerHandle};
