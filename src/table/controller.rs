//! Refresh controller: trigger → fetch → compare → render
//!
//! Every trigger (bind, scheduler tick, sort, paginate, search, refresh)
//! ends in one refresh cycle for one instance:
//!
//! ```text
//! Idle ─trigger─▶ Fetching ─ok──────▶ Rendering ─▶ Idle
//!                    │  ▲      └─empty/same─▶ Skipped ─▶ Idle
//!                    ▼  │
//!                 RetryWait   (timeouts only, bounded by max_retries)
//! ```
//!
//! Failures never escape as errors. Each operation returns a
//! [`CycleOutcome`] and the table simply keeps its previous content.

use super::instance::{CyclePhase, InstanceId, InstanceStore, TableInstance, TargetHandle};
use super::payload::{decode, decode_all, is_empty_payload, Decoded, Page};
use super::render::{
    summary_text, CollectionRenderer, ListEntryMapper, RenderInstruction, SelectOptionMapper,
    TableRowMapper,
};
use super::retry::RetryDecision;
use super::scheduler::{PollScheduler, DEFAULT_TICK};
use super::sink::RenderSink;
use crate::config::{InstanceConfig, WidgetKind};
use crate::pagination::window::compute_window_with_neighbors;
use crate::pagination::{compute_window, PaginationControl, PaginationState};
use crate::persistence::{PersistenceStore, HISTORY_TTL_DAYS};
use crate::transport::{FetchError, RequestSpec, Transport};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ─────────────────────────────────────────────────────────────────────────────
// Outcomes and actions
// ─────────────────────────────────────────────────────────────────────────────

/// How one refresh cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// New content was rendered
    Rendered { rows: usize },
    /// Payload matched the cached snapshot; nothing rendered
    Unchanged,
    /// Payload was empty; nothing rendered
    Empty,
    /// Every attempt timed out
    Abandoned { attempts: u32 },
    /// Non-timeout fetch failure or malformed payload
    Failed(String),
    /// No url and no supplied data
    Misconfigured,
    UnknownInstance,
    /// Render target is gone; the instance was dropped
    Detached,
}

impl CycleOutcome {
    /// The instance shows fresh or still-current data
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Rendered { .. } | Self::Unchanged)
    }
}

/// A user interaction on a bound instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableAction {
    /// Header click on the column with this sort key
    Sort { column: String },
    /// Pagination button click
    GoToPage(u32),
    /// Search submit
    Search(String),
    /// Refresh button
    Refresh,
}

// ─────────────────────────────────────────────────────────────────────────────
// Clock
// ─────────────────────────────────────────────────────────────────────────────

/// Wall-clock time and waiting, swappable for tests
pub trait Clock: Send {
    fn now(&self) -> DateTime<Utc>;

    /// Block for `duration` (retry delay)
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Clock that only moves when told to; sleeping advances it instantly
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, duration: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|now| *now).unwrap_or_else(|_| Utc::now())
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Observers
// ─────────────────────────────────────────────────────────────────────────────

/// Caller hooks invoked after a cycle fetches successfully or fails
pub trait CycleObserver: Send {
    fn on_success(&mut self, _id: &InstanceId, _page: &Page) {}

    fn on_error(&mut self, _id: &InstanceId, _error: &FetchError) {}
}

fn notify_error(observers: &mut [Box<dyn CycleObserver>], id: &InstanceId, error: &FetchError) {
    for observer in observers.iter_mut() {
        observer.on_error(id, error);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Controller
// ─────────────────────────────────────────────────────────────────────────────

pub struct TableRefreshController {
    instances: InstanceStore,
    transport: Arc<dyn Transport>,
    history: Box<dyn PersistenceStore>,
    sink: Box<dyn RenderSink>,
    clock: Box<dyn Clock>,
    scheduler: PollScheduler,
    observers: Vec<Box<dyn CycleObserver>>,
}

impl TableRefreshController {
    pub fn new(
        transport: Arc<dyn Transport>,
        history: Box<dyn PersistenceStore>,
        sink: Box<dyn RenderSink>,
    ) -> Self {
        Self {
            instances: InstanceStore::new(),
            transport,
            history,
            sink,
            clock: Box::new(SystemClock),
            scheduler: PollScheduler::new(DEFAULT_TICK),
            observers: Vec::new(),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_tick(mut self, interval: Duration) -> Self {
        self.scheduler = PollScheduler::new(interval);
        self
    }

    pub fn add_observer(&mut self, observer: impl CycleObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn instances(&self) -> &InstanceStore {
        &self.instances
    }

    pub fn instance(&self, id: &InstanceId) -> Option<&TableInstance> {
        self.instances.get(id)
    }

    pub fn scheduler(&self) -> &PollScheduler {
        &self.scheduler
    }

    // ─── Binding ─────────────────────────────────────────────────────────────

    /// Bind `id` with `config` and run its initial load
    ///
    /// Rebinding an existing id replaces the instance. Binding arms the poll
    /// timer if it had stopped.
    pub fn bind(&mut self, id: InstanceId, config: InstanceConfig) -> CycleOutcome {
        let instance = self.create_instance(id.clone(), config);
        self.register(instance);
        self.run_cycle(&id)
    }

    /// Bind `id` and render `data` instead of fetching
    pub fn bind_with_data(
        &mut self,
        id: InstanceId,
        config: InstanceConfig,
        data: Value,
    ) -> CycleOutcome {
        let mut instance = self.create_instance(id.clone(), config);
        instance.supplied = Some(data);
        instance.reload_delay_minutes = None;
        self.register(instance);
        self.run_cycle(&id)
    }

    /// Bind `id` as a select: all options, never polled
    pub fn bind_select(&mut self, id: InstanceId, mut config: InstanceConfig) -> CycleOutcome {
        config.kind = WidgetKind::Select;
        config.ajax.reload_delay_minutes = None;
        self.bind(id, config)
    }

    fn create_instance(&self, id: InstanceId, config: InstanceConfig) -> TableInstance {
        let target = TargetHandle::new(id.clone());
        let mut instance = TableInstance::new(id, config, target);
        instance.last_update = self.clock.now();

        if instance.config.table.persist_history && instance.config.kind != WidgetKind::Select {
            if let Some(state) = self.restore_history(&instance.history_key()) {
                tracing::debug!(
                    "{}: restored pagination history (page {})",
                    instance.id,
                    state.page
                );
                instance.state = state;
            }
        }

        instance
    }

    fn restore_history(&self, key: &str) -> Option<PaginationState> {
        let stored = self.history.get(key)?;
        match serde_json::from_str::<PaginationState>(&stored) {
            Ok(state) => Some(state.for_history().normalized()),
            Err(e) => {
                tracing::warn!("Ignoring unreadable history under {}: {}", key, e);
                None
            }
        }
    }

    fn register(&mut self, instance: TableInstance) {
        tracing::info!(
            "Bound {} {} ({})",
            instance.config.kind.as_str(),
            instance.id,
            instance
                .reload_delay_minutes
                .map(|m| format!("reload every {}m", m))
                .unwrap_or_else(|| "no polling".to_string())
        );
        if self.instances.insert(instance).is_some() {
            tracing::debug!("Replaced existing instance");
        }
        self.scheduler.arm(Instant::now());
    }

    // ─── Triggers ────────────────────────────────────────────────────────────

    /// Force a cycle for `id`
    pub fn trigger(&mut self, id: &InstanceId) -> CycleOutcome {
        self.run_cycle(id)
    }

    /// Explicit reload of one instance
    pub fn reload(&mut self, id: &InstanceId) -> CycleOutcome {
        tracing::debug!("Reload requested for {}", id);
        self.run_cycle(id)
    }

    /// Explicit reload of every bound instance
    pub fn reload_all(&mut self) -> Vec<(InstanceId, CycleOutcome)> {
        self.instances
            .ids()
            .into_iter()
            .map(|id| {
                let outcome = self.run_cycle(&id);
                (id, outcome)
            })
            .collect()
    }

    /// Header click: toggle the column's direction and reload
    pub fn sort(&mut self, id: &InstanceId, column: &str) -> CycleOutcome {
        let Some(instance) = self.instances.get_mut(id) else {
            return CycleOutcome::UnknownInstance;
        };
        let order = instance.toggle_sort(column);
        tracing::debug!("{}: sort by {} {}", id, column, order);
        self.run_cycle(id)
    }

    /// Pagination click: move to `page` and reload
    pub fn paginate(&mut self, id: &InstanceId, page: u32) -> CycleOutcome {
        let Some(instance) = self.instances.get_mut(id) else {
            return CycleOutcome::UnknownInstance;
        };
        instance.state.go_to(page);

        let outcome = self.run_cycle(id);

        // The click is remembered whatever the fetch did
        if let Some(instance) = self.instances.get(id) {
            if instance.config.table.persist_history
                && instance.config.kind != WidgetKind::Select
            {
                save_history(self.history.as_ref(), instance);
            }
        }
        outcome
    }

    /// Search submit: one filtered cycle, then the filter is dropped
    ///
    /// The filtered results stay on screen, but neither the in-memory state
    /// nor the stored history keep the term, so the next scheduled reload is
    /// unfiltered.
    pub fn search(&mut self, id: &InstanceId, term: &str) -> CycleOutcome {
        let Some(instance) = self.instances.get_mut(id) else {
            return CycleOutcome::UnknownInstance;
        };
        instance.state.like = term.to_string();

        let outcome = self.run_cycle(id);

        if let Some(instance) = self.instances.get_mut(id) {
            instance.state.like.clear();
            if instance.config.table.persist_history {
                save_history(self.history.as_ref(), instance);
            }
        }
        outcome
    }

    /// Refresh click: clear the filter, back to page 1, reload
    pub fn refresh(&mut self, id: &InstanceId) -> CycleOutcome {
        let Some(instance) = self.instances.get_mut(id) else {
            return CycleOutcome::UnknownInstance;
        };
        instance.state.like.clear();
        instance.state.go_to(1);
        self.run_cycle(id)
    }

    /// Dispatch a user action
    pub fn apply(&mut self, id: &InstanceId, action: TableAction) -> CycleOutcome {
        match action {
            TableAction::Sort { column } => self.sort(id, &column),
            TableAction::GoToPage(page) => self.paginate(id, page),
            TableAction::Search(term) => self.search(id, &term),
            TableAction::Refresh => self.refresh(id),
        }
    }

    // ─── Scheduler ───────────────────────────────────────────────────────────

    /// Time until the poll timer fires, `None` while disarmed
    pub fn time_until_tick(&self) -> Option<Duration> {
        self.scheduler.time_until_tick(Instant::now())
    }

    /// Run the scheduler tick if its deadline has passed
    pub fn tick_if_due(&mut self) -> Vec<(InstanceId, CycleOutcome)> {
        let now = Instant::now();
        if !self.scheduler.is_tick_due(now) {
            return Vec::new();
        }
        self.scheduler.advance(now);
        self.tick()
    }

    /// One scheduler pass
    ///
    /// Drops instances whose target is gone, disarms the timer when none
    /// remain, and reloads every instance whose delay has elapsed.
    pub fn tick(&mut self) -> Vec<(InstanceId, CycleOutcome)> {
        let live_before = self.instances.len();
        let sink = &self.sink;
        let sweep = self
            .scheduler
            .sweep(&self.instances, |target| sink.is_attached(target), self.clock.now());

        for id in &sweep.detached {
            tracing::info!("{}: target gone, unbinding", id);
            self.instances.remove(id);
        }

        if sweep.is_idle(live_before) {
            self.scheduler.disarm();
            return Vec::new();
        }

        sweep
            .due
            .into_iter()
            .map(|id| {
                tracing::debug!("{}: reload delay elapsed", id);
                let outcome = self.run_cycle(&id);
                (id, outcome)
            })
            .collect()
    }

    // ─── Cycle ───────────────────────────────────────────────────────────────

    fn run_cycle(&mut self, id: &InstanceId) -> CycleOutcome {
        let Some(target) = self.instances.get(id).map(|instance| instance.target.clone()) else {
            tracing::debug!("{}: not bound", id);
            return CycleOutcome::UnknownInstance;
        };
        if !self.sink.is_attached(&target) {
            tracing::info!("{}: target gone, unbinding", id);
            self.instances.remove(id);
            return CycleOutcome::Detached;
        }

        let payload = match self.obtain_payload(id) {
            Ok(payload) => payload,
            Err(outcome) => return outcome,
        };

        // The target may have disappeared while the request was in flight
        if !self.sink.is_attached(&target) {
            tracing::info!("{}: target gone during fetch, discarding result", id);
            self.instances.remove(id);
            return CycleOutcome::Detached;
        }

        let Some(instance) = self.instances.get_mut(id) else {
            return CycleOutcome::UnknownInstance;
        };
        instance.retry.reset();

        if is_empty_payload(&payload) {
            tracing::info!("{}: no data returned, keeping current content", id);
            instance.enter(CyclePhase::Skipped);
            instance.enter(CyclePhase::Idle);
            return CycleOutcome::Empty;
        }

        let decoded = match instance.config.kind {
            WidgetKind::Select => decode_all(&payload),
            _ => decode(&payload, instance.config.table.response_mode, &instance.state),
        };
        let page = match decoded {
            Decoded::Page(page) => page,
            Decoded::Empty => {
                instance.enter(CyclePhase::Skipped);
                instance.enter(CyclePhase::Idle);
                return CycleOutcome::Empty;
            }
            Decoded::Malformed(reason) => {
                if instance.config.ajax.log_errors {
                    tracing::error!("{}: unexpected response shape: {}", id, reason);
                }
                notify_error(&mut self.observers, id, &FetchError::Decode(reason.clone()));
                instance.enter(CyclePhase::Idle);
                return CycleOutcome::Failed(reason);
            }
        };

        instance.last_update = self.clock.now();
        for observer in self.observers.iter_mut() {
            observer.on_success(id, &page);
        }

        if instance.config.table.prevent_rerender && instance.cache.is_unchanged(&payload) {
            tracing::debug!("{}: response unchanged, skipping render", id);
            instance.enter(CyclePhase::Skipped);
            instance.enter(CyclePhase::Idle);
            return CycleOutcome::Unchanged;
        }

        instance.enter(CyclePhase::Rendering);
        let instruction = build_instruction(instance, &page);
        let rows = page.results.len();
        self.sink.render(&instance.target, instruction);

        instance.cache.store(payload);
        if instance.config.table.persist_history && instance.config.kind != WidgetKind::Select {
            save_history(self.history.as_ref(), instance);
        }
        instance.enter(CyclePhase::Idle);

        tracing::debug!("{}: rendered {} rows", id, rows);
        CycleOutcome::Rendered { rows }
    }

    /// Supplied data, or fetch with retry on timeout
    fn obtain_payload(&mut self, id: &InstanceId) -> Result<Value, CycleOutcome> {
        let Some(instance) = self.instances.get_mut(id) else {
            return Err(CycleOutcome::UnknownInstance);
        };

        if let Some(data) = &instance.supplied {
            return Ok(data.clone());
        }

        let Some(request) = request_for(instance) else {
            tracing::error!("{}: no url configured and no data supplied", id);
            instance.enter(CyclePhase::Idle);
            return Err(CycleOutcome::Misconfigured);
        };

        instance.retry.reset();
        loop {
            instance.enter(CyclePhase::Fetching);
            match self.transport.fetch(&request) {
                Ok(payload) => return Ok(payload),
                Err(FetchError::Timeout) => match instance.retry.on_timeout() {
                    RetryDecision::Retry { attempt, delay } => {
                        tracing::warn!(
                            "{}: request timed out, retrying (attempt {}/{})",
                            id,
                            attempt,
                            instance.retry.max_retries()
                        );
                        instance.enter(CyclePhase::RetryWait);
                        self.clock.sleep(delay);
                    }
                    RetryDecision::GiveUp { attempts } => {
                        if instance.config.ajax.log_errors {
                            tracing::error!(
                                "{}: giving up after {} timed out attempts",
                                id,
                                attempts
                            );
                        }
                        notify_error(&mut self.observers, id, &FetchError::Timeout);
                        instance.enter(CyclePhase::Idle);
                        return Err(CycleOutcome::Abandoned { attempts });
                    }
                },
                Err(e) => {
                    if instance.config.ajax.log_errors {
                        tracing::error!("{}: {}", id, e);
                    }
                    notify_error(&mut self.observers, id, &e);
                    instance.enter(CyclePhase::Idle);
                    return Err(CycleOutcome::Failed(e.to_string()));
                }
            }
        }
    }
}

fn request_for(instance: &TableInstance) -> Option<RequestSpec> {
    let ajax = &instance.config.ajax;
    let url = ajax.url.as_ref().filter(|url| !url.trim().is_empty())?;

    let mut request = RequestSpec {
        delimiter: ajax.url_delimiter.clone(),
        timeout: ajax.timeout(),
        headers: ajax.headers.clone(),
        ..RequestSpec::new(url.clone())
    };
    if instance.config.kind != WidgetKind::Select {
        request = request.with_state(&instance.state);
    }
    Some(request)
}

fn save_history(history: &dyn PersistenceStore, instance: &TableInstance) {
    let key = instance.history_key();
    let result = serde_json::to_string(&instance.state.for_history())
        .map_err(anyhow::Error::from)
        .and_then(|value| history.set(&key, &value, HISTORY_TTL_DAYS));

    if let Err(e) = result {
        tracing::warn!("{}: failed to save pagination history: {:#}", instance.id, e);
    }
}

fn pagination_for(instance: &TableInstance, page: &Page) -> PaginationControl {
    let options = &instance.config.table;
    if !options.pagination_enabled || instance.config.kind == WidgetKind::Select {
        return PaginationControl::empty();
    }

    let meta = &page.pagination;
    let current = u32::try_from(meta.page)
        .ok()
        .filter(|p| *p > 0)
        .unwrap_or(instance.state.page);

    if meta.left.is_empty() && meta.right.is_empty() {
        compute_window(current, meta.last, &options.window)
    } else {
        compute_window_with_neighbors(
            current,
            meta.last,
            &meta.left,
            &meta.right,
            &options.window,
        )
    }
}

fn build_instruction(instance: &TableInstance, page: &Page) -> RenderInstruction {
    let config = &instance.config;
    let rendered = match config.kind {
        WidgetKind::Table => CollectionRenderer::new(TableRowMapper {
            options: &config.table,
            state: &instance.state,
            sort_markers: &instance.sort_markers,
        })
        .render(&page.results),
        WidgetKind::Select => {
            CollectionRenderer::new(SelectOptionMapper {
                options: &config.select,
            })
            .render(&page.results)
        }
        WidgetKind::List => CollectionRenderer::new(ListEntryMapper {
            options: &config.table,
        })
        .render(&page.results),
    };

    let footer = (config.kind == WidgetKind::Table
        && config.table.footer
        && !rendered.header.is_empty())
    .then(|| rendered.header.clone());
    let summary = match config.kind {
        WidgetKind::Select => String::new(),
        _ => summary_text(
            &config.table,
            page.results.len(),
            page.total_results,
            page.has_current_page(),
        ),
    };

    RenderInstruction {
        kind: config.kind,
        header_columns: rendered.header,
        rows: rendered.rows,
        footer,
        pagination: pagination_for(instance, page),
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::SortOrder;
    use crate::persistence::MemoryStore;
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::{HashSet, VecDeque};

    // ─── Test doubles ────────────────────────────────────────────────────────

    #[derive(Default)]
    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<Value, FetchError>>>,
        urls: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn push(&self, response: Result<Value, FetchError>) {
            self.responses.lock().unwrap().push_back(response);
        }

        fn urls(&self) -> Vec<String> {
            self.urls.lock().unwrap().clone()
        }
    }

    impl Transport for ScriptedTransport {
        fn fetch(&self, request: &RequestSpec) -> Result<Value, FetchError> {
            self.urls.lock().unwrap().push(request.build_url());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::Network("script exhausted".into())))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        renders: Arc<Mutex<Vec<(TargetHandle, RenderInstruction)>>>,
        detached: Arc<Mutex<HashSet<InstanceId>>>,
    }

    impl RecordingSink {
        fn count(&self) -> usize {
            self.renders.lock().unwrap().len()
        }

        fn last(&self) -> RenderInstruction {
            self.renders.lock().unwrap().last().unwrap().1.clone()
        }

        fn last_target(&self) -> TargetHandle {
            self.renders.lock().unwrap().last().unwrap().0.clone()
        }

        fn detach(&self, id: &str) {
            self.detached.lock().unwrap().insert(InstanceId::from(id));
        }
    }

    impl RenderSink for RecordingSink {
        fn render(&mut self, target: &TargetHandle, instruction: RenderInstruction) {
            self.renders.lock().unwrap().push((target.clone(), instruction));
        }

        fn is_attached(&self, target: &TargetHandle) -> bool {
            !self.detached.lock().unwrap().contains(&target.region)
        }
    }

    #[derive(Clone, Default)]
    struct ErrorLog(Arc<Mutex<Vec<String>>>);

    impl CycleObserver for ErrorLog {
        fn on_error(&mut self, id: &InstanceId, error: &FetchError) {
            self.0.lock().unwrap().push(format!("{}: {}", id, error));
        }
    }

    struct Harness {
        controller: TableRefreshController,
        transport: Arc<ScriptedTransport>,
        sink: RecordingSink,
        history: MemoryStore,
        clock: ManualClock,
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn harness() -> Harness {
        let transport = Arc::new(ScriptedTransport::default());
        let sink = RecordingSink::default();
        let history = MemoryStore::new();
        let clock = ManualClock::new(start());

        let controller = TableRefreshController::new(
            transport.clone(),
            Box::new(history.clone()),
            Box::new(sink.clone()),
        )
        .with_clock(clock.clone());

        Harness {
            controller,
            transport,
            sink,
            history,
            clock,
        }
    }

    fn users_config() -> InstanceConfig {
        let mut config = InstanceConfig::default();
        config.ajax.url = Some("https://api.test/users?v=1".to_string());
        config.ajax.max_retries = 3;
        config.ajax.retry_delay_ms = 1_000;
        config
    }

    fn page_payload(page: u32, last: u32, names: &[&str]) -> Value {
        let results: Vec<Value> = names
            .iter()
            .enumerate()
            .map(|(i, name)| json!({"id": i + 1, "name": name}))
            .collect();
        json!({
            "results": results,
            "pagination": {"page": page, "start": 1, "end": last.min(10), "last": last},
            "total_results": u64::from(last) * 25,
        })
    }

    fn id(s: &str) -> InstanceId {
        InstanceId::from(s)
    }

    // ─── Cycle ───────────────────────────────────────────────────────────────

    #[test]
    fn test_bind_fetches_and_renders() {
        let mut h = harness();
        h.transport.push(Ok(page_payload(1, 20, &["Ada", "Alan"])));

        let outcome = h.controller.bind(id("users"), users_config());
        assert_eq!(outcome, CycleOutcome::Rendered { rows: 2 });
        assert_eq!(
            h.transport.urls(),
            vec!["https://api.test/users?v=1&page=1&limit=25&order=desc&order_by=id&like="]
        );

        let instruction = h.sink.last();
        assert_eq!(instruction.kind, WidgetKind::Table);
        assert_eq!(instruction.rows[0].cells, vec!["#1", "1", "Ada"]);
        assert_eq!(instruction.pagination.active_page(), Some(1));
        assert_eq!(instruction.pagination.last_page(), Some(20));
        assert_eq!(instruction.summary, "Showing 2 of 500 items.");
        assert_eq!(instruction.footer.as_ref().map(Vec::len), Some(3));
        assert!(h.controller.scheduler().is_armed());

        let instance = h.controller.instance(&id("users")).unwrap();
        assert_eq!(instance.phase, CyclePhase::Idle);
        assert!(instance.cache.snapshot().is_some());
    }

    #[test]
    fn test_unchanged_payload_skips_render() {
        let mut h = harness();
        h.transport.push(Ok(page_payload(1, 2, &["Ada"])));
        h.transport.push(Ok(page_payload(1, 2, &["Ada"])));
        h.controller.bind(id("users"), users_config());

        h.clock.advance(Duration::from_secs(120));
        assert_eq!(h.controller.reload(&id("users")), CycleOutcome::Unchanged);
        assert_eq!(h.sink.count(), 1);

        // Still a successful load
        let instance = h.controller.instance(&id("users")).unwrap();
        assert_eq!(instance.last_update, start() + chrono::Duration::seconds(120));
    }

    #[test]
    fn test_rerender_when_change_detection_disabled() {
        let mut h = harness();
        let mut config = users_config();
        config.table.prevent_rerender = false;
        h.transport.push(Ok(page_payload(1, 2, &["Ada"])));
        h.transport.push(Ok(page_payload(1, 2, &["Ada"])));

        h.controller.bind(id("users"), config);
        assert_eq!(
            h.controller.reload(&id("users")),
            CycleOutcome::Rendered { rows: 1 }
        );
        assert_eq!(h.sink.count(), 2);
    }

    #[test]
    fn test_empty_payload_is_skipped() {
        let mut h = harness();
        h.transport.push(Ok(json!({})));

        assert_eq!(
            h.controller.bind(id("users"), users_config()),
            CycleOutcome::Empty
        );
        assert_eq!(h.sink.count(), 0);

        h.transport.push(Ok(Value::Null));
        h.clock.advance(Duration::from_secs(600));
        assert_eq!(h.controller.reload(&id("users")), CycleOutcome::Empty);

        let instance = h.controller.instance(&id("users")).unwrap();
        assert_eq!(instance.last_update, start());
        assert!(instance.cache.snapshot().is_none());
    }

    #[test]
    fn test_timeouts_are_retried_then_abandoned() {
        let mut h = harness();
        let first = page_payload(1, 2, &["Ada"]);
        h.transport.push(Ok(first.clone()));
        h.controller.bind(id("users"), users_config());

        for _ in 0..3 {
            h.transport.push(Err(FetchError::Timeout));
        }
        let errors = ErrorLog::default();
        h.controller.add_observer(errors.clone());

        assert_eq!(
            h.controller.reload(&id("users")),
            CycleOutcome::Abandoned { attempts: 3 }
        );

        // Initial load plus three timed-out attempts
        assert_eq!(h.transport.urls().len(), 4);
        assert_eq!(h.sink.count(), 1);
        let instance = h.controller.instance(&id("users")).unwrap();
        assert_eq!(instance.cache.snapshot(), Some(&first));
        assert_eq!(instance.last_update, start());
        assert_eq!(instance.phase, CyclePhase::Idle);
        // Two waits between three attempts
        assert_eq!(h.clock.now(), start() + chrono::Duration::seconds(2));
        assert_eq!(errors.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_timeout_then_success_renders() {
        let mut h = harness();
        h.transport.push(Err(FetchError::Timeout));
        h.transport.push(Ok(page_payload(1, 2, &["Ada"])));

        assert_eq!(
            h.controller.bind(id("users"), users_config()),
            CycleOutcome::Rendered { rows: 1 }
        );
        assert_eq!(h.controller.instance(&id("users")).unwrap().retry.counter(), 0);
    }

    #[test]
    fn test_non_timeout_failure_is_not_retried() {
        let mut h = harness();
        let errors = ErrorLog::default();
        h.controller.add_observer(errors.clone());
        h.transport.push(Err(FetchError::Http { status: 500 }));

        let outcome = h.controller.bind(id("users"), users_config());
        assert_eq!(outcome, CycleOutcome::Failed("HTTP error (500)".to_string()));
        assert_eq!(h.transport.urls().len(), 1);
        assert_eq!(
            *errors.0.lock().unwrap(),
            vec!["users: HTTP error (500)".to_string()]
        );
    }

    #[test]
    fn test_malformed_payload_fails_cycle() {
        let mut h = harness();
        h.transport.push(Ok(json!({"results": "nope"})));

        assert!(matches!(
            h.controller.bind(id("users"), users_config()),
            CycleOutcome::Failed(_)
        ));
        assert_eq!(h.sink.count(), 0);
    }

    #[test]
    fn test_missing_url_aborts_trigger() {
        let mut h = harness();
        let outcome = h.controller.bind(id("users"), InstanceConfig::default());

        assert_eq!(outcome, CycleOutcome::Misconfigured);
        assert!(h.transport.urls().is_empty());
        assert!(h.controller.instance(&id("users")).is_some());
    }

    #[test]
    fn test_unknown_instance() {
        let mut h = harness();
        assert_eq!(
            h.controller.sort(&id("nope"), "name"),
            CycleOutcome::UnknownInstance
        );
        assert_eq!(
            h.controller.reload(&id("nope")),
            CycleOutcome::UnknownInstance
        );
    }

    // ─── User actions ────────────────────────────────────────────────────────

    #[test]
    fn test_first_sort_click_is_ascending() {
        let mut h = harness();
        h.transport.push(Ok(page_payload(1, 2, &["Ada"])));
        h.transport.push(Ok(page_payload(1, 2, &["Zed"])));
        h.transport.push(Ok(page_payload(1, 2, &["Ada"])));
        h.controller.bind(id("users"), users_config());

        h.controller.sort(&id("users"), "name");
        let urls = h.transport.urls();
        assert!(urls[1].contains("order=asc&order_by=name"));
        let header = h.sink.last().header_columns;
        let name = header.iter().find(|c| c.key == "name").unwrap();
        assert_eq!(name.order, Some(SortOrder::Asc));

        h.controller.sort(&id("users"), "name");
        assert!(h.transport.urls()[2].contains("order=desc&order_by=name"));
    }

    #[test]
    fn test_paginate_moves_and_persists() {
        let mut h = harness();
        h.transport.push(Ok(page_payload(1, 20, &["Ada"])));
        h.transport.push(Ok(page_payload(15, 20, &["Zed"])));
        h.controller.bind(id("users"), users_config());

        let outcome = h.controller.paginate(&id("users"), 15);
        assert_eq!(outcome, CycleOutcome::Rendered { rows: 1 });
        assert!(h.transport.urls()[1].contains("page=15&"));

        let instruction = h.sink.last();
        assert_eq!(instruction.pagination.active_page(), Some(15));
        assert_eq!(instruction.rows[0].cells[0], "#351");

        let stored: PaginationState =
            serde_json::from_str(&h.history.get("users_pagination").unwrap()).unwrap();
        assert_eq!(stored.page, 15);
    }

    fn stored_page(history: &MemoryStore) -> u32 {
        let stored: PaginationState =
            serde_json::from_str(&history.get("users_pagination").unwrap()).unwrap();
        stored.page
    }

    #[test]
    fn test_paginate_persists_when_nothing_renders() {
        let mut h = harness();
        h.transport.push(Ok(page_payload(1, 20, &["Ada"])));
        h.transport.push(Ok(page_payload(1, 20, &["Ada"])));
        h.transport.push(Err(FetchError::Http { status: 500 }));
        h.controller.bind(id("users"), users_config());
        assert_eq!(stored_page(&h.history), 1);

        let outcome = h.controller.paginate(&id("users"), 7);
        assert_eq!(outcome, CycleOutcome::Unchanged);
        assert_eq!(stored_page(&h.history), 7);

        let outcome = h.controller.paginate(&id("users"), 9);
        assert_eq!(outcome, CycleOutcome::Failed("HTTP error (500)".into()));
        assert_eq!(h.controller.instance(&id("users")).unwrap().state.page, 9);
        assert_eq!(stored_page(&h.history), 9);
    }

    #[test]
    fn test_search_fetches_filtered_once_and_forgets_term() {
        let mut h = harness();
        h.transport.push(Ok(page_payload(1, 2, &["Ada", "Alan"])));
        h.transport.push(Ok(page_payload(1, 1, &["Ada"])));
        h.controller.bind(id("users"), users_config());

        let outcome = h.controller.search(&id("users"), "abc");
        assert_eq!(outcome, CycleOutcome::Rendered { rows: 1 });

        let urls = h.transport.urls();
        assert_eq!(urls.len(), 2);
        assert!(urls[1].ends_with("like=abc"));

        assert_eq!(h.controller.instance(&id("users")).unwrap().state.like, "");
        let stored: PaginationState =
            serde_json::from_str(&h.history.get("users_pagination").unwrap()).unwrap();
        assert_eq!(stored.like, "");
    }

    #[test]
    fn test_refresh_resets_page_and_filter() {
        let mut h = harness();
        h.transport.push(Ok(page_payload(1, 20, &["Ada"])));
        h.transport.push(Ok(page_payload(4, 20, &["Bob"])));
        h.transport.push(Ok(page_payload(1, 20, &["Ada"])));
        h.controller.bind(id("users"), users_config());
        h.controller.paginate(&id("users"), 4);

        h.controller.apply(&id("users"), TableAction::Refresh);
        let urls = h.transport.urls();
        assert!(urls[2].contains("page=1&"));
        assert!(urls[2].ends_with("like="));
        assert_eq!(h.controller.instance(&id("users")).unwrap().state.page, 1);
    }

    // ─── Binding variants ────────────────────────────────────────────────────

    #[test]
    fn test_history_restored_on_bind_without_filter() {
        let mut h = harness();
        h.history
            .set(
                "app_users_pagination",
                r#"{"page":4,"limit":10,"order":"asc","order_by":"name","like":"zzz"}"#,
                365,
            )
            .unwrap();
        h.transport.push(Ok(page_payload(4, 20, &["Dan"])));

        let mut config = users_config();
        config.table.prefix = "app_".to_string();
        h.controller.bind(id("users"), config);

        assert_eq!(
            h.transport.urls()[0],
            "https://api.test/users?v=1&page=4&limit=10&order=asc&order_by=name&like="
        );
    }

    #[test]
    fn test_history_ignored_when_disabled() {
        let mut h = harness();
        let stored = r#"{"page":4,"limit":10,"order":"asc","order_by":"name"}"#;
        h.history.set("users_pagination", stored, 365).unwrap();
        h.transport.push(Ok(page_payload(1, 20, &["Ada"])));

        let mut config = users_config();
        config.table.persist_history = false;
        h.controller.bind(id("users"), config);
        assert!(h.transport.urls()[0].contains("page=1&limit=25"));
    }

    #[test]
    fn test_bind_with_data_never_fetches() {
        let mut h = harness();
        let data = page_payload(1, 1, &["Ada", "Alan", "Grace"]);

        let outcome = h
            .controller
            .bind_with_data(id("local"), InstanceConfig::default(), data);
        assert_eq!(outcome, CycleOutcome::Rendered { rows: 3 });
        assert!(h.transport.urls().is_empty());
        assert_eq!(h.controller.reload(&id("local")), CycleOutcome::Unchanged);
        assert_eq!(
            h.controller.instance(&id("local")).unwrap().reload_delay_minutes,
            None
        );
    }

    #[test]
    fn test_bind_select_renders_options_without_query() {
        let mut h = harness();
        h.transport.push(Ok(json!([
            {"id": 1, "name": "Admin"},
            {"id": 2, "name": "Editor"}
        ])));

        let mut config = InstanceConfig::default();
        config.ajax.url = Some("https://api.test/roles".to_string());
        config.select.selected_value = Some("2".to_string());
        config.select.default_option = Some("Pick a role".to_string());

        let outcome = h.controller.bind_select(id("roles"), config);
        assert_eq!(outcome, CycleOutcome::Rendered { rows: 2 });
        assert_eq!(h.transport.urls(), vec!["https://api.test/roles"]);

        let instruction = h.sink.last();
        assert_eq!(instruction.kind, WidgetKind::Select);
        assert_eq!(instruction.rows.len(), 3);
        assert!(instruction.rows[2].selected);
        assert!(instruction.pagination.is_empty());
        assert!(h.history.get("roles_pagination").is_none());
    }

    // ─── Scheduler ───────────────────────────────────────────────────────────

    #[test]
    fn test_tick_reloads_due_instances() {
        let mut h = harness();
        let mut config = users_config();
        config.ajax.reload_delay_minutes = Some(10);
        h.transport.push(Ok(page_payload(1, 2, &["Ada"])));
        h.controller.bind(id("users"), config);

        h.clock.advance(Duration::from_secs(5 * 60));
        assert!(h.controller.tick().is_empty());

        h.transport.push(Ok(page_payload(1, 2, &["Ada", "Alan"])));
        h.clock.advance(Duration::from_secs(5 * 60));
        let reloaded = h.controller.tick();
        assert_eq!(
            reloaded,
            vec![(id("users"), CycleOutcome::Rendered { rows: 2 })]
        );
    }

    #[test]
    fn test_tick_drops_detached_and_disarms() {
        let mut h = harness();
        h.transport.push(Ok(page_payload(1, 2, &["Ada"])));
        h.transport.push(Ok(page_payload(1, 2, &["Bob"])));
        h.controller.bind(id("a"), users_config());
        h.controller.bind(id("b"), users_config());

        h.sink.detach("a");
        h.controller.tick();
        assert!(h.controller.instance(&id("a")).is_none());
        assert!(h.controller.scheduler().is_armed());

        h.sink.detach("b");
        h.controller.tick();
        assert!(h.controller.instances().is_empty());
        assert!(!h.controller.scheduler().is_armed());

        // Only a fresh bind restarts the timer
        h.transport.push(Ok(page_payload(1, 2, &["Cy"])));
        h.controller.bind(id("c"), users_config());
        assert!(h.controller.scheduler().is_armed());
    }

    #[test]
    fn test_detached_target_discards_trigger() {
        let mut h = harness();
        h.transport.push(Ok(page_payload(1, 2, &["Ada"])));
        h.controller.bind(id("users"), users_config());

        h.sink.detach("users");
        assert_eq!(h.controller.paginate(&id("users"), 2), CycleOutcome::Detached);
        assert_eq!(h.transport.urls().len(), 1);
        assert!(h.controller.instances().is_empty());
    }

    #[test]
    fn test_request_carries_ajax_options() {
        let mut config = users_config();
        config.ajax.url = Some("https://api.test/users".to_string());
        config.ajax.url_delimiter = "?".to_string();
        config.ajax.timeout_ms = 5_000;
        config
            .ajax
            .headers
            .insert("Authorization".to_string(), "Bearer t".to_string());
        let instance = TableInstance::new(id("users"), config.clone(), TargetHandle::new("users"));

        let request = request_for(&instance).unwrap();
        assert_eq!(request.timeout, Duration::from_secs(5));
        assert_eq!(request.headers.get("Authorization").map(String::as_str), Some("Bearer t"));
        assert!(request.build_url().starts_with("https://api.test/users?page=1&"));

        // Fetch mode only decides whether the UI waits; the request is the same
        config.ajax.synchronous = false;
        let background = TableInstance::new(id("users"), config, TargetHandle::new("users"));
        assert_eq!(request_for(&background), Some(request));

        let mut config = users_config();
        config.ajax.url = Some("  ".to_string());
        let blank = TableInstance::new(id("users"), config, TargetHandle::new("users"));
        assert_eq!(request_for(&blank), None);
    }

    #[test]
    fn test_cycles_render_into_instance_target() {
        let mut h = harness();
        h.transport.push(Ok(page_payload(1, 2, &["Ada"])));
        h.transport.push(Ok(page_payload(2, 2, &["Bob"])));
        h.controller.bind(id("users"), users_config());
        assert_eq!(h.sink.last_target(), TargetHandle::new("users"));

        // Move the instance to another region; its old one going away no longer matters
        h.controller.instances.get_mut(&id("users")).unwrap().target =
            TargetHandle::new("users-panel");
        h.sink.detach("users");
        assert_eq!(
            h.controller.paginate(&id("users"), 2),
            CycleOutcome::Rendered { rows: 1 }
        );
        assert_eq!(h.sink.last_target(), TargetHandle::new("users-panel"));

        h.sink.detach("users-panel");
        assert_eq!(h.controller.paginate(&id("users"), 1), CycleOutcome::Detached);
        assert_eq!(h.sink.count(), 2);
        assert!(h.controller.instances().is_empty());
    }

    #[test]
    fn test_reload_all_visits_every_instance() {
        let mut h = harness();
        h.transport.push(Ok(page_payload(1, 2, &["Ada"])));
        h.transport.push(Ok(page_payload(1, 2, &["Bob"])));
        h.controller.bind(id("a"), users_config());
        h.controller.bind(id("b"), users_config());

        h.transport.push(Ok(page_payload(1, 2, &["Ada"])));
        h.transport.push(Ok(page_payload(1, 2, &["Bo"])));
        let outcomes = h.controller.reload_all();
        assert_eq!(
            outcomes,
            vec![
                (id("a"), CycleOutcome::Unchanged),
                (id("b"), CycleOutcome::Rendered { rows: 1 }),
            ]
        );
    }
}
