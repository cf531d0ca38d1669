// TUI application state
//
// One tab per bound instance. The app turns intents into requests for the
// refresh worker; the worker's renders arrive through SharedViews.

use super::input::{InputHandler, Intent};
use super::sink::SharedViews;
use crate::config::{InstanceConfig, WidgetKind};
use crate::logging::LogBuffer;
use crate::table::worker::Outcomes;
use crate::table::{CycleOutcome, InstanceId, RenderInstruction, TableAction};

/// Load state shown next to a tab title
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabStatus {
    Loading,
    Ready,
    /// Last cycle failed; previous content (if any) stays on screen
    Problem(String),
}

#[derive(Debug, Clone)]
pub struct Tab {
    pub id: InstanceId,
    pub kind: WidgetKind,
    /// Wait for each cycle before handling more input
    pub synchronous: bool,
    pub searchable: bool,
    pub status: TabStatus,
}

impl Tab {
    pub fn new(id: InstanceId, config: &InstanceConfig) -> Self {
        Self {
            id,
            kind: config.kind,
            synchronous: config.ajax.synchronous,
            searchable: config.kind == WidgetKind::Table && config.table.search_enabled,
            status: TabStatus::Loading,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Normal,
    /// Search line open with the text typed so far
    Search(String),
}

/// Work the event loop hands to the refresh worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Act {
        id: InstanceId,
        action: TableAction,
        wait: bool,
    },
    /// Reload one instance, or all when `None`
    Reload(Option<InstanceId>),
}

pub struct App {
    pub tabs: Vec<Tab>,
    pub selected: usize,
    pub mode: Mode,
    pub show_logs: bool,
    pub should_quit: bool,
    pub views: SharedViews,
    pub log_buffer: LogBuffer,
    pub input: InputHandler,
}

impl App {
    pub fn new(views: SharedViews, log_buffer: LogBuffer) -> Self {
        Self {
            tabs: Vec::new(),
            selected: 0,
            mode: Mode::Normal,
            show_logs: false,
            should_quit: false,
            views,
            log_buffer,
            input: InputHandler::default(),
        }
    }

    pub fn add_tab(&mut self, tab: Tab) {
        self.tabs.push(tab);
    }

    pub fn current_tab(&self) -> Option<&Tab> {
        self.tabs.get(self.selected)
    }

    /// Latest render of the selected tab
    pub fn current_view(&self) -> Option<RenderInstruction> {
        self.current_tab().and_then(|tab| self.views.latest(&tab.id))
    }

    /// Whether `id` waits for its cycles
    pub fn is_synchronous(&self, id: &InstanceId) -> bool {
        self.tabs.iter().any(|t| &t.id == id && t.synchronous)
    }

    /// Fold cycle outcomes into tab statuses
    pub fn record_outcomes(&mut self, outcomes: &Outcomes) {
        for (id, outcome) in outcomes {
            let Some(tab) = self.tabs.iter_mut().find(|t| &t.id == id) else {
                continue;
            };
            tab.status = match outcome {
                CycleOutcome::Rendered { .. } | CycleOutcome::Unchanged | CycleOutcome::Empty => {
                    TabStatus::Ready
                }
                CycleOutcome::Abandoned { attempts } => {
                    TabStatus::Problem(format!("timed out after {} attempts", attempts))
                }
                CycleOutcome::Failed(message) => TabStatus::Problem(message.clone()),
                CycleOutcome::Misconfigured => TabStatus::Problem("no url configured".to_string()),
                CycleOutcome::UnknownInstance | CycleOutcome::Detached => continue,
            };
        }
    }

    /// Apply an intent; returns work for the refresh worker, if any
    pub fn handle_intent(&mut self, intent: Intent) -> Option<Request> {
        match intent {
            Intent::Quit => {
                self.should_quit = true;
                None
            }
            Intent::NextTab => {
                if !self.tabs.is_empty() {
                    self.selected = (self.selected + 1) % self.tabs.len();
                }
                None
            }
            Intent::PrevTab => {
                if !self.tabs.is_empty() {
                    self.selected = (self.selected + self.tabs.len() - 1) % self.tabs.len();
                }
                None
            }
            Intent::ToggleLogs => {
                self.show_logs = !self.show_logs;
                None
            }
            Intent::CloseTab => {
                self.close_current();
                None
            }
            Intent::StartSearch => {
                if self.current_tab().is_some_and(|t| t.searchable) {
                    self.mode = Mode::Search(String::new());
                }
                None
            }
            Intent::SearchChar(c) => {
                if let Mode::Search(text) = &mut self.mode {
                    text.push(c);
                }
                None
            }
            Intent::SearchBackspace => {
                if let Mode::Search(text) = &mut self.mode {
                    text.pop();
                }
                None
            }
            Intent::CancelSearch => {
                self.mode = Mode::Normal;
                None
            }
            Intent::SubmitSearch => {
                let Mode::Search(term) = std::mem::replace(&mut self.mode, Mode::Normal) else {
                    return None;
                };
                self.act(TableAction::Search(term))
            }
            Intent::Refresh => self.act(TableAction::Refresh),
            Intent::Reload => self
                .current_tab()
                .map(|tab| Request::Reload(Some(tab.id.clone()))),
            Intent::ReloadAll => Some(Request::Reload(None)),
            Intent::PrevPage => {
                let target = self.current_view()?.pagination.previous_target()?;
                self.act(TableAction::GoToPage(target))
            }
            Intent::NextPage => {
                let target = self.current_view()?.pagination.next_target()?;
                self.act(TableAction::GoToPage(target))
            }
            Intent::FirstPage => {
                let view = self.current_view()?;
                let active = view.pagination.active_page()?;
                (active != 1).then_some(())?;
                self.act(TableAction::GoToPage(1))
            }
            Intent::LastPage => {
                let view = self.current_view()?;
                let last = view.pagination.last_page()?;
                (view.pagination.active_page() != Some(last)).then_some(())?;
                self.act(TableAction::GoToPage(last))
            }
            Intent::SortColumn(n) => {
                let view = self.current_view()?;
                let column = view.sortable_columns().nth(n.checked_sub(1)?)?;
                let key = column.sort_key.clone()?;
                self.act(TableAction::Sort { column: key })
            }
        }
    }

    fn act(&mut self, action: TableAction) -> Option<Request> {
        let tab = self.tabs.get_mut(self.selected)?;
        if tab.kind == WidgetKind::Select && action != TableAction::Refresh {
            return None;
        }
        tab.status = TabStatus::Loading;
        Some(Request::Act {
            id: tab.id.clone(),
            action,
            wait: tab.synchronous,
        })
    }

    /// Drop the selected tab and detach its instance
    fn close_current(&mut self) {
        if self.selected >= self.tabs.len() {
            return;
        }
        let tab = self.tabs.remove(self.selected);
        self.views.detach(&tab.id);
        tracing::info!("Closed {}", tab.id);

        if self.selected >= self.tabs.len() {
            self.selected = self.tabs.len().saturating_sub(1);
        }
    }
}
