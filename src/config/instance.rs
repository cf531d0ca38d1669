//! Per-instance configuration: ajax, pagination defaults, table and select options
//!
//! Every bound widget resolves its options in three layers:
//! built-in defaults → `[defaults]` section → its own `[tables.X]` /
//! `[selects.X]` section. Each layer only overrides the keys it sets.

use crate::pagination::{PaginationState, SortOrder, WindowSettings};
use crate::table::payload::ResponseMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Widget kind
// ─────────────────────────────────────────────────────────────────────────────

/// What an instance renders as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WidgetKind {
    #[default]
    Table,
    List,
    Select,
}

impl WidgetKind {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "list" => Self::List,
            "select" => Self::Select,
            _ => Self::Table,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::List => "list",
            Self::Select => "select",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Ajax
// ─────────────────────────────────────────────────────────────────────────────

/// How and how often an instance fetches its data
#[derive(Debug, Clone, PartialEq)]
pub struct AjaxOptions {
    /// Endpoint; required unless data is supplied directly
    pub url: Option<String>,
    /// Joins the url and the pagination query (`&` when the url already has `?`)
    pub url_delimiter: String,
    pub timeout_ms: u64,
    /// Minutes between scheduled reloads; `None` disables polling
    pub reload_delay_minutes: Option<u32>,
    /// UI waits for the refresh cycle to finish before handling more input
    pub synchronous: bool,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Extra request headers
    pub headers: BTreeMap<String, String>,
    pub log_errors: bool,
}

impl Default for AjaxOptions {
    fn default() -> Self {
        Self {
            url: None,
            url_delimiter: "&".to_string(),
            timeout_ms: 30_000,
            reload_delay_minutes: Some(10),
            synchronous: true,
            max_retries: 10,
            retry_delay_ms: 1_000,
            headers: BTreeMap::new(),
            log_errors: true,
        }
    }
}

impl AjaxOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// `[*.ajax]` as loaded from the config file
#[derive(Debug, Deserialize, Default, Clone)]
pub struct FileAjax {
    pub url: Option<String>,
    pub url_delimiter: Option<String>,
    pub timeout_ms: Option<u64>,
    /// 0 disables scheduled reloads
    pub reload_delay_minutes: Option<u32>,
    pub synchronous: Option<bool>,
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub headers: Option<BTreeMap<String, String>>,
    pub log_errors: Option<bool>,
}

impl FileAjax {
    fn apply(self, base: AjaxOptions) -> AjaxOptions {
        let mut headers = base.headers;
        headers.extend(self.headers.unwrap_or_default());

        AjaxOptions {
            url: self.url.or(base.url),
            url_delimiter: self.url_delimiter.unwrap_or(base.url_delimiter),
            timeout_ms: self.timeout_ms.unwrap_or(base.timeout_ms),
            reload_delay_minutes: match self.reload_delay_minutes {
                Some(0) => None,
                Some(minutes) => Some(minutes),
                None => base.reload_delay_minutes,
            },
            synchronous: self.synchronous.unwrap_or(base.synchronous),
            max_retries: self.max_retries.unwrap_or(base.max_retries),
            retry_delay_ms: self.retry_delay_ms.unwrap_or(base.retry_delay_ms),
            headers,
            log_errors: self.log_errors.unwrap_or(base.log_errors),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pagination defaults
// ─────────────────────────────────────────────────────────────────────────────

/// `[*.pagination]` as loaded from the config file
#[derive(Debug, Deserialize, Default, Clone)]
pub struct FilePagination {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub order: Option<String>,
    pub order_by: Option<String>,
    pub like: Option<String>,
}

impl FilePagination {
    fn apply(self, base: PaginationState) -> PaginationState {
        PaginationState {
            page: self.page.unwrap_or(base.page),
            limit: self.limit.unwrap_or(base.limit),
            order: self
                .order
                .map(|s| SortOrder::from_str(&s))
                .unwrap_or(base.order),
            order_by: self.order_by.unwrap_or(base.order_by),
            like: self.like.unwrap_or(base.like),
        }
        .normalized()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Table options
// ─────────────────────────────────────────────────────────────────────────────

/// An explicit column: which field to show and under what title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub field: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Sort key sent as `order_by`; defaults to `field`
    #[serde(default)]
    pub sort_key: Option<String>,
}

impl ColumnSpec {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            title: None,
            sort_key: None,
        }
    }
}

/// A per-row action shown in the actions column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub action: String,
    pub text: String,
    #[serde(default)]
    pub icon: Option<String>,
}

/// Rendering options for table and list instances
#[derive(Debug, Clone, PartialEq)]
pub struct TableOptions {
    /// Explicit columns; empty means introspect the first row
    pub columns: Vec<ColumnSpec>,
    /// Fields never shown
    pub except: Vec<String>,
    pub actions: Vec<ActionSpec>,
    pub show_numbers: bool,
    pub show_actions: bool,
    pub pagination_enabled: bool,
    pub search_enabled: bool,
    /// Persist pagination state between runs
    pub persist_history: bool,
    /// Headers act as sort controls
    pub header_order: bool,
    /// Repeat the header below the rows
    pub footer: bool,
    /// Prefix for the pagination history key
    pub prefix: String,
    /// Skip rendering when the payload equals the previous one
    pub prevent_rerender: bool,
    pub num_text: String,
    pub actions_text: String,
    /// Summary template; `#showing#` and `#total#` are substituted
    pub showing_text: String,
    pub showing_none_text: String,
    pub response_mode: ResponseMode,
    pub window: WindowSettings,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            except: Vec::new(),
            actions: Vec::new(),
            show_numbers: true,
            show_actions: true,
            pagination_enabled: true,
            search_enabled: true,
            persist_history: true,
            header_order: true,
            footer: true,
            prefix: String::new(),
            prevent_rerender: true,
            num_text: "Num".to_string(),
            actions_text: "Actions".to_string(),
            showing_text: "Showing #showing# of #total# items.".to_string(),
            showing_none_text: "There are no results.".to_string(),
            response_mode: ResponseMode::Paged,
            window: WindowSettings::default(),
        }
    }
}

impl TableOptions {
    /// Whether a field is excluded from display
    pub fn is_excluded(&self, field: &str) -> bool {
        self.except.iter().any(|e| e == field)
    }
}

/// `[*.table]` as loaded from the config file
#[derive(Debug, Deserialize, Default, Clone)]
pub struct FileTable {
    pub columns: Option<Vec<ColumnSpec>>,
    pub except: Option<Vec<String>>,
    pub actions: Option<Vec<ActionSpec>>,
    pub show_numbers: Option<bool>,
    pub show_actions: Option<bool>,
    pub pagination_enabled: Option<bool>,
    pub search_enabled: Option<bool>,
    pub persist_history: Option<bool>,
    pub header_order: Option<bool>,
    pub footer: Option<bool>,
    pub prefix: Option<String>,
    pub prevent_rerender: Option<bool>,
    pub num_text: Option<String>,
    pub actions_text: Option<String>,
    pub showing_text: Option<String>,
    pub showing_none_text: Option<String>,
    pub response_mode: Option<String>,
    pub max_middle: Option<u32>,
    pub early_ellipsis_threshold: Option<u32>,
    pub late_ellipsis_gap: Option<u32>,
}

impl FileTable {
    fn apply(self, base: TableOptions) -> TableOptions {
        TableOptions {
            columns: self.columns.unwrap_or(base.columns),
            except: self.except.unwrap_or(base.except),
            actions: self.actions.unwrap_or(base.actions),
            show_numbers: self.show_numbers.unwrap_or(base.show_numbers),
            show_actions: self.show_actions.unwrap_or(base.show_actions),
            pagination_enabled: self.pagination_enabled.unwrap_or(base.pagination_enabled),
            search_enabled: self.search_enabled.unwrap_or(base.search_enabled),
            persist_history: self.persist_history.unwrap_or(base.persist_history),
            header_order: self.header_order.unwrap_or(base.header_order),
            footer: self.footer.unwrap_or(base.footer),
            prefix: self.prefix.unwrap_or(base.prefix),
            prevent_rerender: self.prevent_rerender.unwrap_or(base.prevent_rerender),
            num_text: self.num_text.unwrap_or(base.num_text),
            actions_text: self.actions_text.unwrap_or(base.actions_text),
            showing_text: self.showing_text.unwrap_or(base.showing_text),
            showing_none_text: self.showing_none_text.unwrap_or(base.showing_none_text),
            response_mode: self
                .response_mode
                .map(|s| ResponseMode::from_str(&s))
                .unwrap_or(base.response_mode),
            window: WindowSettings {
                max_middle: self.max_middle.unwrap_or(base.window.max_middle),
                early_ellipsis_threshold: self
                    .early_ellipsis_threshold
                    .unwrap_or(base.window.early_ellipsis_threshold),
                late_ellipsis_gap: self
                    .late_ellipsis_gap
                    .unwrap_or(base.window.late_ellipsis_gap),
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Select options
// ─────────────────────────────────────────────────────────────────────────────

/// Options for select instances
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOptions {
    /// Field used as the option value
    pub value_field: String,
    /// Field used as the option label
    pub label_field: String,
    /// Value to pre-select
    pub selected_value: Option<String>,
    /// Placeholder entry rendered before the fetched options
    pub default_option: Option<String>,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            value_field: "id".to_string(),
            label_field: "name".to_string(),
            selected_value: None,
            default_option: None,
        }
    }
}

/// `[selects.X]` option keys as loaded from the config file
#[derive(Debug, Deserialize, Default, Clone)]
pub struct FileSelect {
    pub value_field: Option<String>,
    pub label_field: Option<String>,
    pub selected_value: Option<String>,
    pub default_option: Option<String>,
}

impl FileSelect {
    fn apply(self, base: SelectOptions) -> SelectOptions {
        SelectOptions {
            value_field: self.value_field.unwrap_or(base.value_field),
            label_field: self.label_field.unwrap_or(base.label_field),
            selected_value: self.selected_value.or(base.selected_value),
            default_option: self.default_option.or(base.default_option),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Instance
// ─────────────────────────────────────────────────────────────────────────────

/// Fully resolved options for one instance
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InstanceConfig {
    pub kind: WidgetKind,
    pub ajax: AjaxOptions,
    /// Starting pagination state (replaced by stored history when enabled)
    pub pagination: PaginationState,
    pub table: TableOptions,
    pub select: SelectOptions,
}

impl InstanceConfig {
    /// Key under which pagination history is stored
    pub fn history_key(&self, id: &str) -> String {
        format!("{}{}_pagination", self.table.prefix, id)
    }
}

/// One `[defaults]`, `[tables.X]` or `[selects.X]` section
#[derive(Debug, Deserialize, Default, Clone)]
pub struct FileInstance {
    pub kind: Option<String>,
    pub ajax: Option<FileAjax>,
    pub pagination: Option<FilePagination>,
    pub table: Option<FileTable>,
    pub select: Option<FileSelect>,
    /// Shorthand for `ajax.url`
    pub url: Option<String>,
}

impl FileInstance {
    /// Layer this section over `base`
    pub fn apply(self, base: InstanceConfig) -> InstanceConfig {
        let mut ajax = self.ajax.unwrap_or_default();
        if ajax.url.is_none() {
            ajax.url = self.url;
        }

        InstanceConfig {
            kind: self
                .kind
                .map(|s| WidgetKind::from_str(&s))
                .unwrap_or(base.kind),
            ajax: ajax.apply(base.ajax),
            pagination: self
                .pagination
                .unwrap_or_default()
                .apply(base.pagination),
            table: self.table.unwrap_or_default().apply(base.table),
            select: self.select.unwrap_or_default().apply(base.select),
        }
    }
}
