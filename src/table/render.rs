//! Render instructions and the collection renderer
//!
//! Tables, selects and lists share one renderer. What differs is how a
//! result item becomes a row, captured by the [`ItemMapper`] strategy:
//!
//! - [`TableRowMapper`]: numbered rows, field cells, actions column
//! - [`SelectOptionMapper`]: one option per item, optional placeholder
//! - [`ListEntryMapper`]: one entry per item from its visible fields
//!
//! The output is a [`RenderInstruction`], a markup-free model the sink
//! materializes however it likes.

use crate::config::{ActionSpec, SelectOptions, TableOptions, WidgetKind};
use crate::pagination::{PaginationControl, PaginationState, SortOrder};
use serde_json::Value;
use std::collections::HashMap;

/// What a header cell stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    /// Running row number
    Number,
    /// A field of the result item
    Field,
    /// Per-row actions
    Actions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderColumn {
    pub role: ColumnRole,
    /// Field name for `Field` columns
    pub key: String,
    pub title: String,
    /// `order_by` value when the header is a sort control
    pub sort_key: Option<String>,
    /// Direction marker currently shown on the header
    pub order: Option<SortOrder>,
}

impl HeaderColumn {
    fn synthetic(role: ColumnRole, title: &str) -> Self {
        Self {
            role,
            key: String::new(),
            title: title.to_string(),
            sort_key: None,
            order: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderRow {
    /// Item identity (`id` field, or the option value)
    pub key: Option<String>,
    pub cells: Vec<String>,
    pub actions: Vec<ActionSpec>,
    /// Pre-selected option (selects only)
    pub selected: bool,
}

/// Everything the sink needs to draw one instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderInstruction {
    pub kind: WidgetKind,
    pub header_columns: Vec<HeaderColumn>,
    pub rows: Vec<RenderRow>,
    /// Copy of the header shown below the rows
    pub footer: Option<Vec<HeaderColumn>>,
    pub pagination: PaginationControl,
    pub summary: String,
}

impl RenderInstruction {
    /// Header columns that can be clicked to sort
    pub fn sortable_columns(&self) -> impl Iterator<Item = &HeaderColumn> {
        self.header_columns.iter().filter(|c| c.sort_key.is_some())
    }
}

/// Maps result items to rows for one widget kind
pub trait ItemMapper {
    /// Header columns for this result set
    fn header(&self, results: &[Value]) -> Vec<HeaderColumn>;

    /// Rows rendered before the mapped items
    fn leading_rows(&self) -> Vec<RenderRow> {
        Vec::new()
    }

    /// Map one result item
    fn map_item(&self, index: usize, item: &Value, header: &[HeaderColumn]) -> RenderRow;
}

/// Header and rows produced by a renderer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderedCollection {
    pub header: Vec<HeaderColumn>,
    pub rows: Vec<RenderRow>,
}

/// Generic renderer parameterized by an item mapping strategy
pub struct CollectionRenderer<M> {
    mapper: M,
}

impl<M: ItemMapper> CollectionRenderer<M> {
    pub fn new(mapper: M) -> Self {
        Self { mapper }
    }

    pub fn render(&self, results: &[Value]) -> RenderedCollection {
        let header = self.mapper.header(results);
        let mut rows = self.mapper.leading_rows();
        rows.extend(
            results
                .iter()
                .enumerate()
                .map(|(index, item)| self.mapper.map_item(index, item, &header)),
        );

        RenderedCollection { header, rows }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cell helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Display text for a JSON value
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Header title derived from a field name
pub fn field_title(field: &str) -> String {
    field.replace('_', " ")
}

fn item_key(item: &Value, field: &str) -> Option<String> {
    item.get(field)
        .filter(|v| !v.is_null())
        .map(cell_text)
}

/// Summary line under the table
///
/// Uses `showing_text` when the server reports a current page, otherwise
/// the no-results text.
pub fn summary_text(options: &TableOptions, shown: usize, total: u64, has_page: bool) -> String {
    if has_page {
        options
            .showing_text
            .replace("#showing#", &shown.to_string())
            .replace("#total#", &total.to_string())
    } else {
        options.showing_none_text.clone()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Table rows
// ─────────────────────────────────────────────────────────────────────────────

pub struct TableRowMapper<'a> {
    pub options: &'a TableOptions,
    pub state: &'a PaginationState,
    pub sort_markers: &'a HashMap<String, SortOrder>,
}

impl<'a> TableRowMapper<'a> {
    fn field_column(&self, field: &str, title: Option<&str>, sort_key: Option<&str>) -> HeaderColumn {
        let sort_key = self
            .options
            .header_order
            .then(|| sort_key.unwrap_or(field).to_string());
        let order = sort_key
            .as_ref()
            .and_then(|key| self.sort_markers.get(key).copied());

        HeaderColumn {
            role: ColumnRole::Field,
            key: field.to_string(),
            title: title.map(str::to_string).unwrap_or_else(|| field_title(field)),
            sort_key,
            order,
        }
    }
}

impl ItemMapper for TableRowMapper<'_> {
    fn header(&self, results: &[Value]) -> Vec<HeaderColumn> {
        let Some(first) = results.first() else {
            return Vec::new();
        };

        let mut header = Vec::new();
        if self.options.show_numbers {
            header.push(HeaderColumn::synthetic(
                ColumnRole::Number,
                &self.options.num_text,
            ));
        }

        if !self.options.columns.is_empty() {
            for column in &self.options.columns {
                if !self.options.is_excluded(&column.field) {
                    header.push(self.field_column(
                        &column.field,
                        column.title.as_deref(),
                        column.sort_key.as_deref(),
                    ));
                }
            }
        } else if let Some(object) = first.as_object() {
            for field in object.keys() {
                if !self.options.is_excluded(field) {
                    header.push(self.field_column(field, None, None));
                }
            }
        } else {
            // Scalar rows: a single unnamed column holding the item itself
            header.push(HeaderColumn::synthetic(ColumnRole::Field, "Value"));
        }

        if self.options.show_actions && !self.options.actions.is_empty() {
            header.push(HeaderColumn::synthetic(
                ColumnRole::Actions,
                &self.options.actions_text,
            ));
        }

        header
    }

    fn map_item(&self, index: usize, item: &Value, header: &[HeaderColumn]) -> RenderRow {
        let number = self.state.first_row_number() + index as u64;
        let mut actions = Vec::new();

        let cells = header
            .iter()
            .map(|column| match column.role {
                ColumnRole::Number => format!("#{}", number),
                ColumnRole::Field if column.key.is_empty() => cell_text(item),
                ColumnRole::Field => item.get(&column.key).map(cell_text).unwrap_or_default(),
                ColumnRole::Actions => {
                    actions = self.options.actions.clone();
                    actions
                        .iter()
                        .map(|a| a.text.as_str())
                        .collect::<Vec<_>>()
                        .join(" · ")
                }
            })
            .collect();

        RenderRow {
            key: item_key(item, "id"),
            cells,
            actions,
            selected: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Select options
// ─────────────────────────────────────────────────────────────────────────────

pub struct SelectOptionMapper<'a> {
    pub options: &'a SelectOptions,
}

impl ItemMapper for SelectOptionMapper<'_> {
    fn header(&self, _results: &[Value]) -> Vec<HeaderColumn> {
        Vec::new()
    }

    fn leading_rows(&self) -> Vec<RenderRow> {
        self.options
            .default_option
            .iter()
            .map(|label| RenderRow {
                key: None,
                cells: vec![label.clone()],
                actions: Vec::new(),
                selected: false,
            })
            .collect()
    }

    fn map_item(&self, _index: usize, item: &Value, _header: &[HeaderColumn]) -> RenderRow {
        let value = item_key(item, &self.options.value_field).unwrap_or_else(|| cell_text(item));
        let label = item_key(item, &self.options.label_field).unwrap_or_else(|| value.clone());
        let selected = self.options.selected_value.as_deref() == Some(value.as_str());

        RenderRow {
            key: Some(value),
            cells: vec![label],
            actions: Vec::new(),
            selected,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// List entries
// ─────────────────────────────────────────────────────────────────────────────

pub struct ListEntryMapper<'a> {
    pub options: &'a TableOptions,
}

impl ItemMapper for ListEntryMapper<'_> {
    fn header(&self, _results: &[Value]) -> Vec<HeaderColumn> {
        Vec::new()
    }

    fn map_item(&self, _index: usize, item: &Value, _header: &[HeaderColumn]) -> RenderRow {
        let cells = match item.as_object() {
            Some(object) => object
                .iter()
                .filter(|(field, _)| !self.options.is_excluded(field))
                .map(|(_, value)| cell_text(value))
                .collect(),
            None => vec![cell_text(item)],
        };

        RenderRow {
            key: item_key(item, "id"),
            cells,
            actions: Vec::new(),
            selected: false,
        }
    }
}
