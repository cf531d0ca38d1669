//! Render sinks: where render instructions end up

use super::instance::{InstanceId, TargetHandle};
use super::render::{HeaderColumn, RenderInstruction, RenderRow};
use crate::config::WidgetKind;
use crate::pagination::{PageButton, PaginationControl, SortOrder};
use std::collections::HashSet;
use unicode_width::UnicodeWidthStr;

/// Materializes render instructions and knows which targets still exist
pub trait RenderSink: Send {
    fn render(&mut self, target: &TargetHandle, instruction: RenderInstruction);

    /// Whether the render target is still present
    fn is_attached(&self, target: &TargetHandle) -> bool;
}

/// Headless sink printing plain-text tables to stdout
///
/// Every instance is attached until [`LogSink::detach`] is called.
#[derive(Debug, Default)]
pub struct LogSink {
    detached: HashSet<InstanceId>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detach(&mut self, id: &InstanceId) {
        self.detached.insert(id.clone());
    }
}

impl RenderSink for LogSink {
    fn render(&mut self, target: &TargetHandle, instruction: RenderInstruction) {
        tracing::debug!("Rendering {} ({} rows)", target, instruction.rows.len());
        println!("{}", format_instruction(&target.region, &instruction));
    }

    fn is_attached(&self, target: &TargetHandle) -> bool {
        !self.detached.contains(&target.region)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plain-text formatting
// ─────────────────────────────────────────────────────────────────────────────

/// Header title with its sort marker
pub fn header_label(column: &HeaderColumn) -> String {
    match column.order {
        Some(SortOrder::Asc) => format!("{} ▲", column.title),
        Some(SortOrder::Desc) => format!("{} ▼", column.title),
        None => column.title.clone(),
    }
}

/// One-line pagination bar, e.g. `‹ 1 … 12 13 [14] 15 ›`
pub fn pagination_line(control: &PaginationControl) -> String {
    control
        .buttons
        .iter()
        .map(|button| match button {
            PageButton::Previous { enabled: true, .. } => "‹".to_string(),
            PageButton::Previous { enabled: false, .. } => "·".to_string(),
            PageButton::Page { index, active: true } => format!("[{}]", index),
            PageButton::Page { index, .. } => index.to_string(),
            PageButton::Ellipsis => "…".to_string(),
            PageButton::Next { enabled: true, .. } => "›".to_string(),
            PageButton::Next { enabled: false, .. } => "·".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn pad(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(text.width());
    format!("{}{}", text, " ".repeat(fill))
}

fn table_lines(header: &[HeaderColumn], rows: &[RenderRow], footer: bool) -> Vec<String> {
    let labels: Vec<String> = header.iter().map(header_label).collect();
    let mut widths: Vec<usize> = labels.iter().map(|l| l.width()).collect();
    for row in rows {
        for (i, cell) in row.cells.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.width());
            }
        }
    }

    let join = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| pad(cell, *width))
            .collect::<Vec<_>>()
            .join(" │ ")
            .trim_end()
            .to_string()
    };
    let rule = widths
        .iter()
        .map(|w| "─".repeat(*w))
        .collect::<Vec<_>>()
        .join("─┼─");

    let mut lines = vec![join(&labels), rule.clone()];
    lines.extend(rows.iter().map(|row| join(&row.cells)));
    if footer {
        lines.push(rule);
        lines.push(join(&labels));
    }
    lines
}

/// Render an instruction as plain text
pub fn format_instruction(id: &InstanceId, instruction: &RenderInstruction) -> String {
    let mut lines = vec![format!("── {} ({}) ──", id, instruction.kind.as_str())];

    match instruction.kind {
        WidgetKind::Table => {
            if !instruction.header_columns.is_empty() {
                lines.extend(table_lines(
                    &instruction.header_columns,
                    &instruction.rows,
                    instruction.footer.is_some(),
                ));
            }
        }
        WidgetKind::List => {
            lines.extend(
                instruction
                    .rows
                    .iter()
                    .map(|row| format!("• {}", row.cells.join(" · "))),
            );
        }
        WidgetKind::Select => {
            lines.extend(instruction.rows.iter().map(|row| {
                let mark = if row.selected { "(•)" } else { "( )" };
                format!("{} {}", mark, row.cells.join(" "))
            }));
        }
    }

    if !instruction.pagination.is_empty() {
        lines.push(pagination_line(&instruction.pagination));
    }
    if !instruction.summary.is_empty() {
        lines.push(instruction.summary.clone());
    }

    lines.join("\n")
}
