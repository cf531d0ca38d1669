// UI rendering
//
// Layout, top to bottom:
// - Tabs: one per bound instance, with load status
// - Body: the instance's table, list or select
// - Pagination bar and summary
// - Logs panel (toggled with L)
// - Search line or key help

use super::app::{App, Mode, TabStatus};
use crate::config::WidgetKind;
use crate::logging::{LogEntry, LogLevel};
use crate::pagination::{PageButton, PaginationControl};
use crate::table::render::{HeaderColumn, RenderRow};
use crate::table::sink::header_label;
use crate::table::RenderInstruction;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, List, ListItem, Paragraph, Row, Table, Tabs},
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Widest a single column may grow before truncation
const MAX_COLUMN_WIDTH: usize = 40;

/// Log lines shown in the logs panel
const LOG_PANEL_HEIGHT: u16 = 8;

const ACCENT: Color = Color::Cyan;
const DIM: Color = Color::DarkGray;

/// Draw the whole screen
pub fn draw(f: &mut Frame, app: &App) {
    let log_height = if app.show_logs { LOG_PANEL_HEIGHT + 2 } else { 0 };
    let chunks = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(3),
        Constraint::Length(2),
        Constraint::Length(log_height),
        Constraint::Length(1),
    ])
    .split(f.area());

    draw_tabs(f, app, chunks[0]);

    let view = app.current_view();
    match &view {
        Some(instruction) => draw_body(f, instruction, chunks[1]),
        None => draw_placeholder(f, app, chunks[1]),
    }
    if let Some(instruction) = &view {
        draw_footer(f, instruction, chunks[2]);
    }

    if app.show_logs {
        draw_logs(f, &app.log_buffer.recent(LOG_PANEL_HEIGHT as usize), chunks[3]);
    }

    draw_status_line(f, app, chunks[4]);
}

fn draw_tabs(f: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = app
        .tabs
        .iter()
        .map(|tab| {
            let marker = match &tab.status {
                TabStatus::Loading => Span::styled(" ⟳", Style::default().fg(Color::Yellow)),
                TabStatus::Ready => Span::raw(""),
                TabStatus::Problem(_) => Span::styled(" !", Style::default().fg(Color::Red)),
            };
            Line::from(vec![
                Span::raw(format!("{} ({})", tab.id, tab.kind.as_str())),
                marker,
            ])
        })
        .collect();

    let tabs = Tabs::new(titles)
        .select(app.selected)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" jsontable "),
        )
        .highlight_style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD));

    f.render_widget(tabs, area);
}

fn draw_placeholder(f: &mut Frame, app: &App, area: Rect) {
    let text = match app.current_tab() {
        None => "No tables bound. Add [tables.X] sections to the config file.".to_string(),
        Some(tab) => match &tab.status {
            TabStatus::Problem(message) => format!("{}: {}", tab.id, message),
            _ => format!("Loading {}…", tab.id),
        },
    };

    let paragraph = Paragraph::new(text)
        .style(Style::default().fg(DIM))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(paragraph, area);
}

fn draw_body(f: &mut Frame, instruction: &RenderInstruction, area: Rect) {
    let block = Block::default().borders(Borders::ALL);

    match instruction.kind {
        WidgetKind::Table => {
            let widths = column_widths(&instruction.header_columns, &instruction.rows);
            let header = header_row(&instruction.header_columns, &widths);
            let mut rows: Vec<Row> = instruction
                .rows
                .iter()
                .map(|row| {
                    Row::new(
                        row.cells
                            .iter()
                            .zip(&widths)
                            .map(|(cell, width)| Cell::from(truncate(cell, *width))),
                    )
                })
                .collect();
            if let Some(footer) = &instruction.footer {
                rows.push(header_row(footer, &widths).style(Style::default().fg(DIM)));
            }

            let constraints = widths.iter().map(|w| Constraint::Length(*w as u16));
            let table = Table::new(rows, constraints)
                .header(header.style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)))
                .column_spacing(2)
                .block(block);
            f.render_widget(table, area);
        }
        WidgetKind::List => {
            let items: Vec<ListItem> = instruction
                .rows
                .iter()
                .map(|row| ListItem::new(format!("• {}", row.cells.join(" · "))))
                .collect();
            f.render_widget(List::new(items).block(block), area);
        }
        WidgetKind::Select => {
            let items: Vec<ListItem> = instruction
                .rows
                .iter()
                .map(|row| {
                    let (mark, style) = if row.selected {
                        ("(•)", Style::default().fg(ACCENT).add_modifier(Modifier::BOLD))
                    } else {
                        ("( )", Style::default())
                    };
                    ListItem::new(format!("{} {}", mark, row.cells.join(" "))).style(style)
                })
                .collect();
            f.render_widget(List::new(items).block(block), area);
        }
    }
}

fn header_row<'a>(columns: &[HeaderColumn], widths: &[usize]) -> Row<'a> {
    Row::new(
        columns
            .iter()
            .zip(widths)
            .enumerate()
            .map(|(i, (column, width))| {
                let label = header_label(column);
                // Sortable headers get their key hint
                let label = match column.sort_key {
                    Some(_) => match sortable_position(columns, i) {
                        Some(n) if n <= 9 => format!("{}:{}", n, label),
                        _ => label,
                    },
                    None => label,
                };
                Cell::from(truncate(&label, *width))
            }),
    )
}

/// 1-based position of column `index` among the sortable columns
fn sortable_position(columns: &[HeaderColumn], index: usize) -> Option<usize> {
    let n = columns[..=index]
        .iter()
        .filter(|c| c.sort_key.is_some())
        .count();
    (n > 0).then_some(n)
}

/// Column widths from header and cell content, capped
pub fn column_widths(header: &[HeaderColumn], rows: &[RenderRow]) -> Vec<usize> {
    let mut widths: Vec<usize> = header
        .iter()
        .map(|c| header_label(c).width() + if c.sort_key.is_some() { 2 } else { 0 })
        .collect();
    for row in rows {
        for (i, cell) in row.cells.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.width());
            }
        }
    }
    widths
        .into_iter()
        .map(|w| w.clamp(1, MAX_COLUMN_WIDTH))
        .collect()
}

/// Cut `text` to `width` display columns, ending in `…` when cut
pub fn truncate(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }

    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

fn pagination_spans(control: &PaginationControl) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    for button in &control.buttons {
        let span = match *button {
            PageButton::Previous { enabled, .. } => edge_span("«", enabled),
            PageButton::Next { enabled, .. } => edge_span("»", enabled),
            PageButton::Page { index, active: true } => Span::styled(
                format!("[{}]", index),
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
            ),
            PageButton::Page { index, .. } => Span::raw(index.to_string()),
            PageButton::Ellipsis => Span::styled("…", Style::default().fg(DIM)),
        };
        spans.push(span);
        spans.push(Span::raw(" "));
    }
    spans
}

fn edge_span(symbol: &'static str, enabled: bool) -> Span<'static> {
    if enabled {
        Span::raw(symbol)
    } else {
        Span::styled(symbol, Style::default().fg(DIM))
    }
}

fn draw_footer(f: &mut Frame, instruction: &RenderInstruction, area: Rect) {
    let mut lines = Vec::new();
    if !instruction.pagination.is_empty() {
        lines.push(Line::from(pagination_spans(&instruction.pagination)));
    }
    if !instruction.summary.is_empty() {
        lines.push(Line::from(Span::styled(
            instruction.summary.clone(),
            Style::default().fg(DIM),
        )));
    }
    f.render_widget(Paragraph::new(lines), area);
}

fn level_style(level: LogLevel) -> Style {
    match level {
        LogLevel::Error => Style::default().fg(Color::Red),
        LogLevel::Warn => Style::default().fg(Color::Yellow),
        LogLevel::Info => Style::default(),
        LogLevel::Debug | LogLevel::Trace => Style::default().fg(DIM),
    }
}

fn draw_logs(f: &mut Frame, entries: &[LogEntry], area: Rect) {
    let items: Vec<ListItem> = entries
        .iter()
        .map(|entry| {
            ListItem::new(format!(
                "{} {:5} {}",
                entry.timestamp.format("%H:%M:%S"),
                entry.level.as_str(),
                entry.message
            ))
            .style(level_style(entry.level))
        })
        .collect();

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(" Logs "));
    f.render_widget(list, area);
}

fn draw_status_line(f: &mut Frame, app: &App, area: Rect) {
    let line = match &app.mode {
        Mode::Search(text) => Line::from(vec![
            Span::styled("Search: ", Style::default().fg(ACCENT)),
            Span::raw(text.clone()),
            Span::styled("▏", Style::default().fg(ACCENT)),
        ]),
        Mode::Normal => Line::from(Span::styled(
            "q quit · Tab switch · ←/→ page · Home/End · 1-9 sort · / search · r refresh · R reload · a reload all · x close · L logs",
            Style::default().fg(DIM),
        )),
    };
    f.render_widget(Paragraph::new(line), area);
}
