//! Frame rendering.
//!
//! Rendering reads [`App`] and never mutates it.

use std::time::Instant;

use chrono::Local;
use dash_core::{Dimension, Status};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState, Wrap,
};

use crate::app::{App, FilterItem, Focus, NoticeLevel};
use crate::view::{
    DetailLine, EventRow, detail_lines, format_count, overview_text, session_label,
};

const TITLE: &str = "Claude Dashboard";

const HELP_TEXT: &str = "\
Navigation
  ↑/↓ j/k     Navigate events or filters
  PgUp/PgDn   Page through events
  g/G         Go to first/last event
  Tab         Switch between panels
  Esc         Cancel search / return

Commands
  /           Search mode (Enter to apply)
  n/N         Next/previous search result
  f           Focus filters panel
  r           Refresh data
  a           Toggle auto-follow
  ?           Show this help
  q           Quit

Filters
  Space       Toggle filter selection
  c           Clear all filters

Press Esc to close this help.";

const HINTS: &str = "q Quit  ? Help  / Search  r Refresh  a Auto-follow  f Filters  c Clear";

pub const fn status_color(status: Status) -> Color {
    match status {
        Status::Success => Color::Green,
        Status::Error => Color::Red,
        Status::Warning => Color::Yellow,
    }
}

const fn notice_color(level: NoticeLevel) -> Color {
    match level {
        NoticeLevel::Info => Color::Cyan,
        NoticeLevel::Warning => Color::Yellow,
        NoticeLevel::Error => Color::Red,
    }
}

fn panel(title: impl Into<Line<'static>>, focused: bool) -> Block<'static> {
    let border = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(title.into())
}

pub fn render(frame: &mut Frame<'_>, app: &App, now: Instant) {
    let search_height = u16::from(app.filters().search_active());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(search_height),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, app, now, chunks[0]);
    render_body(frame, app, chunks[1]);
    if search_height > 0 {
        render_search(frame, app, chunks[2]);
    }
    render_footer(frame, app, now, chunks[3]);

    if app.show_help() {
        render_help(frame);
    }
}

fn render_header(frame: &mut Frame<'_>, app: &App, now: Instant, area: Rect) {
    let follow = if app.auto_follow() { "on" } else { "off" };
    let spans = vec![
        Span::styled(
            format!(" {TITLE} "),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            "│ Follow: {follow} │ Polling: {} │ {}",
            app.poll_state(now).as_str(),
            Local::now().format("%H:%M:%S"),
        )),
    ];
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Blue).fg(Color::White)),
        area,
    );
}

fn render_body(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Ratio(1, 5),
            Constraint::Ratio(2, 5),
            Constraint::Ratio(2, 5),
        ])
        .split(area);
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(0)])
        .split(columns[0]);

    render_overview(frame, app, left[0]);
    render_filters(frame, app, left[1]);
    render_events(frame, app, columns[1]);
    render_details(frame, app, columns[2]);
}

fn render_overview(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let stats = &app.view().stats;
    let mut lines: Vec<Line<'_>> = overview_text(stats).lines().map(|l| Line::from(l.to_string())).collect();
    let colors = [None, Some(Color::Green), Some(Color::Red), Some(Color::Yellow)];
    for (line, color) in lines.iter_mut().zip(colors) {
        if let Some(color) = color {
            line.style = Style::default().fg(color);
        }
    }
    frame.render_widget(
        Paragraph::new(lines).block(panel("Overview", false)),
        area,
    );
}

fn render_filters(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let filters = app.filters();
    let items: Vec<ListItem<'_>> = app
        .filter_items()
        .into_iter()
        .map(|item| match item {
            FilterItem::All(dimension) => {
                let checked = filters.active_predicate(dimension).is_none();
                ListItem::new(Text::from(vec![
                    Line::styled(
                        dimension.heading(),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Line::from(format!("{} {}", checkbox(checked), dimension.all_label())),
                ]))
            }
            FilterItem::Value(dimension, value) => {
                let label = match dimension {
                    Dimension::Session => session_label(value),
                    _ => value.into(),
                };
                let checked = filters.is_selected(dimension, value);
                ListItem::new(format!("  {} {label}", checkbox(checked)))
            }
        })
        .collect();

    let focused = app.focus() == Focus::Filters;
    let list = List::new(items)
        .block(panel("Filters", focused))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut state = ListState::default();
    if focused {
        state.select(Some(app.filter_cursor()));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

const fn checkbox(checked: bool) -> &'static str {
    if checked { "[x]" } else { "[ ]" }
}

fn render_events(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let view = app.view();
    let rows: Vec<Row<'_>> = view
        .events
        .iter()
        .map(|event| {
            let row = EventRow::from_event(event);
            Row::new(vec![
                Cell::from(row.time),
                Cell::from(row.project),
                Cell::from(row.event_type),
                Cell::from(Span::styled(
                    row.status.glyph(),
                    Style::default().fg(status_color(row.status)),
                )),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(8),
        Constraint::Fill(1),
        Constraint::Fill(1),
        Constraint::Length(6),
    ];
    let header = Row::new(vec!["Time", "Project", "Type", "Status"])
        .style(Style::default().add_modifier(Modifier::BOLD));
    let title = format!(
        "Events ({} of {})",
        format_count(view.events.len() as u64),
        format_count(view.stats.total)
    );
    let table = Table::new(rows, widths)
        .header(header)
        .block(panel(title, app.focus() == Focus::Events))
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let selected = (!view.events.is_empty()).then_some(app.selected_index());
    let mut state = TableState::default().with_selected(selected);
    frame.render_stateful_widget(table, area, &mut state);
}

fn render_details(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let lines = app.selected_event().map_or_else(
        || vec![Line::styled("No event selected", Style::default().fg(Color::DarkGray))],
        |event| {
            let mut lines = Vec::new();
            for entry in detail_lines(event) {
                match entry {
                    DetailLine::Field { label, value } => lines.push(Line::from(vec![
                        Span::styled(format!("{label}: "), Style::default().add_modifier(Modifier::BOLD)),
                        Span::raw(value),
                    ])),
                    DetailLine::Status(status) => lines.push(Line::from(vec![
                        Span::styled("Status: ", Style::default().add_modifier(Modifier::BOLD)),
                        Span::styled(
                            format!("{} {status}", status.glyph()),
                            Style::default().fg(status_color(status)),
                        ),
                    ])),
                    DetailLine::Section {
                        label,
                        body,
                        is_error,
                    } => {
                        let style = if is_error {
                            Style::default().fg(Color::Red)
                        } else {
                            Style::default()
                        };
                        lines.push(Line::default());
                        lines.push(Line::styled(
                            format!("{label}:"),
                            style.add_modifier(Modifier::BOLD),
                        ));
                        lines.extend(body.lines().map(|l| Line::styled(l.to_string(), style)));
                    }
                }
            }
            lines
        },
    );

    frame.render_widget(
        Paragraph::new(lines)
            .block(panel("Details", false))
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn render_search(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let line = if app.focus() == Focus::Search {
        Line::from(vec![
            Span::styled(" Search: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!("{}█", app.search_draft())),
        ])
    } else {
        Line::from(vec![
            Span::styled(" Search: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(app.filters().search_text().to_string()),
            Span::styled("  (/ to edit, Esc to clear)", Style::default().fg(Color::DarkGray)),
        ])
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn render_footer(frame: &mut Frame<'_>, app: &App, now: Instant, area: Rect) {
    let line = app.notice_at(now).map_or_else(
        || Line::styled(format!(" {HINTS}"), Style::default().fg(Color::DarkGray)),
        |notice| {
            Line::styled(
                format!(" {}", notice.text),
                Style::default().fg(notice_color(notice.level)),
            )
        },
    );
    frame.render_widget(Paragraph::new(line), area);
}

fn render_help(frame: &mut Frame<'_>) {
    let area = centered_rect(60, 80, frame.area());
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(HELP_TEXT)
            .alignment(Alignment::Left)
            .block(panel(format!("{TITLE} - Key Bindings"), true)),
        area,
    );
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
