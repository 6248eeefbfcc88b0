//! View model and display formatting.
//!
//! Everything here is a pure function of query results. The UI never keeps
//! its own copy of events or counts; it renders the latest [`ViewModel`].

use std::borrow::Cow;
use std::fmt::Write;

use chrono::Local;
use dash_core::{Dimension, Event, EventFilter, Stats, Status};
use dash_db::{EventStore, StoreError};

/// Width of the success bar in the overview, in cells.
pub const BAR_WIDTH: usize = 20;
/// Display limits for long detail fields, in characters.
pub const PROMPT_LIMIT: usize = 200;
pub const PAYLOAD_LIMIT: usize = 300;
pub const ERROR_LIMIT: usize = 500;
/// Session ids are shortened to this many characters in the filter panel.
pub const SESSION_LABEL_LIMIT: usize = 12;

const ELLIPSIS: &str = "...";
const MISSING_PROJECT: &str = "—";

/// Values available for selection in the filter panel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOptions {
    pub projects: Vec<String>,
    pub event_types: Vec<String>,
    pub sessions: Vec<String>,
}

impl FilterOptions {
    pub fn values(&self, dimension: Dimension) -> &[String] {
        match dimension {
            Dimension::Project => &self.projects,
            Dimension::EventType => &self.event_types,
            Dimension::Session => &self.sessions,
        }
    }

    /// Enumerates every distinct value in the store, ignoring any filter.
    pub fn load(store: &EventStore) -> Result<Self, StoreError> {
        Ok(Self {
            projects: store.distinct_values(Dimension::Project)?,
            event_types: store.distinct_values(Dimension::EventType)?,
            sessions: store.distinct_values(Dimension::Session)?,
        })
    }
}

/// One consistent snapshot of everything the dashboard displays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewModel {
    /// Events matching the active filter, newest first.
    pub events: Vec<Event>,
    /// Counts over the same dimension filters, ignoring search.
    pub stats: Stats,
    pub options: FilterOptions,
    /// Row limit the events were fetched with.
    pub limit: usize,
}

impl ViewModel {
    /// Runs every query a refresh needs against `store`.
    ///
    /// Stats cover the dimension filters only; search narrows the table.
    pub fn load(store: &EventStore, filter: &EventFilter, limit: usize) -> Result<Self, StoreError> {
        Ok(Self {
            events: store.query_events(limit, 0, filter)?,
            stats: store.aggregate_stats(&filter.without_search())?,
            options: FilterOptions::load(store)?,
            limit,
        })
    }

    /// Whether the last fetch filled its limit, so more rows may exist.
    pub fn has_more(&self) -> bool {
        self.limit > 0 && self.events.len() >= self.limit
    }

    pub fn position_of(&self, event_id: &str) -> Option<usize> {
        self.events.iter().position(|event| event.id == event_id)
    }
}

/// Formats a count with thousands separators.
pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Fixed-width bar of successes over total. Empty when there are no events.
pub fn success_bar(stats: &Stats) -> String {
    let percent = usize::try_from(stats.success_percent()).unwrap_or(100);
    let filled = (BAR_WIDTH * percent / 100).min(BAR_WIDTH);
    let mut bar = "▓".repeat(filled);
    bar.push_str(&"░".repeat(BAR_WIDTH - filled));
    bar
}

/// Text body of the overview panel.
pub fn overview_text(stats: &Stats) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "Total: {}", format_count(stats.total));
    let _ = writeln!(text, "Success: {}", format_count(stats.success));
    let _ = writeln!(text, "Errors: {}", format_count(stats.error));
    let _ = writeln!(text, "Warnings: {}", format_count(stats.warning));
    let _ = writeln!(text);
    let _ = write!(text, "{} {}%", success_bar(stats), stats.success_percent());
    text
}

/// Shortens `text` to at most `limit` characters plus an ellipsis.
///
/// Display only: callers pass borrowed fields and the event is untouched.
pub fn truncate(text: &str, limit: usize) -> Cow<'_, str> {
    match text.char_indices().nth(limit) {
        None => Cow::Borrowed(text),
        Some((end, _)) => Cow::Owned(format!("{}{ELLIPSIS}", &text[..end])),
    }
}

/// Label for a session id in the filter panel.
pub fn session_label(session_id: &str) -> Cow<'_, str> {
    truncate(session_id, SESSION_LABEL_LIMIT)
}

/// Cells of one event table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRow {
    pub time: String,
    pub project: String,
    pub event_type: String,
    pub status: Status,
}

impl EventRow {
    pub fn from_event(event: &Event) -> Self {
        Self {
            time: event
                .timestamp
                .with_timezone(&Local)
                .format("%H:%M:%S")
                .to_string(),
            project: event
                .project
                .clone()
                .unwrap_or_else(|| MISSING_PROJECT.to_string()),
            event_type: event.event_type.clone(),
            status: event.status(),
        }
    }
}

/// One entry of the detail pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailLine {
    /// `Label: value` on a single line.
    Field { label: &'static str, value: String },
    /// The status line, rendered with the status color.
    Status(Status),
    /// A heading followed by multi-line content.
    Section {
        label: &'static str,
        body: String,
        is_error: bool,
    },
}

/// Lines shown in the detail pane for `event`.
pub fn detail_lines(event: &Event) -> Vec<DetailLine> {
    let mut lines = vec![
        DetailLine::Field {
            label: "Event ID",
            value: event.id.clone(),
        },
        DetailLine::Field {
            label: "Timestamp",
            value: event
                .timestamp
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S%.3f")
                .to_string(),
        },
        DetailLine::Field {
            label: "Type",
            value: event.event_type.clone(),
        },
        DetailLine::Field {
            label: "Project",
            value: event.project.clone().unwrap_or_else(|| "N/A".to_string()),
        },
        DetailLine::Status(event.status()),
    ];

    if let Some(session_id) = &event.session_id {
        lines.push(DetailLine::Field {
            label: "Session",
            value: session_id.clone(),
        });
    }
    if let Some(tool) = &event.tool {
        lines.push(DetailLine::Field {
            label: "Tool",
            value: tool.clone(),
        });
    }
    if let Some(prompt) = &event.prompt {
        lines.push(DetailLine::Field {
            label: "Prompt",
            value: truncate(prompt, PROMPT_LIMIT).into_owned(),
        });
    }
    if let Some(input) = &event.input {
        lines.push(DetailLine::Section {
            label: "Input",
            body: truncate(&input.to_pretty_string(), PAYLOAD_LIMIT).into_owned(),
            is_error: false,
        });
    }
    if let Some(output) = &event.output {
        lines.push(DetailLine::Section {
            label: "Output",
            body: truncate(&output.to_pretty_string(), PAYLOAD_LIMIT).into_owned(),
            is_error: false,
        });
    }
    if let Some(details) = event.error_details().filter(|details| !details.is_empty()) {
        lines.push(DetailLine::Section {
            label: "Error Details",
            body: truncate(&details, ERROR_LIMIT).into_owned(),
            is_error: true,
        });
    }
    lines
}
