//! Dashboard state and input handling.
//!
//! [`App`] owns everything the UI thread mutates. Key presses and poller
//! messages are turned into state changes plus a [`Command`] for the runtime
//! loop; query results arrive as a whole [`ViewModel`] through [`App::apply`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use dash_core::{Dimension, Event, FilterState};
use dash_db::EventStore;

use crate::config::Config;
use crate::poller::{ActivityTracker, PollIntervals, PollState, PollerMessage};
use crate::view::ViewModel;

/// Rows moved by page up / page down.
const PAGE_ROWS: usize = 10;

/// What the runtime loop should do after an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    None,
    Refresh,
    Quit,
}

/// Which panel receives navigation keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Events,
    Filters,
    Search,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Transient footer message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
    pub shown_at: Instant,
}

/// One row of the filter panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterItem<'a> {
    All(Dimension),
    Value(Dimension, &'a str),
}

/// Tunables taken from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub page_size: usize,
    pub notice_duration: Duration,
    pub intervals: PollIntervals,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            page_size: 1_000,
            notice_duration: Duration::from_secs(4),
            intervals: PollIntervals::default(),
        }
    }
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            page_size: config.page_size(),
            notice_duration: config.notice_duration(),
            intervals: config.poll_intervals(),
        }
    }
}

#[derive(Debug)]
pub struct App {
    settings: Settings,
    filters: FilterState,
    view: ViewModel,
    selected: usize,
    focus: Focus,
    filter_cursor: usize,
    search_draft: String,
    auto_follow: Arc<AtomicBool>,
    show_help: bool,
    notice: Option<Notice>,
    limit: usize,
    activity: ActivityTracker,
    cursor_to_top: bool,
}

impl App {
    pub fn new(settings: Settings, activity: ActivityTracker) -> Self {
        Self {
            settings,
            filters: FilterState::new(),
            view: ViewModel::default(),
            selected: 0,
            focus: Focus::Events,
            filter_cursor: 0,
            search_draft: String::new(),
            auto_follow: Arc::new(AtomicBool::new(true)),
            show_help: false,
            notice: None,
            limit: settings.page_size,
            activity,
            cursor_to_top: false,
        }
    }

    pub const fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub const fn view(&self) -> &ViewModel {
        &self.view
    }

    pub const fn focus(&self) -> Focus {
        self.focus
    }

    pub const fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_event(&self) -> Option<&Event> {
        self.view.events.get(self.selected)
    }

    pub const fn filter_cursor(&self) -> usize {
        self.filter_cursor
    }

    pub fn search_draft(&self) -> &str {
        &self.search_draft
    }

    pub const fn show_help(&self) -> bool {
        self.show_help
    }

    pub const fn limit(&self) -> usize {
        self.limit
    }

    pub fn auto_follow(&self) -> bool {
        self.auto_follow.load(Ordering::Acquire)
    }

    /// Flag shared with the poller.
    pub fn auto_follow_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.auto_follow)
    }

    pub fn poll_state(&self, now: Instant) -> PollState {
        self.activity.state_at(now, self.settings.intervals.idle_after)
    }

    /// The notice to show at `now`, if it has not expired.
    pub fn notice_at(&self, now: Instant) -> Option<&Notice> {
        self.notice.as_ref().filter(|notice| {
            now.saturating_duration_since(notice.shown_at) < self.settings.notice_duration
        })
    }

    /// Logs `text` and shows it in the footer.
    pub fn report(&mut self, level: NoticeLevel, text: impl Into<String>) {
        let text = text.into();
        match level {
            NoticeLevel::Info => tracing::info!("{text}"),
            NoticeLevel::Warning => tracing::warn!("{text}"),
            NoticeLevel::Error => tracing::error!("{text}"),
        }
        self.notice = Some(Notice {
            level,
            text,
            shown_at: Instant::now(),
        });
    }

    /// Rows of the filter panel in display order.
    pub fn filter_items(&self) -> Vec<FilterItem<'_>> {
        let mut items = Vec::new();
        for dimension in Dimension::ALL {
            items.push(FilterItem::All(dimension));
            items.extend(
                self.view
                    .options
                    .values(dimension)
                    .iter()
                    .map(|value| FilterItem::Value(dimension, value.as_str())),
            );
        }
        items
    }

    /// Re-runs every query for the current filter and installs the result.
    ///
    /// A successful refresh counts as activity. On failure the previous view
    /// stays on screen.
    pub fn refresh(&mut self, store: &EventStore) {
        let filter = self.filters.to_event_filter();
        match ViewModel::load(store, &filter, self.limit) {
            Ok(view) => {
                self.apply(view);
                self.activity.touch();
            }
            Err(e) => self.report(NoticeLevel::Error, format!("Failed to refresh data: {e}")),
        }
    }

    /// Installs a freshly loaded view, keeping the selected event if it is
    /// still present.
    pub fn apply(&mut self, view: ViewModel) {
        let previous = self.selected_event().map(|event| event.id.clone());
        self.view = view;

        if std::mem::take(&mut self.cursor_to_top) {
            self.selected = 0;
        } else if let Some(index) = previous.and_then(|id| self.view.position_of(&id)) {
            self.selected = index;
        }
        self.selected = self.selected.min(self.view.events.len().saturating_sub(1));
        self.filter_cursor = self
            .filter_cursor
            .min(self.filter_items().len().saturating_sub(1));
    }

    pub fn handle_poller_message(&mut self, message: PollerMessage) -> Command {
        match message {
            PollerMessage::RefreshRequested => Command::Refresh,
            PollerMessage::ScrollToNewest => {
                if self.auto_follow() {
                    self.cursor_to_top = true;
                }
                Command::None
            }
            PollerMessage::Warning(text) => {
                self.report(NoticeLevel::Warning, text);
                Command::None
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Command {
        if key.kind == KeyEventKind::Release {
            return Command::None;
        }
        self.activity.touch();

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Command::Quit;
        }

        if self.show_help {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?' | 'q')) {
                self.show_help = false;
            }
            return Command::None;
        }

        if self.focus == Focus::Search {
            return self.handle_search_key(key);
        }

        match key.code {
            KeyCode::Char('q') => Command::Quit,
            KeyCode::Char('?') => {
                self.show_help = true;
                Command::None
            }
            KeyCode::Char('/') => {
                self.filters.enter_search();
                self.search_draft = self.filters.search_text().to_string();
                self.focus = Focus::Search;
                Command::None
            }
            KeyCode::Char('r') => {
                self.report(NoticeLevel::Info, "Refreshed");
                Command::Refresh
            }
            KeyCode::Char('a') => {
                let enabled = !self.auto_follow.fetch_xor(true, Ordering::AcqRel);
                let state = if enabled { "enabled" } else { "disabled" };
                self.report(NoticeLevel::Info, format!("Auto-follow {state}"));
                Command::None
            }
            KeyCode::Char('c') => {
                self.filters.clear();
                self.report(NoticeLevel::Info, "Filters cleared");
                Command::Refresh
            }
            KeyCode::Char('f') => {
                self.focus = Focus::Filters;
                Command::None
            }
            KeyCode::Tab | KeyCode::BackTab => {
                self.focus = match self.focus {
                    Focus::Events => Focus::Filters,
                    Focus::Filters | Focus::Search => Focus::Events,
                };
                Command::None
            }
            KeyCode::Esc => {
                if self.filters.search_active() {
                    self.cancel_search()
                } else {
                    self.focus = Focus::Events;
                    Command::None
                }
            }
            KeyCode::Char('n') if self.filters.search_active() => self.move_selection_down(1),
            KeyCode::Char('N') if self.filters.search_active() => {
                self.move_selection_up(1);
                Command::None
            }
            KeyCode::Char('g') => {
                self.selected = 0;
                Command::None
            }
            KeyCode::Char('G') => self.move_to_last(),
            _ if self.focus == Focus::Filters => self.handle_filter_key(key),
            _ => self.handle_event_key(key),
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) -> Command {
        match key.code {
            KeyCode::Enter => {
                self.filters.set_search_text(self.search_draft.trim());
                self.focus = Focus::Events;
                self.cursor_to_top = true;
                Command::Refresh
            }
            KeyCode::Esc => self.cancel_search(),
            KeyCode::Backspace => {
                self.search_draft.pop();
                Command::None
            }
            KeyCode::Char(ch) => {
                self.search_draft.push(ch);
                Command::None
            }
            _ => Command::None,
        }
    }

    fn cancel_search(&mut self) -> Command {
        self.filters.exit_search();
        self.search_draft.clear();
        self.focus = Focus::Events;
        Command::Refresh
    }

    fn handle_event_key(&mut self, key: KeyEvent) -> Command {
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => self.move_selection_down(1),
            KeyCode::Up | KeyCode::Char('k') => {
                self.move_selection_up(1);
                Command::None
            }
            KeyCode::PageDown => self.move_selection_down(PAGE_ROWS),
            KeyCode::PageUp => {
                self.move_selection_up(PAGE_ROWS);
                Command::None
            }
            KeyCode::Home => {
                self.selected = 0;
                Command::None
            }
            KeyCode::End => self.move_to_last(),
            _ => Command::None,
        }
    }

    fn handle_filter_key(&mut self, key: KeyEvent) -> Command {
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => {
                let last = self.filter_items().len().saturating_sub(1);
                self.filter_cursor = (self.filter_cursor + 1).min(last);
                Command::None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.filter_cursor = self.filter_cursor.saturating_sub(1);
                Command::None
            }
            KeyCode::Char(' ') | KeyCode::Enter => self.toggle_filter_at_cursor(),
            _ => Command::None,
        }
    }

    /// Applies the checkbox under the cursor. The "All" row is a reset rather
    /// than a toggle.
    fn toggle_filter_at_cursor(&mut self) -> Command {
        let Some(item) = self.filter_items().into_iter().nth(self.filter_cursor) else {
            return Command::None;
        };
        match item {
            FilterItem::All(dimension) => self.filters.select_all(dimension),
            FilterItem::Value(dimension, value) => {
                let value = value.to_string();
                self.filters.toggle(dimension, &value);
            }
        }
        Command::Refresh
    }

    fn move_selection_up(&mut self, rows: usize) {
        self.selected = self.selected.saturating_sub(rows);
    }

    /// Moves down, growing the fetch limit when the end of a full page is
    /// reached.
    fn move_selection_down(&mut self, rows: usize) -> Command {
        let last = self.view.events.len().saturating_sub(1);
        let target = self.selected.saturating_add(rows);
        self.selected = target.min(last);
        if target >= last && self.view.has_more() {
            self.limit = self.view.limit + self.settings.page_size;
            return Command::Refresh;
        }
        Command::None
    }

    fn move_to_last(&mut self) -> Command {
        self.selected = self.view.events.len().saturating_sub(1);
        if self.view.has_more() {
            self.limit = self.view.limit + self.settings.page_size;
            return Command::Refresh;
        }
        Command::None
    }
}
