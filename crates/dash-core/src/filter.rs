//! Filter state for the dashboard.
//!
//! Each [`Dimension`] is either "all" (no predicate) or an explicit set of
//! selected values. An empty explicit set behaves exactly like "all", so the
//! dashboard never passes through a state where every row is excluded.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Filter errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// The dimension name is not recognized.
    #[error("unknown filter dimension: {0}")]
    UnknownDimension(String),
}

/// An independently filterable attribute of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Project,
    EventType,
    Session,
}

impl Dimension {
    /// All dimensions, in filter panel order.
    pub const ALL: [Self; 3] = [Self::Project, Self::EventType, Self::Session];

    const fn index(self) -> usize {
        match self {
            Self::Project => 0,
            Self::EventType => 1,
            Self::Session => 2,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::EventType => "event_type",
            Self::Session => "session",
        }
    }

    /// Label of the aggregate "all" toggle.
    #[must_use]
    pub const fn all_label(&self) -> &'static str {
        match self {
            Self::Project => "All Projects",
            Self::EventType => "All Types",
            Self::Session => "All Sessions",
        }
    }

    /// Section heading in the filter panel.
    #[must_use]
    pub const fn heading(&self) -> &'static str {
        match self {
            Self::Project => "Projects",
            Self::EventType => "Types",
            Self::Session => "Session IDs",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project" | "projects" => Ok(Self::Project),
            "event_type" | "type" | "types" => Ok(Self::EventType),
            "session" | "sessions" => Ok(Self::Session),
            _ => Err(FilterError::UnknownDimension(s.to_string())),
        }
    }
}

/// Selection for a single dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Selection {
    /// Set when the explicit "all" toggle is on. Mutually exclusive with a
    /// non-empty `values`.
    all: bool,
    values: BTreeSet<String>,
}

impl Selection {
    const fn all() -> Self {
        Self {
            all: true,
            values: BTreeSet::new(),
        }
    }

    fn predicate(&self) -> Option<&BTreeSet<String>> {
        if self.all || self.values.is_empty() {
            None
        } else {
            Some(&self.values)
        }
    }
}

/// Long-lived filter and search state owned by the UI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    selections: [Selection; 3],
    search_text: String,
    search_active: bool,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            selections: [Selection::all(), Selection::all(), Selection::all()],
            search_text: String::new(),
            search_active: false,
        }
    }
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    const fn selection(&self, dimension: Dimension) -> &Selection {
        &self.selections[dimension.index()]
    }

    const fn selection_mut(&mut self, dimension: Dimension) -> &mut Selection {
        &mut self.selections[dimension.index()]
    }

    /// Adds `value` to the explicit set, clearing the dimension's "all" flag.
    pub fn select(&mut self, dimension: Dimension, value: impl Into<String>) {
        let selection = self.selection_mut(dimension);
        selection.all = false;
        selection.values.insert(value.into());
    }

    /// Removes `value` from the explicit set.
    ///
    /// Removing the last value leaves an empty set, which filters nothing.
    pub fn deselect(&mut self, dimension: Dimension, value: &str) {
        self.selection_mut(dimension).values.remove(value);
    }

    /// Flips the checkbox for `value`. Returns whether it is now selected.
    pub fn toggle(&mut self, dimension: Dimension, value: &str) -> bool {
        if self.is_selected(dimension, value) {
            self.deselect(dimension, value);
            false
        } else {
            self.select(dimension, value);
            true
        }
    }

    /// Sets the "all" flag and drops every explicit selection.
    pub fn select_all(&mut self, dimension: Dimension) {
        *self.selection_mut(dimension) = Selection::all();
    }

    /// Resets every dimension to "all". Search state is left alone.
    pub fn clear(&mut self) {
        for dimension in Dimension::ALL {
            self.select_all(dimension);
        }
    }

    /// The effective predicate for `dimension`; `None` means no filtering.
    pub fn active_predicate(&self, dimension: Dimension) -> Option<&BTreeSet<String>> {
        self.selection(dimension).predicate()
    }

    /// Whether the "all" toggle is shown as checked.
    pub fn is_all(&self, dimension: Dimension) -> bool {
        self.selection(dimension).all
    }

    pub fn is_selected(&self, dimension: Dimension, value: &str) -> bool {
        self.selection(dimension).values.contains(value)
    }

    /// Whether any dimension currently restricts results.
    pub fn has_active_filters(&self) -> bool {
        Dimension::ALL
            .into_iter()
            .any(|dimension| self.active_predicate(dimension).is_some())
    }

    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub const fn search_active(&self) -> bool {
        self.search_active
    }

    /// Enters search mode. Dimension filters stay in place.
    pub const fn enter_search(&mut self) {
        self.search_active = true;
    }

    /// Leaves search mode and discards the query text.
    pub fn exit_search(&mut self) {
        self.search_active = false;
        self.search_text.clear();
    }

    pub fn set_search_text(&mut self, text: impl Into<String>) {
        self.search_text = text.into();
    }

    /// Builds the predicate handed to the store.
    ///
    /// Search composes with the dimension predicates and only applies while
    /// search mode is active and the query is not blank.
    pub fn to_event_filter(&self) -> EventFilter {
        let search = (self.search_active && !self.search_text.trim().is_empty())
            .then(|| self.search_text.trim().to_string());
        EventFilter {
            projects: self.active_predicate(Dimension::Project).cloned(),
            event_types: self.active_predicate(Dimension::EventType).cloned(),
            sessions: self.active_predicate(Dimension::Session).cloned(),
            search,
        }
    }
}

/// Typed query predicate: one optional set per dimension plus search text.
///
/// `None` means the dimension is not filtered. The store layer translates
/// this into its own query language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_types: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sessions: Option<BTreeSet<String>>,
    /// Case-insensitive substring matched against id, type, prompt and tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl EventFilter {
    /// A filter that matches every event.
    pub fn none() -> Self {
        Self::default()
    }

    /// The same dimension predicates with the search text dropped.
    #[must_use]
    pub fn without_search(&self) -> Self {
        Self {
            search: None,
            ..self.clone()
        }
    }

    /// The value set for `dimension`, if it is filtered.
    ///
    /// Empty sets are reported as unfiltered so callers never build an
    /// always-false predicate.
    pub fn values(&self, dimension: Dimension) -> Option<&BTreeSet<String>> {
        let values = match dimension {
            Dimension::Project => self.projects.as_ref(),
            Dimension::EventType => self.event_types.as_ref(),
            Dimension::Session => self.sessions.as_ref(),
        };
        values.filter(|set| !set.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn new_state_filters_nothing() {
        let state = FilterState::new();
        for dimension in Dimension::ALL {
            assert!(state.is_all(dimension));
            assert_eq!(state.active_predicate(dimension), None);
        }
        assert_eq!(state.to_event_filter(), EventFilter::none());
    }

    #[test]
    fn select_clears_all_and_yields_explicit_set() {
        let mut state = FilterState::new();
        state.select(Dimension::Project, "dotfiles");

        assert!(!state.is_all(Dimension::Project));
        assert_eq!(
            state.active_predicate(Dimension::Project),
            Some(&set(&["dotfiles"]))
        );
        assert!(state.is_all(Dimension::EventType));
    }

    #[test]
    fn select_all_discards_prior_selections() {
        let mut state = FilterState::new();
        state.select(Dimension::EventType, "PreToolUse");
        state.select(Dimension::EventType, "Stop");
        state.select_all(Dimension::EventType);

        assert!(state.is_all(Dimension::EventType));
        assert_eq!(state.active_predicate(Dimension::EventType), None);
        assert!(!state.is_selected(Dimension::EventType, "Stop"));
    }

    #[test]
    fn emptied_explicit_set_behaves_like_all() {
        let mut state = FilterState::new();
        state.select(Dimension::Session, "abc");
        state.deselect(Dimension::Session, "abc");

        assert!(!state.is_all(Dimension::Session));
        assert_eq!(state.active_predicate(Dimension::Session), None);
        assert_eq!(state.to_event_filter().sessions, None);
    }

    #[test]
    fn toggle_flips_selection() {
        let mut state = FilterState::new();
        assert!(state.toggle(Dimension::Project, "a"));
        assert!(state.is_selected(Dimension::Project, "a"));
        assert!(!state.toggle(Dimension::Project, "a"));
        assert!(!state.is_selected(Dimension::Project, "a"));
    }

    #[test]
    fn clear_resets_dimensions_but_not_search() {
        let mut state = FilterState::new();
        state.select(Dimension::Project, "a");
        state.select(Dimension::Session, "s");
        state.enter_search();
        state.set_search_text("bash");

        state.clear();

        assert!(!state.has_active_filters());
        assert!(state.search_active());
        assert_eq!(state.search_text(), "bash");
    }

    #[test]
    fn search_only_applies_while_active() {
        let mut state = FilterState::new();
        state.set_search_text("bash");
        assert_eq!(state.to_event_filter().search, None);

        state.enter_search();
        assert_eq!(state.to_event_filter().search.as_deref(), Some("bash"));

        state.exit_search();
        assert_eq!(state.search_text(), "");
        assert_eq!(state.to_event_filter().search, None);
    }

    #[test]
    fn blank_search_is_no_predicate() {
        let mut state = FilterState::new();
        state.enter_search();
        state.set_search_text("   ");
        assert_eq!(state.to_event_filter().search, None);
    }

    #[test]
    fn search_composes_with_dimension_filters() {
        let mut state = FilterState::new();
        state.select(Dimension::Project, "dotfiles");
        state.enter_search();
        state.set_search_text("Bash");

        let filter = state.to_event_filter();
        assert_eq!(filter.projects, Some(set(&["dotfiles"])));
        assert_eq!(filter.search.as_deref(), Some("Bash"));
    }

    #[test]
    fn event_filter_hides_empty_sets() {
        let filter = EventFilter {
            projects: Some(BTreeSet::new()),
            ..EventFilter::none()
        };
        assert_eq!(filter.values(Dimension::Project), None);
    }

    #[test]
    fn without_search_keeps_dimensions() {
        let mut state = FilterState::new();
        state.select(Dimension::Session, "s1");
        state.enter_search();
        state.set_search_text("bash");

        let filter = state.to_event_filter();
        let counted = filter.without_search();
        assert_eq!(filter.search.as_deref(), Some("bash"));
        assert_eq!(counted.search, None);
        assert_eq!(counted.sessions, Some(set(&["s1"])));
    }

    #[test]
    fn dimension_parses_aliases() {
        assert_eq!("types".parse::<Dimension>(), Ok(Dimension::EventType));
        assert_eq!("session".parse::<Dimension>(), Ok(Dimension::Session));
        assert_eq!(
            "color".parse::<Dimension>().unwrap_err().to_string(),
            "unknown filter dimension: color"
        );
    }
}
