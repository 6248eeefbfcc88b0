//! End-to-end refresh flow: store, poller and dashboard state together.

use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use dash_core::{Dimension, Stats};
use dash_db::EventStore;
use dash_db::schema::PRODUCER_SCHEMA;
use dash_tui::app::{App, Command, Settings};
use dash_tui::poller::{
    ActivityTracker, MarkerSource, PollIntervals, PollOutcome, PollState, Poller, PollerMessage,
};
use rusqlite::{Connection, params};
use tempfile::TempDir;

struct Fixture {
    _temp: TempDir,
    writer: Connection,
    store: Arc<Mutex<EventStore>>,
}

impl Fixture {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("events.db");
        let writer = Connection::open(&path).unwrap();
        writer.execute_batch(PRODUCER_SCHEMA).unwrap();
        let store = EventStore::connect(&path).unwrap();
        Self {
            _temp: temp,
            writer,
            store: Arc::new(Mutex::new(store)),
        }
    }

    fn insert(&self, event_id: &str, project: &str, created_at: &str, output: Option<&str>) {
        self.writer
            .execute(
                "INSERT INTO claude_events
                 (event_id, hook_type, project_name, session_id, tool_name, tool_output, full_event, created_at)
                 VALUES (?, 'PostToolUse', ?, 'session-1', 'Bash', ?, '{}', ?)",
                params![event_id, project, output, created_at],
            )
            .unwrap();
    }

    fn refresh(&self, app: &mut App) {
        app.refresh(&self.store.lock().unwrap());
    }

    fn poller(
        &self,
        auto_follow: Arc<AtomicBool>,
    ) -> (Poller<Arc<Mutex<EventStore>>>, Receiver<PollerMessage>) {
        self.poller_with(ActivityTracker::default(), auto_follow)
    }

    fn poller_with(
        &self,
        activity: ActivityTracker,
        auto_follow: Arc<AtomicBool>,
    ) -> (Poller<Arc<Mutex<EventStore>>>, Receiver<PollerMessage>) {
        let (tx, rx) = mpsc::channel();
        let poller = Poller::new(
            Arc::clone(&self.store),
            tx,
            activity,
            PollIntervals::default(),
            auto_follow,
        )
        .with_baseline(self.store.latest_marker().unwrap());
        (poller, rx)
    }
}

fn seeded() -> Fixture {
    let fixture = Fixture::new();
    fixture.insert("e1", "alpha", "2025-07-27 10:00:00", Some(r#"{"ok": true}"#));
    fixture.insert("e2", "alpha", "2025-07-27 10:00:01", Some(r#"{"error": "boom"}"#));
    fixture.insert("e3", "beta", "2025-07-27 10:00:02", Some(r#"{"warning": "slow"}"#));
    fixture
}

fn key(ch: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(ch), KeyModifiers::NONE)
}

fn idle_for(secs: u64) -> ActivityTracker {
    let now = Instant::now();
    ActivityTracker::starting_at(now.checked_sub(Duration::from_secs(secs)).unwrap_or(now))
}

fn ids(app: &App) -> Vec<&str> {
    app.view().events.iter().map(|e| e.id.as_str()).collect()
}

#[test]
fn test_initial_load_shows_newest_first_with_stats() {
    let fixture = seeded();
    let mut app = App::new(Settings::default(), ActivityTracker::default());
    fixture.refresh(&mut app);

    assert_eq!(ids(&app), ["e3", "e2", "e1"]);
    assert_eq!(
        app.view().stats,
        Stats {
            total: 3,
            success: 1,
            error: 1,
            warning: 1,
        }
    );
    assert_eq!(app.view().options.projects, ["alpha", "beta"]);
    assert_eq!(app.view().options.sessions, ["session-1"]);
}

#[test]
fn test_unchanged_store_posts_nothing_and_view_is_stable() {
    let fixture = seeded();
    let mut app = App::new(Settings::default(), ActivityTracker::default());
    fixture.refresh(&mut app);
    let before = app.view().clone();

    let (mut poller, rx) = fixture.poller(app.auto_follow_flag());
    assert_eq!(poller.poll_once().unwrap(), PollOutcome::Unchanged);
    assert!(rx.try_recv().is_err());

    fixture.refresh(&mut app);
    assert_eq!(app.view(), &before);
}

#[test]
fn test_new_event_is_detected_and_followed() {
    let fixture = seeded();
    let mut app = App::new(Settings::default(), ActivityTracker::default());
    fixture.refresh(&mut app);
    app.handle_key(key('j'));
    assert_eq!(app.selected_event().unwrap().id, "e2");

    let (mut poller, rx) = fixture.poller(app.auto_follow_flag());
    // Same second as the newest row: only the row id moves the marker.
    fixture.insert("e4", "beta", "2025-07-27 10:00:02", None);
    assert_eq!(poller.poll_once().unwrap(), PollOutcome::Changed);

    let mut refresh = false;
    for message in rx.try_iter() {
        refresh |= app.handle_poller_message(message) == Command::Refresh;
    }
    assert!(refresh);
    fixture.refresh(&mut app);

    assert_eq!(ids(&app), ["e4", "e3", "e2", "e1"]);
    assert_eq!(app.selected_event().unwrap().id, "e4");
    assert_eq!(app.view().stats.total, 4);
}

#[test]
fn test_filter_toggle_narrows_events_and_stats() {
    let fixture = seeded();
    let mut app = App::new(Settings::default(), ActivityTracker::default());
    fixture.refresh(&mut app);

    // Focus filters, move to "beta" and toggle it.
    app.handle_key(key('f'));
    app.handle_key(key('j'));
    app.handle_key(key('j'));
    assert_eq!(app.handle_key(key(' ')), Command::Refresh);
    assert!(app.filters().is_selected(Dimension::Project, "beta"));
    fixture.refresh(&mut app);

    assert_eq!(ids(&app), ["e3"]);
    assert_eq!(app.view().stats.total, 1);
    assert_eq!(app.view().stats.warning, 1);
    // Options are not narrowed by the active filter.
    assert_eq!(app.view().options.projects, ["alpha", "beta"]);
}

#[test]
fn test_search_composes_with_store_query() {
    let fixture = seeded();
    let mut app = App::new(Settings::default(), ActivityTracker::default());
    fixture.refresh(&mut app);

    app.handle_key(key('/'));
    for ch in "E2".chars() {
        app.handle_key(key(ch));
    }
    app.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
    fixture.refresh(&mut app);

    assert_eq!(ids(&app), ["e2"]);
    // Overview counts ignore the search text.
    assert_eq!(app.view().stats.total, 3);
    assert_eq!(app.view().stats.error, 1);
}

#[test]
fn test_poller_refresh_wakes_idle_dashboard() {
    let fixture = seeded();
    let tracker = idle_for(60);
    let mut app = App::new(Settings::default(), tracker.clone());
    let (mut poller, rx) = fixture.poller_with(tracker, app.auto_follow_flag());
    assert_eq!(app.poll_state(Instant::now()), PollState::Idle);

    fixture.insert("e4", "beta", "2025-07-27 10:00:03", None);
    assert_eq!(poller.poll_once().unwrap(), PollOutcome::Changed);
    let mut refresh = false;
    for message in rx.try_iter() {
        refresh |= app.handle_poller_message(message) == Command::Refresh;
    }
    assert!(refresh);
    fixture.refresh(&mut app);

    assert_eq!(ids(&app)[0], "e4");
    assert_eq!(app.poll_state(Instant::now()), PollState::Active);
    assert_eq!(poller.next_interval(Instant::now()), Duration::from_secs(1));
}

#[test]
fn test_keypress_shortens_shared_poll_interval() {
    let fixture = seeded();
    let tracker = idle_for(31);
    let mut app = App::new(Settings::default(), tracker.clone());
    let (poller, _rx) = fixture.poller_with(tracker, app.auto_follow_flag());
    assert_eq!(poller.next_interval(Instant::now()), Duration::from_secs(5));

    app.handle_key(key('j'));
    assert_eq!(poller.next_interval(Instant::now()), Duration::from_secs(1));
}

