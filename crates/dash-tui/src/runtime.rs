//! Terminal setup and the UI event loop.

use std::io::{self, Stdout};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event as TermEvent};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use crossterm::{ExecutableCommand, execute};
use dash_db::EventStore;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use crate::app::{App, Command, NoticeLevel, Settings};
use crate::config::Config;
use crate::poller::{ActivityTracker, MarkerSource, Poller, PollerHandle, PollerMessage};
use crate::ui;

/// How long the loop waits for input before redrawing.
const INPUT_TICK: Duration = Duration::from_millis(200);

type Backend = CrosstermBackend<Stdout>;

/// Runs the dashboard until the user quits.
///
/// The store is shared with the poller thread and closed once the poller
/// has stopped.
pub fn run(store: EventStore, config: &Config) -> Result<()> {
    let store = Arc::new(Mutex::new(store));
    let activity = ActivityTracker::default();
    let mut app = App::new(Settings::from(config), activity.clone());

    // Baseline before the first load so nothing written in between is missed.
    let baseline = store.latest_marker().context("failed to read activity marker")?;
    with_store(&store, |db| app.refresh(db));
    app.report(NoticeLevel::Info, "Connected to database");

    let (tx, rx) = mpsc::channel();
    let poller = Poller::new(
        Arc::clone(&store),
        tx,
        activity,
        config.poll_intervals(),
        app.auto_follow_flag(),
    )
    .with_baseline(baseline);

    let mut terminal = setup_terminal().context("failed to set up terminal")?;
    let result = PollerHandle::spawn(poller)
        .context("failed to start poller")
        .and_then(|poller| {
            let result = event_loop(&mut terminal, &mut app, &store, &rx);
            poller.shutdown();
            result
        });

    match Arc::try_unwrap(store) {
        Ok(store) => {
            let store = store.into_inner().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = store.close() {
                tracing::warn!(error = %e, "failed to close database");
            }
        }
        Err(_) => tracing::warn!("database still shared at shutdown"),
    }

    let restored = restore_terminal(&mut terminal);
    result?;
    restored.context("failed to restore terminal")
}

fn with_store<T>(store: &Mutex<EventStore>, f: impl FnOnce(&EventStore) -> T) -> T {
    let guard = store.lock().unwrap_or_else(PoisonError::into_inner);
    f(&guard)
}

fn event_loop(
    terminal: &mut Terminal<Backend>,
    app: &mut App,
    store: &Mutex<EventStore>,
    rx: &Receiver<PollerMessage>,
) -> Result<()> {
    loop {
        let mut refresh = false;
        while let Ok(message) = rx.try_recv() {
            refresh |= app.handle_poller_message(message) == Command::Refresh;
        }
        if refresh {
            tracing::debug!("new events detected");
            with_store(store, |db| app.refresh(db));
        }

        terminal.draw(|frame| ui::render(frame, app, Instant::now()))?;

        if !event::poll(INPUT_TICK)? {
            continue;
        }
        if let TermEvent::Key(key) = event::read()? {
            match app.handle_key(key) {
                Command::None => {}
                Command::Refresh => with_store(store, |db| app.refresh(db)),
                Command::Quit => return Ok(()),
            }
        }
    }
}

fn setup_terminal() -> io::Result<Terminal<Backend>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    Terminal::new(CrosstermBackend::new(stdout))
}

fn restore_terminal(terminal: &mut Terminal<Backend>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()
}
