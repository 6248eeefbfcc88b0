//! Background change detection.
//!
//! The poller runs on its own thread and samples the store's activity marker
//! on an adaptive interval: short while the user is interacting, longer once
//! they have been idle for a while. It never touches view state; it only
//! posts [`PollerMessage`]s that the UI thread drains on its next iteration.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{SendError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use dash_db::{ActivityMarker, EventStore, StoreError};

/// Whether the user has interacted recently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Active,
    Idle,
}

impl PollState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Idle => "idle",
        }
    }
}

/// Polling cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    /// Interval while the user is active.
    pub active: Duration,
    /// Interval once the user is idle.
    pub idle: Duration,
    /// Inactivity after which the user counts as idle.
    pub idle_after: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            active: Duration::from_secs(1),
            idle: Duration::from_secs(5),
            idle_after: Duration::from_secs(30),
        }
    }
}

impl PollIntervals {
    pub const fn interval_for(&self, state: PollState) -> Duration {
        match state {
            PollState::Active => self.active,
            PollState::Idle => self.idle,
        }
    }
}

/// Time of the last user interaction, shared between the UI and the poller.
#[derive(Debug, Clone)]
pub struct ActivityTracker {
    last: Arc<Mutex<Instant>>,
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::starting_at(Instant::now())
    }
}

impl ActivityTracker {
    pub fn starting_at(instant: Instant) -> Self {
        Self {
            last: Arc::new(Mutex::new(instant)),
        }
    }

    /// Records an interaction now.
    pub fn touch(&self) {
        self.touch_at(Instant::now());
    }

    pub fn touch_at(&self, instant: Instant) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = instant;
    }

    pub fn last_activity(&self) -> Instant {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state_at(&self, now: Instant, idle_after: Duration) -> PollState {
        if now.saturating_duration_since(self.last_activity()) < idle_after {
            PollState::Active
        } else {
            PollState::Idle
        }
    }
}

/// Messages posted from the poller to the UI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerMessage {
    /// New data arrived; re-run the current queries.
    RefreshRequested,
    /// Auto-follow is on; move the cursor to the newest row after refreshing.
    ScrollToNewest,
    /// Sampling failed; the poller keeps running.
    Warning(String),
}

/// Anything that can report the store's newest-activity marker.
pub trait MarkerSource {
    fn latest_marker(&self) -> Result<Option<ActivityMarker>, StoreError>;
}

impl MarkerSource for Arc<Mutex<EventStore>> {
    fn latest_marker(&self) -> Result<Option<ActivityMarker>, StoreError> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .latest_activity_marker()
    }
}

/// Result of a single sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Unchanged,
    Changed,
    Failed,
}

/// Samples a [`MarkerSource`] and reports changes over a channel.
pub struct Poller<S> {
    source: S,
    tx: Sender<PollerMessage>,
    activity: ActivityTracker,
    intervals: PollIntervals,
    auto_follow: Arc<AtomicBool>,
    last_marker: Option<ActivityMarker>,
}

impl<S: MarkerSource> Poller<S> {
    pub fn new(
        source: S,
        tx: Sender<PollerMessage>,
        activity: ActivityTracker,
        intervals: PollIntervals,
        auto_follow: Arc<AtomicBool>,
    ) -> Self {
        Self {
            source,
            tx,
            activity,
            intervals,
            auto_follow,
            last_marker: None,
        }
    }

    /// Sets the marker the first sample is compared against, normally the
    /// one observed when the initial view was loaded.
    #[must_use]
    pub fn with_baseline(mut self, marker: Option<ActivityMarker>) -> Self {
        self.last_marker = marker;
        self
    }

    /// Interval to wait before the next sample.
    pub fn next_interval(&self, now: Instant) -> Duration {
        let state = self.activity.state_at(now, self.intervals.idle_after);
        self.intervals.interval_for(state)
    }

    /// Takes one sample and posts any resulting messages.
    ///
    /// Fails only when the receiving side has gone away.
    pub fn poll_once(&mut self) -> Result<PollOutcome, SendError<PollerMessage>> {
        let marker = match self.source.latest_marker() {
            Ok(marker) => marker,
            Err(e) => {
                self.tx
                    .send(PollerMessage::Warning(format!("Polling failed: {e}")))?;
                return Ok(PollOutcome::Failed);
            }
        };

        if marker == self.last_marker {
            return Ok(PollOutcome::Unchanged);
        }
        self.last_marker = marker;

        self.tx.send(PollerMessage::RefreshRequested)?;
        if self.auto_follow.load(Ordering::Acquire) {
            self.tx.send(PollerMessage::ScrollToNewest)?;
        }
        Ok(PollOutcome::Changed)
    }

    /// Polls until `shutdown` is set or the receiver is dropped.
    pub fn run(mut self, shutdown: &AtomicBool) {
        loop {
            let now = Instant::now();
            if !wait_until(now + self.next_interval(now), shutdown) {
                break;
            }
            if self.poll_once().is_err() {
                break;
            }
        }
    }
}

/// Parks until `deadline`. Returns `false` if shutdown was requested.
fn wait_until(deadline: Instant, shutdown: &AtomicBool) -> bool {
    loop {
        if shutdown.load(Ordering::Acquire) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::park_timeout(deadline - now);
    }
}

/// Owns the poller thread.
#[derive(Debug)]
pub struct PollerHandle {
    shutdown: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl PollerHandle {
    pub fn spawn<S>(poller: Poller<S>) -> io::Result<Self>
    where
        S: MarkerSource + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let thread = thread::Builder::new()
            .name("event-poller".to_string())
            .spawn(move || poller.run(&flag))?;
        Ok(Self { shutdown, thread })
    }

    /// Stops the poller and waits for it. A sample in progress completes first.
    pub fn shutdown(self) {
        self.shutdown.store(true, Ordering::Release);
        self.thread.thread().unpark();
        if self.thread.join().is_err() {
            tracing::error!("poller thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::mpsc::{self, Receiver, TryRecvError};

    /// Replays a fixed sequence of samples, repeating the last one.
    struct ScriptedSource {
        samples: Mutex<VecDeque<Result<Option<ActivityMarker>, StoreError>>>,
    }

    impl ScriptedSource {
        fn new(samples: Vec<Result<Option<ActivityMarker>, StoreError>>) -> Self {
            Self {
                samples: Mutex::new(samples.into()),
            }
        }
    }

    impl MarkerSource for ScriptedSource {
        fn latest_marker(&self) -> Result<Option<ActivityMarker>, StoreError> {
            let mut samples = self.samples.lock().unwrap();
            if samples.len() > 1 {
                return samples.pop_front().unwrap();
            }
            match samples.front().unwrap() {
                Ok(marker) => Ok(marker.clone()),
                Err(_) => Err(StoreError::MissingTable),
            }
        }
    }

    fn marker(created_at: &str, row_id: i64) -> Option<ActivityMarker> {
        Some(ActivityMarker::new(created_at, row_id))
    }

    fn poller(
        samples: Vec<Result<Option<ActivityMarker>, StoreError>>,
        auto_follow: bool,
    ) -> (Poller<ScriptedSource>, Receiver<PollerMessage>) {
        let (tx, rx) = mpsc::channel();
        let poller = Poller::new(
            ScriptedSource::new(samples),
            tx,
            ActivityTracker::default(),
            PollIntervals::default(),
            Arc::new(AtomicBool::new(auto_follow)),
        );
        (poller, rx)
    }

    fn drain(rx: &Receiver<PollerMessage>) -> Vec<PollerMessage> {
        rx.try_iter().collect()
    }

    #[test]
    fn idle_user_gets_long_interval_until_touched() {
        let start = Instant::now();
        let intervals = PollIntervals::default();
        let tracker = ActivityTracker::starting_at(start);

        let later = start + Duration::from_secs(31);
        assert_eq!(tracker.state_at(later, intervals.idle_after), PollState::Idle);
        assert_eq!(
            intervals.interval_for(tracker.state_at(later, intervals.idle_after)),
            Duration::from_secs(5)
        );

        tracker.touch_at(later);
        assert_eq!(tracker.state_at(later, intervals.idle_after), PollState::Active);
        assert_eq!(
            intervals.interval_for(tracker.state_at(later, intervals.idle_after)),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn recent_activity_is_active() {
        let start = Instant::now();
        let tracker = ActivityTracker::starting_at(start);
        let state = tracker.state_at(start + Duration::from_secs(29), Duration::from_secs(30));
        assert_eq!(state, PollState::Active);
    }

    #[test]
    fn next_interval_follows_shared_tracker() {
        let (poller, _rx) = poller(vec![Ok(None)], false);
        let now = Instant::now();
        poller.activity.touch_at(now);
        assert_eq!(poller.next_interval(now), Duration::from_secs(1));
        assert_eq!(
            poller.next_interval(now + Duration::from_secs(60)),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn unchanged_marker_posts_nothing() {
        let baseline = marker("2025-07-27 23:51:43", 3);
        let (poller, rx) = poller(vec![Ok(baseline.clone())], true);
        let mut poller = poller.with_baseline(baseline);

        assert_eq!(poller.poll_once().unwrap(), PollOutcome::Unchanged);
        assert_eq!(poller.poll_once().unwrap(), PollOutcome::Unchanged);
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn new_marker_requests_refresh_and_follow() {
        let baseline = marker("2025-07-27 23:51:43", 3);
        let (poller, rx) = poller(vec![Ok(marker("2025-07-27 23:51:43", 4))], true);
        let mut poller = poller.with_baseline(baseline);

        assert_eq!(poller.poll_once().unwrap(), PollOutcome::Changed);
        assert_eq!(
            drain(&rx),
            vec![PollerMessage::RefreshRequested, PollerMessage::ScrollToNewest]
        );

        assert_eq!(poller.poll_once().unwrap(), PollOutcome::Unchanged);
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn follow_disabled_only_requests_refresh() {
        let (poller, rx) = poller(vec![Ok(marker("2025-07-27 23:51:44", 1))], false);
        let mut poller = poller.with_baseline(None);

        assert_eq!(poller.poll_once().unwrap(), PollOutcome::Changed);
        assert_eq!(drain(&rx), vec![PollerMessage::RefreshRequested]);
    }

    #[test]
    fn follow_flag_is_read_at_sample_time() {
        let (mut poller, rx) = poller(
            vec![Ok(marker("a", 1)), Ok(marker("b", 2))],
            false,
        );
        poller.poll_once().unwrap();
        assert_eq!(drain(&rx), vec![PollerMessage::RefreshRequested]);

        poller.auto_follow.store(true, Ordering::Release);
        poller.poll_once().unwrap();
        assert_eq!(
            drain(&rx),
            vec![PollerMessage::RefreshRequested, PollerMessage::ScrollToNewest]
        );
    }

    #[test]
    fn sampling_error_becomes_warning_and_keeps_baseline() {
        let baseline = marker("2025-07-27 23:51:43", 3);
        let (poller, rx) = poller(
            vec![Err(StoreError::MissingTable), Ok(baseline.clone())],
            true,
        );
        let mut poller = poller.with_baseline(baseline);

        assert_eq!(poller.poll_once().unwrap(), PollOutcome::Failed);
        let messages = drain(&rx);
        assert_eq!(messages.len(), 1);
        assert!(matches!(&messages[0], PollerMessage::Warning(text) if text.contains("claude_events")));

        assert_eq!(poller.poll_once().unwrap(), PollOutcome::Unchanged);
    }

    #[test]
    fn dropped_receiver_stops_polling() {
        let (mut poller, rx) = poller(vec![Ok(marker("a", 1))], false);
        drop(rx);
        assert!(poller.poll_once().is_err());
    }

    #[test]
    fn shutdown_interrupts_long_wait() {
        let (tx, _rx) = mpsc::channel();
        let intervals = PollIntervals {
            active: Duration::from_secs(600),
            idle: Duration::from_secs(600),
            idle_after: Duration::from_secs(30),
        };
        let poller = Poller::new(
            ScriptedSource::new(vec![Ok(None)]),
            tx,
            ActivityTracker::default(),
            intervals,
            Arc::new(AtomicBool::new(false)),
        );

        let started = Instant::now();
        let handle = PollerHandle::spawn(poller).unwrap();
        handle.shutdown();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn running_poller_reports_changes() {
        let (tx, rx) = mpsc::channel();
        let intervals = PollIntervals {
            active: Duration::from_millis(10),
            idle: Duration::from_millis(10),
            idle_after: Duration::from_secs(30),
        };
        let poller = Poller::new(
            ScriptedSource::new(vec![Ok(marker("a", 1))]),
            tx,
            ActivityTracker::default(),
            intervals,
            Arc::new(AtomicBool::new(false)),
        );

        let handle = PollerHandle::spawn(poller).unwrap();
        let message = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.shutdown();
        assert_eq!(message, PollerMessage::RefreshRequested);
    }
}
