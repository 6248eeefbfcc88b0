//! Configuration loading and management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::poller::PollIntervals;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Path to the event store written by the capture hook.
    pub database_path: PathBuf,
    /// Where diagnostics are written while the dashboard owns the terminal.
    pub log_path: PathBuf,
    /// Poll interval while the user is active, in milliseconds.
    pub active_poll_ms: u64,
    /// Poll interval once the user is idle, in milliseconds.
    pub idle_poll_ms: u64,
    /// Seconds without input before the user counts as idle.
    pub idle_after_secs: u64,
    /// Rows fetched per page of the event table.
    pub page_size: usize,
    /// How long a footer notice stays visible, in seconds.
    pub notice_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let claude_dir = dirs_claude_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: claude_dir.join("events.db"),
            log_path: claude_dir.join("dashboard.log"),
            active_poll_ms: 1_000,
            idle_poll_ms: 5_000,
            idle_after_secs: 30,
            page_size: 1_000,
            notice_secs: 4,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Sources are layered lowest first: built-in defaults, the user config
    /// file, `config_path`, `CLAUDE_DASHBOARD_*` environment variables, and
    /// finally `database_override` (the `--db` flag).
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(
        config_path: Option<&Path>,
        database_override: Option<&Path>,
    ) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (CLAUDE_DASHBOARD_*)
        figment = figment.merge(Env::prefixed("CLAUDE_DASHBOARD_"));

        if let Some(path) = database_override {
            figment = figment.merge(Serialized::default("database_path", path));
        }

        let mut config: Self = figment.extract()?;
        config.database_path = expand_home(&config.database_path);
        config.log_path = expand_home(&config.log_path);
        Ok(config)
    }

    pub fn poll_intervals(&self) -> PollIntervals {
        PollIntervals {
            active: Duration::from_millis(self.active_poll_ms.max(1)),
            idle: Duration::from_millis(self.idle_poll_ms.max(1)),
            idle_after: Duration::from_secs(self.idle_after_secs),
        }
    }

    /// Page size, never zero.
    pub fn page_size(&self) -> usize {
        self.page_size.max(1)
    }

    pub const fn notice_duration(&self) -> Duration {
        Duration::from_secs(self.notice_secs)
    }
}

/// Replaces a leading `~` with the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// Returns the platform-specific config directory for the dashboard.
///
/// On Linux: `~/.config/claude-dashboard`
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("claude-dashboard"))
}

/// Returns the directory the capture hook writes to: `~/.claude`.
pub fn dirs_claude_path() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".claude"))
}
