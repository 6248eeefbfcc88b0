use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use dash_db::EventStore;
use dash_tui::{Cli, Config};

/// Sends diagnostics to `log_path`; the terminal belongs to the dashboard.
fn init_tracing(log_path: &Path, debug: bool) -> Result<()> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("failed to create log directory")?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_from(cli.config.as_deref(), cli.db.as_deref())
        .context("failed to load configuration")?;
    init_tracing(&config.log_path, cli.debug)?;
    tracing::debug!(?config, "loaded configuration");

    let store = EventStore::connect(&config.database_path).with_context(|| {
        format!(
            "failed to open event database {}",
            config.database_path.display()
        )
    })?;
    tracing::info!(path = %config.database_path.display(), "connected to event database");

    dash_tui::run(store, &config)
}
