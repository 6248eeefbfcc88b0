//! Live terminal dashboard for coding assistant hook events.
//!
//! This crate provides the TUI: configuration, the background poller, the
//! view model and the ratatui front end.

pub mod app;
mod cli;
mod config;
pub mod poller;
mod runtime;
pub mod ui;
pub mod view;

pub use cli::Cli;
pub use config::{Config, expand_home};
pub use runtime::run;
