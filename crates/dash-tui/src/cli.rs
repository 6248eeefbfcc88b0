//! Command-line argument definitions.

use std::path::PathBuf;

use clap::Parser;

/// Live terminal dashboard for coding assistant hook events.
///
/// Watches the event database written by the capture hooks and shows recent
/// events, success/error counts and per-event details as they arrive.
#[derive(Debug, Parser)]
#[command(name = "claude-dashboard", version, about, long_about = None)]
pub struct Cli {
    /// Path to the event database [default: ~/.claude/events.db].
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Path to config file.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long)]
    pub debug: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_all_flags() {
        let cli = Cli::try_parse_from([
            "claude-dashboard",
            "--db",
            "/tmp/events.db",
            "-c",
            "/tmp/dashboard.toml",
            "--debug",
        ])
        .unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/events.db")));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/dashboard.toml")));
        assert!(cli.debug);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["claude-dashboard"]).unwrap();
        assert!(cli.db.is_none());
        assert!(cli.config.is_none());
        assert!(!cli.debug);
    }

    #[test]
    fn test_rejects_subcommands() {
        assert!(Cli::try_parse_from(["claude-dashboard", "status"]).is_err());
    }
}
