//! Schema of the event store as written by the capture hook.
//!
//! The dashboard never creates or alters tables. These definitions describe
//! the producer's table so that queries and test fixtures agree on it.

/// Name of the table holding hook events.
pub const EVENTS_TABLE: &str = "claude_events";

/// DDL executed by the capture hook when it first creates the store.
///
/// - `event_id`: unique key derived from session, timestamp and hook type
/// - `tool_input` / `tool_output`: JSON text, not validated by the producer
/// - `created_at`: `YYYY-MM-DD HH:MM:SS` in UTC, set by `SQLite`
pub const PRODUCER_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS claude_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        event_id TEXT UNIQUE NOT NULL,
        hook_type TEXT NOT NULL,
        session_id TEXT,
        project_name TEXT,
        project_dir TEXT,
        timestamp TEXT,
        tool_name TEXT,
        tool_input TEXT,
        tool_output TEXT,
        user_prompt TEXT,
        transcript_path TEXT,
        cwd TEXT,
        environment TEXT,
        full_event TEXT NOT NULL,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_hook_type ON claude_events(hook_type);
    CREATE INDEX IF NOT EXISTS idx_tool_name ON claude_events(tool_name);
    CREATE INDEX IF NOT EXISTS idx_session_id ON claude_events(session_id);
    CREATE INDEX IF NOT EXISTS idx_project_name ON claude_events(project_name);
    CREATE INDEX IF NOT EXISTS idx_timestamp ON claude_events(timestamp);
";

/// Columns read for a display event, in `RawEvent` field order.
pub(crate) const EVENT_COLUMNS: &str = "event_id, hook_type, created_at, project_name, session_id, \
     tool_name, user_prompt, tool_input, tool_output";
