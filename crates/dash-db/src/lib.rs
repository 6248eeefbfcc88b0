//! Read-only storage accessor for the hook event store.
//!
//! The store is an append-only `SQLite` database filled by an external capture
//! hook. This crate only reads it: events, aggregate stats, distinct filter
//! values and a cheap "has anything new arrived" marker.
//!
//! # Thread Safety
//!
//! [`EventStore`] wraps a single `rusqlite::Connection`, which is `Send` but
//! not `Sync`. The dashboard shares it as `Arc<Mutex<EventStore>>` so that the
//! UI refresh and the background poller never issue overlapping queries.
//!
//! # Payloads
//!
//! `tool_input` and `tool_output` are JSON text written without validation.
//! They are parsed lazily per row; text that fails to parse is kept as raw
//! text and never aborts a query. Columns holding non-text values are read
//! leniently for the same reason.

pub mod schema;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use dash_core::{Dimension, Event, EventFilter, Payload, RawEvent, Stats, derive_status};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params_from_iter};
use thiserror::Error;

use crate::schema::{EVENT_COLUMNS, EVENTS_TABLE};

/// How long a query waits on the producer's write lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database file does not exist.
    #[error("database not found at {}", .0.display())]
    NotFound(PathBuf),
    /// The database exists but has no events table.
    #[error("database has no {EVENTS_TABLE} table")]
    MissingTable,
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Opaque token identifying the newest event in the store.
///
/// Ordered by creation time, then by row id so that several events recorded
/// within the same second still change the marker. Only used to detect new
/// data, never for filtering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActivityMarker {
    created_at: String,
    row_id: i64,
}

impl ActivityMarker {
    pub fn new(created_at: impl Into<String>, row_id: i64) -> Self {
        Self {
            created_at: created_at.into(),
            row_id,
        }
    }

    /// Creation time of the newest event, as stored.
    pub fn created_at(&self) -> &str {
        &self.created_at
    }
}

/// Read-only connection to the event store.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct EventStore {
    conn: Connection,
}

impl std::fmt::Debug for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStore")
            .field("path", &self.conn.path())
            .finish_non_exhaustive()
    }
}

impl EventStore {
    /// Connects to an existing store.
    ///
    /// Fails if the file does not exist (it is never created) or lacks the
    /// events table. Callers treat this as fatal; it is not retried.
    pub fn connect(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }
        tracing::info!(path = %path.display(), "connecting to event store");
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let store = Self::from_connection(conn)?;
        tracing::info!("event store connection established");
        Ok(store)
    }

    /// Wraps an already-open connection.
    ///
    /// The connection is switched to `query_only`, so nothing issued through
    /// it can modify the store.
    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "query_only", true)?;
        let store = Self { conn };
        if !store.has_events_table()? {
            return Err(StoreError::MissingTable);
        }
        Ok(store)
    }

    /// Closes the connection, reporting any error from `SQLite`.
    pub fn close(self) -> Result<(), StoreError> {
        self.conn.close().map_err(|(_, err)| StoreError::Sqlite(err))
    }

    fn has_events_table(&self) -> Result<bool, StoreError> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?",
                [EVENTS_TABLE],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Lists events matching `filter`, newest first.
    ///
    /// `limit` and `offset` page through the result for virtual scrolling.
    pub fn query_events(
        &self,
        limit: usize,
        offset: usize,
        filter: &EventFilter,
    ) -> Result<Vec<Event>, StoreError> {
        let clause = WhereClause::build(filter);
        let query = format!(
            "SELECT {EVENT_COLUMNS} FROM {EVENTS_TABLE} {} \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            clause.sql
        );
        let mut params = clause.params;
        params.push(Value::Integer(to_sql_int(limit)));
        params.push(Value::Integer(to_sql_int(offset)));

        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), raw_event_from_row)?;
        let now = Utc::now();
        let mut events = Vec::new();
        for row in rows {
            events.push(Event::from_raw(row?, now));
        }
        tracing::debug!(count = events.len(), limit, offset, "queried events");
        Ok(events)
    }

    /// Returns a marker for the newest event, or `None` if the store is empty.
    pub fn latest_activity_marker(&self) -> Result<Option<ActivityMarker>, StoreError> {
        let query = format!("SELECT MAX(created_at), MAX(id) FROM {EVENTS_TABLE}");
        let (created_at, row_id): (Option<String>, Option<i64>) = self
            .conn
            .query_row(&query, [], |row| Ok((lenient_text(row, 0)?, row.get(1)?)))?;
        Ok(match (created_at, row_id) {
            (None, None) => None,
            (created_at, row_id) => Some(ActivityMarker {
                created_at: created_at.unwrap_or_default(),
                row_id: row_id.unwrap_or_default(),
            }),
        })
    }

    /// Counts events under `filter` by derived status.
    ///
    /// Scans the output payload of every matching row, so the cost is linear
    /// in the filtered set. All four counts come from the same scan.
    pub fn aggregate_stats(&self, filter: &EventFilter) -> Result<Stats, StoreError> {
        let clause = WhereClause::build(filter);
        let query = format!("SELECT tool_output FROM {EVENTS_TABLE} {}", clause.sql);
        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(params_from_iter(clause.params.iter()), |row| {
            lenient_text(row, 0)
        })?;
        let mut stats = Stats::default();
        for output in rows {
            let payload = output?.as_deref().and_then(Payload::parse);
            stats.record(derive_status(payload.as_ref()));
        }
        Ok(stats)
    }

    /// Lists every value observed for `dimension` across the whole store.
    ///
    /// Projects and types are sorted by name; sessions by most recent
    /// activity first. Missing values are skipped.
    pub fn distinct_values(&self, dimension: Dimension) -> Result<Vec<String>, StoreError> {
        let query = match dimension {
            Dimension::Project => format!(
                "SELECT DISTINCT project_name FROM {EVENTS_TABLE} \
                 WHERE project_name IS NOT NULL ORDER BY project_name"
            ),
            Dimension::EventType => {
                format!("SELECT DISTINCT hook_type FROM {EVENTS_TABLE} ORDER BY hook_type")
            }
            Dimension::Session => format!(
                "SELECT session_id FROM {EVENTS_TABLE} WHERE session_id IS NOT NULL \
                 GROUP BY session_id ORDER BY MAX(created_at) DESC, MAX(id) DESC"
            ),
        };
        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map([], |row| lenient_text(row, 0))?;
        let mut values = Vec::new();
        for value in rows {
            if let Some(value) = value? {
                values.push(value);
            }
        }
        Ok(values)
    }
}

/// SQL predicate built from an [`EventFilter`].
#[derive(Debug, Default)]
struct WhereClause {
    sql: String,
    params: Vec<Value>,
}

impl WhereClause {
    fn build(filter: &EventFilter) -> Self {
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        for (dimension, column) in [
            (Dimension::Project, "project_name"),
            (Dimension::EventType, "hook_type"),
            (Dimension::Session, "session_id"),
        ] {
            if let Some(values) = filter.values(dimension) {
                let placeholders = vec!["?"; values.len()].join(", ");
                conditions.push(format!("{column} IN ({placeholders})"));
                params.extend(values.iter().cloned().map(Value::Text));
            }
        }

        if let Some(search) = filter.search.as_deref() {
            let pattern = format!("%{}%", escape_like(search));
            let columns = ["event_id", "hook_type", "user_prompt", "tool_name"];
            let matches: Vec<String> = columns
                .iter()
                .map(|column| format!("{column} LIKE ? ESCAPE '\\'"))
                .collect();
            conditions.push(format!("({})", matches.join(" OR ")));
            params.extend(columns.iter().map(|_| Value::Text(pattern.clone())));
        }

        if conditions.is_empty() {
            return Self::default();
        }
        Self {
            sql: format!("WHERE {}", conditions.join(" AND ")),
            params,
        }
    }
}

/// Escapes `LIKE` wildcards so search text matches literally.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn to_sql_int(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn raw_event_from_row(row: &Row<'_>) -> rusqlite::Result<RawEvent> {
    Ok(RawEvent {
        event_id: lenient_text(row, 0)?.unwrap_or_default(),
        hook_type: lenient_text(row, 1)?.unwrap_or_default(),
        created_at: lenient_text(row, 2)?,
        project_name: lenient_text(row, 3)?,
        session_id: lenient_text(row, 4)?,
        tool_name: lenient_text(row, 5)?,
        user_prompt: lenient_text(row, 6)?,
        tool_input: lenient_text(row, 7)?,
        tool_output: lenient_text(row, 8)?,
    })
}

/// Reads a column as text whatever its storage class.
///
/// Invalid UTF-8 is replaced rather than failing the whole query.
fn lenient_text(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Integer(value) => Some(value.to_string()),
        ValueRef::Real(value) => Some(value.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    })
}
