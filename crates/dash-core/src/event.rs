//! Hook events as shown by the dashboard.
//!
//! Stored rows carry no status column. The status of an event is derived from
//! its output payload every time the row is read, so a change to the
//! derivation rules applies to historic events without any migration.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Format the producer uses for `created_at` (`CURRENT_TIMESTAMP`, UTC).
const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Outcome of an event, derived from its output payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
    Warning,
}

impl Status {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
        }
    }

    /// Single-cell glyph used in the event table.
    #[must_use]
    pub const fn glyph(&self) -> &'static str {
        match self {
            Self::Success => "✓",
            Self::Error => "✗",
            Self::Warning => "⚠",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured payload parsed from stored text.
///
/// Text that is not valid JSON is kept verbatim as [`Payload::Raw`] rather
/// than dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Json(Value),
    Raw(String),
}

impl Payload {
    /// Parses stored payload text. Blank text is treated as no payload.
    pub fn parse(text: &str) -> Option<Self> {
        if text.trim().is_empty() {
            return None;
        }
        Some(
            serde_json::from_str(text)
                .map_or_else(|_| Self::Raw(text.to_string()), Self::Json),
        )
    }

    /// Returns the payload as a JSON object, if it is one.
    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Json(Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    /// Human-readable form for the detail pane.
    pub fn to_pretty_string(&self) -> String {
        match self {
            Self::Json(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            Self::Raw(text) => text.clone(),
        }
    }
}

/// Derives the status of an event from its output payload.
///
/// - `Error` if the payload has a truthy `error` or a non-zero `exit_code`
/// - `Warning` if it has a truthy `warning`
/// - `Success` otherwise, including absent, raw or non-object payloads
pub fn derive_status(output: Option<&Payload>) -> Status {
    let Some(fields) = output.and_then(Payload::as_object) else {
        return Status::Success;
    };
    if fields.get("error").is_some_and(is_truthy)
        || fields.get("exit_code").is_some_and(exit_code_failed)
    {
        Status::Error
    } else if fields.get("warning").is_some_and(is_truthy) {
        Status::Warning
    } else {
        Status::Success
    }
}

/// Error text for an output payload, present only when the status is `Error`.
///
/// A string `error` is returned verbatim, other values as compact JSON, and
/// an absent or null `error` (failure by exit code alone) as an empty string.
pub fn error_details(output: Option<&Payload>) -> Option<String> {
    if derive_status(output) != Status::Error {
        return None;
    }
    let error = output
        .and_then(Payload::as_object)
        .and_then(|fields| fields.get("error"));
    Some(match error {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n.abs() > 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

/// Any present `exit_code` other than numeric zero or `false` is a failure,
/// including `null` and numeric strings.
fn exit_code_failed(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_none_or(|n| n != 0.0),
        Value::Null | Value::String(_) | Value::Array(_) | Value::Object(_) => true,
    }
}

/// A row as stored by the capture hook, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEvent {
    pub event_id: String,
    pub hook_type: String,
    pub created_at: Option<String>,
    pub project_name: Option<String>,
    pub session_id: Option<String>,
    pub tool_name: Option<String>,
    pub user_prompt: Option<String>,
    pub tool_input: Option<String>,
    pub tool_output: Option<String>,
}

/// A display-ready event.
///
/// Events are rebuilt from storage on every refresh and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Unique identifier, stable across refreshes.
    pub id: String,
    /// When the event was recorded (millisecond resolution).
    pub timestamp: DateTime<Utc>,
    /// Hook type, e.g. `PreToolUse`. Open set.
    pub event_type: String,
    pub project: Option<String>,
    pub session_id: Option<String>,
    pub tool: Option<String>,
    pub prompt: Option<String>,
    pub input: Option<Payload>,
    pub output: Option<Payload>,
}

impl Event {
    /// Normalizes a stored row.
    ///
    /// A missing or unparseable `created_at` falls back to `now`.
    pub fn from_raw(raw: RawEvent, now: DateTime<Utc>) -> Self {
        let timestamp = raw
            .created_at
            .as_deref()
            .and_then(parse_created_at)
            .unwrap_or(now);
        Self {
            id: raw.event_id,
            timestamp,
            event_type: raw.hook_type,
            project: raw.project_name,
            session_id: raw.session_id,
            tool: raw.tool_name,
            prompt: raw.user_prompt,
            input: raw.tool_input.as_deref().and_then(Payload::parse),
            output: raw.tool_output.as_deref().and_then(Payload::parse),
        }
    }

    /// Status derived from the output payload. Computed on every call.
    pub fn status(&self) -> Status {
        derive_status(self.output.as_ref())
    }

    /// Error text, present only when [`Event::status`] is `Error`.
    pub fn error_details(&self) -> Option<String> {
        error_details(self.output.as_ref())
    }

    /// Timestamp in milliseconds since the Unix epoch.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

/// Parses a `created_at` value: `YYYY-MM-DD HH:MM:SS` (UTC) or RFC 3339.
pub fn parse_created_at(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, CREATED_AT_FORMAT) {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}
