//! Case lifecycle events as consumed by the anchor matcher.

use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path;
use crate::types::{CaseId, EventId};

/// Path that selects the event's own creation time.
pub const CREATED_AT_PATH: &str = "created_at";

/// A recorded change in a case's lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseEvent {
    /// Unique identifier for this event.
    pub id: EventId,
    /// The case this event belongs to.
    pub case_id: CaseId,
    /// Raw event type tag. Tags that do not parse as a
    /// [`CaseEventType`](crate::CaseEventType) never match an anchor.
    #[serde(rename = "type")]
    pub kind: String,
    /// When the event was recorded.
    pub created_at: DateTime<Utc>,
    /// Structured payload.
    #[serde(default)]
    pub data: Value,
}

/// An event that anchors can be matched against.
///
/// This trait allows matching to work with different event representations
/// (e.g., rows loaded by cd-db, or test fixtures).
pub trait AnchorEvent {
    /// Returns the event's identifier.
    fn id(&self) -> &EventId;

    /// Returns the event's case identifier.
    fn case_id(&self) -> &CaseId;

    /// Returns the raw event type tag.
    fn kind(&self) -> &str;

    /// Returns when the event was recorded.
    fn created_at(&self) -> DateTime<Utc>;

    /// Returns the event's structured payload.
    fn data(&self) -> &Value;

    /// Resolves a dot-delimited path against the whole event.
    ///
    /// The first segment selects `id`, `case_id`, `type`, `created_at` or
    /// `data`; the remaining segments walk the payload.
    fn field(&self, path: &str) -> Option<Cow<'_, Value>> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let root = match head {
            "data" => Cow::Borrowed(self.data()),
            "id" => Cow::Owned(Value::String(self.id().to_string())),
            "case_id" => Cow::Owned(Value::String(self.case_id().to_string())),
            "type" => Cow::Owned(Value::String(self.kind().to_string())),
            "created_at" => Cow::Owned(Value::String(
                self.created_at()
                    .to_rfc3339_opts(SecondsFormat::AutoSi, true),
            )),
            _ => return None,
        };
        match (root, rest) {
            (root, None) => Some(root),
            (Cow::Borrowed(value), Some(rest)) => path::resolve(value, rest).map(Cow::Borrowed),
            (Cow::Owned(value), Some(rest)) => {
                path::resolve(&value, rest).cloned().map(Cow::Owned)
            }
        }
    }

    /// Extracts a timestamp at `path`, or `None` if it is absent or not a timestamp.
    fn timestamp_at(&self, path: &str) -> Option<DateTime<Utc>> {
        if path == CREATED_AT_PATH {
            return Some(self.created_at());
        }
        self.field(path).and_then(|value| coerce_timestamp(&value))
    }
}

impl AnchorEvent for CaseEvent {
    fn id(&self) -> &EventId {
        &self.id
    }

    fn case_id(&self) -> &CaseId {
        &self.case_id
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn data(&self) -> &Value {
        &self.data
    }
}

/// Date-time layouts carrying an explicit offset, tried after RFC 3339.
const OFFSET_FORMATS: [&str; 8] = [
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%d %H:%M%z",
];

/// Date-time layouts without an offset; these are read as UTC.
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Interprets a JSON value as a UTC timestamp.
///
/// Accepts ISO 8601 strings: RFC 3339, a space instead of `T`, minutes
/// without seconds, numeric offsets with or without a colon, and bare dates
/// (midnight). Values without an offset are assumed UTC.
pub fn coerce_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let text = value.as_str()?.trim();
    let zulu;
    let text = match text.strip_suffix(['Z', 'z']) {
        Some(rest) => {
            zulu = format!("{rest}+00:00");
            zulu.as_str()
        }
        None => text,
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Some(parsed) = OFFSET_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(text, format).ok())
    {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
    {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}
