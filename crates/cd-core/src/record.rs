//! Materialized duration records.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::definition::deserialize_some;
use crate::types::{CaseId, DefinitionId, EventId, ValidationError};

/// One resolved boundary of a duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boundary {
    pub event_id: EventId,
    pub at: DateTime<Utc>,
}

impl Boundary {
    pub const fn new(event_id: EventId, at: DateTime<Utc>) -> Self {
        Self { event_id, at }
    }
}

/// Manually supplied boundaries for a stored record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RecordBounds {
    #[serde(default)]
    pub start: Option<Boundary>,
    #[serde(default)]
    pub end: Option<Boundary>,
}

/// Partial update of a stored record's boundaries.
///
/// An omitted field keeps the current boundary; an explicit `null` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BoundsPatch {
    #[serde(default, deserialize_with = "deserialize_some")]
    pub start: Option<Option<Boundary>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub end: Option<Option<Boundary>>,
}

impl BoundsPatch {
    pub const fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Computed duration for one case and one definition.
///
/// Construct via [`DurationRecord::from_bounds`], which guarantees that a
/// duration is only present when both timestamps are present and the end is
/// not before the start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DurationRecord {
    definition_id: DefinitionId,
    case_id: CaseId,
    start_event_id: Option<EventId>,
    end_event_id: Option<EventId>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    #[serde(rename = "duration_ms", serialize_with = "serialize_duration_ms")]
    duration: Option<TimeDelta>,
}

impl DurationRecord {
    /// Builds a record from optional start and end boundaries.
    ///
    /// An end that precedes the start cannot close the duration and is
    /// dropped, leaving the record in progress.
    pub fn from_bounds(
        definition_id: DefinitionId,
        case_id: CaseId,
        start: Option<Boundary>,
        end: Option<Boundary>,
    ) -> Self {
        let end = match (&start, end) {
            (Some(start), Some(end)) if end.at < start.at => {
                tracing::debug!(
                    definition_id = %definition_id,
                    case_id = %case_id,
                    started_at = %start.at,
                    ended_at = %end.at,
                    "end anchor precedes start anchor, leaving duration open"
                );
                None
            }
            (_, end) => end,
        };
        let duration = match (&start, &end) {
            (Some(start), Some(end)) => Some(end.at - start.at),
            _ => None,
        };
        let (start_event_id, started_at) = split(start);
        let (end_event_id, ended_at) = split(end);
        Self {
            definition_id,
            case_id,
            start_event_id,
            end_event_id,
            started_at,
            ended_at,
            duration,
        }
    }

    /// Builds a record from boundaries supplied by an operator.
    ///
    /// Unlike [`DurationRecord::from_bounds`], an end before the start is an
    /// error instead of being dropped.
    pub fn from_input(
        definition_id: DefinitionId,
        case_id: CaseId,
        bounds: RecordBounds,
    ) -> Result<Self, ValidationError> {
        if let (Some(start), Some(end)) = (&bounds.start, &bounds.end) {
            if end.at < start.at {
                return Err(ValidationError::EndBeforeStart {
                    start: start.at,
                    end: end.at,
                });
            }
        }
        Ok(Self::from_bounds(
            definition_id,
            case_id,
            bounds.start,
            bounds.end,
        ))
    }

    /// Applies a boundary patch, re-deriving the duration.
    pub fn patched(&self, patch: BoundsPatch) -> Result<Self, ValidationError> {
        let bounds = RecordBounds {
            start: patch.start.unwrap_or_else(|| self.start()),
            end: patch.end.unwrap_or_else(|| self.end()),
        };
        Self::from_input(self.definition_id.clone(), self.case_id.clone(), bounds)
    }

    pub fn start(&self) -> Option<Boundary> {
        join(self.start_event_id.clone(), self.started_at)
    }

    pub fn end(&self) -> Option<Boundary> {
        join(self.end_event_id.clone(), self.ended_at)
    }

    pub const fn definition_id(&self) -> &DefinitionId {
        &self.definition_id
    }

    pub const fn case_id(&self) -> &CaseId {
        &self.case_id
    }

    pub const fn start_event_id(&self) -> Option<&EventId> {
        self.start_event_id.as_ref()
    }

    pub const fn end_event_id(&self) -> Option<&EventId> {
        self.end_event_id.as_ref()
    }

    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Elapsed time, present only when both boundaries resolved.
    pub const fn duration(&self) -> Option<TimeDelta> {
        self.duration
    }

    /// Lifecycle state of the duration.
    pub fn status(&self) -> DurationStatus {
        match (self.started_at, self.ended_at, self.duration) {
            (_, _, Some(_)) => DurationStatus::Completed,
            (None, None, None) => DurationStatus::NotStarted,
            _ => DurationStatus::InProgress,
        }
    }
}

fn split(boundary: Option<Boundary>) -> (Option<EventId>, Option<DateTime<Utc>>) {
    boundary.map_or((None, None), |b| (Some(b.event_id), Some(b.at)))
}

fn join(event_id: Option<EventId>, at: Option<DateTime<Utc>>) -> Option<Boundary> {
    event_id.zip(at).map(|(event_id, at)| Boundary::new(event_id, at))
}

fn serialize_duration_ms<S: Serializer>(
    duration: &Option<TimeDelta>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    duration
        .map(|d| d.num_milliseconds())
        .serialize(serializer)
}

/// Whether a duration has started and finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationStatus {
    /// Neither boundary has a matching event.
    NotStarted,
    /// Exactly one boundary has a matching event.
    InProgress,
    /// Both boundaries resolved.
    Completed,
}

impl DurationStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for DurationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 10, hour, 0, 0).unwrap()
    }

    fn boundary(id: &str, hour: u32) -> Option<Boundary> {
        Some(Boundary::new(EventId::new(id).unwrap(), at(hour)))
    }

    fn record(start: Option<Boundary>, end: Option<Boundary>) -> DurationRecord {
        DurationRecord::from_bounds(
            DefinitionId::new("def-1").unwrap(),
            CaseId::new("case-1").unwrap(),
            start,
            end,
        )
    }

    #[test]
    fn completed_record_has_elapsed_time() {
        let r = record(boundary("s", 1), boundary("e", 4));
        assert_eq!(r.duration(), Some(TimeDelta::hours(3)));
        assert_eq!(r.status(), DurationStatus::Completed);
        assert_eq!(r.end_event_id().map(EventId::as_str), Some("e"));
    }

    #[test]
    fn zero_length_is_distinct_from_absent() {
        let r = record(boundary("same", 2), boundary("same", 2));
        assert_eq!(r.duration(), Some(TimeDelta::zero()));
        assert_eq!(r.status(), DurationStatus::Completed);
    }

    #[test]
    fn end_before_start_is_dropped() {
        let r = record(boundary("s", 5), boundary("e", 3));
        assert_eq!(r.started_at(), Some(at(5)));
        assert_eq!(r.ended_at(), None);
        assert_eq!(r.end_event_id(), None);
        assert_eq!(r.duration(), None);
        assert_eq!(r.status(), DurationStatus::InProgress);
    }

    #[test]
    fn missing_boundaries() {
        assert_eq!(record(None, None).status(), DurationStatus::NotStarted);
        assert_eq!(record(boundary("s", 1), None).status(), DurationStatus::InProgress);

        let end_only = record(None, boundary("e", 1));
        assert_eq!(end_only.status(), DurationStatus::InProgress);
        assert_eq!(end_only.ended_at(), Some(at(1)));
        assert_eq!(end_only.duration(), None);
    }

    #[test]
    fn serializes_duration_as_milliseconds() {
        let r = record(boundary("s", 1), boundary("e", 2));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["duration_ms"], 3_600_000);
        assert_eq!(json["started_at"], "2025-02-10T01:00:00Z");

        let open = serde_json::to_value(record(None, None)).unwrap();
        assert!(open["duration_ms"].is_null());
    }

    #[test]
    fn in_progress_record_json() {
        let r = record(boundary("s", 1), None);
        insta::assert_snapshot!(serde_json::to_string_pretty(&r).unwrap(), @r#"
        {
          "definition_id": "def-1",
          "case_id": "case-1",
          "start_event_id": "s",
          "end_event_id": null,
          "started_at": "2025-02-10T01:00:00Z",
          "ended_at": null,
          "duration_ms": null
        }
        "#);
    }

    #[test]
    fn operator_bounds_reject_reversed_order() {
        let bounds = RecordBounds {
            start: boundary("s", 5),
            end: boundary("e", 3),
        };
        let err = DurationRecord::from_input(
            DefinitionId::new("def-1").unwrap(),
            CaseId::new("case-1").unwrap(),
            bounds,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::EndBeforeStart {
                start: at(5),
                end: at(3),
            }
        );
    }

    #[test]
    fn patch_keeps_omitted_and_clears_null() {
        let original = record(boundary("s", 1), boundary("e", 4));

        let patch: BoundsPatch =
            serde_json::from_str(r#"{"end": {"event_id": "e2", "at": "2025-02-10T06:00:00Z"}}"#)
                .unwrap();
        let moved = original.patched(patch).unwrap();
        assert_eq!(moved.start(), original.start());
        assert_eq!(moved.end_event_id().map(EventId::as_str), Some("e2"));
        assert_eq!(moved.duration(), Some(TimeDelta::hours(5)));

        let patch: BoundsPatch = serde_json::from_str(r#"{"end": null}"#).unwrap();
        let reopened = original.patched(patch).unwrap();
        assert_eq!(reopened.end(), None);
        assert_eq!(reopened.duration(), None);
        assert_eq!(reopened.status(), DurationStatus::InProgress);

        let patch: BoundsPatch =
            serde_json::from_str(r#"{"start": {"event_id": "s2", "at": "2025-02-10T09:00:00Z"}}"#)
                .unwrap();
        assert!(matches!(
            original.patched(patch),
            Err(ValidationError::EndBeforeStart { .. })
        ));
    }

    #[test]
    fn empty_patch() {
        let patch: BoundsPatch = serde_json::from_str("{}").unwrap();
        assert!(patch.is_empty());
    }

    #[test]
    fn status_display() {
        assert_eq!(DurationStatus::InProgress.to_string(), "in_progress");
    }
}
