//! Anchor matching over an ordered event history.
//!
//! # Algorithm
//!
//! 1. Keep events whose type tag parses to the anchor's event type
//! 2. Keep events where every field filter matches
//! 3. Keep events whose timestamp path resolves to a timestamp
//! 4. Pick the first or last survivor in history order
//!
//! History order is the tie-breaker, so events sharing a timestamp are
//! selected stably.

use chrono::{DateTime, Utc};

use crate::anchor::{AnchorSelection, EventAnchor};
use crate::event::AnchorEvent;
use crate::event_type::CaseEventType;
use crate::path;

/// An event selected by an anchor, with its boundary timestamp.
#[derive(Debug)]
pub struct AnchorMatch<'e, E> {
    /// The selected event.
    pub event: &'e E,
    /// Timestamp extracted via the anchor's timestamp path.
    pub timestamp: DateTime<Utc>,
}

impl<E> Clone for AnchorMatch<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for AnchorMatch<'_, E> {}

/// Selects the event in `events` satisfying `anchor`, if any.
///
/// `events` must be in ascending chronological order.
pub fn match_anchor<'e, E: AnchorEvent>(
    anchor: &EventAnchor,
    events: &'e [E],
) -> Option<AnchorMatch<'e, E>> {
    let select = |event: &'e E| candidate(anchor, event);
    match anchor.selection {
        AnchorSelection::First => events.iter().find_map(select),
        AnchorSelection::Last => events.iter().rev().find_map(select),
    }
}

fn candidate<'e, E: AnchorEvent>(anchor: &EventAnchor, event: &'e E) -> Option<AnchorMatch<'e, E>> {
    if !has_type(event, anchor.event_type) || !matches_filters(event, anchor) {
        return None;
    }
    let timestamp = event.timestamp_at(&anchor.timestamp_path)?;
    Some(AnchorMatch { event, timestamp })
}

fn has_type<E: AnchorEvent>(event: &E, expected: CaseEventType) -> bool {
    event
        .kind()
        .parse::<CaseEventType>()
        .is_ok_and(|kind| kind == expected)
}

fn matches_filters<E: AnchorEvent>(event: &E, anchor: &EventAnchor) -> bool {
    anchor.field_filters.iter().all(|(filter_path, expected)| {
        let actual = event.field(filter_path);
        path::filter_matches(actual.as_deref(), expected)
    })
}
