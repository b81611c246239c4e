//! Duration resolution: turns a definition and a case's event history into a
//! [`DurationRecord`].
//!
//! # Algorithm Summary
//!
//! 1. Match the start anchor and the end anchor independently
//! 2. Extract each boundary timestamp from the matched event
//! 3. Drop an end boundary that precedes the start boundary
//! 4. Compute elapsed time only when both boundaries remain
//!
//! Resolution is pure: identical inputs always produce identical records.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use thiserror::Error;

use crate::definition::DurationDefinition;
use crate::event::AnchorEvent;
use crate::matcher::{AnchorMatch, match_anchor};
use crate::record::{Boundary, DurationRecord};
use crate::types::CaseId;

/// Caller contract violations detected before computation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComputeError {
    /// The event history is not in ascending `created_at` order.
    #[error(
        "event history is not ordered: event {event_id} at index {index} ({created_at}) precedes its predecessor ({previous})"
    )]
    UnorderedHistory {
        index: usize,
        event_id: String,
        created_at: DateTime<Utc>,
        previous: DateTime<Utc>,
    },
}

/// Computes the duration for `definition` over a case's event history.
///
/// `events` must be ascending by creation time; a violation is reported as
/// [`ComputeError::UnorderedHistory`].
pub fn compute<E: AnchorEvent>(
    definition: &DurationDefinition,
    case_id: &CaseId,
    events: &[E],
) -> Result<DurationRecord, ComputeError> {
    ensure_ordered(events)?;
    Ok(resolve(definition, case_id, events))
}

/// Computes every definition over the same history.
///
/// Definitions are resolved independently and in parallel; the output keeps
/// the order of `definitions`, one record per definition.
pub fn compute_all<E: AnchorEvent + Sync>(
    definitions: &[DurationDefinition],
    case_id: &CaseId,
    events: &[E],
) -> Result<Vec<DurationRecord>, ComputeError> {
    ensure_ordered(events)?;
    let records: Vec<DurationRecord> = definitions
        .par_iter()
        .map(|definition| resolve(definition, case_id, events))
        .collect();
    tracing::debug!(
        case_id = %case_id,
        definitions = definitions.len(),
        events = events.len(),
        completed = records.iter().filter(|r| r.duration().is_some()).count(),
        "computed case durations"
    );
    Ok(records)
}

/// Checks that `events` is non-decreasing by creation time.
pub fn ensure_ordered<E: AnchorEvent>(events: &[E]) -> Result<(), ComputeError> {
    for (index, pair) in events.windows(2).enumerate() {
        let (previous, current) = (&pair[0], &pair[1]);
        if current.created_at() < previous.created_at() {
            return Err(ComputeError::UnorderedHistory {
                index: index + 1,
                event_id: current.id().to_string(),
                created_at: current.created_at(),
                previous: previous.created_at(),
            });
        }
    }
    Ok(())
}

fn resolve<E: AnchorEvent>(
    definition: &DurationDefinition,
    case_id: &CaseId,
    events: &[E],
) -> DurationRecord {
    let start = match_anchor(&definition.start_anchor, events);
    let end = match_anchor(&definition.end_anchor, events);
    if start.is_none() || end.is_none() {
        tracing::debug!(
            definition_id = %definition.id,
            case_id = %case_id,
            start_matched = start.is_some(),
            end_matched = end.is_some(),
            "duration unresolved"
        );
    }
    DurationRecord::from_bounds(
        definition.id.clone(),
        case_id.clone(),
        start.map(boundary),
        end.map(boundary),
    )
}

fn boundary<E: AnchorEvent>(m: AnchorMatch<'_, E>) -> Boundary {
    Boundary::new(m.event.id().clone(), m.timestamp)
}
