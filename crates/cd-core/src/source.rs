//! Collaborator interfaces around the pure computation.
//!
//! Storage backends implement these so that a caller can load a case's
//! history and definitions, compute, and hand the records back for upsert
//! without the core performing any I/O itself.

use crate::definition::DurationDefinition;
use crate::event::CaseEvent;
use crate::record::DurationRecord;
use crate::types::{CaseId, WorkspaceId};

/// Supplies a case's event history in ascending creation order.
pub trait EventSource {
    type Error;

    fn case_events(&self, case_id: &CaseId) -> Result<Vec<CaseEvent>, Self::Error>;
}

/// Supplies the definitions active for a workspace.
pub trait DefinitionSource {
    type Error;

    fn list_active(&self, workspace: &WorkspaceId) -> Result<Vec<DurationDefinition>, Self::Error>;
}

/// Accepts computed records for upsert keyed by `(case_id, definition_id)`.
pub trait DurationSink {
    type Error;

    /// Replaces the case's persisted records with `records`.
    ///
    /// Records for definitions absent from `records` are removed. Returns the
    /// number of records written.
    fn sync_case_durations(
        &mut self,
        case_id: &CaseId,
        records: &[DurationRecord],
    ) -> Result<usize, Self::Error>;
}
