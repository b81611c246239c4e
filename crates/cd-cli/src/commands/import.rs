//! Import command for loading case events into the local `SQLite` store.

use std::io::BufRead;

use anyhow::{Context, Result};
use cd_core::event::coerce_timestamp;
use cd_core::{CaseEvent, CaseId, EventId, WorkspaceId};
use cd_db::Database;
use serde::Deserialize;
use serde_json::Value;

/// Reads JSONL events from `reader` and stores them under `workspace`.
///
/// Returns the number of newly inserted events; duplicates are skipped.
pub fn run<R: BufRead>(reader: R, db: &mut Database, workspace: &WorkspaceId) -> Result<usize> {
    let events = parse_events(reader)?;
    let inserted = db
        .insert_events(workspace, &events)
        .context("failed to store events")?;
    if inserted < events.len() {
        tracing::debug!(
            skipped = events.len() - inserted,
            "skipped events that were already imported"
        );
    }
    Ok(inserted)
}

fn parse_events<R: BufRead>(reader: R) -> Result<Vec<CaseEvent>> {
    let mut events = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", idx + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let parsed: ImportEvent = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid JSON on line {}", idx + 1))?;
        let event = parsed
            .into_event()
            .with_context(|| format!("invalid event on line {}", idx + 1))?;
        events.push(event);
    }
    Ok(events)
}

#[derive(Debug, Deserialize)]
struct ImportEvent {
    id: String,
    case_id: String,
    #[serde(rename = "type")]
    kind: String,
    created_at: Value,
    #[serde(default)]
    data: Value,
}

impl ImportEvent {
    fn into_event(self) -> Result<CaseEvent> {
        if self.kind.trim().is_empty() {
            anyhow::bail!("missing type");
        }
        let created_at = coerce_timestamp(&self.created_at)
            .ok_or_else(|| anyhow::anyhow!("invalid created_at: {}", self.created_at))?;
        Ok(CaseEvent {
            id: EventId::new(self.id).context("invalid id")?,
            case_id: CaseId::new(self.case_id).context("invalid case_id")?,
            kind: self.kind,
            created_at,
            data: self.data,
        })
    }
}
