//! Compute command for resolving every duration of a case.
//!
//! Loads the case's history and its workspace definitions, computes one
//! record per definition, and optionally syncs the result to the database.

use std::io::Write;

use anyhow::{Context, Result};
use cd_core::{CaseId, DefinitionSource, DurationSink, EventSource, compute_all};
use cd_db::Database;

use super::durations::write_records;

pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    case_id: &CaseId,
    json: bool,
    sync: bool,
) -> Result<()> {
    let Some(workspace) = db.case_workspace(case_id)? else {
        anyhow::bail!("case {case_id} not found");
    };
    let definitions = db
        .list_active(&workspace)
        .context("failed to load duration definitions")?;
    let events = db
        .case_events(case_id)
        .with_context(|| format!("failed to load events for case {case_id}"))?;

    if definitions.is_empty() {
        tracing::warn!(workspace = %workspace, "no duration definitions configured");
    }

    let records = compute_all(&definitions, case_id, &events)
        .with_context(|| format!("failed to compute durations for case {case_id}"))?;

    if sync {
        let written = db
            .sync_case_durations(case_id, &records)
            .context("failed to sync case durations")?;
        tracing::debug!(case_id = %case_id, written, "persisted case durations");
    }

    write_records(writer, case_id, &definitions, &records, json)
}
