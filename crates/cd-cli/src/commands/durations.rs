//! Durations command for persisted duration records.
//!
//! This module implements `cdur durations list|get|create|update|delete` and
//! holds the record table shared with `cdur compute`. Create and update read
//! JSON documents shaped like [`RecordBounds`] and [`BoundsPatch`].

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use cd_core::{
    BoundsPatch, CaseId, DefinitionId, DefinitionSource, DurationDefinition, DurationRecord,
    DurationStatus, RecordBounds,
};
use cd_db::Database;
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::Serialize;

use super::read_json;

const NAME_WIDTH: usize = 24;

pub fn list<W: Write>(writer: &mut W, db: &Database, case_id: &CaseId, json: bool) -> Result<()> {
    let definitions = case_definitions(db, case_id)?;
    let records = db
        .list_case_durations(case_id)
        .with_context(|| format!("failed to load durations for case {case_id}"))?;
    write_records(writer, case_id, &definitions, &records, json)
}

pub fn get<W: Write>(
    writer: &mut W,
    db: &Database,
    case_id: &CaseId,
    definition_id: &DefinitionId,
    json: bool,
) -> Result<()> {
    let definitions = case_definitions(db, case_id)?;
    let record = db
        .get_case_duration(case_id, definition_id)
        .with_context(|| format!("failed to load duration {definition_id} for case {case_id}"))?;
    if json {
        let names = names_by_id(&definitions);
        writeln!(
            writer,
            "{}",
            serde_json::to_string_pretty(&view(&names, &record))?
        )?;
        return Ok(());
    }
    write_records(
        writer,
        case_id,
        &definitions,
        std::slice::from_ref(&record),
        false,
    )
}

pub fn create<W: Write>(
    writer: &mut W,
    db: &mut Database,
    case_id: &CaseId,
    definition_id: &DefinitionId,
    file: &Path,
) -> Result<()> {
    let bounds: RecordBounds = read_json(file)?;
    let record = db
        .create_case_duration(case_id, definition_id, bounds)
        .with_context(|| format!("failed to create duration {definition_id} for case {case_id}"))?;
    writeln!(
        writer,
        "Created {definition_id} for case {case_id} ({})",
        record.status().as_str()
    )?;
    Ok(())
}

pub fn update<W: Write>(
    writer: &mut W,
    db: &mut Database,
    case_id: &CaseId,
    definition_id: &DefinitionId,
    file: &Path,
) -> Result<()> {
    let patch: BoundsPatch = read_json(file)?;
    if patch.is_empty() {
        tracing::warn!(case_id = %case_id, definition_id = %definition_id, "patch changes nothing");
    }
    let record = db
        .update_case_duration(case_id, definition_id, patch)
        .with_context(|| format!("failed to update duration {definition_id} for case {case_id}"))?;
    writeln!(
        writer,
        "Updated {definition_id} for case {case_id} ({})",
        record.status().as_str()
    )?;
    Ok(())
}

pub fn delete<W: Write>(
    writer: &mut W,
    db: &mut Database,
    case_id: &CaseId,
    definition_id: &DefinitionId,
) -> Result<()> {
    db.delete_case_duration(case_id, definition_id)
        .with_context(|| format!("failed to delete duration {definition_id} for case {case_id}"))?;
    writeln!(writer, "Deleted {definition_id} for case {case_id}")?;
    Ok(())
}

/// Definitions of the workspace the case belongs to.
fn case_definitions(db: &Database, case_id: &CaseId) -> Result<Vec<DurationDefinition>> {
    let Some(workspace) = db.case_workspace(case_id)? else {
        anyhow::bail!("case {case_id} not found");
    };
    db.list_active(&workspace)
        .context("failed to load duration definitions")
}

/// Record plus the fields a reader needs without a second lookup.
#[derive(Debug, Serialize)]
struct RecordView<'a> {
    definition: &'a str,
    status: DurationStatus,
    #[serde(flatten)]
    record: &'a DurationRecord,
}

/// Writes records as a table, or as a JSON array when `json` is set.
pub fn write_records<W: Write>(
    writer: &mut W,
    case_id: &CaseId,
    definitions: &[DurationDefinition],
    records: &[DurationRecord],
    json: bool,
) -> Result<()> {
    let names = names_by_id(definitions);
    if json {
        let views: Vec<RecordView<'_>> = records.iter().map(|record| view(&names, record)).collect();
        writeln!(writer, "{}", serde_json::to_string_pretty(&views)?)?;
        return Ok(());
    }

    writeln!(writer, "DURATIONS for case {case_id}")?;
    writeln!(writer)?;
    if records.is_empty() {
        writeln!(writer, "No durations.")?;
        return Ok(());
    }

    writeln!(
        writer,
        "{:<NAME_WIDTH$}  {:<11}  {:>10}  {:<20}  {}",
        "Name", "Status", "Duration", "Started", "Ended"
    )?;
    for record in records {
        writeln!(
            writer,
            "{:<NAME_WIDTH$}  {:<11}  {:>10}  {:<20}  {}",
            truncate(name_of(&names, record)),
            record.status().as_str(),
            record.duration().map_or_else(|| "-".to_string(), format_duration),
            format_instant(record.started_at()),
            format_instant(record.ended_at()),
        )?;
    }
    Ok(())
}

fn names_by_id(definitions: &[DurationDefinition]) -> HashMap<&DefinitionId, &str> {
    definitions
        .iter()
        .map(|d| (&d.id, d.name.as_str()))
        .collect()
}

fn view<'a>(names: &HashMap<&DefinitionId, &'a str>, record: &'a DurationRecord) -> RecordView<'a> {
    RecordView {
        definition: name_of(names, record),
        status: record.status(),
        record,
    }
}

/// Display name for a record's definition, falling back to its ID.
fn name_of<'a>(names: &HashMap<&DefinitionId, &'a str>, record: &'a DurationRecord) -> &'a str {
    names
        .get(record.definition_id())
        .copied()
        .unwrap_or_else(|| record.definition_id().as_str())
}

/// Formats a duration as days, hours, minutes and seconds, coarsest first.
pub fn format_duration(delta: TimeDelta) -> String {
    let total = delta.num_seconds().max(0);
    let (days, hours, minutes, seconds) =
        (total / 86_400, total / 3600 % 24, total / 60 % 60, total % 60);
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

fn format_instant(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(
        || "-".to_string(),
        |at| at.to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}

// Truncate by characters, not bytes, to avoid panics on multi-byte UTF-8
fn truncate(name: &str) -> String {
    if name.chars().count() > NAME_WIDTH {
        format!("{}...", name.chars().take(NAME_WIDTH - 3).collect::<String>())
    } else {
        name.to_string()
    }
}
