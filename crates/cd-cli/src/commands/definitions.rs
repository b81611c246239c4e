//! Definitions command for administering duration definitions.
//!
//! This module implements `cdur definitions list|get|create|update|delete`.
//! Create and update read JSON documents shaped like [`DefinitionDraft`] and
//! [`DefinitionPatch`].

use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use cd_core::{
    DefinitionDraft, DefinitionId, DefinitionPatch, DurationDefinition, EventAnchor, WorkspaceId,
};
use cd_db::Database;

use super::read_json;

pub fn list<W: Write>(
    writer: &mut W,
    db: &Database,
    workspace: &WorkspaceId,
    json: bool,
) -> Result<()> {
    let definitions = db.list_definitions(workspace)?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&definitions)?)?;
        return Ok(());
    }

    writeln!(writer, "DEFINITIONS ({workspace})")?;
    writeln!(writer)?;
    if definitions.is_empty() {
        writeln!(writer, "No duration definitions.")?;
        writeln!(writer)?;
        writeln!(
            writer,
            "Hint: Run 'cdur definitions create --file <json>' to add one."
        )?;
        return Ok(());
    }

    for definition in &definitions {
        write_definition(writer, definition)?;
    }
    Ok(())
}

pub fn get<W: Write>(
    writer: &mut W,
    db: &Database,
    workspace: &WorkspaceId,
    id: &DefinitionId,
    json: bool,
) -> Result<()> {
    let definition = db
        .get_definition(workspace, id)
        .with_context(|| format!("failed to load duration definition {id}"))?;
    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&definition)?)?;
        return Ok(());
    }
    write_definition(writer, &definition)
}

pub fn create<W: Write>(
    writer: &mut W,
    db: &mut Database,
    workspace: &WorkspaceId,
    file: &Path,
) -> Result<DefinitionId> {
    let draft: DefinitionDraft = read_json(file)?;
    let definition = db
        .create_definition(workspace, draft)
        .context("failed to create duration definition")?;
    writeln!(writer, "Created {} ({})", definition.id, definition.name)?;
    Ok(definition.id)
}

pub fn update<W: Write>(
    writer: &mut W,
    db: &mut Database,
    workspace: &WorkspaceId,
    id: &DefinitionId,
    file: &Path,
) -> Result<()> {
    let patch: DefinitionPatch = read_json(file)?;
    if patch.is_empty() {
        tracing::warn!(definition_id = %id, "patch changes nothing");
    }
    let definition = db
        .update_definition(workspace, id, patch)
        .with_context(|| format!("failed to update duration definition {id}"))?;
    writeln!(writer, "Updated {} ({})", definition.id, definition.name)?;
    Ok(())
}

pub fn delete<W: Write>(
    writer: &mut W,
    db: &mut Database,
    workspace: &WorkspaceId,
    id: &DefinitionId,
) -> Result<()> {
    db.delete_definition(workspace, id)
        .with_context(|| format!("failed to delete duration definition {id}"))?;
    writeln!(writer, "Deleted {id}")?;
    Ok(())
}

fn write_definition<W: Write>(writer: &mut W, definition: &DurationDefinition) -> Result<()> {
    writeln!(writer, "{}  {}", definition.id, definition.name)?;
    if let Some(description) = &definition.description {
        writeln!(writer, "  {description}")?;
    }
    writeln!(writer, "  start: {}", describe_anchor(&definition.start_anchor))?;
    writeln!(writer, "  end:   {}", describe_anchor(&definition.end_anchor))?;
    Ok(())
}

/// One-line summary such as `first case_closed @ created_at where data.x = "y"`.
fn describe_anchor(anchor: &EventAnchor) -> String {
    let mut out = format!(
        "{} {} @ {}",
        anchor.selection, anchor.event_type, anchor.timestamp_path
    );
    for (i, (path, expected)) in anchor.field_filters.iter().enumerate() {
        let joiner = if i == 0 { "where" } else { "and" };
        // Writing to a String cannot fail.
        let _ = write!(out, " {joiner} {path} = {expected}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    use cd_core::{AnchorSelection, CaseEventType};
    use insta::assert_snapshot;

    fn write_file(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    const DRAFT: &str = r#"{
        "name": "Time to resolve",
        "description": "Created until resolved as fixed",
        "start_anchor": {"event_type": "case_created"},
        "end_anchor": {
            "event_type": "closed",
            "selection": "last",
            "field_filters": {"data.resolution": "fixed", "data.reviewed": true}
        }
    }"#;

    #[test]
    fn describe_anchor_lists_filters() {
        let anchor = EventAnchor::new(CaseEventType::StatusChanged)
            .with_selection(AnchorSelection::Last)
            .with_timestamp_path("data.changed_at")
            .with_filter("data.new", "resolved");
        assert_eq!(
            describe_anchor(&anchor),
            r#"last status_changed @ data.changed_at where data.new = "resolved""#
        );
    }

    #[test]
    fn create_then_list() {
        let temp = tempfile::tempdir().unwrap();
        let file = write_file(temp.path(), "draft.json", DRAFT);
        let mut db = Database::open_in_memory().unwrap();
        let workspace = WorkspaceId::new("default").unwrap();

        let id = create(&mut Vec::new(), &mut db, &workspace, &file).unwrap();

        let mut output = Vec::new();
        list(&mut output, &db, &workspace, false).unwrap();
        let output = String::from_utf8(output)
            .unwrap()
            .replace(id.as_str(), "[ID]");
        assert_snapshot!(output, @r#"
        DEFINITIONS (default)

        [ID]  Time to resolve
          Created until resolved as fixed
          start: first case_created @ created_at
          end:   last case_closed @ created_at where data.resolution = "fixed" and data.reviewed = true
        "#);
    }

    #[test]
    fn get_shows_one_definition() {
        let temp = tempfile::tempdir().unwrap();
        let file = write_file(temp.path(), "draft.json", DRAFT);
        let mut db = Database::open_in_memory().unwrap();
        let workspace = WorkspaceId::new("default").unwrap();
        let id = create(&mut Vec::new(), &mut db, &workspace, &file).unwrap();

        let mut output = Vec::new();
        get(&mut output, &db, &workspace, &id, false).unwrap();
        let output = String::from_utf8(output)
            .unwrap()
            .replace(id.as_str(), "[ID]");
        assert_snapshot!(output, @r#"
        [ID]  Time to resolve
          Created until resolved as fixed
          start: first case_created @ created_at
          end:   last case_closed @ created_at where data.resolution = "fixed" and data.reviewed = true
        "#);

        let mut output = Vec::new();
        get(&mut output, &db, &workspace, &id, true).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(parsed["id"], id.as_str());
        assert_eq!(parsed["end_anchor"]["selection"], "last");

        let other = WorkspaceId::new("other").unwrap();
        let err = get(&mut Vec::new(), &db, &other, &id, false).unwrap_err();
        assert_eq!(
            format!("{err:#}"),
            format!("failed to load duration definition {id}: duration definition {id} not found")
        );
    }

    #[test]
    fn list_empty_workspace_shows_hint() {
        let db = Database::open_in_memory().unwrap();
        let workspace = WorkspaceId::new("default").unwrap();
        let mut output = Vec::new();
        list(&mut output, &db, &workspace, false).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        DEFINITIONS (default)

        No duration definitions.

        Hint: Run 'cdur definitions create --file <json>' to add one.
        ");
    }

    #[test]
    fn update_and_delete_by_id() {
        let temp = tempfile::tempdir().unwrap();
        let draft = write_file(temp.path(), "draft.json", DRAFT);
        let patch = write_file(temp.path(), "patch.json", r#"{"name": "TTR", "description": null}"#);
        let mut db = Database::open_in_memory().unwrap();
        let workspace = WorkspaceId::new("default").unwrap();
        let id = create(&mut Vec::new(), &mut db, &workspace, &draft).unwrap();

        update(&mut Vec::new(), &mut db, &workspace, &id, &patch).unwrap();
        let updated = db.get_definition(&workspace, &id).unwrap();
        assert_eq!(updated.name, "TTR");
        assert_eq!(updated.description, None);

        let mut output = Vec::new();
        delete(&mut output, &mut db, &workspace, &id).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), format!("Deleted {id}\n"));
        assert!(delete(&mut Vec::new(), &mut db, &workspace, &id).is_err());
    }

    #[test]
    fn create_reports_duplicate_names() {
        let temp = tempfile::tempdir().unwrap();
        let file = write_file(temp.path(), "draft.json", DRAFT);
        let mut db = Database::open_in_memory().unwrap();
        let workspace = WorkspaceId::new("default").unwrap();
        create(&mut Vec::new(), &mut db, &workspace, &file).unwrap();

        let err = create(&mut Vec::new(), &mut db, &workspace, &file).unwrap_err();
        assert_eq!(
            format!("{err:#}"),
            "failed to create duration definition: a duration named 'Time to resolve' already exists"
        );
    }

    #[test]
    fn create_rejects_unknown_event_type() {
        let temp = tempfile::tempdir().unwrap();
        let file = write_file(
            temp.path(),
            "draft.json",
            r#"{"name": "x", "start_anchor": {"event_type": "case_exploded"}, "end_anchor": {"event_type": "case_closed"}}"#,
        );
        let mut db = Database::open_in_memory().unwrap();
        let workspace = WorkspaceId::new("default").unwrap();
        let err = create(&mut Vec::new(), &mut db, &workspace, &file).unwrap_err();
        assert!(err.to_string().starts_with("invalid JSON in"));
    }
}
