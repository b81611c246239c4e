//! Status command for showing what the database holds for a workspace.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use cd_core::WorkspaceId;
use cd_db::Database;

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    database_path: &Path,
    workspace: &WorkspaceId,
) -> Result<()> {
    let summary = db.workspace_summary(workspace)?;

    writeln!(writer, "Case duration status")?;
    writeln!(writer, "Database: {}", database_path.display())?;
    writeln!(writer, "Workspace: {workspace}")?;

    if summary.definitions == 0 {
        writeln!(writer, "No duration definitions.")?;
    } else {
        writeln!(writer, "Definitions: {}", summary.definitions)?;
    }
    writeln!(writer, "Cases: {}", summary.cases)?;
    writeln!(writer, "Events: {}", summary.events)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use cd_core::{CaseEvent, CaseEventType, CaseId, DefinitionDraft, EventAnchor, EventId};
    use chrono::{TimeZone, Utc};
    use insta::assert_snapshot;

    #[test]
    fn status_command_outputs_workspace_counts() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("cdur.db");
        let mut db = Database::open(&db_path).unwrap();
        let workspace = WorkspaceId::new("default").unwrap();

        let events: Vec<CaseEvent> = ["a", "b"]
            .into_iter()
            .enumerate()
            .map(|(i, id)| CaseEvent {
                id: EventId::new(format!("event-{id}")).unwrap(),
                case_id: CaseId::new("case-1").unwrap(),
                kind: "case_created".to_string(),
                created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, u32::try_from(i).unwrap(), 0).unwrap(),
                data: serde_json::json!({}),
            })
            .collect();
        db.insert_events(&workspace, &events).unwrap();
        db.create_definition(
            &workspace,
            DefinitionDraft {
                name: "Time to close".to_string(),
                description: None,
                start_anchor: EventAnchor::new(CaseEventType::CaseCreated),
                end_anchor: EventAnchor::new(CaseEventType::CaseClosed),
            },
        )
        .unwrap();

        let mut output = Vec::new();
        run(&mut output, &db, &db_path, &workspace).unwrap();

        let output = String::from_utf8(output).unwrap();
        let output = output.replace(&db_path.display().to_string(), "[TEMP]/cdur.db");
        assert_snapshot!(output, @r"
        Case duration status
        Database: [TEMP]/cdur.db
        Workspace: default
        Definitions: 1
        Cases: 1
        Events: 2
        ");
    }

    #[test]
    fn status_command_on_empty_workspace() {
        let db = Database::open_in_memory().unwrap();
        let workspace = WorkspaceId::new("ops").unwrap();
        let mut output = Vec::new();
        run(&mut output, &db, Path::new("/data/cdur.db"), &workspace).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Case duration status
        Database: /data/cdur.db
        Workspace: ops
        No duration definitions.
        Cases: 0
        Events: 0
        ");
    }
}
