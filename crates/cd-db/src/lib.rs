//! Storage layer for case durations.
//!
//! Provides persistence for cases, case events, duration definitions and
//! computed duration records using `rusqlite`, and implements the
//! collaborator traits from `cd-core` ([`EventSource`], [`DefinitionSource`],
//! [`DurationSink`]).
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` instance can be moved between threads but cannot be shared
//! across threads without external synchronization.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 format with fixed nanosecond
//! precision (e.g., `2024-01-15T10:30:00.000000000Z`), so lexicographic
//! ordering matches chronological ordering.
//!
//! ## Anchors
//!
//! Each definition stores its two anchors as flattened `start_*` / `end_*`
//! columns. Field filters are a JSON object keyed by path.
//!
//! ## Duration Records
//!
//! `case_durations` holds at most one row per `(case_id, definition_id)`.
//! Syncing a case overwrites its rows rather than accumulating history.

use std::collections::BTreeMap;
use std::path::Path;

use cd_core::{
    AnchorSelection, Boundary, BoundsPatch, CaseEvent, CaseId, DefinitionDraft, DefinitionId,
    DefinitionPatch, DefinitionSource, DurationDefinition, DurationRecord, DurationSink,
    EventAnchor, EventId, EventSource, RecordBounds, ValidationError, WorkspaceId,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use serde_json::Value;
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to serialize a value for storage.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for {id}: {timestamp}")]
    TimestampParse {
        id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// Failed to parse event payload JSON or identifiers.
    #[error("invalid event data for {event_id}: {message}")]
    InvalidEventData { event_id: String, message: String },
    /// A stored definition or duration row could not be decoded.
    #[error("invalid {table} row {id}: {message}")]
    InvalidRow {
        table: &'static str,
        id: String,
        message: String,
    },
    /// The requested row does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    /// A definition with this name already exists in the workspace.
    #[error("a duration named '{0}' already exists")]
    DuplicateName(String),
    /// A row with this key already exists.
    #[error("{entity} {id} already exists")]
    AlreadyExists { entity: &'static str, id: String },
    /// Input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// Row counts for one workspace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkspaceSummary {
    pub definitions: usize,
    pub cases: usize,
    pub events: usize,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS cases (
                id TEXT PRIMARY KEY,
                workspace_id TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_cases_workspace ON cases(workspace_id);

            -- Case events: lifecycle changes consumed by anchor matching
            -- type: event type tag (e.g., 'case_closed')
            -- data: JSON payload
            CREATE TABLE IF NOT EXISTS case_events (
                id TEXT PRIMARY KEY,
                case_id TEXT NOT NULL,
                type TEXT NOT NULL,
                created_at TEXT NOT NULL,
                data TEXT NOT NULL,
                FOREIGN KEY (case_id) REFERENCES cases(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_case_events_case ON case_events(case_id, created_at);

            CREATE TABLE IF NOT EXISTS duration_definitions (
                id TEXT PRIMARY KEY,
                workspace_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                start_event_type TEXT NOT NULL,
                start_timestamp_path TEXT NOT NULL,
                start_field_filters TEXT NOT NULL,
                start_selection TEXT NOT NULL,
                end_event_type TEXT NOT NULL,
                end_timestamp_path TEXT NOT NULL,
                end_field_filters TEXT NOT NULL,
                end_selection TEXT NOT NULL,
                UNIQUE (workspace_id, name)
            );

            CREATE TABLE IF NOT EXISTS case_durations (
                case_id TEXT NOT NULL,
                definition_id TEXT NOT NULL,
                start_event_id TEXT,
                end_event_id TEXT,
                started_at TEXT,
                ended_at TEXT,
                duration_ms INTEGER,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (case_id, definition_id),
                FOREIGN KEY (case_id) REFERENCES cases(id) ON DELETE CASCADE,
                FOREIGN KEY (definition_id) REFERENCES duration_definitions(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_case_durations_definition ON case_durations(definition_id);
            ",
        )?;
        Ok(())
    }

    // ========== Cases and events ==========

    /// Inserts a batch of events, ignoring duplicates by ID.
    ///
    /// Cases referenced by the events are registered under `workspace` if
    /// they are not known yet.
    pub fn insert_events(
        &mut self,
        workspace: &WorkspaceId,
        events: &[CaseEvent],
    ) -> Result<usize, DbError> {
        if events.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut case_stmt = tx.prepare(
                "INSERT OR IGNORE INTO cases (id, workspace_id, created_at) VALUES (?, ?, ?)",
            )?;
            let mut event_stmt = tx.prepare(
                "
                INSERT OR IGNORE INTO case_events (id, case_id, type, created_at, data)
                VALUES (?, ?, ?, ?, ?)
                ",
            )?;
            for event in events {
                let created_at = format_timestamp(event.created_at);
                case_stmt.execute(params![
                    event.case_id.as_str(),
                    workspace.as_str(),
                    created_at
                ])?;
                inserted += event_stmt.execute(params![
                    event.id.as_str(),
                    event.case_id.as_str(),
                    event.kind,
                    created_at,
                    serde_json::to_string(&event.data)?,
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(received = events.len(), inserted, "inserted case events");
        Ok(inserted)
    }

    /// Returns the workspace a case belongs to, if the case is known.
    pub fn case_workspace(&self, case_id: &CaseId) -> Result<Option<WorkspaceId>, DbError> {
        let workspace: Option<String> = self
            .conn
            .query_row(
                "SELECT workspace_id FROM cases WHERE id = ?",
                [case_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(workspace.map(WorkspaceId::new).transpose()?)
    }

    /// Lists a case's events ordered by creation time, then insertion order.
    pub fn list_case_events(&self, case_id: &CaseId) -> Result<Vec<CaseEvent>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, case_id, type, created_at, data
            FROM case_events
            WHERE case_id = ?
            ORDER BY created_at ASC, rowid ASC
            ",
        )?;
        let rows = stmt.query_map([case_id.as_str()], |row| {
            Ok(EventRow {
                id: row.get(0)?,
                case_id: row.get(1)?,
                kind: row.get(2)?,
                created_at: row.get(3)?,
                data: row.get(4)?,
            })
        })?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?.into_event()?);
        }
        Ok(events)
    }

    /// Counts definitions, cases and events in a workspace.
    pub fn workspace_summary(&self, workspace: &WorkspaceId) -> Result<WorkspaceSummary, DbError> {
        let count = |sql: &str| -> Result<usize, DbError> {
            let n: i64 = self.conn.query_row(sql, [workspace.as_str()], |row| row.get(0))?;
            Ok(usize::try_from(n).unwrap_or_default())
        };
        Ok(WorkspaceSummary {
            definitions: count("SELECT COUNT(*) FROM duration_definitions WHERE workspace_id = ?")?,
            cases: count("SELECT COUNT(*) FROM cases WHERE workspace_id = ?")?,
            events: count(
                "
                SELECT COUNT(*) FROM case_events e
                JOIN cases c ON c.id = e.case_id
                WHERE c.workspace_id = ?
                ",
            )?,
        })
    }

    // ========== Duration definitions ==========

    /// Validates and stores a new definition.
    pub fn create_definition(
        &mut self,
        workspace: &WorkspaceId,
        draft: DefinitionDraft,
    ) -> Result<DurationDefinition, DbError> {
        let definition = DurationDefinition::from_draft(DefinitionId::generate(), draft)?;
        let tx = self.conn.transaction()?;
        ensure_unique_name(&tx, workspace, &definition.name, None)?;
        let start = AnchorColumns::encode(&definition.start_anchor)?;
        let end = AnchorColumns::encode(&definition.end_anchor)?;
        tx.execute(
            "
            INSERT INTO duration_definitions (
                id, workspace_id, created_at, name, description,
                start_event_type, start_timestamp_path, start_field_filters, start_selection,
                end_event_type, end_timestamp_path, end_field_filters, end_selection
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                definition.id.as_str(),
                workspace.as_str(),
                format_timestamp(Utc::now()),
                definition.name,
                definition.description,
                start.event_type,
                start.timestamp_path,
                start.field_filters,
                start.selection,
                end.event_type,
                end.timestamp_path,
                end.field_filters,
                end.selection,
            ],
        )?;
        tx.commit()?;
        tracing::debug!(workspace = %workspace, definition_id = %definition.id, "created duration definition");
        Ok(definition)
    }

    /// Lists a workspace's definitions in creation order.
    pub fn list_definitions(
        &self,
        workspace: &WorkspaceId,
    ) -> Result<Vec<DurationDefinition>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DEFINITION_COLUMNS} FROM duration_definitions
             WHERE workspace_id = ?
             ORDER BY created_at ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map([workspace.as_str()], DefinitionRow::from_row)?;
        let mut definitions = Vec::new();
        for row in rows {
            definitions.push(row?.into_definition()?);
        }
        Ok(definitions)
    }

    /// Retrieves a single definition.
    pub fn get_definition(
        &self,
        workspace: &WorkspaceId,
        id: &DefinitionId,
    ) -> Result<DurationDefinition, DbError> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {DEFINITION_COLUMNS} FROM duration_definitions
                     WHERE id = ? AND workspace_id = ?"
                ),
                [id.as_str(), workspace.as_str()],
                DefinitionRow::from_row,
            )
            .optional()?
            .ok_or_else(|| definition_not_found(id))?;
        row.into_definition()
    }

    /// Applies a patch to a definition, keeping names unique.
    pub fn update_definition(
        &mut self,
        workspace: &WorkspaceId,
        id: &DefinitionId,
        patch: DefinitionPatch,
    ) -> Result<DurationDefinition, DbError> {
        let current = self.get_definition(workspace, id)?;
        if patch.is_empty() {
            return Ok(current);
        }
        let updated = current.patched(patch)?;
        let tx = self.conn.transaction()?;
        ensure_unique_name(&tx, workspace, &updated.name, Some(id))?;
        let start = AnchorColumns::encode(&updated.start_anchor)?;
        let end = AnchorColumns::encode(&updated.end_anchor)?;
        tx.execute(
            "
            UPDATE duration_definitions SET
                name = ?, description = ?,
                start_event_type = ?, start_timestamp_path = ?, start_field_filters = ?, start_selection = ?,
                end_event_type = ?, end_timestamp_path = ?, end_field_filters = ?, end_selection = ?
            WHERE id = ? AND workspace_id = ?
            ",
            params![
                updated.name,
                updated.description,
                start.event_type,
                start.timestamp_path,
                start.field_filters,
                start.selection,
                end.event_type,
                end.timestamp_path,
                end.field_filters,
                end.selection,
                id.as_str(),
                workspace.as_str(),
            ],
        )?;
        tx.commit()?;
        Ok(updated)
    }

    /// Deletes a definition and every duration record it produced.
    pub fn delete_definition(
        &mut self,
        workspace: &WorkspaceId,
        id: &DefinitionId,
    ) -> Result<(), DbError> {
        let deleted = self.conn.execute(
            "DELETE FROM duration_definitions WHERE id = ? AND workspace_id = ?",
            [id.as_str(), workspace.as_str()],
        )?;
        if deleted == 0 {
            return Err(definition_not_found(id));
        }
        Ok(())
    }

    // ========== Duration records ==========

    /// Upserts a case's computed records and removes stale ones.
    ///
    /// Rows for definitions missing from `records` are deleted so the table
    /// mirrors the latest computation.
    pub fn upsert_case_durations(
        &mut self,
        case_id: &CaseId,
        records: &[DurationRecord],
    ) -> Result<usize, DbError> {
        let updated_at = format_timestamp(Utc::now());
        let tx = self.conn.transaction()?;
        let mut written = 0;
        for record in records.iter().filter(|r| r.case_id() == case_id) {
            written += write_duration(&tx, record, &updated_at)?;
        }
        let keep: Vec<&str> = records
            .iter()
            .filter(|r| r.case_id() == case_id)
            .map(|r| r.definition_id().as_str())
            .collect();
        let stale = delete_stale_durations(&tx, case_id, &keep)?;
        tx.commit()?;
        tracing::debug!(case_id = %case_id, written, stale, "synced case durations");
        Ok(written)
    }

    /// Lists persisted records for a case ordered by definition creation.
    pub fn list_case_durations(&self, case_id: &CaseId) -> Result<Vec<DurationRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT cd.case_id, cd.definition_id, cd.start_event_id, cd.started_at,
                   cd.end_event_id, cd.ended_at
            FROM case_durations cd
            JOIN duration_definitions d ON d.id = cd.definition_id
            WHERE cd.case_id = ?
            ORDER BY d.created_at ASC, d.rowid ASC
            ",
        )?;
        let rows = stmt.query_map([case_id.as_str()], DurationRow::from_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }

    /// Gets one persisted record.
    pub fn get_case_duration(
        &self,
        case_id: &CaseId,
        definition_id: &DefinitionId,
    ) -> Result<DurationRecord, DbError> {
        find_duration(&self.conn, case_id, definition_id)?
            .ok_or_else(|| duration_not_found(case_id, definition_id))
    }

    /// Stores a manually supplied record for a case and definition.
    ///
    /// The case must be known, the definition must belong to the case's
    /// workspace, and no record may exist yet for the pair.
    pub fn create_case_duration(
        &mut self,
        case_id: &CaseId,
        definition_id: &DefinitionId,
        bounds: RecordBounds,
    ) -> Result<DurationRecord, DbError> {
        let record = DurationRecord::from_input(definition_id.clone(), case_id.clone(), bounds)?;
        let tx = self.conn.transaction()?;

        let workspace: Option<String> = tx
            .query_row(
                "SELECT workspace_id FROM cases WHERE id = ?",
                [case_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let workspace = workspace.ok_or_else(|| DbError::NotFound {
            entity: "case",
            id: case_id.to_string(),
        })?;
        let defined = tx
            .query_row(
                "SELECT 1 FROM duration_definitions WHERE id = ? AND workspace_id = ?",
                [definition_id.as_str(), workspace.as_str()],
                |_| Ok(()),
            )
            .optional()?;
        if defined.is_none() {
            return Err(definition_not_found(definition_id));
        }
        if find_duration(&tx, case_id, definition_id)?.is_some() {
            return Err(DbError::AlreadyExists {
                entity: "case duration",
                id: format!("{case_id}/{definition_id}"),
            });
        }

        write_duration(&tx, &record, &format_timestamp(Utc::now()))?;
        tx.commit()?;
        tracing::debug!(case_id = %case_id, definition_id = %definition_id, "created case duration");
        Ok(record)
    }

    /// Applies a boundary patch to a persisted record.
    ///
    /// The duration is re-derived from the patched boundaries.
    pub fn update_case_duration(
        &mut self,
        case_id: &CaseId,
        definition_id: &DefinitionId,
        patch: BoundsPatch,
    ) -> Result<DurationRecord, DbError> {
        let tx = self.conn.transaction()?;
        let current = find_duration(&tx, case_id, definition_id)?
            .ok_or_else(|| duration_not_found(case_id, definition_id))?;
        if patch.is_empty() {
            return Ok(current);
        }
        let record = current.patched(patch)?;
        write_duration(&tx, &record, &format_timestamp(Utc::now()))?;
        tx.commit()?;
        tracing::debug!(case_id = %case_id, definition_id = %definition_id, "updated case duration");
        Ok(record)
    }

    /// Deletes one persisted record.
    pub fn delete_case_duration(
        &mut self,
        case_id: &CaseId,
        definition_id: &DefinitionId,
    ) -> Result<(), DbError> {
        let deleted = self.conn.execute(
            "DELETE FROM case_durations WHERE case_id = ? AND definition_id = ?",
            [case_id.as_str(), definition_id.as_str()],
        )?;
        if deleted == 0 {
            return Err(duration_not_found(case_id, definition_id));
        }
        Ok(())
    }
}

impl EventSource for Database {
    type Error = DbError;

    fn case_events(&self, case_id: &CaseId) -> Result<Vec<CaseEvent>, Self::Error> {
        self.list_case_events(case_id)
    }
}

impl DefinitionSource for Database {
    type Error = DbError;

    fn list_active(&self, workspace: &WorkspaceId) -> Result<Vec<DurationDefinition>, Self::Error> {
        self.list_definitions(workspace)
    }
}

impl DurationSink for Database {
    type Error = DbError;

    fn sync_case_durations(
        &mut self,
        case_id: &CaseId,
        records: &[DurationRecord],
    ) -> Result<usize, Self::Error> {
        self.upsert_case_durations(case_id, records)
    }
}

const DEFINITION_COLUMNS: &str = "id, name, description, \
    start_event_type, start_timestamp_path, start_field_filters, start_selection, \
    end_event_type, end_timestamp_path, end_field_filters, end_selection";

fn ensure_unique_name(
    tx: &Transaction<'_>,
    workspace: &WorkspaceId,
    name: &str,
    exclude: Option<&DefinitionId>,
) -> Result<(), DbError> {
    let existing: Option<String> = tx
        .query_row(
            "SELECT id FROM duration_definitions WHERE workspace_id = ? AND name = ?",
            [workspace.as_str(), name],
            |row| row.get(0),
        )
        .optional()?;
    match existing {
        Some(id) if exclude.is_none_or(|exclude| exclude.as_str() != id) => {
            Err(DbError::DuplicateName(name.to_string()))
        }
        _ => Ok(()),
    }
}

fn delete_stale_durations(
    tx: &Transaction<'_>,
    case_id: &CaseId,
    keep: &[&str],
) -> Result<usize, DbError> {
    if keep.is_empty() {
        return Ok(tx.execute(
            "DELETE FROM case_durations WHERE case_id = ?",
            [case_id.as_str()],
        )?);
    }
    let placeholders = vec!["?"; keep.len()].join(", ");
    let query = format!(
        "DELETE FROM case_durations WHERE case_id = ? AND definition_id NOT IN ({placeholders})"
    );
    let params = std::iter::once(case_id.as_str()).chain(keep.iter().copied());
    Ok(tx.execute(&query, rusqlite::params_from_iter(params))?)
}

fn find_duration(
    conn: &Connection,
    case_id: &CaseId,
    definition_id: &DefinitionId,
) -> Result<Option<DurationRecord>, DbError> {
    conn.query_row(
        "
        SELECT case_id, definition_id, start_event_id, started_at, end_event_id, ended_at
        FROM case_durations
        WHERE case_id = ? AND definition_id = ?
        ",
        [case_id.as_str(), definition_id.as_str()],
        DurationRow::from_row,
    )
    .optional()?
    .map(DurationRow::into_record)
    .transpose()
}

/// Inserts or overwrites the row for a record's `(case_id, definition_id)`.
fn write_duration(
    conn: &Connection,
    record: &DurationRecord,
    updated_at: &str,
) -> Result<usize, DbError> {
    let mut stmt = conn.prepare_cached(
        "
        INSERT INTO case_durations
        (case_id, definition_id, start_event_id, end_event_id, started_at, ended_at, duration_ms, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(case_id, definition_id) DO UPDATE SET
            start_event_id = excluded.start_event_id,
            end_event_id = excluded.end_event_id,
            started_at = excluded.started_at,
            ended_at = excluded.ended_at,
            duration_ms = excluded.duration_ms,
            updated_at = excluded.updated_at
        ",
    )?;
    Ok(stmt.execute(params![
        record.case_id().as_str(),
        record.definition_id().as_str(),
        record.start_event_id().map(EventId::as_str),
        record.end_event_id().map(EventId::as_str),
        record.started_at().map(format_timestamp),
        record.ended_at().map(format_timestamp),
        record.duration().map(|d| d.num_milliseconds()),
        updated_at,
    ])?)
}

fn duration_not_found(case_id: &CaseId, definition_id: &DefinitionId) -> DbError {
    DbError::NotFound {
        entity: "case duration",
        id: format!("{case_id}/{definition_id}"),
    }
}

fn definition_not_found(id: &DefinitionId) -> DbError {
    DbError::NotFound {
        entity: "duration definition",
        id: id.to_string(),
    }
}

/// Raw `case_events` row before validation.
struct EventRow {
    id: String,
    case_id: String,
    kind: String,
    created_at: String,
    data: String,
}

impl EventRow {
    fn into_event(self) -> Result<CaseEvent, DbError> {
        let invalid = |message: String| DbError::InvalidEventData {
            event_id: self.id.clone(),
            message,
        };
        let created_at = parse_timestamp(&self.created_at, &self.id)?;
        let data: Value =
            serde_json::from_str(&self.data).map_err(|err| invalid(err.to_string()))?;
        let case_id = CaseId::new(self.case_id.clone()).map_err(|err| invalid(err.to_string()))?;
        let id = EventId::new(self.id.clone()).map_err(|err| invalid(err.to_string()))?;
        Ok(CaseEvent {
            id,
            case_id,
            kind: self.kind,
            created_at,
            data,
        })
    }
}

/// One anchor flattened into storage columns.
struct AnchorColumns {
    event_type: String,
    timestamp_path: String,
    field_filters: String,
    selection: String,
}

impl AnchorColumns {
    fn encode(anchor: &EventAnchor) -> Result<Self, DbError> {
        Ok(Self {
            event_type: anchor.event_type.as_str().to_string(),
            timestamp_path: anchor.timestamp_path.clone(),
            field_filters: serde_json::to_string(&anchor.field_filters)?,
            selection: anchor.selection.as_str().to_string(),
        })
    }

    fn decode(self, definition_id: &str) -> Result<EventAnchor, DbError> {
        let invalid = |message: String| DbError::InvalidRow {
            table: "duration_definitions",
            id: definition_id.to_string(),
            message,
        };
        let field_filters: BTreeMap<String, Value> =
            serde_json::from_str(&self.field_filters).map_err(|err| invalid(err.to_string()))?;
        Ok(EventAnchor {
            event_type: self
                .event_type
                .parse()
                .map_err(|err: cd_core::UnknownEventType| invalid(err.to_string()))?,
            timestamp_path: self.timestamp_path,
            field_filters,
            selection: self
                .selection
                .parse::<AnchorSelection>()
                .map_err(invalid)?,
        })
    }
}

/// Raw `duration_definitions` row before validation.
struct DefinitionRow {
    id: String,
    name: String,
    description: Option<String>,
    start: AnchorColumns,
    end: AnchorColumns,
}

impl DefinitionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            start: AnchorColumns {
                event_type: row.get(3)?,
                timestamp_path: row.get(4)?,
                field_filters: row.get(5)?,
                selection: row.get(6)?,
            },
            end: AnchorColumns {
                event_type: row.get(7)?,
                timestamp_path: row.get(8)?,
                field_filters: row.get(9)?,
                selection: row.get(10)?,
            },
        })
    }

    fn into_definition(self) -> Result<DurationDefinition, DbError> {
        let start_anchor = self.start.decode(&self.id)?;
        let end_anchor = self.end.decode(&self.id)?;
        Ok(DurationDefinition {
            id: DefinitionId::new(self.id)?,
            name: self.name,
            description: self.description,
            start_anchor,
            end_anchor,
        })
    }
}

/// Raw `case_durations` row before validation.
struct DurationRow {
    case_id: String,
    definition_id: String,
    start_event_id: Option<String>,
    started_at: Option<String>,
    end_event_id: Option<String>,
    ended_at: Option<String>,
}

impl DurationRow {
    /// Reads `case_id, definition_id, start_event_id, started_at, end_event_id, ended_at`.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            case_id: row.get(0)?,
            definition_id: row.get(1)?,
            start_event_id: row.get(2)?,
            started_at: row.get(3)?,
            end_event_id: row.get(4)?,
            ended_at: row.get(5)?,
        })
    }

    fn into_record(self) -> Result<DurationRecord, DbError> {
        let row_id = format!("{}/{}", self.case_id, self.definition_id);
        let start = parse_boundary(self.start_event_id, self.started_at, &row_id)?;
        let end = parse_boundary(self.end_event_id, self.ended_at, &row_id)?;
        Ok(DurationRecord::from_bounds(
            DefinitionId::new(self.definition_id)?,
            CaseId::new(self.case_id)?,
            start,
            end,
        ))
    }
}

fn parse_boundary(
    event_id: Option<String>,
    at: Option<String>,
    row_id: &str,
) -> Result<Option<Boundary>, DbError> {
    match (event_id, at) {
        (Some(event_id), Some(at)) => {
            let at = parse_timestamp(&at, row_id)?;
            Ok(Some(Boundary::new(EventId::new(event_id)?, at)))
        }
        (None, None) => Ok(None),
        _ => Err(DbError::InvalidRow {
            table: "case_durations",
            id: row_id.to_string(),
            message: "boundary event and timestamp must both be set or both be null".to_string(),
        }),
    }
}

fn parse_timestamp(timestamp: &str, id: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            id: id.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}
