//! End-to-end tests for the `cdur` binary.
//!
//! Drives the full pipeline: import → definitions create → compute --sync →
//! durations, against a throwaway database.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

const EVENTS: &str = r#"{"id":"e1","case_id":"case-1","type":"case_created","created_at":"2025-01-29T12:00:00Z","data":{}}
{"id":"e2","case_id":"case-1","type":"status_changed","created_at":"2025-01-29T12:10:00Z","data":{"old":"new","new":"in_progress"}}
{"id":"e3","case_id":"case-1","type":"case_closed","created_at":"2025-01-29T13:30:00Z","data":{"resolution":"fixed"}}
{"id":"e4","case_id":"case-2","type":"case_created","created_at":"2025-01-29T14:00:00Z","data":{}}
"#;

const TIME_TO_CLOSE: &str = r#"{
    "name": "Time to close",
    "start_anchor": {"event_type": "case_created"},
    "end_anchor": {"event_type": "case_closed", "field_filters": {"data.resolution": "fixed"}}
}"#;

const TIME_TO_ACK: &str = r#"{
    "name": "Time to acknowledge",
    "start_anchor": {"event_type": "case_created"},
    "end_anchor": {"event_type": "status_changed", "field_filters": {"data.new": "in_progress"}}
}"#;

struct Env {
    temp: TempDir,
    config: std::path::PathBuf,
}

impl Env {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("data").join("cdur.db");
        let config = temp.path().join("config.toml");
        std::fs::write(
            &config,
            format!(
                "database_path = \"{}\"\nworkspace = \"soc\"\n",
                db_path.to_string_lossy()
            ),
        )
        .unwrap();
        Self { temp, config }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_cdur"));
        command
            .env("HOME", self.temp.path())
            .env("XDG_CONFIG_HOME", self.temp.path().join("xdg-config"))
            .env_remove("CDUR_DATABASE_PATH")
            .env_remove("CDUR_WORKSPACE")
            .arg("--config")
            .arg(&self.config);
        command
    }

    fn run(&self, args: &[&str]) -> Output {
        let output = self.command().args(args).output().unwrap();
        assert!(
            output.status.success(),
            "cdur {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        output
    }

    fn import(&self, input: &str) -> Output {
        let mut child = self
            .command()
            .arg("import")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to spawn cdur import");
        {
            let stdin = child.stdin.as_mut().unwrap();
            stdin.write_all(input.as_bytes()).unwrap();
        }
        child.wait_with_output().expect("failed to wait for cdur import")
    }

    /// Creates a definition and returns the ID printed by `definitions create`.
    fn create_definition(&self, file: &Path) -> String {
        let created = stdout(&self.run(&["definitions", "create", "--file", path_arg(file)]));
        created
            .split_whitespace()
            .nth(1)
            .expect("create prints the new id")
            .to_string()
    }

    fn write(&self, name: &str, content: &str) -> std::path::PathBuf {
        let path = self.temp.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn path_arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_import_is_idempotent() {
    let env = Env::new();

    let first = env.import(EVENTS);
    assert!(first.status.success(), "{}", String::from_utf8_lossy(&first.stderr));
    assert!(String::from_utf8_lossy(&first.stderr).contains("Imported 4 events"));

    let second = env.import(EVENTS);
    assert!(String::from_utf8_lossy(&second.stderr).contains("Imported 0 events"));

    let status = stdout(&env.run(&["status"]));
    assert!(status.contains("Workspace: soc"));
    assert!(status.contains("Cases: 2"));
    assert!(status.contains("Events: 4"));
}

#[test]
fn test_import_rejects_malformed_line() {
    let env = Env::new();
    let output = env.import("{\"id\":\"e1\"\n");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("line 1"));
}

#[test]
fn test_compute_sync_and_list_durations() {
    let env = Env::new();
    assert!(env.import(EVENTS).status.success());

    let close = env.write("close.json", TIME_TO_CLOSE);
    let ack = env.write("ack.json", TIME_TO_ACK);
    env.run(&["definitions", "create", "--file", path_arg(&close)]);
    env.run(&["definitions", "create", "--file", path_arg(&ack)]);

    // Nothing persisted until --sync.
    let listed = stdout(&env.run(&["durations", "list", "--case", "case-1"]));
    assert!(listed.contains("No durations."));

    let computed = stdout(&env.run(&["compute", "--case", "case-1", "--json", "--sync"]));
    let records: serde_json::Value = serde_json::from_str(&computed).unwrap();
    assert_eq!(records[0]["definition"], "Time to close");
    assert_eq!(records[0]["duration_ms"], 90 * 60 * 1000);
    assert_eq!(records[1]["definition"], "Time to acknowledge");
    assert_eq!(records[1]["end_event_id"], "e2");

    let persisted = stdout(&env.run(&["durations", "list", "--case", "case-1", "--json"]));
    let persisted: serde_json::Value = serde_json::from_str(&persisted).unwrap();
    assert_eq!(persisted, records);

    let open_case = stdout(&env.run(&["compute", "--case", "case-2", "--json"]));
    let open_case: serde_json::Value = serde_json::from_str(&open_case).unwrap();
    assert_eq!(open_case[0]["status"], "in_progress");
    assert_eq!(open_case[0]["duration_ms"], serde_json::Value::Null);
}

#[test]
fn test_deleting_definition_drops_its_durations() {
    let env = Env::new();
    assert!(env.import(EVENTS).status.success());
    let close = env.write("close.json", TIME_TO_CLOSE);
    let id = env.create_definition(&close);

    env.run(&["compute", "--case", "case-1", "--sync"]);
    env.run(&["definitions", "delete", &id]);

    let listed = stdout(&env.run(&["durations", "list", "--case", "case-1"]));
    assert!(listed.contains("No durations."));
    let definitions = stdout(&env.run(&["definitions", "list"]));
    assert!(definitions.contains("No duration definitions."));
}

#[test]
fn test_duplicate_definition_name_fails() {
    let env = Env::new();
    let close = env.write("close.json", TIME_TO_CLOSE);
    env.run(&["definitions", "create", "--file", path_arg(&close)]);

    let output = env
        .command()
        .args(["definitions", "create", "--file", path_arg(&close)])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("already exists"));
}

#[test]
fn test_compute_unknown_case_fails() {
    let env = Env::new();
    let output = env
        .command()
        .args(["compute", "--case", "nope"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("case nope not found"));
}

#[test]
fn test_definitions_get() {
    let env = Env::new();
    let close = env.write("close.json", TIME_TO_CLOSE);
    let id = env.create_definition(&close);

    let shown = stdout(&env.run(&["definitions", "get", &id]));
    assert!(shown.starts_with(&format!("{id}  Time to close\n")));
    assert!(shown.contains(r#"end:   first case_closed @ created_at where data.resolution = "fixed""#));

    let json = stdout(&env.run(&["definitions", "get", &id, "--json"]));
    let json: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(json["name"], "Time to close");
    assert_eq!(json["start_anchor"]["event_type"], "case_created");

    let missing = env
        .command()
        .args(["definitions", "get", "no-such-id"])
        .output()
        .unwrap();
    assert!(!missing.status.success());
    assert!(String::from_utf8_lossy(&missing.stderr).contains("duration definition no-such-id not found"));
}

#[test]
fn test_durations_get_and_delete() {
    let env = Env::new();
    assert!(env.import(EVENTS).status.success());
    let close = env.write("close.json", TIME_TO_CLOSE);
    let id = env.create_definition(&close);
    env.run(&["compute", "--case", "case-1", "--sync"]);

    let record = stdout(&env.run(&[
        "durations", "get", "--case", "case-1", "--definition", &id, "--json",
    ]));
    let record: serde_json::Value = serde_json::from_str(&record).unwrap();
    assert_eq!(record["definition"], "Time to close");
    assert_eq!(record["status"], "completed");
    assert_eq!(record["duration_ms"], 90 * 60 * 1000);

    let deleted = stdout(&env.run(&["durations", "delete", "--case", "case-1", "--definition", &id]));
    assert_eq!(deleted, format!("Deleted {id} for case case-1\n"));

    let missing = env
        .command()
        .args(["durations", "get", "--case", "case-1", "--definition", id.as_str()])
        .output()
        .unwrap();
    assert!(!missing.status.success());
    assert!(String::from_utf8_lossy(&missing.stderr).contains("not found"));
}

#[test]
fn test_durations_manual_create_and_update() {
    let env = Env::new();
    assert!(env.import(EVENTS).status.success());
    let ack = env.write("ack.json", TIME_TO_ACK);
    let id = env.create_definition(&ack);

    let bounds = env.write(
        "bounds.json",
        r#"{"start": {"event_id": "e4", "at": "2025-01-29T14:00:00Z"}}"#,
    );
    let created = stdout(&env.run(&[
        "durations", "create", "--case", "case-2", "--definition", &id, "--file",
        path_arg(&bounds),
    ]));
    assert_eq!(created, format!("Created {id} for case case-2 (in_progress)\n"));

    let again = env
        .command()
        .args(["durations", "create", "--case", "case-2", "--definition", id.as_str(), "--file"])
        .arg(&bounds)
        .output()
        .unwrap();
    assert!(!again.status.success());
    assert!(String::from_utf8_lossy(&again.stderr).contains("already exists"));

    let early = env.write(
        "early.json",
        r#"{"end": {"event_id": "phone", "at": "2025-01-29T13:00:00Z"}}"#,
    );
    let rejected = env
        .command()
        .args(["durations", "update", "--case", "case-2", "--definition", id.as_str(), "--file"])
        .arg(&early)
        .output()
        .unwrap();
    assert!(!rejected.status.success());
    assert!(String::from_utf8_lossy(&rejected.stderr).contains("precedes start"));

    let ack_at = env.write(
        "ack_at.json",
        r#"{"end": {"event_id": "phone", "at": "2025-01-29T14:20:00Z"}}"#,
    );
    env.run(&[
        "durations", "update", "--case", "case-2", "--definition", &id, "--file",
        path_arg(&ack_at),
    ]);

    let listed = stdout(&env.run(&["durations", "list", "--case", "case-2", "--json"]));
    let listed: serde_json::Value = serde_json::from_str(&listed).unwrap();
    assert_eq!(listed[0]["status"], "completed");
    assert_eq!(listed[0]["start_event_id"], "e4");
    assert_eq!(listed[0]["end_event_id"], "phone");
    assert_eq!(listed[0]["duration_ms"], 20 * 60 * 1000);
}
