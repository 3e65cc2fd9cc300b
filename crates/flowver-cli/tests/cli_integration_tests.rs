//! CLI integration tests
//!
//! Drive the compiled `flowver` binary against a temporary database.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::{json, Value};
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
    db: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("flowver.db");
        Self { dir, db }
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_flowver"))
            .current_dir(self.dir.path())
            .env_remove("FLOWVER_DB_PATH")
            .env("RUST_LOG", "off")
            .arg("--db")
            .arg(&self.db)
            .arg("--actor")
            .arg("cli-test")
            .args(args)
            .output()
            .expect("Failed to execute CLI")
    }

    fn ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "flowver {:?} failed. Stderr: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).to_string()
    }

    fn write_json(&self, name: &str, value: &Value) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, serde_json::to_string(value).unwrap()).unwrap();
        path
    }
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn graph(nodes: &[&str]) -> Value {
    json!({
        "nodes": nodes.iter().map(|id| json!({"id": id})).collect::<Vec<_>>(),
        "edges": [],
    })
}

#[test]
fn test_cli_publish_activate_and_show() {
    let ws = Workspace::new();
    let draft = ws.write_json("v1.json", &graph(&["A"]));
    let artifact_id = ws.ok(&["artifact", "create", "support-bot", "--draft", arg(&draft)]);
    let artifact_id = artifact_id.trim();

    let published = ws.ok(&["publish", artifact_id, "--tag", "stable"]);
    assert!(published.contains("Published v1 (stable)"), "{}", published);

    let activated = ws.ok(&["activate", artifact_id, "stable"]);
    assert!(activated.contains("Activated v1"), "{}", activated);

    let shown = ws.ok(&["show", artifact_id, "active", "--context", "external-trigger"]);
    let snapshot: Value = serde_json::from_str(&shown).unwrap();
    assert_eq!(snapshot["version_number"], 1);
    assert_eq!(snapshot["is_active"], true);
    assert_eq!(snapshot["payload"], graph(&["A"]));

    let again = ws.ok(&["activate", artifact_id, "v1"]);
    assert!(again.contains("already active"), "{}", again);
}

#[test]
fn test_cli_diff_and_rollback() {
    let ws = Workspace::new();
    let artifact_id = ws.ok(&["artifact", "create", "flow"]);
    let artifact_id = artifact_id.trim();

    let v1 = ws.write_json("v1.json", &graph(&["A"]));
    ws.ok(&["artifact", "draft", artifact_id, "--file", arg(&v1)]);
    ws.ok(&["publish", artifact_id, "--activate"]);

    let v2 = ws.write_json("v2.json", &graph(&["A", "X"]));
    ws.ok(&["artifact", "draft", artifact_id, "--file", arg(&v2)]);
    ws.ok(&["publish", artifact_id, "--activate"]);

    let diff = ws.ok(&["diff", artifact_id, "v1", "v2", "--json"]);
    let diff: Value = serde_json::from_str(&diff).unwrap();
    assert_eq!(diff["added_nodes"], json!(["X"]));

    let markdown = ws.ok(&["diff", artifact_id, "v1", "v2"]);
    assert!(markdown.starts_with("## Version Diff"), "{}", markdown);

    let rolled = ws.ok(&["rollback", artifact_id, "1"]);
    assert!(rolled.contains("Rolled back to v1"), "{}", rolled);

    let history = ws.ok(&["history", artifact_id]);
    let lines: Vec<&str> = history.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("v2"));
    assert!(lines[1].starts_with("v1") && lines[1].ends_with("(active)"));

    let audit = ws.ok(&["activations", artifact_id]);
    let audit: Value = serde_json::from_str(&audit).unwrap();
    assert_eq!(audit.as_array().unwrap().len(), 3);
    assert_eq!(audit[0]["is_rollback"], true);
    assert_eq!(audit[0]["actor"], "cli-test");
}

#[test]
fn test_cli_records_metrics() {
    let ws = Workspace::new();
    let draft = ws.write_json("v1.json", &graph(&["A"]));
    let artifact_id = ws.ok(&["artifact", "create", "flow", "--draft", arg(&draft)]);
    let artifact_id = artifact_id.trim();
    ws.ok(&["publish", artifact_id]);

    let shown = ws.ok(&["show", artifact_id, "latest"]);
    let snapshot: Value = serde_json::from_str(&shown).unwrap();
    let version_id = snapshot["id"].as_str().unwrap().to_string();

    ws.ok(&["record", &version_id, "--outcome", "success", "--duration-ms", "30", "--channel", "webhook"]);
    ws.ok(&["record", &version_id, "--outcome", "failure", "--duration-ms", "10", "--channel", "cron"]);

    let metrics = ws.ok(&["metrics", &version_id]);
    let metrics: Value = serde_json::from_str(&metrics).unwrap();
    assert_eq!(metrics["execution_count"], 2);
    assert_eq!(metrics["error_count"], 1);
    assert_eq!(metrics["webhook_executions"], 1);
    assert_eq!(metrics["avg_execution_time_ms"], 20.0);
}

#[test]
fn test_cli_errors_exit_nonzero() {
    let ws = Workspace::new();
    let artifact_id = ws.ok(&["artifact", "create", "flow"]);
    let artifact_id = artifact_id.trim();

    let output = ws.run(&["publish", artifact_id]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("Error:"), "{}", stderr);

    let output = ws.run(&["show", artifact_id, "active"]);
    assert!(!output.status.success());

    let output = ws.run(&["annotate", "missing-version"]);
    assert!(!output.status.success());
}
