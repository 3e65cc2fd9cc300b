#![allow(dead_code)]

use flowver_store::{Database, StoreConfig};
use rusqlite::Connection;
use serde_json::{json, Value};
use tempfile::TempDir;

/// File-backed database in a temp dir; keep the `TempDir` alive for the test
pub fn setup_db() -> (TempDir, Database, Connection) {
    let dir = TempDir::new().expect("temp dir");
    let db = Database::new(StoreConfig::new(dir.path().join("flowver.db")));
    let conn = db.initialize().expect("initialize");
    (dir, db, conn)
}

/// A small flow graph with the given node ids chained by edges
pub fn graph(nodes: &[&str]) -> Value {
    let edges: Vec<Value> = nodes
        .windows(2)
        .map(|w| json!({"source": w[0], "target": w[1]}))
        .collect();
    json!({
        "nodes": nodes.iter().map(|id| json!({"id": id, "type": "Component"})).collect::<Vec<_>>(),
        "edges": edges,
    })
}
