//! Diff Engine
//!
//! Compares two snapshot payloads and produces a structured, deterministic
//! diff plus a one-line summary.
//!
//! ## Entry point
//!
//! ```
//! use flowver_core::diff::{compute_diff, render_human_summary};
//! use serde_json::json;
//!
//! let a = json!({"nodes": [{"id": "A"}], "edges": []});
//! let b = json!({"nodes": [{"id": "A"}, {"id": "X"}], "edges": []});
//! let diff = compute_diff(&a, &b).unwrap();
//! assert_eq!(diff.added_nodes, vec!["X".to_string()]);
//! assert!(render_human_summary(&diff).contains("Added nodes"));
//! ```
//!
//! ## Guarantees
//!
//! - Both sides are canonicalized first, so object key order never shows up
//!   as a change.
//! - `compute_diff(v, v)` yields empty change sets and the fixed summary
//!   `"No changes detected"`.
//! - Output ordering depends only on the payloads (sorted ids and paths).

pub mod engine;
pub mod human_summary;
pub mod model;

pub use engine::compute_diff;
pub use human_summary::{render_human_summary, summary_line};
pub use model::{ChangeKind, DiffClassification, ElementChange, PathChange, VersionDiff};
