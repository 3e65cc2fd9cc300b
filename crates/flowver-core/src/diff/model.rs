//! Version diff output types.
//!
//! Collections are sorted `Vec`s so that serialized diffs are stable.

use serde::{Deserialize, Serialize};

/// The structured diff between two snapshot payloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VersionDiff {
    pub classification: DiffClassification,
    /// Payload hash of side A
    pub a_payload_hash: String,
    /// Payload hash of side B
    pub b_payload_hash: String,
    /// Node ids present in B but not A
    pub added_nodes: Vec<String>,
    /// Node ids present in A but not B
    pub removed_nodes: Vec<String>,
    /// Nodes present on both sides with different content
    pub modified_nodes: Vec<ElementChange>,
    pub added_edges: Vec<String>,
    pub removed_edges: Vec<String>,
    pub modified_edges: Vec<ElementChange>,
    /// Changes outside the node and edge lists, by dotted path
    pub other_changes: Vec<PathChange>,
    /// Deterministic one-line summary
    pub summary: String,
}

impl VersionDiff {
    /// Total number of reported changes
    pub fn change_count(&self) -> usize {
        self.added_nodes.len()
            + self.removed_nodes.len()
            + self.modified_nodes.len()
            + self.added_edges.len()
            + self.removed_edges.len()
            + self.modified_edges.len()
            + self.other_changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.change_count() == 0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DiffClassification {
    /// Canonical payloads are identical
    Identical,
    /// At least one change
    Changed,
}

/// A node or edge present on both sides whose content differs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ElementChange {
    pub id: String,
    /// Top-level fields of the element whose values differ, sorted
    pub changed_fields: Vec<String>,
}

/// A change at a path outside the node/edge lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathChange {
    /// Dotted path from the payload root, e.g. `viewport.zoom`
    pub path: String,
    pub kind: ChangeKind,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    Changed,
    /// Same elements in a different order
    Reordered,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Removed => "removed",
            ChangeKind::Changed => "changed",
            ChangeKind::Reordered => "reordered",
        }
    }
}
