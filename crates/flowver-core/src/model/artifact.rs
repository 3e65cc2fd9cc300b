//! The versioned artifact ("flow") and its mutable draft

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A versioned flow graph.
///
/// `draft` is owned by the artifact and overwritten freely; it is never
/// versioned until published. `active_version_id` is the single
/// authoritative active pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub name: String,
    /// True while the draft has diverged from the active snapshot
    pub is_draft: bool,
    pub active_version_id: Option<String>,
    /// Number of committed snapshots
    pub version_count: i64,
    pub last_published_at: Option<DateTime<Utc>>,
    pub draft: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Artifact {
    pub fn has_active_version(&self) -> bool {
        self.active_version_id.is_some()
    }

    pub fn is_active_version(&self, version_id: &str) -> bool {
        self.active_version_id.as_deref() == Some(version_id)
    }
}
