//! Immutable published snapshots ("flow versions")

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Everything about a snapshot except its payload.
///
/// Split out so that readers can fetch the (small, partly mutable) header
/// from the store while serving the (large, immutable) payload from cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub id: String,
    pub artifact_id: String,
    pub version_number: i64,
    pub version_tag: Option<String>,
    /// Hex SHA-256 of the canonical payload
    pub payload_hash: String,
    /// Hash of the baseline this snapshot was compared against at publish
    pub parent_payload_hash: Option<String>,
    /// Denormalized; `Artifact::active_version_id` is authoritative
    pub is_active: bool,
    pub created_from_version_id: Option<String>,
    pub published_by: String,
    pub published_at: DateTime<Utc>,
    pub changelog: Option<String>,
    pub description_version: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SnapshotHeader {
    pub fn with_payload(self, payload: Value) -> Snapshot {
        Snapshot {
            header: self,
            payload,
        }
    }

    /// `v<number>` label used in logs and summaries
    pub fn label(&self) -> String {
        match &self.version_tag {
            Some(tag) => format!("v{} ({})", self.version_number, tag),
            None => format!("v{}", self.version_number),
        }
    }
}

/// A full snapshot: header plus the immutable graph document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(flatten)]
    pub header: SnapshotHeader,
    pub payload: Value,
}

impl Snapshot {
    pub fn id(&self) -> &str {
        &self.header.id
    }

    pub fn artifact_id(&self) -> &str {
        &self.header.artifact_id
    }

    pub fn version_number(&self) -> i64 {
        self.header.version_number
    }

    pub fn payload_hash(&self) -> &str {
        &self.header.payload_hash
    }

    pub fn is_active(&self) -> bool {
        self.header.is_active
    }
}

/// History row: header essentials plus usage counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub id: String,
    pub version_number: i64,
    pub version_tag: Option<String>,
    pub is_active: bool,
    pub payload_hash: String,
    pub published_by: String,
    pub published_at: DateTime<Utc>,
    pub description_version: Option<String>,
    pub execution_count: i64,
    pub error_count: i64,
}

/// Post-publish annotation change.
///
/// Only annotations may change after publish; see
/// [`crate::rules::patch::parse_version_patch`] for how a raw patch is
/// checked against the immutable fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionUpdate {
    pub changelog: Option<String>,
    pub description_version: Option<String>,
}

impl VersionUpdate {
    pub fn is_empty(&self) -> bool {
        self.changelog.is_none() && self.description_version.is_none()
    }
}
