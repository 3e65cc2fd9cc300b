//! Domain model for versioned flows
//!
//! Artifacts own one mutable draft; snapshots are immutable copies of that
//! draft taken at publish time. Relations between them are ids, not
//! ownership: a snapshot belongs to `artifact_id`, and the artifact's
//! `active_version_id` is a pointer the active-pointer manager rewrites.

pub mod artifact;
pub mod metrics;
pub mod selector;
pub mod snapshot;

pub use artifact::Artifact;
pub use metrics::{Channel, ExecutionOutcome, SnapshotMetrics};
pub use selector::{Resolution, Selector, SelectorKind};
pub use snapshot::{Snapshot, SnapshotHeader, SnapshotSummary, VersionUpdate};

/// Generate a new entity identifier (UUIDv7, time-ordered)
pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}
