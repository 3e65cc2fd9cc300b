//! flowver core - pure domain kernel for flow version control
//!
//! This crate holds everything about versioned flows that does not touch
//! storage:
//! - Artifact / snapshot / metrics models and the closed version selector
//! - Canonical payload hashing (no-op publish detection)
//! - Payload and annotation-patch validation
//! - Structural diffing of two snapshot payloads
//! - The error facility and the structured logging facility
//!
//! Persistence lives in `flowver-store`, orchestration and caching in
//! `flowver-engine`.

pub mod diff;
pub mod errors;
pub mod hashing;
pub mod logging_facility;
pub mod model;
pub mod rules;

pub use errors::{ExError, ExErrorKind, Result, VersioningError};
pub use model::{
    Artifact, Channel, ExecutionOutcome, Selector, Snapshot, SnapshotMetrics, SnapshotSummary,
};
