//! Error handling for flowver-store
//!
//! Wraps the core `ExError` with SQLite-specific classification.

use flowver_core::errors::{ExError, ExErrorKind};
use rusqlite::ErrorCode;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Message raised by the immutability triggers
pub const IMMUTABLE_TRIGGER_MESSAGE: &str = "version_immutable";

/// Which uniqueness rule a failed insert or update ran into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueViolation {
    /// `(artifact_id, version_number)`: a concurrent publisher won the number
    VersionNumber,
    /// `(artifact_id, version_tag)`
    VersionTag,
    /// One active snapshot per artifact
    ActiveSnapshot,
    Other,
}

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration_checksum")
        .with_message(format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ))
}

/// Create a database error from rusqlite::Error
///
/// Lock contention becomes `Timeout` (retryable) and trigger aborts from the
/// immutability backstop become `VersionImmutable`; everything else is
/// `Persistence`.
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    if is_busy(&err) {
        return ExError::new(ExErrorKind::Timeout)
            .with_op("sqlite")
            .with_message(format!("database is busy: {}", err));
    }
    if is_immutable_trigger(&err) {
        return ExError::new(ExErrorKind::VersionImmutable)
            .with_op("sqlite")
            .with_message("published versions cannot be modified");
    }
    ExError::new(ExErrorKind::Persistence)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Create a serialization error for a stored JSON column
pub fn serialization_error(op: &str, err: serde_json::Error) -> ExError {
    ExError::new(ExErrorKind::Serialization)
        .with_op(op.to_string())
        .with_message(err.to_string())
}

/// True for SQLITE_BUSY / SQLITE_LOCKED
pub fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::DatabaseBusy || e.code == ErrorCode::DatabaseLocked
    )
}

fn is_immutable_trigger(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, Some(msg))
            if e.code == ErrorCode::ConstraintViolation && msg.contains(IMMUTABLE_TRIGGER_MESSAGE)
    )
}

/// Classify a UNIQUE constraint failure, `None` for any other error
pub fn unique_violation(err: &rusqlite::Error) -> Option<UniqueViolation> {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(msg))
            if e.code == ErrorCode::ConstraintViolation && msg.contains("UNIQUE") =>
        {
            Some(classify_unique_message(msg))
        }
        _ => None,
    }
}

fn classify_unique_message(msg: &str) -> UniqueViolation {
    if msg.contains("flow_versions.version_number") {
        UniqueViolation::VersionNumber
    } else if msg.contains("flow_versions.version_tag") {
        UniqueViolation::VersionTag
    } else if msg.contains("flow_versions.artifact_id") {
        UniqueViolation::ActiveSnapshot
    } else {
        UniqueViolation::Other
    }
}
