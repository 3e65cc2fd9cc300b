//! Artifact rows and the mutable draft

use flowver_core::errors::{ExError, ExErrorKind, VersioningError};
use flowver_core::model::{new_id, Artifact};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::errors::{from_rusqlite, Result};
use crate::rows::{artifact_from_row, now_millis, ARTIFACT_COLUMNS};

/// Create a new artifact with an optional initial draft
pub fn create_artifact(conn: &Connection, name: &str, draft: Option<&Value>) -> Result<Artifact> {
    if name.trim().is_empty() {
        return Err(ExError::new(ExErrorKind::InvalidInput)
            .with_op("create_artifact")
            .with_message("artifact name must not be empty"));
    }

    let id = new_id();
    let now = now_millis();
    conn.execute(
        "INSERT INTO artifacts (id, name, is_draft, version_count, draft, created_at, updated_at)
         VALUES (?1, ?2, 1, 0, ?3, ?4, ?4)",
        params![id, name, draft, now],
    )
    .map_err(from_rusqlite)?;

    tracing::debug!(artifact_id = %id, "Created artifact");
    get_artifact(conn, &id)
}

/// Load an artifact, failing with `VersionNotFound` if it does not exist
pub fn get_artifact(conn: &Connection, artifact_id: &str) -> Result<Artifact> {
    find_artifact(conn, artifact_id)?.ok_or_else(|| artifact_not_found(artifact_id))
}

pub fn find_artifact(conn: &Connection, artifact_id: &str) -> Result<Option<Artifact>> {
    conn.query_row(
        &format!("SELECT {} FROM artifacts WHERE id = ?1", ARTIFACT_COLUMNS),
        [artifact_id],
        artifact_from_row,
    )
    .optional()
    .map_err(from_rusqlite)
}

/// Overwrite the artifact's working draft.
///
/// Drafts are never versioned; this does not touch snapshots, the active
/// pointer or `version_count`. The artifact is marked as having a draft.
pub fn save_draft(conn: &Connection, artifact_id: &str, payload: &Value) -> Result<Artifact> {
    let updated = conn
        .execute(
            "UPDATE artifacts SET draft = ?1, is_draft = 1, updated_at = ?2 WHERE id = ?3",
            params![payload, now_millis(), artifact_id],
        )
        .map_err(from_rusqlite)?;
    if updated == 0 {
        return Err(artifact_not_found(artifact_id).with_op("save_draft"));
    }
    get_artifact(conn, artifact_id)
}

pub(crate) fn artifact_not_found(artifact_id: &str) -> ExError {
    ExError::from(VersioningError::VersionNotFound {
        artifact_id: artifact_id.to_string(),
        identifier: "artifact".to_string(),
    })
    .with_message(format!("Artifact {} not found", artifact_id))
}
