//! Active Pointer Manager
//!
//! `artifacts.active_version_id` is the single authoritative pointer. The
//! denormalized `flow_versions.is_active` flags and the pointer are
//! rewritten together inside one IMMEDIATE transaction, so concurrent
//! switches on the same artifact serialize and exactly one wins. The
//! partial unique index on `is_active` rejects any state with two active
//! snapshots.
//!
//! Nothing here touches a read cache. Hosts that cache resolved pointers
//! switch through `flowver_engine::VersionService`, which invalidates the
//! `active` and `latest` entries after commit. Calling [`set_active`] or
//! [`rollback`] directly leaves those entries for the caller to invalidate.

use chrono::{DateTime, Utc};
use flowver_core::errors::{ExError, VersioningError};
use flowver_core::model::Snapshot;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};

use crate::artifacts::{artifact_not_found, find_artifact, get_artifact};
use crate::errors::{from_rusqlite, Result};
use crate::rows::{activation_from_row, now_millis, ACTIVATION_COLUMNS};
use crate::versions::{find_header, get_snapshot, owned_header, version_not_found};

/// One committed activation, as recorded in the audit table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationRecord {
    pub id: i64,
    pub artifact_id: String,
    pub version_id: String,
    pub previous_version_id: Option<String>,
    pub actor: Option<String>,
    pub is_rollback: bool,
    pub activated_at: DateTime<Utc>,
}

/// Result of [`set_active`]
#[derive(Debug, Clone, PartialEq)]
pub enum SwitchOutcome {
    Switched(ActivationRecord),
    /// The target was already active; nothing was written
    AlreadyActive,
}

impl SwitchOutcome {
    pub fn is_switched(&self) -> bool {
        matches!(self, SwitchOutcome::Switched(_))
    }
}

/// Point the artifact at `version_id`.
///
/// ## Errors
///
/// - `VersionNotFound`: unknown artifact, or the snapshot is unknown or
///   belongs to another artifact
///
/// Cached pointers are not invalidated here; see the module docs.
pub fn set_active(
    conn: &mut Connection,
    artifact_id: &str,
    version_id: &str,
    actor: Option<&str>,
) -> Result<SwitchOutcome> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(from_rusqlite)?;

    let artifact = find_artifact(&tx, artifact_id)?
        .ok_or_else(|| artifact_not_found(artifact_id).with_op("set_active"))?;

    let owned = find_header(&tx, version_id)?.filter(|h| h.artifact_id == artifact_id);
    if owned.is_none() {
        return Err(version_not_found(artifact_id, version_id)
            .with_op("set_active")
            .with_version_id(version_id));
    }

    if artifact.is_active_version(version_id) {
        return Ok(SwitchOutcome::AlreadyActive);
    }

    let record = activate_in_tx(&tx, artifact_id, version_id, actor, false)?;
    tx.commit().map_err(from_rusqlite)?;

    tracing::debug!(
        artifact_id = %artifact_id,
        version_id = %version_id,
        previous_version_id = ?record.previous_version_id,
        "Switched active version"
    );
    Ok(SwitchOutcome::Switched(record))
}

/// Re-point the artifact at an earlier snapshot and count the rollback.
///
/// History is untouched: no snapshot is deleted or modified and
/// `version_count` does not change.
///
/// ## Errors
///
/// - `VersionNotFound`: unknown artifact or snapshot
/// - `InvalidVersionOperation`: the snapshot belongs to another artifact, or
///   is already active
///
/// Cached pointers are not invalidated here; see the module docs.
pub fn rollback(
    conn: &mut Connection,
    artifact_id: &str,
    target_version_id: &str,
    actor: Option<&str>,
) -> Result<ActivationRecord> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(from_rusqlite)?;

    let artifact = find_artifact(&tx, artifact_id)?
        .ok_or_else(|| artifact_not_found(artifact_id).with_op("rollback"))?;
    let target = owned_header(&tx, artifact_id, target_version_id, "rollback")?;

    if artifact.is_active_version(target_version_id) {
        return Err(ExError::from(VersioningError::InvalidVersionOperation {
            reason: format!("version {} is already active", target.version_number),
        })
        .with_op("rollback")
        .with_artifact_id(artifact_id)
        .with_version_id(target_version_id));
    }

    let record = activate_in_tx(&tx, artifact_id, target_version_id, actor, true)?;
    tx.commit().map_err(from_rusqlite)?;

    tracing::info!(
        artifact_id = %artifact_id,
        version_id = %target_version_id,
        version_number = target.version_number,
        previous_version_id = ?record.previous_version_id,
        "Rolled back active version"
    );
    Ok(record)
}

/// Perform the pointer switch inside an open transaction.
///
/// Clears the previous flag, sets the target flag, rewrites the artifact
/// pointer and records the activation. The caller has verified that the
/// target belongs to the artifact.
pub(crate) fn activate_in_tx(
    tx: &Transaction<'_>,
    artifact_id: &str,
    version_id: &str,
    actor: Option<&str>,
    is_rollback: bool,
) -> Result<ActivationRecord> {
    let now = now_millis();

    let previous_version_id: Option<String> = tx
        .query_row(
            "SELECT active_version_id FROM artifacts WHERE id = ?1",
            [artifact_id],
            |row| row.get(0),
        )
        .map_err(from_rusqlite)?;

    tx.execute(
        "UPDATE flow_versions SET is_active = 0, updated_at = ?1
         WHERE artifact_id = ?2 AND is_active = 1 AND id <> ?3",
        params![now, artifact_id, version_id],
    )
    .map_err(from_rusqlite)?;

    tx.execute(
        "UPDATE flow_versions SET is_active = 1, updated_at = ?1 WHERE id = ?2",
        params![now, version_id],
    )
    .map_err(from_rusqlite)?;

    tx.execute(
        "UPDATE artifacts
         SET active_version_id = ?1,
             is_draft = 0,
             last_published_at = (SELECT published_at FROM flow_versions WHERE id = ?1),
             updated_at = ?2
         WHERE id = ?3",
        params![version_id, now, artifact_id],
    )
    .map_err(from_rusqlite)?;

    if is_rollback {
        tx.execute(
            "UPDATE version_metrics SET rollback_count = rollback_count + 1, updated_at = ?1
             WHERE version_id = ?2",
            params![now, version_id],
        )
        .map_err(from_rusqlite)?;
    }

    tx.execute(
        "INSERT INTO version_activations
            (artifact_id, version_id, previous_version_id, actor, is_rollback, activated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            artifact_id,
            version_id,
            previous_version_id,
            actor,
            is_rollback,
            now
        ],
    )
    .map_err(from_rusqlite)?;

    tx.query_row(
        &format!(
            "SELECT {} FROM version_activations WHERE id = ?1",
            ACTIVATION_COLUMNS
        ),
        [tx.last_insert_rowid()],
        activation_from_row,
    )
    .map_err(from_rusqlite)
}

/// The active snapshot.
///
/// ## Errors
///
/// - `VersionNotFound`: unknown artifact
/// - `ActiveVersionNotSet`: the artifact has no active pointer
pub fn get_active(conn: &Connection, artifact_id: &str) -> Result<Snapshot> {
    let version_id = active_version_id(conn, artifact_id)?.ok_or_else(|| {
        ExError::from(VersioningError::ActiveVersionNotSet {
            artifact_id: artifact_id.to_string(),
        })
        .with_op("get_active")
    })?;
    get_snapshot(conn, &version_id)
}

/// The authoritative pointer value, `None` when unset
pub fn active_version_id(conn: &Connection, artifact_id: &str) -> Result<Option<String>> {
    Ok(get_artifact(conn, artifact_id)?.active_version_id)
}

/// Number of snapshots flagged active for the artifact (0 or 1)
pub fn count_active_flags(conn: &Connection, artifact_id: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM flow_versions WHERE artifact_id = ?1 AND is_active = 1",
        [artifact_id],
        |row| row.get(0),
    )
    .map_err(from_rusqlite)
}

/// Activation audit trail, newest first
pub fn list_activations(
    conn: &Connection,
    artifact_id: &str,
    limit: u32,
) -> Result<Vec<ActivationRecord>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM version_activations WHERE artifact_id = ?1 ORDER BY id DESC LIMIT ?2",
            ACTIVATION_COLUMNS
        ))
        .map_err(from_rusqlite)?;
    let records = stmt
        .query_map(params![artifact_id, i64::from(limit)], activation_from_row)
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    Ok(records)
}
