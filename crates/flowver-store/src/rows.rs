//! Row mapping shared by the store modules

use chrono::{DateTime, TimeZone, Utc};
use flowver_core::model::{Artifact, SnapshotHeader, SnapshotMetrics, SnapshotSummary};
use rusqlite::Row;

use crate::active::ActivationRecord;

pub(crate) const ARTIFACT_COLUMNS: &str = "id, name, is_draft, active_version_id, version_count, \
     last_published_at, draft, created_at, updated_at";

pub(crate) const HEADER_COLUMNS: &str = "id, artifact_id, version_number, version_tag, \
     payload_hash, parent_payload_hash, is_active, created_from_version_id, published_by, \
     published_at, changelog, description_version, updated_at";

/// Index of `payload` when selected after [`HEADER_COLUMNS`]
pub(crate) const PAYLOAD_INDEX: usize = 13;

pub(crate) const METRICS_COLUMNS: &str = "version_id, execution_count, error_count, \
     total_execution_time_ms, avg_execution_time_ms, last_executed_at, last_error_at, \
     api_executions, mcp_executions, webhook_executions, public_executions, rollback_count, \
     updated_at";

pub(crate) const ACTIVATION_COLUMNS: &str =
    "id, artifact_id, version_id, previous_version_id, actor, is_rollback, activated_at";

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn millis(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}

fn opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<i64>>(idx)? {
        Some(_) => ts(row, idx).map(Some),
        None => Ok(None),
    }
}

pub(crate) fn artifact_from_row(row: &Row<'_>) -> rusqlite::Result<Artifact> {
    Ok(Artifact {
        id: row.get(0)?,
        name: row.get(1)?,
        is_draft: row.get(2)?,
        active_version_id: row.get(3)?,
        version_count: row.get(4)?,
        last_published_at: opt_ts(row, 5)?,
        draft: row.get(6)?,
        created_at: ts(row, 7)?,
        updated_at: ts(row, 8)?,
    })
}

pub(crate) fn header_from_row(row: &Row<'_>) -> rusqlite::Result<SnapshotHeader> {
    Ok(SnapshotHeader {
        id: row.get(0)?,
        artifact_id: row.get(1)?,
        version_number: row.get(2)?,
        version_tag: row.get(3)?,
        payload_hash: row.get(4)?,
        parent_payload_hash: row.get(5)?,
        is_active: row.get(6)?,
        created_from_version_id: row.get(7)?,
        published_by: row.get(8)?,
        published_at: ts(row, 9)?,
        changelog: row.get(10)?,
        description_version: row.get(11)?,
        updated_at: ts(row, 12)?,
    })
}

/// Maps `id, version_number, version_tag, is_active, payload_hash,
/// published_by, published_at, description_version, execution_count,
/// error_count`
pub(crate) fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<SnapshotSummary> {
    Ok(SnapshotSummary {
        id: row.get(0)?,
        version_number: row.get(1)?,
        version_tag: row.get(2)?,
        is_active: row.get(3)?,
        payload_hash: row.get(4)?,
        published_by: row.get(5)?,
        published_at: ts(row, 6)?,
        description_version: row.get(7)?,
        execution_count: row.get(8)?,
        error_count: row.get(9)?,
    })
}

pub(crate) fn metrics_from_row(row: &Row<'_>) -> rusqlite::Result<SnapshotMetrics> {
    Ok(SnapshotMetrics {
        version_id: row.get(0)?,
        execution_count: row.get(1)?,
        error_count: row.get(2)?,
        total_execution_time_ms: row.get(3)?,
        avg_execution_time_ms: row.get(4)?,
        last_executed_at: opt_ts(row, 5)?,
        last_error_at: opt_ts(row, 6)?,
        api_executions: row.get(7)?,
        mcp_executions: row.get(8)?,
        webhook_executions: row.get(9)?,
        public_executions: row.get(10)?,
        rollback_count: row.get(11)?,
        updated_at: ts(row, 12)?,
    })
}

pub(crate) fn activation_from_row(row: &Row<'_>) -> rusqlite::Result<ActivationRecord> {
    Ok(ActivationRecord {
        id: row.get(0)?,
        artifact_id: row.get(1)?,
        version_id: row.get(2)?,
        previous_version_id: row.get(3)?,
        actor: row.get(4)?,
        is_rollback: row.get(5)?,
        activated_at: ts(row, 6)?,
    })
}
