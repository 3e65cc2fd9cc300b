//! Version Store
//!
//! Publishing snapshots the draft into an immutable, numbered row. Numbers
//! are allocated as `max + 1` inside an IMMEDIATE transaction, so SQLite
//! serializes concurrent publishers per database; a lost race (unique
//! violation or lock timeout) rolls the whole attempt back and retries with
//! a fresh maximum. A rolled-back attempt never consumes a number.

use std::time::Duration;

use flowver_core::errors::{ExError, ExErrorKind, VersioningError};
use flowver_core::hashing::compute_payload_hash;
use flowver_core::model::{new_id, Snapshot, SnapshotHeader, SnapshotSummary, VersionUpdate};
use flowver_core::rules::{validate_payload, validate_tag};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::active::activate_in_tx;
use crate::artifacts::{artifact_not_found, find_artifact};
use crate::errors::{from_rusqlite, unique_violation, Result, UniqueViolation};
use crate::rows::{header_from_row, now_millis, summary_from_row, HEADER_COLUMNS, PAYLOAD_INDEX};

/// Default bound on publish attempts under contention
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

const RETRY_BACKOFF_MS: u64 = 10;

/// What to do when a publish would not change the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoopPolicy {
    /// Return the existing baseline snapshot; nothing is written
    #[default]
    ReturnExisting,
    /// Fail with `InvalidVersionOperation`
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishPolicy {
    pub max_attempts: u32,
    pub noop_policy: NoopPolicy,
}

impl Default for PublishPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            noop_policy: NoopPolicy::default(),
        }
    }
}

/// Input to [`publish`]
#[derive(Debug, Clone)]
pub struct PublishRequest<'a> {
    pub artifact_id: &'a str,
    pub payload: &'a Value,
    pub published_by: &'a str,
    pub version_tag: Option<&'a str>,
    /// Baseline for no-op detection and lineage; defaults to the latest snapshot
    pub created_from_version_id: Option<&'a str>,
    pub changelog: Option<&'a str>,
    pub description_version: Option<&'a str>,
    /// Activate the new snapshot inside the publish transaction
    pub activate: bool,
}

impl<'a> PublishRequest<'a> {
    pub fn new(artifact_id: &'a str, payload: &'a Value, published_by: &'a str) -> Self {
        Self {
            artifact_id,
            payload,
            published_by,
            version_tag: None,
            created_from_version_id: None,
            changelog: None,
            description_version: None,
            activate: false,
        }
    }

    pub fn with_tag(mut self, tag: &'a str) -> Self {
        self.version_tag = Some(tag);
        self
    }

    pub fn with_created_from(mut self, version_id: &'a str) -> Self {
        self.created_from_version_id = Some(version_id);
        self
    }

    pub fn with_changelog(mut self, changelog: &'a str) -> Self {
        self.changelog = Some(changelog);
        self
    }

    pub fn with_description(mut self, description: &'a str) -> Self {
        self.description_version = Some(description);
        self
    }

    pub fn activate(mut self, activate: bool) -> Self {
        self.activate = activate;
        self
    }
}

/// Result of a publish
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    /// A new snapshot was committed
    Created(Snapshot),
    /// The payload matched its baseline; the baseline is returned
    Unchanged(Snapshot),
}

impl PublishOutcome {
    pub fn snapshot(&self) -> &Snapshot {
        match self {
            PublishOutcome::Created(s) | PublishOutcome::Unchanged(s) => s,
        }
    }

    pub fn into_snapshot(self) -> Snapshot {
        match self {
            PublishOutcome::Created(s) | PublishOutcome::Unchanged(s) => s,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, PublishOutcome::Created(_))
    }
}

/// Keyset pagination over history, newest first.
///
/// Restart from `HistoryPage::next_before` to continue; publishes that land
/// between pages do not shift or repeat rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Only versions numbered strictly below this
    pub before: Option<i64>,
    pub limit: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            before: None,
            limit: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPage {
    pub items: Vec<SnapshotSummary>,
    /// Cursor for the next page, `None` when this page is the last
    pub next_before: Option<i64>,
}

enum Attempt {
    Done(PublishOutcome),
    /// Lost the version-number race; retry with a fresh maximum
    Retry(String),
}

/// Publish `request.payload` as the next snapshot of the artifact.
///
/// ## Errors
///
/// - `InvalidVersionOperation`: empty or malformed payload, foreign
///   `created_from_version_id`, or a no-op under [`NoopPolicy::Reject`]
/// - `InvalidInput`: unusable tag
/// - `VersionNotFound`: unknown artifact or `created_from_version_id`
/// - `VersionConflict`: tag already used, or attempts exhausted
pub fn publish(
    conn: &mut Connection,
    request: &PublishRequest<'_>,
    policy: &PublishPolicy,
) -> Result<PublishOutcome> {
    validate_payload(request.payload).map_err(|e| with_artifact(e, request.artifact_id))?;
    if let Some(tag) = request.version_tag {
        validate_tag(tag).map_err(|e| with_artifact(e, request.artifact_id))?;
    }
    let payload_hash =
        compute_payload_hash(request.payload).map_err(|e| with_artifact(e, request.artifact_id))?;

    let max_attempts = policy.max_attempts.max(1);
    let mut last_reason = String::new();
    for attempt in 1..=max_attempts {
        match try_publish(conn, request, &payload_hash, policy) {
            Ok(Attempt::Done(outcome)) => {
                if let PublishOutcome::Created(snapshot) = &outcome {
                    tracing::debug!(
                        artifact_id = %request.artifact_id,
                        version_id = %snapshot.id(),
                        version_number = snapshot.version_number(),
                        attempt = attempt,
                        "Published version"
                    );
                }
                return Ok(outcome);
            }
            Ok(Attempt::Retry(reason)) => last_reason = reason,
            Err(err) if err.kind() == ExErrorKind::Timeout => {
                last_reason = err.message().to_string()
            }
            Err(err) => return Err(err),
        }
        tracing::debug!(
            artifact_id = %request.artifact_id,
            attempt = attempt,
            reason = %last_reason,
            "Publish attempt lost a race, retrying"
        );
        if attempt < max_attempts {
            std::thread::sleep(Duration::from_millis(RETRY_BACKOFF_MS * u64::from(attempt)));
        }
    }

    Err(ExError::from(VersioningError::VersionConflict {
        artifact_id: request.artifact_id.to_string(),
        reason: format!(
            "version number allocation failed after {} attempts: {}",
            max_attempts, last_reason
        ),
    })
    .with_op("publish"))
}

fn try_publish(
    conn: &mut Connection,
    request: &PublishRequest<'_>,
    payload_hash: &str,
    policy: &PublishPolicy,
) -> Result<Attempt> {
    let artifact_id = request.artifact_id;
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(from_rusqlite)?;

    find_artifact(&tx, artifact_id)?.ok_or_else(|| artifact_not_found(artifact_id))?;

    if let Some(tag) = request.version_tag {
        if find_by_tag(&tx, artifact_id, tag)?.is_some() {
            return Err(tag_conflict(artifact_id, tag));
        }
    }

    let baseline = match request.created_from_version_id {
        Some(source_id) => Some(owned_header(&tx, artifact_id, source_id, "publish")?),
        None => latest_header(&tx, artifact_id)?,
    };

    if let Some(baseline) = baseline.as_ref().filter(|b| b.payload_hash == payload_hash) {
        return unchanged(tx, request, baseline, policy).map(Attempt::Done);
    }

    let version_number: i64 = tx
        .query_row(
            "SELECT COALESCE(MAX(version_number), 0) + 1 FROM flow_versions WHERE artifact_id = ?1",
            [artifact_id],
            |row| row.get(0),
        )
        .map_err(from_rusqlite)?;

    let version_id = new_id();
    let now = now_millis();
    let inserted = tx.execute(
        "INSERT INTO flow_versions (
            id, artifact_id, version_number, version_tag, payload, payload_hash,
            parent_payload_hash, is_active, created_from_version_id, published_by,
            published_at, changelog, description_version, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?9, ?10, ?11, ?12, ?10)",
        params![
            version_id,
            artifact_id,
            version_number,
            request.version_tag,
            request.payload,
            payload_hash,
            baseline.as_ref().map(|b| b.payload_hash.as_str()),
            request.created_from_version_id,
            request.published_by,
            now,
            request.changelog,
            request.description_version,
        ],
    );
    if let Err(err) = inserted {
        return match unique_violation(&err) {
            Some(UniqueViolation::VersionNumber) => Ok(Attempt::Retry(format!(
                "version number {} already taken",
                version_number
            ))),
            Some(UniqueViolation::VersionTag) => {
                Err(tag_conflict(artifact_id, request.version_tag.unwrap_or_default()))
            }
            _ => Err(from_rusqlite(err).with_op("publish")),
        };
    }

    tx.execute(
        "INSERT INTO version_metrics (version_id, updated_at) VALUES (?1, ?2)",
        params![version_id, now],
    )
    .map_err(from_rusqlite)?;

    tx.execute(
        "UPDATE artifacts
         SET version_count = version_count + 1, last_published_at = ?1, is_draft = 1, updated_at = ?1
         WHERE id = ?2",
        params![now, artifact_id],
    )
    .map_err(from_rusqlite)?;

    if request.activate {
        activate_in_tx(&tx, artifact_id, &version_id, Some(request.published_by), false)?;
    }

    let snapshot = get_snapshot(&tx, &version_id)?;
    tx.commit().map_err(from_rusqlite)?;

    Ok(Attempt::Done(PublishOutcome::Created(snapshot)))
}

fn unchanged(
    tx: Transaction<'_>,
    request: &PublishRequest<'_>,
    baseline: &SnapshotHeader,
    policy: &PublishPolicy,
) -> Result<PublishOutcome> {
    if policy.noop_policy == NoopPolicy::Reject {
        return Err(no_op_error(request.artifact_id, baseline));
    }
    // A tag cannot be attached to an existing snapshot
    if request.version_tag.is_some() {
        return Err(no_op_error(request.artifact_id, baseline));
    }

    if request.activate && !baseline.is_active {
        activate_in_tx(
            &tx,
            request.artifact_id,
            &baseline.id,
            Some(request.published_by),
            false,
        )?;
    }
    let snapshot = get_snapshot(&tx, &baseline.id)?;
    tx.commit().map_err(from_rusqlite)?;

    tracing::debug!(
        artifact_id = %request.artifact_id,
        version_id = %baseline.id,
        "Publish matched baseline payload, returning existing version"
    );
    Ok(PublishOutcome::Unchanged(snapshot))
}

fn no_op_error(artifact_id: &str, baseline: &SnapshotHeader) -> ExError {
    ExError::from(VersioningError::InvalidVersionOperation {
        reason: format!(
            "payload is identical to version {} ({}); nothing to publish",
            baseline.version_number, baseline.id
        ),
    })
    .with_op("publish")
    .with_artifact_id(artifact_id)
    .with_version_id(baseline.id.clone())
}

fn tag_conflict(artifact_id: &str, tag: &str) -> ExError {
    ExError::from(VersioningError::VersionConflict {
        artifact_id: artifact_id.to_string(),
        reason: format!("version tag `{}` is already in use", tag),
    })
    .with_op("publish")
}

fn with_artifact(err: VersioningError, artifact_id: &str) -> ExError {
    ExError::from(err)
        .with_op("publish")
        .with_artifact_id(artifact_id)
}

/// Header of `version_id`, which must belong to `artifact_id`.
///
/// Unknown ids are `VersionNotFound`; a snapshot of another artifact is an
/// `InvalidVersionOperation`.
pub(crate) fn owned_header(
    conn: &Connection,
    artifact_id: &str,
    version_id: &str,
    op: &str,
) -> Result<SnapshotHeader> {
    let header = find_header(conn, version_id)?
        .ok_or_else(|| version_not_found(artifact_id, version_id).with_op(op.to_string()))?;
    if header.artifact_id != artifact_id {
        return Err(ExError::from(VersioningError::InvalidVersionOperation {
            reason: format!(
                "version {} belongs to artifact {}",
                version_id, header.artifact_id
            ),
        })
        .with_op(op.to_string())
        .with_artifact_id(artifact_id)
        .with_version_id(version_id));
    }
    Ok(header)
}

pub(crate) fn version_not_found(artifact_id: &str, identifier: &str) -> ExError {
    ExError::from(VersioningError::VersionNotFound {
        artifact_id: artifact_id.to_string(),
        identifier: identifier.to_string(),
    })
}

/// `VersionNotFound` for a lookup by version id alone, where the owning
/// artifact is unknown
pub(crate) fn snapshot_not_found(version_id: &str) -> ExError {
    ExError::new(ExErrorKind::VersionNotFound)
        .with_version_id(version_id)
        .with_message(format!("Version {} not found", version_id))
}

fn query_header(conn: &Connection, filter: &str, args: impl rusqlite::Params) -> Result<Option<SnapshotHeader>> {
    conn.query_row(
        &format!("SELECT {} FROM flow_versions WHERE {}", HEADER_COLUMNS, filter),
        args,
        header_from_row,
    )
    .optional()
    .map_err(from_rusqlite)
}

/// Snapshot header by id, without the payload
pub fn find_header(conn: &Connection, version_id: &str) -> Result<Option<SnapshotHeader>> {
    query_header(conn, "id = ?1", [version_id])
}

pub fn find_by_number(
    conn: &Connection,
    artifact_id: &str,
    version_number: i64,
) -> Result<Option<SnapshotHeader>> {
    query_header(
        conn,
        "artifact_id = ?1 AND version_number = ?2",
        params![artifact_id, version_number],
    )
}

pub fn find_by_tag(conn: &Connection, artifact_id: &str, tag: &str) -> Result<Option<SnapshotHeader>> {
    query_header(
        conn,
        "artifact_id = ?1 AND version_tag = ?2",
        params![artifact_id, tag],
    )
}

/// Header of the highest-numbered snapshot
pub fn latest_header(conn: &Connection, artifact_id: &str) -> Result<Option<SnapshotHeader>> {
    query_header(
        conn,
        "artifact_id = ?1 ORDER BY version_number DESC LIMIT 1",
        [artifact_id],
    )
}

/// Immutable payload of a snapshot
pub fn get_payload(conn: &Connection, version_id: &str) -> Result<Value> {
    conn.query_row(
        "SELECT payload FROM flow_versions WHERE id = ?1",
        [version_id],
        |row| row.get(0),
    )
    .optional()
    .map_err(from_rusqlite)?
    .ok_or_else(|| snapshot_not_found(version_id))
}

/// Full snapshot by id
pub fn get_snapshot(conn: &Connection, version_id: &str) -> Result<Snapshot> {
    conn.query_row(
        &format!(
            "SELECT {}, payload FROM flow_versions WHERE id = ?1",
            HEADER_COLUMNS
        ),
        [version_id],
        |row| {
            let header = header_from_row(row)?;
            let payload: Value = row.get(PAYLOAD_INDEX)?;
            Ok(header.with_payload(payload))
        },
    )
    .optional()
    .map_err(from_rusqlite)?
    .ok_or_else(|| snapshot_not_found(version_id))
}

/// Number of committed snapshots of the artifact
pub fn count_versions(conn: &Connection, artifact_id: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM flow_versions WHERE artifact_id = ?1",
        [artifact_id],
        |row| row.get(0),
    )
    .map_err(from_rusqlite)
}

/// One page of history, newest version number first
pub fn history(conn: &Connection, artifact_id: &str, page: Pagination) -> Result<HistoryPage> {
    let limit = i64::from(page.limit.max(1));
    let before = page.before.unwrap_or(i64::MAX);

    let mut stmt = conn
        .prepare(
            "SELECT v.id, v.version_number, v.version_tag, v.is_active, v.payload_hash,
                    v.published_by, v.published_at, v.description_version,
                    COALESCE(m.execution_count, 0), COALESCE(m.error_count, 0)
             FROM flow_versions v
             LEFT JOIN version_metrics m ON m.version_id = v.id
             WHERE v.artifact_id = ?1 AND v.version_number < ?2
             ORDER BY v.version_number DESC
             LIMIT ?3",
        )
        .map_err(from_rusqlite)?;

    let mut items = stmt
        .query_map(params![artifact_id, before, limit + 1], summary_from_row)
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;

    let next_before = if items.len() as i64 > limit {
        items.truncate(limit as usize);
        items.last().map(|s| s.version_number)
    } else {
        None
    };

    Ok(HistoryPage { items, next_before })
}

/// Every page of history, newest first
pub fn full_history(conn: &Connection, artifact_id: &str) -> Result<Vec<SnapshotSummary>> {
    let mut all = Vec::new();
    let mut page = Pagination::default();
    loop {
        let HistoryPage { items, next_before } = history(conn, artifact_id, page)?;
        all.extend(items);
        match next_before {
            Some(before) => page.before = Some(before),
            None => return Ok(all),
        }
    }
}

/// Apply an annotation-only update to a published snapshot.
///
/// Fields left `None` keep their current value.
pub fn update_annotations(
    conn: &Connection,
    version_id: &str,
    update: &VersionUpdate,
) -> Result<SnapshotHeader> {
    let current =
        find_header(conn, version_id)?.ok_or_else(|| snapshot_not_found(version_id))?;
    if update.is_empty() {
        return Ok(current);
    }

    conn.execute(
        "UPDATE flow_versions
         SET changelog = COALESCE(?1, changelog),
             description_version = COALESCE(?2, description_version),
             updated_at = ?3
         WHERE id = ?4",
        params![
            update.changelog,
            update.description_version,
            now_millis(),
            version_id
        ],
    )
    .map_err(|e| from_rusqlite(e).with_op("update_annotations"))?;

    find_header(conn, version_id)?.ok_or_else(|| version_not_found(&current.artifact_id, version_id))
}
