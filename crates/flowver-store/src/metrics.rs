//! Per-snapshot execution metrics
//!
//! Every counter changes through a single relative UPDATE, so concurrent
//! writers for the same snapshot add up instead of overwriting each other.
//! The average is recomputed from the stored totals on each write.

use chrono::{DateTime, Utc};
use flowver_core::model::{Channel, ExecutionOutcome, SnapshotMetrics};
use rusqlite::{params, Connection, OptionalExtension};

use crate::errors::{from_rusqlite, Result};
use crate::rows::{metrics_from_row, millis, METRICS_COLUMNS};
use crate::versions::snapshot_not_found;

/// One execution outcome to fold into a snapshot's metrics
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRecord {
    pub version_id: String,
    pub outcome: ExecutionOutcome,
    pub duration_ms: u64,
    /// `None` for channels without a dedicated counter
    pub channel: Option<Channel>,
    pub executed_at: DateTime<Utc>,
}

impl ExecutionRecord {
    pub fn new(
        version_id: impl Into<String>,
        outcome: ExecutionOutcome,
        duration_ms: u64,
        channel: Option<Channel>,
    ) -> Self {
        Self {
            version_id: version_id.into(),
            outcome,
            duration_ms,
            channel,
            executed_at: Utc::now(),
        }
    }
}

/// Fold one execution into the snapshot's counters.
///
/// ## Errors
///
/// - `VersionNotFound`: no metrics row for `version_id`
pub fn record_execution(conn: &Connection, record: &ExecutionRecord) -> Result<()> {
    let failed = i64::from(record.outcome.is_failure());
    let duration = i64::try_from(record.duration_ms).unwrap_or(i64::MAX);
    let at = millis(&record.executed_at);
    let hit = |channel: Channel| i64::from(record.channel == Some(channel));

    let updated = conn
        .execute(
            "UPDATE version_metrics SET
                execution_count = execution_count + 1,
                error_count = error_count + ?2,
                total_execution_time_ms = total_execution_time_ms + ?3,
                avg_execution_time_ms =
                    CAST(total_execution_time_ms + ?3 AS REAL) / (execution_count + 1),
                last_executed_at = ?4,
                last_error_at = CASE WHEN ?2 = 1 THEN ?4 ELSE last_error_at END,
                api_executions = api_executions + ?5,
                mcp_executions = mcp_executions + ?6,
                webhook_executions = webhook_executions + ?7,
                public_executions = public_executions + ?8,
                updated_at = ?4
             WHERE version_id = ?1",
            params![
                record.version_id,
                failed,
                duration,
                at,
                hit(Channel::Api),
                hit(Channel::Mcp),
                hit(Channel::Webhook),
                hit(Channel::Public),
            ],
        )
        .map_err(|e| from_rusqlite(e).with_op("record_execution"))?;

    if updated == 0 {
        return Err(snapshot_not_found(&record.version_id).with_op("record_execution"));
    }
    Ok(())
}

/// Current metrics of a snapshot
pub fn get_metrics(conn: &Connection, version_id: &str) -> Result<SnapshotMetrics> {
    conn.query_row(
        &format!(
            "SELECT {} FROM version_metrics WHERE version_id = ?1",
            METRICS_COLUMNS
        ),
        [version_id],
        metrics_from_row,
    )
    .optional()
    .map_err(from_rusqlite)?
    .ok_or_else(|| snapshot_not_found(version_id).with_op("get_metrics"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::create_artifact;
    use crate::db::open_in_memory;
    use crate::migrations::apply_migrations;
    use crate::versions::{publish, PublishPolicy, PublishRequest};
    use flowver_core::errors::ExErrorKind;
    use serde_json::json;

    fn setup() -> (Connection, String) {
        let mut conn = open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        let artifact_id = create_artifact(&conn, "flow", None).unwrap().id;
        let payload = json!({"nodes": [{"id": "a"}]});
        let version_id = publish(
            &mut conn,
            &PublishRequest::new(&artifact_id, &payload, "alice"),
            &PublishPolicy::default(),
        )
        .unwrap()
        .into_snapshot()
        .header
        .id;
        (conn, version_id)
    }

    #[test]
    fn test_new_snapshot_has_zeroed_metrics() {
        let (conn, version_id) = setup();
        let metrics = get_metrics(&conn, &version_id).unwrap();
        assert_eq!(metrics.execution_count, 0);
        assert_eq!(metrics.rollback_count, 0);
        assert!(metrics.avg_execution_time_ms.is_none());
        assert!(metrics.last_executed_at.is_none());
    }

    #[test]
    fn test_average_recomputed_from_totals() {
        let (conn, version_id) = setup();
        for (ms, outcome) in [
            (100, ExecutionOutcome::Success),
            (200, ExecutionOutcome::Failure),
            (600, ExecutionOutcome::Success),
        ] {
            record_execution(
                &conn,
                &ExecutionRecord::new(&version_id, outcome, ms, Some(Channel::Api)),
            )
            .unwrap();
        }

        let metrics = get_metrics(&conn, &version_id).unwrap();
        assert_eq!(metrics.execution_count, 3);
        assert_eq!(metrics.error_count, 1);
        assert_eq!(metrics.total_execution_time_ms, 900);
        assert_eq!(metrics.avg_execution_time_ms, Some(300.0));
        assert_eq!(metrics.api_executions, 3);
        assert!(metrics.last_error_at.is_some());
    }

    #[test]
    fn test_unknown_channel_counts_only_totals() {
        let (conn, version_id) = setup();
        record_execution(
            &conn,
            &ExecutionRecord::new(&version_id, ExecutionOutcome::Success, 5, None),
        )
        .unwrap();
        let metrics = get_metrics(&conn, &version_id).unwrap();
        assert_eq!(metrics.execution_count, 1);
        for channel in Channel::ALL {
            assert_eq!(metrics.channel_count(channel), 0);
        }
    }

    #[test]
    fn test_unknown_version() {
        let (conn, _) = setup();
        let err = record_execution(
            &conn,
            &ExecutionRecord::new("missing", ExecutionOutcome::Success, 1, None),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::VersionNotFound);
        assert_eq!(err.version_id(), Some("missing"));
        assert_eq!(err.artifact_id(), None);

        let err = get_metrics(&conn, "missing").unwrap_err();
        assert_eq!(err.version_id(), Some("missing"));
        assert_eq!(err.artifact_id(), None);
    }
}
