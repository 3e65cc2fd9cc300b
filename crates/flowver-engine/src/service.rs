//! Version Service (orchestrator)
//!
//! Composes the store, the active pointer manager, the resolver and the
//! cache into the public versioning operations.
//!
//! ## Logging Ownership
//!
//! The service owns lifecycle logging: every operation is bracketed by
//! `log_op_start!` and `log_op_end!` / `log_op_error!`. The store and the
//! resolver only emit `tracing::debug!` details.
//!
//! ## Cache invalidation
//!
//! Pointer entries are invalidated after the owning transaction commits:
//! `Active` whenever the active pointer may have moved, `Latest` whenever a
//! snapshot was created or a cached snapshot header may be stale.
//! Switching the pointer with `flowver_store::active` directly bypasses
//! this; such callers invalidate through [`VersionService::cache`].
//!
//! Each operation opens its own connection, so one service value can be
//! shared across threads.

use std::sync::Arc;
use std::time::Instant;

use flowver_core::diff::{compute_diff, VersionDiff};
use flowver_core::errors::{ExError, VersioningError};
use flowver_core::model::{
    Artifact, Resolution, Selector, Snapshot, SnapshotHeader, SnapshotMetrics, SnapshotSummary,
};
use flowver_core::rules::parse_version_patch;
use flowver_core::{log_op_end, log_op_error, log_op_start};
use flowver_core_types::RequestContext;
use flowver_store::active::{self, ActivationRecord, SwitchOutcome};
use flowver_store::artifacts;
use flowver_store::errors::Result;
use flowver_store::metrics::{get_metrics, ExecutionRecord};
use flowver_store::versions::{
    full_history, history, publish, update_annotations, HistoryPage, Pagination,
};
use flowver_store::{Database, PublishOutcome, PublishPolicy, PublishRequest};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::{cache_from_config, PointerKind, VersionCache};
use crate::config::VersioningConfig;
use crate::metrics::{record_or_warn, MetricsRecorder};
use crate::resolver::{ResolveContext, VersionResolver};

/// Publisher recorded when the request carries no actor
pub const DEFAULT_ACTOR: &str = "system";

/// Options for [`VersionService::publish_version`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOptions {
    pub version_tag: Option<String>,
    /// Baseline for no-op detection and lineage; defaults to the latest
    pub created_from_version_id: Option<String>,
    pub changelog: Option<String>,
    pub description_version: Option<String>,
    /// Activate the new snapshot in the same transaction
    pub activate: bool,
}

/// Artifact header with its history, active snapshot and draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactOverview {
    /// Includes the current draft payload
    pub artifact: Artifact,
    /// Newest first, with execution and error counts
    pub versions: Vec<SnapshotSummary>,
    pub active: Option<Snapshot>,
}

/// Public versioning operations
#[derive(Clone)]
pub struct VersionService {
    db: Database,
    resolver: VersionResolver,
    policy: PublishPolicy,
}

impl VersionService {
    pub fn new(db: Database, cache: Arc<dyn VersionCache>, policy: PublishPolicy) -> Self {
        Self {
            db,
            resolver: VersionResolver::new(cache),
            policy,
        }
    }

    /// Open the configured store, apply migrations and build the cache.
    ///
    /// ## Errors
    ///
    /// - `Persistence`: the database cannot be opened or migrated
    pub fn open(config: &VersioningConfig) -> Result<Self> {
        let db = Database::new(config.store.clone());
        db.initialize()?;
        Ok(Self::new(
            db,
            cache_from_config(&config.cache),
            config.publish.policy(),
        ))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn cache(&self) -> &Arc<dyn VersionCache> {
        self.resolver.cache()
    }

    /// Start a background recorder on its own connection
    ///
    /// ## Errors
    ///
    /// - `Persistence` / `Internal`: see [`MetricsRecorder::spawn`]
    pub fn metrics_recorder(&self) -> Result<MetricsRecorder> {
        MetricsRecorder::spawn(&self.db)
    }

    fn connect(&self) -> Result<Connection> {
        self.db.connect()
    }

    fn invalidate(&self, artifact_id: &str, kinds: &[PointerKind]) {
        for kind in kinds {
            self.cache().invalidate_pointer(artifact_id, *kind);
        }
        tracing::debug!(artifact_id = %artifact_id, pointers = ?kinds, "Invalidated cached pointers");
    }

    // ----- Drafts -----

    /// ## Errors
    ///
    /// - `InvalidInput`: empty name
    pub fn create_artifact(
        &self,
        ctx: &RequestContext,
        name: &str,
        draft: Option<&Value>,
    ) -> Result<Artifact> {
        instrumented("create_artifact", "", ctx, || {
            artifacts::create_artifact(&self.connect()?, name, draft)
        })
    }

    /// Overwrite the working draft. Never touches snapshots or the pointer.
    ///
    /// ## Errors
    ///
    /// - `VersionNotFound`: unknown artifact
    pub fn save_draft(&self, ctx: &RequestContext, artifact_id: &str, payload: &Value) -> Result<Artifact> {
        instrumented("save_draft", artifact_id, ctx, || {
            artifacts::save_draft(&self.connect()?, artifact_id, payload)
        })
    }

    /// ## Errors
    ///
    /// - `VersionNotFound`: unknown artifact
    pub fn get_artifact(&self, artifact_id: &str) -> Result<Artifact> {
        instrumented("get_artifact", artifact_id, &RequestContext::new(), || {
            artifacts::get_artifact(&self.connect()?, artifact_id)
        })
    }

    // ----- Publish / activate / rollback -----

    /// Publish the artifact's current draft.
    ///
    /// ## Errors
    ///
    /// - `InvalidVersionOperation`: no draft, empty or malformed draft, or a
    ///   no-op publish rejected by policy
    /// - `VersionConflict`: tag already used, or numbering retries exhausted
    /// - `VersionNotFound`: unknown artifact or baseline
    pub fn publish_version(
        &self,
        ctx: &RequestContext,
        artifact_id: &str,
        options: &PublishOptions,
    ) -> Result<PublishOutcome> {
        instrumented("publish_version", artifact_id, ctx, || {
            let mut conn = self.connect()?;
            let draft = artifacts::get_artifact(&conn, artifact_id)?
                .draft
                .ok_or_else(|| {
                    ExError::from(VersioningError::InvalidVersionOperation {
                        reason: "artifact has no draft to publish".to_string(),
                    })
                    .with_artifact_id(artifact_id)
                })?;

            let mut request = PublishRequest::new(
                artifact_id,
                &draft,
                ctx.actor.as_deref().unwrap_or(DEFAULT_ACTOR),
            )
            .activate(options.activate);
            request.version_tag = options.version_tag.as_deref();
            request.created_from_version_id = options.created_from_version_id.as_deref();
            request.changelog = options.changelog.as_deref();
            request.description_version = options.description_version.as_deref();

            let outcome = publish(&mut conn, &request, &self.policy)?;
            if options.activate {
                self.invalidate(artifact_id, &[PointerKind::Active, PointerKind::Latest]);
            } else if outcome.is_created() {
                self.invalidate(artifact_id, &[PointerKind::Latest]);
            }
            Ok(outcome)
        })
    }

    /// Make `version_id` the artifact's active snapshot.
    ///
    /// ## Errors
    ///
    /// - `VersionNotFound`: unknown artifact, or a snapshot it does not own
    pub fn set_active_version(
        &self,
        ctx: &RequestContext,
        artifact_id: &str,
        version_id: &str,
    ) -> Result<SwitchOutcome> {
        instrumented("set_active_version", artifact_id, ctx, || {
            let mut conn = self.connect()?;
            let outcome = active::set_active(&mut conn, artifact_id, version_id, ctx.actor.as_deref())?;
            if outcome.is_switched() {
                self.invalidate(artifact_id, &[PointerKind::Active, PointerKind::Latest]);
            }
            Ok(outcome)
        })
    }

    /// Re-activate an earlier snapshot and count the rollback.
    ///
    /// ## Errors
    ///
    /// - `VersionNotFound`: unknown artifact or snapshot
    /// - `InvalidVersionOperation`: foreign or already active snapshot
    pub fn rollback_to_version(
        &self,
        ctx: &RequestContext,
        artifact_id: &str,
        version_id: &str,
    ) -> Result<ActivationRecord> {
        instrumented("rollback_to_version", artifact_id, ctx, || {
            let mut conn = self.connect()?;
            let record = active::rollback(&mut conn, artifact_id, version_id, ctx.actor.as_deref())?;
            self.invalidate(artifact_id, &[PointerKind::Active, PointerKind::Latest]);
            Ok(record)
        })
    }

    /// Copy a snapshot's payload into the artifact's draft.
    ///
    /// History and the active pointer are left alone.
    ///
    /// ## Errors
    ///
    /// - `VersionNotFound`: unknown artifact, or a snapshot it does not own
    pub fn create_draft_from_version(
        &self,
        ctx: &RequestContext,
        artifact_id: &str,
        version_id: &str,
    ) -> Result<Artifact> {
        instrumented("create_draft_from_version", artifact_id, ctx, || {
            let conn = self.connect()?;
            let snapshot = self.resolver.by_id(&conn, artifact_id, version_id)?;
            artifacts::save_draft(&conn, artifact_id, &snapshot.payload)
        })
    }

    /// Change `changelog` / `descriptionVersion` of a published snapshot.
    ///
    /// ## Errors
    ///
    /// - `VersionImmutable`: the patch touches an immutable field
    /// - `InvalidVersionOperation`: the patch touches `is_active`
    /// - `InvalidInput`: unknown keys or non-string values
    /// - `VersionNotFound`: unknown snapshot
    pub fn update_version_annotations(
        &self,
        ctx: &RequestContext,
        version_id: &str,
        patch: &Value,
    ) -> Result<SnapshotHeader> {
        instrumented("update_version_annotations", "", ctx, || {
            let update = parse_version_patch(patch)
                .map_err(|e| ExError::from(e).with_version_id(version_id))?;
            let header = update_annotations(&self.connect()?, version_id, &update)?;
            self.invalidate(&header.artifact_id, &[PointerKind::Active, PointerKind::Latest]);
            Ok(header)
        })
    }

    // ----- Reads -----

    /// Resolve a selector; the entry point for execution callers.
    ///
    /// ## Errors
    ///
    /// See [`VersionResolver::resolve`].
    pub fn resolve(
        &self,
        artifact_id: &str,
        selector: &Selector,
        context: ResolveContext,
    ) -> Result<Resolution> {
        instrumented("resolve", artifact_id, &RequestContext::new(), || {
            self.resolver
                .resolve(&self.connect()?, artifact_id, selector, context)
        })
    }

    /// Committed snapshot by id, number (`7` / `v7`), tag, `active` or
    /// `latest`.
    ///
    /// ## Errors
    ///
    /// - `InvalidInput`: empty identifier
    /// - `InvalidVersionOperation`: `draft` (not a committed snapshot)
    /// - `VersionNotFound` / `ActiveVersionNotSet`: no match
    pub fn get_version(&self, artifact_id: &str, identifier: &str) -> Result<Snapshot> {
        instrumented("get_version", artifact_id, &RequestContext::new(), || {
            let selector = Selector::parse(identifier)?;
            let resolution = self.resolver.resolve(
                &self.connect()?,
                artifact_id,
                &selector,
                ResolveContext::Production,
            )?;
            resolution.into_snapshot().ok_or_else(|| {
                ExError::from(VersioningError::InvalidVersionOperation {
                    reason: format!("`{}` does not name a committed version", identifier),
                })
            })
        })
    }

    /// Structural diff between two snapshots (or the draft) of one artifact
    ///
    /// ## Errors
    ///
    /// - `VersionNotFound` / `ActiveVersionNotSet`: a side does not resolve
    pub fn compare_versions(&self, artifact_id: &str, a: &Selector, b: &Selector) -> Result<VersionDiff> {
        instrumented("compare_versions", artifact_id, &RequestContext::new(), || {
            let conn = self.connect()?;
            let left = self
                .resolver
                .resolve(&conn, artifact_id, a, ResolveContext::EditorPreview)?;
            let right = self
                .resolver
                .resolve(&conn, artifact_id, b, ResolveContext::EditorPreview)?;
            Ok(compute_diff(left.payload(), right.payload())?)
        })
    }

    /// ## Errors
    ///
    /// - `VersionNotFound`: unknown snapshot
    pub fn get_version_metrics(&self, version_id: &str) -> Result<SnapshotMetrics> {
        instrumented("get_version_metrics", "", &RequestContext::new(), || {
            get_metrics(&self.connect()?, version_id)
        })
    }

    /// One page of history, newest first
    ///
    /// ## Errors
    ///
    /// - `VersionNotFound`: unknown artifact
    pub fn get_version_history(&self, artifact_id: &str, page: Pagination) -> Result<HistoryPage> {
        instrumented("get_version_history", artifact_id, &RequestContext::new(), || {
            let conn = self.connect()?;
            artifacts::get_artifact(&conn, artifact_id)?;
            history(&conn, artifact_id, page)
        })
    }

    /// ## Errors
    ///
    /// - `VersionNotFound`: unknown artifact
    pub fn get_artifact_with_versions(&self, artifact_id: &str) -> Result<ArtifactOverview> {
        instrumented("get_artifact_with_versions", artifact_id, &RequestContext::new(), || {
            let conn = self.connect()?;
            let artifact = artifacts::get_artifact(&conn, artifact_id)?;
            let versions = full_history(&conn, artifact_id)?;
            let active = match artifact.active_version_id.as_deref() {
                Some(version_id) => Some(self.resolver.by_id(&conn, artifact_id, version_id)?),
                None => None,
            };
            Ok(ArtifactOverview {
                artifact,
                versions,
                active,
            })
        })
    }

    /// Activation audit trail, newest first
    ///
    /// ## Errors
    ///
    /// - `VersionNotFound`: unknown artifact
    pub fn list_activations(&self, artifact_id: &str, limit: u32) -> Result<Vec<ActivationRecord>> {
        instrumented("list_activations", artifact_id, &RequestContext::new(), || {
            let conn = self.connect()?;
            artifacts::get_artifact(&conn, artifact_id)?;
            active::list_activations(&conn, artifact_id, limit)
        })
    }

    // ----- Metrics -----

    /// Fold one execution outcome into the snapshot's metrics.
    ///
    /// Never fails: store errors are logged and swallowed. Returns whether
    /// the outcome was stored.
    pub fn record_execution(&self, record: &ExecutionRecord) -> bool {
        log_op_start!("record_execution", version_id = %record.version_id);
        let start = Instant::now();
        let stored = match self.connect() {
            Ok(conn) => record_or_warn(&conn, record),
            Err(err) => {
                tracing::warn!(
                    version_id = %record.version_id,
                    err_code = err.code(),
                    error = %err,
                    "Failed to open connection for execution metrics"
                );
                false
            }
        };
        log_op_end!(
            "record_execution",
            duration_ms = start.elapsed().as_millis() as u64,
            version_id = %record.version_id,
            stored = stored
        );
        stored
    }
}

/// Bracket `f` with lifecycle events and attach request correlation to
/// any error it returns.
fn instrumented<T>(
    op: &'static str,
    artifact_id: &str,
    ctx: &RequestContext,
    f: impl FnOnce() -> Result<T>,
) -> Result<T> {
    log_op_start!(op, artifact_id = %artifact_id, request_id = %ctx.request_id);
    let start = Instant::now();

    match f() {
        Ok(value) => {
            log_op_end!(
                op,
                duration_ms = start.elapsed().as_millis() as u64,
                artifact_id = %artifact_id,
                request_id = %ctx.request_id
            );
            Ok(value)
        }
        Err(err) => {
            let err = with_request(err, op, ctx);
            log_op_error!(
                op,
                err,
                duration_ms = start.elapsed().as_millis() as u64,
                artifact_id = %artifact_id,
                request_id = %ctx.request_id
            );
            Err(err)
        }
    }
}

fn with_request(err: ExError, op: &str, ctx: &RequestContext) -> ExError {
    let err = if err.op().is_none() { err.with_op(op) } else { err };
    let err = err.with_request_id(ctx.request_id.clone());
    match &ctx.trace_id {
        Some(trace_id) => err.with_trace_id(trace_id.clone()),
        None => err,
    }
}
