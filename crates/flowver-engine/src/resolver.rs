//! Version Resolver
//!
//! Turns a [`Selector`] into a committed snapshot (or, for editor preview,
//! the working draft). Every execution and integration caller goes through
//! [`VersionResolver::resolve`]; it is the only place cache reads happen.
//!
//! Pointer lookups (`active`, `latest`) use generation-guarded fills, see
//! [`crate::cache`]. Exact lookups read the header from the store and the
//! payload body through the payload cache.

use std::sync::Arc;

use flowver_core::errors::{ExError, VersioningError};
use flowver_core::model::{Resolution, Selector, SelectorKind, Snapshot, SnapshotHeader};
use flowver_core_types::schema::{CACHE_HIT, CACHE_MISS};
use flowver_store::active::active_version_id;
use flowver_store::artifacts::get_artifact;
use flowver_store::errors::Result;
use flowver_store::versions::{find_by_number, find_by_tag, find_header, get_payload, latest_header};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::{PointerKind, VersionCache};

/// Who is asking; decides which selectors are allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveContext {
    /// Production execution path: any committed snapshot, never the draft
    #[default]
    Production,
    /// Webhooks, public links, MCP tools: the active snapshot only
    ExternalTrigger,
    /// Editor preview: anything, including the draft
    EditorPreview,
}

impl ResolveContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolveContext::Production => "production",
            ResolveContext::ExternalTrigger => "external_trigger",
            ResolveContext::EditorPreview => "editor_preview",
        }
    }

    /// Reject selectors this context may not use.
    ///
    /// ## Errors
    ///
    /// - `InvalidVersionOperation`: draft outside editor preview, or any
    ///   non-active selector from an external trigger
    pub fn check(&self, selector: &Selector) -> std::result::Result<(), VersioningError> {
        let allowed = match self {
            ResolveContext::EditorPreview => true,
            ResolveContext::Production => selector.kind() != SelectorKind::Draft,
            ResolveContext::ExternalTrigger => selector.kind() == SelectorKind::Active,
        };
        if allowed {
            Ok(())
        } else {
            Err(VersioningError::InvalidVersionOperation {
                reason: format!(
                    "selector `{}` is not allowed in {} context",
                    selector,
                    self.as_str()
                ),
            })
        }
    }
}

/// Selector dispatch over the cache and the store
#[derive(Clone)]
pub struct VersionResolver {
    cache: Arc<dyn VersionCache>,
}

impl VersionResolver {
    pub fn new(cache: Arc<dyn VersionCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<dyn VersionCache> {
        &self.cache
    }

    /// Resolve `selector` for `artifact_id`.
    ///
    /// ## Errors
    ///
    /// - `InvalidVersionOperation`: selector not allowed in `context`
    /// - `ActiveVersionNotSet`: `active` with no pointer set
    /// - `VersionNotFound`: unknown artifact, no snapshots for `latest`, no
    ///   match for an exact selector, or no draft
    pub fn resolve(
        &self,
        conn: &Connection,
        artifact_id: &str,
        selector: &Selector,
        context: ResolveContext,
    ) -> Result<Resolution> {
        tracing::debug!(
            artifact_id = %artifact_id,
            selector = selector.kind().as_str(),
            context = context.as_str(),
            "Resolving version"
        );
        context
            .check(selector)
            .map_err(|e| ExError::from(e).with_artifact_id(artifact_id))?;

        let snapshot = match selector {
            Selector::Active => Snapshot::clone(&*self.pointer(conn, artifact_id, PointerKind::Active)?),
            Selector::Latest => Snapshot::clone(&*self.pointer(conn, artifact_id, PointerKind::Latest)?),
            Selector::ExactId(version_id) => self.by_id(conn, artifact_id, version_id)?,
            Selector::ExactNumber(number) => {
                let header = find_by_number(conn, artifact_id, *number)?;
                self.by_header(conn, artifact_id, header, &selector.to_string())?
            }
            Selector::ExactTag(tag) => {
                let header = find_by_tag(conn, artifact_id, tag)?;
                self.by_header(conn, artifact_id, header, tag)?
            }
            Selector::Draft => {
                let artifact = get_artifact(conn, artifact_id)?;
                let payload = artifact
                    .draft
                    .ok_or_else(|| not_found(artifact_id, "draft"))?;
                return Ok(Resolution::Draft {
                    artifact_id: artifact.id,
                    payload,
                });
            }
        };

        Ok(Resolution::Snapshot(snapshot))
    }

    /// Snapshot `version_id`, which must belong to `artifact_id`.
    ///
    /// The header always comes from the store; only the payload body is
    /// served from cache.
    ///
    /// ## Errors
    ///
    /// - `VersionNotFound`: unknown id, or a snapshot of another artifact
    pub fn by_id(&self, conn: &Connection, artifact_id: &str, version_id: &str) -> Result<Snapshot> {
        let header = find_header(conn, version_id)?;
        self.by_header(conn, artifact_id, header, version_id)
    }

    fn by_header(
        &self,
        conn: &Connection,
        artifact_id: &str,
        header: Option<SnapshotHeader>,
        identifier: &str,
    ) -> Result<Snapshot> {
        let header = header
            .filter(|h| h.artifact_id == artifact_id)
            .ok_or_else(|| not_found(artifact_id, identifier))?;
        let payload = self.payload(conn, &header.id)?;
        Ok(header.with_payload(Value::clone(&payload)))
    }

    /// Immutable payload body of a snapshot, read through the cache
    ///
    /// ## Errors
    ///
    /// - `VersionNotFound`: unknown id
    pub fn payload(&self, conn: &Connection, version_id: &str) -> Result<Arc<Value>> {
        if let Some(payload) = self.cache.get_payload(version_id) {
            tracing::debug!(version_id = %version_id, cache = CACHE_HIT, "Payload lookup");
            return Ok(payload);
        }
        tracing::debug!(version_id = %version_id, cache = CACHE_MISS, "Payload lookup");
        let payload = Arc::new(get_payload(conn, version_id)?);
        self.cache.put_payload(version_id, payload.clone());
        Ok(payload)
    }

    fn pointer(&self, conn: &Connection, artifact_id: &str, kind: PointerKind) -> Result<Arc<Snapshot>> {
        // Sample before reading the store
        let generation = self.cache.pointer_generation(artifact_id, kind);
        if let Some(snapshot) = self.cache.get_pointer(artifact_id, kind) {
            tracing::debug!(
                artifact_id = %artifact_id,
                selector = kind.as_str(),
                cache = CACHE_HIT,
                "Pointer lookup"
            );
            return Ok(snapshot);
        }
        tracing::debug!(
            artifact_id = %artifact_id,
            selector = kind.as_str(),
            cache = CACHE_MISS,
            "Pointer lookup"
        );

        let snapshot = match kind {
            PointerKind::Active => {
                let version_id = active_version_id(conn, artifact_id)?.ok_or_else(|| {
                    ExError::from(VersioningError::ActiveVersionNotSet {
                        artifact_id: artifact_id.to_string(),
                    })
                    .with_op("resolve")
                })?;
                Arc::new(self.by_id(conn, artifact_id, &version_id)?)
            }
            PointerKind::Latest => {
                // Distinguish an unknown artifact from one with no snapshots
                get_artifact(conn, artifact_id)?;
                let header = latest_header(conn, artifact_id)?;
                Arc::new(self.by_header(conn, artifact_id, header, "latest")?)
            }
        };

        if !self
            .cache
            .fill_pointer(artifact_id, kind, snapshot.clone(), generation)
        {
            tracing::debug!(
                artifact_id = %artifact_id,
                selector = kind.as_str(),
                "Pointer changed during lookup; not cached"
            );
        }
        Ok(snapshot)
    }
}

fn not_found(artifact_id: &str, identifier: &str) -> ExError {
    ExError::from(VersioningError::VersionNotFound {
        artifact_id: artifact_id.to_string(),
        identifier: identifier.to_string(),
    })
    .with_op("resolve")
}
