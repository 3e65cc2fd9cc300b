//! flowver engine - orchestration layer
//!
//! Coordinates the pure kernel (`flowver-core`) and the SQLite store
//! (`flowver-store`):
//! - [`cache`]: shared read-through cache with invalidate-not-overwrite pointers
//! - [`resolver`]: selector dispatch, the single choke point for execution callers
//! - [`metrics`]: fire-and-forget execution metrics
//! - [`service`]: the public versioning operations
//! - [`config`]: TOML configuration with environment overrides

pub mod cache;
pub mod config;
pub mod metrics;
pub mod resolver;
pub mod service;

pub use cache::{InMemoryVersionCache, NoopVersionCache, PointerKind, VersionCache};
pub use config::{CacheConfig, PublishConfig, VersioningConfig};
pub use metrics::MetricsRecorder;
pub use resolver::{ResolveContext, VersionResolver};
pub use service::{ArtifactOverview, PublishOptions, VersionService};
