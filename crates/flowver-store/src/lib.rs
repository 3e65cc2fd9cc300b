//! flowver store - SQLite persistence for versioned flows
//!
//! Provides:
//! - Connection management and store configuration
//! - Embedded, checksummed schema migrations
//! - Artifact and draft rows
//! - The version store (publish, numbering, lookups, history)
//! - The active pointer manager (set active, rollback, activation audit)
//! - Atomic per-snapshot metrics updates
//!
//! Every function takes an explicit `Connection`; callers decide how
//! connections are shared. Each thread should use its own connection.
//!
//! The store has no cache of its own. Pointer switches made here are not
//! seen by an engine cache until the caller invalidates it.

pub mod active;
pub mod artifacts;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod migrations;
mod rows;
pub mod versions;

pub use config::{JournalMode, StoreConfig};
pub use db::Database;
pub use errors::Result;
pub use versions::{NoopPolicy, PublishOutcome, PublishPolicy, PublishRequest};
