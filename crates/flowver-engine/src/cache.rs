//! Cache Layer
//!
//! Two read-through caches shared by every resolver:
//!
//! - **Pointer entries** keyed by `(artifact_id, PointerKind)` hold the
//!   snapshot the active pointer (or the latest number) resolved to.
//! - **Payload entries** keyed by version id hold snapshot payload bodies.
//!
//! ## Invalidate, never overwrite
//!
//! Writers remove pointer entries after their transaction commits; they
//! never write a new value in place. Each pointer key carries a
//! generation counter that invalidation bumps. A reader samples the
//! generation *before* reading the store and its fill is dropped if the
//! generation moved in the meantime, so a slow reader can never install a
//! pointer older than a committed switch.
//!
//! Payload bodies never change after publish, so payload entries are never
//! invalidated; they only expire (optional TTL) or are evicted by the size
//! bound. Snapshot headers are not cached by id because `is_active` and the
//! annotations can change.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use flowver_core::model::Snapshot;
use serde_json::Value;

use crate::config::CacheConfig;

/// Which artifact-level pointer a cache entry stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerKind {
    Active,
    Latest,
}

impl PointerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PointerKind::Active => "active",
            PointerKind::Latest => "latest",
        }
    }
}

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub pointer_hits: u64,
    pub pointer_misses: u64,
    pub payload_hits: u64,
    pub payload_misses: u64,
    pub payload_entries: usize,
}

/// Shared cache contract.
///
/// Implementations must be safe for concurrent use. The version service
/// calls the `invalidate_*` methods after each committed write. A host that
/// switches the pointer through the store directly must call them itself.
pub trait VersionCache: Send + Sync {
    /// Current generation of a pointer key; sample before reading the store
    fn pointer_generation(&self, artifact_id: &str, kind: PointerKind) -> u64;

    fn get_pointer(&self, artifact_id: &str, kind: PointerKind) -> Option<Arc<Snapshot>>;

    /// Install a pointer read at `generation`.
    ///
    /// Returns `false` (and stores nothing) when an invalidation happened
    /// after `generation` was sampled.
    fn fill_pointer(
        &self,
        artifact_id: &str,
        kind: PointerKind,
        snapshot: Arc<Snapshot>,
        generation: u64,
    ) -> bool;

    /// Remove a pointer entry and bump its generation
    fn invalidate_pointer(&self, artifact_id: &str, kind: PointerKind);

    fn get_payload(&self, version_id: &str) -> Option<Arc<Value>>;

    fn put_payload(&self, version_id: &str, payload: Arc<Value>);

    fn stats(&self) -> CacheStats;
}

#[derive(Debug, Clone)]
struct PointerEntry {
    snapshot: Arc<Snapshot>,
    filled_at: Instant,
}

#[derive(Debug, Clone)]
struct PayloadEntry {
    payload: Arc<Value>,
    filled_at: Instant,
}

type PointerKey = (String, PointerKind);

/// In-process [`VersionCache`] backed by sharded concurrent maps
#[derive(Debug)]
pub struct InMemoryVersionCache {
    generations: DashMap<PointerKey, u64>,
    pointers: DashMap<PointerKey, PointerEntry>,
    payloads: DashMap<String, PayloadEntry>,
    pointer_ttl: Duration,
    payload_ttl: Option<Duration>,
    max_payloads: usize,
    pointer_hits: AtomicU64,
    pointer_misses: AtomicU64,
    payload_hits: AtomicU64,
    payload_misses: AtomicU64,
}

impl InMemoryVersionCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            generations: DashMap::new(),
            pointers: DashMap::new(),
            payloads: DashMap::new(),
            pointer_ttl: config.active_ttl(),
            payload_ttl: config.payload_ttl(),
            max_payloads: config.max_payload_entries.max(1),
            pointer_hits: AtomicU64::new(0),
            pointer_misses: AtomicU64::new(0),
            payload_hits: AtomicU64::new(0),
            payload_misses: AtomicU64::new(0),
        }
    }

    fn key(artifact_id: &str, kind: PointerKind) -> PointerKey {
        (artifact_id.to_string(), kind)
    }

    fn miss_pointer(&self) -> Option<Arc<Snapshot>> {
        self.pointer_misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn miss_payload(&self) -> Option<Arc<Value>> {
        self.payload_misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Drop the oldest payload entry once the bound is reached
    fn evict_for_insert(&self) {
        if self.payloads.len() < self.max_payloads {
            return;
        }
        let oldest = self
            .payloads
            .iter()
            .min_by_key(|entry| entry.value().filled_at)
            .map(|entry| entry.key().clone());
        if let Some(version_id) = oldest {
            self.payloads.remove(&version_id);
        }
    }
}

impl VersionCache for InMemoryVersionCache {
    fn pointer_generation(&self, artifact_id: &str, kind: PointerKind) -> u64 {
        self.generations
            .get(&Self::key(artifact_id, kind))
            .map(|g| *g)
            .unwrap_or(0)
    }

    fn get_pointer(&self, artifact_id: &str, kind: PointerKind) -> Option<Arc<Snapshot>> {
        let key = Self::key(artifact_id, kind);
        let entry = match self.pointers.get(&key) {
            Some(entry) => entry.clone(),
            None => return self.miss_pointer(),
        };
        if entry.filled_at.elapsed() >= self.pointer_ttl {
            self.pointers
                .remove_if(&key, |_, current| current.filled_at == entry.filled_at);
            return self.miss_pointer();
        }
        self.pointer_hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.snapshot)
    }

    fn fill_pointer(
        &self,
        artifact_id: &str,
        kind: PointerKind,
        snapshot: Arc<Snapshot>,
        generation: u64,
    ) -> bool {
        let key = Self::key(artifact_id, kind);
        // The generation shard lock is held across the check and the insert;
        // invalidate_pointer takes the same lock first.
        let current = self.generations.entry(key.clone()).or_insert(0);
        if *current != generation {
            return false;
        }
        self.pointers.insert(
            key,
            PointerEntry {
                snapshot,
                filled_at: Instant::now(),
            },
        );
        drop(current);
        true
    }

    fn invalidate_pointer(&self, artifact_id: &str, kind: PointerKind) {
        let key = Self::key(artifact_id, kind);
        let mut generation = self.generations.entry(key.clone()).or_insert(0);
        *generation += 1;
        self.pointers.remove(&key);
        drop(generation);
    }

    fn get_payload(&self, version_id: &str) -> Option<Arc<Value>> {
        let entry = match self.payloads.get(version_id) {
            Some(entry) => entry.clone(),
            None => return self.miss_payload(),
        };
        if let Some(ttl) = self.payload_ttl {
            if entry.filled_at.elapsed() >= ttl {
                self.payloads
                    .remove_if(version_id, |_, current| current.filled_at == entry.filled_at);
                return self.miss_payload();
            }
        }
        self.payload_hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.payload)
    }

    fn put_payload(&self, version_id: &str, payload: Arc<Value>) {
        if self.payloads.contains_key(version_id) {
            return;
        }
        self.evict_for_insert();
        self.payloads.insert(
            version_id.to_string(),
            PayloadEntry {
                payload,
                filled_at: Instant::now(),
            },
        );
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            pointer_hits: self.pointer_hits.load(Ordering::Relaxed),
            pointer_misses: self.pointer_misses.load(Ordering::Relaxed),
            payload_hits: self.payload_hits.load(Ordering::Relaxed),
            payload_misses: self.payload_misses.load(Ordering::Relaxed),
            payload_entries: self.payloads.len(),
        }
    }
}

/// Cache that stores nothing; every lookup reads the store
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopVersionCache;

impl VersionCache for NoopVersionCache {
    fn pointer_generation(&self, _artifact_id: &str, _kind: PointerKind) -> u64 {
        0
    }

    fn get_pointer(&self, _artifact_id: &str, _kind: PointerKind) -> Option<Arc<Snapshot>> {
        None
    }

    fn fill_pointer(
        &self,
        _artifact_id: &str,
        _kind: PointerKind,
        _snapshot: Arc<Snapshot>,
        _generation: u64,
    ) -> bool {
        false
    }

    fn invalidate_pointer(&self, _artifact_id: &str, _kind: PointerKind) {}

    fn get_payload(&self, _version_id: &str) -> Option<Arc<Value>> {
        None
    }

    fn put_payload(&self, _version_id: &str, _payload: Arc<Value>) {}

    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}

/// Build the cache the configuration asks for
pub fn cache_from_config(config: &CacheConfig) -> Arc<dyn VersionCache> {
    if config.enabled {
        Arc::new(InMemoryVersionCache::new(config))
    } else {
        Arc::new(NoopVersionCache)
    }
}
