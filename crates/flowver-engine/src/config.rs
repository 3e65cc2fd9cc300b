//! Engine configuration
//!
//! One TOML document configures the store, the cache and the publish
//! policy. Every section and field is optional:
//!
//! ```toml
//! [store]
//! path = "/var/lib/flowver/flowver.db"
//! busy_timeout_ms = 5000
//! journal_mode = "wal"
//!
//! [cache]
//! enabled = true
//! active_ttl_ms = 30000
//! max_payload_entries = 1024
//!
//! [publish]
//! max_attempts = 5
//! noop_policy = "return_existing"
//! ```
//!
//! `FLOWVER_DB_PATH` and `FLOWVER_CACHE_ENABLED` override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use flowver_core::errors::{ExError, ExErrorKind};
use flowver_store::versions::DEFAULT_MAX_ATTEMPTS;
use flowver_store::{NoopPolicy, PublishPolicy, Result, StoreConfig};
use serde::{Deserialize, Serialize};

pub const ENV_DB_PATH: &str = "FLOWVER_DB_PATH";
pub const ENV_CACHE_ENABLED: &str = "FLOWVER_CACHE_ENABLED";

pub const DEFAULT_ACTIVE_TTL_MS: u64 = 30_000;
pub const DEFAULT_MAX_PAYLOAD_ENTRIES: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Lifetime of active/latest pointer entries
    pub active_ttl_ms: u64,
    /// Lifetime of payload entries; `None` keeps them until evicted
    pub payload_ttl_ms: Option<u64>,
    pub max_payload_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            active_ttl_ms: DEFAULT_ACTIVE_TTL_MS,
            payload_ttl_ms: None,
            max_payload_entries: DEFAULT_MAX_PAYLOAD_ENTRIES,
        }
    }
}

impl CacheConfig {
    pub fn active_ttl(&self) -> Duration {
        Duration::from_millis(self.active_ttl_ms)
    }

    pub fn payload_ttl(&self) -> Option<Duration> {
        self.payload_ttl_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Bound on the version-number retry loop
    pub max_attempts: u32,
    pub noop_policy: NoopPolicy,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            noop_policy: NoopPolicy::default(),
        }
    }
}

impl PublishConfig {
    pub fn policy(&self) -> PublishPolicy {
        PublishPolicy {
            max_attempts: self.max_attempts.max(1),
            noop_policy: self.noop_policy,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VersioningConfig {
    pub store: StoreConfig,
    pub cache: CacheConfig,
    pub publish: PublishConfig,
}

impl VersioningConfig {
    /// Defaults for a database at `path`
    pub fn with_db_path(path: impl Into<PathBuf>) -> Self {
        Self {
            store: StoreConfig::new(path),
            ..Self::default()
        }
    }

    /// Read a TOML file, then apply environment overrides.
    ///
    /// ## Errors
    ///
    /// - `Io`: the file cannot be read
    /// - `InvalidInput`: the file is not valid configuration
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ExError::new(ExErrorKind::Io)
                .with_op("load_config")
                .with_message(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse configuration from TOML text (no environment overrides)
    ///
    /// ## Errors
    ///
    /// - `InvalidInput`: malformed TOML or unknown enum values
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| {
            ExError::new(ExErrorKind::InvalidInput)
                .with_op("load_config")
                .with_message(format!("invalid configuration: {}", e))
        })
    }

    /// Defaults plus environment overrides, for hosts without a file
    ///
    /// ## Errors
    ///
    /// - `InvalidInput`: an override has an unusable value
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides read through `lookup`.
    ///
    /// ## Errors
    ///
    /// - `InvalidInput`: `FLOWVER_CACHE_ENABLED` is not a boolean
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DB_PATH).filter(|p| !p.trim().is_empty()) {
            self.store.path = PathBuf::from(path);
        }
        if let Some(raw) = lookup(ENV_CACHE_ENABLED) {
            self.cache.enabled = parse_bool(&raw).ok_or_else(|| {
                ExError::new(ExErrorKind::InvalidInput)
                    .with_op("load_config")
                    .with_message(format!("{} must be a boolean, got '{}'", ENV_CACHE_ENABLED, raw))
            })?;
        }
        Ok(())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowver_store::JournalMode;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = VersioningConfig::from_toml_str("").unwrap();
        assert_eq!(config, VersioningConfig::default());
        assert!(config.cache.enabled);
        assert_eq!(config.cache.active_ttl_ms, 30_000);
        assert_eq!(config.publish.max_attempts, 5);
        assert_eq!(config.publish.noop_policy, NoopPolicy::ReturnExisting);
    }

    #[test]
    fn test_partial_sections() {
        let config = VersioningConfig::from_toml_str(
            r#"
            [store]
            path = "/tmp/flows.db"
            journal_mode = "delete"

            [cache]
            enabled = false

            [publish]
            noop_policy = "reject"
            "#,
        )
        .unwrap();
        assert_eq!(config.store.path, PathBuf::from("/tmp/flows.db"));
        assert_eq!(config.store.journal_mode, JournalMode::Delete);
        assert_eq!(config.store.busy_timeout_ms, 5000);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.max_payload_entries, 1024);
        assert_eq!(config.publish.noop_policy, NoopPolicy::Reject);
        assert_eq!(config.publish.max_attempts, 5);
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let err = VersioningConfig::from_toml_str("[publish]\nnoop_policy = \"ignore\"").unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidInput);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = VersioningConfig::default();
        config
            .apply_overrides(|key| match key {
                ENV_DB_PATH => Some("/data/override.db".to_string()),
                ENV_CACHE_ENABLED => Some("off".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.store.path, PathBuf::from("/data/override.db"));
        assert!(!config.cache.enabled);

        let err = config
            .apply_overrides(|key| (key == ENV_CACHE_ENABLED).then(|| "maybe".to_string()))
            .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidInput);
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let publish = PublishConfig {
            max_attempts: 0,
            ..PublishConfig::default()
        };
        assert_eq!(publish.policy().max_attempts, 1);
    }
}
