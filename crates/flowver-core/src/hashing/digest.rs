//! Payload digests

use serde_json::Value;
use sha2::{Digest, Sha256};

use super::canonical::to_canonical_json;
use crate::errors::Result;

/// Length of a hex-encoded SHA-256 digest
pub const PAYLOAD_HASH_LEN: usize = 64;

/// Compute the content hash of a snapshot payload.
///
/// Hex-encoded SHA-256 over the canonical JSON form.
///
/// ```
/// use flowver_core::hashing::compute_payload_hash;
/// use serde_json::json;
///
/// let a = compute_payload_hash(&json!({"nodes": [], "edges": []})).unwrap();
/// let b = compute_payload_hash(&json!({"edges": [], "nodes": []})).unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 64);
/// ```
///
/// # Errors
///
/// Returns `VersioningError::Serialization` if canonical encoding fails.
pub fn compute_payload_hash(payload: &Value) -> Result<String> {
    let canonical = to_canonical_json(payload)?;
    Ok(hash_string(&canonical))
}

/// True if `value` has the shape of a stored payload hash
pub fn is_payload_hash(value: &str) -> bool {
    value.len() == PAYLOAD_HASH_LEN && value.bytes().all(|b| b.is_ascii_hexdigit())
}

fn hash_string(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
