//! Content Hasher
//!
//! Payloads are hashed over a canonical JSON serialization so that two
//! documents differing only in object key order hash identically.

pub mod canonical;
pub mod digest;

pub use canonical::{canonicalize, to_canonical_json};
pub use digest::{compute_payload_hash, is_payload_hash, PAYLOAD_HASH_LEN};
