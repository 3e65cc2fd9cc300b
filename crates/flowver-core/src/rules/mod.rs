//! Validation rules applied before anything reaches the store

pub mod patch;
pub mod validation;

pub use patch::parse_version_patch;
pub use validation::{validate_payload, validate_tag, MAX_TAG_LEN};
