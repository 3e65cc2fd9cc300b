//! Canonical schema constants for structured logging and events
//!
//! Every crate logs with these keys so that log pipelines can join events
//! for the same artifact or snapshot without per-crate mapping.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_REQUEST_ID: &str = "request_id";
pub const FIELD_TRACE_ID: &str = "trace_id";

// Entity identifiers
pub const FIELD_ARTIFACT_ID: &str = "artifact_id";
pub const FIELD_VERSION_ID: &str = "version_id";
pub const FIELD_VERSION_NUMBER: &str = "version_number";
pub const FIELD_SELECTOR: &str = "selector";

// Cache outcomes
pub const FIELD_CACHE: &str = "cache";
pub const CACHE_HIT: &str = "hit";
pub const CACHE_MISS: &str = "miss";

// Error fields
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
