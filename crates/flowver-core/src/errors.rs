use flowver_core_types::{RequestId, TraceId};
use thiserror::Error;

/// Result type alias using VersioningError
pub type Result<T> = std::result::Result<T, VersioningError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable code. The management surface translates kinds
/// into transport responses; the codes are the contract it relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExErrorKind {
    // Versioning
    VersionNotFound,
    ActiveVersionNotSet,
    VersionImmutable,
    InvalidVersionOperation,
    VersionConflict,

    // Input
    InvalidInput,

    // Integration/IO
    Io,
    Serialization,
    Persistence,
    Timeout,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::VersionNotFound => "ERR_VERSION_NOT_FOUND",
            ExErrorKind::ActiveVersionNotSet => "ERR_ACTIVE_VERSION_NOT_SET",
            ExErrorKind::VersionImmutable => "ERR_VERSION_IMMUTABLE",
            ExErrorKind::InvalidVersionOperation => "ERR_INVALID_VERSION_OPERATION",
            ExErrorKind::VersionConflict => "ERR_VERSION_CONFLICT",
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Timeout => "ERR_TIMEOUT",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// Errors the execution dispatcher must treat as blocking and must not
    /// retry automatically.
    pub fn is_execution_blocking(&self) -> bool {
        matches!(
            self,
            ExErrorKind::VersionNotFound | ExErrorKind::ActiveVersionNotSet
        )
    }

    /// Errors a caller may retry as-is (contention, not a bad request).
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExErrorKind::VersionConflict | ExErrorKind::Timeout)
    }
}

/// Canonical structured error type
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    artifact_id: Option<String>,
    version_id: Option<String>,
    version_number: Option<i64>,
    request_id: Option<RequestId>,
    trace_id: Option<TraceId>,
    message: String,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            artifact_id: None,
            version_id: None,
            version_number: None,
            request_id: None,
            trace_id: None,
            message: String::new(),
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    pub fn with_artifact_id(mut self, id: impl Into<String>) -> Self {
        self.artifact_id = Some(id.into());
        self
    }

    pub fn with_version_id(mut self, id: impl Into<String>) -> Self {
        self.version_id = Some(id.into());
        self
    }

    pub fn with_version_number(mut self, number: i64) -> Self {
        self.version_number = Some(number);
        self
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn artifact_id(&self) -> Option<&str> {
        self.artifact_id.as_deref()
    }

    pub fn version_id(&self) -> Option<&str> {
        self.version_id.as_deref()
    }

    pub fn version_number(&self) -> Option<i64> {
        self.version_number
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn trace_id(&self) -> Option<&TraceId> {
        self.trace_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(artifact_id) = &self.artifact_id {
            write!(f, " (artifact_id: {})", artifact_id)?;
        }
        if let Some(version_id) = &self.version_id {
            write!(f, " (version_id: {})", version_id)?;
        }
        if let Some(number) = self.version_number {
            write!(f, " (version_number: {})", number)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Domain error taxonomy raised by the pure versioning kernel
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VersioningError {
    /// Lookup by id, number, tag or selector failed
    #[error("Version {identifier} not found for artifact {artifact_id}")]
    VersionNotFound {
        artifact_id: String,
        identifier: String,
    },

    /// `active` was requested but the artifact has no active pointer
    #[error("Artifact {artifact_id} has no active version")]
    ActiveVersionNotSet { artifact_id: String },

    /// Attempted mutation of an immutable snapshot field
    #[error("Field `{field}` of a published version is immutable")]
    VersionImmutable { field: String },

    /// Operation not valid for the current state (empty draft, foreign snapshot, ...)
    #[error("Invalid version operation: {reason}")]
    InvalidVersionOperation { reason: String },

    /// Version-number or tag allocation lost to a concurrent writer
    #[error("Version conflict on artifact {artifact_id}: {reason}")]
    VersionConflict { artifact_id: String, reason: String },

    /// Caller-supplied value is malformed (selector, tag, patch key)
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Serialization error (JSON encoding/decoding)
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl From<VersioningError> for ExError {
    fn from(err: VersioningError) -> Self {
        match err {
            VersioningError::VersionNotFound {
                artifact_id,
                identifier,
            } => ExError::new(ExErrorKind::VersionNotFound)
                .with_artifact_id(artifact_id)
                .with_message(format!("Version {} not found", identifier)),

            VersioningError::ActiveVersionNotSet { artifact_id } => {
                ExError::new(ExErrorKind::ActiveVersionNotSet)
                    .with_artifact_id(artifact_id)
                    .with_message("No active version is set")
            }

            VersioningError::VersionImmutable { field } => {
                ExError::new(ExErrorKind::VersionImmutable)
                    .with_message(format!("Field `{}` cannot change after publish", field))
            }

            VersioningError::InvalidVersionOperation { reason } => {
                ExError::new(ExErrorKind::InvalidVersionOperation).with_message(reason)
            }

            VersioningError::VersionConflict {
                artifact_id,
                reason,
            } => ExError::new(ExErrorKind::VersionConflict)
                .with_artifact_id(artifact_id)
                .with_message(reason),

            VersioningError::InvalidInput { reason } => {
                ExError::new(ExErrorKind::InvalidInput).with_message(reason)
            }

            VersioningError::Serialization { message } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }
        }
    }
}

/// Conversion from serde_json::Error to VersioningError
impl From<serde_json::Error> for VersioningError {
    fn from(err: serde_json::Error) -> Self {
        VersioningError::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_codes() {
        let cases = [
            (ExErrorKind::VersionNotFound, "ERR_VERSION_NOT_FOUND"),
            (ExErrorKind::ActiveVersionNotSet, "ERR_ACTIVE_VERSION_NOT_SET"),
            (ExErrorKind::VersionImmutable, "ERR_VERSION_IMMUTABLE"),
            (
                ExErrorKind::InvalidVersionOperation,
                "ERR_INVALID_VERSION_OPERATION",
            ),
            (ExErrorKind::VersionConflict, "ERR_VERSION_CONFLICT"),
        ];
        for (kind, expected_code) in cases {
            assert_eq!(kind.code(), expected_code, "Wrong code for {:?}", kind);
        }
    }

    #[test]
    fn test_execution_blocking_kinds() {
        assert!(ExErrorKind::VersionNotFound.is_execution_blocking());
        assert!(ExErrorKind::ActiveVersionNotSet.is_execution_blocking());
        assert!(!ExErrorKind::VersionConflict.is_execution_blocking());
        assert!(ExErrorKind::VersionConflict.is_retryable());
        assert!(!ExErrorKind::VersionImmutable.is_retryable());
    }

    #[test]
    fn test_versioning_error_converts_with_context() {
        let err: ExError = VersioningError::VersionNotFound {
            artifact_id: "flow-1".into(),
            identifier: "v7".into(),
        }
        .into();
        assert_eq!(err.kind(), ExErrorKind::VersionNotFound);
        assert_eq!(err.artifact_id(), Some("flow-1"));
        assert!(err.message().contains("v7"));
    }

    #[test]
    fn test_display_includes_code_op_and_ids() {
        let err = ExError::new(ExErrorKind::VersionConflict)
            .with_op("publish")
            .with_artifact_id("flow-1")
            .with_version_number(3)
            .with_message("attempts exhausted");
        let rendered = err.to_string();
        assert!(rendered.starts_with("[ERR_VERSION_CONFLICT] in operation 'publish'"));
        assert!(rendered.contains("artifact_id: flow-1"));
        assert!(rendered.contains("version_number: 3"));
    }
}
