//! Correlation identifiers
//!
//! Management surfaces hand a [`RequestContext`] to the version service so
//! that errors and log events raised while serving one request can be joined.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! correlation_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh, time-ordered identifier (UUIDv7)
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

correlation_id!(
    /// Identifies a single inbound request to the management surface
    RequestId
);
correlation_id!(
    /// Identifies a distributed trace spanning several services
    TraceId
);
correlation_id!(
    /// Identifies one span inside a trace
    SpanId
);

/// Context carried through operation boundaries for correlation
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub trace_id: Option<TraceId>,
    /// Principal performing the operation (publisher, activator)
    pub actor: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
        assert_ne!(TraceId::new(), TraceId::new());
        assert_ne!(SpanId::new(), SpanId::new());
    }

    #[test]
    fn test_display_matches_as_str() {
        let id = RequestId::new();
        assert_eq!(id.to_string(), id.as_str());
    }

    #[test]
    fn test_context_builders() {
        let trace = TraceId::from("trace-1".to_string());
        let ctx = RequestContext::new()
            .with_trace_id(trace.clone())
            .with_actor("alice");
        assert_eq!(ctx.trace_id, Some(trace));
        assert_eq!(ctx.actor.as_deref(), Some("alice"));
        assert!(!ctx.request_id.as_str().is_empty());
    }

    #[test]
    fn test_serializes_transparently() {
        let id = RequestId::from("req-42".to_string());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"req-42\"");
        let back: RequestId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
