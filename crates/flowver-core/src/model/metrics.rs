//! Per-snapshot execution metrics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one execution of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Success,
    Failure,
}

impl ExecutionOutcome {
    pub fn from_success(success: bool) -> Self {
        if success {
            ExecutionOutcome::Success
        } else {
            ExecutionOutcome::Failure
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ExecutionOutcome::Failure)
    }
}

/// Entry point through which an execution arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Direct API run
    Api,
    /// Model-context-protocol tool invocation
    Mcp,
    /// Inbound webhook trigger
    Webhook,
    /// Public (shared link) trigger
    Public,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::Api, Channel::Mcp, Channel::Webhook, Channel::Public];

    /// Parse a channel name as reported by callers.
    ///
    /// Unknown names return `None`; such executions still count toward the
    /// totals but not toward any per-channel counter.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "api" => Some(Channel::Api),
            "mcp" => Some(Channel::Mcp),
            "webhook" => Some(Channel::Webhook),
            "public" | "public_flow" => Some(Channel::Public),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Api => "api",
            Channel::Mcp => "mcp",
            Channel::Webhook => "webhook",
            Channel::Public => "public",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregated usage of one snapshot (one-to-one with the snapshot)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetrics {
    pub version_id: String,
    pub execution_count: i64,
    pub error_count: i64,
    pub total_execution_time_ms: i64,
    /// Always `total_execution_time_ms / execution_count`; `None` before the first run
    pub avg_execution_time_ms: Option<f64>,
    pub last_executed_at: Option<DateTime<Utc>>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub api_executions: i64,
    pub mcp_executions: i64,
    pub webhook_executions: i64,
    pub public_executions: i64,
    pub rollback_count: i64,
    pub updated_at: DateTime<Utc>,
}

impl SnapshotMetrics {
    pub fn channel_count(&self, channel: Channel) -> i64 {
        match channel {
            Channel::Api => self.api_executions,
            Channel::Mcp => self.mcp_executions,
            Channel::Webhook => self.webhook_executions,
            Channel::Public => self.public_executions,
        }
    }

    /// Fraction of executions that failed, `None` before the first run
    pub fn error_rate(&self) -> Option<f64> {
        if self.execution_count == 0 {
            None
        } else {
            Some(self.error_count as f64 / self.execution_count as f64)
        }
    }
}
