//! Closed selector for "which version" requests

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::snapshot::Snapshot;
use crate::errors::VersioningError;

/// Which snapshot a caller wants resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Selector {
    /// The artifact's active pointer
    Active,
    /// Highest committed version number
    Latest,
    ExactId(String),
    ExactNumber(i64),
    ExactTag(String),
    /// The unversioned working copy (editor preview only)
    Draft,
}

/// Discriminant of a [`Selector`], used as a cache key component and log field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectorKind {
    Active,
    Latest,
    ExactId,
    ExactNumber,
    ExactTag,
    Draft,
}

impl SelectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectorKind::Active => "active",
            SelectorKind::Latest => "latest",
            SelectorKind::ExactId => "exact_id",
            SelectorKind::ExactNumber => "exact_number",
            SelectorKind::ExactTag => "exact_tag",
            SelectorKind::Draft => "draft",
        }
    }
}

impl Selector {
    /// Parse a caller-supplied identifier.
    ///
    /// Keywords `active`, `latest` and `draft` (case-insensitive) select the
    /// pointer variants. A UUID in any accepted form selects by its
    /// lowercase hyphenated id, `7` or `v7` by number, and anything else is
    /// treated as a tag.
    pub fn parse(input: &str) -> Result<Self, VersioningError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(VersioningError::InvalidInput {
                reason: "version selector must not be empty".to_string(),
            });
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "active" => return Ok(Selector::Active),
            "latest" => return Ok(Selector::Latest),
            "draft" => return Ok(Selector::Draft),
            _ => {}
        }

        // Ids are stored hyphenated; other UUID spellings map onto that
        if let Ok(id) = uuid::Uuid::parse_str(trimmed) {
            return Ok(Selector::ExactId(id.hyphenated().to_string()));
        }

        if let Some(number) = parse_version_number(trimmed) {
            return Ok(Selector::ExactNumber(number));
        }

        Ok(Selector::ExactTag(trimmed.to_string()))
    }

    pub fn kind(&self) -> SelectorKind {
        match self {
            Selector::Active => SelectorKind::Active,
            Selector::Latest => SelectorKind::Latest,
            Selector::ExactId(_) => SelectorKind::ExactId,
            Selector::ExactNumber(_) => SelectorKind::ExactNumber,
            Selector::ExactTag(_) => SelectorKind::ExactTag,
            Selector::Draft => SelectorKind::Draft,
        }
    }
}

/// `"12"` or `"v12"` / `"V12"` -> 12
pub fn parse_version_number(input: &str) -> Option<i64> {
    let digits = input
        .strip_prefix('v')
        .or_else(|| input.strip_prefix('V'))
        .unwrap_or(input);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

impl FromStr for Selector {
    type Err = VersioningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Selector::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Active => f.write_str("active"),
            Selector::Latest => f.write_str("latest"),
            Selector::Draft => f.write_str("draft"),
            Selector::ExactId(id) => f.write_str(id),
            Selector::ExactNumber(n) => write!(f, "v{}", n),
            Selector::ExactTag(tag) => f.write_str(tag),
        }
    }
}

/// What a resolution produced: a committed snapshot, or the working draft
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Snapshot(Snapshot),
    Draft { artifact_id: String, payload: Value },
}

impl Resolution {
    pub fn payload(&self) -> &Value {
        match self {
            Resolution::Snapshot(snapshot) => &snapshot.payload,
            Resolution::Draft { payload, .. } => payload,
        }
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            Resolution::Snapshot(snapshot) => Some(snapshot),
            Resolution::Draft { .. } => None,
        }
    }

    pub fn into_snapshot(self) -> Option<Snapshot> {
        match self {
            Resolution::Snapshot(snapshot) => Some(snapshot),
            Resolution::Draft { .. } => None,
        }
    }

    pub fn is_draft(&self) -> bool {
        matches!(self, Resolution::Draft { .. })
    }
}
