use serde_json::Value;

use crate::errors::{Result, VersioningError};
use crate::model::selector::parse_version_number;

/// Longest accepted version tag
pub const MAX_TAG_LEN: usize = 64;

const RESERVED_TAGS: [&str; 3] = ["active", "latest", "draft"];

/// Check that a draft payload can be published.
///
/// A publishable payload is a non-empty JSON object. When `nodes` or
/// `edges` are present they must be arrays; everything else about the
/// graph format is opaque here.
///
/// # Errors
///
/// `InvalidVersionOperation` for an empty or malformed payload.
pub fn validate_payload(payload: &Value) -> Result<()> {
    let map = match payload {
        Value::Object(map) => map,
        Value::Null => return Err(invalid("cannot publish an empty draft")),
        other => {
            return Err(invalid(&format!(
                "draft payload must be a JSON object, got {}",
                json_type_name(other)
            )))
        }
    };

    if map.is_empty() {
        return Err(invalid("cannot publish an empty draft"));
    }

    for key in ["nodes", "edges"] {
        if let Some(value) = map.get(key) {
            if !value.is_array() {
                return Err(invalid(&format!(
                    "draft field `{}` must be an array, got {}",
                    key,
                    json_type_name(value)
                )));
            }
        }
    }

    Ok(())
}

/// Check that a tag is usable as a version label.
///
/// Tags must not be confusable with the other selector forms: the pointer
/// keywords, a version number (`7`, `v7`) or a UUID would all resolve to
/// something other than the tag.
///
/// # Errors
///
/// `InvalidInput` naming the problem.
pub fn validate_tag(tag: &str) -> Result<()> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        return Err(bad_tag(tag, "must not be empty"));
    }
    if trimmed != tag {
        return Err(bad_tag(tag, "must not have surrounding whitespace"));
    }
    if tag.chars().count() > MAX_TAG_LEN {
        return Err(bad_tag(tag, "is longer than 64 characters"));
    }
    if RESERVED_TAGS.contains(&tag.to_ascii_lowercase().as_str()) {
        return Err(bad_tag(tag, "is a reserved selector keyword"));
    }
    if parse_version_number(tag).is_some() {
        return Err(bad_tag(tag, "looks like a version number"));
    }
    if uuid::Uuid::parse_str(tag).is_ok() {
        return Err(bad_tag(tag, "looks like a version id"));
    }
    Ok(())
}

fn invalid(reason: &str) -> VersioningError {
    VersioningError::InvalidVersionOperation {
        reason: reason.to_string(),
    }
}

fn bad_tag(tag: &str, problem: &str) -> VersioningError {
    VersioningError::InvalidInput {
        reason: format!("version tag `{}` {}", tag, problem),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_payloads_rejected() {
        for payload in [json!(null), json!({})] {
            let err = validate_payload(&payload).unwrap_err();
            assert!(matches!(err, VersioningError::InvalidVersionOperation { .. }));
        }
    }

    #[test]
    fn test_non_object_payload_rejected() {
        let err = validate_payload(&json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn test_nodes_must_be_array() {
        let err = validate_payload(&json!({"nodes": {"a": 1}})).unwrap_err();
        assert!(err.to_string().contains("`nodes`"));
        validate_payload(&json!({"nodes": [], "edges": []})).unwrap();
        validate_payload(&json!({"viewport": {"x": 0}})).unwrap();
    }

    #[test]
    fn test_tag_rules() {
        validate_tag("release-1.2").unwrap();
        validate_tag("v1.2").unwrap();
        for bad in [
            "",
            " padded",
            "latest",
            "Active",
            "12",
            "v3",
            "0190a1b2-c3d4-7e5f-8a9b-0c1d2e3f4a5b",
        ] {
            let err = validate_tag(bad).unwrap_err();
            assert!(
                matches!(err, VersioningError::InvalidInput { .. }),
                "tag {:?} should be rejected",
                bad
            );
        }
        assert!(validate_tag(&"t".repeat(MAX_TAG_LEN + 1)).is_err());
    }
}
