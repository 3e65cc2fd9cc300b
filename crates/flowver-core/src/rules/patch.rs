//! Post-publish annotation patches
//!
//! A management surface sends a loose JSON object; this module decides
//! which keys are annotations, which are immutable snapshot fields and
//! which must go through the active-pointer manager instead.

use serde_json::{Map, Value};

use crate::errors::{Result, VersioningError};
use crate::model::VersionUpdate;

/// Fields fixed at publish time. Both snake_case and camelCase spellings
/// are recognized.
const IMMUTABLE_FIELDS: [(&str, &str); 10] = [
    ("payload", "payload"),
    ("data", "data"),
    ("payload_hash", "payloadHash"),
    ("version_number", "versionNumber"),
    ("version_tag", "versionTag"),
    ("artifact_id", "artifactId"),
    ("published_by", "publishedBy"),
    ("published_at", "publishedAt"),
    ("created_from_version_id", "createdFromVersionId"),
    ("parent_payload_hash", "parentPayloadHash"),
];

/// Turn a raw patch object into a [`VersionUpdate`].
///
/// # Errors
///
/// - `VersionImmutable` if the patch touches a field fixed at publish
/// - `InvalidVersionOperation` if it tries to flip `is_active`
/// - `InvalidInput` for unknown keys or non-string annotation values
pub fn parse_version_patch(patch: &Value) -> Result<VersionUpdate> {
    let map = patch.as_object().ok_or_else(|| VersioningError::InvalidInput {
        reason: "version patch must be a JSON object".to_string(),
    })?;

    // Immutable fields are reported first regardless of key order
    for (snake, camel) in IMMUTABLE_FIELDS {
        if map.contains_key(snake) || map.contains_key(camel) {
            return Err(VersioningError::VersionImmutable {
                field: snake.to_string(),
            });
        }
    }

    if map.contains_key("is_active") || map.contains_key("isActive") {
        return Err(VersioningError::InvalidVersionOperation {
            reason: "is_active cannot be patched; activate or roll back the version instead"
                .to_string(),
        });
    }

    let mut update = VersionUpdate::default();
    for key in map.keys() {
        match key.as_str() {
            "changelog" => update.changelog = annotation(map, key)?,
            "description_version" | "descriptionVersion" => {
                update.description_version = annotation(map, key)?
            }
            other => {
                return Err(VersioningError::InvalidInput {
                    reason: format!("unknown version field `{}`", other),
                })
            }
        }
    }
    Ok(update)
}

fn annotation(map: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match map.get(key) {
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(VersioningError::InvalidInput {
            reason: format!("version field `{}` must be a string", key),
        }),
    }
}
