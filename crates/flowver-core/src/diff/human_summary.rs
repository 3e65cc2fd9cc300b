//! Human-readable rendering of version diffs.

use crate::diff::model::{DiffClassification, ElementChange, VersionDiff};

/// One-line summary used as `VersionDiff::summary`.
///
/// `"No changes detected"` for identical payloads, otherwise the total
/// followed by the non-zero categories in a fixed order, e.g.
/// `"2 changes detected: 1 node added, 1 edge modified"`.
pub fn summary_line(diff: &VersionDiff) -> String {
    let total = diff.change_count();
    if total == 0 {
        return "No changes detected".to_string();
    }

    let parts: Vec<String> = [
        (diff.added_nodes.len(), "node", "added"),
        (diff.removed_nodes.len(), "node", "removed"),
        (diff.modified_nodes.len(), "node", "modified"),
        (diff.added_edges.len(), "edge", "added"),
        (diff.removed_edges.len(), "edge", "removed"),
        (diff.modified_edges.len(), "edge", "modified"),
        (diff.other_changes.len(), "other field", "changed"),
    ]
    .into_iter()
    .filter(|(count, _, _)| *count > 0)
    .map(|(count, noun, verb)| format!("{} {} {}", count, plural(noun, count), verb))
    .collect();

    format!(
        "{} {} detected: {}",
        total,
        plural("change", total),
        parts.join(", ")
    )
}

/// Render a Markdown summary of a [`VersionDiff`] for review displays.
pub fn render_human_summary(diff: &VersionDiff) -> String {
    let mut out = String::new();

    out.push_str("## Version Diff\n\n");
    out.push_str(&format!(
        "**A**: `{}`  \n**B**: `{}`\n\n",
        short(&diff.a_payload_hash),
        short(&diff.b_payload_hash)
    ));
    out.push_str(&format!("**Summary**: {}\n\n", diff.summary));

    if diff.classification == DiffClassification::Identical || diff.is_empty() {
        out.push_str("_No changes._\n");
        return out;
    }

    section(
        &mut out,
        "Nodes",
        &diff.added_nodes,
        &diff.removed_nodes,
        &diff.modified_nodes,
    );
    section(
        &mut out,
        "Edges",
        &diff.added_edges,
        &diff.removed_edges,
        &diff.modified_edges,
    );

    if !diff.other_changes.is_empty() {
        out.push_str("### Other Changes\n\n");
        for change in &diff.other_changes {
            let path = if change.path.is_empty() {
                "(root)"
            } else {
                change.path.as_str()
            };
            out.push_str(&format!("- `{}` {}\n", path, change.kind.as_str()));
        }
        out.push('\n');
    }

    out
}

fn section(
    out: &mut String,
    title: &str,
    added: &[String],
    removed: &[String],
    modified: &[ElementChange],
) {
    if added.is_empty() && removed.is_empty() && modified.is_empty() {
        return;
    }
    let lower = title.to_ascii_lowercase();
    out.push_str(&format!("### {}\n\n", title));
    if !added.is_empty() {
        out.push_str(&format!(
            "- **Added {}** ({}): {}\n",
            lower,
            added.len(),
            added.join(", ")
        ));
    }
    if !removed.is_empty() {
        out.push_str(&format!(
            "- **Removed {}** ({}): {}\n",
            lower,
            removed.len(),
            removed.join(", ")
        ));
    }
    for change in modified {
        if change.changed_fields.is_empty() {
            out.push_str(&format!("- `{}` modified\n", change.id));
        } else {
            out.push_str(&format!(
                "- `{}` modified ({})\n",
                change.id,
                change.changed_fields.join(", ")
            ));
        }
    }
    out.push('\n');
}

fn plural(noun: &str, count: usize) -> String {
    if count == 1 {
        noun.to_string()
    } else {
        format!("{}s", noun)
    }
}

fn short(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}
