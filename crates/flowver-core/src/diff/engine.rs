//! Version diff computation engine.
//!
//! The entry point is [`compute_diff`], which takes two payload documents
//! and produces a [`VersionDiff`].

use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::diff::human_summary::summary_line;
use crate::diff::model::{ChangeKind, DiffClassification, ElementChange, PathChange, VersionDiff};
use crate::errors::Result;
use crate::hashing::{canonicalize, compute_payload_hash};

const NODES: &str = "nodes";
const EDGES: &str = "edges";

/// Compute the structural diff from payload `a` to payload `b`.
///
/// Nodes and edges are matched by identity (see [`element_key`]); every
/// other part of the payload is compared recursively by path.
///
/// # Errors
///
/// Returns `VersioningError::Serialization` if either payload cannot be
/// canonically encoded for hashing.
pub fn compute_diff(a: &Value, b: &Value) -> Result<VersionDiff> {
    let a_hash = compute_payload_hash(a)?;
    let b_hash = compute_payload_hash(b)?;

    let mut diff = VersionDiff {
        classification: DiffClassification::Identical,
        a_payload_hash: a_hash,
        b_payload_hash: b_hash,
        added_nodes: Vec::new(),
        removed_nodes: Vec::new(),
        modified_nodes: Vec::new(),
        added_edges: Vec::new(),
        removed_edges: Vec::new(),
        modified_edges: Vec::new(),
        other_changes: Vec::new(),
        summary: String::new(),
    };

    if diff.a_payload_hash == diff.b_payload_hash {
        diff.summary = summary_line(&diff);
        return Ok(diff);
    }

    let a = canonicalize(a);
    let b = canonicalize(b);
    let empty = Map::new();
    let a_map = a.as_object().unwrap_or(&empty);
    let b_map = b.as_object().unwrap_or(&empty);

    if a.is_object() && b.is_object() {
        for (list, added, removed, modified) in [
            (
                NODES,
                &mut diff.added_nodes,
                &mut diff.removed_nodes,
                &mut diff.modified_nodes,
            ),
            (
                EDGES,
                &mut diff.added_edges,
                &mut diff.removed_edges,
                &mut diff.modified_edges,
            ),
        ] {
            match (a_map.get(list), b_map.get(list)) {
                (Some(Value::Array(xs)), Some(Value::Array(ys))) => {
                    let delta = diff_elements(list, xs, ys);
                    *added = delta.added;
                    *removed = delta.removed;
                    *modified = delta.modified;
                    if delta.reordered {
                        diff.other_changes.push(PathChange {
                            path: list.to_string(),
                            kind: ChangeKind::Reordered,
                        });
                    }
                }
                (Some(Value::Array(xs)), None) => {
                    *removed = keyed_elements(list, xs).into_keys().collect();
                }
                (None, Some(Value::Array(ys))) => {
                    *added = keyed_elements(list, ys).into_keys().collect();
                }
                (x, y) => diff_values(list, x, y, &mut diff.other_changes),
            }
        }

        let keys: BTreeSet<&String> = a_map
            .keys()
            .chain(b_map.keys())
            .filter(|k| k.as_str() != NODES && k.as_str() != EDGES)
            .collect();
        for key in keys {
            diff_values(key, a_map.get(key), b_map.get(key), &mut diff.other_changes);
        }
    } else {
        diff.other_changes.push(PathChange {
            path: String::new(),
            kind: ChangeKind::Changed,
        });
    }

    diff.other_changes.sort_by(|x, y| x.path.cmp(&y.path).then(x.kind.cmp(&y.kind)));
    diff.classification = DiffClassification::Changed;
    diff.summary = summary_line(&diff);
    Ok(diff)
}

struct ElementDelta {
    added: Vec<String>,
    removed: Vec<String>,
    modified: Vec<ElementChange>,
    reordered: bool,
}

fn diff_elements(list: &str, xs: &[Value], ys: &[Value]) -> ElementDelta {
    let a = keyed_elements(list, xs);
    let b = keyed_elements(list, ys);

    let added = b.keys().filter(|k| !a.contains_key(*k)).cloned().collect();
    let removed = a.keys().filter(|k| !b.contains_key(*k)).cloned().collect();
    let modified = a
        .iter()
        .filter_map(|(id, x)| {
            let y = b.get(id)?;
            (x != y).then(|| ElementChange {
                id: id.clone(),
                changed_fields: changed_fields(x, y),
            })
        })
        .collect::<Vec<_>>();

    // Same set of elements in a different sequence
    let same_set = a.len() == b.len() && a.keys().all(|k| b.contains_key(k));
    let reordered = same_set && ordered_keys(list, xs) != ordered_keys(list, ys);

    ElementDelta {
        added,
        removed,
        modified,
        reordered,
    }
}

/// Index elements by identity.
fn keyed_elements<'a>(list: &str, items: &'a [Value]) -> BTreeMap<String, &'a Value> {
    ordered_keys(list, items).into_iter().zip(items).collect()
}

/// Element keys in list order. Duplicate keys get a `#n` suffix so that
/// nothing is silently dropped.
fn ordered_keys(list: &str, items: &[Value]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut keys = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let base = element_key(list, index, item);
        let mut key = base.clone();
        let mut n = 2;
        while seen.contains(&key) {
            key = format!("{}#{}", base, n);
            n += 1;
        }
        seen.insert(key.clone());
        keys.push(key);
    }
    keys
}

/// Identity of a node or edge.
///
/// The element's string `id` when present. Edges without one are keyed
/// `source->target`, with `source:sourceHandle->target:targetHandle` when
/// handles are present. Anything else falls back to its list position.
pub fn element_key(list: &str, index: usize, item: &Value) -> String {
    if let Some(id) = item.get("id") {
        match id {
            Value::String(s) => return s.clone(),
            Value::Number(n) => return n.to_string(),
            _ => {}
        }
    }

    if list == EDGES {
        let end = |node: &str, handle: &str| -> Option<String> {
            let node = item.get(node)?.as_str()?;
            Some(match item.get(handle).and_then(Value::as_str) {
                Some(h) => format!("{}:{}", node, h),
                None => node.to_string(),
            })
        };
        if let (Some(source), Some(target)) =
            (end("source", "sourceHandle"), end("target", "targetHandle"))
        {
            return format!("{}->{}", source, target);
        }
    }

    format!("#{}", index)
}

fn changed_fields(x: &Value, y: &Value) -> Vec<String> {
    match (x.as_object(), y.as_object()) {
        (Some(xm), Some(ym)) => {
            let keys: BTreeSet<&String> = xm.keys().chain(ym.keys()).collect();
            keys.into_iter()
                .filter(|k| xm.get(*k) != ym.get(*k))
                .cloned()
                .collect()
        }
        _ => Vec::new(),
    }
}

/// Recursive path diff. Objects recurse; arrays and scalars compare whole.
fn diff_values(path: &str, x: Option<&Value>, y: Option<&Value>, out: &mut Vec<PathChange>) {
    match (x, y) {
        (None, None) => {}
        (Some(_), None) => out.push(PathChange {
            path: path.to_string(),
            kind: ChangeKind::Removed,
        }),
        (None, Some(_)) => out.push(PathChange {
            path: path.to_string(),
            kind: ChangeKind::Added,
        }),
        (Some(Value::Object(xm)), Some(Value::Object(ym))) => {
            let keys: BTreeSet<&String> = xm.keys().chain(ym.keys()).collect();
            for key in keys {
                let child = format!("{}.{}", path, key);
                diff_values(&child, xm.get(key), ym.get(key), out);
            }
        }
        (Some(xv), Some(yv)) => {
            if xv != yv {
                out.push(PathChange {
                    path: path.to_string(),
                    kind: ChangeKind::Changed,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_edge_key_without_id_uses_endpoints() {
        let edge = json!({"source": "a", "target": "b"});
        assert_eq!(element_key(EDGES, 0, &edge), "a->b");
        let with_handles =
            json!({"source": "a", "sourceHandle": "out", "target": "b", "targetHandle": "in"});
        assert_eq!(element_key(EDGES, 0, &with_handles), "a:out->b:in");
    }

    #[test]
    fn test_anonymous_node_keyed_by_position() {
        assert_eq!(element_key(NODES, 3, &json!({"type": "x"})), "#3");
    }

    #[test]
    fn test_duplicate_ids_are_kept() {
        let items = vec![json!({"id": "a"}), json!({"id": "a", "v": 1})];
        let keyed = keyed_elements(NODES, &items);
        assert_eq!(keyed.len(), 2);
        assert!(keyed.contains_key("a#2"));
    }

    #[test]
    fn test_nested_paths_reported() {
        let mut out = Vec::new();
        let a = json!({"x": 1, "y": {"z": true}});
        let b = json!({"y": {"z": false}, "w": null});
        diff_values("viewport", Some(&a), Some(&b), &mut out);
        let paths: Vec<(&str, ChangeKind)> =
            out.iter().map(|c| (c.path.as_str(), c.kind)).collect();
        assert_eq!(
            paths,
            vec![
                ("viewport.w", ChangeKind::Added),
                ("viewport.x", ChangeKind::Removed),
                ("viewport.y.z", ChangeKind::Changed),
            ]
        );
    }
}
