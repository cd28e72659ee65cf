use crate::codec::Node;

/// Record-selection predicate: a record is considered for extraction or merge
/// when it declares `type: entity` or carries an `id` field at all. This is a
/// pre-filter only; `key_prefix` is the final authority on eligibility.
pub fn is_candidate(record: &Node) -> bool {
    if !record.is_map() {
        return false;
    }
    record.has_field("id") || record.str_field("type") == Some("entity")
}

/// Stable key prefix for a record.
///
/// - A non-empty `id` wins outright.
/// - Otherwise a truthy `parent` (first element when it is a list) yields
///   `Parent_<parent>`, extended with `_<suffix>` when a non-empty `suffix`
///   is present.
/// - A record with neither is not a valid extraction point and yields `None`,
///   even if it passed the candidate pre-filter via `type: entity`.
pub fn key_prefix(record: &Node) -> Option<String> {
    if let Some(id) = record.get("id").and_then(non_empty_scalar) {
        return Some(id.to_string());
    }
    // An absent or empty `id` falls through to the parent rule.
    parent_prefix(record)
}

fn parent_prefix(record: &Node) -> Option<String> {
    let parent = first_parent(record)?;
    let mut prefix = format!("Parent_{}", parent);
    if let Some(suffix) = record.get("suffix").and_then(non_empty_scalar) {
        prefix.push('_');
        prefix.push_str(suffix);
    }
    Some(prefix)
}

/// The parent reference: the whole value when scalar, the first element when
/// a list. Empty strings, nulls and empty lists are all treated as absent.
fn first_parent(record: &Node) -> Option<&str> {
    match record.get("parent")? {
        Node::Seq(items) => items.first().and_then(|n| scalar_text(n)),
        node => scalar_text(node).filter(|s| !s.is_empty()),
    }
}

/// Derive the catalog key for one field of a record, or `None` when the
/// record is ineligible. The same record and field always yield the same key.
pub fn derive_key(record: &Node, field: &str) -> Option<String> {
    Some(format!("{}.{}", key_prefix(record)?, field))
}

fn non_empty_scalar(node: &Node) -> Option<&str> {
    scalar_text(node).filter(|s| !s.is_empty())
}

/// Raw scalar text, excluding null-like plain scalars. Numeric parents and
/// suffixes format through as-is.
fn scalar_text(node: &Node) -> Option<&str> {
    match node {
        Node::Scalar(s) => match s.value.as_str() {
            "~" | "null" | "Null" | "NULL" => None,
            v => Some(v),
        },
        _ => None,
    }
}
