//! Root-scoped element lookup.

use tracing::debug;

use crate::dom::{Document, NodeId};

/// Find `id` inside `root`'s subtree, falling back to a page-wide lookup.
///
/// The fallback serves markup that sits outside any widget root. It never
/// returns an element enclosed by a different registered scope root, so one
/// mounted widget cannot reach into another.
#[must_use]
pub fn resolve(document: &Document, root: NodeId, id: &str) -> Option<NodeId> {
    if let Some(found) = document.find_in_subtree(root, id) {
        return Some(found);
    }
    let fallback = document
        .find_all_by_id(id)
        .into_iter()
        .find(|node| match document.owning_scope(*node) {
            Some(owner) => owner == root,
            None => true,
        });
    if fallback.is_some() {
        debug!(id, "element resolved outside widget root");
    }
    fallback
}
