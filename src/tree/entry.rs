//! In-memory entry models decoded from node pages.
//!
//! Splits and rewrites work on materialised entries; the node layer keeps
//! the packed representation.

use crate::error::{ArboretumError, Result};
use crate::metric::Object;
use crate::page::Node;
use crate::types::PageId;

/// A leaf entry: the object plus its stored distance to the node
/// representative
#[derive(Debug, Clone)]
pub(crate) struct LeafEntry<O> {
    pub object: O,
    pub distance_to_parent: f64,
}

/// An index entry: a representative with its subtree bookkeeping
#[derive(Debug, Clone)]
pub(crate) struct IndexEntry<O> {
    pub object: O,
    pub child: PageId,
    pub subtree_entries: u32,
    pub radius: f64,
    pub distance_to_parent: f64,
}

fn decode_object<O: Object>(node: &Node<'_>, slot: u32) -> Result<O> {
    let bytes = node.object(slot)?;
    O::decode(bytes).ok_or_else(|| {
        ArboretumError::corrupt(format!(
            "undecodable object in page {} slot {}",
            node.page_id(),
            slot
        ))
    })
}

/// Materialise every leaf entry of a node
pub(crate) fn read_leaf_entries<O: Object>(node: &Node<'_>) -> Result<Vec<LeafEntry<O>>> {
    let mut entries = Vec::with_capacity(node.occupation() as usize);
    for slot in 0..node.occupation() {
        entries.push(LeafEntry {
            object: decode_object(node, slot)?,
            distance_to_parent: node.distance_to_parent(slot)?,
        });
    }
    Ok(entries)
}

/// Materialise every index entry of a node
pub(crate) fn read_index_entries<O: Object>(node: &Node<'_>) -> Result<Vec<IndexEntry<O>>> {
    let mut entries = Vec::with_capacity(node.occupation() as usize);
    for slot in 0..node.occupation() {
        entries.push(IndexEntry {
            object: decode_object(node, slot)?,
            child: node.child(slot)?,
            subtree_entries: node.subtree_entries(slot)?,
            radius: node.entry_radius(slot)?,
            distance_to_parent: node.distance_to_parent(slot)?,
        });
    }
    Ok(entries)
}

/// Write index entries into a freshly created index node
pub(crate) fn write_index_entries<O: Object>(
    node: &mut Node<'_>,
    entries: &[IndexEntry<O>],
) -> Result<()> {
    for e in entries {
        node.add_index_entry(
            &e.object.encode(),
            e.child,
            e.subtree_entries,
            e.radius,
            e.distance_to_parent,
        )?;
    }
    Ok(())
}
