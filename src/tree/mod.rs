//! Metric trees built over the slotted-node substrate.
//!
//! [`SlimTree`] is the ball-partitioning metric tree: insertion with
//! promotion and split, range search and best-first k-NN search, plus the
//! slim-down maintenance pass. [`SequentialScan`] is the baseline linear
//! scan over the same substrate, useful as ground truth when evaluating
//! the tree.

mod entry;
mod header;
mod promote;
mod sequential;
mod slim;

pub use header::{TreeHeader, TREE_HEADER_SIZE};
pub use sequential::SequentialScan;
pub use slim::SlimTree;

use serde::{Deserialize, Serialize};

/// Structural dump of a (sub)tree for visualization and debugging
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeShape {
    /// Page id backing the node
    pub page_id: u32,
    /// True for leaf nodes
    pub is_leaf: bool,
    /// Number of entries in the node
    pub entry_count: u32,
    /// Largest covering radius (index nodes) or largest stored distance
    /// to the representative (leaf nodes)
    pub radius: f64,
    /// Child shapes, empty for leaves
    pub children: Vec<TreeShape>,
}
