//! Error types for the metric access methods.

use crate::types::PageId;
use thiserror::Error;

/// Result type alias for index operations
pub type Result<T> = std::result::Result<T, ArboretumError>;

/// Errors that can occur in the index structures
#[derive(Error, Debug)]
pub enum ArboretumError {
    /// I/O error from the underlying file system
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page id is outside the allocated range
    #[error("Invalid page id: {0}")]
    InvalidPageId(PageId),

    /// Offset or slot index outside the valid range
    #[error("Out of bounds: {0}")]
    OutOfBounds(String),

    /// Node does not have enough free space for the entry.
    /// Insertion recovers from this locally by splitting the node.
    #[error("Node {page_id} is full, need {needed} bytes but only {available} available")]
    NodeFull {
        page_id: PageId,
        needed: usize,
        available: usize,
    },

    /// No promotion yields two partitions meeting the minimum occupation
    #[error("Split impossible: no promotion satisfies minimum occupation {min_occupation}")]
    SplitImpossible { min_occupation: usize },

    /// The store exists but was created with incompatible parameters
    #[error("Invalid store: {0}")]
    InvalidStore(String),

    /// Header magic, version or checksum mismatch; the store must be rebuilt
    #[error("Corrupt store: {0}")]
    CorruptStore(String),

    /// Null/empty object, negative radius or other bad argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl ArboretumError {
    /// Create an out-of-bounds error with a message
    pub fn out_of_bounds(msg: impl Into<String>) -> Self {
        Self::OutOfBounds(msg.into())
    }

    /// Create a corrupt-store error with a message
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptStore(msg.into())
    }

    /// Create an invalid-store error with a message
    pub fn invalid_store(msg: impl Into<String>) -> Self {
        Self::InvalidStore(msg.into())
    }

    /// Create an invalid-argument error with a message
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// True when the error is the recoverable node-full condition
    pub fn is_node_full(&self) -> bool {
        matches!(self, Self::NodeFull { .. })
    }
}
