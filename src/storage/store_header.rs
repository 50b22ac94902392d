//! Persisted disk-store header.
//!
//! The disk manager reserves a fixed prefix of block 0 for its own
//! bookkeeping; the remainder of the block is the header page visible to
//! the tree. The free stack is threaded through the free pages themselves:
//! the first four bytes of a disposed page hold the id of the next free
//! page, and the prefix stores the top of the stack.

use crate::error::{ArboretumError, Result};
use crate::types::PageId;

/// Magic bytes identifying a valid store file
pub const STORE_MAGIC: &[u8; 4] = b"ARBO";

/// Store format version
pub const STORE_VERSION: u32 = 1;

/// Bytes of block 0 reserved for the manager prefix
pub const DISK_HEADER_RESERVED: u32 = 28;

/// Manager prefix of block 0
///
/// Layout (28 bytes, big-endian):
/// ```text
/// Offset  Size  Description
/// 0       4     Magic "ARBO"
/// 4       4     Format version
/// 8       4     Page size in bytes
/// 12      4     Total page count (header block included)
/// 16      4     Top of the free-page stack (0 if none)
/// 20      4     Number of pages on the free stack
/// 24      4     CRC32 of bytes 0..24
/// ```
#[derive(Debug, Clone, Copy)]
pub struct StoreHeader {
    /// Page size in bytes
    pub page_size: u32,
    /// Total number of blocks in the file
    pub page_count: u32,
    /// Top of the free-page stack (0 if the stack is empty)
    pub first_free: PageId,
    /// Number of pages on the free stack
    pub free_count: u32,
}

impl StoreHeader {
    /// Create the header of an empty store
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size,
            page_count: 1,
            first_free: PageId::HEADER,
            free_count: 0,
        }
    }

    /// Parse and validate a header prefix
    pub fn read(bytes: &[u8], expected_page_size: u32) -> Result<Self> {
        if bytes.len() < DISK_HEADER_RESERVED as usize {
            return Err(ArboretumError::corrupt("store header too short"));
        }
        if &bytes[0..4] != STORE_MAGIC {
            return Err(ArboretumError::corrupt("bad store magic"));
        }
        let version = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != STORE_VERSION {
            return Err(ArboretumError::corrupt(format!(
                "unsupported store version {}",
                version
            )));
        }

        let stored_crc = u32::from_be_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]);
        if stored_crc != crc32fast::hash(&bytes[0..24]) {
            return Err(ArboretumError::corrupt("store header checksum mismatch"));
        }

        let page_size = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        if page_size != expected_page_size {
            return Err(ArboretumError::invalid_store(format!(
                "store was created with page size {}, opened with {}",
                page_size, expected_page_size
            )));
        }

        let page_count = u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
        let first_free = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
        let free_count = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);

        Ok(Self {
            page_size,
            page_count,
            first_free: PageId::new(first_free),
            free_count,
        })
    }

    /// Serialize this header into a block prefix
    pub fn write(&self, bytes: &mut [u8]) {
        bytes[0..4].copy_from_slice(STORE_MAGIC);
        bytes[4..8].copy_from_slice(&STORE_VERSION.to_be_bytes());
        bytes[8..12].copy_from_slice(&self.page_size.to_be_bytes());
        bytes[12..16].copy_from_slice(&self.page_count.to_be_bytes());
        bytes[16..20].copy_from_slice(&self.first_free.value().to_be_bytes());
        bytes[20..24].copy_from_slice(&self.free_count.to_be_bytes());
        let crc = crc32fast::hash(&bytes[0..24]);
        bytes[24..28].copy_from_slice(&crc.to_be_bytes());
    }
}
