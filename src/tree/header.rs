//! Tree header persisted in the header page.

use crate::error::{ArboretumError, Result};
use crate::types::PageId;

/// Serialized size of the tree header in bytes
pub const TREE_HEADER_SIZE: usize = 32;

/// Tree format version
pub const TREE_VERSION: u32 = 1;

/// Tree-wide metadata stored in page 0.
///
/// Layout (32 bytes, big-endian):
/// ```text
/// Offset  Size  Description
/// 0       4     Tree flavour magic (e.g. "SLIM")
/// 4       4     Format version
/// 8       4     Page size the tree was built with
/// 12      4     Root page id (0 while the tree is empty)
/// 16      4     Tree height
/// 20      4     Object count
/// 24      4     Node count
/// 28      4     CRC32 of bytes 0..28
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TreeHeader {
    /// Tree flavour magic
    pub magic: [u8; 4],
    /// Page size the store was created with
    pub page_size: u32,
    /// Root page id; `PageId::HEADER` while the tree is empty
    pub root: PageId,
    /// Height of the tree (0 when empty)
    pub height: u32,
    /// Number of indexed objects
    pub object_count: u32,
    /// Number of node pages in use
    pub node_count: u32,
}

impl TreeHeader {
    /// Header of a freshly created tree
    pub fn new(magic: [u8; 4], page_size: u32) -> Self {
        Self {
            magic,
            page_size,
            root: PageId::HEADER,
            height: 0,
            object_count: 0,
            node_count: 0,
        }
    }

    /// True when the header region has never been written
    pub fn is_blank(bytes: &[u8]) -> bool {
        bytes.len() >= 4 && bytes[0..4] == [0, 0, 0, 0]
    }

    /// Parse and validate a stored tree header
    pub fn read(bytes: &[u8], magic: [u8; 4], expected_page_size: u32) -> Result<Self> {
        if bytes.len() < TREE_HEADER_SIZE {
            return Err(ArboretumError::corrupt("tree header too short"));
        }
        if bytes[0..4] != magic {
            return Err(ArboretumError::corrupt(format!(
                "tree magic mismatch: expected {:?}, found {:?}",
                magic,
                &bytes[0..4]
            )));
        }
        let version = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != TREE_VERSION {
            return Err(ArboretumError::corrupt(format!(
                "unsupported tree version {}",
                version
            )));
        }
        let stored_crc = u32::from_be_bytes([bytes[28], bytes[29], bytes[30], bytes[31]]);
        if stored_crc != crc32fast::hash(&bytes[0..28]) {
            return Err(ArboretumError::corrupt("tree header checksum mismatch"));
        }

        let page_size = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        if page_size != expected_page_size {
            return Err(ArboretumError::invalid_store(format!(
                "tree was built with page size {}, opened with {}",
                page_size, expected_page_size
            )));
        }

        Ok(Self {
            magic,
            page_size,
            root: PageId::new(u32::from_be_bytes([
                bytes[12], bytes[13], bytes[14], bytes[15],
            ])),
            height: u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]),
            object_count: u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]),
            node_count: u32::from_be_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]),
        })
    }

    /// Serialize this header into the header page
    pub fn write(&self, bytes: &mut [u8]) {
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4..8].copy_from_slice(&TREE_VERSION.to_be_bytes());
        bytes[8..12].copy_from_slice(&self.page_size.to_be_bytes());
        bytes[12..16].copy_from_slice(&self.root.value().to_be_bytes());
        bytes[16..20].copy_from_slice(&self.height.to_be_bytes());
        bytes[20..24].copy_from_slice(&self.object_count.to_be_bytes());
        bytes[24..28].copy_from_slice(&self.node_count.to_be_bytes());
        let crc = crc32fast::hash(&bytes[0..28]);
        bytes[28..32].copy_from_slice(&crc.to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAGIC: [u8; 4] = *b"SLIM";

    #[test]
    fn test_roundtrip() {
        let mut header = TreeHeader::new(MAGIC, 512);
        header.root = PageId::new(3);
        header.height = 2;
        header.object_count = 40;
        header.node_count = 5;

        let mut bytes = [0u8; TREE_HEADER_SIZE];
        header.write(&mut bytes);
        assert!(!TreeHeader::is_blank(&bytes));

        let back = TreeHeader::read(&bytes, MAGIC, 512).unwrap();
        assert_eq!(back.root, PageId::new(3));
        assert_eq!(back.height, 2);
        assert_eq!(back.object_count, 40);
        assert_eq!(back.node_count, 5);
    }

    #[test]
    fn test_blank_detection() {
        let bytes = [0u8; TREE_HEADER_SIZE];
        assert!(TreeHeader::is_blank(&bytes));
    }

    #[test]
    fn test_flavour_mismatch() {
        let mut bytes = [0u8; TREE_HEADER_SIZE];
        TreeHeader::new(*b"SEQT", 512).write(&mut bytes);
        assert!(matches!(
            TreeHeader::read(&bytes, MAGIC, 512),
            Err(ArboretumError::CorruptStore(_))
        ));
    }

    #[test]
    fn test_corruption_detected() {
        let mut bytes = [0u8; TREE_HEADER_SIZE];
        TreeHeader::new(MAGIC, 512).write(&mut bytes);
        bytes[21] ^= 0x01;
        assert!(matches!(
            TreeHeader::read(&bytes, MAGIC, 512),
            Err(ArboretumError::CorruptStore(_))
        ));
    }

    #[test]
    fn test_page_size_mismatch() {
        let mut bytes = [0u8; TREE_HEADER_SIZE];
        TreeHeader::new(MAGIC, 512).write(&mut bytes);
        assert!(matches!(
            TreeHeader::read(&bytes, MAGIC, 4096),
            Err(ArboretumError::InvalidStore(_))
        ));
    }
}
