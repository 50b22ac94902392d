//! Page layer: raw fixed-size byte buffers and the slotted node format.
//!
//! A page is an opaque byte buffer identified by a [`PageId`]. Nodes borrow
//! a page for the duration of an operation and interpret its bytes through
//! the slotted layout in [`node`].

mod header;
mod node;

pub use header::{NodeHeader, NODE_HEADER_SIZE};
pub use node::{Node, INDEX_ENTRY_SIZE, LEAF_ENTRY_SIZE, OBJECT_ENTRY_SIZE};

use crate::error::{ArboretumError, Result};
use crate::types::PageId;

/// A fixed-size byte buffer with an id.
///
/// The lockable variant reserves a fixed prefix for a wrapping manager's
/// bookkeeping; the prefix is not visible through the public view, so
/// `size()` reports the buffer size minus the reserved bytes and all
/// offsets are relative to the end of the prefix.
#[derive(Clone)]
pub struct Page {
    id: PageId,
    reserved: u32,
    buf: Box<[u8]>,
}

impl Page {
    /// Create a new zero-filled page of the given size
    pub fn new(size: u32, id: PageId) -> Self {
        Self {
            id,
            reserved: 0,
            buf: vec![0u8; size as usize].into_boxed_slice(),
        }
    }

    /// Create a page with a reserved prefix of `reserved` bytes that is
    /// hidden from the public view
    pub fn with_reserved(size: u32, id: PageId, reserved: u32) -> Self {
        debug_assert!(reserved < size);
        Self {
            id,
            reserved,
            buf: vec![0u8; size as usize].into_boxed_slice(),
        }
    }

    /// The page id
    pub fn id(&self) -> PageId {
        self.id
    }

    /// Visible page size in bytes (buffer size minus the reserved prefix)
    pub fn size(&self) -> u32 {
        self.buf.len() as u32 - self.reserved
    }

    /// Write `bytes` at `offset` within the visible region, bounds-checked
    pub fn write_at(&mut self, bytes: &[u8], offset: u32) -> Result<()> {
        let end = offset as usize + bytes.len();
        if end > self.size() as usize {
            return Err(ArboretumError::out_of_bounds(format!(
                "write of {} bytes at offset {} exceeds page size {}",
                bytes.len(),
                offset,
                self.size()
            )));
        }
        let start = self.reserved as usize + offset as usize;
        self.buf[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// The visible bytes of the page
    pub fn data(&self) -> &[u8] {
        &self.buf[self.reserved as usize..]
    }

    /// Mutable view of the visible bytes
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.reserved as usize..]
    }

    /// Zero-fill the visible region
    pub fn clear(&mut self) {
        let start = self.reserved as usize;
        self.buf[start..].fill(0);
    }

    /// Copy the full contents of an equally-sized page
    pub fn copy_from(&mut self, other: &Page) -> Result<()> {
        if other.buf.len() != self.buf.len() {
            return Err(ArboretumError::invalid_argument(
                "both pages must have the same size",
            ));
        }
        self.buf.copy_from_slice(&other.buf);
        Ok(())
    }

    /// Full raw buffer including any reserved prefix. Only the page
    /// manager that created the page looks at this.
    pub(crate) fn raw(&self) -> &[u8] {
        &self.buf
    }

    /// Mutable full raw buffer including any reserved prefix
    pub(crate) fn raw_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Replace the raw buffer contents from a disk block
    pub(crate) fn load_raw(&mut self, block: &[u8]) {
        let len = block.len().min(self.buf.len());
        self.buf[..len].copy_from_slice(&block[..len]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_read() {
        let mut page = Page::new(128, PageId::new(7));
        page.write_at(b"hello", 10).unwrap();
        assert_eq!(&page.data()[10..15], b"hello");
        assert_eq!(page.id(), PageId::new(7));
        assert_eq!(page.size(), 128);
    }

    #[test]
    fn test_write_out_of_bounds() {
        let mut page = Page::new(16, PageId::new(1));
        assert!(page.write_at(b"0123456789abcdef0", 0).is_err());
        assert!(page.write_at(b"xy", 15).is_err());
        assert!(page.write_at(b"x", 15).is_ok());
    }

    #[test]
    fn test_clear_and_copy() {
        let mut a = Page::new(32, PageId::new(1));
        let mut b = Page::new(32, PageId::new(2));
        a.write_at(&[0xAB; 32], 0).unwrap();
        b.copy_from(&a).unwrap();
        assert_eq!(b.data(), a.data());
        b.clear();
        assert!(b.data().iter().all(|&x| x == 0));

        let c = Page::new(64, PageId::new(3));
        assert!(a.copy_from(&c).is_err());
    }

    #[test]
    fn test_reserved_prefix_hidden() {
        let mut page = Page::with_reserved(64, PageId::HEADER, 16);
        assert_eq!(page.size(), 48);
        page.write_at(b"abc", 0).unwrap();
        // Visible offset 0 lands after the reserved prefix
        assert_eq!(&page.raw()[16..19], b"abc");
        assert_eq!(&page.data()[..3], b"abc");
        // Prefix untouched by clear
        page.raw_mut()[0] = 0x55;
        page.clear();
        assert_eq!(page.raw()[0], 0x55);
        assert_eq!(page.data()[0], 0);
    }
}
