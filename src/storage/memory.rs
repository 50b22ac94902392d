//! In-memory page manager.
//!
//! Pages live in a growable vector; disposed ids are pushed onto an
//! integer stack and recycled before new ids are minted. Useful for
//! experiments and as the reference implementation of the contract.

use crate::error::{ArboretumError, Result};
use crate::page::Page;
use crate::storage::{AccessStatistics, PageManager};
use crate::types::{PageId, MIN_PAGE_SIZE};
use parking_lot::RwLock;

/// Page manager backed by a vector of pages and a free-id stack
pub struct MemoryPageManager {
    page_size: u32,
    pages: RwLock<Vec<Page>>,
    free: RwLock<Vec<u32>>,
    stats: RwLock<AccessStatistics>,
}

impl MemoryPageManager {
    /// Create an empty manager handing out pages of `page_size` bytes
    pub fn new(page_size: u32) -> Result<Self> {
        if page_size < MIN_PAGE_SIZE {
            return Err(ArboretumError::invalid_argument(format!(
                "page size {} below minimum {}",
                page_size, MIN_PAGE_SIZE
            )));
        }
        Ok(Self {
            page_size,
            pages: RwLock::new(Vec::new()),
            free: RwLock::new(Vec::new()),
            stats: RwLock::new(AccessStatistics::default()),
        })
    }

    fn count_read(&self) {
        self.stats.write().reads += 1;
    }

    fn count_write(&self) {
        self.stats.write().writes += 1;
    }
}

impl PageManager for MemoryPageManager {
    fn page_size(&self) -> u32 {
        self.page_size
    }

    fn header_page(&self) -> Result<Page> {
        let mut pages = self.pages.write();
        if pages.is_empty() {
            pages.push(Page::new(self.page_size, PageId::HEADER));
        }
        self.count_read();
        Ok(pages[0].clone())
    }

    fn get(&self, id: PageId) -> Result<Page> {
        let pages = self.pages.read();
        if id.value() < 1 || id.value() as usize >= pages.len() {
            return Err(ArboretumError::InvalidPageId(id));
        }
        self.count_read();
        Ok(pages[id.value() as usize].clone())
    }

    fn release(&self, _page: Page) {
        // Nothing to do; the vector keeps the authoritative copy.
    }

    fn write(&self, page: &Page) -> Result<()> {
        let mut pages = self.pages.write();
        let idx = page.id().value() as usize;
        if idx >= pages.len() {
            return Err(ArboretumError::InvalidPageId(page.id()));
        }
        pages[idx] = page.clone();
        self.count_write();
        Ok(())
    }

    fn allocate(&self) -> Result<Page> {
        self.count_write();
        let mut pages = self.pages.write();
        if pages.is_empty() {
            // Keep id 0 reserved for the header page
            pages.push(Page::new(self.page_size, PageId::HEADER));
        }
        if let Some(id) = self.free.write().pop() {
            return Ok(pages[id as usize].clone());
        }
        let id = PageId::new(pages.len() as u32);
        let page = Page::new(self.page_size, id);
        pages.push(page.clone());
        Ok(page)
    }

    fn dispose(&self, page: Page) -> Result<()> {
        let id = page.id();
        if id.value() < 1 || id.value() >= self.pages.read().len() as u32 {
            return Err(ArboretumError::InvalidPageId(id));
        }
        self.free.write().push(id.value());
        Ok(())
    }

    fn is_empty(&self) -> bool {
        // Fewer than two live pages (header included) reads as empty.
        self.pages.read().len() - self.free.read().len() < 2
    }

    fn page_count(&self) -> u32 {
        self.pages.read().len() as u32
    }

    fn free_page_ids(&self) -> Vec<PageId> {
        self.free.read().iter().rev().map(|&id| PageId::new(id)).collect()
    }

    fn statistics(&self) -> AccessStatistics {
        *self.stats.read()
    }

    fn reset_statistics(&self) {
        *self.stats.write() = AccessStatistics::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_monotonic_ids() {
        let pm = MemoryPageManager::new(128).unwrap();
        let p1 = pm.allocate().unwrap();
        let p2 = pm.allocate().unwrap();
        assert_eq!(p1.id(), PageId::new(1));
        assert_eq!(p2.id(), PageId::new(2));
        assert_eq!(pm.page_count(), 3);
    }

    #[test]
    fn test_dispose_and_recycle() {
        let pm = MemoryPageManager::new(128).unwrap();
        let p1 = pm.allocate().unwrap();
        let p2 = pm.allocate().unwrap();
        let id2 = p2.id();
        pm.release(p1);
        pm.dispose(p2).unwrap();

        let p3 = pm.allocate().unwrap();
        assert_eq!(p3.id(), id2);
        assert_eq!(pm.page_count(), 3);
    }

    #[test]
    fn test_write_then_get() {
        let pm = MemoryPageManager::new(128).unwrap();
        let mut page = pm.allocate().unwrap();
        page.write_at(b"payload", 0).unwrap();
        pm.write(&page).unwrap();

        let back = pm.get(page.id()).unwrap();
        assert_eq!(&back.data()[..7], b"payload");
    }

    #[test]
    fn test_get_out_of_range() {
        let pm = MemoryPageManager::new(128).unwrap();
        assert!(matches!(
            pm.get(PageId::new(5)),
            Err(ArboretumError::InvalidPageId(_))
        ));
        // The header page is not reachable through get
        assert!(pm.get(PageId::HEADER).is_err());
    }

    #[test]
    fn test_is_empty_quirk() {
        let pm = MemoryPageManager::new(128).unwrap();
        assert!(pm.is_empty());
        pm.header_page().unwrap();
        // Header alone still reads as empty
        assert!(pm.is_empty());
        let p = pm.allocate().unwrap();
        assert!(!pm.is_empty());
        pm.dispose(p).unwrap();
        assert!(pm.is_empty());
    }

    #[test]
    fn test_statistics() {
        let pm = MemoryPageManager::new(128).unwrap();
        let page = pm.allocate().unwrap();
        pm.write(&page).unwrap();
        let _ = pm.get(page.id()).unwrap();
        let stats = pm.statistics();
        assert_eq!(stats.reads, 1);
        assert_eq!(stats.writes, 2);

        pm.reset_statistics();
        assert_eq!(pm.statistics(), AccessStatistics::default());
    }
}
