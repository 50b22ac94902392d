//! Plain-disk page manager.
//!
//! The store is a file of fixed-size blocks addressed by
//! `offset = id * page_size`. Block 0 carries the manager prefix (see
//! [`StoreHeader`]) followed by the header page visible to the tree. A
//! small cache of recently used page instances spares repeated file reads.

use crate::error::{ArboretumError, Result};
use crate::page::Page;
use crate::storage::cache::PageCache;
use crate::storage::{AccessStatistics, PageManager, StoreHeader, DISK_HEADER_RESERVED};
use crate::types::{PageId, DISK_CACHE_PAGES, MIN_PAGE_SIZE};
use log::debug;
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Page manager backed by a file of fixed-size blocks
pub struct DiskPageManager {
    page_size: u32,
    file: RwLock<File>,
    header: RwLock<StoreHeader>,
    cache: RwLock<PageCache>,
    stats: RwLock<AccessStatistics>,
}

impl DiskPageManager {
    /// Open an existing store or create a new one at `path`
    pub fn open(path: &Path, page_size: u32) -> Result<Self> {
        if page_size < MIN_PAGE_SIZE {
            return Err(ArboretumError::invalid_argument(format!(
                "page size {} below minimum {}",
                page_size, MIN_PAGE_SIZE
            )));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let header = if file.metadata()?.len() >= page_size as u64 {
            let mut block = vec![0u8; page_size as usize];
            let mut f = &file;
            f.seek(SeekFrom::Start(0))?;
            f.read_exact(&mut block)?;
            StoreHeader::read(&block, page_size)?
        } else {
            let header = StoreHeader::new(page_size);
            let mut block = vec![0u8; page_size as usize];
            header.write(&mut block);
            let mut f = &file;
            f.seek(SeekFrom::Start(0))?;
            f.write_all(&block)?;
            f.sync_all()?;
            debug!("created new store at {}", path.display());
            header
        };

        Ok(Self {
            page_size,
            file: RwLock::new(file),
            header: RwLock::new(header),
            cache: RwLock::new(PageCache::new(DISK_CACHE_PAGES)),
            stats: RwLock::new(AccessStatistics::default()),
        })
    }

    fn read_block(&self, id: u32) -> Result<Vec<u8>> {
        let mut block = vec![0u8; self.page_size as usize];
        let mut file = self.file.write();
        file.seek(SeekFrom::Start(id as u64 * self.page_size as u64))?;
        file.read_exact(&mut block)?;
        Ok(block)
    }

    fn write_block(&self, id: u32, block: &[u8]) -> Result<()> {
        let mut file = self.file.write();
        file.seek(SeekFrom::Start(id as u64 * self.page_size as u64))?;
        file.write_all(block)?;
        Ok(())
    }

    /// Rewrite the manager prefix of block 0, preserving the tree-visible
    /// region of the header page
    fn flush_header(&self) -> Result<()> {
        let mut block = self.read_block(0)?;
        self.header.read().write(&mut block);
        self.write_block(0, &block)
    }

    fn count_read(&self) {
        self.stats.write().reads += 1;
    }

    fn count_write(&self) {
        self.stats.write().writes += 1;
    }
}

impl PageManager for DiskPageManager {
    fn page_size(&self) -> u32 {
        self.page_size
    }

    fn header_page(&self) -> Result<Page> {
        self.count_read();
        let block = self.read_block(0)?;
        let mut page = Page::with_reserved(self.page_size, PageId::HEADER, DISK_HEADER_RESERVED);
        page.load_raw(&block);
        Ok(page)
    }

    fn get(&self, id: PageId) -> Result<Page> {
        let page_count = self.header.read().page_count;
        if id.value() < 1 || id.value() >= page_count {
            return Err(ArboretumError::InvalidPageId(id));
        }
        self.count_read();

        if let Some(page) = self.cache.write().get(id.value()) {
            return Ok(page);
        }

        let block = self.read_block(id.value())?;
        let mut page = Page::new(self.page_size, id);
        page.load_raw(&block);
        self.cache.write().put(page.clone());
        Ok(page)
    }

    fn release(&self, page: Page) {
        // Keep the instance warm for the next fetch.
        if page.id().value() != 0 {
            self.cache.write().put(page);
        }
    }

    fn write(&self, page: &Page) -> Result<()> {
        self.count_write();
        if page.id() == PageId::HEADER {
            let mut block = page.raw().to_vec();
            self.header.read().write(&mut block);
            return self.write_block(0, &block);
        }
        self.write_block(page.id().value(), page.raw())?;
        self.cache.write().put(page.clone());
        Ok(())
    }

    fn allocate(&self) -> Result<Page> {
        self.count_write();
        let mut header = self.header.write();

        if header.first_free.value() != 0 {
            let id = header.first_free.value();
            let block = self.read_block(id)?;
            header.first_free = PageId::new(u32::from_be_bytes([
                block[0], block[1], block[2], block[3],
            ]));
            header.free_count -= 1;
            drop(header);
            self.flush_header()?;
            self.cache.write().remove(id);
            return Ok(Page::new(self.page_size, PageId::new(id)));
        }

        let id = header.page_count;
        header.page_count += 1;
        drop(header);
        let zeros = vec![0u8; self.page_size as usize];
        self.write_block(id, &zeros)?;
        self.flush_header()?;
        Ok(Page::new(self.page_size, PageId::new(id)))
    }

    fn dispose(&self, page: Page) -> Result<()> {
        let id = page.id();
        let mut header = self.header.write();
        if id.value() < 1 || id.value() >= header.page_count {
            return Err(ArboretumError::InvalidPageId(id));
        }

        // Thread the page onto the free stack through its first bytes
        let mut page = page;
        page.raw_mut()[0..4].copy_from_slice(&header.first_free.value().to_be_bytes());
        self.write_block(id.value(), page.raw())?;

        header.first_free = id;
        header.free_count += 1;
        drop(header);
        self.flush_header()?;
        self.cache.write().remove(id.value());
        Ok(())
    }

    fn is_empty(&self) -> bool {
        let header = self.header.read();
        header.page_count - header.free_count < 2
    }

    fn page_count(&self) -> u32 {
        self.header.read().page_count
    }

    fn free_page_ids(&self) -> Vec<PageId> {
        let header = self.header.read();
        let free_count = header.free_count as usize;
        let mut ids = Vec::with_capacity(free_count);
        let mut cur = header.first_free;
        drop(header);
        while cur.value() != 0 && ids.len() < free_count {
            ids.push(cur);
            match self.read_block(cur.value()) {
                Ok(block) => {
                    cur = PageId::new(u32::from_be_bytes([
                        block[0], block[1], block[2], block[3],
                    ]));
                }
                Err(_) => break,
            }
        }
        ids
    }

    fn statistics(&self) -> AccessStatistics {
        *self.stats.read()
    }

    fn reset_statistics(&self) {
        *self.stats.write() = AccessStatistics::default();
    }
}
