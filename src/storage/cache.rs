//! Page instance cache for the disk manager.
//!
//! A small LRU keyed by page id holding owned page copies. Write-through:
//! the caller persists pages itself, the cache only spares file reads on
//! recently used ids.

use crate::page::Page;
use std::collections::HashMap;

/// LRU cache of page instances
pub struct PageCache {
    capacity: usize,
    map: HashMap<u32, Page>,
    /// Access order, least recently used first
    order: Vec<u32>,
}

impl PageCache {
    /// Create a cache holding at most `capacity` pages
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: HashMap::with_capacity(capacity),
            order: Vec::with_capacity(capacity),
        }
    }

    fn touch(&mut self, id: u32) {
        self.order.retain(|&x| x != id);
        self.order.push(id);
    }

    /// Look up a page, refreshing its recency
    pub fn get(&mut self, id: u32) -> Option<Page> {
        let page = self.map.get(&id).cloned()?;
        self.touch(id);
        Some(page)
    }

    /// Insert or refresh a page, evicting the least recently used one
    /// when over capacity
    pub fn put(&mut self, page: Page) {
        let id = page.id().value();
        self.map.insert(id, page);
        self.touch(id);
        while self.map.len() > self.capacity {
            let victim = self.order.remove(0);
            self.map.remove(&victim);
        }
    }

    /// Drop a page from the cache
    pub fn remove(&mut self, id: u32) {
        self.map.remove(&id);
        self.order.retain(|&x| x != id);
    }

    /// Number of cached pages
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when nothing is cached
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
