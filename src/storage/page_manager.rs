//! The page manager contract.

use crate::error::Result;
use crate::page::Page;
use crate::types::PageId;

/// Read/write counters exposed by every page manager
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessStatistics {
    /// Number of page reads served
    pub reads: u64,
    /// Number of page writes and allocations
    pub writes: u64,
}

/// Lifecycle of pages: allocate, fetch, release, dispose, header page.
///
/// Implementations take `&self` and guard their mutable internals, but the
/// core is single-threaded per tree instance; two trees sharing a manager
/// must serialise access externally.
pub trait PageManager {
    /// Page size in bytes handed out by this manager
    fn page_size(&self) -> u32;

    /// The header page (id 0), created lazily on first access
    fn header_page(&self) -> Result<Page>;

    /// Fetch the page with the given id; fails with `InvalidPageId` when
    /// the id is out of the allocated range
    fn get(&self, id: PageId) -> Result<Page>;

    /// Signal that the caller is done with the page. The manager may evict
    /// or flush it; contents are not persisted until [`write`](Self::write).
    fn release(&self, page: Page);

    /// Durably store the page (a no-op for the in-memory variant is still
    /// required to make the contents visible to later fetches)
    fn write(&self, page: &Page) -> Result<()>;

    /// Hand out a fresh page with a monotonic new id, or recycle an id
    /// popped from the free stack
    fn allocate(&self) -> Result<Page>;

    /// Push the page's id onto the free stack; its content may be reused
    fn dispose(&self, page: Page) -> Result<()>;

    /// True when the manager holds fewer than two live pages, the header
    /// page included
    fn is_empty(&self) -> bool;

    /// Total number of pages ever allocated, including the header page
    /// and any ids currently on the free stack
    fn page_count(&self) -> u32;

    /// The ids currently on the free stack, top first. Used by store
    /// validation to check id conservation.
    fn free_page_ids(&self) -> Vec<PageId>;

    /// Current read/write counters
    fn statistics(&self) -> AccessStatistics;

    /// Reset the read/write counters
    fn reset_statistics(&self);
}
