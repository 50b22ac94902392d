//! Baseline linear scan over the same storage substrate.
//!
//! Objects are appended to a chain of dummy nodes linked through the
//! header's aux field. Queries walk the whole chain and compute every
//! distance, which makes the scan the ground truth when evaluating the
//! metric tree's pruning.

use crate::error::{ArboretumError, Result};
use crate::metric::{DistanceFunction, Object};
use crate::page::Node;
use crate::query::{CancelToken, ResultSet};
use crate::storage::PageManager;
use crate::tree::header::TreeHeader;
use crate::types::{IndexConfig, NodeKind};
use std::cell::Cell;
use std::marker::PhantomData;

/// Tree flavour magic stored in the header page
pub const SEQ_MAGIC: [u8; 4] = *b"SEQT";

/// Linear-scan "tree" answering the same queries as [`SlimTree`]
///
/// [`SlimTree`]: crate::tree::SlimTree
pub struct SequentialScan<O: Object, D: DistanceFunction<O>> {
    pager: Box<dyn PageManager>,
    metric: D,
    config: IndexConfig,
    header: TreeHeader,
    cancel: CancelToken,
    distance_calls: Cell<u64>,
    _object: PhantomData<O>,
}

impl<O: Object, D: DistanceFunction<O>> SequentialScan<O, D> {
    /// Create a scan over an empty store, or reopen a persisted one
    pub fn new(pager: Box<dyn PageManager>, metric: D, config: IndexConfig) -> Result<Self> {
        if pager.page_size() != config.page_size {
            return Err(ArboretumError::invalid_argument(format!(
                "page manager hands out {}-byte pages, config expects {}",
                pager.page_size(),
                config.page_size
            )));
        }

        let mut header_page = pager.header_page()?;
        let header = if TreeHeader::is_blank(header_page.data()) {
            let header = TreeHeader::new(SEQ_MAGIC, config.page_size);
            header.write(header_page.data_mut());
            pager.write(&header_page)?;
            header
        } else {
            TreeHeader::read(header_page.data(), SEQ_MAGIC, config.page_size)?
        };
        pager.release(header_page);

        Ok(Self {
            pager,
            metric,
            config,
            header,
            cancel: CancelToken::new(),
            distance_calls: Cell::new(0),
            _object: PhantomData,
        })
    }

    /// Number of stored objects
    pub fn object_count(&self) -> u32 {
        self.header.object_count
    }

    /// Number of chained node pages
    pub fn node_count(&self) -> u32 {
        self.header.node_count
    }

    /// True when nothing has been inserted
    pub fn is_empty(&self) -> bool {
        self.header.object_count == 0
    }

    /// Token for cooperatively cancelling in-flight queries
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Number of distance evaluations performed so far
    pub fn distance_calls(&self) -> u64 {
        self.distance_calls.get()
    }

    fn dist(&self, a: &O, b: &O) -> f64 {
        self.distance_calls.set(self.distance_calls.get() + 1);
        self.metric.distance(a, b)
    }

    fn write_header(&mut self) -> Result<()> {
        let mut page = self.pager.header_page()?;
        self.header.write(page.data_mut());
        self.pager.write(&page)?;
        self.pager.release(page);
        Ok(())
    }

    /// Append an object, growing the chain by one page when the head
    /// node is full
    pub fn insert(&mut self, object: &O) -> Result<()> {
        let size = object.encoded_size();
        if size == 0 {
            return Err(ArboretumError::invalid_argument("empty object"));
        }

        if self.header.root.value() == 0 {
            let mut page = self.pager.allocate()?;
            let head = page.id();
            {
                let mut node = Node::create(&mut page, NodeKind::Dummy);
                node.add_object(&object.encode())?;
            }
            self.pager.write(&page)?;
            self.pager.release(page);
            self.header.root = head;
            self.header.height = 1;
            self.header.node_count = 1;
        } else {
            let mut page = self.pager.get(self.header.root)?;
            let added = {
                let mut node = Node::open(&mut page)?;
                node.add_object(&object.encode())
            };
            match added {
                Ok(_) => {
                    self.pager.write(&page)?;
                    self.pager.release(page);
                }
                Err(e) if e.is_node_full() => {
                    self.pager.release(page);
                    let old_head = self.header.root;
                    let mut page = self.pager.allocate()?;
                    let head = page.id();
                    {
                        let mut node = Node::create(&mut page, NodeKind::Dummy);
                        node.add_object(&object.encode())?;
                        node.set_next_page(old_head);
                    }
                    self.pager.write(&page)?;
                    self.pager.release(page);
                    self.header.root = head;
                    self.header.node_count += 1;
                }
                Err(e) => return Err(e),
            }
        }

        self.header.object_count += 1;
        self.write_header()
    }

    /// Every stored object within `radius` of `query`
    pub fn range_query(&self, query: &O, radius: f64) -> Result<ResultSet<O>> {
        if !(radius >= 0.0) {
            return Err(ArboretumError::invalid_argument(format!(
                "negative or NaN radius {}",
                radius
            )));
        }
        let mut results = ResultSet::range(radius);
        self.scan(query, &mut results)?;
        Ok(results)
    }

    /// The `k` stored objects nearest to `query`
    pub fn nearest_query(&self, query: &O, k: usize) -> Result<ResultSet<O>> {
        let mut results = ResultSet::nearest(k, self.config.ties);
        if k > 0 {
            self.scan(query, &mut results)?;
        }
        Ok(results)
    }

    /// Walk the chain, offering every object to the result set
    fn scan(&self, query: &O, results: &mut ResultSet<O>) -> Result<()> {
        let mut current = self.header.root;
        while current.value() != 0 {
            if self.cancel.is_cancelled() {
                results.mark_incomplete();
                return Ok(());
            }

            let mut page = self.pager.get(current)?;
            let node = Node::open(&mut page)?;
            for slot in 0..node.occupation() {
                let bytes = node.object(slot)?;
                let object = O::decode(bytes).ok_or_else(|| {
                    ArboretumError::corrupt(format!(
                        "undecodable object in page {} slot {}",
                        current, slot
                    ))
                })?;
                let d = self.dist(query, &object);
                results.add(object, d);
            }
            let next = node.next_page();
            drop(node);
            self.pager.release(page);
            current = next;
        }
        Ok(())
    }
}
