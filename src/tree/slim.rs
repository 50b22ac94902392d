//! The Slim-tree: a ball-partitioning metric tree over slotted nodes.
//!
//! Objects live in leaves together with their distance to the leaf's
//! representative; index nodes hold representatives with a child pointer,
//! a covering radius and the subtree object count. Stored parent distances
//! enable triangle-inequality pruning without recomputation during both
//! range and k-NN search.

use crate::error::{ArboretumError, Result};
use crate::metric::{DistanceFunction, Object};
use crate::page::{Node, Page};
use crate::query::{CancelToken, CandidateQueue, ResultSet};
use crate::stats::LevelStatistics;
use crate::storage::{AccessStatistics, PageManager};
use crate::tree::entry::{read_index_entries, read_leaf_entries, write_index_entries, IndexEntry};
use crate::tree::header::TreeHeader;
use crate::tree::promote::{partition, promote, DistanceCache};
use crate::tree::TreeShape;
use crate::types::{ChooseSubtree, IndexConfig, NodeKind, PageId, PromotionPolicy};
use log::debug;
use std::cell::Cell;
use std::collections::HashSet;
use std::marker::PhantomData;

/// Tree flavour magic stored in the header page
pub const SLIM_MAGIC: [u8; 4] = *b"SLIM";

/// Slack for comparing recomputed distances against stored ones
const DISTANCE_TOLERANCE: f64 = 1e-9;

/// One side of a split: the promoted representative and the bookkeeping
/// the parent needs for its new entry
struct SubtreeRef<O> {
    rep: O,
    page: PageId,
    radius: f64,
    entries: u32,
}

/// A disk-backed metric tree answering range and k-NN queries
pub struct SlimTree<O: Object, D: DistanceFunction<O>> {
    pager: Box<dyn PageManager>,
    metric: D,
    config: IndexConfig,
    header: TreeHeader,
    cancel: CancelToken,
    distance_calls: Cell<u64>,
    _object: PhantomData<O>,
}

impl<O: Object, D: DistanceFunction<O>> SlimTree<O, D> {
    /// Create a tree over an empty store, or reopen the tree persisted in
    /// a previously used one
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
            let header = TreeHeader::new(SLIM_MAGIC, config.page_size);
            header.write(header_page.data_mut());
            pager.write(&header_page)?;
            header
        } else {
            TreeHeader::read(header_page.data(), SLIM_MAGIC, config.page_size)?
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

    /// Height of the tree, 0 while empty
    pub fn height(&self) -> u32 {
        self.header.height
    }

    /// Number of indexed objects
    pub fn object_count(&self) -> u32 {
        self.header.object_count
    }

    /// Number of node pages in use
    pub fn node_count(&self) -> u32 {
        self.header.node_count
    }

    /// True when no object has been inserted
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

    /// Reset the distance-evaluation counter
    pub fn reset_distance_calls(&self) {
        self.distance_calls.set(0);
    }

    /// Page read/write counters of the underlying manager
    pub fn page_statistics(&self) -> AccessStatistics {
        self.pager.statistics()
    }

    /// Reset the page read/write counters
    pub fn reset_page_statistics(&self) {
        self.pager.reset_statistics();
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

    fn decode_object(bytes: &[u8], page: PageId, slot: u32) -> Result<O> {
        O::decode(bytes).ok_or_else(|| {
            ArboretumError::corrupt(format!(
                "undecodable object in page {} slot {}",
                page, slot
            ))
        })
    }

    // ---------------------------------------------------------------
    // Insertion
    // ---------------------------------------------------------------

    /// Place an object in some leaf and restore all invariants, splitting
    /// and growing the tree as needed
    pub fn insert(&mut self, object: &O) -> Result<()> {
        let size = object.encoded_size();
        if size == 0 {
            return Err(ArboretumError::invalid_argument("empty object"));
        }
        let max = self.config.page_size as usize
            - crate::page::NODE_HEADER_SIZE
            - crate::page::LEAF_ENTRY_SIZE;
        if size > max {
            return Err(ArboretumError::invalid_argument(format!(
                "object of {} bytes cannot fit a {}-byte page",
                size, self.config.page_size
            )));
        }

        if self.header.root.value() == 0 {
            let mut page = self.pager.allocate()?;
            let root_id = page.id();
            {
                let mut node = Node::create(&mut page, NodeKind::Leaf);
                node.add_leaf_entry(&object.encode(), 0.0)?;
            }
            self.pager.write(&page)?;
            self.pager.release(page);
            self.header.root = root_id;
            self.header.height = 1;
            self.header.node_count = 1;
        } else if let Some((left, right)) =
            self.insert_at(self.header.root, object, 0.0, None)?
        {
            self.grow_root(left, right)?;
        }

        self.header.object_count += 1;
        self.write_header()
    }

    /// Recursive descent. Returns the two promoted subtrees when the node
    /// at `page_id` had to split.
    fn insert_at(
        &mut self,
        page_id: PageId,
        object: &O,
        dist_to_node_rep: f64,
        node_rep: Option<&O>,
    ) -> Result<Option<(SubtreeRef<O>, SubtreeRef<O>)>> {
        let mut page = self.pager.get(page_id)?;
        let mut node = Node::open(&mut page)?;

        if node.kind().is_leaf() {
            return match node.add_leaf_entry(&object.encode(), dist_to_node_rep) {
                Ok(_) => {
                    drop(node);
                    self.pager.write(&page)?;
                    self.pager.release(page);
                    Ok(None)
                }
                Err(e) if e.is_node_full() => {
                    let mut items: Vec<O> = Vec::with_capacity(node.occupation() as usize + 1);
                    for slot in 0..node.occupation() {
                        items.push(Self::decode_object(node.object(slot)?, page_id, slot)?);
                    }
                    items.push(object.clone());
                    drop(node);
                    self.pager.release(page);
                    self.split_leaf(page_id, items).map(Some)
                }
                Err(e) => Err(e),
            };
        }

        // Index node: choose a child, descend, then patch the bookkeeping
        let (slot, dist_to_child_rep) = self.choose_subtree(&node, object)?;
        let child = node.child(slot)?;
        let child_rep = Self::decode_object(node.object(slot)?, page_id, slot)?;
        drop(node);
        self.pager.release(page);

        let outcome = self.insert_at(child, object, dist_to_child_rep, Some(&child_rep))?;

        let mut page = self.pager.get(page_id)?;
        let mut node = Node::open(&mut page)?;
        match outcome {
            None => {
                // Covering radii never shrink on insert
                if dist_to_child_rep > node.entry_radius(slot)? {
                    node.set_entry_radius(slot, dist_to_child_rep)?;
                }
                let below = node.subtree_entries(slot)?;
                node.set_subtree_entries(slot, below + 1)?;
                drop(node);
                self.pager.write(&page)?;
                self.pager.release(page);
                Ok(None)
            }
            Some((left, right)) => {
                let mut entries: Vec<IndexEntry<O>> = read_index_entries(&node)?;
                drop(node);
                self.pager.release(page);

                let pos = entries
                    .iter()
                    .position(|e| e.child == left.page)
                    .ok_or_else(|| {
                        ArboretumError::corrupt(format!(
                            "split child {} not referenced by page {}",
                            left.page, page_id
                        ))
                    })?;
                entries[pos] = self.index_entry_for(left, node_rep);
                entries.push(self.index_entry_for(right, node_rep));

                // Try to rewrite in place; split this node when it no
                // longer fits
                let mut scratch = Page::new(self.config.page_size, page_id);
                let rewrite = {
                    let mut fresh = Node::create(&mut scratch, NodeKind::Index);
                    write_index_entries(&mut fresh, &entries)
                };
                match rewrite {
                    Ok(()) => {
                        self.pager.write(&scratch)?;
                        self.pager.release(scratch);
                        Ok(None)
                    }
                    Err(e) if e.is_node_full() => self.split_index(page_id, entries).map(Some),
                    Err(e) => Err(e),
                }
            }
        }
    }

    fn index_entry_for(&self, side: SubtreeRef<O>, node_rep: Option<&O>) -> IndexEntry<O> {
        let distance_to_parent = node_rep.map(|r| self.dist(&side.rep, r)).unwrap_or(0.0);
        IndexEntry {
            object: side.rep,
            child: side.page,
            subtree_entries: side.entries,
            radius: side.radius,
            distance_to_parent,
        }
    }

    /// Pick the child to descend into, returning its slot and the distance
    /// from the object to the child's representative
    fn choose_subtree(&self, node: &Node<'_>, object: &O) -> Result<(u32, f64)> {
        #[derive(Clone, Copy)]
        struct Choice {
            slot: u32,
            dist: f64,
            radius: f64,
            entries: u32,
        }

        let mut covering: Option<Choice> = None;
        let mut nearest: Option<Choice> = None;

        for slot in 0..node.occupation() {
            let rep = Self::decode_object(node.object(slot)?, node.page_id(), slot)?;
            let c = Choice {
                slot,
                dist: self.dist(object, &rep),
                radius: node.entry_radius(slot)?,
                entries: node.subtree_entries(slot)?,
            };

            if c.dist <= c.radius {
                let better = match covering {
                    None => true,
                    Some(best) => match self.config.choose_subtree {
                        ChooseSubtree::MinOccupation => {
                            (c.entries, c.dist) < (best.entries, best.dist)
                        }
                        ChooseSubtree::MinEnlargement => {
                            (c.radius, c.dist) < (best.radius, best.dist)
                        }
                    },
                };
                if better {
                    covering = Some(c);
                }
            }

            let better = match nearest {
                None => true,
                Some(best) => {
                    let enlargement = (c.dist - c.radius).max(0.0);
                    let best_enlargement = (best.dist - best.radius).max(0.0);
                    (enlargement, c.radius, c.dist) < (best_enlargement, best.radius, best.dist)
                }
            };
            if better {
                nearest = Some(c);
            }
        }

        // Fall back to minimum enlargement when no covering child exists
        let chosen = covering.or(nearest).ok_or_else(|| {
            ArboretumError::corrupt(format!("index page {} has no entries", node.page_id()))
        })?;
        Ok((chosen.slot, chosen.dist))
    }

    /// Split a full leaf: promote two representatives from the old entries
    /// plus the incoming object, distribute, and rewrite both pages
    fn split_leaf(
        &mut self,
        page_id: PageId,
        items: Vec<O>,
    ) -> Result<(SubtreeRef<O>, SubtreeRef<O>)> {
        let cache = DistanceCache::new(&items, |a, b| self.dist(a, b));
        let (p, q, first, second) = self.promote_and_partition(&cache)?;

        let first_radius = first.iter().map(|&i| cache.get(p, i)).fold(0.0, f64::max);
        let second_radius = second.iter().map(|&i| cache.get(q, i)).fold(0.0, f64::max);

        let mut page = Page::new(self.config.page_size, page_id);
        {
            let mut node = Node::create(&mut page, NodeKind::Leaf);
            for &i in &first {
                node.add_leaf_entry(&items[i].encode(), cache.get(p, i))?;
            }
        }
        self.pager.write(&page)?;
        self.pager.release(page);

        let mut new_page = self.pager.allocate()?;
        let new_id = new_page.id();
        {
            let mut node = Node::create(&mut new_page, NodeKind::Leaf);
            for &i in &second {
                node.add_leaf_entry(&items[i].encode(), cache.get(q, i))?;
            }
        }
        self.pager.write(&new_page)?;
        self.pager.release(new_page);

        self.header.node_count += 1;
        debug!(
            "split leaf {page_id}: {} + {} entries, new page {new_id}",
            first.len(),
            second.len()
        );

        Ok((
            SubtreeRef {
                rep: items[p].clone(),
                page: page_id,
                radius: first_radius,
                entries: first.len() as u32,
            },
            SubtreeRef {
                rep: items[q].clone(),
                page: new_id,
                radius: second_radius,
                entries: second.len() as u32,
            },
        ))
    }

    /// Split an overflowing index node. Covering radii of the two sides
    /// bound the whole subtrees: `d(member, rep) + member radius`.
    fn split_index(
        &mut self,
        page_id: PageId,
        entries: Vec<IndexEntry<O>>,
    ) -> Result<(SubtreeRef<O>, SubtreeRef<O>)> {
        let items: Vec<O> = entries.iter().map(|e| e.object.clone()).collect();
        let cache = DistanceCache::new(&items, |a, b| self.dist(a, b));
        let (p, q, first, second) = self.promote_and_partition(&cache)?;

        let side_radius = |rep: usize, side: &[usize]| {
            side.iter()
                .map(|&i| cache.get(rep, i) + entries[i].radius)
                .fold(0.0, f64::max)
        };
        let side_entries = |side: &[usize]| {
            side.iter().map(|&i| entries[i].subtree_entries).sum::<u32>()
        };
        let side_of = |rep: usize, side: &[usize]| -> Vec<IndexEntry<O>> {
            side.iter()
                .map(|&i| IndexEntry {
                    object: entries[i].object.clone(),
                    child: entries[i].child,
                    subtree_entries: entries[i].subtree_entries,
                    radius: entries[i].radius,
                    distance_to_parent: cache.get(rep, i),
                })
                .collect()
        };

        let first_radius = side_radius(p, &first);
        let second_radius = side_radius(q, &second);
        let first_entries = side_of(p, &first);
        let second_entries = side_of(q, &second);

        let mut page = Page::new(self.config.page_size, page_id);
        {
            let mut node = Node::create(&mut page, NodeKind::Index);
            write_index_entries(&mut node, &first_entries)?;
        }
        self.pager.write(&page)?;
        self.pager.release(page);

        let mut new_page = self.pager.allocate()?;
        let new_id = new_page.id();
        {
            let mut node = Node::create(&mut new_page, NodeKind::Index);
            write_index_entries(&mut node, &second_entries)?;
        }
        self.pager.write(&new_page)?;
        self.pager.release(new_page);

        self.header.node_count += 1;
        debug!(
            "split index {page_id}: {} + {} entries, new page {new_id}",
            first.len(),
            second.len()
        );

        Ok((
            SubtreeRef {
                rep: items[p].clone(),
                page: page_id,
                radius: first_radius,
                entries: side_entries(&first),
            },
            SubtreeRef {
                rep: items[q].clone(),
                page: new_id,
                radius: second_radius,
                entries: side_entries(&second),
            },
        ))
    }

    /// Run the configured promotion, falling back to random once before
    /// surfacing `SplitImpossible`
    fn promote_and_partition(
        &self,
        cache: &DistanceCache,
    ) -> Result<(usize, usize, Vec<usize>, Vec<usize>)> {
        let min_occupation = self.config.min_occupation as usize;
        let attempt = |policy: PromotionPolicy| {
            let (p, q) = promote(policy, cache);
            partition(cache, p, q, min_occupation).map(|(first, second)| (p, q, first, second))
        };

        match attempt(self.config.promotion) {
            Ok(split) => Ok(split),
            Err(ArboretumError::SplitImpossible { .. })
                if self.config.promotion != PromotionPolicy::Random =>
            {
                debug!("promotion fell back to random");
                attempt(PromotionPolicy::Random)
            }
            Err(e) => Err(e),
        }
    }

    /// Replace the root with a new index node over the two promoted
    /// subtrees, growing the tree by one level
    fn grow_root(&mut self, left: SubtreeRef<O>, right: SubtreeRef<O>) -> Result<()> {
        let mut page = self.pager.allocate()?;
        let root_id = page.id();
        {
            let mut node = Node::create(&mut page, NodeKind::Index);
            node.add_index_entry(&left.rep.encode(), left.page, left.entries, left.radius, 0.0)?;
            node.add_index_entry(
                &right.rep.encode(),
                right.page,
                right.entries,
                right.radius,
                0.0,
            )?;
        }
        self.pager.write(&page)?;
        self.pager.release(page);

        self.header.root = root_id;
        self.header.height += 1;
        self.header.node_count += 1;
        debug!("root split, height now {}", self.header.height);
        Ok(())
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// Return every indexed object within `radius` of `query`
    pub fn range_query(&self, query: &O, radius: f64) -> Result<ResultSet<O>> {
        if !(radius >= 0.0) {
            return Err(ArboretumError::invalid_argument(format!(
                "negative or NaN radius {}",
                radius
            )));
        }
        let mut results = ResultSet::range(radius);
        if self.header.root.value() != 0 {
            self.range_search(self.header.root, query, radius, 0.0, &mut results)?;
        }
        Ok(results)
    }

    fn range_search(
        &self,
        page_id: PageId,
        query: &O,
        radius: f64,
        dist_to_node_rep: f64,
        results: &mut ResultSet<O>,
    ) -> Result<()> {
        if self.cancel.is_cancelled() {
            results.mark_incomplete();
            return Ok(());
        }

        let mut page = self.pager.get(page_id)?;
        let node = Node::open(&mut page)?;

        if node.kind().is_leaf() {
            for slot in 0..node.occupation() {
                // Triangle-inequality prune on the stored parent distance,
                // no distance computation
                let to_parent = node.distance_to_parent(slot)?;
                if (dist_to_node_rep - to_parent).abs() > radius {
                    continue;
                }
                let object = Self::decode_object(node.object(slot)?, page_id, slot)?;
                let d = self.dist(query, &object);
                if d <= radius {
                    results.add(object, d);
                }
            }
            drop(node);
            self.pager.release(page);
            return Ok(());
        }

        // Collect surviving children first so the page is released before
        // descending; live pages stay bounded by the height.
        let mut descents: Vec<(PageId, f64)> = Vec::new();
        for slot in 0..node.occupation() {
            let to_parent = node.distance_to_parent(slot)?;
            let entry_radius = node.entry_radius(slot)?;
            if (dist_to_node_rep - to_parent).abs() > radius + entry_radius {
                continue;
            }
            let rep = Self::decode_object(node.object(slot)?, page_id, slot)?;
            let d = self.dist(query, &rep);
            if d <= radius + entry_radius {
                descents.push((node.child(slot)?, d));
            }
        }
        drop(node);
        self.pager.release(page);

        for (child, d) in descents {
            self.range_search(child, query, radius, d, results)?;
            if !results.complete() {
                break;
            }
        }
        Ok(())
    }

    /// Return the `k` objects nearest to `query`, best-first
    pub fn nearest_query(&self, query: &O, k: usize) -> Result<ResultSet<O>> {
        let mut results = ResultSet::nearest(k, self.config.ties);
        if k == 0 || self.header.root.value() == 0 {
            return Ok(results);
        }

        let mut queue = CandidateQueue::new();
        queue.push(self.header.root, 0.0, 0.0);

        while let Some(candidate) = queue.pop() {
            if candidate.lower_bound() > results.current_radius() {
                break;
            }
            if self.cancel.is_cancelled() {
                results.mark_incomplete();
                break;
            }

            let mut page = self.pager.get(candidate.page())?;
            let node = Node::open(&mut page)?;
            let dist_to_node_rep = candidate.distance_to_rep();

            if node.kind().is_leaf() {
                for slot in 0..node.occupation() {
                    let to_parent = node.distance_to_parent(slot)?;
                    if (dist_to_node_rep - to_parent).abs() > results.current_radius() {
                        continue;
                    }
                    let object =
                        Self::decode_object(node.object(slot)?, candidate.page(), slot)?;
                    let d = self.dist(query, &object);
                    results.add(object, d);
                }
            } else {
                for slot in 0..node.occupation() {
                    let to_parent = node.distance_to_parent(slot)?;
                    let entry_radius = node.entry_radius(slot)?;
                    if (dist_to_node_rep - to_parent).abs()
                        > results.current_radius() + entry_radius
                    {
                        continue;
                    }
                    let rep =
                        Self::decode_object(node.object(slot)?, candidate.page(), slot)?;
                    let d = self.dist(query, &rep);
                    if d - entry_radius <= results.current_radius() {
                        queue.push(node.child(slot)?, (d - entry_radius).max(0.0), d);
                    }
                }
            }
            drop(node);
            self.pager.release(page);
        }

        Ok(results)
    }

    // ---------------------------------------------------------------
    // Maintenance
    // ---------------------------------------------------------------

    /// Shuffle leaf entries between sibling leaves to shrink covering
    /// radii. Sweeps repeat until one makes no move; the number of moves
    /// is returned.
    pub fn slim_down(&mut self) -> Result<usize> {
        if self.header.height < 2 {
            return Ok(0);
        }
        let mut total = 0;
        loop {
            let moved = self.slim_down_walk(self.header.root, 1)?;
            total += moved;
            if moved == 0 {
                break;
            }
        }
        if total > 0 {
            debug!("slim-down moved {total} entries");
        }
        Ok(total)
    }

    fn slim_down_walk(&mut self, page_id: PageId, depth: u32) -> Result<usize> {
        if depth + 1 == self.header.height {
            return self.slim_down_parent(page_id);
        }

        let mut page = self.pager.get(page_id)?;
        let node = Node::open(&mut page)?;
        let mut children = Vec::with_capacity(node.occupation() as usize);
        for slot in 0..node.occupation() {
            children.push(node.child(slot)?);
        }
        drop(node);
        self.pager.release(page);

        let mut moved = 0;
        for child in children {
            moved += self.slim_down_walk(child, depth + 1)?;
        }
        Ok(moved)
    }

    /// One pass over the leaves below a single parent: for each leaf, try
    /// to relocate its farthest entry into a sibling whose ball already
    /// covers it
    fn slim_down_parent(&mut self, parent_id: PageId) -> Result<usize> {
        let mut page = self.pager.get(parent_id)?;
        let mut entries: Vec<IndexEntry<O>> = {
            let node = Node::open(&mut page)?;
            read_index_entries(&node)?
        };
        self.pager.release(page);

        let mut moved = 0;
        for i in 0..entries.len() {
            if entries[i].subtree_entries <= self.config.min_occupation {
                continue;
            }

            let mut leaf_page = self.pager.get(entries[i].child)?;
            let (far_slot, far_object, remaining_radius) = {
                let node = Node::open(&mut leaf_page)?;
                let mut far_slot = 0;
                let mut far_d = f64::MIN;
                for slot in 0..node.occupation() {
                    let d = node.distance_to_parent(slot)?;
                    if d > far_d {
                        far_d = d;
                        far_slot = slot;
                    }
                }
                let mut rest = 0.0f64;
                for slot in 0..node.occupation() {
                    if slot != far_slot {
                        rest = rest.max(node.distance_to_parent(slot)?);
                    }
                }
                let object =
                    Self::decode_object(node.object(far_slot)?, entries[i].child, far_slot)?;
                (far_slot, object, rest)
            };

            for j in 0..entries.len() {
                if j == i {
                    continue;
                }
                let d = self.dist(&far_object, &entries[j].object);
                if d > entries[j].radius {
                    continue;
                }

                let mut sibling_page = self.pager.get(entries[j].child)?;
                let added = {
                    let mut sibling = Node::open(&mut sibling_page)?;
                    sibling.add_leaf_entry(&far_object.encode(), d)
                };
                match added {
                    Ok(_) => {
                        self.pager.write(&sibling_page)?;
                        self.pager.release(sibling_page);
                        {
                            let mut node = Node::open(&mut leaf_page)?;
                            node.remove_entry(far_slot)?;
                        }
                        self.pager.write(&leaf_page)?;
                        entries[i].subtree_entries -= 1;
                        entries[i].radius = remaining_radius;
                        entries[j].subtree_entries += 1;
                        moved += 1;
                        break;
                    }
                    Err(e) if e.is_node_full() => {
                        self.pager.release(sibling_page);
                    }
                    Err(e) => return Err(e),
                }
            }
            self.pager.release(leaf_page);
        }

        if moved > 0 {
            let mut page = Page::new(self.config.page_size, parent_id);
            {
                let mut node = Node::create(&mut page, NodeKind::Index);
                write_index_entries(&mut node, &entries)?;
            }
            self.pager.write(&page)?;
            self.pager.release(page);
        }
        Ok(moved)
    }

    // ---------------------------------------------------------------
    // Diagnostics
    // ---------------------------------------------------------------

    /// Check the structural invariants of every reachable node: covering
    /// radii, stored parent distances, balanced leaf depth, directory
    /// layout and page-id conservation
    pub fn validate(&self) -> Result<()> {
        let mut reachable: HashSet<u32> = HashSet::new();

        if self.header.root.value() != 0 {
            let all = self.validate_node(self.header.root, None, 1, &mut reachable)?;
            if all.len() as u32 != self.header.object_count {
                return Err(ArboretumError::corrupt(format!(
                    "header counts {} objects, tree holds {}",
                    self.header.object_count,
                    all.len()
                )));
            }
        } else if self.header.object_count != 0 {
            return Err(ArboretumError::corrupt(
                "empty tree with non-zero object count",
            ));
        }

        let free: HashSet<u32> = self
            .pager
            .free_page_ids()
            .into_iter()
            .map(|id| id.value())
            .collect();
        for id in 1..self.pager.page_count() {
            match (reachable.contains(&id), free.contains(&id)) {
                (true, true) => {
                    return Err(ArboretumError::corrupt(format!(
                        "page {id} is both reachable and free"
                    )))
                }
                (false, false) => {
                    return Err(ArboretumError::corrupt(format!(
                        "page {id} is neither reachable nor free"
                    )))
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Validate one node and return every object stored beneath it
    fn validate_node(
        &self,
        page_id: PageId,
        parent_rep: Option<&O>,
        depth: u32,
        reachable: &mut HashSet<u32>,
    ) -> Result<Vec<O>> {
        reachable.insert(page_id.value());
        let mut page = self.pager.get(page_id)?;
        let node = Node::open(&mut page)?;
        node.check_layout()?;

        if depth > 1 && node.occupation() < self.config.min_occupation {
            return Err(ArboretumError::corrupt(format!(
                "page {} below minimum occupation",
                page_id
            )));
        }

        if node.kind().is_leaf() {
            if depth != self.header.height {
                return Err(ArboretumError::corrupt(format!(
                    "leaf {} at depth {}, height is {}",
                    page_id, depth, self.header.height
                )));
            }
            let entries = read_leaf_entries::<O>(&node)?;
            drop(node);
            self.pager.release(page);
            if let Some(rep) = parent_rep {
                for (slot, e) in entries.iter().enumerate() {
                    let d = self.dist(&e.object, rep);
                    if (d - e.distance_to_parent).abs() > DISTANCE_TOLERANCE {
                        return Err(ArboretumError::corrupt(format!(
                            "leaf {} slot {} stores parent distance {}, actual {}",
                            page_id, slot, e.distance_to_parent, d
                        )));
                    }
                }
            }
            return Ok(entries.into_iter().map(|e| e.object).collect());
        }

        let entries = read_index_entries::<O>(&node)?;
        drop(node);
        self.pager.release(page);

        let mut all = Vec::new();
        for (slot, e) in entries.iter().enumerate() {
            if let Some(rep) = parent_rep {
                let d = self.dist(&e.object, rep);
                if (d - e.distance_to_parent).abs() > DISTANCE_TOLERANCE {
                    return Err(ArboretumError::corrupt(format!(
                        "index {} slot {} stores parent distance {}, actual {}",
                        page_id, slot, e.distance_to_parent, d
                    )));
                }
            }

            let below = self.validate_node(e.child, Some(&e.object), depth + 1, reachable)?;
            if below.len() as u32 != e.subtree_entries {
                return Err(ArboretumError::corrupt(format!(
                    "index {} slot {} counts {} entries, subtree holds {}",
                    page_id,
                    slot,
                    e.subtree_entries,
                    below.len()
                )));
            }
            for o in &below {
                let d = self.dist(o, &e.object);
                if d > e.radius + DISTANCE_TOLERANCE {
                    return Err(ArboretumError::corrupt(format!(
                        "index {} slot {} radius {} does not cover object at {}",
                        page_id, slot, e.radius, d
                    )));
                }
            }
            all.extend(below);
        }
        Ok(all)
    }

    /// Structural dump for visualization; `None` while the tree is empty
    pub fn export_shape(&self) -> Result<Option<TreeShape>> {
        if self.header.root.value() == 0 {
            return Ok(None);
        }
        self.shape_of(self.header.root).map(Some)
    }

    fn shape_of(&self, page_id: PageId) -> Result<TreeShape> {
        let mut page = self.pager.get(page_id)?;
        let node = Node::open(&mut page)?;

        if node.kind().is_leaf() {
            let mut radius = 0.0f64;
            for slot in 0..node.occupation() {
                radius = radius.max(node.distance_to_parent(slot)?);
            }
            let shape = TreeShape {
                page_id: page_id.value(),
                is_leaf: true,
                entry_count: node.occupation(),
                radius,
                children: Vec::new(),
            };
            drop(node);
            self.pager.release(page);
            return Ok(shape);
        }

        let mut radius = 0.0f64;
        let mut children_ids = Vec::with_capacity(node.occupation() as usize);
        for slot in 0..node.occupation() {
            radius = radius.max(node.entry_radius(slot)?);
            children_ids.push(node.child(slot)?);
        }
        let entry_count = node.occupation();
        drop(node);
        self.pager.release(page);

        let mut children = Vec::with_capacity(children_ids.len());
        for child in children_ids {
            children.push(self.shape_of(child)?);
        }
        Ok(TreeShape {
            page_id: page_id.value(),
            is_leaf: false,
            entry_count,
            radius,
            children,
        })
    }

    /// Per-level node/entry counts and mean radii, computed by a walk
    pub fn level_statistics(&self) -> Result<LevelStatistics> {
        let mut stats = LevelStatistics::new(self.header.height as usize);
        if self.header.root.value() != 0 {
            self.collect_level_statistics(self.header.root, 0, &mut stats)?;
        }
        stats.summarize();
        Ok(stats)
    }

    fn collect_level_statistics(
        &self,
        page_id: PageId,
        level: usize,
        stats: &mut LevelStatistics,
    ) -> Result<()> {
        let mut page = self.pager.get(page_id)?;
        let node = Node::open(&mut page)?;
        stats.add_node(level);

        if node.kind().is_leaf() {
            for slot in 0..node.occupation() {
                stats.add_entry(node.distance_to_parent(slot)?, level);
            }
            drop(node);
            self.pager.release(page);
            return Ok(());
        }

        let mut children = Vec::with_capacity(node.occupation() as usize);
        for slot in 0..node.occupation() {
            stats.add_entry(node.entry_radius(slot)?, level);
            children.push(node.child(slot)?);
        }
        drop(node);
        self.pager.release(page);

        for child in children {
            self.collect_level_statistics(child, level + 1, stats)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::{DiskPageManager, MemoryPageManager};
    use crate::types::TiesPolicy;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) struct Point {
        pub x: f64,
        pub y: f64,
    }

    impl Point {
        pub fn new(x: f64, y: f64) -> Self {
            Self { x, y }
        }
    }

    impl Object for Point {
        fn encoded_size(&self) -> usize {
            16
        }

        fn encode(&self) -> Vec<u8> {
            let mut buf = Vec::with_capacity(16);
            buf.extend_from_slice(&self.x.to_be_bytes());
            buf.extend_from_slice(&self.y.to_be_bytes());
            buf
        }

        fn decode(bytes: &[u8]) -> Option<Self> {
            if bytes.len() != 16 {
                return None;
            }
            let mut x = [0u8; 8];
            let mut y = [0u8; 8];
            x.copy_from_slice(&bytes[0..8]);
            y.copy_from_slice(&bytes[8..16]);
            Some(Self {
                x: f64::from_be_bytes(x),
                y: f64::from_be_bytes(y),
            })
        }
    }

    #[derive(Debug, Clone, Copy)]
    pub(crate) struct Euclidean;

    impl DistanceFunction<Point> for Euclidean {
        fn distance(&self, a: &Point, b: &Point) -> f64 {
            (a.x - b.x).hypot(a.y - b.y)
        }
    }

    fn memory_tree(config: IndexConfig) -> SlimTree<Point, Euclidean> {
        let pager = MemoryPageManager::new(config.page_size).unwrap();
        SlimTree::new(Box::new(pager), Euclidean, config).unwrap()
    }

    fn random_points(count: usize, seed: u64) -> Vec<Point> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| Point::new(rng.gen_range(0.0..100.0), rng.gen_range(0.0..100.0)))
            .collect()
    }

    #[test]
    fn test_empty_tree_queries() {
        let tree = memory_tree(IndexConfig::new(512));
        tree.reset_page_statistics();

        let range = tree.range_query(&Point::new(0.0, 0.0), 10.0).unwrap();
        assert!(range.is_empty());
        let knn = tree.nearest_query(&Point::new(0.0, 0.0), 3).unwrap();
        assert!(knn.is_empty());

        // No page fetched beyond the header
        assert_eq!(tree.page_statistics().reads, 0);
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 0);
    }

    #[test]
    fn test_single_object() {
        let mut tree = memory_tree(IndexConfig::new(512));
        tree.insert(&Point::new(3.0, 4.0)).unwrap();

        let hit = tree.range_query(&Point::new(0.0, 0.0), 5.0).unwrap();
        assert_eq!(hit.len(), 1);
        let miss = tree.range_query(&Point::new(0.0, 0.0), 4.9).unwrap();
        assert!(miss.is_empty());

        let knn = tree.nearest_query(&Point::new(50.0, 50.0), 1).unwrap();
        assert_eq!(knn.len(), 1);
        assert_eq!(knn.iter().next().unwrap().object, Point::new(3.0, 4.0));
    }

    #[test]
    fn test_range_scenario() {
        let mut tree = memory_tree(IndexConfig::new(512));
        for p in [(0.0, 0.0), (3.0, 4.0), (6.0, 8.0)] {
            tree.insert(&Point::new(p.0, p.1)).unwrap();
        }

        let hits = tree.range_query(&Point::new(0.0, 0.0), 5.0).unwrap();
        let mut found: Vec<(f64, f64)> = hits.iter().map(|p| (p.object.x, p.object.y)).collect();
        found.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(found, vec![(0.0, 0.0), (3.0, 4.0)]);
    }

    #[test]
    fn test_knn_scenario() {
        let mut tree = memory_tree(IndexConfig::new(512));
        for p in [(0.0, 0.0), (3.0, 4.0), (6.0, 8.0)] {
            tree.insert(&Point::new(p.0, p.1)).unwrap();
        }

        let knn = tree.nearest_query(&Point::new(0.0, 0.0), 2).unwrap();
        let pairs: Vec<(f64, Point)> = knn
            .iter()
            .map(|p| (p.distance, p.object.clone()))
            .collect();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0], (0.0, Point::new(0.0, 0.0)));
        assert_eq!(pairs[1], (5.0, Point::new(3.0, 4.0)));
    }

    #[test]
    fn test_exactly_fitting_insert_does_not_split() {
        // Page 512: header 20, leaf entry 12 + 16 bytes -> 17 entries fit
        let mut tree = memory_tree(IndexConfig::new(512));
        for i in 0..17 {
            tree.insert(&Point::new(i as f64, 0.0)).unwrap();
        }
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.node_count(), 1);

        tree.insert(&Point::new(17.0, 0.0)).unwrap();
        assert_eq!(tree.height(), 2);
        assert!(tree.node_count() >= 3);
        tree.validate().unwrap();
    }

    #[test]
    fn test_zero_radius_query_finds_every_object() {
        let mut tree = memory_tree(IndexConfig::new(512));
        let points = random_points(1000, 7);
        for p in &points {
            tree.insert(p).unwrap();
        }

        for p in &points {
            let hits = tree.range_query(p, 0.0).unwrap();
            assert!(
                hits.iter().any(|r| r.object == *p),
                "object ({}, {}) not found by its own zero-radius query",
                p.x,
                p.y
            );
        }
    }

    #[test]
    fn test_invariants_after_bulk_inserts() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut tree = memory_tree(IndexConfig::new(512));
        for p in random_points(1000, 11) {
            tree.insert(&p).unwrap();
        }

        assert_eq!(tree.object_count(), 1000);
        assert!(tree.height() >= 2);
        assert!(tree.node_count() >= 4, "expected at least two splits");
        tree.validate().unwrap();
    }

    #[test]
    fn test_every_promotion_policy_builds_a_valid_tree() {
        for promotion in [
            PromotionPolicy::Random,
            PromotionPolicy::MinMaxRadius,
            PromotionPolicy::MstSplit,
        ] {
            let config = IndexConfig::new(512).promotion(promotion);
            let mut tree = memory_tree(config);
            let points = random_points(200, 13);
            for p in &points {
                tree.insert(p).unwrap();
            }
            tree.validate().unwrap();

            // Spot-check against brute force
            let query = Point::new(50.0, 50.0);
            let expected: usize = points
                .iter()
                .filter(|p| Euclidean.distance(p, &query) <= 20.0)
                .count();
            let hits = tree.range_query(&query, 20.0).unwrap();
            assert_eq!(hits.len(), expected, "policy {:?}", promotion);
        }
    }

    #[test]
    fn test_both_choose_subtree_policies() {
        for choose in [ChooseSubtree::MinOccupation, ChooseSubtree::MinEnlargement] {
            let config = IndexConfig::new(512).choose_subtree(choose);
            let mut tree = memory_tree(config);
            let points = random_points(300, 17);
            for p in &points {
                tree.insert(p).unwrap();
            }
            tree.validate().unwrap();
            assert_eq!(tree.object_count(), 300);
        }
    }

    #[test]
    fn test_knn_matches_sequential_scan() {
        let points = random_points(300, 23);

        let mut tree = memory_tree(IndexConfig::new(512));
        let seq_pager = MemoryPageManager::new(512).unwrap();
        let mut scan = crate::tree::SequentialScan::new(
            Box::new(seq_pager),
            Euclidean,
            IndexConfig::new(512),
        )
        .unwrap();
        for p in &points {
            tree.insert(p).unwrap();
            scan.insert(p).unwrap();
        }

        let query = Point::new(42.0, 17.0);
        let from_tree = tree.nearest_query(&query, 10).unwrap();
        let from_scan = scan.nearest_query(&query, 10).unwrap();

        let tree_d: Vec<f64> = from_tree.iter().map(|p| p.distance).collect();
        let scan_d: Vec<f64> = from_scan.iter().map(|p| p.distance).collect();
        assert_eq!(tree_d, scan_d);
    }

    #[test]
    fn test_range_contains_knn_at_kth_distance() {
        let mut tree = memory_tree(IndexConfig::new(512));
        let points = random_points(200, 29);
        for p in &points {
            tree.insert(p).unwrap();
        }

        let query = Point::new(10.0, 90.0);
        let knn = tree.nearest_query(&query, 5).unwrap();
        let kth = knn.iter().last().unwrap().distance;

        let range = tree.range_query(&query, kth).unwrap();
        for near in knn.iter() {
            assert!(
                range.iter().any(|r| r.object == near.object),
                "k-NN result missing from range query at the k-th distance"
            );
        }
    }

    #[test]
    fn test_keep_all_ties_policy_grows_result() {
        let config = IndexConfig::new(512).ties(TiesPolicy::KeepAll);
        let mut tree = memory_tree(config);
        // Four corners of a square, all equidistant from the centre
        for p in [(0.0, 0.0), (0.0, 2.0), (2.0, 0.0), (2.0, 2.0)] {
            tree.insert(&Point::new(p.0, p.1)).unwrap();
        }
        let knn = tree.nearest_query(&Point::new(1.0, 1.0), 2).unwrap();
        assert_eq!(knn.len(), 4);
    }

    /// Build a two-leaf tree whose left leaf holds an entry the right
    /// leaf's ball already covers: left is {(0,0), (4,0)} with radius 4,
    /// right is {(5,0), (6,0)} with radius 1, so d((4,0), (5,0)) = 1 lies
    /// inside the right ball.
    fn tree_with_misplaced_entry() -> SlimTree<Point, Euclidean> {
        let pager = MemoryPageManager::new(512).unwrap();

        let mut left = pager.allocate().unwrap();
        {
            let mut node = Node::create(&mut left, NodeKind::Leaf);
            node.add_leaf_entry(&Point::new(0.0, 0.0).encode(), 0.0).unwrap();
            node.add_leaf_entry(&Point::new(4.0, 0.0).encode(), 4.0).unwrap();
        }
        pager.write(&left).unwrap();

        let mut right = pager.allocate().unwrap();
        {
            let mut node = Node::create(&mut right, NodeKind::Leaf);
            node.add_leaf_entry(&Point::new(5.0, 0.0).encode(), 0.0).unwrap();
            node.add_leaf_entry(&Point::new(6.0, 0.0).encode(), 1.0).unwrap();
        }
        pager.write(&right).unwrap();

        let mut root = pager.allocate().unwrap();
        {
            let mut node = Node::create(&mut root, NodeKind::Index);
            node.add_index_entry(&Point::new(0.0, 0.0).encode(), left.id(), 2, 4.0, 0.0)
                .unwrap();
            node.add_index_entry(&Point::new(5.0, 0.0).encode(), right.id(), 2, 1.0, 0.0)
                .unwrap();
        }
        pager.write(&root).unwrap();

        let mut header = TreeHeader::new(SLIM_MAGIC, 512);
        header.root = root.id();
        header.height = 2;
        header.object_count = 4;
        header.node_count = 3;
        let mut header_page = pager.header_page().unwrap();
        header.write(header_page.data_mut());
        pager.write(&header_page).unwrap();

        let config = IndexConfig::new(512).min_occupation(1);
        SlimTree::new(Box::new(pager), Euclidean, config).unwrap()
    }

    #[test]
    fn test_slim_down_moves_misplaced_entry() {
        let mut tree = tree_with_misplaced_entry();
        tree.validate().unwrap();
        assert_eq!(tree.export_shape().unwrap().unwrap().radius, 4.0);

        let moved = tree.slim_down().unwrap();
        assert_eq!(moved, 1);
        tree.validate().unwrap();

        // (4,0) relocated into the right-hand leaf; the left radius shrank
        assert_eq!(tree.export_shape().unwrap().unwrap().radius, 1.0);
        let hits = tree.range_query(&Point::new(4.0, 0.0), 0.0).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(tree.object_count(), 4);
    }

    #[test]
    fn test_slim_down_preserves_the_object_set() {
        let mut tree = memory_tree(IndexConfig::new(512));
        let points = random_points(100, 31);
        for p in &points {
            tree.insert(p).unwrap();
        }
        tree.slim_down().unwrap();
        tree.validate().unwrap();

        let all = tree.range_query(&Point::new(50.0, 50.0), 1000.0).unwrap();
        assert_eq!(all.len(), 100);
    }

    #[test]
    fn test_disk_backed_tree_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.arb");
        let points = random_points(50, 37);

        {
            let pager = DiskPageManager::open(&path, 512).unwrap();
            let mut tree =
                SlimTree::new(Box::new(pager), Euclidean, IndexConfig::new(512)).unwrap();
            for p in &points {
                tree.insert(p).unwrap();
            }
            tree.validate().unwrap();
        }

        let pager = DiskPageManager::open(&path, 512).unwrap();
        let tree = SlimTree::new(Box::new(pager), Euclidean, IndexConfig::new(512)).unwrap();
        assert_eq!(tree.object_count(), 50);
        tree.validate().unwrap();

        let hits = tree.range_query(&points[0], 0.0).unwrap();
        assert!(hits.iter().any(|r| r.object == points[0]));
    }

    #[test]
    fn test_dispose_and_reopen_conserves_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.arb");
        let points = random_points(30, 41);

        {
            let pager = DiskPageManager::open(&path, 512).unwrap();
            let mut tree =
                SlimTree::new(Box::new(pager), Euclidean, IndexConfig::new(512)).unwrap();
            for p in &points {
                tree.insert(p).unwrap();
            }

            // Scratch pages recycled in two interleaved passes
            let scratch: Vec<_> = (0..4).map(|_| tree.pager.allocate().unwrap()).collect();
            let mut odd = Vec::new();
            for (i, page) in scratch.into_iter().enumerate() {
                if i % 2 == 0 {
                    tree.pager.dispose(page).unwrap();
                } else {
                    odd.push(page);
                }
            }
            for page in odd {
                tree.pager.dispose(page).unwrap();
            }
        }

        let pager = DiskPageManager::open(&path, 512).unwrap();
        let free_before = pager.free_page_ids();
        assert_eq!(free_before.len(), 4);

        let tree = SlimTree::new(Box::new(pager), Euclidean, IndexConfig::new(512)).unwrap();
        tree.validate().unwrap();
        let hits = tree.range_query(&points[0], 0.0).unwrap();
        assert!(hits.iter().any(|r| r.object == points[0]));
    }

    #[test]
    fn test_cancelled_query_returns_partial_result() {
        let mut tree = memory_tree(IndexConfig::new(512));
        for p in random_points(100, 43) {
            tree.insert(&p).unwrap();
        }

        let token = tree.cancel_token();
        token.cancel();
        let rs = tree.range_query(&Point::new(50.0, 50.0), 100.0).unwrap();
        assert!(!rs.complete());
        assert!(rs.is_empty());

        token.reset();
        let rs = tree.range_query(&Point::new(50.0, 50.0), 100.0).unwrap();
        assert!(rs.complete());
        assert_eq!(rs.len(), 100);
    }

    #[test]
    fn test_negative_radius_rejected() {
        let tree = memory_tree(IndexConfig::new(512));
        assert!(matches!(
            tree.range_query(&Point::new(0.0, 0.0), -1.0),
            Err(ArboretumError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_oversized_object_rejected() {
        #[derive(Debug, Clone, PartialEq)]
        struct Blob(Vec<u8>);

        impl Object for Blob {
            fn encoded_size(&self) -> usize {
                self.0.len()
            }
            fn encode(&self) -> Vec<u8> {
                self.0.clone()
            }
            fn decode(bytes: &[u8]) -> Option<Self> {
                Some(Blob(bytes.to_vec()))
            }
        }

        let pager = MemoryPageManager::new(64).unwrap();
        let metric = |_: &Blob, _: &Blob| 0.0;
        let mut tree = SlimTree::new(Box::new(pager), metric, IndexConfig::new(64)).unwrap();
        assert!(matches!(
            tree.insert(&Blob(vec![0xAB; 64])),
            Err(ArboretumError::InvalidArgument(_))
        ));
        assert!(matches!(
            tree.insert(&Blob(Vec::new())),
            Err(ArboretumError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_export_shape_serializes() {
        let mut tree = memory_tree(IndexConfig::new(512));
        assert!(tree.export_shape().unwrap().is_none());

        for p in random_points(60, 47) {
            tree.insert(&p).unwrap();
        }
        let shape = tree.export_shape().unwrap().unwrap();
        assert!(!shape.is_leaf);
        assert!(!shape.children.is_empty());

        let json = serde_json::to_string(&shape).unwrap();
        let back: TreeShape = serde_json::from_str(&json).unwrap();
        assert_eq!(back.page_id, shape.page_id);
        assert_eq!(back.children.len(), shape.children.len());
    }

    #[test]
    fn test_level_statistics_walk() {
        let mut tree = memory_tree(IndexConfig::new(512));
        for p in random_points(200, 53) {
            tree.insert(&p).unwrap();
        }

        let stats = tree.level_statistics().unwrap();
        assert_eq!(stats.height(), tree.height() as usize);
        assert_eq!(stats.nodes(0), 1);
        let total: u64 = (0..stats.height()).map(|l| stats.nodes(l)).sum();
        assert_eq!(total, tree.node_count() as u64);
    }

    #[test]
    fn test_distance_call_counter() {
        let mut tree = memory_tree(IndexConfig::new(512));
        for p in random_points(50, 59) {
            tree.insert(&p).unwrap();
        }
        tree.reset_distance_calls();
        tree.range_query(&Point::new(1.0, 1.0), 5.0).unwrap();
        assert!(tree.distance_calls() > 0);
    }

    #[test]
    fn test_reopening_with_wrong_page_size_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.arb");
        {
            let pager = DiskPageManager::open(&path, 512).unwrap();
            let mut tree =
                SlimTree::new(Box::new(pager), Euclidean, IndexConfig::new(512)).unwrap();
            tree.insert(&Point::new(1.0, 2.0)).unwrap();
        }
        // The disk manager itself refuses the mismatched page size
        assert!(matches!(
            DiskPageManager::open(&path, 1024),
            Err(ArboretumError::InvalidStore(_))
        ));
    }
}
