//! # Arboretum
//!
//! Disk-backed metric access methods: index structures that organise a
//! collection of objects drawn from a metric space and answer range and
//! k-nearest-neighbour similarity queries using nothing but a
//! caller-supplied distance function obeying the metric axioms.
//!
//! ## Architecture
//!
//! The crate is composed of modular, swappable layers:
//!
//! - **Page layer** (`page`): fixed-size byte pages and the slotted node
//!   format packing variable-length entries into one page
//! - **Storage layer** (`storage`): page managers handing out, persisting
//!   and recycling pages, in memory or backed by a file of fixed blocks
//! - **Metric layer** (`metric`): the object and distance-function
//!   capabilities supplied by the caller
//! - **Tree layer** (`tree`): the Slim-tree with insertion, splitting,
//!   range and best-first k-NN search, plus a sequential-scan baseline
//!
//! ## Usage
//!
//! ```rust,ignore
//! use arboretum::{IndexConfig, MemoryPageManager, SlimTree};
//!
//! let config = IndexConfig::new(512);
//! let pager = MemoryPageManager::new(config.page_size)?;
//! let mut tree = SlimTree::new(Box::new(pager), metric, config)?;
//!
//! for city in cities {
//!     tree.insert(&city)?;
//! }
//!
//! // Everything within 30km of the query point
//! for hit in tree.range_query(&query, 30.0)? {
//!     println!("{:?} at {}", hit.object, hit.distance);
//! }
//!
//! // The five nearest cities
//! let nearest = tree.nearest_query(&query, 5)?;
//! ```

pub mod cell_id;
pub mod compress;
pub mod error;
pub mod metric;
pub mod page;
pub mod query;
pub mod stats;
pub mod storage;
pub mod tree;
pub mod types;

pub use cell_id::CellId;
pub use compress::{Compressor, Decompressor};
pub use error::{ArboretumError, Result};
pub use metric::{DistanceFunction, Object};
pub use query::{CancelToken, ResultPair, ResultSet};
pub use stats::LevelStatistics;
pub use storage::{AccessStatistics, DiskPageManager, MemoryPageManager, PageManager};
pub use tree::{SequentialScan, SlimTree, TreeShape};
pub use types::{ChooseSubtree, IndexConfig, PageId, PromotionPolicy, TiesPolicy};

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Reading(f64);

    impl Object for Reading {
        fn encoded_size(&self) -> usize {
            8
        }

        fn encode(&self) -> Vec<u8> {
            self.0.to_be_bytes().to_vec()
        }

        fn decode(bytes: &[u8]) -> Option<Self> {
            let mut b = [0u8; 8];
            if bytes.len() != 8 {
                return None;
            }
            b.copy_from_slice(bytes);
            Some(Reading(f64::from_be_bytes(b)))
        }
    }

    #[test]
    fn test_public_api_end_to_end() -> Result<()> {
        let config = IndexConfig::new(256);
        let pager = MemoryPageManager::new(config.page_size)?;
        let metric = |a: &Reading, b: &Reading| (a.0 - b.0).abs();
        let mut tree = SlimTree::new(Box::new(pager), metric, config)?;

        for i in 0..100 {
            tree.insert(&Reading(i as f64))?;
        }

        let near = tree.range_query(&Reading(10.0), 2.5)?;
        let mut values: Vec<f64> = near.iter().map(|p| p.object.0).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(values, vec![8.0, 9.0, 10.0, 11.0, 12.0]);

        let top = tree.nearest_query(&Reading(50.0), 3)?;
        assert_eq!(top.len(), 3);
        assert_eq!(top.iter().next().unwrap().object, Reading(50.0));

        tree.validate()?;
        Ok(())
    }
}
