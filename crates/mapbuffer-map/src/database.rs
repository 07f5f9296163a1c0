mod meta_tree;
mod region_tree;

pub use meta_tree::{MapDbMetadata, MAP_FORMAT_VERSION};

use meta_tree::MetaTree;
use region_tree::open_region_tree;

use crate::config::MapBufferConfig;
use crate::coordinates::RegionCoord;
use crate::error::StoreError;
use crate::region::RegionPayload;
use crate::store::RegionStore;

use sled::Tree;

/// # Map Database
///
/// A [`RegionStore`] on top of [`sled`]. One map lives in two [`sled::Tree`]s of a shared database, so several maps (e.g.
/// dimensions or save slots) can share one file.
///
/// ## Region Tree
///
/// `{map_name}-regions` maps a big-endian [`RegionCoord`] key to the encoded [`RegionPayload`] of that region. Each region
/// write is a single insert of the whole payload.
///
/// ## Meta Tree
///
/// `{map_name}-meta` holds [`MapDbMetadata`]. It pins the region size the map was created with, because grouping submaps
/// with any other size would look up the wrong regions.
pub struct MapDb {
    db: sled::Db,
    meta_tree: MetaTree,
    region_tree: Tree,
}

impl MapDb {
    /// Opens the map `map_name` inside `db`. On first open, the map is created for `region_size`.
    pub fn open(db: &sled::Db, map_name: &str, region_size: i32) -> Result<Self, StoreError> {
        MapBufferConfig {
            region_size,
            ..Default::default()
        }
        .validate()?;

        let meta_tree = MetaTree::open(map_name, db, region_size)?;
        let region_tree = open_region_tree(map_name, db)?;

        log::debug!(
            "Opened map {:?} with {} stored regions",
            map_name,
            region_tree.len()
        );

        Ok(Self {
            db: db.clone(),
            meta_tree,
            region_tree,
        })
    }

    pub fn metadata(&self) -> &MapDbMetadata {
        &self.meta_tree.cached_meta
    }

    /// The number of stored regions.
    pub fn len(&self) -> usize {
        self.region_tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.region_tree.is_empty()
    }

    /// Scans the keys of all stored regions in coordinate order.
    pub fn region_coords(&self) -> impl Iterator<Item = Result<RegionCoord, StoreError>> + '_ {
        region_tree::region_coords(&self.region_tree)
    }

    /// Blocks until all previous writes are durable. Returns the number of bytes flushed.
    pub fn flush(&self) -> Result<usize, StoreError> {
        Ok(self.db.flush()?)
    }
}

impl RegionStore for MapDb {
    fn read_region(&self, region: RegionCoord) -> Result<Option<RegionPayload>, StoreError> {
        region_tree::read_region(&self.region_tree, region)
    }

    fn write_region(
        &mut self,
        region: RegionCoord,
        payload: RegionPayload,
    ) -> Result<(), StoreError> {
        region_tree::write_region(&self.region_tree, region, &payload)
    }

    fn region_size(&self) -> Option<i32> {
        Some(self.metadata().region_size)
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
