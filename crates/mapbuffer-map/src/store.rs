use crate::coordinates::RegionCoord;
use crate::error::StoreError;
use crate::region::RegionPayload;

use mapbuffer_core::SmallKeyHashMap;

/// Region-granularity persistence beneath a [`MapBuffer`](crate::MapBuffer).
///
/// A store only ever sees whole regions. It does not need to merge partial writes: the buffer always writes the complete
/// payload of a region, including members that are stored but not resident.
pub trait RegionStore {
    /// Reads every stored submap of `region`. Returns `None` if nothing was ever written for `region`.
    fn read_region(&self, region: RegionCoord) -> Result<Option<RegionPayload>, StoreError>;

    /// Replaces the stored contents of `region` with `payload`.
    fn write_region(&mut self, region: RegionCoord, payload: RegionPayload)
        -> Result<(), StoreError>;

    /// The region size this store's regions were grouped with, if the store pins one.
    fn region_size(&self) -> Option<i32> {
        None
    }
}

/// Keeps encoded regions in memory. Useful for worlds that never touch the disk.
///
/// Payloads are kept in their encoded form, so reads and writes go through the same validation as [`MapDb`](crate::MapDb).
#[derive(Clone, Default)]
pub struct MemoryRegionStore {
    regions: SmallKeyHashMap<RegionCoord, Box<[u8]>>,
}

impl MemoryRegionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of stored regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Stored regions in coordinate order.
    pub fn region_coords(&self) -> Vec<RegionCoord> {
        let mut coords: Vec<_> = self.regions.keys().copied().collect();
        coords.sort_unstable();
        coords
    }

    /// The encoded bytes of `region`, exactly as written.
    pub fn region_bytes(&self, region: RegionCoord) -> Option<&[u8]> {
        self.regions.get(&region).map(|bytes| bytes.as_ref())
    }

    /// Stores raw bytes for `region` without validating them.
    pub fn insert_region_bytes(&mut self, region: RegionCoord, bytes: impl Into<Box<[u8]>>) {
        self.regions.insert(region, bytes.into());
    }
}

impl RegionStore for MemoryRegionStore {
    fn read_region(&self, region: RegionCoord) -> Result<Option<RegionPayload>, StoreError> {
        self.regions
            .get(&region)
            .map(|bytes| RegionPayload::decode(bytes).map_err(StoreError::from))
            .transpose()
    }

    fn write_region(
        &mut self,
        region: RegionCoord,
        payload: RegionPayload,
    ) -> Result<(), StoreError> {
        let bytes = payload.encode()?;
        self.regions.insert(region, bytes.as_slice().into());
        Ok(())
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
