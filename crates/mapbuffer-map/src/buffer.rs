use crate::config::MapBufferConfig;
use crate::coordinates::{RegionCoord, SubmapCoord};
use crate::error::{
    AddSubmapError, ConfigError, EvictError, FormatError, LoadError, RegionFailure, StoreError,
};
use crate::store::RegionStore;
use crate::submap::SubmapCodec;

use parking_lot::RwLock;
use smallvec::SmallVec;
use std::collections::btree_map::{self, Entry};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;

/// Shared access to a resident submap.
///
/// The buffer keeps one reference and hands out clones. A handle stays valid after the buffer evicts or clears the
/// submap, but a submap with outstanding handles is never evicted by [`MapBuffer::save`].
pub type SubmapHandle<T> = Arc<RwLock<T>>;

/// Store, buffer, save and load the entire world map.
///
/// Resident submaps are kept in an ordered map from [`SubmapCoord`] to a [`SubmapHandle`]. Submaps missing from memory are
/// loaded from the [`RegionStore`] one whole region at a time, and [`save`](Self::save) writes them back one region at a
/// time.
///
/// All operations are synchronous and run to completion on the calling thread. Mutating operations take `&mut self`, so the
/// buffer is the single writer of its resident set.
pub struct MapBuffer<T, S> {
    submaps: BTreeMap<SubmapCoord, SubmapHandle<T>>,
    store: S,
    config: MapBufferConfig,
}

/// What a [`MapBuffer::save`] did.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SaveReport {
    pub regions_written: usize,
    pub submaps_written: usize,
    pub submaps_evicted: usize,
    /// Submaps that were saved but stayed resident because handles to them were still alive.
    pub retained: Vec<SubmapCoord>,
}

/// At least one region failed to save. Every other region was still attempted, and `report` describes those.
#[derive(Debug, Error)]
#[error("failed to save {} region(s)", .failures.len())]
pub struct SaveError {
    pub report: SaveReport,
    pub failures: Vec<RegionFailure>,
}

impl<T, S> MapBuffer<T, S>
where
    T: SubmapCodec,
    S: RegionStore,
{
    /// Fails if `config` is invalid, or if `store` pins a region size other than `config.region_size`.
    pub fn new(store: S, config: MapBufferConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        if let Some(stored) = store.region_size() {
            if stored != config.region_size {
                return Err(ConfigError::RegionSizeMismatch {
                    stored,
                    requested: config.region_size,
                });
            }
        }
        Ok(Self {
            submaps: BTreeMap::new(),
            store,
            config,
        })
    }

    pub fn config(&self) -> &MapBufferConfig {
        &self.config
    }

    pub fn region_size(&self) -> i32 {
        self.config.region_size
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Drops all resident submaps without saving and returns the store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Moves `submap` into the buffer at `coord`.
    ///
    /// Fails if a submap is already resident at `coord`; the existing submap is left alone and `submap` is returned inside
    /// the error. Nothing is read from or written to the store.
    pub fn add_submap(
        &mut self,
        coord: impl Into<SubmapCoord>,
        submap: T,
    ) -> Result<(), AddSubmapError<T>> {
        let coord = coord.into();
        match self.submaps.entry(coord) {
            Entry::Occupied(_) => {
                log::debug!("Submap {:?} is already loaded, skipping", coord);
                Err(AddSubmapError { coord, submap })
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(RwLock::new(submap)));
                Ok(())
            }
        }
    }

    /// Gets the submap at `coord`, loading it from the store if it isn't resident.
    ///
    /// This is a get-or-load, not a pure read. On a miss, *every* stored submap of the containing region becomes resident,
    /// not only the requested one, so that lookups of its neighbors don't have to read the same region again.
    ///
    /// Returns `Ok(None)` if the submap exists neither in memory nor in the store. It is then up to the caller to create
    /// one and [`add_submap`](Self::add_submap) it.
    ///
    /// If the region can't be read or decoded, nothing from it becomes resident.
    pub fn lookup_submap(
        &mut self,
        coord: impl Into<SubmapCoord>,
    ) -> Result<Option<SubmapHandle<T>>, LoadError> {
        let coord = coord.into();
        if let Some(handle) = self.submaps.get(&coord) {
            return Ok(Some(handle.clone()));
        }

        let region = coord.region(self.config.region_size);
        self.load_region(region)
            .map_err(|source| LoadError { region, source })?;

        Ok(self.submaps.get(&coord).cloned())
    }

    /// True iff the submap at `coord` is resident right now. Never touches the store.
    pub fn is_submap_loaded(&self, coord: impl Into<SubmapCoord>) -> bool {
        self.submaps.contains_key(&coord.into())
    }

    /// Writes all resident submaps to the store, one write per region.
    ///
    /// Each region write contains every resident submap of that region plus any stored member that is not resident, so
    /// saving never drops submaps from the store.
    ///
    /// If `evict` is true, the submaps of every successfully written region are then removed from the buffer, except for
    /// those that still have outstanding [`SubmapHandle`]s; those are listed in [`SaveReport::retained`].
    ///
    /// A submap whose lock is held for writing fails its region with [`StoreError::SubmapLocked`] instead of blocking.
    ///
    /// A region that fails to save doesn't stop the others. Its submaps stay resident, and the failure is reported in the
    /// returned [`SaveError`].
    pub fn save(&mut self, evict: bool) -> Result<SaveReport, SaveError> {
        let region_size = self.config.region_size;
        let mut regions: BTreeMap<RegionCoord, SmallVec<[SubmapCoord; 4]>> = BTreeMap::new();
        for &coord in self.submaps.keys() {
            regions
                .entry(coord.region(region_size))
                .or_default()
                .push(coord);
        }

        let num_regions = regions.len();
        let progress_interval = self.config.save_progress_interval;
        let mut report = SaveReport::default();
        let mut failures = Vec::new();

        for (i, (region, members)) in regions.into_iter().enumerate() {
            if progress_interval > 0 && i > 0 && i % progress_interval == 0 {
                log::info!("Saving submaps... {}/{} regions", i, num_regions);
            }

            if let Err(source) = self.save_region(region, &members) {
                log::warn!("Failed to save region {:?}: {}", region, source);
                failures.push(RegionFailure { region, source });
                continue;
            }
            report.regions_written += 1;
            report.submaps_written += members.len();

            if evict {
                for coord in members {
                    match self.evict_submap(coord) {
                        Ok(_) => report.submaps_evicted += 1,
                        Err(EvictError::Referenced { .. }) => report.retained.push(coord),
                        Err(EvictError::NotLoaded(_)) => {}
                    }
                }
            }
        }

        if !report.retained.is_empty() {
            log::warn!(
                "{} saved submaps are still referenced and stay resident",
                report.retained.len()
            );
        }
        log::info!(
            "Saved {} submaps in {} regions ({} evicted)",
            report.submaps_written,
            report.regions_written,
            report.submaps_evicted
        );

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(SaveError { report, failures })
        }
    }

    /// Drops every resident submap without saving.
    ///
    /// Handles held elsewhere stay valid, but their submaps are no longer part of the map and won't be saved.
    pub fn clear(&mut self) {
        let referenced = self
            .submaps
            .values()
            .filter(|handle| Arc::strong_count(handle) > 1)
            .count();
        if referenced > 0 {
            log::debug!(
                "Clearing {} submaps, {} of which are still referenced",
                self.submaps.len(),
                referenced
            );
        }
        self.submaps.clear();
    }

    /// Removes the submap at `coord` from the buffer without saving it, and returns it.
    ///
    /// Fails with [`EvictError::Referenced`] if any [`SubmapHandle`] to it is still alive; the submap then stays resident.
    pub fn evict_submap(&mut self, coord: impl Into<SubmapCoord>) -> Result<T, EvictError> {
        let coord = coord.into();
        let handle = self
            .submaps
            .remove(&coord)
            .ok_or(EvictError::NotLoaded(coord))?;
        match Arc::try_unwrap(handle) {
            Ok(lock) => Ok(lock.into_inner()),
            Err(handle) => {
                let handles = Arc::strong_count(&handle) - 1;
                self.submaps.insert(coord, handle);
                Err(EvictError::Referenced { coord, handles })
            }
        }
    }

    /// Resident submaps in coordinate order.
    pub fn iter(&self) -> btree_map::Iter<'_, SubmapCoord, SubmapHandle<T>> {
        self.submaps.iter()
    }

    /// The number of resident submaps.
    pub fn len(&self) -> usize {
        self.submaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submaps.is_empty()
    }

    /// Regions with at least one resident submap.
    pub fn resident_regions(&self) -> BTreeSet<RegionCoord> {
        let region_size = self.config.region_size;
        self.submaps
            .keys()
            .map(|coord| coord.region(region_size))
            .collect()
    }

    /// Makes every stored submap of `region` resident, except those that already are. Returns how many were added.
    fn load_region(&mut self, region: RegionCoord) -> Result<usize, StoreError> {
        let Some(payload) = self.store.read_region(region)? else {
            log::debug!("Region {:?} is not stored", region);
            return Ok(0);
        };

        // Decode everything before touching the resident set, so a bad payload leaves it unchanged.
        let region_size = self.config.region_size;
        let mut loaded = Vec::with_capacity(payload.len());
        for (&coord, compressed) in payload.iter() {
            if !region.contains(coord, region_size) {
                return Err(FormatError::ForeignSubmap {
                    submap: coord,
                    region,
                }
                .into());
            }
            if self.submaps.contains_key(&coord) {
                // The resident copy may be newer than the stored one.
                continue;
            }
            loaded.push((coord, T::decompress(compressed)?));
        }

        let num_loaded = loaded.len();
        for (coord, submap) in loaded {
            self.submaps.insert(coord, Arc::new(RwLock::new(submap)));
        }
        log::debug!(
            "Loaded {} of {} stored submaps in region {:?}",
            num_loaded,
            payload.len(),
            region
        );
        Ok(num_loaded)
    }

    fn save_region(&mut self, region: RegionCoord, members: &[SubmapCoord]) -> Result<(), StoreError> {
        // Start from what is stored so members that aren't resident survive the rewrite.
        let mut payload = self.store.read_region(region)?.unwrap_or_default();
        for coord in members {
            if let Some(handle) = self.submaps.get(coord) {
                // A write guard held by the caller's own thread would deadlock a blocking read.
                let submap = handle
                    .try_read()
                    .ok_or(StoreError::SubmapLocked(*coord))?;
                payload.insert(*coord, submap.compress());
            }
        }
        log::debug!(
            "Writing region {:?} with {} submaps ({} resident)",
            region,
            payload.len(),
            members.len()
        );
        self.store.write_region(region, payload)
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::RegionPayload;
    use crate::store::MemoryRegionStore;
    use crate::submap::{CompressedSubmap, Submap};

    use std::cell::Cell;
    use std::io;

    /// Records every region read and write on top of a [`MemoryRegionStore`]. Writes to `failing` regions fail.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryRegionStore,
        reads: Cell<usize>,
        writes: Vec<(RegionCoord, Vec<SubmapCoord>)>,
        failing: BTreeSet<RegionCoord>,
    }

    impl CountingStore {
        fn reset(&mut self) {
            self.reads.set(0);
            self.writes.clear();
        }
    }

    impl RegionStore for CountingStore {
        fn read_region(&self, region: RegionCoord) -> Result<Option<RegionPayload>, StoreError> {
            self.reads.set(self.reads.get() + 1);
            self.inner.read_region(region)
        }

        fn write_region(
            &mut self,
            region: RegionCoord,
            payload: RegionPayload,
        ) -> Result<(), StoreError> {
            if self.failing.contains(&region) {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full").into());
            }
            self.writes.push((region, payload.coords().collect()));
            self.inner.write_region(region, payload)
        }
    }

    fn quad_buffer<S: RegionStore>(store: S) -> MapBuffer<Submap, S> {
        MapBuffer::new(store, MapBufferConfig::default()).unwrap()
    }

    fn terrain(handle: &SubmapHandle<Submap>) -> u16 {
        handle.read().terrain_at([0, 0])
    }

    #[test]
    fn add_then_lookup() {
        let mut buffer = quad_buffer(MemoryRegionStore::new());
        let c = SubmapCoord::new(4, -2, 1);

        assert!(!buffer.is_submap_loaded(c));
        buffer.add_submap(c, Submap::filled(7)).unwrap();
        assert!(buffer.is_submap_loaded(c));

        let handle = buffer.lookup_submap(c).unwrap().unwrap();
        assert_eq!(*handle.read(), Submap::filled(7));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn duplicate_add_is_rejected_and_returns_the_submap() {
        let mut buffer = quad_buffer(MemoryRegionStore::new());
        let c = SubmapCoord::new(0, 0, 0);
        buffer.add_submap(c, Submap::filled(1)).unwrap();

        let err = buffer.add_submap(c, Submap::filled(2)).unwrap_err();
        assert_eq!(err.coord, c);
        assert_eq!(err.into_submap(), Submap::filled(2));

        let handle = buffer.lookup_submap(c).unwrap().unwrap();
        assert_eq!(terrain(&handle), 1);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn coordinate_conversions_address_the_same_submap() {
        let mut buffer = quad_buffer(MemoryRegionStore::new());
        buffer.add_submap([1, 2, 3], Submap::filled(5)).unwrap();
        assert!(buffer.is_submap_loaded((1, 2, 3)));
        assert!(buffer.is_submap_loaded(SubmapCoord::new(1, 2, 3)));
        assert!(buffer
            .add_submap(mapbuffer_core::glam::IVec3::new(1, 2, 3), Submap::default())
            .is_err());
    }

    #[test]
    fn lookup_of_unknown_submap_is_none() {
        let mut buffer = quad_buffer(CountingStore::default());
        assert!(buffer.lookup_submap((9, 9, 0)).unwrap().is_none());
        assert!(!buffer.is_submap_loaded((9, 9, 0)));
        assert!(buffer.is_empty());
        assert_eq!(buffer.store().reads.get(), 1);
    }

    #[test]
    fn lookup_of_resident_submap_does_no_io() {
        let mut buffer = quad_buffer(CountingStore::default());
        buffer.add_submap((0, 0, 0), Submap::default()).unwrap();
        buffer.lookup_submap((0, 0, 0)).unwrap().unwrap();
        assert_eq!(buffer.store().reads.get(), 0);
    }

    #[test]
    fn save_evict_and_reload_round_trip() {
        let mut buffer = quad_buffer(MemoryRegionStore::new());
        let c = SubmapCoord::new(-3, 5, -1);
        let mut submap = Submap::filled(12);
        submap.set_furniture([4, 7], 99);
        buffer.add_submap(c, submap).unwrap();

        let report = buffer.save(true).unwrap();
        assert_eq!(report.submaps_written, 1);
        assert_eq!(report.submaps_evicted, 1);
        assert!(!buffer.is_submap_loaded(c));

        let handle = buffer.lookup_submap(c).unwrap().unwrap();
        assert_eq!(*handle.read(), submap);
    }

    #[test]
    fn repeated_save_writes_identical_bytes() {
        let mut buffer = quad_buffer(MemoryRegionStore::new());
        let region = RegionCoord::new(0, 0, 0);
        buffer.add_submap((0, 0, 0), Submap::filled(1)).unwrap();
        buffer.add_submap((1, 1, 0), Submap::filled(2)).unwrap();

        buffer.save(false).unwrap();
        let first = buffer.store().region_bytes(region).unwrap().to_vec();
        buffer.save(false).unwrap();
        let second = buffer.store().region_bytes(region).unwrap().to_vec();

        assert_eq!(first, second);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn quad_scenario() {
        let mut buffer = quad_buffer(CountingStore::default());
        let quad = [
            SubmapCoord::new(0, 0, 0),
            SubmapCoord::new(1, 0, 0),
            SubmapCoord::new(0, 1, 0),
        ];
        let lonely = SubmapCoord::new(2, 0, 0);
        for (i, &c) in quad.iter().enumerate() {
            buffer.add_submap(c, Submap::filled(i as u16)).unwrap();
        }
        buffer.add_submap(lonely, Submap::filled(100)).unwrap();

        let report = buffer.save(true).unwrap();
        assert_eq!(report.regions_written, 2);
        assert_eq!(report.submaps_evicted, 4);

        let writes = &buffer.store().writes;
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].0, RegionCoord::new(0, 0, 0));
        assert_eq!(
            writes[0].1,
            vec![
                SubmapCoord::new(0, 0, 0),
                SubmapCoord::new(0, 1, 0),
                SubmapCoord::new(1, 0, 0),
            ]
        );
        assert_eq!(writes[1].0, RegionCoord::new(1, 0, 0));
        assert_eq!(writes[1].1, vec![lonely]);

        for c in quad.iter().chain([&lonely]) {
            assert!(!buffer.is_submap_loaded(*c));
        }

        buffer.store_mut().reset();
        let handle = buffer.lookup_submap((1, 0, 0)).unwrap().unwrap();
        assert_eq!(terrain(&handle), 1);
        assert_eq!(buffer.store().reads.get(), 1);
        for c in quad {
            assert!(buffer.is_submap_loaded(c));
        }
        assert!(!buffer.is_submap_loaded(lonely));

        let handle = buffer.lookup_submap((0, 1, 0)).unwrap().unwrap();
        assert_eq!(terrain(&handle), 2);
        assert_eq!(buffer.store().reads.get(), 1);
    }

    #[test]
    fn save_keeps_stored_members_that_are_not_resident() {
        let mut buffer = quad_buffer(MemoryRegionStore::new());
        buffer.add_submap((0, 0, 0), Submap::filled(1)).unwrap();
        buffer.add_submap((1, 0, 0), Submap::filled(2)).unwrap();
        buffer.save(true).unwrap();
        assert!(buffer.is_empty());

        // A new member of the same region, created without loading its siblings.
        buffer.add_submap((1, 1, 0), Submap::filled(3)).unwrap();
        buffer.save(true).unwrap();

        let stored = buffer
            .store()
            .read_region(RegionCoord::new(0, 0, 0))
            .unwrap()
            .unwrap();
        assert_eq!(stored.len(), 3);

        let handle = buffer.lookup_submap((0, 0, 0)).unwrap().unwrap();
        assert_eq!(terrain(&handle), 1);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn save_without_evict_keeps_everything_resident() {
        let mut buffer = quad_buffer(MemoryRegionStore::new());
        buffer.add_submap((0, 0, 0), Submap::default()).unwrap();
        buffer.add_submap((5, 5, 0), Submap::default()).unwrap();

        let report = buffer.save(false).unwrap();
        assert_eq!(report.regions_written, 2);
        assert_eq!(report.submaps_evicted, 0);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.store().len(), 2);
    }

    #[test]
    fn referenced_submaps_are_not_evicted() {
        let mut buffer = quad_buffer(MemoryRegionStore::new());
        let held = SubmapCoord::new(0, 0, 0);
        let free = SubmapCoord::new(1, 0, 0);
        buffer.add_submap(held, Submap::filled(1)).unwrap();
        buffer.add_submap(free, Submap::filled(2)).unwrap();

        let handle = buffer.lookup_submap(held).unwrap().unwrap();
        let report = buffer.save(true).unwrap();
        assert_eq!(report.submaps_written, 2);
        assert_eq!(report.submaps_evicted, 1);
        assert_eq!(report.retained, vec![held]);
        assert!(buffer.is_submap_loaded(held));
        assert!(!buffer.is_submap_loaded(free));

        // The holder can keep editing, and the edit is saved next time.
        handle.write().set_terrain([0, 0], 42);
        drop(handle);
        let report = buffer.save(true).unwrap();
        assert_eq!(report.submaps_evicted, 1);
        assert!(report.retained.is_empty());
        assert!(buffer.is_empty());

        let handle = buffer.lookup_submap(held).unwrap().unwrap();
        assert_eq!(terrain(&handle), 42);
    }

    #[test]
    fn evict_single_submap() {
        let mut buffer = quad_buffer(MemoryRegionStore::new());
        let c = SubmapCoord::new(0, 0, 0);
        assert_eq!(buffer.evict_submap(c), Err(EvictError::NotLoaded(c)));

        buffer.add_submap(c, Submap::filled(3)).unwrap();
        let handle = buffer.lookup_submap(c).unwrap().unwrap();
        let other = handle.clone();
        assert_eq!(
            buffer.evict_submap(c),
            Err(EvictError::Referenced { coord: c, handles: 2 })
        );
        assert!(buffer.is_submap_loaded(c));

        drop(handle);
        drop(other);
        assert_eq!(buffer.evict_submap(c).unwrap(), Submap::filled(3));
        assert!(!buffer.is_submap_loaded(c));
    }

    #[test]
    fn clear_discards_without_saving() {
        let mut buffer = quad_buffer(CountingStore::default());
        buffer.add_submap((0, 0, 0), Submap::filled(8)).unwrap();
        let handle = buffer.lookup_submap((0, 0, 0)).unwrap().unwrap();

        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.store().writes.is_empty());
        // Outstanding handles stay usable.
        assert_eq!(terrain(&handle), 8);

        assert!(buffer.lookup_submap((0, 0, 0)).unwrap().is_none());
    }

    #[test]
    fn failed_region_does_not_stop_the_others() {
        let mut store = CountingStore::default();
        let bad = RegionCoord::new(0, 0, 0);
        store.failing.insert(bad);
        let mut buffer = quad_buffer(store);
        buffer.add_submap((0, 0, 0), Submap::default()).unwrap();
        buffer.add_submap((2, 0, 0), Submap::default()).unwrap();
        buffer.add_submap((4, 0, 0), Submap::default()).unwrap();

        let err = buffer.save(true).unwrap_err();
        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].region, bad);
        assert_eq!(err.report.regions_written, 2);
        assert_eq!(err.report.submaps_evicted, 2);

        // Unsaved submaps must not be evicted.
        assert!(buffer.is_submap_loaded((0, 0, 0)));
        assert!(!buffer.is_submap_loaded((2, 0, 0)));
        assert!(!buffer.is_submap_loaded((4, 0, 0)));
    }

    #[test]
    fn corrupt_region_loads_nothing() {
        let mut store = MemoryRegionStore::new();
        let mut payload = RegionPayload::new();
        payload.insert(SubmapCoord::new(0, 0, 0), Submap::filled(1).compress());
        payload.insert(SubmapCoord::new(1, 0, 0), CompressedSubmap::new(vec![7, 7, 7]));
        store
            .write_region(RegionCoord::new(0, 0, 0), payload)
            .unwrap();
        let mut buffer = quad_buffer(store);

        let err = buffer.lookup_submap((0, 0, 0)).unwrap_err();
        assert_eq!(err.region, RegionCoord::new(0, 0, 0));
        assert!(matches!(err.source, StoreError::Format(_)));
        assert!(buffer.is_empty());
    }

    #[test]
    fn undecodable_region_bytes_are_a_load_error() {
        let mut store = MemoryRegionStore::new();
        store.insert_region_bytes(RegionCoord::new(0, 0, 0), vec![1, 2, 3]);
        let mut buffer = quad_buffer(store);

        assert!(buffer.lookup_submap((1, 1, 0)).is_err());
        assert!(buffer.is_empty());
    }

    #[test]
    fn submap_stored_in_wrong_region_is_rejected() {
        let mut store = MemoryRegionStore::new();
        let mut payload = RegionPayload::new();
        payload.insert(SubmapCoord::new(0, 0, 0), Submap::default().compress());
        payload.insert(SubmapCoord::new(5, 0, 0), Submap::default().compress());
        store
            .write_region(RegionCoord::new(0, 0, 0), payload)
            .unwrap();
        let mut buffer = quad_buffer(store);

        let err = buffer.lookup_submap((0, 0, 0)).unwrap_err();
        assert!(matches!(
            err.source,
            StoreError::Format(FormatError::ForeignSubmap { .. })
        ));
        assert!(buffer.is_empty());
    }

    #[test]
    fn region_load_does_not_replace_resident_submaps() {
        let mut buffer = quad_buffer(MemoryRegionStore::new());
        buffer.add_submap((0, 0, 0), Submap::filled(1)).unwrap();
        buffer.add_submap((1, 0, 0), Submap::filled(1)).unwrap();
        buffer.save(false).unwrap();

        // Edit one resident submap and evict the other.
        buffer
            .lookup_submap((0, 0, 0))
            .unwrap()
            .unwrap()
            .write()
            .set_terrain([0, 0], 9);
        buffer.evict_submap((1, 0, 0)).unwrap();

        let handle = buffer.lookup_submap((1, 0, 0)).unwrap().unwrap();
        assert_eq!(terrain(&handle), 1);
        let handle = buffer.lookup_submap((0, 0, 0)).unwrap().unwrap();
        assert_eq!(terrain(&handle), 9);
    }

    #[test]
    fn iterate_in_coordinate_order() {
        let mut buffer = quad_buffer(MemoryRegionStore::new());
        for c in [(3, 0, 0), (-1, 2, 0), (0, 0, 1), (0, 0, 0)] {
            buffer.add_submap(c, Submap::default()).unwrap();
        }
        let coords: Vec<_> = buffer.iter().map(|(c, _)| *c).collect();
        assert_eq!(
            coords,
            vec![
                SubmapCoord::new(-1, 2, 0),
                SubmapCoord::new(0, 0, 0),
                SubmapCoord::new(0, 0, 1),
                SubmapCoord::new(3, 0, 0),
            ]
        );
        assert_eq!(
            buffer.resident_regions().into_iter().collect::<Vec<_>>(),
            vec![
                RegionCoord::new(-1, 1, 0),
                RegionCoord::new(0, 0, 0),
                RegionCoord::new(0, 0, 1),
                RegionCoord::new(1, 0, 0),
            ]
        );
    }

    #[test]
    fn larger_regions_batch_more_submaps() {
        let config = MapBufferConfig {
            region_size: 4,
            ..Default::default()
        };
        let mut buffer = MapBuffer::<Submap, _>::new(CountingStore::default(), config).unwrap();
        for x in 0..4 {
            for y in 0..4 {
                buffer.add_submap((x, y, 0), Submap::default()).unwrap();
            }
        }
        buffer.save(true).unwrap();
        assert_eq!(buffer.store().writes.len(), 1);
        assert_eq!(buffer.store().writes[0].1.len(), 16);
    }

    #[test]
    fn reject_invalid_config() {
        let config = MapBufferConfig {
            region_size: -2,
            ..Default::default()
        };
        assert!(MapBuffer::<Submap, _>::new(MemoryRegionStore::new(), config).is_err());
    }

    #[test]
    fn write_locked_submap_fails_only_its_region() {
        let mut buffer = quad_buffer(MemoryRegionStore::new());
        let locked = SubmapCoord::new(0, 0, 0);
        buffer.add_submap(locked, Submap::filled(1)).unwrap();
        buffer.add_submap((1, 0, 0), Submap::filled(2)).unwrap();
        buffer.add_submap((2, 0, 0), Submap::filled(3)).unwrap();

        let handle = buffer.lookup_submap(locked).unwrap().unwrap();
        let mut guard = handle.write();
        guard.set_terrain([0, 0], 5);

        let err = buffer.save(true).unwrap_err();
        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].region, RegionCoord::new(0, 0, 0));
        assert!(matches!(
            err.failures[0].source,
            StoreError::SubmapLocked(c) if c == locked
        ));
        assert_eq!(err.report.regions_written, 1);
        assert!(buffer.is_submap_loaded(locked));
        assert!(buffer.is_submap_loaded((1, 0, 0)));
        assert!(!buffer.is_submap_loaded((2, 0, 0)));
        assert!(buffer
            .store()
            .read_region(RegionCoord::new(0, 0, 0))
            .unwrap()
            .is_none());

        drop(guard);
        drop(handle);
        let report = buffer.save(true).unwrap();
        assert_eq!(report.submaps_written, 2);
        let handle = buffer.lookup_submap(locked).unwrap().unwrap();
        assert_eq!(terrain(&handle), 5);
    }

    #[test]
    fn sled_backed_buffer_round_trip() {
        let db = sled::Config::default().temporary(true).open().unwrap();
        let map_db = crate::MapDb::open(&db, "mymap", 2).unwrap();
        let mut buffer = quad_buffer(map_db);
        buffer.add_submap((-1, -1, 0), Submap::filled(4)).unwrap();
        buffer.add_submap((0, 0, 0), Submap::filled(5)).unwrap();
        buffer.save(true).unwrap();
        assert!(buffer.is_empty());

        let map_db = buffer.into_store();
        assert_eq!(map_db.len(), 2);
        let mut buffer = quad_buffer(map_db);
        let handle = buffer.lookup_submap((-1, -1, 0)).unwrap().unwrap();
        assert_eq!(terrain(&handle), 4);
    }

    #[test]
    fn buffer_rejects_region_size_other_than_the_stored_one() {
        let db = sled::Config::default().temporary(true).open().unwrap();
        let map_db = crate::MapDb::open(&db, "mymap", 2).unwrap();
        let config = MapBufferConfig {
            region_size: 4,
            ..Default::default()
        };

        match MapBuffer::<Submap, _>::new(map_db, config) {
            Err(ConfigError::RegionSizeMismatch { stored, requested }) => {
                assert_eq!(stored, 2);
                assert_eq!(requested, 4);
            }
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("mismatched region size was accepted"),
        }

        // A store that doesn't pin a size takes any valid one.
        assert!(MapBuffer::<Submap, _>::new(MemoryRegionStore::new(), config).is_ok());
    }
}
