use crate::Config;

use mapbuffer_map::{
    LoadError, MapBuffer, MapDb, RegionCoord, RegionStore, StoreError, Submap, SubmapCoord,
};
use std::collections::BTreeMap;

/// A world saved to disk.
pub type World = MapBuffer<Submap, MapDb>;

/// Opens (or creates) the world described by `config`.
pub fn open_world(config: &Config) -> Result<World, StoreError> {
    config.map.validate()?;

    let db = sled::open(&config.world_dir)?;
    let map_db = MapDb::open(&db, &config.world_name, config.map.region_size)?;
    log::info!(
        "Opened world {:?} in {} ({} stored regions)",
        config.world_name,
        config.world_dir.display(),
        map_db.len()
    );

    Ok(MapBuffer::new(map_db, config.map)?)
}

/// Makes sure a submap exists at every coordinate in the inclusive box `[min, max]`, creating missing ones with
/// `generate`. Submaps that are resident or stored are kept as they are.
///
/// Returns the number of generated submaps.
pub fn fill_box(
    world: &mut World,
    min: SubmapCoord,
    max: SubmapCoord,
    mut generate: impl FnMut(SubmapCoord) -> Submap,
) -> Result<usize, LoadError> {
    let mut generated = 0;
    for z in min.z..=max.z {
        for y in min.y..=max.y {
            for x in min.x..=max.x {
                let coord = SubmapCoord::new(x, y, z);
                if world.lookup_submap(coord)?.is_some() {
                    continue;
                }
                let added = world.add_submap(coord, generate(coord));
                debug_assert!(added.is_ok(), "{:?} became resident after a missed lookup", coord);
                generated += 1;
            }
        }
    }
    log::debug!("Generated {} submaps in {:?}..={:?}", generated, min, max);

    Ok(generated)
}

/// Every stored submap coordinate, grouped by region.
pub fn stored_submaps(map_db: &MapDb) -> Result<BTreeMap<RegionCoord, Vec<SubmapCoord>>, StoreError> {
    let mut regions = BTreeMap::new();
    for region in map_db.region_coords() {
        let region = region?;
        let coords = map_db
            .read_region(region)?
            .map(|payload| payload.coords().collect())
            .unwrap_or_default();
        regions.insert(region, coords);
    }

    Ok(regions)
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
