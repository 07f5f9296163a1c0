use crate::coordinates::RegionCoord;
use crate::error::{FormatError, StoreError};
use crate::region::RegionPayload;

use sled::Tree;

pub fn open_region_tree(map_name: &str, db: &sled::Db) -> sled::Result<Tree> {
    db.open_tree(format!("{}-regions", map_name))
}

pub fn read_region(tree: &Tree, region: RegionCoord) -> Result<Option<RegionPayload>, StoreError> {
    let Some(bytes) = tree.get(region.into_sled_key())? else {
        return Ok(None);
    };
    Ok(Some(RegionPayload::decode(&bytes)?))
}

/// Replaces the whole region value in one insert, so a region is never half written.
pub fn write_region(
    tree: &Tree,
    region: RegionCoord,
    payload: &RegionPayload,
) -> Result<(), StoreError> {
    let bytes = payload.encode()?;
    tree.insert(region.into_sled_key(), bytes.as_slice())?;
    Ok(())
}

/// All stored regions in coordinate order.
pub fn region_coords(tree: &Tree) -> impl Iterator<Item = Result<RegionCoord, StoreError>> + '_ {
    tree.iter().keys().map(|key| -> Result<RegionCoord, StoreError> {
        let key = key?;
        RegionCoord::from_sled_key(&key)
            .ok_or_else(|| StoreError::from(FormatError::RegionKey(key.to_vec())))
    })
}
