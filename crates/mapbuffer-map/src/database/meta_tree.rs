use crate::error::{FormatError, StoreError};

use mapbuffer_core::{to_archive_bytes, ArchivedBuf};
use rkyv::{Archive, Deserialize, Serialize};
use sled::Tree;

const META_KEY: &str = "META";

/// Bumped whenever the encoding of region payloads changes.
pub const MAP_FORMAT_VERSION: u32 = 1;

#[derive(Archive, Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[archive(check_bytes)]
pub struct MapDbMetadata {
    pub format_version: u32,
    /// Regions are only meaningful for the region size they were written with.
    pub region_size: i32,
}

/// Mapping from `&str` to structured metadata, like [`MapDbMetadata`].
pub struct MetaTree {
    // Zero-copy isn't super important for this tiny struct, so we just copy it for convenience.
    pub(super) cached_meta: MapDbMetadata,
}

impl MetaTree {
    /// Opens the metadata of `map_name`. On first open, the metadata is written with `region_size`; afterwards, it must
    /// agree with what was stored.
    pub fn open(map_name: &str, db: &sled::Db, region_size: i32) -> Result<Self, StoreError> {
        let tree = db.open_tree(format!("{}-meta", map_name))?;

        let cached_meta = if let Some(stored) = read_meta(&tree)? {
            if stored.format_version != MAP_FORMAT_VERSION {
                return Err(StoreError::UnsupportedVersion {
                    found: stored.format_version,
                    expected: MAP_FORMAT_VERSION,
                });
            }
            if stored.region_size != region_size {
                return Err(StoreError::RegionSizeMismatch {
                    stored: stored.region_size,
                    requested: region_size,
                });
            }
            stored
        } else {
            // First time opening this tree. Write the initial values.
            let meta = MapDbMetadata {
                format_version: MAP_FORMAT_VERSION,
                region_size,
            };
            write_meta(&tree, &meta)?;
            meta
        };

        Ok(Self { cached_meta })
    }
}

fn write_meta(tree: &Tree, meta: &MapDbMetadata) -> Result<(), StoreError> {
    let bytes = to_archive_bytes(meta).map_err(FormatError::from)?;
    tree.insert(META_KEY, bytes.as_slice())?;
    Ok(())
}

fn read_meta(tree: &Tree) -> Result<Option<MapDbMetadata>, StoreError> {
    let Some(bytes) = tree.get(META_KEY)? else {
        return Ok(None);
    };
    let meta = ArchivedBuf::<MapDbMetadata>::from_bytes(&bytes).map_err(FormatError::from)?;
    Ok(Some(meta.deserialize()))
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
