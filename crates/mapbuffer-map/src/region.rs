use crate::coordinates::SubmapCoord;
use crate::error::FormatError;
use crate::submap::CompressedSubmap;

use mapbuffer_core::{to_archive_bytes, ArchivedBuf};
use rkyv::{AlignedVec, Archive, Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;

/// Every stored submap of one region, keyed by submap coordinate.
///
/// This is the unit of transfer between the [`MapBuffer`](crate::MapBuffer) and a [`RegionStore`](crate::RegionStore).
/// The submaps themselves are opaque [`CompressedSubmap`]s.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RegionPayload {
    submaps: BTreeMap<SubmapCoord, CompressedSubmap>,
}

/// On-disk form of a [`RegionPayload`]. Entries are sorted by coordinate and unique, so equal payloads always encode to
/// equal bytes.
#[derive(Archive, Deserialize, Serialize)]
#[archive(check_bytes)]
struct RegionArchive {
    entries: Vec<RegionEntry>,
}

#[derive(Archive, Deserialize, Serialize)]
#[archive(check_bytes)]
struct RegionEntry {
    coord: SubmapCoord,
    submap: CompressedSubmap,
}

impl RegionPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the submap at `coord`, returning the old value.
    pub fn insert(
        &mut self,
        coord: SubmapCoord,
        submap: CompressedSubmap,
    ) -> Option<CompressedSubmap> {
        self.submaps.insert(coord, submap)
    }

    pub fn get(&self, coord: &SubmapCoord) -> Option<&CompressedSubmap> {
        self.submaps.get(coord)
    }

    pub fn remove(&mut self, coord: &SubmapCoord) -> Option<CompressedSubmap> {
        self.submaps.remove(coord)
    }

    pub fn contains(&self, coord: &SubmapCoord) -> bool {
        self.submaps.contains_key(coord)
    }

    pub fn len(&self) -> usize {
        self.submaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submaps.is_empty()
    }

    /// Entries in coordinate order.
    pub fn iter(&self) -> btree_map::Iter<'_, SubmapCoord, CompressedSubmap> {
        self.submaps.iter()
    }

    pub fn coords(&self) -> impl Iterator<Item = SubmapCoord> + '_ {
        self.submaps.keys().copied()
    }

    pub fn encode(&self) -> Result<AlignedVec, FormatError> {
        let archive = RegionArchive {
            entries: self
                .submaps
                .iter()
                .map(|(&coord, submap)| RegionEntry {
                    coord,
                    submap: submap.clone(),
                })
                .collect(),
        };
        Ok(to_archive_bytes(&archive)?)
    }

    /// Validates and decodes bytes produced by [`RegionPayload::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        let archive = ArchivedBuf::<RegionArchive>::from_bytes(bytes)?.deserialize();
        Ok(archive
            .entries
            .into_iter()
            .map(|entry| (entry.coord, entry.submap))
            .collect())
    }
}

impl FromIterator<(SubmapCoord, CompressedSubmap)> for RegionPayload {
    fn from_iter<I: IntoIterator<Item = (SubmapCoord, CompressedSubmap)>>(iter: I) -> Self {
        Self {
            submaps: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for RegionPayload {
    type Item = (SubmapCoord, CompressedSubmap);
    type IntoIter = btree_map::IntoIter<SubmapCoord, CompressedSubmap>;

    fn into_iter(self) -> Self::IntoIter {
        self.submaps.into_iter()
    }
}

impl<'a> IntoIterator for &'a RegionPayload {
    type Item = (&'a SubmapCoord, &'a CompressedSubmap);
    type IntoIter = btree_map::Iter<'a, SubmapCoord, CompressedSubmap>;

    fn into_iter(self) -> Self::IntoIter {
        self.submaps.iter()
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
