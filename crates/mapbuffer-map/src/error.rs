use crate::coordinates::{RegionCoord, SubmapCoord};

use mapbuffer_core::ArchiveError;
use std::fmt;
use std::io;
use thiserror::Error;

/// Bytes read back from storage could not be decoded.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("failed to decompress submap: {0}")]
    Decompress(#[from] io::Error),
    #[error("decompressed submap has {actual} bytes, expected {expected}")]
    Length { expected: usize, actual: usize },
    #[error("invalid archive: {0}")]
    Archive(#[from] ArchiveError),
    #[error("malformed region key {0:?}")]
    RegionKey(Vec<u8>),
    #[error("submap {submap:?} was stored in region {region:?}, which does not contain it")]
    ForeignSubmap {
        submap: SubmapCoord,
        region: RegionCoord,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("region size must be positive, got {0}")]
    InvalidRegionSize(i32),
    #[error("store was created with region size {stored}, but region size {requested} was configured")]
    RegionSizeMismatch { stored: i32, requested: i32 },
}

/// A failure of the backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sled(#[from] sled::Error),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("map was created with region size {stored}, but region size {requested} was requested")]
    RegionSizeMismatch { stored: i32, requested: i32 },
    #[error("map format version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("submap {0:?} is locked by an outstanding write guard")]
    SubmapLocked(SubmapCoord),
}

/// A region could not be loaded during a lookup. Nothing from the region was made resident.
#[derive(Debug, Error)]
#[error("failed to load region {region:?}")]
pub struct LoadError {
    pub region: RegionCoord,
    #[source]
    pub source: StoreError,
}

/// [`MapBuffer::add_submap`](crate::MapBuffer::add_submap) found a submap already loaded at `coord`.
///
/// The rejected submap is handed back untouched.
pub struct AddSubmapError<T> {
    pub coord: SubmapCoord,
    pub submap: T,
}

impl<T> AddSubmapError<T> {
    pub fn into_submap(self) -> T {
        self.submap
    }
}

impl<T> fmt::Debug for AddSubmapError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddSubmapError")
            .field("coord", &self.coord)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for AddSubmapError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a submap is already loaded at {:?}", self.coord)
    }
}

impl<T> std::error::Error for AddSubmapError<T> {}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum EvictError {
    #[error("no submap is loaded at {0:?}")]
    NotLoaded(SubmapCoord),
    #[error("submap {coord:?} is still referenced by {handles} handle(s)")]
    Referenced { coord: SubmapCoord, handles: usize },
}

/// One region that failed to save.
#[derive(Debug, Error)]
#[error("failed to save region {region:?}")]
pub struct RegionFailure {
    pub region: RegionCoord,
    #[source]
    pub source: StoreError,
}
