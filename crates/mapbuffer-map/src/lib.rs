//! The mapbuffer world map.
//!
//! # Submaps
//!
//! The world is a grid of [`Submap`]s, each a 12x12 patch of tiles at one vertical level. A submap is addressed by its
//! [`SubmapCoord`] in submap units; tile units and region units have their own wrapper types in [`units`] so they can't be
//! confused. The [`MapBuffer`] treats submaps as opaque and only needs them to implement [`SubmapCodec`].
//!
//! # Regions
//!
//! Submaps are saved and loaded in batches. A region is a square of `region_size x region_size` submaps at a single `z`
//! level, so with the default size of 2 each region holds up to 4 submaps. Regions are the unit of I/O: looking up any
//! submap that isn't resident loads its whole region, and saving writes each touched region exactly once.
//!
//! # Storage
//!
//! Regions go through the [`RegionStore`] trait. [`MapDb`] keeps them in [`sled`] trees, with one LZ4-compressed blob per
//! submap inside an [`rkyv`] archive per region. [`MemoryRegionStore`] keeps the same encoded bytes in memory.

mod buffer;
mod config;
mod coordinates;
mod database;
mod error;
mod region;
mod store;
mod submap;

pub mod units;

pub use buffer::*;
pub use config::*;
pub use coordinates::*;
pub use database::*;
pub use error::*;
pub use region::*;
pub use store::*;
pub use submap::*;
