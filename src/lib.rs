//! A buffered, region-batched store for a tile-based world map.
//!
//! The map data model and the [`MapBuffer`](mapbuffer_map::MapBuffer) live in `mapbuffer-map`. This crate ties it to a
//! configuration file and a sled database on disk.

mod config;
mod world;

pub use config::Config;
pub use world::{fill_box, open_world, stored_submaps, World};

pub use mapbuffer_map as map;
