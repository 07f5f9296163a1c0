use crate::error::FormatError;

use bytemuck::{bytes_of, bytes_of_mut, Pod, Zeroable};
use lz4_flex::frame::{FrameDecoder, FrameEncoder};
use mapbuffer_core::static_assertions::const_assert_eq;
use ndshape::{ConstShape, ConstShape2u32};
use rkyv::{Archive, Deserialize, Serialize};
use std::io::{Read, Write};
use std::mem;

/// The tile layout of a single submap layer.
pub type SubmapShape = ConstShape2u32<12, 12>;
pub const SUBMAP_EDGE_LENGTH: i32 = 12;
pub const SUBMAP_SIZE: usize = 12 * 12;
const_assert_eq!(SUBMAP_SIZE, (SUBMAP_EDGE_LENGTH * SUBMAP_EDGE_LENGTH) as usize);

/// Anything the [`MapBuffer`](crate::MapBuffer) can persist.
///
/// The buffer never looks inside a submap. It only moves whole submaps around and calls these two functions at the storage
/// boundary.
pub trait SubmapCodec: Sized {
    fn compress(&self) -> CompressedSubmap;

    fn decompress(compressed: &CompressedSubmap) -> Result<Self, FormatError>;
}

pub type TerrainId = u16;
pub type FurnitureId = u16;

/// A plain 12x12 submap with one terrain and one furniture layer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(C)]
pub struct Submap {
    pub terrain: [TerrainId; SUBMAP_SIZE],
    pub furniture: [FurnitureId; SUBMAP_SIZE],
}

unsafe impl Zeroable for Submap {}
unsafe impl Pod for Submap {}

const_assert_eq!(mem::size_of::<Submap>(), 576);

impl Default for Submap {
    fn default() -> Self {
        Self::filled(0)
    }
}

impl Submap {
    /// A submap with every tile set to `terrain` and no furniture.
    pub fn filled(terrain: TerrainId) -> Self {
        Self {
            terrain: [terrain; SUBMAP_SIZE],
            furniture: [0; SUBMAP_SIZE],
        }
    }

    pub fn terrain_at(&self, p: [u32; 2]) -> TerrainId {
        self.terrain[linearize(p)]
    }

    pub fn set_terrain(&mut self, p: [u32; 2], id: TerrainId) {
        self.terrain[linearize(p)] = id;
    }

    pub fn furniture_at(&self, p: [u32; 2]) -> FurnitureId {
        self.furniture[linearize(p)]
    }

    pub fn set_furniture(&mut self, p: [u32; 2], id: FurnitureId) {
        self.furniture[linearize(p)] = id;
    }

    /// True if every tile has the same terrain and there is no furniture.
    pub fn is_uniform(&self) -> bool {
        let first = self.terrain[0];
        self.terrain.iter().all(|&t| t == first) && self.furniture.iter().all(|&f| f == 0)
    }
}

fn linearize(p: [u32; 2]) -> usize {
    <SubmapShape as ConstShape<2>>::linearize(p) as usize
}

impl SubmapCodec for Submap {
    fn compress(&self) -> CompressedSubmap {
        let mut encoder = FrameEncoder::new(Vec::new());
        encoder
            .write_all(bytes_of(self))
            .expect("writing to a Vec can't fail");
        CompressedSubmap {
            bytes: encoder
                .finish()
                .expect("writing to a Vec can't fail")
                .into_boxed_slice(),
        }
    }

    fn decompress(compressed: &CompressedSubmap) -> Result<Self, FormatError> {
        let mut bytes = Vec::with_capacity(mem::size_of::<Submap>());
        FrameDecoder::new(compressed.bytes.as_ref()).read_to_end(&mut bytes)?;
        if bytes.len() != mem::size_of::<Submap>() {
            return Err(FormatError::Length {
                expected: mem::size_of::<Submap>(),
                actual: bytes.len(),
            });
        }
        let mut submap = Submap::zeroed();
        bytes_of_mut(&mut submap).copy_from_slice(&bytes);
        Ok(submap)
    }
}

/// The opaque serialized form of a submap, as produced by [`SubmapCodec::compress`].
#[derive(Archive, Clone, Deserialize, Debug, Eq, PartialEq, Serialize)]
#[archive(check_bytes)]
pub struct CompressedSubmap {
    pub bytes: Box<[u8]>,
}

const_assert_eq!(
    mem::size_of::<CompressedSubmap>(),
    2 * mem::size_of::<usize>()
);

impl CompressedSubmap {
    pub fn new(bytes: impl Into<Box<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
