use crate::submap::SUBMAP_EDGE_LENGTH;
use crate::units::{SubmapUnits, TileUnits};

use mapbuffer_core::glam::IVec3;
use rkyv::{Archive, Deserialize, Serialize};

/// The absolute position of a submap, in submap units.
///
/// This is the only coordinate type accepted by the [`MapBuffer`](crate::MapBuffer). Anything that converts into it
/// (`IVec3`, `[i32; 3]`, `(i32, i32, i32)`, [`SubmapUnits<IVec3>`]) can be passed wherever an `impl Into<SubmapCoord>` is
/// taken.
///
/// Ordered lexicographically by `(x, y, z)`.
#[derive(
    Archive, Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize,
)]
#[archive(check_bytes)]
#[archive_attr(derive(Debug, Eq, Hash, PartialEq, PartialOrd, Ord))]
pub struct SubmapCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl SubmapCoord {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The region containing this submap. `x` and `y` are floor-divided by `region_size`; `z` is kept, since vertical
    /// levels are never batched together.
    ///
    /// `region_size` must be positive.
    pub fn region(self, region_size: i32) -> RegionCoord {
        RegionCoord::new(
            self.x.div_euclid(region_size),
            self.y.div_euclid(region_size),
            self.z,
        )
    }

    /// Returns the submap that contains tile `p`.
    pub fn containing_tile(p: TileUnits<IVec3>) -> Self {
        let p = p.into_inner();
        Self::new(
            p.x.div_euclid(SUBMAP_EDGE_LENGTH),
            p.y.div_euclid(SUBMAP_EDGE_LENGTH),
            p.z,
        )
    }

    /// The tile at the minimum corner of this submap.
    pub fn min_tile(self) -> TileUnits<IVec3> {
        TileUnits(IVec3::new(
            self.x * SUBMAP_EDGE_LENGTH,
            self.y * SUBMAP_EDGE_LENGTH,
            self.z,
        ))
    }

    pub fn as_ivec3(self) -> IVec3 {
        IVec3::new(self.x, self.y, self.z)
    }
}

impl From<IVec3> for SubmapCoord {
    fn from(p: IVec3) -> Self {
        Self::new(p.x, p.y, p.z)
    }
}

impl From<SubmapUnits<IVec3>> for SubmapCoord {
    fn from(p: SubmapUnits<IVec3>) -> Self {
        p.into_inner().into()
    }
}

impl From<[i32; 3]> for SubmapCoord {
    fn from([x, y, z]: [i32; 3]) -> Self {
        Self::new(x, y, z)
    }
}

impl From<(i32, i32, i32)> for SubmapCoord {
    fn from((x, y, z): (i32, i32, i32)) -> Self {
        Self::new(x, y, z)
    }
}

impl From<SubmapCoord> for IVec3 {
    fn from(c: SubmapCoord) -> Self {
        c.as_ivec3()
    }
}

/// A coarse block of `region_size x region_size` submaps (on the x/y plane) that is read and written as one storage unit.
///
/// Regions are a pure function of [`SubmapCoord`]; nothing remembers which submaps belong to which region.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct RegionCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl RegionCoord {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn contains(self, submap: SubmapCoord, region_size: i32) -> bool {
        submap.region(region_size) == self
    }

    /// The member submap with the smallest `x` and `y`.
    pub fn min_submap(self, region_size: i32) -> SubmapCoord {
        SubmapCoord::new(self.x * region_size, self.y * region_size, self.z)
    }

    /// We implement this manually so we have control over the [`Ord`] as interpreted by [`sled`].
    ///
    /// 12 bytes total per key, 4 per component. Flipping the sign bit makes big-endian byte order agree with signed
    /// integer order.
    pub fn into_sled_key(self) -> [u8; 12] {
        let mut bytes = [0; 12];
        for (i, c) in [self.x, self.y, self.z].into_iter().enumerate() {
            bytes[4 * i..4 * (i + 1)].copy_from_slice(&flip_sign(c).to_be_bytes());
        }
        bytes
    }

    /// Returns `None` if `bytes` is not a 12-byte key.
    pub fn from_sled_key(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 12 {
            return None;
        }
        let mut components = [0; 3];
        for (i, c) in components.iter_mut().enumerate() {
            let mut word = [0; 4];
            word.copy_from_slice(&bytes[4 * i..4 * (i + 1)]);
            *c = (u32::from_be_bytes(word) ^ SIGN_BIT) as i32;
        }
        let [x, y, z] = components;
        Some(Self::new(x, y, z))
    }
}

const SIGN_BIT: u32 = 1 << 31;

fn flip_sign(c: i32) -> u32 {
    (c as u32) ^ SIGN_BIT
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
