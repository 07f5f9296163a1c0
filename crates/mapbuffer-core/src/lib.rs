pub mod archived_buf;

pub use archived_buf::{to_archive_bytes, ArchiveError, ArchivedBuf, ARCHIVE_SCRATCH_SIZE};

use ahash::AHashMap;
pub type SmallKeyHashMap<K, V> = AHashMap<K, V>;

// Re-exports.
pub use glam;
pub use rkyv;
pub use static_assertions;

use rkyv::{
    ser::serializers::{
        AlignedSerializer, AllocScratch, CompositeSerializer, FallbackScratch, HeapScratch,
    },
    AlignedVec, Infallible,
};
pub type NoSharedAllocSerializer<const N: usize> = CompositeSerializer<
    AlignedSerializer<AlignedVec>,
    FallbackScratch<HeapScratch<N>, AllocScratch>,
    Infallible,
>;
