use crate::NoSharedAllocSerializer;

use rkyv::ser::Serializer;
use rkyv::validation::validators::DefaultValidator;
use rkyv::{
    archived_root, check_archived_root, AlignedVec, Archive, Archived, CheckBytes, Deserialize,
    Infallible, Serialize,
};
use std::marker::PhantomData;
use thiserror::Error;

/// Scratch space reserved on the stack before the serializer falls back to the heap.
pub const ARCHIVE_SCRATCH_SIZE: usize = 4096;

#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{0}")]
pub struct ArchiveError(pub String);

/// Serializes `value` into an aligned archive.
pub fn to_archive_bytes<T>(value: &T) -> Result<AlignedVec, ArchiveError>
where
    T: Serialize<NoSharedAllocSerializer<ARCHIVE_SCRATCH_SIZE>>,
{
    let mut serializer = NoSharedAllocSerializer::<ARCHIVE_SCRATCH_SIZE>::default();
    serializer
        .serialize_value(value)
        .map_err(|e| ArchiveError(format!("{:?}", e)))?;
    Ok(serializer.into_serializer().into_inner())
}

/// An aligned byte buffer that is known to hold a valid [`Archived<T>`].
///
/// Bytes coming out of a store (`sled::IVec`, `Vec<u8>`) have no alignment guarantee, so they are copied into an
/// [`AlignedVec`] and validated once on construction. After that, accessing the archive is free.
///
/// Note: While not unsafe, this is not intended to be used with structures that utilize shared memory like `Rc` and `Arc`.
#[derive(Clone)]
pub struct ArchivedBuf<T> {
    bytes: AlignedVec,
    marker: PhantomData<T>,
}

impl<T> ArchivedBuf<T>
where
    T: Archive,
    T::Archived: for<'a> CheckBytes<DefaultValidator<'a>>,
{
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArchiveError> {
        let mut aligned = AlignedVec::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        check_archived_root::<T>(&aligned).map_err(|e| ArchiveError(e.to_string()))?;
        Ok(Self {
            bytes: aligned,
            marker: PhantomData,
        })
    }
}

impl<T> ArchivedBuf<T>
where
    T: Archive,
{
    pub fn deserialize(&self) -> T
    where
        T::Archived: Deserialize<T, Infallible>,
    {
        self.as_ref().deserialize(&mut Infallible).unwrap()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl<T> AsRef<Archived<T>> for ArchivedBuf<T>
where
    T: Archive,
{
    fn as_ref(&self) -> &Archived<T> {
        // SAFETY: the bytes were validated by `check_archived_root` in `from_bytes`, and they are never mutated.
        unsafe { archived_root::<T>(&self.bytes) }
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
