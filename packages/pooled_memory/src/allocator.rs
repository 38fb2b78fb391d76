use std::fmt;

use crate::block::GRANULE_SIZE;
use crate::{AllocationOptions, ByteSegment, Element, Error, Result, Segment};

/// A policy for obtaining [`Segment`]s of memory.
///
/// Two policies are provided:
///
/// * [`PooledMemoryAllocator`][crate::PooledMemoryAllocator] rents blocks from a two-tier pool
///   and gives them back when the segments are disposed.
/// * [`UnpooledMemoryAllocator`][crate::UnpooledMemoryAllocator] allocates fresh memory for every
///   request and never retains anything.
///
/// Logical buffers larger than one segment are built on top of an allocator by
/// [`OwnedGroup::allocate()`][crate::OwnedGroup::allocate], which uses
/// [`buffer_capacity_in_bytes()`][Self::buffer_capacity_in_bytes] to decide how many elements go
/// into each segment.
pub trait MemoryAllocator: fmt::Debug + Send + Sync {
    /// The largest number of bytes a single segment may occupy.
    #[must_use]
    fn buffer_capacity_in_bytes(&self) -> usize;

    /// Allocates a segment of exactly `length` elements.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAllocationRequest`] if `T` is zero-sized or aligned to more than
    /// 64 bytes, if `length * size_of::<T>()` overflows, or if it exceeds
    /// [`buffer_capacity_in_bytes()`][Self::buffer_capacity_in_bytes]. No memory is touched in
    /// that case.
    fn allocate<T: Element>(&self, length: usize, options: AllocationOptions)
    -> Result<Segment<T>>;

    /// Allocates a segment of exactly `length` raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAllocationRequest`] if `length` exceeds
    /// [`buffer_capacity_in_bytes()`][Self::buffer_capacity_in_bytes].
    fn allocate_byte_buffer(
        &self,
        length: usize,
        options: AllocationOptions,
    ) -> Result<ByteSegment> {
        self.allocate::<u8>(length, options)
    }

    /// Releases any memory the allocator retains for reuse.
    ///
    /// Segments that are still alive are not affected. When they are disposed, their memory is
    /// released instead of being retained.
    ///
    /// Must not race with concurrent allocations or disposals of segments from this allocator.
    fn release_retained_resources(&self) {}
}

/// Validates an allocation request of `length` elements of `T` against the segment capacity of
/// an allocator, returning the size of the request in bytes.
pub(crate) fn checked_byte_length<T: Element>(
    length: usize,
    buffer_capacity_in_bytes: usize,
) -> Result<usize> {
    let element_size = size_of::<T>();

    if element_size == 0 {
        return Err(Error::invalid_allocation::<T>(
            length,
            "zero-sized element types cannot be allocated",
        ));
    }

    if align_of::<T>() > GRANULE_SIZE {
        return Err(Error::invalid_allocation::<T>(
            length,
            format!("element alignment exceeds the supported maximum of {GRANULE_SIZE} bytes"),
        ));
    }

    let byte_length = length.checked_mul(element_size).ok_or_else(|| {
        Error::invalid_allocation::<T>(length, "the size in bytes overflows usize")
    })?;

    if byte_length > buffer_capacity_in_bytes {
        return Err(Error::invalid_allocation::<T>(
            length,
            format!(
                "{byte_length} bytes exceeds the buffer capacity of {buffer_capacity_in_bytes} bytes"
            ),
        ));
    }

    Ok(byte_length)
}
