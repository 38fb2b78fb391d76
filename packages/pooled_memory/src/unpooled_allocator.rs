use crate::allocator::checked_byte_length;
use crate::block::Block;
use crate::{AllocationOptions, Element, MemoryAllocator, Result, Segment};

/// A [`MemoryAllocator`] that allocates fresh, zero-filled memory for every request and never
/// retains anything.
///
/// It reports an effectively unbounded buffer capacity, so logical buffers allocated through it
/// always consist of a single segment.
///
/// # Examples
///
/// ```
/// use pooled_memory::{
///     AllocationOptions, MemoryAllocator, MemoryGroup, OwnedGroup, UnpooledMemoryAllocator,
/// };
///
/// let allocator = UnpooledMemoryAllocator::new();
/// let group = OwnedGroup::<u64>::allocate(&allocator, 1_000_000, AllocationOptions::None).unwrap();
///
/// assert_eq!(group.count().unwrap(), 1);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct UnpooledMemoryAllocator {
    _private: (),
}

impl UnpooledMemoryAllocator {
    /// Creates a new [`UnpooledMemoryAllocator`].
    #[must_use]
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl MemoryAllocator for UnpooledMemoryAllocator {
    fn buffer_capacity_in_bytes(&self) -> usize {
        isize::MAX.unsigned_abs()
    }

    fn allocate<T: Element>(
        &self,
        length: usize,
        // Fresh memory is always zero-filled, which satisfies every option.
        _options: AllocationOptions,
    ) -> Result<Segment<T>> {
        let byte_length = checked_byte_length::<T>(length, self.buffer_capacity_in_bytes())?;

        Ok(Segment::new(Block::zeroed(byte_length), length, None))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;
    use crate::Error;

    assert_impl_all!(UnpooledMemoryAllocator: Send, Sync, Copy, std::fmt::Debug);

    #[test]
    fn reports_unbounded_capacity() {
        assert_eq!(
            UnpooledMemoryAllocator::new().buffer_capacity_in_bytes(),
            isize::MAX.unsigned_abs()
        );
    }

    #[test]
    fn allocations_are_zeroed() {
        let allocator = UnpooledMemoryAllocator::new();

        let segment = allocator.allocate::<u64>(100, AllocationOptions::None).unwrap();

        assert_eq!(segment.len(), 100);
        assert!(segment.span().unwrap().iter().all(|&x| x == 0));
    }

    #[test]
    fn overflowing_request_fails() {
        let allocator = UnpooledMemoryAllocator::new();

        assert!(matches!(
            allocator.allocate::<u64>(usize::MAX, AllocationOptions::None),
            Err(Error::InvalidAllocationRequest { .. })
        ));
    }

    #[test]
    fn release_retained_resources_is_noop() {
        let allocator = UnpooledMemoryAllocator::new();
        let segment = allocator.allocate::<u8>(10, AllocationOptions::None).unwrap();

        allocator.release_retained_resources();

        assert_eq!(segment.span().unwrap().len(), 10);
    }
}
