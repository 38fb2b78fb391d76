use std::fmt;
use std::ptr::NonNull;

use bytemuck::{Pod, Zeroable};

/// Size in bytes of the allocation granule. Every block is a whole number of granules.
pub(crate) const GRANULE_SIZE: usize = 64;

/// Unit of backing storage. The alignment is what makes a block usable for every supported
/// element type, so blocks are always allocated as whole granules.
#[derive(Clone, Copy)]
#[repr(C, align(64))]
struct Granule([u8; GRANULE_SIZE]);

// SAFETY: The granule is a byte array whose size equals its alignment, so it has no padding
// and the all-zero bit pattern is valid.
unsafe impl Zeroable for Granule {}

// SAFETY: As above, no padding and every bit pattern of a byte array is valid. The type is
// `Copy` and `'static`.
unsafe impl Pod for Granule {}

/// A heap block of contiguous, 64-byte aligned memory.
///
/// The storage never moves for as long as the block exists, even if the `Block` value itself is
/// moved, which is what allows segments to hand out stable addresses without a pin step.
pub(crate) struct Block {
    granules: Box<[Granule]>,
}

impl Block {
    /// Allocates a zero-filled block with room for at least `capacity_in_bytes` bytes.
    #[must_use]
    pub(crate) fn zeroed(capacity_in_bytes: usize) -> Self {
        let granule_count = capacity_in_bytes.div_ceil(GRANULE_SIZE);

        Self {
            granules: bytemuck::allocation::zeroed_slice_box(granule_count),
        }
    }

    #[must_use]
    pub(crate) fn capacity_in_bytes(&self) -> usize {
        self.granules
            .len()
            .checked_mul(GRANULE_SIZE)
            .expect("an existing block cannot be larger than the virtual address space")
    }

    #[must_use]
    pub(crate) fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.granules)
    }

    #[must_use]
    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.granules)
    }

    /// Address of the first byte of the block. Stays the same for the lifetime of the block.
    #[must_use]
    pub(crate) fn address(&self) -> NonNull<u8> {
        NonNull::from(self.bytes()).cast()
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("capacity_in_bytes", &self.capacity_in_bytes())
            .field("address", &self.address())
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Block: Send, Sync);

    #[test]
    fn capacity_rounds_up_to_granule() {
        assert_eq!(Block::zeroed(1).capacity_in_bytes(), GRANULE_SIZE);
        assert_eq!(Block::zeroed(64).capacity_in_bytes(), 64);
        assert_eq!(Block::zeroed(65).capacity_in_bytes(), 128);
    }

    #[test]
    fn empty_block_has_no_bytes() {
        let block = Block::zeroed(0);

        assert_eq!(block.capacity_in_bytes(), 0);
        assert!(block.bytes().is_empty());
    }

    #[test]
    fn fresh_block_is_zeroed() {
        let block = Block::zeroed(1000);

        assert!(block.bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn address_is_aligned_and_stable_across_moves() {
        let mut block = Block::zeroed(256);
        block.bytes_mut()[3] = 0xAB;
        let address = block.address();

        assert_eq!(address.as_ptr() as usize % GRANULE_SIZE, 0);

        let moved = vec![block];
        assert_eq!(moved[0].address(), address);
        assert_eq!(moved[0].bytes()[3], 0xAB);
    }
}
