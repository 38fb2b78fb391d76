use parking_lot::Mutex;

use crate::block::{Block, GRANULE_SIZE};

/// A pool of reusable blocks, bucketed by power-of-two size classes.
///
/// Bucket `i` holds blocks of exactly `GRANULE_SIZE << i` bytes. A request is served from the
/// smallest bucket whose blocks are large enough, so a rented block may be larger than asked for.
/// Only buckets for requests between `min_block_bytes` and `max_block_bytes` exist; requests
/// outside that range bypass the pool entirely.
///
/// Each bucket retains at most `max_blocks_per_bucket` returned blocks; anything returned to a
/// full bucket is released to the system. This bounds the worst-case memory retained by the pool
/// at roughly `max_blocks_per_bucket` times the sum of all bucket sizes.
///
/// Renting and returning are safe from any number of threads concurrently.
#[derive(Debug)]
pub(crate) struct BlockPool {
    min_block_bytes: usize,
    max_block_bytes: usize,

    /// The size class of the first entry in `buckets`.
    first_bucket_index: usize,

    buckets: Box<[Bucket]>,
}

#[derive(Debug)]
struct Bucket {
    block_bytes: usize,
    max_retained: usize,
    retained: Mutex<Vec<Block>>,
}

impl BlockPool {
    /// # Panics
    ///
    /// Panics if `max_block_bytes` is zero.
    #[must_use]
    pub(crate) fn new(
        min_block_bytes: usize,
        max_block_bytes: usize,
        max_blocks_per_bucket: usize,
    ) -> Self {
        assert!(max_block_bytes > 0, "BlockPool must pool blocks of non-zero size");

        let first_bucket_index = bucket_index_for(min_block_bytes);

        let buckets = (first_bucket_index..=bucket_index_for(max_block_bytes))
            .map(|index| Bucket {
                block_bytes: bucket_block_bytes(index),
                max_retained: max_blocks_per_bucket,
                retained: Mutex::new(Vec::new()),
            })
            .collect();

        Self {
            min_block_bytes,
            max_block_bytes,
            first_bucket_index,
            buckets,
        }
    }

    /// Rents a block of at least `bytes` bytes.
    ///
    /// Returns the index of the bucket the block belongs to, or `None` if the block was not
    /// sized by the pool and must not be given back to it.
    #[must_use]
    pub(crate) fn rent(&self, bytes: usize) -> (Block, Option<usize>) {
        if bytes == 0 || bytes < self.min_block_bytes || bytes > self.max_block_bytes {
            return (Block::zeroed(bytes), None);
        }

        let index = bucket_index_for(bytes);
        let bucket = self
            .bucket(index)
            .expect("buckets are derived from the block size range, which bounds bytes");

        let block = bucket
            .retained
            .lock()
            .pop()
            .unwrap_or_else(|| Block::zeroed(bucket.block_bytes));

        (block, Some(index))
    }

    /// Gives a block previously rented from this pool back for reuse.
    ///
    /// Returns whether the pool retained the block. Blocks that do not fit the bucket or that
    /// would overflow the bucket's retention limit are dropped.
    pub(crate) fn give_back(&self, bucket_index: usize, block: Block) -> bool {
        let Some(bucket) = self.bucket(bucket_index) else {
            return false;
        };

        if block.capacity_in_bytes() != bucket.block_bytes {
            return false;
        }

        let mut retained = bucket.retained.lock();

        if retained.len() >= bucket.max_retained {
            return false;
        }

        retained.push(block);
        true
    }

    /// Number of bytes currently held by the pool for reuse.
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Diagnostic only; pool behavior does not depend on it.
    pub(crate) fn retained_bytes(&self) -> usize {
        self.buckets
            .iter()
            .map(|bucket| {
                bucket
                    .retained
                    .lock()
                    .len()
                    .saturating_mul(bucket.block_bytes)
            })
            .fold(0, usize::saturating_add)
    }

    #[must_use]
    pub(crate) fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn bucket(&self, index: usize) -> Option<&Bucket> {
        index
            .checked_sub(self.first_bucket_index)
            .and_then(|offset| self.buckets.get(offset))
    }
}

fn bucket_block_bytes(index: usize) -> usize {
    u32::try_from(index)
        .ok()
        .and_then(|shift| GRANULE_SIZE.checked_shl(shift))
        .expect("bucket sizes are bounded by the largest pooled block, which fits in usize")
}

/// The smallest bucket whose blocks can hold `bytes` bytes.
fn bucket_index_for(bytes: usize) -> usize {
    let granules = bytes.div_ceil(GRANULE_SIZE).max(1);

    granules
        .checked_next_power_of_two()
        .map(|power| power.trailing_zeros() as usize)
        .expect("a request that fits in memory has a power-of-two granule count that fits too")
}
