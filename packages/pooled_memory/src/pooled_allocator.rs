use std::num::NonZero;
use std::sync::Arc;

use arc_swap::ArcSwap;
use new_zealand::nz;
use tracing::debug;

use crate::allocator::checked_byte_length;
use crate::tiers::{PoolRegistry, PoolReturn, PoolTiers};
use crate::{
    AllocationOptions, Element, MemoryAllocator, PooledMemoryAllocatorBuilder, Result, Segment,
};

pub(crate) const DEFAULT_MAX_POOL_SIZE_IN_BYTES: NonZero<usize> = nz!(25_165_824);
pub(crate) const DEFAULT_POOL_SELECTOR_THRESHOLD_IN_BYTES: NonZero<usize> = nz!(8_388_608);
pub(crate) const DEFAULT_LARGE_POOL_BUCKET_COUNT: usize = 6;
pub(crate) const DEFAULT_NORMAL_POOL_BUCKET_COUNT: usize = 16;

/// A quarter of the largest 32-bit signed length, which keeps every segment addressable by
/// collaborators that index with 32-bit integers.
pub(crate) const DEFAULT_BUFFER_CAPACITY_IN_BYTES: NonZero<usize> = nz!(536_870_911);

/// The effective settings of a [`PooledMemoryAllocator`]. Immutable once the allocator exists.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AllocatorConfig {
    max_pool_size_in_bytes: usize,
    pool_selector_threshold_in_bytes: usize,
    large_pool_bucket_count: usize,
    normal_pool_bucket_count: usize,
    buffer_capacity_in_bytes: usize,
}

impl AllocatorConfig {
    #[must_use]
    pub(crate) fn new(
        max_pool_size_in_bytes: NonZero<usize>,
        pool_selector_threshold_in_bytes: NonZero<usize>,
        large_pool_bucket_count: usize,
        normal_pool_bucket_count: usize,
        buffer_capacity_in_bytes: NonZero<usize>,
    ) -> Self {
        Self {
            max_pool_size_in_bytes: max_pool_size_in_bytes.get(),
            pool_selector_threshold_in_bytes: pool_selector_threshold_in_bytes.get(),
            large_pool_bucket_count,
            normal_pool_bucket_count,
            buffer_capacity_in_bytes: buffer_capacity_in_bytes.get(),
        }
    }

    /// Requests larger than this many bytes are never pooled.
    #[must_use]
    pub fn max_pool_size_in_bytes(&self) -> usize {
        self.max_pool_size_in_bytes
    }

    /// Requests up to this many bytes are served by the normal pool, larger ones by the
    /// large pool.
    #[must_use]
    pub fn pool_selector_threshold_in_bytes(&self) -> usize {
        self.pool_selector_threshold_in_bytes
    }

    /// How many blocks of each size class the large pool retains.
    #[must_use]
    pub fn large_pool_bucket_count(&self) -> usize {
        self.large_pool_bucket_count
    }

    /// How many blocks of each size class the normal pool retains.
    #[must_use]
    pub fn normal_pool_bucket_count(&self) -> usize {
        self.normal_pool_bucket_count
    }

    /// The largest number of bytes a single segment may occupy.
    #[must_use]
    pub fn buffer_capacity_in_bytes(&self) -> usize {
        self.buffer_capacity_in_bytes
    }
}

/// A [`MemoryAllocator`] that reuses memory through two pools.
///
/// Requests up to the pool selector threshold are served from the *normal* pool, larger ones
/// from the *large* pool. Keeping large blocks apart, with their own (typically much lower)
/// retention limit, bounds the memory the allocator can hold on to. Requests larger than the
/// maximum pool size are never pooled.
///
/// Segments return their memory to the pool when disposed. [`release_retained_resources()`][1]
/// replaces both pools with empty ones; segments rented from the replaced pools release their
/// memory to the system when disposed.
///
/// The allocator is thread-safe and can be shared freely: renting and returning memory from
/// many threads at once is supported.
///
/// # Examples
///
/// ```
/// use pooled_memory::{AllocationOptions, MemoryAllocator, PooledMemoryAllocator};
///
/// let allocator = PooledMemoryAllocator::new();
///
/// let segment = allocator.allocate::<f32>(1000, AllocationOptions::None).unwrap();
/// assert_eq!(segment.len(), 1000);
///
/// drop(segment);
/// assert!(allocator.retained_bytes() >= 4000);
///
/// allocator.release_retained_resources();
/// assert_eq!(allocator.retained_bytes(), 0);
/// ```
///
/// [1]: MemoryAllocator::release_retained_resources
#[derive(Debug)]
pub struct PooledMemoryAllocator {
    config: AllocatorConfig,

    /// The current pool generation. The allocator holds the only strong reference, so its pools
    /// are released together with it. Segments refer to it weakly to find their way back.
    registry: Arc<PoolRegistry>,
}

impl PooledMemoryAllocator {
    /// Creates an allocator with the default configuration: pooled blocks up to 24 MiB, a
    /// selector threshold of 8 MiB, 16 retained blocks per size class in the normal pool and 6
    /// in the large pool.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts building a new [`PooledMemoryAllocator`] with a custom configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::num::NonZero;
    ///
    /// use pooled_memory::{MemoryAllocator, PooledMemoryAllocator};
    ///
    /// let allocator = PooledMemoryAllocator::builder()
    ///     .buffer_capacity_in_bytes(NonZero::new(1024).unwrap())
    ///     .build();
    ///
    /// assert_eq!(allocator.buffer_capacity_in_bytes(), 1024);
    /// ```
    pub fn builder() -> PooledMemoryAllocatorBuilder {
        PooledMemoryAllocatorBuilder::new()
    }

    /// An allocator that retains very little memory: blocks up to 64 KiB, selector threshold
    /// 32 KiB, 8 blocks per large size class and 24 per normal size class.
    #[must_use]
    pub fn with_minimal_pooling() -> Self {
        Self::preset(nz!(65_536), nz!(32_768), 8, 24)
    }

    /// An allocator for moderate reuse: blocks up to 1 MiB, selector threshold 32 KiB, 16
    /// blocks per large size class and 24 per normal size class.
    #[must_use]
    pub fn with_moderate_pooling() -> Self {
        Self::preset(nz!(1_048_576), nz!(32_768), 16, 24)
    }

    /// An allocator that retains a lot of memory for maximum reuse: blocks up to 128 MiB,
    /// selector threshold 32 MiB, 16 blocks per large size class and 32 per normal size class.
    #[must_use]
    pub fn with_aggressive_pooling() -> Self {
        Self::preset(nz!(134_217_728), nz!(33_554_432), 16, 32)
    }

    fn preset(
        max_pool_size_in_bytes: NonZero<usize>,
        pool_selector_threshold_in_bytes: NonZero<usize>,
        large_pool_bucket_count: usize,
        normal_pool_bucket_count: usize,
    ) -> Self {
        Self::builder()
            .max_pool_size_in_bytes(max_pool_size_in_bytes)
            .pool_selector_threshold_in_bytes(pool_selector_threshold_in_bytes)
            .large_pool_bucket_count(large_pool_bucket_count)
            .normal_pool_bucket_count(normal_pool_bucket_count)
            .build()
    }

    #[must_use]
    pub(crate) fn new_inner(config: AllocatorConfig) -> Self {
        debug!(?config, "creating pooled memory allocator");

        Self {
            config,
            registry: Arc::new(ArcSwap::from_pointee(PoolTiers::new(0, &config))),
        }
    }

    /// The effective configuration of the allocator.
    #[must_use]
    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Number of bytes currently retained by both pools for reuse.
    #[must_use]
    pub fn retained_bytes(&self) -> usize {
        self.registry.load().retained_bytes()
    }

    /// The current pool generation. Starts at zero and is incremented by every call to
    /// [`release_retained_resources()`][MemoryAllocator::release_retained_resources].
    #[must_use]
    pub fn pool_generation(&self) -> u64 {
        self.registry.load().generation()
    }
}

impl Default for PooledMemoryAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAllocator for PooledMemoryAllocator {
    fn buffer_capacity_in_bytes(&self) -> usize {
        self.config.buffer_capacity_in_bytes
    }

    fn allocate<T: Element>(
        &self,
        length: usize,
        options: AllocationOptions,
    ) -> Result<Segment<T>> {
        let byte_length = checked_byte_length::<T>(length, self.config.buffer_capacity_in_bytes)?;

        let (block, token) = self.registry.load().rent(byte_length);
        let origin = token.map(|token| PoolReturn::new(&self.registry, token));

        let mut segment = Segment::new(block, length, origin);

        if options.is_clean() {
            segment.zero_fill();
        }

        Ok(segment)
    }

    fn release_retained_resources(&self) {
        let previous = self.registry.load_full();

        let generation = previous
            .generation()
            .checked_add(1)
            .expect("pool generation counter cannot realistically overflow a u64");

        self.registry
            .store(Arc::new(PoolTiers::new(generation, &self.config)));

        debug!(
            previous_generation = previous.generation(),
            released_bytes = previous.retained_bytes(),
            generation,
            "released retained pool memory"
        );
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    #![allow(
        clippy::indexing_slicing,
        reason = "we do not need to worry about these things when writing test code"
    )]

    use std::sync::Arc;
    use std::thread;

    use static_assertions::assert_impl_all;

    use super::*;
    use crate::Error;

    assert_impl_all!(PooledMemoryAllocator: Send, Sync, std::fmt::Debug);

    fn small_allocator() -> PooledMemoryAllocator {
        PooledMemoryAllocator::builder()
            .max_pool_size_in_bytes(nz!(65_536))
            .pool_selector_threshold_in_bytes(nz!(4096))
            .buffer_capacity_in_bytes(nz!(1_048_576))
            .build()
    }

    #[test]
    fn default_configuration() {
        let allocator = PooledMemoryAllocator::new();
        let config = allocator.config();

        assert_eq!(config.max_pool_size_in_bytes(), 24 * 1024 * 1024);
        assert_eq!(config.pool_selector_threshold_in_bytes(), 8 * 1024 * 1024);
        assert_eq!(config.large_pool_bucket_count(), 6);
        assert_eq!(config.normal_pool_bucket_count(), 16);
        assert_eq!(allocator.buffer_capacity_in_bytes(), 536_870_911);
        assert_eq!(allocator.pool_generation(), 0);
    }

    #[test]
    fn presets() {
        let minimal = PooledMemoryAllocator::with_minimal_pooling();
        assert_eq!(minimal.config().max_pool_size_in_bytes(), 64 * 1024);
        assert_eq!(minimal.config().pool_selector_threshold_in_bytes(), 32 * 1024);

        let moderate = PooledMemoryAllocator::with_moderate_pooling();
        assert_eq!(moderate.config().max_pool_size_in_bytes(), 1024 * 1024);
        assert_eq!(moderate.config().large_pool_bucket_count(), 16);

        let aggressive = PooledMemoryAllocator::with_aggressive_pooling();
        assert_eq!(aggressive.config().max_pool_size_in_bytes(), 128 * 1024 * 1024);
        assert_eq!(aggressive.config().normal_pool_bucket_count(), 32);
    }

    #[test]
    fn allocate_has_exact_length() {
        let allocator = small_allocator();

        for length in [0, 1, 15, 16, 17, 1000, 4096, 100_000] {
            let segment = allocator.allocate::<u32>(length, AllocationOptions::None).unwrap();
            assert_eq!(segment.span().unwrap().len(), length);
        }
    }

    #[test]
    fn clean_allocation_is_zeroed_even_when_reused() {
        let allocator = small_allocator();

        let mut dirty = allocator.allocate::<u8>(100, AllocationOptions::None).unwrap();
        dirty.span_mut().unwrap().fill(0xFF);
        drop(dirty);

        let clean = allocator.allocate::<u8>(100, AllocationOptions::Clean).unwrap();
        assert!(clean.span().unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn unclean_allocation_reuses_previous_contents() {
        let allocator = small_allocator();

        let mut first = allocator.allocate::<u8>(100, AllocationOptions::None).unwrap();
        first.span_mut().unwrap()[0] = 0x5A;
        drop(first);

        let second = allocator.allocate::<u8>(100, AllocationOptions::None).unwrap();
        assert_eq!(second.span().unwrap()[0], 0x5A);
    }

    #[test]
    fn exceeding_buffer_capacity_fails() {
        let allocator = PooledMemoryAllocator::builder()
            .buffer_capacity_in_bytes(nz!(1024))
            .build();

        assert!(allocator.allocate::<u32>(256, AllocationOptions::None).is_ok());
        assert!(matches!(
            allocator.allocate::<u32>(257, AllocationOptions::None),
            Err(Error::InvalidAllocationRequest { .. })
        ));
    }

    #[test]
    fn byte_buffer_allocation() {
        let allocator = small_allocator();

        let bytes = allocator
            .allocate_byte_buffer(33, AllocationOptions::Clean)
            .unwrap();

        assert_eq!(bytes.span().unwrap(), &[0_u8; 33]);
    }

    #[test]
    fn disposed_segments_are_retained() {
        let allocator = small_allocator();

        let mut segment = allocator.allocate::<u8>(3000, AllocationOptions::None).unwrap();
        assert_eq!(allocator.retained_bytes(), 0);

        segment.dispose();
        assert_eq!(allocator.retained_bytes(), 4096);
    }

    #[test]
    fn large_requests_use_large_tier_and_oversized_are_not_retained() {
        let allocator = small_allocator();

        drop(allocator.allocate::<u8>(10_000, AllocationOptions::None).unwrap());
        assert_eq!(allocator.retained_bytes(), 16 * 1024);

        drop(allocator.allocate::<u8>(100_000, AllocationOptions::None).unwrap());
        assert_eq!(allocator.retained_bytes(), 16 * 1024);
    }

    #[test]
    fn release_retained_resources_starts_new_generation() {
        let allocator = small_allocator();

        drop(allocator.allocate::<u8>(100, AllocationOptions::None).unwrap());
        assert!(allocator.retained_bytes() > 0);

        let outstanding = allocator.allocate::<u8>(100, AllocationOptions::None).unwrap();

        allocator.release_retained_resources();
        assert_eq!(allocator.retained_bytes(), 0);
        assert_eq!(allocator.pool_generation(), 1);

        // Outstanding segments stay fully usable but no longer feed the new pools.
        assert_eq!(outstanding.span().unwrap().len(), 100);
        drop(outstanding);
        assert_eq!(allocator.retained_bytes(), 0);

        // New rentals feed the new pools as usual.
        drop(allocator.allocate::<u8>(100, AllocationOptions::None).unwrap());
        assert!(allocator.retained_bytes() > 0);
    }

    #[test]
    fn concurrent_allocate_and_dispose() {
        let allocator = Arc::new(small_allocator());

        let workers = (0..8)
            .map(|worker| {
                let allocator = Arc::clone(&allocator);

                thread::spawn(move || {
                    for round in 0..100_usize {
                        let length = 1 + (worker * 131 + round * 17) % 5000;
                        let mut segment = allocator
                            .allocate::<u16>(length, AllocationOptions::Clean)
                            .unwrap();

                        let span = segment.span_mut().unwrap();
                        assert!(span.iter().all(|&x| x == 0));
                        span.fill(u16::try_from(worker).unwrap());
                    }
                })
            })
            .collect::<Vec<_>>();

        for worker in workers {
            worker.join().unwrap();
        }

        assert!(allocator.retained_bytes() > 0);
    }
}
