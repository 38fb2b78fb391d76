use std::num::NonZero;

use crate::pooled_allocator::{
    DEFAULT_BUFFER_CAPACITY_IN_BYTES, DEFAULT_LARGE_POOL_BUCKET_COUNT,
    DEFAULT_MAX_POOL_SIZE_IN_BYTES, DEFAULT_NORMAL_POOL_BUCKET_COUNT,
    DEFAULT_POOL_SELECTOR_THRESHOLD_IN_BYTES,
};
use crate::{AllocatorConfig, PooledMemoryAllocator};

/// Builder for creating an instance of [`PooledMemoryAllocator`].
///
/// You only need to use this builder if you want to customize the pooling policy.
/// The default configuration used by [`PooledMemoryAllocator::new()`][1] is sufficient for most
/// use cases, and the `with_*_pooling()` presets cover the common alternatives.
///
/// # Examples
///
/// ```
/// use std::num::NonZero;
///
/// use pooled_memory::PooledMemoryAllocator;
///
/// let allocator = PooledMemoryAllocator::builder()
///     .max_pool_size_in_bytes(NonZero::new(4 * 1024 * 1024).unwrap())
///     .pool_selector_threshold_in_bytes(NonZero::new(256 * 1024).unwrap())
///     .large_pool_bucket_count(2)
///     .build();
///
/// assert_eq!(allocator.config().large_pool_bucket_count(), 2);
/// ```
///
/// [1]: PooledMemoryAllocator::new
#[derive(Debug)]
#[must_use]
pub struct PooledMemoryAllocatorBuilder {
    max_pool_size_in_bytes: NonZero<usize>,
    pool_selector_threshold_in_bytes: NonZero<usize>,
    large_pool_bucket_count: usize,
    normal_pool_bucket_count: usize,
    buffer_capacity_in_bytes: NonZero<usize>,
}

impl PooledMemoryAllocatorBuilder {
    pub(crate) fn new() -> Self {
        Self {
            max_pool_size_in_bytes: DEFAULT_MAX_POOL_SIZE_IN_BYTES,
            pool_selector_threshold_in_bytes: DEFAULT_POOL_SELECTOR_THRESHOLD_IN_BYTES,
            large_pool_bucket_count: DEFAULT_LARGE_POOL_BUCKET_COUNT,
            normal_pool_bucket_count: DEFAULT_NORMAL_POOL_BUCKET_COUNT,
            buffer_capacity_in_bytes: DEFAULT_BUFFER_CAPACITY_IN_BYTES,
        }
    }

    /// Sets the size of the largest request that is served from a pool. Larger requests are
    /// always allocated fresh and released when disposed.
    pub fn max_pool_size_in_bytes(mut self, bytes: NonZero<usize>) -> Self {
        self.max_pool_size_in_bytes = bytes;
        self
    }

    /// Sets the boundary between the normal and the large pool. Requests up to this size are
    /// served from the normal pool.
    pub fn pool_selector_threshold_in_bytes(mut self, bytes: NonZero<usize>) -> Self {
        self.pool_selector_threshold_in_bytes = bytes;
        self
    }

    /// Sets how many blocks of each size class the large pool retains. Zero disables retention
    /// in the large pool.
    pub fn large_pool_bucket_count(mut self, count: usize) -> Self {
        self.large_pool_bucket_count = count;
        self
    }

    /// Sets how many blocks of each size class the normal pool retains. Zero disables
    /// retention in the normal pool.
    pub fn normal_pool_bucket_count(mut self, count: usize) -> Self {
        self.normal_pool_bucket_count = count;
        self
    }

    /// Sets the largest number of bytes a single segment may occupy. Logical buffers larger
    /// than this are split across multiple segments.
    pub fn buffer_capacity_in_bytes(mut self, bytes: NonZero<usize>) -> Self {
        self.buffer_capacity_in_bytes = bytes;
        self
    }

    /// Builds the allocator with the specified configuration.
    ///
    /// # Panics
    ///
    /// Panics if the pool selector threshold is larger than the maximum pool size.
    #[must_use]
    pub fn build(self) -> PooledMemoryAllocator {
        assert!(
            self.pool_selector_threshold_in_bytes <= self.max_pool_size_in_bytes,
            "pool selector threshold ({}) must not exceed the maximum pool size ({})",
            self.pool_selector_threshold_in_bytes,
            self.max_pool_size_in_bytes
        );

        PooledMemoryAllocator::new_inner(AllocatorConfig::new(
            self.max_pool_size_in_bytes,
            self.pool_selector_threshold_in_bytes,
            self.large_pool_bucket_count,
            self.normal_pool_bucket_count,
            self.buffer_capacity_in_bytes,
        ))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use new_zealand::nz;
    use static_assertions::assert_impl_all;

    use super::*;
    use crate::MemoryAllocator;

    assert_impl_all!(PooledMemoryAllocatorBuilder: Send, Sync, std::fmt::Debug);

    #[test]
    fn builder_new_uses_defaults() {
        let builder = PooledMemoryAllocatorBuilder::new();

        assert_eq!(builder.max_pool_size_in_bytes, DEFAULT_MAX_POOL_SIZE_IN_BYTES);
        assert_eq!(
            builder.pool_selector_threshold_in_bytes,
            DEFAULT_POOL_SELECTOR_THRESHOLD_IN_BYTES
        );
        assert_eq!(builder.large_pool_bucket_count, DEFAULT_LARGE_POOL_BUCKET_COUNT);
        assert_eq!(builder.normal_pool_bucket_count, DEFAULT_NORMAL_POOL_BUCKET_COUNT);
        assert_eq!(builder.buffer_capacity_in_bytes, DEFAULT_BUFFER_CAPACITY_IN_BYTES);
    }

    #[test]
    fn settings_flow_into_config() {
        let allocator = PooledMemoryAllocatorBuilder::new()
            .max_pool_size_in_bytes(nz!(2048))
            .pool_selector_threshold_in_bytes(nz!(512))
            .large_pool_bucket_count(1)
            .normal_pool_bucket_count(0)
            .buffer_capacity_in_bytes(nz!(4096))
            .build();

        let config = allocator.config();
        assert_eq!(config.max_pool_size_in_bytes(), 2048);
        assert_eq!(config.pool_selector_threshold_in_bytes(), 512);
        assert_eq!(config.large_pool_bucket_count(), 1);
        assert_eq!(config.normal_pool_bucket_count(), 0);
        assert_eq!(allocator.buffer_capacity_in_bytes(), 4096);
    }

    #[test]
    fn threshold_equal_to_max_is_accepted() {
        let allocator = PooledMemoryAllocatorBuilder::new()
            .max_pool_size_in_bytes(nz!(1024))
            .pool_selector_threshold_in_bytes(nz!(1024))
            .build();

        assert_eq!(allocator.config().pool_selector_threshold_in_bytes(), 1024);
    }

    #[test]
    #[should_panic]
    fn threshold_above_max_panics() {
        let _allocator = PooledMemoryAllocatorBuilder::new()
            .max_pool_size_in_bytes(nz!(1024))
            .pool_selector_threshold_in_bytes(nz!(2048))
            .build();
    }
}
