use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use tracing::trace;

use crate::AllocatorConfig;
use crate::block::Block;
use crate::block_pool::BlockPool;

/// Which of the two pools of an allocator generation a block came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Tier {
    /// Blocks up to the pool selector threshold.
    Normal,

    /// Blocks above the pool selector threshold, up to the maximum pooled size.
    Large,
}

/// Identifies where a rented block must be given back to.
///
/// The token does not keep any pool alive. It is resolved against whatever pool generation is
/// current at the time the block is given back; if that is no longer the generation the block
/// was rented from, the block is simply released.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct PoolToken {
    generation: u64,
    tier: Tier,
    bucket_index: usize,
}

/// One generation of the two pools of a pooled allocator.
#[derive(Debug)]
pub(crate) struct PoolTiers {
    generation: u64,
    pool_selector_threshold_in_bytes: usize,
    normal: BlockPool,
    large: BlockPool,
}

/// The current pool generation of an allocator. Owned by the allocator; segments that still have
/// a block to give back only refer to it weakly.
pub(crate) type PoolRegistry = ArcSwap<PoolTiers>;

impl PoolTiers {
    #[must_use]
    pub(crate) fn new(generation: u64, config: &AllocatorConfig) -> Self {
        Self {
            generation,
            pool_selector_threshold_in_bytes: config.pool_selector_threshold_in_bytes(),
            normal: BlockPool::new(
                1,
                config.pool_selector_threshold_in_bytes(),
                config.normal_pool_bucket_count(),
            ),
            large: BlockPool::new(
                config.pool_selector_threshold_in_bytes().saturating_add(1),
                config.max_pool_size_in_bytes(),
                config.large_pool_bucket_count(),
            ),
        }
    }

    #[must_use]
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Rents a block of at least `bytes` bytes from the tier selected by the request size.
    #[must_use]
    pub(crate) fn rent(&self, bytes: usize) -> (Block, Option<PoolToken>) {
        let tier = if bytes <= self.pool_selector_threshold_in_bytes {
            Tier::Normal
        } else {
            Tier::Large
        };

        let (block, bucket_index) = self.pool(tier).rent(bytes);

        trace!(
            generation = self.generation,
            ?tier,
            bytes,
            capacity = block.capacity_in_bytes(),
            pooled = bucket_index.is_some(),
            "rented block"
        );

        let token = bucket_index.map(|bucket_index| PoolToken {
            generation: self.generation,
            tier,
            bucket_index,
        });

        (block, token)
    }

    fn give_back(&self, token: PoolToken, block: Block) {
        debug_assert_eq!(token.generation, self.generation);

        let retained = self.pool(token.tier).give_back(token.bucket_index, block);

        trace!(
            generation = self.generation,
            tier = ?token.tier,
            bucket_index = token.bucket_index,
            retained,
            "block given back"
        );
    }

    #[must_use]
    pub(crate) fn retained_bytes(&self) -> usize {
        self.normal
            .retained_bytes()
            .saturating_add(self.large.retained_bytes())
    }

    fn pool(&self, tier: Tier) -> &BlockPool {
        match tier {
            Tier::Normal => &self.normal,
            Tier::Large => &self.large,
        }
    }
}

/// The way back to the pool for a block rented by a pooled allocator.
///
/// Outstanding blocks do not keep the allocator's pools alive. Once the allocator is gone, its
/// blocks are released instead of given back.
#[derive(Debug)]
pub(crate) struct PoolReturn {
    registry: Weak<PoolRegistry>,
    token: PoolToken,
}

impl PoolReturn {
    #[must_use]
    pub(crate) fn new(registry: &Arc<PoolRegistry>, token: PoolToken) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            token,
        }
    }

    /// Gives the block back to its pool if the allocator still exists and the generation the
    /// block was rented from is still current.
    pub(crate) fn give_back(self, block: Block) {
        let Some(registry) = self.registry.upgrade() else {
            trace!(
                rented_generation = self.token.generation,
                "block outlived its allocator, releasing"
            );
            return;
        };

        let tiers = registry.load();

        if tiers.generation() == self.token.generation {
            tiers.give_back(self.token, block);
        } else {
            trace!(
                rented_generation = self.token.generation,
                current_generation = tiers.generation(),
                "block outlived its pool generation, releasing"
            );
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::num::NonZero;

    use super::*;
    use crate::PooledMemoryAllocator;

    fn config() -> AllocatorConfig {
        *PooledMemoryAllocator::builder()
            .max_pool_size_in_bytes(NonZero::new(64 * 1024).unwrap())
            .pool_selector_threshold_in_bytes(NonZero::new(1024).unwrap())
            .normal_pool_bucket_count(4)
            .large_pool_bucket_count(2)
            .build()
            .config()
    }

    fn registry(generation: u64) -> Arc<PoolRegistry> {
        Arc::new(ArcSwap::from_pointee(PoolTiers::new(generation, &config())))
    }

    #[test]
    fn threshold_selects_tier() {
        let tiers = PoolTiers::new(0, &config());

        let (_, token) = tiers.rent(1024);
        assert_eq!(token.unwrap().tier, Tier::Normal);

        let (_, token) = tiers.rent(1025);
        assert_eq!(token.unwrap().tier, Tier::Large);

        let (_, token) = tiers.rent(64 * 1024 + 1);
        assert_eq!(token, None);
    }

    #[test]
    fn large_tier_only_covers_sizes_above_threshold() {
        let tiers = PoolTiers::new(0, &config());

        // 64 B to 1 KiB in the normal tier, 2 KiB to 64 KiB in the large tier.
        assert_eq!(tiers.normal.bucket_count(), 5);
        assert_eq!(tiers.large.bucket_count(), 6);
    }

    #[test]
    fn give_back_to_current_generation_retains() {
        let registry = registry(3);

        let (block, token) = registry.load().rent(2048);
        PoolReturn::new(&registry, token.unwrap()).give_back(block);

        assert_eq!(registry.load().retained_bytes(), 2048);
    }

    #[test]
    fn give_back_to_released_generation_discards() {
        let registry = registry(0);

        let (block, token) = registry.load().rent(2048);

        registry.store(Arc::new(PoolTiers::new(1, &config())));

        PoolReturn::new(&registry, token.unwrap()).give_back(block);

        assert_eq!(registry.load().retained_bytes(), 0);
    }

    #[test]
    fn give_back_after_registry_dropped_releases() {
        let registry = registry(0);

        let (block, token) = registry.load().rent(2048);
        let pool_return = PoolReturn::new(&registry, token.unwrap());

        let tiers = registry.load_full();
        drop(registry);

        pool_return.give_back(block);

        assert_eq!(tiers.retained_bytes(), 0);
    }
}
