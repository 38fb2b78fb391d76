#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Pooled memory for large element buffers, with logical buffers that transparently span
//! multiple physical allocations.
//!
//! This crate provides the memory layer for code that processes big arrays of plain data
//! (pixels, samples, scanlines) and wants to reuse memory across operations instead of going to
//! the system allocator every time.
//!
//! # Key Features
//!
//! - **Pooled reuse**: [`PooledMemoryAllocator`] keeps returned blocks in size-bucketed pools and
//!   hands them out again for later requests of a similar size
//! - **Segmented logical buffers**: [`OwnedGroup`] presents one index space made of many
//!   segments, so buffers can exceed the largest single allocation the allocator permits
//! - **Safe swapping**: [`swap_contents()`] exchanges the segments of two buffers without
//!   copying, invalidating every outstanding [`GroupView`] so that stale holders are rejected
//!   instead of silently seeing different data
//! - **Cross-segment bulk operations**: [`fill()`], [`clear()`], [`copy_to()`],
//!   [`transform_to()`] and friends work across segment boundaries of any layout
//! - **Stable addresses**: segment memory never moves, and [`Segment::pin()`] exposes it to
//!   foreign code for the duration of a call
//!
//! # Allocators
//!
//! Every allocator implements [`MemoryAllocator`]:
//!
//! - [`PooledMemoryAllocator`] retains returned memory for reuse. Use the builder or one of the
//!   presets to tune how much it retains.
//! - [`UnpooledMemoryAllocator`] allocates fresh memory for every request and never splits
//!   logical buffers.
//!
//! Memory is always initialized. Fresh blocks are zero-filled, while reused blocks may contain
//! whatever their previous user wrote unless [`AllocationOptions::Clean`] is requested.
//!
//! # Example
//!
//! ```
//! use std::num::NonZero;
//!
//! use pooled_memory::{
//!     AllocationOptions, MemoryGroup, OwnedGroup, PooledMemoryAllocator, copy_to_slice, fill,
//! };
//!
//! let allocator = PooledMemoryAllocator::builder()
//!     .buffer_capacity_in_bytes(NonZero::new(1024).unwrap())
//!     .build();
//!
//! // 600 u32s do not fit into 1024 bytes, so the buffer is split into three segments.
//! let mut pixels =
//!     OwnedGroup::<u32>::allocate(&allocator, 600, AllocationOptions::Clean).unwrap();
//! assert_eq!(pixels.count().unwrap(), 3);
//!
//! fill(&mut pixels, 0xFF00_FF00).unwrap();
//!
//! let mut flat = vec![0_u32; 600];
//! copy_to_slice(&pixels, &mut flat).unwrap();
//! assert!(flat.iter().all(|&p| p == 0xFF00_FF00));
//! ```
//!
//! # Thread safety
//!
//! Allocators can be shared between threads and serve concurrent requests. Logical buffers and
//! their views can be sent and shared between threads as well. Conflicting access to the same
//! logical buffer does not block: it fails with [`Error::GroupBusy`].

mod allocator;
mod block;
mod block_pool;
mod builder;
mod bulk;
mod consumed_group;
mod cursor;
mod element;
mod error;
mod options;
mod owned_group;
mod pooled_allocator;
mod segment;
mod segments;
mod tiers;
mod unpooled_allocator;
mod view;

pub use allocator::*;
pub use builder::*;
pub use bulk::*;
pub use consumed_group::*;
pub use cursor::*;
pub use element::*;
pub use error::*;
pub use options::*;
pub use owned_group::{
    GroupReadGuard, GroupWriteGuard, OwnedGroup, swap_contents, swap_or_copy_contents,
};
pub use pooled_allocator::{AllocatorConfig, PooledMemoryAllocator};
pub use segment::*;
pub use segments::{MemoryGroup, SegmentIter, Segments, SegmentsMut};
pub use unpooled_allocator::*;
pub use view::*;
