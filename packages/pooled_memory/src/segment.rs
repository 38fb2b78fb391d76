use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::block::Block;
use crate::tiers::PoolReturn;
use crate::{Element, Error, Result};

/// One contiguous block of memory holding `len()` elements of type `T`.
///
/// Segments are obtained from a [`MemoryAllocator`][crate::MemoryAllocator]. The backing block
/// may be larger than the segment (pooled blocks are rounded up to a size class) but the
/// segment only ever exposes exactly `len()` elements.
///
/// When the segment is disposed (explicitly via [`dispose()`][Self::dispose] or by being
/// dropped), its block is given back to the pool it was rented from, if that pool is still the
/// allocator's current one. Any further access then fails with [`Error::UseAfterDispose`].
///
/// # Stable addresses
///
/// The elements never move in memory for as long as the segment is not disposed, even when the
/// `Segment` value itself is moved. [`pin()`][Self::pin] and [`with_pinned()`][Self::with_pinned]
/// expose that address for short interop calls that need a raw pointer.
///
/// # Examples
///
/// ```
/// use pooled_memory::{AllocationOptions, MemoryAllocator, PooledMemoryAllocator};
///
/// let allocator = PooledMemoryAllocator::new();
/// let mut segment = allocator
///     .allocate::<u16>(4, AllocationOptions::Clean)
///     .unwrap();
///
/// segment.span_mut().unwrap().copy_from_slice(&[1, 2, 3, 4]);
/// assert_eq!(segment.span().unwrap(), &[1, 2, 3, 4]);
///
/// segment.dispose();
/// assert!(segment.span().is_err());
/// ```
pub struct Segment<T: Element> {
    /// `None` once the segment has been disposed.
    block: Option<Block>,

    length: usize,

    /// Where the block goes when the segment is disposed. `None` if the block did not come from
    /// a pool, in which case it is simply released.
    origin: Option<PoolReturn>,

    _element: PhantomData<T>,
}

/// A segment of raw bytes, for collaborators that need plain byte-addressable memory.
pub type ByteSegment = Segment<u8>;

impl<T: Element> Segment<T> {
    #[must_use]
    pub(crate) fn new(block: Block, length: usize, origin: Option<PoolReturn>) -> Self {
        debug_assert!(
            length
                .checked_mul(size_of::<T>())
                .is_some_and(|bytes| bytes <= block.capacity_in_bytes())
        );

        Self {
            block: Some(block),
            length,
            origin,
            _element: PhantomData,
        }
    }

    /// The number of elements in the segment.
    ///
    /// This remains available after the segment has been disposed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Whether the segment holds zero elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Whether the segment has been disposed and no longer has backing memory.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.block.is_none()
    }

    /// Size in bytes of the backing block, which may exceed `len() * size_of::<T>()`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UseAfterDispose`] if the segment has been disposed.
    pub fn capacity_in_bytes(&self) -> Result<usize> {
        Ok(self.block()?.capacity_in_bytes())
    }

    /// The elements of the segment. Always exactly `len()` elements long.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UseAfterDispose`] if the segment has been disposed.
    pub fn span(&self) -> Result<&[T]> {
        let byte_length = self.byte_length();

        let bytes = self
            .block()?
            .bytes()
            .get(..byte_length)
            .expect("segment length is checked against block capacity at allocation time");

        Ok(bytemuck::cast_slice(bytes))
    }

    /// The elements of the segment, for modification. Always exactly `len()` elements long.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UseAfterDispose`] if the segment has been disposed.
    pub fn span_mut(&mut self) -> Result<&mut [T]> {
        let byte_length = self.byte_length();

        let bytes = self
            .block
            .as_mut()
            .ok_or(Error::UseAfterDispose)?
            .bytes_mut()
            .get_mut(..byte_length)
            .expect("segment length is checked against block capacity at allocation time");

        Ok(bytemuck::cast_slice_mut(bytes))
    }

    /// Pins the segment, returning a handle that exposes the address of the first element.
    ///
    /// Pinning is idempotent: any number of pins may coexist and all of them expose the same
    /// address. The segment cannot be disposed while a pin exists. Dropping the handle (or calling
    /// [`PinnedSegment::unpin()`]) releases the pin.
    ///
    /// Pins are meant to be scoped tightly around a single interop call and must not be held
    /// across suspension points.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UseAfterDispose`] if the segment has been disposed.
    pub fn pin(&self) -> Result<PinnedSegment<'_, T>> {
        let span = self.span()?;

        Ok(PinnedSegment {
            ptr: NonNull::from(span).cast(),
            len: span.len(),
            _segment: PhantomData,
        })
    }

    /// Pins the segment for modification through a raw pointer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UseAfterDispose`] if the segment has been disposed.
    pub fn pin_mut(&mut self) -> Result<PinnedSegmentMut<'_, T>> {
        let span = self.span_mut()?;
        let len = span.len();

        Ok(PinnedSegmentMut {
            ptr: NonNull::from(span).cast(),
            len,
            _segment: PhantomData,
        })
    }

    /// Calls `f` with the stable address and length of the segment's elements.
    ///
    /// The address is valid for reads and writes of `len` elements for the duration of the call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UseAfterDispose`] if the segment has been disposed.
    ///
    /// # Examples
    ///
    /// ```
    /// use pooled_memory::{AllocationOptions, MemoryAllocator, UnpooledMemoryAllocator};
    ///
    /// let allocator = UnpooledMemoryAllocator::new();
    /// let mut segment = allocator.allocate::<u8>(3, AllocationOptions::Clean).unwrap();
    ///
    /// segment
    ///     .with_pinned(|ptr, len| {
    ///         assert_eq!(len, 3);
    ///         // SAFETY: The pointer is valid for `len` elements for the duration of the call.
    ///         unsafe { ptr.as_ptr().write_bytes(7, len) };
    ///     })
    ///     .unwrap();
    ///
    /// assert_eq!(segment.span().unwrap(), &[7, 7, 7]);
    /// ```
    pub fn with_pinned<R>(&mut self, f: impl FnOnce(NonNull<T>, usize) -> R) -> Result<R> {
        let pinned = self.pin_mut()?;

        Ok(f(pinned.ptr, pinned.len))
    }

    /// Copies the elements into a new `Vec`, then disposes the segment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UseAfterDispose`] if the segment has been disposed.
    pub fn into_vec(mut self) -> Result<Vec<T>> {
        let elements = self.span()?.to_vec();
        self.dispose();
        Ok(elements)
    }

    /// Releases the backing memory, giving it back to the pool it came from if that pool is
    /// still current.
    ///
    /// Disposing an already disposed segment does nothing.
    pub fn dispose(&mut self) {
        let Some(block) = self.block.take() else {
            return;
        };

        if let Some(origin) = self.origin.take() {
            origin.give_back(block);
        }
    }

    pub(crate) fn zero_fill(&mut self) {
        if let Ok(span) = self.span_mut() {
            bytemuck::fill_zeroes(span);
        }
    }

    fn block(&self) -> Result<&Block> {
        self.block.as_ref().ok_or(Error::UseAfterDispose)
    }

    fn byte_length(&self) -> usize {
        self.length
            .checked_mul(size_of::<T>())
            .expect("segment byte length is checked for overflow at allocation time")
    }
}

impl<T: Element> Drop for Segment<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T: Element> fmt::Debug for Segment<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("element_type", &type_name::<T>())
            .field("length", &self.length)
            .field("block", &self.block)
            .field("pooled", &self.origin.is_some())
            .finish()
    }
}

/// A pin on a [`Segment`], exposing a stable address of its elements for reading.
///
/// Created by [`Segment::pin()`]. The pin is released when the handle is dropped.
pub struct PinnedSegment<'a, T: Element> {
    ptr: NonNull<T>,
    len: usize,
    _segment: PhantomData<&'a Segment<T>>,
}

impl<T: Element> PinnedSegment<'_, T> {
    /// Address of the first element. Valid for reads of `len()` elements while the pin exists.
    #[must_use]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    /// The number of elements behind the pinned address.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether there are zero elements behind the pinned address.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Releases the pin. Equivalent to dropping the handle.
    pub fn unpin(self) {
        // Consuming `self` is all it takes.
    }
}

impl<T: Element> fmt::Debug for PinnedSegment<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinnedSegment")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

/// A pin on a [`Segment`], exposing a stable address of its elements for reading and writing.
///
/// Created by [`Segment::pin_mut()`]. The pin is released when the handle is dropped.
pub struct PinnedSegmentMut<'a, T: Element> {
    ptr: NonNull<T>,
    len: usize,
    _segment: PhantomData<&'a mut Segment<T>>,
}

impl<T: Element> PinnedSegmentMut<'_, T> {
    /// Address of the first element. Valid for reads and writes of `len()` elements while the
    /// pin exists.
    #[must_use]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// The number of elements behind the pinned address.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether there are zero elements behind the pinned address.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Releases the pin. Equivalent to dropping the handle.
    pub fn unpin(self) {
        // Consuming `self` is all it takes.
    }
}

impl<T: Element> fmt::Debug for PinnedSegmentMut<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinnedSegmentMut")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    #![allow(
        clippy::indexing_slicing,
        reason = "we do not need to worry about these things when writing test code"
    )]

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;
    use crate::{AllocationOptions, MemoryAllocator, UnpooledMemoryAllocator};

    assert_impl_all!(Segment<u32>: Send, Sync, fmt::Debug);
    assert_not_impl_any!(PinnedSegment<'static, u32>: Send, Sync);
    assert_not_impl_any!(PinnedSegmentMut<'static, u32>: Send, Sync);

    fn unpooled(length: usize) -> Segment<u32> {
        Segment::new(Block::zeroed(length * 4), length, None)
    }

    #[test]
    fn span_has_exact_length_even_with_larger_block() {
        let segment = Segment::<u32>::new(Block::zeroed(1024), 10, None);

        assert_eq!(segment.len(), 10);
        assert_eq!(segment.span().unwrap().len(), 10);
        assert_eq!(segment.capacity_in_bytes().unwrap(), 1024);
    }

    #[test]
    fn span_mut_writes_are_visible() {
        let mut segment = unpooled(5);

        segment.span_mut().unwrap()[4] = 99;

        assert_eq!(segment.span().unwrap()[4], 99);
    }

    #[test]
    fn dispose_is_idempotent_and_blocks_access() {
        let mut segment = unpooled(5);

        segment.dispose();
        segment.dispose();

        assert!(segment.is_disposed());
        assert_eq!(segment.len(), 5);
        assert!(matches!(segment.span(), Err(Error::UseAfterDispose)));
        assert!(matches!(segment.span_mut(), Err(Error::UseAfterDispose)));
        assert!(matches!(segment.pin(), Err(Error::UseAfterDispose)));
        assert!(matches!(segment.capacity_in_bytes(), Err(Error::UseAfterDispose)));
        assert!(matches!(
            segment.with_pinned(|_, _| ()),
            Err(Error::UseAfterDispose)
        ));
    }

    #[test]
    fn repeated_pins_expose_same_address() {
        let segment = unpooled(8);

        let first = segment.pin().unwrap();
        let second = segment.pin().unwrap();

        assert_eq!(first.as_ptr(), second.as_ptr());
        assert_eq!(first.len(), 8);

        first.unpin();
        second.unpin();

        let third = segment.pin().unwrap();
        assert_eq!(third.as_ptr(), segment.span().unwrap().as_ptr());
    }

    #[test]
    fn address_survives_moving_the_segment() {
        let segment = unpooled(8);
        let address = segment.pin().unwrap().as_ptr();

        let moved = vec![segment];

        assert_eq!(moved[0].pin().unwrap().as_ptr(), address);
    }

    #[test]
    fn pin_mut_writes_through_pointer() {
        let mut segment = unpooled(2);

        {
            let mut pinned = segment.pin_mut().unwrap();
            // SAFETY: The pointer is valid for 2 elements while the pin exists.
            unsafe { pinned.as_mut_ptr().add(1).write(1234) };
        }

        assert_eq!(segment.span().unwrap(), &[0, 1234]);
    }

    #[test]
    fn into_vec_copies_contents() {
        let allocator = UnpooledMemoryAllocator::new();
        let mut segment = allocator.allocate::<u32>(3, AllocationOptions::None).unwrap();
        segment.span_mut().unwrap().copy_from_slice(&[1, 2, 3]);

        assert_eq!(segment.into_vec().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn zero_fill_clears_span() {
        let mut segment = unpooled(4);
        segment.span_mut().unwrap().fill(u32::MAX);

        segment.zero_fill();

        assert!(segment.span().unwrap().iter().all(|&x| x == 0));
    }
}
