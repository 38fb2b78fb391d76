use std::any::type_name;
use std::fmt;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::trace;

use crate::segments::{segment_lengths, validate_layout};
use crate::{
    AllocationOptions, Element, Error, GroupView, MemoryAllocator, MemoryGroup, Result, Segment,
    Segments, SegmentsMut, copy_to,
};

/// A logical buffer that owns its segments.
///
/// The buffer is split into segments of at most
/// [`buffer_capacity_in_bytes()`][MemoryAllocator::buffer_capacity_in_bytes] bytes each, so it
/// can be larger than any single allocation the allocator is willing to make. Each segment is
/// rented from the allocator individually, so pooled reuse applies per segment.
///
/// The owner hands out [`GroupView`]s to code that needs to access the buffer without owning it.
/// Views stop working as soon as the owner is disposed or its contents are swapped with another
/// group via [`swap_contents()`], at which point the owner hands out fresh views.
///
/// Disposing the group (explicitly via [`dispose()`][Self::dispose] or by dropping it) disposes
/// all of its segments.
///
/// # Examples
///
/// ```
/// use std::num::NonZero;
///
/// use pooled_memory::{
///     AllocationOptions, MemoryGroup, OwnedGroup, PooledMemoryAllocator, Segments, fill,
/// };
///
/// let allocator = PooledMemoryAllocator::builder()
///     .buffer_capacity_in_bytes(NonZero::new(1024).unwrap())
///     .build();
///
/// let mut group = OwnedGroup::<u32>::allocate(&allocator, 600, AllocationOptions::None).unwrap();
///
/// let lengths: Vec<usize> = group.read().unwrap().iter().map(<[u32]>::len).collect();
/// assert_eq!(lengths, vec![256, 256, 88]);
///
/// fill(&mut group, 7).unwrap();
/// assert!(group.read().unwrap().iter().flatten().all(|&x| x == 7));
/// ```
pub struct OwnedGroup<T: Element> {
    shared: Arc<GroupShared<T>>,

    /// The view handed out to external holders. Replaced whenever the old one is invalidated.
    view: GroupView<T>,

    /// Whether the segments may be exchanged with those of another group.
    swappable: bool,
}

impl<T: Element> OwnedGroup<T> {
    /// Allocates a logical buffer of `total_length` elements.
    ///
    /// The buffer consists of `ceil(total_length / buffer_length)` segments, where
    /// `buffer_length` is the allocator's buffer capacity divided by the element size. All
    /// segments but the last hold exactly `buffer_length` elements.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAllocationRequest`] if `T` is zero-sized or larger than the
    /// allocator's buffer capacity, or if any segment allocation fails. Segments allocated
    /// before the failure are disposed.
    pub fn allocate<A: MemoryAllocator>(
        allocator: &A,
        total_length: usize,
        options: AllocationOptions,
    ) -> Result<Self> {
        let element_size = size_of::<T>();

        if element_size == 0 {
            return Err(Error::invalid_allocation::<T>(
                total_length,
                "zero-sized element types cannot be allocated",
            ));
        }

        let buffer_length = allocator
            .buffer_capacity_in_bytes()
            .checked_div(element_size)
            .unwrap_or_default();

        if buffer_length == 0 {
            return Err(Error::invalid_allocation::<T>(
                total_length,
                format!(
                    "the buffer capacity of {} bytes cannot hold a single element",
                    allocator.buffer_capacity_in_bytes()
                ),
            ));
        }

        let segments = segment_lengths(total_length, buffer_length)
            .map(|length| allocator.allocate::<T>(length, options))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new_inner(
            GroupState {
                segments,
                buffer_length,
                total_length,
            },
            true,
        ))
    }

    /// Assembles a logical buffer from segments the caller already owns.
    ///
    /// Every segment must be non-empty, all but the last must have the same length and the last
    /// must not be longer than the others. The resulting group owns the segments and disposes
    /// them when it is disposed, but it is not swappable: [`swap_contents()`] rejects it and
    /// [`swap_or_copy_contents()`] copies instead.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UseAfterDispose`] if any segment has been disposed and
    /// [`Error::ContractViolation`] if the segment lengths do not form a valid layout.
    pub fn from_segments(segments: Vec<Segment<T>>) -> Result<Self> {
        if segments.iter().any(Segment::is_disposed) {
            return Err(Error::UseAfterDispose);
        }

        let lengths = segments.iter().map(Segment::len).collect::<Vec<_>>();

        let (buffer_length, total_length) = validate_layout(&lengths).ok_or_else(|| {
            Error::contract_violation(format!(
                "segment lengths {lengths:?} do not form a valid logical buffer layout"
            ))
        })?;

        Ok(Self::new_inner(
            GroupState {
                segments,
                buffer_length,
                total_length,
            },
            false,
        ))
    }

    fn new_inner(state: GroupState<T>, swappable: bool) -> Self {
        let shared = Arc::new(GroupShared {
            epoch: AtomicU64::new(0),
            disposed: AtomicBool::new(false),
            state: RwLock::new(state),
        });

        Self {
            view: GroupView::new(Arc::clone(&shared), 0),
            shared,
            swappable,
        }
    }

    /// A view of the buffer for holders that do not own it.
    ///
    /// All views handed out between two swaps (or between the last swap and disposal) are
    /// equivalent and become invalid together.
    #[must_use]
    pub fn view(&self) -> GroupView<T> {
        self.view.clone()
    }

    /// Whether the segments may be exchanged with those of another group via
    /// [`swap_contents()`].
    #[must_use]
    pub fn is_swappable(&self) -> bool {
        self.swappable
    }

    /// Disposes every segment and invalidates the buffer and all of its views.
    ///
    /// Disposing an already disposed group does nothing. This never blocks: if a guard obtained
    /// through a view is still alive, the buffer and its views are invalidated immediately and
    /// the segments are disposed once the last guard and view have been dropped.
    pub fn dispose(&mut self) {
        if self.shared.is_disposed() {
            return;
        }

        let Ok(mut state) = self.shared.try_write() else {
            self.shared.disposed.store(true, Ordering::Release);
            self.shared.advance_epoch();

            trace!("logical buffer disposed while a guard is alive, deferring segment disposal");
            return;
        };

        self.shared.disposed.store(true, Ordering::Release);
        self.shared.advance_epoch();

        let segments = mem::take(&mut state.segments);
        drop(state);

        // Segments give their memory back to the pool outside the lock.
        drop(segments);
    }
}

impl<T: Element> MemoryGroup for OwnedGroup<T> {
    type Item = T;

    type Read<'g>
        = GroupReadGuard<'g, T>
    where
        Self: 'g;

    type Write<'g>
        = GroupWriteGuard<'g, T>
    where
        Self: 'g;

    fn is_valid(&self) -> bool {
        !self.shared.is_disposed()
    }

    fn read(&self) -> Result<Self::Read<'_>> {
        if !self.is_valid() {
            return Err(Error::InvalidGroupAccess);
        }

        Ok(GroupReadGuard::new(self.shared.try_read()?))
    }

    fn write(&mut self) -> Result<Self::Write<'_>> {
        if !self.is_valid() {
            return Err(Error::InvalidGroupAccess);
        }

        Ok(GroupWriteGuard::new(self.shared.try_write()?))
    }
}

impl<T: Element> Drop for OwnedGroup<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T: Element> fmt::Debug for OwnedGroup<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedGroup")
            .field("shared", &self.shared)
            .field("swappable", &self.swappable)
            .finish_non_exhaustive()
    }
}

/// Exchanges the segments of two owned groups without copying any elements.
///
/// Afterwards `a` holds what `b` used to hold and vice versa, including the segment layout. All
/// views previously obtained from either group are invalidated; both groups hand out fresh
/// views from now on.
///
/// This is how a buffer is resized in place: a new group of the desired shape is allocated and
/// swapped into the identity of the old one, after which the new group (now holding the old
/// contents) is disposed.
///
/// # Errors
///
/// * [`Error::InvalidGroupAccess`] if either group has been disposed.
/// * [`Error::ContractViolation`] if either group is not swappable.
/// * [`Error::GroupBusy`] if a guard over either group is alive.
///
/// Nothing is modified if an error is returned.
///
/// # Examples
///
/// ```
/// use pooled_memory::{
///     AllocationOptions, MemoryGroup, OwnedGroup, UnpooledMemoryAllocator, fill, swap_contents,
/// };
///
/// let allocator = UnpooledMemoryAllocator::new();
/// let mut a = OwnedGroup::<u8>::allocate(&allocator, 10, AllocationOptions::None).unwrap();
/// let mut b = OwnedGroup::<u8>::allocate(&allocator, 20, AllocationOptions::None).unwrap();
///
/// let old_view = a.view();
/// swap_contents(&mut a, &mut b).unwrap();
///
/// assert_eq!(a.total_length().unwrap(), 20);
/// assert_eq!(b.total_length().unwrap(), 10);
/// assert!(old_view.count().is_err());
/// assert_eq!(a.view().total_length().unwrap(), 20);
/// ```
pub fn swap_contents<T: Element>(a: &mut OwnedGroup<T>, b: &mut OwnedGroup<T>) -> Result<()> {
    if !a.is_valid() || !b.is_valid() {
        return Err(Error::InvalidGroupAccess);
    }

    if !a.swappable || !b.swappable {
        return Err(Error::contract_violation(
            "only groups allocated through an allocator can swap contents",
        ));
    }

    let (a_epoch, b_epoch) = {
        let mut a_state = a.shared.try_write()?;
        let mut b_state = b.shared.try_write()?;

        let epochs = (a.shared.advance_epoch(), b.shared.advance_epoch());

        mem::swap(&mut *a_state, &mut *b_state);

        trace!(
            a_total_length = a_state.total_length,
            b_total_length = b_state.total_length,
            "swapped logical buffer contents"
        );

        epochs
    };

    a.view = GroupView::new(Arc::clone(&a.shared), a_epoch);
    b.view = GroupView::new(Arc::clone(&b.shared), b_epoch);

    Ok(())
}

/// Moves the contents of `source` into `dest`, by swapping if both are swappable and by copying
/// otherwise.
///
/// Returns `true` if the contents were swapped (in which case `source` now holds what `dest`
/// used to hold) and `false` if they were copied (in which case `source` is unchanged).
///
/// # Errors
///
/// * [`Error::InvalidGroupAccess`] if either group has been disposed.
/// * [`Error::ContractViolation`] if a copy is needed and the total lengths differ.
/// * [`Error::GroupBusy`] if a guard over either group is alive.
pub fn swap_or_copy_contents<T: Element>(
    dest: &mut OwnedGroup<T>,
    source: &mut OwnedGroup<T>,
) -> Result<bool> {
    if dest.swappable && source.swappable {
        swap_contents(dest, source)?;
        return Ok(true);
    }

    let source_length = source.total_length()?;
    let dest_length = dest.total_length()?;

    if source_length != dest_length {
        return Err(Error::contract_violation(format!(
            "cannot copy {source_length} elements into a buffer of {dest_length} elements"
        )));
    }

    copy_to(&*source, dest)?;

    Ok(false)
}

/// State shared between an owned group and its views.
pub(crate) struct GroupShared<T: Element> {
    /// Incremented whenever the views handed out so far must stop working. Swaps only modify it
    /// while holding the write lock on `state`.
    epoch: AtomicU64,

    disposed: AtomicBool,

    state: RwLock<GroupState<T>>,
}

impl<T: Element> GroupShared<T> {
    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn advance_epoch(&self) -> u64 {
        self.epoch
            .fetch_add(1, Ordering::AcqRel)
            .checked_add(1)
            .expect("epoch counter cannot realistically overflow a u64")
    }

    pub(crate) fn try_read(&self) -> Result<RwLockReadGuard<'_, GroupState<T>>> {
        self.state.try_read().ok_or(Error::GroupBusy)
    }

    pub(crate) fn try_write(&self) -> Result<RwLockWriteGuard<'_, GroupState<T>>> {
        self.state.try_write().ok_or(Error::GroupBusy)
    }
}

impl<T: Element> fmt::Debug for GroupShared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupShared")
            .field("element_type", &type_name::<T>())
            .field("epoch", &self.epoch())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

/// The segment set of a logical buffer. Swapped as a whole by [`swap_contents()`].
#[derive(Debug)]
pub(crate) struct GroupState<T: Element> {
    segments: Vec<Segment<T>>,
    buffer_length: usize,
    total_length: usize,
}

impl<T: Element> GroupState<T> {
    fn segment(&self, index: usize) -> &[T] {
        self.segments
            .get(index)
            .expect("segment index out of range")
            .span()
            .expect("segments of a live group are never disposed")
    }

    fn segment_mut(&mut self, index: usize) -> &mut [T] {
        self.segments
            .get_mut(index)
            .expect("segment index out of range")
            .span_mut()
            .expect("segments of a live group are never disposed")
    }
}

/// Read access to the segments of an [`OwnedGroup`], obtained through the group or one of its
/// views. No conflicting access is possible while the guard exists.
pub struct GroupReadGuard<'g, T: Element> {
    state: RwLockReadGuard<'g, GroupState<T>>,
}

impl<'g, T: Element> GroupReadGuard<'g, T> {
    pub(crate) fn new(state: RwLockReadGuard<'g, GroupState<T>>) -> Self {
        Self { state }
    }
}

impl<T: Element> Segments for GroupReadGuard<'_, T> {
    type Item = T;

    fn buffer_length(&self) -> usize {
        self.state.buffer_length
    }

    fn total_length(&self) -> usize {
        self.state.total_length
    }

    fn count(&self) -> usize {
        self.state.segments.len()
    }

    fn segment(&self, index: usize) -> &[T] {
        self.state.segment(index)
    }
}

impl<T: Element> fmt::Debug for GroupReadGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupReadGuard")
            .field("count", &self.count())
            .field("buffer_length", &self.buffer_length())
            .field("total_length", &self.total_length())
            .finish_non_exhaustive()
    }
}

/// Read and write access to the segments of an [`OwnedGroup`], obtained through the group or
/// one of its views. No other access is possible while the guard exists.
pub struct GroupWriteGuard<'g, T: Element> {
    state: RwLockWriteGuard<'g, GroupState<T>>,
}

impl<'g, T: Element> GroupWriteGuard<'g, T> {
    pub(crate) fn new(state: RwLockWriteGuard<'g, GroupState<T>>) -> Self {
        Self { state }
    }
}

impl<T: Element> Segments for GroupWriteGuard<'_, T> {
    type Item = T;

    fn buffer_length(&self) -> usize {
        self.state.buffer_length
    }

    fn total_length(&self) -> usize {
        self.state.total_length
    }

    fn count(&self) -> usize {
        self.state.segments.len()
    }

    fn segment(&self, index: usize) -> &[T] {
        self.state.segment(index)
    }
}

impl<T: Element> SegmentsMut for GroupWriteGuard<'_, T> {
    fn segment_mut(&mut self, index: usize) -> &mut [T] {
        self.state.segment_mut(index)
    }
}

impl<T: Element> fmt::Debug for GroupWriteGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupWriteGuard")
            .field("count", &self.count())
            .field("buffer_length", &self.buffer_length())
            .field("total_length", &self.total_length())
            .finish_non_exhaustive()
    }
}
