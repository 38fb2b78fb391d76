use std::fmt;
use std::sync::Arc;

use crate::owned_group::GroupShared;
use crate::{Element, Error, GroupReadGuard, GroupWriteGuard, MemoryGroup, Result};

/// Access to an [`OwnedGroup`][crate::OwnedGroup] for holders that do not own it.
///
/// A view forwards every operation to the segments its owner holds at the time of the call, as
/// long as the view is valid. It becomes invalid, permanently, when the owner is disposed or
/// when the owner's contents are swapped with another group. Every access through an invalid
/// view fails with [`Error::InvalidGroupAccess`].
///
/// Views are cheap to clone and can be sent to other threads.
///
/// # Examples
///
/// ```
/// use pooled_memory::{AllocationOptions, MemoryGroup, OwnedGroup, UnpooledMemoryAllocator};
///
/// let allocator = UnpooledMemoryAllocator::new();
/// let mut group = OwnedGroup::<u8>::allocate(&allocator, 16, AllocationOptions::None).unwrap();
///
/// let view = group.view();
/// assert_eq!(view.total_length().unwrap(), 16);
///
/// group.dispose();
/// assert!(!view.is_valid());
/// ```
#[derive(Clone)]
pub struct GroupView<T: Element> {
    shared: Arc<GroupShared<T>>,

    /// The owner's epoch at the time the view was created.
    epoch: u64,
}

impl<T: Element> GroupView<T> {
    pub(crate) fn new(shared: Arc<GroupShared<T>>, epoch: u64) -> Self {
        Self { shared, epoch }
    }

    fn ensure_valid(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(Error::InvalidGroupAccess)
        }
    }
}

impl<T: Element> MemoryGroup for GroupView<T> {
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
        self.shared.epoch() == self.epoch
    }

    fn read(&self) -> Result<Self::Read<'_>> {
        self.ensure_valid()?;

        let state = self.shared.try_read()?;

        // Swaps need the write lock, so the segments cannot change from here on.
        self.ensure_valid()?;

        Ok(GroupReadGuard::new(state))
    }

    fn write(&mut self) -> Result<Self::Write<'_>> {
        self.ensure_valid()?;

        let state = self.shared.try_write()?;

        self.ensure_valid()?;

        Ok(GroupWriteGuard::new(state))
    }
}

impl<T: Element> fmt::Debug for GroupView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupView")
            .field("epoch", &self.epoch)
            .field("valid", &self.is_valid())
            .finish_non_exhaustive()
    }
}
