use crate::segments::validate_layout;
use crate::{Element, Error, MemoryGroup, Result, Segments, SegmentsMut};

/// A logical buffer made of slices owned by the caller.
///
/// Useful for feeding memory that was not allocated through this crate into the bulk operations,
/// for example to copy a pooled buffer into a set of existing arrays. The slices are borrowed
/// for the lifetime of the group and never disposed.
///
/// A consumed group is always valid and its guards are plain references to the borrowed
/// [`ConsumedSegments`].
///
/// # Examples
///
/// ```
/// use pooled_memory::{ConsumedGroup, MemoryGroup, Segments, fill};
///
/// let mut first = [1_u8, 2, 3];
/// let mut second = [4_u8, 5];
///
/// let mut group = ConsumedGroup::new(vec![&mut first[..], &mut second[..]]).unwrap();
///
/// assert_eq!(group.buffer_length().unwrap(), 3);
/// assert_eq!(group.read().unwrap().segment(1), &[4, 5]);
///
/// fill(&mut group, 0).unwrap();
/// drop(group);
///
/// assert_eq!(second, [0, 0]);
/// ```
#[derive(Debug)]
pub struct ConsumedGroup<'a, T: Element> {
    segments: ConsumedSegments<'a, T>,
}

impl<'a, T: Element> ConsumedGroup<'a, T> {
    /// Wraps `slices` as the segments of a logical buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ContractViolation`] unless every slice is non-empty, all but the last
    /// have the same length and the last is not longer than the others.
    pub fn new(slices: Vec<&'a mut [T]>) -> Result<Self> {
        let lengths = slices.iter().map(|slice| slice.len()).collect::<Vec<_>>();

        let (buffer_length, total_length) = validate_layout(&lengths).ok_or_else(|| {
            Error::contract_violation(format!(
                "slice lengths {lengths:?} do not form a valid logical buffer layout"
            ))
        })?;

        Ok(Self {
            segments: ConsumedSegments {
                slices,
                buffer_length,
                total_length,
            },
        })
    }

    /// Wraps a single slice as a logical buffer of one segment, or of none if it is empty.
    #[must_use]
    pub fn single(slice: &'a mut [T]) -> Self {
        let length = slice.len();

        let slices = if slice.is_empty() {
            Vec::new()
        } else {
            vec![slice]
        };

        Self {
            segments: ConsumedSegments {
                slices,
                buffer_length: length,
                total_length: length,
            },
        }
    }

    /// Releases the borrowed slices.
    #[must_use]
    pub fn into_inner(self) -> Vec<&'a mut [T]> {
        self.segments.slices
    }
}

impl<'a, T: Element> MemoryGroup for ConsumedGroup<'a, T> {
    type Item = T;

    type Read<'g>
        = &'g ConsumedSegments<'a, T>
    where
        Self: 'g;

    type Write<'g>
        = &'g mut ConsumedSegments<'a, T>
    where
        Self: 'g;

    fn is_valid(&self) -> bool {
        true
    }

    fn read(&self) -> Result<Self::Read<'_>> {
        Ok(&self.segments)
    }

    fn write(&mut self) -> Result<Self::Write<'_>> {
        Ok(&mut self.segments)
    }
}

/// The segments of a [`ConsumedGroup`].
#[derive(Debug)]
pub struct ConsumedSegments<'a, T: Element> {
    slices: Vec<&'a mut [T]>,
    buffer_length: usize,
    total_length: usize,
}

impl<T: Element> Segments for ConsumedSegments<'_, T> {
    type Item = T;

    fn buffer_length(&self) -> usize {
        self.buffer_length
    }

    fn total_length(&self) -> usize {
        self.total_length
    }

    fn count(&self) -> usize {
        self.slices.len()
    }

    fn segment(&self, index: usize) -> &[T] {
        self.slices.get(index).expect("segment index out of range")
    }
}

impl<T: Element> SegmentsMut for ConsumedSegments<'_, T> {
    fn segment_mut(&mut self, index: usize) -> &mut [T] {
        self.slices
            .get_mut(index)
            .expect("segment index out of range")
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_uneven_slices() {
        let mut a = [0_u8; 2];
        let mut b = [0_u8; 3];

        assert!(matches!(
            ConsumedGroup::new(vec![&mut a[..], &mut b[..]]),
            Err(Error::ContractViolation { .. })
        ));
    }

    #[test]
    fn new_rejects_empty_slice() {
        let mut a = [0_u8; 2];
        let mut b = [0_u8; 0];

        assert!(matches!(
            ConsumedGroup::new(vec![&mut a[..], &mut b[..]]),
            Err(Error::ContractViolation { .. })
        ));
    }

    #[test]
    fn no_slices_is_empty_buffer() {
        let group = ConsumedGroup::<u8>::new(Vec::new()).unwrap();

        assert_eq!(group.count().unwrap(), 0);
        assert_eq!(group.total_length().unwrap(), 0);
    }

    #[test]
    fn single_wraps_whole_slice() {
        let mut data = [1_u16, 2, 3];

        let group = ConsumedGroup::single(&mut data);
        let segments = group.read().unwrap();

        assert_eq!(segments.count(), 1);
        assert_eq!(segments.buffer_length(), 3);
        assert_eq!(segments.segment(0), &[1, 2, 3]);
    }

    #[test]
    fn single_empty_has_no_segments() {
        let mut data: [u16; 0] = [];

        let group = ConsumedGroup::single(&mut data);

        assert_eq!(group.count().unwrap(), 0);
    }

    #[test]
    fn writes_land_in_caller_memory() {
        let mut a = [0_u32; 2];
        let mut b = [0_u32; 1];

        let mut group = ConsumedGroup::new(vec![&mut a[..], &mut b[..]]).unwrap();
        assert!(group.is_valid());
        group.write().unwrap().segment_mut(1).fill(5);
        drop(group);

        assert_eq!(b, [5]);
    }
}
