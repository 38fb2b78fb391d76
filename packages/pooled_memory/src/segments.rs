use std::iter::FusedIterator;

use crate::{Element, Result};

/// Read access to the segments of a logical buffer.
///
/// All segments except possibly the last hold exactly [`buffer_length()`][Self::buffer_length]
/// elements. The last one holds the remainder, so that the lengths of all segments add up to
/// [`total_length()`][Self::total_length].
///
/// Implementations are typically guards obtained from [`MemoryGroup::read()`], which keep the
/// logical buffer stable for as long as they are alive.
pub trait Segments {
    /// The element type stored in the segments.
    type Item: Element;

    /// The number of elements in every segment except possibly the last one.
    #[must_use]
    fn buffer_length(&self) -> usize;

    /// The number of elements across all segments.
    #[must_use]
    fn total_length(&self) -> usize;

    /// The number of segments.
    #[must_use]
    fn count(&self) -> usize;

    /// The elements of segment `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not less than [`count()`][Self::count].
    #[must_use]
    fn segment(&self, index: usize) -> &[Self::Item];

    /// Iterates over the segments in order.
    ///
    /// Every call starts a fresh iteration from the first segment.
    fn iter(&self) -> SegmentIter<'_, Self> {
        SegmentIter {
            segments: self,
            next_index: 0,
        }
    }
}

/// Write access to the segments of a logical buffer.
pub trait SegmentsMut: Segments {
    /// The elements of segment `index`, for modification.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not less than [`count()`][Segments::count].
    #[must_use]
    fn segment_mut(&mut self, index: usize) -> &mut [Self::Item];
}

/// A logical buffer: an ordered sequence of segments presenting one index space that may be
/// larger than any single physical allocation.
///
/// Access goes through guards obtained from [`read()`][Self::read] and [`write()`][Self::write].
/// A guard keeps the buffer's segment set stable while it is alive; any attempt to take a
/// conflicting guard at the same time fails with [`Error::GroupBusy`][crate::Error::GroupBusy]
/// instead of blocking.
///
/// The bulk operations of this crate ([`fill()`][crate::fill], [`copy_to()`][crate::copy_to]
/// and friends) work with any implementation.
pub trait MemoryGroup {
    /// The element type stored in the logical buffer.
    type Item: Element;

    /// Guard for reading the segments.
    type Read<'g>: Segments<Item = Self::Item>
    where
        Self: 'g;

    /// Guard for reading and writing the segments.
    type Write<'g>: SegmentsMut<Item = Self::Item>
    where
        Self: 'g;

    /// Whether the logical buffer can still be accessed through `self`.
    #[must_use]
    fn is_valid(&self) -> bool;

    /// Obtains read access to the segments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGroupAccess`][crate::Error::InvalidGroupAccess] if the buffer can
    /// no longer be accessed through `self`, or [`Error::GroupBusy`][crate::Error::GroupBusy] if it
    /// is currently being written.
    fn read(&self) -> Result<Self::Read<'_>>;

    /// Obtains write access to the segments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGroupAccess`][crate::Error::InvalidGroupAccess] if the buffer can
    /// no longer be accessed through `self`, or [`Error::GroupBusy`][crate::Error::GroupBusy] if it
    /// is currently being read or written.
    fn write(&mut self) -> Result<Self::Write<'_>>;

    /// The number of segments.
    ///
    /// # Errors
    ///
    /// Fails under the same conditions as [`read()`][Self::read].
    fn count(&self) -> Result<usize> {
        Ok(self.read()?.count())
    }

    /// The number of elements in every segment except possibly the last one.
    ///
    /// # Errors
    ///
    /// Fails under the same conditions as [`read()`][Self::read].
    fn buffer_length(&self) -> Result<usize> {
        Ok(self.read()?.buffer_length())
    }

    /// The number of elements across all segments.
    ///
    /// # Errors
    ///
    /// Fails under the same conditions as [`read()`][Self::read].
    fn total_length(&self) -> Result<usize> {
        Ok(self.read()?.total_length())
    }
}

/// Iterator over the segments of a logical buffer, created by [`Segments::iter()`].
#[derive(Debug)]
pub struct SegmentIter<'s, S: ?Sized> {
    segments: &'s S,
    next_index: usize,
}

impl<'s, S: Segments + ?Sized> Iterator for SegmentIter<'s, S> {
    type Item = &'s [S::Item];

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_index >= self.segments.count() {
            return None;
        }

        let segment = self.segments.segment(self.next_index);

        self.next_index = self
            .next_index
            .checked_add(1)
            .expect("segment index is bounded by the segment count");

        Some(segment)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.segments.count().saturating_sub(self.next_index);
        (remaining, Some(remaining))
    }
}

impl<S: Segments + ?Sized> ExactSizeIterator for SegmentIter<'_, S> {}

impl<S: Segments + ?Sized> FusedIterator for SegmentIter<'_, S> {}

impl<S: Segments + ?Sized> Segments for &S {
    type Item = S::Item;

    fn buffer_length(&self) -> usize {
        (**self).buffer_length()
    }

    fn total_length(&self) -> usize {
        (**self).total_length()
    }

    fn count(&self) -> usize {
        (**self).count()
    }

    fn segment(&self, index: usize) -> &[Self::Item] {
        (**self).segment(index)
    }
}

impl<S: Segments + ?Sized> Segments for &mut S {
    type Item = S::Item;

    fn buffer_length(&self) -> usize {
        (**self).buffer_length()
    }

    fn total_length(&self) -> usize {
        (**self).total_length()
    }

    fn count(&self) -> usize {
        (**self).count()
    }

    fn segment(&self, index: usize) -> &[Self::Item] {
        (**self).segment(index)
    }
}

impl<S: SegmentsMut + ?Sized> SegmentsMut for &mut S {
    fn segment_mut(&mut self, index: usize) -> &mut [Self::Item] {
        (**self).segment_mut(index)
    }
}

/// Splits `total_length` into segment lengths of at most `buffer_length` each.
///
/// Every segment but the last gets exactly `buffer_length` elements.
pub(crate) fn segment_lengths(
    total_length: usize,
    buffer_length: usize,
) -> impl Iterator<Item = usize> {
    debug_assert!(buffer_length > 0 || total_length == 0);

    let count = if total_length == 0 {
        0
    } else {
        total_length.div_ceil(buffer_length)
    };

    (0..count).map(move |index| {
        let start = index.saturating_mul(buffer_length);
        total_length.saturating_sub(start).min(buffer_length)
    })
}

/// Checks that `lengths` describe a valid segment layout: every segment is non-empty, all but
/// the last are equally long and the last is not longer than the others.
///
/// Returns the buffer length and the total length.
pub(crate) fn validate_layout(lengths: &[usize]) -> Option<(usize, usize)> {
    let Some((&last, rest)) = lengths.split_last() else {
        return Some((0, 0));
    };

    let buffer_length = rest.first().copied().unwrap_or(last);

    if last == 0 || last > buffer_length || rest.iter().any(|&len| len != buffer_length) {
        return None;
    }

    let total_length = lengths
        .iter()
        .try_fold(0_usize, |total, &len| total.checked_add(len))?;

    Some((buffer_length, total_length))
}
