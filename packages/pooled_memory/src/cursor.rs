use crate::{Segments, SegmentsMut};

/// A position within the segments of a logical buffer, used to walk across segment boundaries.
///
/// The cursor only ever exposes elements of one segment at a time. Callers ask how many elements
/// remain in the current segment via [`look_ahead()`][Self::look_ahead], process at most that
/// many and then move on via [`forward()`][Self::forward]. Moving forward by exactly the
/// look-ahead crosses into the next segment.
///
/// # Examples
///
/// ```
/// use pooled_memory::{ConsumedGroup, MemoryGroup, SegmentCursor};
///
/// let mut first = [1_u8, 2, 3];
/// let mut second = [4_u8];
/// let group = ConsumedGroup::new(vec![&mut first[..], &mut second[..]]).unwrap();
///
/// let mut cursor = SegmentCursor::new(group.read().unwrap());
///
/// assert_eq!(cursor.look_ahead(), 3);
/// assert_eq!(cursor.span(2), &[1, 2]);
/// cursor.forward(2);
///
/// assert_eq!(cursor.look_ahead(), 1);
/// cursor.forward(1);
///
/// assert_eq!(cursor.span(1), &[4]);
/// assert_eq!(cursor.position(), 3);
/// ```
#[derive(Debug)]
pub struct SegmentCursor<S> {
    segments: S,
    segment_index: usize,
    offset: usize,
    position: usize,
}

impl<S: Segments> SegmentCursor<S> {
    /// Creates a cursor positioned at the first element.
    #[must_use]
    pub fn new(segments: S) -> Self {
        Self {
            segments,
            segment_index: 0,
            offset: 0,
            position: 0,
        }
    }

    /// The number of elements remaining in the current segment. Zero once every segment has
    /// been passed.
    #[must_use]
    pub fn look_ahead(&self) -> usize {
        if self.segment_index >= self.segments.count() {
            return 0;
        }

        self.segments
            .segment(self.segment_index)
            .len()
            .saturating_sub(self.offset)
    }

    /// The next `length` elements.
    ///
    /// # Panics
    ///
    /// Panics if `length` exceeds [`look_ahead()`][Self::look_ahead].
    #[must_use]
    pub fn span(&self, length: usize) -> &[S::Item] {
        let end = self.span_end(length);

        if length == 0 {
            return &[];
        }

        self.segments
            .segment(self.segment_index)
            .get(self.offset..end)
            .expect("span_end guarantees the range lies within the current segment")
    }

    /// Moves past the next `length` elements. Moving by exactly the look-ahead crosses into the
    /// next segment.
    ///
    /// # Panics
    ///
    /// Panics if `length` exceeds [`look_ahead()`][Self::look_ahead], which would cross more
    /// than one segment boundary.
    pub fn forward(&mut self, length: usize) {
        let remaining = self.look_ahead();

        assert!(
            length <= remaining,
            "cannot move forward by {length} elements when only {remaining} remain in the current segment"
        );

        self.position = self
            .position
            .checked_add(length)
            .expect("position is bounded by the total length of the segments");

        if length == remaining && remaining != 0 {
            self.segment_index = self
                .segment_index
                .checked_add(1)
                .expect("segment index is bounded by the segment count");
            self.offset = 0;
        } else {
            self.offset = self
                .offset
                .checked_add(length)
                .expect("offset is bounded by the segment length");
        }
    }

    /// The number of elements passed so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Whether every element has been passed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.segment_index >= self.segments.count()
    }

    /// Consumes the cursor, returning the segments it walked.
    #[must_use]
    pub fn into_inner(self) -> S {
        self.segments
    }

    fn span_end(&self, length: usize) -> usize {
        let remaining = self.look_ahead();

        assert!(
            length <= remaining,
            "requested a span of {length} elements when only {remaining} remain in the current segment"
        );

        self.offset
            .checked_add(length)
            .expect("bounded by the segment length")
    }
}

impl<S: SegmentsMut> SegmentCursor<S> {
    /// The next `length` elements, for modification.
    ///
    /// # Panics
    ///
    /// Panics if `length` exceeds [`look_ahead()`][Self::look_ahead].
    #[must_use]
    pub fn span_mut(&mut self, length: usize) -> &mut [S::Item] {
        let end = self.span_end(length);

        if length == 0 {
            return &mut [];
        }

        self.segments
            .segment_mut(self.segment_index)
            .get_mut(self.offset..end)
            .expect("span_end guarantees the range lies within the current segment")
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{ConsumedGroup, MemoryGroup};

    #[test]
    fn walks_across_boundaries() {
        let mut a = [1_u8, 2];
        let mut b = [3_u8, 4];
        let mut c = [5_u8];
        let group = ConsumedGroup::new(vec![&mut a[..], &mut b[..], &mut c[..]]).unwrap();
        let mut cursor = SegmentCursor::new(group.read().unwrap());

        let mut seen = Vec::new();
        while !cursor.is_finished() {
            let step = cursor.look_ahead().min(1);
            seen.extend_from_slice(cursor.span(step));
            cursor.forward(step);
        }

        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert_eq!(cursor.position(), 5);
        assert_eq!(cursor.look_ahead(), 0);
    }

    #[test]
    fn forward_within_segment_keeps_segment() {
        let mut a = [1_u8, 2, 3];
        let group = ConsumedGroup::single(&mut a);
        let mut cursor = SegmentCursor::new(group.read().unwrap());

        cursor.forward(1);

        assert_eq!(cursor.look_ahead(), 2);
        assert_eq!(cursor.span(2), &[2, 3]);
    }

    #[test]
    fn span_mut_writes_through() {
        let mut a = [0_u8; 2];
        let mut b = [0_u8; 2];
        let mut group = ConsumedGroup::new(vec![&mut a[..], &mut b[..]]).unwrap();

        {
            let mut cursor = SegmentCursor::new(group.write().unwrap());
            cursor.forward(2);
            cursor.span_mut(2).copy_from_slice(&[7, 8]);
        }
        drop(group);

        assert_eq!(b, [7, 8]);
    }

    #[test]
    fn empty_buffer_is_finished() {
        let group = ConsumedGroup::<u8>::new(Vec::new()).unwrap();
        let mut cursor = SegmentCursor::new(group.read().unwrap());

        assert!(cursor.is_finished());
        assert_eq!(cursor.look_ahead(), 0);
        assert!(cursor.span(0).is_empty());

        cursor.forward(0);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    #[should_panic]
    fn forward_past_two_boundaries_panics() {
        let mut a = [0_u8; 2];
        let mut b = [0_u8; 2];
        let group = ConsumedGroup::new(vec![&mut a[..], &mut b[..]]).unwrap();
        let mut cursor = SegmentCursor::new(group.read().unwrap());

        cursor.forward(3);
    }

    #[test]
    #[should_panic]
    fn span_longer_than_look_ahead_panics() {
        let mut a = [0_u8; 2];
        let group = ConsumedGroup::single(&mut a);
        let cursor = SegmentCursor::new(group.read().unwrap());

        let _span = cursor.span(3);
    }
}
