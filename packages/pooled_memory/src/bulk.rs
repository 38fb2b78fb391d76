//! Operations over whole logical buffers that cross segment boundaries transparently.

use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut, Range};

use num_integer::Integer;

use crate::{Error, MemoryGroup, Result, SegmentCursor, Segments, SegmentsMut};

/// Sets every element of the logical buffer to `value`.
///
/// # Errors
///
/// Fails under the same conditions as [`MemoryGroup::write()`].
pub fn fill<G: MemoryGroup>(group: &mut G, value: G::Item) -> Result<()> {
    transform_inplace(group, |span| span.fill(value))
}

/// Sets every element of the logical buffer to zero.
///
/// # Errors
///
/// Fails under the same conditions as [`MemoryGroup::write()`].
pub fn clear<G: MemoryGroup>(group: &mut G) -> Result<()> {
    transform_inplace(group, bytemuck::fill_zeroes)
}

/// Applies `f` to the span of every segment in order.
///
/// # Errors
///
/// Fails under the same conditions as [`MemoryGroup::write()`].
///
/// # Examples
///
/// ```
/// use pooled_memory::{ConsumedGroup, transform_inplace};
///
/// let mut first = [1_i32, 2];
/// let mut second = [3_i32];
/// let mut group = ConsumedGroup::new(vec![&mut first[..], &mut second[..]]).unwrap();
///
/// transform_inplace(&mut group, |span| span.iter_mut().for_each(|x| *x *= 10)).unwrap();
/// drop(group);
///
/// assert_eq!(first, [10, 20]);
/// assert_eq!(second, [30]);
/// ```
pub fn transform_inplace<G, F>(group: &mut G, mut f: F) -> Result<()>
where
    G: MemoryGroup,
    F: FnMut(&mut [G::Item]),
{
    let mut segments = group.write()?;

    for index in 0..segments.count() {
        f(segments.segment_mut(index));
    }

    Ok(())
}

/// Copies the whole logical buffer into the start of `dest`.
///
/// # Errors
///
/// Returns [`Error::ContractViolation`] if `dest` is shorter than the logical buffer, before
/// anything is copied. Otherwise fails under the same conditions as [`MemoryGroup::read()`].
pub fn copy_to_slice<G: MemoryGroup>(source: &G, dest: &mut [G::Item]) -> Result<()> {
    let segments = source.read()?;

    ensure_fits(segments.total_length(), dest.len())?;

    let mut remaining = dest;

    for span in segments.iter() {
        let (head, tail) = mem::take(&mut remaining).split_at_mut(span.len());
        head.copy_from_slice(span);
        remaining = tail;
    }

    Ok(())
}

/// Copies `source` into the start of the logical buffer.
///
/// # Errors
///
/// Returns [`Error::ContractViolation`] if the logical buffer is shorter than `source`, before
/// anything is copied. Otherwise fails under the same conditions as [`MemoryGroup::write()`].
pub fn copy_from_slice<G: MemoryGroup>(source: &[G::Item], dest: &mut G) -> Result<()> {
    let mut segments = dest.write()?;

    ensure_fits(source.len(), segments.total_length())?;

    let mut remaining = source;

    for index in 0..segments.count() {
        if remaining.is_empty() {
            break;
        }

        let span = segments.segment_mut(index);
        let step = span.len().min(remaining.len());

        let (head, tail) = remaining.split_at(step);
        span.get_mut(..step)
            .expect("step is bounded by the span length")
            .copy_from_slice(head);
        remaining = tail;
    }

    Ok(())
}

/// Copies the whole of `source` into the start of `dest`.
///
/// The two logical buffers may have different segment layouts.
///
/// # Errors
///
/// * [`Error::ContractViolation`] if `dest` is shorter than `source`, before anything is
///   copied.
/// * [`Error::GroupBusy`] if `source` and `dest` are views of the same logical buffer.
/// * Otherwise fails under the same conditions as [`MemoryGroup::read()`] and
///   [`MemoryGroup::write()`].
///
/// # Examples
///
/// ```
/// use pooled_memory::{ConsumedGroup, copy_to};
///
/// let mut a = [1_u8, 2, 3];
/// let mut b = [4_u8, 5, 6];
/// let mut c = [7_u8];
/// let source = ConsumedGroup::new(vec![&mut a[..], &mut b[..], &mut c[..]]).unwrap();
///
/// let mut x = [0_u8; 5];
/// let mut y = [0_u8; 5];
/// let mut dest = ConsumedGroup::new(vec![&mut x[..], &mut y[..]]).unwrap();
///
/// copy_to(&source, &mut dest).unwrap();
/// drop(dest);
///
/// assert_eq!(x, [1, 2, 3, 4, 5]);
/// assert_eq!(y, [6, 7, 0, 0, 0]);
/// ```
pub fn copy_to<S, D>(source: &S, dest: &mut D) -> Result<()>
where
    S: MemoryGroup,
    D: MemoryGroup<Item = S::Item>,
{
    transform_to(source, dest, |from, to| to.copy_from_slice(from))
}

/// Walks `source` and the start of `dest` in lockstep, handing `f` pairs of equally long spans
/// until every element of `source` has been visited.
///
/// The spans never cross a segment boundary on either side, so `f` may be called with more
/// (and shorter) spans than either logical buffer has segments.
///
/// # Errors
///
/// Fails under the same conditions as [`copy_to()`].
pub fn transform_to<S, D, F>(source: &S, dest: &mut D, mut f: F) -> Result<()>
where
    S: MemoryGroup,
    D: MemoryGroup,
    F: FnMut(&[S::Item], &mut [D::Item]),
{
    let source_segments = source.read()?;
    let dest_segments = dest.write()?;

    let source_length = source_segments.total_length();
    ensure_fits(source_length, dest_segments.total_length())?;

    let mut from = SegmentCursor::new(source_segments);
    let mut to = SegmentCursor::new(dest_segments);

    while from.position() < source_length {
        let step = from.look_ahead().min(to.look_ahead());
        assert!(step > 0, "segments of a logical buffer are never empty");

        f(from.span(step), to.span_mut(step));

        from.forward(step);
        to.forward(step);
    }

    Ok(())
}

/// Obtains a contiguous slice of `length` elements starting at element `start`.
///
/// The slice is backed by a single segment, so it must not straddle a segment boundary. The
/// returned [`BoundedSlice`] holds the write guard of the logical buffer for as long as it
/// exists.
///
/// # Errors
///
/// * [`Error::ContractViolation`] if `start` is not an element of the logical buffer or the
///   slice would extend past its end.
/// * [`Error::CrossSegmentSliceRequest`] if the slice would straddle a segment boundary.
/// * Otherwise fails under the same conditions as [`MemoryGroup::write()`].
///
/// # Examples
///
/// ```
/// use pooled_memory::{ConsumedGroup, Error, get_bounded_slice};
///
/// let mut first = [1_u8, 2, 3];
/// let mut second = [4_u8, 5, 6];
/// let mut group = ConsumedGroup::new(vec![&mut first[..], &mut second[..]]).unwrap();
///
/// let mut slice = get_bounded_slice(&mut group, 3, 2).unwrap();
/// assert_eq!(&*slice, &[4, 5]);
/// slice[0] = 40;
/// drop(slice);
///
/// assert!(matches!(
///     get_bounded_slice(&mut group, 2, 2),
///     Err(Error::CrossSegmentSliceRequest { .. })
/// ));
///
/// drop(group);
/// assert_eq!(second, [40, 5, 6]);
/// ```
pub fn get_bounded_slice<G: MemoryGroup>(
    group: &mut G,
    start: usize,
    length: usize,
) -> Result<BoundedSlice<G::Write<'_>>> {
    let segments = group.write()?;
    let total_length = segments.total_length();

    let in_range = start < total_length
        && start
            .checked_add(length)
            .is_some_and(|end| end <= total_length);

    if !in_range {
        return Err(Error::contract_violation(format!(
            "slice [{start}, {start}+{length}) is out of range for a buffer of {total_length} elements"
        )));
    }

    let buffer_length = segments.buffer_length();
    let (index, offset) = start.div_rem(&buffer_length);

    let end = offset
        .checked_add(length)
        .expect("offset and length are both bounded by the total length");

    if end > segments.segment(index).len() {
        return Err(Error::CrossSegmentSliceRequest {
            start,
            length,
            buffer_length,
        });
    }

    Ok(BoundedSlice {
        segments,
        index,
        range: offset..end,
    })
}

fn ensure_fits(source_length: usize, dest_length: usize) -> Result<()> {
    if dest_length < source_length {
        return Err(Error::contract_violation(format!(
            "destination of {dest_length} elements cannot hold {source_length} source elements"
        )));
    }

    Ok(())
}

/// A contiguous part of a single segment of a logical buffer, obtained from
/// [`get_bounded_slice()`].
///
/// Dereferences to the elements of the slice. The logical buffer stays locked for writing for as
/// long as this exists.
pub struct BoundedSlice<W: SegmentsMut> {
    segments: W,
    index: usize,
    range: Range<usize>,
}

impl<W: SegmentsMut> BoundedSlice<W> {
    /// Index of the segment the slice lies in.
    #[must_use]
    pub fn segment_index(&self) -> usize {
        self.index
    }
}

impl<W: SegmentsMut> Deref for BoundedSlice<W> {
    type Target = [W::Item];

    fn deref(&self) -> &Self::Target {
        self.segments
            .segment(self.index)
            .get(self.range.clone())
            .expect("range was validated against the segment when the slice was created")
    }
}

impl<W: SegmentsMut> DerefMut for BoundedSlice<W> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.segments
            .segment_mut(self.index)
            .get_mut(self.range.clone())
            .expect("range was validated against the segment when the slice was created")
    }
}

impl<W: SegmentsMut> fmt::Debug for BoundedSlice<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedSlice")
            .field("index", &self.index)
            .field("range", &self.range)
            .finish_non_exhaustive()
    }
}
