//! Range arithmetic for edit-driven invalidation
//!
//! Pure functions over half-open byte ranges. Every stored range (stale
//! regions, in-flight request targets, late token results) is moved into
//! post-edit coordinates through these helpers.

use std::ops::Range;

/// A single buffer mutation, described in post-edit coordinates
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentEdit {
    /// Span touched by the edit, after the edit was applied
    pub range: Range<usize>,
    /// Signed change in buffer length
    pub delta: isize,
}

impl ContentEdit {
    pub fn new(range: Range<usize>, delta: isize) -> Self {
        Self { range, delta }
    }

    /// Insertion of `len` bytes at `pos`
    pub fn insert(pos: usize, len: usize) -> Self {
        Self::new(pos..pos + len, len as isize)
    }

    /// Deletion of `range` (pre-edit coordinates)
    pub fn delete(range: Range<usize>) -> Self {
        let len = range.end.saturating_sub(range.start);
        Self::new(range.start..range.start, -(len as isize))
    }

    /// Replacement of `range` (pre-edit coordinates) with `new_len` bytes
    pub fn replace(range: Range<usize>, new_len: usize) -> Self {
        let old_len = range.end.saturating_sub(range.start);
        Self::new(
            range.start..range.start + new_len,
            new_len as isize - old_len as isize,
        )
    }

    /// The span the edit replaced, in pre-edit coordinates
    pub fn pre_edit_range(&self) -> Range<usize> {
        let start = self.range.start;
        let end = offset(self.range.end, -self.delta).max(start);
        start..end
    }

    /// Buffer length before the edit, given the length after it
    pub fn old_len(&self, new_len: usize) -> usize {
        offset(new_len, -self.delta)
    }
}

/// Apply a signed delta to a position, clamping at zero
#[inline]
fn offset(pos: usize, delta: isize) -> usize {
    (pos as isize).saturating_add(delta).max(0) as usize
}

/// True when the edit's pre-edit span reaches into the interior of `range`
fn touches_interior(range: &Range<usize>, edit: &ContentEdit) -> bool {
    let pre = edit.pre_edit_range();
    if pre.is_empty() {
        range.start < pre.start && pre.start < range.end
    } else {
        pre.start < range.end && range.start < pre.end
    }
}

/// Move `range` into post-edit coordinates.
///
/// Ranges after the edit shift by the delta, ranges before it are untouched,
/// and overlapped ranges grow or shrink so they still cover the edited text.
pub fn adjust(range: Range<usize>, edit: &ContentEdit) -> Range<usize> {
    let pre = edit.pre_edit_range();

    if pre.end <= range.start && !touches_interior(&range, edit) {
        return offset(range.start, edit.delta)..offset(range.end, edit.delta);
    }
    if pre.start >= range.end {
        return range;
    }

    let start = range.start.min(edit.range.start);
    let end = offset(range.end, edit.delta).max(edit.range.end).max(start);
    start..end
}

/// Like [`adjust`], but refuses to move a range whose interior was edited.
///
/// Used for results computed against older text: their meaning is only
/// preserved when the edit happened strictly outside them.
pub fn shift(range: Range<usize>, edit: &ContentEdit) -> Option<Range<usize>> {
    if touches_interior(&range, edit) {
        return None;
    }
    Some(adjust(range, edit))
}

/// Intersection of two ranges, `None` when they share no position
pub fn intersect(a: &Range<usize>, b: &Range<usize>) -> Option<Range<usize>> {
    let start = a.start.max(b.start);
    let end = a.end.min(b.end);
    (start < end).then_some(start..end)
}

/// True when the ranges share at least one position
#[inline]
pub fn intersects(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// Merge two ranges if they overlap or touch
pub fn merge_two(a: &Range<usize>, b: &Range<usize>) -> Option<Range<usize>> {
    if a.start <= b.end && b.start <= a.end {
        Some(a.start.min(b.start)..a.end.max(b.end))
    } else {
        None
    }
}

/// Minimal sorted set of disjoint ranges covering the input.
///
/// Empty ranges are dropped and touching ranges are coalesced.
pub fn union<I>(ranges: I) -> Vec<Range<usize>>
where
    I: IntoIterator<Item = Range<usize>>,
{
    let mut sorted: Vec<Range<usize>> = ranges.into_iter().filter(|r| !r.is_empty()).collect();
    sorted.sort_by_key(|r| (r.start, r.end));

    let mut merged: Vec<Range<usize>> = Vec::with_capacity(sorted.len());
    for range in sorted {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
            _ => merged.push(range),
        }
    }
    merged
}

/// Remove `cut` from `range`, leaving up to two pieces
pub fn subtract(range: &Range<usize>, cut: &Range<usize>) -> Vec<Range<usize>> {
    if !intersects(range, cut) {
        return if range.is_empty() { Vec::new() } else { vec![range.clone()] };
    }

    let mut pieces = Vec::with_capacity(2);
    if range.start < cut.start {
        pieces.push(range.start..cut.start);
    }
    if cut.end < range.end {
        pieces.push(cut.end..range.end);
    }
    pieces
}

/// Remove every range in `cuts` (sorted, disjoint) from `range`
pub fn subtract_all(range: &Range<usize>, cuts: &[Range<usize>]) -> Vec<Range<usize>> {
    let mut pieces = if range.is_empty() { Vec::new() } else { vec![range.clone()] };
    for cut in cuts {
        pieces = pieces.iter().flat_map(|piece| subtract(piece, cut)).collect();
        if pieces.is_empty() {
            break;
        }
    }
    pieces
}

/// Clip `range` to `0..len`
#[inline]
pub fn clamp(range: Range<usize>, len: usize) -> Range<usize> {
    let end = range.end.min(len);
    range.start.min(end)..end
}
