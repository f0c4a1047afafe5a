//! Tracking of buffer regions whose style is out of date
//!
//! The tracker is either "everything is stale" or a sorted set of disjoint
//! stale ranges. It never looks at text; callers pass the buffer length when
//! the answer depends on it.

use crate::range::{self, ContentEdit};
use std::ops::Range;

/// What to mark as stale
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextTarget {
    /// The whole buffer
    All,
    /// Specific ranges (need not be sorted or disjoint)
    Set(Vec<Range<usize>>),
}

impl TextTarget {
    /// Target covering a single range
    pub fn range(range: Range<usize>) -> Self {
        Self::Set(vec![range])
    }
}

impl From<Range<usize>> for TextTarget {
    fn from(range: Range<usize>) -> Self {
        Self::range(range)
    }
}

/// Set of stale regions
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvalidationTracker {
    /// Every position is stale until explicitly cleared
    All,
    /// Sorted, disjoint, non-empty stale ranges
    Ranges(Vec<Range<usize>>),
}

impl Default for InvalidationTracker {
    fn default() -> Self {
        Self::Ranges(Vec::new())
    }
}

impl InvalidationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when nothing is stale
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Ranges(ranges) if ranges.is_empty())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Mark a target as stale
    pub fn invalidate(&mut self, target: &TextTarget) {
        let ranges = match target {
            TextTarget::All => {
                *self = Self::All;
                return;
            }
            TextTarget::Set(ranges) => ranges,
        };
        if let Self::Ranges(existing) = self {
            if ranges.iter().all(|r| r.is_empty()) {
                return;
            }
            let merged = range::union(existing.drain(..).chain(ranges.iter().cloned()));
            *existing = merged;
        }
    }

    /// Mark a single range as stale
    pub fn invalidate_range(&mut self, range: Range<usize>) {
        self.invalidate(&TextTarget::range(range));
    }

    /// Move every stored range into post-edit coordinates
    pub fn translate(&mut self, edit: &ContentEdit) {
        if let Self::Ranges(ranges) = self {
            let adjusted = range::union(ranges.drain(..).map(|r| range::adjust(r, edit)));
            *ranges = adjusted;
        }
    }

    /// Next region to reconcile.
    ///
    /// Stale positions inside `visible` always come first (clipped to the
    /// visible range); otherwise the first stale range in position order.
    pub fn next_region(&self, visible: Option<&Range<usize>>, len: usize) -> Option<Range<usize>> {
        let visible = visible.map(|v| range::clamp(v.clone(), len));

        match self {
            Self::All => {
                if len == 0 {
                    return None;
                }
                match visible {
                    Some(v) if !v.is_empty() => Some(v),
                    _ => Some(0..len),
                }
            }
            Self::Ranges(ranges) => {
                if let Some(v) = &visible {
                    if let Some(hit) = ranges.iter().find_map(|r| range::intersect(r, v)) {
                        return Some(hit);
                    }
                }
                ranges
                    .iter()
                    .map(|r| range::clamp(r.clone(), len))
                    .find(|r| !r.is_empty())
            }
        }
    }

    /// Mark `range` as up to date
    pub fn clear(&mut self, cleared: &Range<usize>, len: usize) {
        if cleared.is_empty() {
            return;
        }
        if let Self::All = self {
            if cleared.start == 0 && cleared.end >= len {
                *self = Self::Ranges(Vec::new());
                return;
            }
            *self = Self::Ranges(if len == 0 { Vec::new() } else { vec![0..len] });
        }
        if let Self::Ranges(ranges) = self {
            let remaining = ranges.iter().flat_map(|r| range::subtract(r, cleared)).collect();
            *ranges = remaining;
        }
    }

    /// True when any stale position overlaps `range`
    pub fn intersects(&self, range: &Range<usize>) -> bool {
        match self {
            Self::All => !range.is_empty(),
            Self::Ranges(ranges) => ranges.iter().any(|r| range::intersects(r, range)),
        }
    }

    /// Stale ranges, with `All` expanded to the whole buffer
    pub fn ranges(&self, len: usize) -> Vec<Range<usize>> {
        match self {
            Self::All if len > 0 => vec![0..len],
            Self::All => Vec::new(),
            Self::Ranges(ranges) => ranges.clone(),
        }
    }

    /// Parts of `range` that are not stale
    pub fn valid_parts(&self, range: &Range<usize>) -> Vec<Range<usize>> {
        match self {
            Self::All => Vec::new(),
            Self::Ranges(ranges) => range::subtract_all(range, ranges),
        }
    }

    /// Drop stale positions at or beyond `len`
    pub fn truncate(&mut self, len: usize) {
        if let Self::Ranges(ranges) = self {
            ranges.retain_mut(|r| {
                *r = range::clamp(r.clone(), len);
                !r.is_empty()
            });
        }
    }

    /// Forget every stale region
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
