use proptest::prelude::*;
use std::ops::Range;
use tiny_highlight::range::{self, ContentEdit};
use tiny_highlight::{InvalidationTracker, TextTarget};

fn any_range(max: usize) -> impl Strategy<Value = Range<usize>> {
    (0..max, 0..max).prop_map(|(a, b)| a.min(b)..a.max(b))
}

/// An edit against a buffer of `len` bytes, with the post-edit length
fn any_edit(len: usize) -> impl Strategy<Value = (ContentEdit, usize)> {
    (any_range(len + 1), 0..32usize).prop_map(move |(replaced, inserted)| {
        let new_len = len - replaced.len() + inserted;
        (ContentEdit::replace(replaced, inserted), new_len)
    })
}

fn is_canonical(ranges: &[Range<usize>]) -> bool {
    ranges.iter().all(|r| !r.is_empty()) && ranges.windows(2).all(|w| w[0].end < w[1].start)
}

proptest! {
    #[test]
    fn union_is_canonical_and_idempotent(ranges in prop::collection::vec(any_range(200), 0..16)) {
        let merged = range::union(ranges.clone());
        prop_assert!(is_canonical(&merged));
        prop_assert_eq!(range::union(merged.clone()), merged.clone());

        // Every input position stays covered
        for r in &ranges {
            for pos in r.clone() {
                prop_assert!(merged.iter().any(|m| m.contains(&pos)));
            }
        }
    }

    #[test]
    fn adjust_stays_inside_buffer(r in any_range(100), (edit, new_len) in any_edit(100)) {
        let adjusted = range::adjust(r, &edit);
        prop_assert!(adjusted.start <= adjusted.end);
        prop_assert!(adjusted.end <= new_len);
    }

    #[test]
    fn shift_preserves_length(r in any_range(100), (edit, _) in any_edit(100)) {
        if let Some(shifted) = range::shift(r.clone(), &edit) {
            prop_assert_eq!(shifted.len(), r.len());
        }
    }

    #[test]
    fn subtract_leaves_nothing_of_the_cut(r in any_range(100), cut in any_range(100)) {
        for piece in range::subtract(&r, &cut) {
            prop_assert!(!range::intersects(&piece, &cut));
            prop_assert!(piece.start >= r.start && piece.end <= r.end);
        }
    }

    #[test]
    fn tracker_invalidate_is_idempotent(ranges in prop::collection::vec(any_range(200), 0..8)) {
        let mut once = InvalidationTracker::new();
        once.invalidate(&TextTarget::Set(ranges.clone()));
        let mut twice = once.clone();
        twice.invalidate(&TextTarget::Set(ranges));
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn tracker_clear_removes_range(
        ranges in prop::collection::vec(any_range(200), 1..8),
        cleared in any_range(200),
    ) {
        let mut tracker = InvalidationTracker::new();
        tracker.invalidate(&TextTarget::Set(ranges));
        tracker.clear(&cleared, 200);
        prop_assert!(!tracker.intersects(&cleared));
        prop_assert!(is_canonical(&tracker.ranges(200)));
    }
}

#[test]
fn test_adjust_examples() {
    assert_eq!(range::adjust(10..20, &ContentEdit::insert(5, 3)), 13..23);
    assert_eq!(range::adjust(10..20, &ContentEdit::delete(15..17)), 10..18);
    assert_eq!(range::adjust(10..20, &ContentEdit::replace(8..12, 6)), 8..22);
}
