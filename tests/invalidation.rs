use tiny_highlight::range::ContentEdit;
use tiny_highlight::{InvalidationTracker, TextTarget};

#[test]
fn test_new_tracker_is_empty() {
    let tracker = InvalidationTracker::new();
    assert!(tracker.is_empty());
    assert_eq!(tracker.next_region(None, 100), None);
}

#[test]
fn test_all_prefers_visible_range() {
    let tracker = InvalidationTracker::All;
    assert_eq!(tracker.next_region(Some(&(40..60)), 100), Some(40..60));
    assert_eq!(tracker.next_region(None, 100), Some(0..100));
    assert_eq!(tracker.next_region(Some(&(90..200)), 100), Some(90..100));
    assert_eq!(tracker.next_region(None, 0), None);
}

#[test]
fn test_overlapping_targets_merge() {
    let mut tracker = InvalidationTracker::new();
    tracker.invalidate(&TextTarget::Set(vec![10..20, 0..5, 15..30, 5..6]));
    assert_eq!(tracker, InvalidationTracker::Ranges(vec![0..6, 10..30]));
}

#[test]
fn test_empty_targets_are_ignored() {
    let mut tracker = InvalidationTracker::new();
    tracker.invalidate(&TextTarget::Set(vec![4..4]));
    assert!(tracker.is_empty());
}

#[test]
fn test_translate_across_deletion() {
    let mut tracker = InvalidationTracker::new();
    tracker.invalidate(&TextTarget::Set(vec![0..4, 10..20, 30..40]));

    // Delete 12..32, which swallows the end of one range and the start of another
    tracker.translate(&ContentEdit::delete(12..32));
    assert_eq!(tracker, InvalidationTracker::Ranges(vec![0..4, 10..20]));
}

#[test]
fn test_all_survives_translation() {
    let mut tracker = InvalidationTracker::All;
    tracker.translate(&ContentEdit::insert(3, 10));
    assert!(tracker.is_all());
}

#[test]
fn test_truncate_to_buffer() {
    let mut tracker = InvalidationTracker::new();
    tracker.invalidate(&TextTarget::Set(vec![0..5, 8..20, 30..40]));
    tracker.truncate(10);
    assert_eq!(tracker.ranges(10), vec![0..5, 8..10]);
}

#[test]
fn test_valid_parts() {
    let mut tracker = InvalidationTracker::new();
    tracker.invalidate_range(4..6);
    assert_eq!(tracker.valid_parts(&(0..10)), vec![0..4, 6..10]);
    assert!(InvalidationTracker::All.valid_parts(&(0..10)).is_empty());
}

#[test]
fn test_reset() {
    let mut tracker = InvalidationTracker::All;
    tracker.reset();
    assert!(tracker.is_empty());
}
