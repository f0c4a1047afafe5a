//! In-memory styled text buffer
//!
//! A small presentation layer: text, attribute runs and a viewport. Like a
//! platform text storage it reports every mutation to an observer, including
//! the attribute-only "edits" caused by styling.

use crate::error::{HighlightError, Result};
use crate::range::{self, ContentEdit};
use crate::style::{StyleAttributes, StyleResolver};
use crate::text_system::{TextContent, TextSystemInterface};
use crate::token::Token;
use std::borrow::Cow;
use std::cell::RefCell;
use std::ops::{BitOr, Range};
use std::rc::{Rc, Weak};
use std::sync::Arc;

/// Edit operations
#[derive(Clone, Debug)]
pub enum Edit {
    Insert { pos: usize, content: String },
    Delete { range: Range<usize> },
    Replace { range: Range<usize>, content: String },
}

impl Edit {
    /// Span replaced by the edit, in pre-edit coordinates
    pub fn target(&self) -> Range<usize> {
        match self {
            Edit::Insert { pos, .. } => *pos..*pos,
            Edit::Delete { range } | Edit::Replace { range, .. } => range.clone(),
        }
    }

    fn content(&self) -> &str {
        match self {
            Edit::Insert { content, .. } | Edit::Replace { content, .. } => content,
            Edit::Delete { .. } => "",
        }
    }
}

/// Which aspects of the buffer an edit changed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EditMask(u8);

impl EditMask {
    pub const CHARACTERS: Self = Self(1);
    pub const ATTRIBUTES: Self = Self(1 << 1);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for EditMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Receives the buffer's edit notifications
pub trait EditObserver {
    /// Before a mutation; `range` is in pre-edit coordinates
    fn will_process_editing(&self, mask: EditMask, range: Range<usize>);

    /// After a mutation; `range` is in post-edit coordinates
    fn did_process_editing(&self, mask: EditMask, range: Range<usize>, delta: isize);

    /// The viewport moved or was resized
    fn viewport_did_change(&self) {}
}

/// A styled span of text
#[derive(Clone, Debug, PartialEq)]
pub struct StyleRun {
    pub range: Range<usize>,
    pub token: Arc<str>,
    pub style: StyleAttributes,
}

/// Text plus attribute runs
#[derive(Clone, Debug)]
pub struct StyledBuffer {
    text: String,
    /// Sorted, disjoint runs; `None` when the buffer cannot hold attributes
    runs: Option<Vec<StyleRun>>,
    viewport: Option<Range<usize>>,
}

impl StyledBuffer {
    /// Buffer with attribute storage
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            runs: Some(Vec::new()),
            viewport: None,
        }
    }

    /// Buffer without attribute storage (cannot be highlighted)
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            runs: None,
            viewport: None,
        }
    }

    /// Buffer from raw bytes, which must be UTF-8
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let text = simdutf8::basic::from_utf8(bytes).map_err(|_| HighlightError::Utf8)?;
        Ok(Self::new(text))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn has_attribute_storage(&self) -> bool {
        self.runs.is_some()
    }

    pub fn runs(&self) -> &[StyleRun] {
        self.runs.as_deref().unwrap_or(&[])
    }

    /// Run covering `pos`, if styled
    pub fn run_at(&self, pos: usize) -> Option<&StyleRun> {
        let runs = self.runs();
        let idx = runs.partition_point(|run| run.range.end <= pos);
        runs.get(idx).filter(|run| run.range.start <= pos)
    }

    pub fn viewport(&self) -> Option<Range<usize>> {
        self.viewport.clone().map(|v| range::clamp(v, self.text.len()))
    }

    pub fn set_viewport(&mut self, viewport: Option<Range<usize>>) {
        self.viewport = viewport;
    }

    /// Apply a text edit. Returns `None` when the edit doesn't fit the text.
    pub fn apply(&mut self, edit: &Edit) -> Option<ContentEdit> {
        let target = edit.target();
        if !self.is_valid_range(&target) {
            return None;
        }

        let content = edit.content();
        self.text.replace_range(target.clone(), content);
        let change = ContentEdit::replace(target, content.len());

        if let Some(runs) = &mut self.runs {
            let mut moved: Vec<StyleRun> = Vec::with_capacity(runs.len());
            for run in runs.drain(..) {
                let adjusted = range::adjust(run.range.clone(), &change);
                for piece in range::subtract(&adjusted, &change.range) {
                    moved.push(StyleRun {
                        range: piece,
                        ..run.clone()
                    });
                }
            }
            moved.sort_by_key(|run| run.range.start);
            *runs = moved;
        }

        Some(change)
    }

    /// Set or reset the style of `range`. Out-of-bounds parts are ignored.
    pub fn set_style(&mut self, target: Range<usize>, style: Option<(Arc<str>, StyleAttributes)>) -> bool {
        let target = range::clamp(target, self.text.len());
        let Some(runs) = &mut self.runs else {
            return false;
        };
        if target.is_empty() {
            return false;
        }

        let first = runs.partition_point(|run| run.range.end <= target.start);
        let last = runs.partition_point(|run| run.range.start < target.end);

        let mut replacement: Vec<StyleRun> = Vec::with_capacity(3);
        for run in &runs[first..last] {
            if run.range.start < target.start {
                replacement.push(StyleRun {
                    range: run.range.start..target.start,
                    ..run.clone()
                });
            }
        }
        if let Some((token, style)) = style {
            replacement.push(StyleRun {
                range: target.clone(),
                token,
                style,
            });
        }
        for run in &runs[first..last] {
            if run.range.end > target.end {
                replacement.push(StyleRun {
                    range: target.end..run.range.end,
                    ..run.clone()
                });
            }
        }

        let inserted = replacement.len();
        runs.splice(first..last, replacement);
        coalesce(runs, first.saturating_sub(1)..first + inserted + 1);
        true
    }

    fn is_valid_range(&self, range: &Range<usize>) -> bool {
        range.start <= range.end
            && range.end <= self.text.len()
            && self.text.is_char_boundary(range.start)
            && self.text.is_char_boundary(range.end)
    }
}

/// Join touching runs with the same token and style within `window`
fn coalesce(runs: &mut Vec<StyleRun>, window: Range<usize>) {
    let mut end = window.end.min(runs.len());
    let mut i = window.start;
    while i + 1 < end {
        let (left, right) = (&runs[i], &runs[i + 1]);
        if left.range.end == right.range.start && left.token == right.token && left.style == right.style {
            runs[i].range.end = runs[i + 1].range.end;
            runs.remove(i + 1);
            end -= 1;
        } else {
            i += 1;
        }
    }
}

/// Shared handle to a [`StyledBuffer`] for the owner thread
///
/// This is the text system the highlighter styles. Every mutation, including
/// style application, is reported to the attached observer after the buffer
/// borrow is released, so the observer may read the buffer.
#[derive(Clone)]
pub struct SharedBuffer {
    inner: Rc<RefCell<StyledBuffer>>,
    resolver: Rc<dyn StyleResolver>,
    observer: Rc<RefCell<Option<Weak<dyn EditObserver>>>>,
}

impl SharedBuffer {
    pub fn new(buffer: StyledBuffer, resolver: impl StyleResolver + 'static) -> Self {
        Self::with_resolver(buffer, Rc::new(resolver))
    }

    /// Use a resolver the caller keeps a handle to (e.g. to swap themes)
    pub fn with_resolver(buffer: StyledBuffer, resolver: Rc<dyn StyleResolver>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(buffer)),
            resolver,
            observer: Rc::new(RefCell::new(None)),
        }
    }

    /// Attach the observer that receives edit notifications
    pub fn set_observer(&self, observer: Weak<dyn EditObserver>) {
        *self.observer.borrow_mut() = Some(observer);
    }

    pub fn clear_observer(&self) {
        self.observer.borrow_mut().take();
    }

    /// Mutate the text, notifying the observer before and after
    pub fn edit(&self, edit: Edit) -> Option<ContentEdit> {
        let target = edit.target();
        if !self.inner.borrow().is_valid_range(&target) {
            tracing::warn!(?target, "rejecting edit outside the buffer");
            return None;
        }

        if let Some(observer) = self.observer() {
            observer.will_process_editing(EditMask::CHARACTERS, target);
        }
        let change = self.inner.borrow_mut().apply(&edit)?;
        if let Some(observer) = self.observer() {
            observer.did_process_editing(EditMask::CHARACTERS, change.range.clone(), change.delta);
        }
        Some(change)
    }

    pub fn insert(&self, pos: usize, content: &str) -> Option<ContentEdit> {
        self.edit(Edit::Insert {
            pos,
            content: content.to_string(),
        })
    }

    pub fn delete(&self, range: Range<usize>) -> Option<ContentEdit> {
        self.edit(Edit::Delete { range })
    }

    pub fn replace(&self, range: Range<usize>, content: &str) -> Option<ContentEdit> {
        self.edit(Edit::Replace {
            range,
            content: content.to_string(),
        })
    }

    /// Scroll or resize; notifies the observer
    pub fn set_viewport(&self, viewport: Option<Range<usize>>) {
        self.inner.borrow_mut().set_viewport(viewport);
        if let Some(observer) = self.observer() {
            observer.viewport_did_change();
        }
    }

    pub fn text(&self) -> String {
        self.inner.borrow().text().to_string()
    }

    pub fn runs(&self) -> Vec<StyleRun> {
        self.inner.borrow().runs().to_vec()
    }

    pub fn run_at(&self, pos: usize) -> Option<StyleRun> {
        self.inner.borrow().run_at(pos).cloned()
    }

    /// Token name styling `pos`, if any
    pub fn token_at(&self, pos: usize) -> Option<Arc<str>> {
        self.run_at(pos).map(|run| run.token)
    }

    fn observer(&self) -> Option<Rc<dyn EditObserver>> {
        self.observer.borrow().as_ref().and_then(Weak::upgrade)
    }

    fn restyle(&self, target: Range<usize>, style: Option<(Arc<str>, StyleAttributes)>) {
        let changed = self.inner.borrow_mut().set_style(target.clone(), style);
        if !changed {
            return;
        }
        if let Some(observer) = self.observer() {
            observer.will_process_editing(EditMask::ATTRIBUTES, target.clone());
            observer.did_process_editing(EditMask::ATTRIBUTES, target, 0);
        }
    }
}

impl TextContent for SharedBuffer {
    fn length(&self) -> usize {
        self.inner.borrow().len()
    }

    fn content(&self, range: Range<usize>) -> Option<Cow<'_, str>> {
        let buffer = self.inner.borrow();
        buffer.text().get(range).map(|s| Cow::Owned(s.to_string()))
    }

    fn full_text(&self) -> Cow<'_, str> {
        Cow::Owned(self.text())
    }
}

impl TextSystemInterface for SharedBuffer {
    fn apply_style(&self, token: &Token) {
        let style = self.resolver.resolve(&token.name);
        self.restyle(token.range.clone(), Some((token.name.clone(), style)));
    }

    fn clear_style(&self, range: Range<usize>) {
        self.restyle(range, None);
    }

    fn visible_range(&self) -> Option<Range<usize>> {
        self.inner.borrow().viewport()
    }

    fn has_attribute_storage(&self) -> bool {
        self.inner.borrow().has_attribute_storage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyword() -> (Arc<str>, StyleAttributes) {
        (Arc::from("keyword"), StyleAttributes::color(0xC678DDFF))
    }

    #[test]
    fn test_set_style_splits_runs() {
        let mut buffer = StyledBuffer::new("let x = 1");
        buffer.set_style(0..9, Some(keyword()));
        buffer.set_style(4..5, None);

        let ranges: Vec<_> = buffer.runs().iter().map(|r| r.range.clone()).collect();
        assert_eq!(ranges, vec![0..4, 5..9]);
        assert!(buffer.run_at(4).is_none());
        assert_eq!(buffer.run_at(8).map(|r| &*r.token), Some("keyword"));
    }

    #[test]
    fn test_touching_runs_of_one_token_merge() {
        let mut buffer = StyledBuffer::new("let abcd = 1");
        buffer.set_style(5..6, Some(keyword()));
        buffer.set_style(4..5, Some(keyword()));
        buffer.set_style(6..8, Some(keyword()));
        buffer.set_style(8..9, Some((Arc::from("operator"), StyleAttributes::color(0x56B6C2FF))));

        let ranges: Vec<_> = buffer.runs().iter().map(|r| r.range.clone()).collect();
        assert_eq!(ranges, vec![4..8, 8..9]);
    }

    #[test]
    fn test_out_of_bounds_style_is_clipped() {
        let mut buffer = StyledBuffer::new("abc");
        assert!(buffer.set_style(1..50, Some(keyword())));
        assert_eq!(buffer.runs()[0].range, 1..3);
        assert!(!buffer.set_style(10..20, Some(keyword())));
    }

    #[test]
    fn test_plain_buffer_has_no_storage() {
        let mut buffer = StyledBuffer::plain("abc");
        assert!(!buffer.has_attribute_storage());
        assert!(!buffer.set_style(0..3, Some(keyword())));
    }

    #[test]
    fn test_edit_moves_runs() {
        let mut buffer = StyledBuffer::new("let x = 1");
        buffer.set_style(0..3, Some(keyword()));
        buffer.set_style(8..9, Some(keyword()));

        let change = buffer.apply(&Edit::Insert {
            pos: 0,
            content: "//".into(),
        });
        assert_eq!(change, Some(ContentEdit::new(0..2, 2)));
        assert_eq!(buffer.text(), "//let x = 1");

        let ranges: Vec<_> = buffer.runs().iter().map(|r| r.range.clone()).collect();
        assert_eq!(ranges, vec![2..5, 10..11]);
    }

    #[test]
    fn test_insert_inside_run_leaves_gap() {
        let mut buffer = StyledBuffer::new("abcdef");
        buffer.set_style(0..6, Some(keyword()));
        buffer.apply(&Edit::Insert {
            pos: 3,
            content: "XY".into(),
        });

        let ranges: Vec<_> = buffer.runs().iter().map(|r| r.range.clone()).collect();
        assert_eq!(ranges, vec![0..3, 5..8]);
    }

    #[test]
    fn test_rejects_non_boundary_edit() {
        let mut buffer = StyledBuffer::new("héllo");
        assert!(buffer.apply(&Edit::Delete { range: 1..2 }).is_none());
        assert!(buffer.apply(&Edit::Delete { range: 1..3 }).is_some());
        assert_eq!(buffer.text(), "hllo");
    }

    #[test]
    fn test_from_bytes_rejects_invalid_utf8() {
        assert!(StyledBuffer::from_bytes(b"fn main() {}").is_ok());
        assert!(StyledBuffer::from_bytes(&[0xff, 0xfe]).is_err());
    }
}
