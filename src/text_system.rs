//! Presentation-layer contract consumed by the highlighter
//!
//! Positions are UTF-8 byte offsets on both sides of this boundary.

use crate::token::Token;
use std::borrow::Cow;
use std::ops::Range;

/// Read access to the buffer text
pub trait TextContent {
    /// Current buffer length
    fn length(&self) -> usize;

    /// Text in `range`, or `None` when the range is out of bounds
    fn content(&self, range: Range<usize>) -> Option<Cow<'_, str>>;

    /// The whole buffer
    fn full_text(&self) -> Cow<'_, str> {
        self.content(0..self.length()).unwrap_or(Cow::Borrowed(""))
    }
}

/// Styling target for the highlighter
///
/// Methods take `&self`: the implementation is a handle onto storage owned
/// by the host, and styling may synchronously notify the host's edit
/// machinery. Out-of-bounds ranges must be clipped or ignored, never panic.
pub trait TextSystemInterface: TextContent {
    /// Apply the attributes for `token.name` over `token.range`
    fn apply_style(&self, token: &Token);

    /// Reset `range` to the default style
    fn clear_style(&self, range: Range<usize>);

    /// Currently visible range, `None` before layout
    fn visible_range(&self) -> Option<Range<usize>>;

    /// Whether styles can be stored at all
    fn has_attribute_storage(&self) -> bool {
        true
    }
}

impl TextContent for str {
    fn length(&self) -> usize {
        self.len()
    }

    fn content(&self, range: Range<usize>) -> Option<Cow<'_, str>> {
        self.get(range).map(Cow::Borrowed)
    }
}

impl TextContent for String {
    fn length(&self) -> usize {
        self.len()
    }

    fn content(&self, range: Range<usize>) -> Option<Cow<'_, str>> {
        self.as_str().content(range)
    }
}
