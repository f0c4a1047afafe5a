//! Glue between a [`SharedBuffer`] and a [`Highlighter`]

use crate::buffer::{EditMask, EditObserver, SharedBuffer};
use crate::config::HighlighterConfig;
use crate::error::Result;
use crate::highlighter::Highlighter;
use crate::invalidation::TextTarget;
use crate::syntax::{LanguageConfig, TreeSitterClient};
use crate::token::{TokenProvider, Waker};
use std::ops::Range;
use std::rc::{Rc, Weak};

/// Forwards buffer notifications to the highlighter
struct Forwarder<P> {
    highlighter: Weak<Highlighter<SharedBuffer, P>>,
}

impl<P: TokenProvider> Forwarder<P> {
    fn highlighter(&self) -> Option<Rc<Highlighter<SharedBuffer, P>>> {
        self.highlighter.upgrade()
    }
}

impl<P: TokenProvider> EditObserver for Forwarder<P> {
    fn will_process_editing(&self, mask: EditMask, range: Range<usize>) {
        if !mask.contains(EditMask::CHARACTERS) {
            return;
        }
        if let Some(highlighter) = self.highlighter() {
            highlighter.will_change_content(range);
        }
    }

    fn did_process_editing(&self, mask: EditMask, range: Range<usize>, delta: isize) {
        // Attribute-only edits are our own styling coming back
        if !mask.contains(EditMask::CHARACTERS) {
            return;
        }
        if let Some(highlighter) = self.highlighter() {
            highlighter.did_change_content(range, delta);
        }
    }

    fn viewport_did_change(&self) {
        if let Some(highlighter) = self.highlighter() {
            highlighter.visible_content_did_change();
        }
    }
}

/// Highlights a [`SharedBuffer`] as it is edited and scrolled
///
/// Dropping it detaches from the buffer; existing styles stay in place.
pub struct BufferHighlighter<P: TokenProvider + 'static> {
    highlighter: Rc<Highlighter<SharedBuffer, P>>,
    /// The buffer only holds a weak reference
    _observer: Rc<dyn EditObserver>,
    buffer: SharedBuffer,
}

impl<P: TokenProvider + 'static> BufferHighlighter<P> {
    /// Attach to `buffer` and highlight it from scratch
    pub fn new(buffer: SharedBuffer, provider: P, config: HighlighterConfig) -> Result<Self> {
        Self::build(buffer, provider, config, None)
    }

    /// Like [`BufferHighlighter::new`], waking the host loop on async deliveries
    pub fn with_waker(
        buffer: SharedBuffer,
        provider: P,
        config: HighlighterConfig,
        waker: Waker,
    ) -> Result<Self> {
        Self::build(buffer, provider, config, Some(waker))
    }

    fn build(
        buffer: SharedBuffer,
        provider: P,
        config: HighlighterConfig,
        waker: Option<Waker>,
    ) -> Result<Self> {
        let mut highlighter = Highlighter::new(buffer.clone(), provider, config)?;
        if let Some(waker) = waker {
            highlighter = highlighter.with_waker(waker);
        }
        let highlighter = Rc::new(highlighter);

        let observer: Rc<dyn EditObserver> = Rc::new(Forwarder {
            highlighter: Rc::downgrade(&highlighter),
        });
        buffer.set_observer(Rc::downgrade(&observer));

        tracing::debug!(mode = ?highlighter.config().mode, "attached highlighter to buffer");
        highlighter.invalidate(TextTarget::All);

        Ok(Self {
            highlighter,
            _observer: observer,
            buffer,
        })
    }

    /// Mark `target` stale (e.g. after a theme change)
    pub fn invalidate(&self, target: TextTarget) {
        self.highlighter.invalidate(target);
    }

    /// Apply asynchronous deliveries; call when the waker fired
    pub fn process_events(&self) -> usize {
        self.highlighter.process_events()
    }

    pub fn highlighter(&self) -> &Highlighter<SharedBuffer, P> {
        &self.highlighter
    }

    pub fn buffer(&self) -> &SharedBuffer {
        &self.buffer
    }
}

impl BufferHighlighter<TreeSitterClient> {
    /// Highlight `buffer` with a tree-sitter grammar
    pub fn for_language(
        buffer: SharedBuffer,
        language: LanguageConfig,
        config: HighlighterConfig,
    ) -> Result<Self> {
        let client = TreeSitterClient::new(language)?.with_config(&config);
        Self::new(buffer, client, config)
    }
}
