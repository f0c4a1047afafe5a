//! Invalidation-driven highlighting coordinator
//!
//! Owns the stale-region tracker and the edit generation counter. Edits are
//! translated into the tracker synchronously; tokens are requested for stale
//! regions (visible first) and applied only if nothing has invalidated them
//! since they were requested.
//!
//! All state lives on one owner thread. Asynchronous providers deliver over a
//! channel, and [`Highlighter::process_events`] applies those deliveries on
//! the owner thread. Entry points take `&self` so the presentation layer may
//! call back in while styles are being applied; such calls are recognized by
//! the [`Phase`] state machine and do not re-enter reconciliation.

use crate::config::HighlighterConfig;
use crate::error::{HighlightError, Result};
use crate::invalidation::{InvalidationTracker, TextTarget};
use crate::range::{self, ContentEdit};
use crate::text_system::{TextContent, TextSystemInterface};
use crate::token::{
    ProviderEvent, RequestId, Token, TokenBatch, TokenCompletion, TokenFetch, TokenProvider, Waker,
};
use ahash::AHashMap;
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::ops::Range;

/// What the coordinator is doing right now
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// Styles are being pushed to the presentation layer; edit notifications
    /// arriving now were caused by the coordinator itself
    ApplyingStyle,
}

/// Counters for observing the coordinator
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HighlightStats {
    pub requests: u64,
    pub batches_applied: u64,
    pub tokens_applied: u64,
    pub tokens_dropped: u64,
    pub abandoned: u64,
    /// Notifications ignored because styles were being applied
    pub suppressed_notifications: u64,
}

/// A token request that has not been answered yet
#[derive(Debug)]
struct InFlight {
    /// Generation the request was issued in
    generation: u64,
    /// Requested range, in current coordinates
    target: Range<usize>,
    /// Everything invalidated since the request was issued, in current coordinates
    reinvalidated: InvalidationTracker,
}

/// Validated result of a delivery, ready to push to the text system
struct Application {
    pieces: Vec<Range<usize>>,
    tokens: Vec<Token>,
    /// Ranges of dropped tokens; they stay stale as a whole
    restale: Vec<Range<usize>>,
    dropped: usize,
}

#[derive(Debug, Default)]
struct State {
    tracker: InvalidationTracker,
    generation: u64,
    next_request: u64,
    in_flight: AHashMap<RequestId, InFlight>,
    /// Recent edits, tagged with the generation each one produced
    history: VecDeque<(u64, ContentEdit)>,
    /// Every edit after this generation is still in `history`
    history_floor: u64,
    stats: HighlightStats,
}

impl State {
    fn mark_stale(&mut self, target: &TextTarget) {
        self.tracker.invalidate(target);
        for request in self.in_flight.values_mut() {
            request.reinvalidated.invalidate(target);
        }
    }

    fn translate(&mut self, edit: &ContentEdit, history_limit: usize) {
        self.tracker.translate(edit);
        for request in self.in_flight.values_mut() {
            request.target = range::adjust(request.target.clone(), edit);
            request.reinvalidated.translate(edit);
        }

        self.history.push_back((self.generation, edit.clone()));
        while self.history.len() > history_limit {
            if let Some((generation, _)) = self.history.pop_front() {
                self.history_floor = generation;
            }
        }
    }

    fn forget_history(&mut self) {
        self.history.clear();
        self.history_floor = self.generation;
    }

    fn edits_since(&self, generation: u64) -> Option<impl Iterator<Item = &ContentEdit>> {
        if generation < self.history_floor {
            return None;
        }
        Some(
            self.history
                .iter()
                .filter(move |(g, _)| *g > generation)
                .map(|(_, edit)| edit),
        )
    }

    /// Move a result range from `generation` into current coordinates,
    /// refusing if any later edit touched it
    fn translate_strict(&self, range: Range<usize>, generation: u64) -> Option<Range<usize>> {
        self.edits_since(generation)?
            .try_fold(range, |r, edit| range::shift(r, edit))
    }

    /// Like `translate_strict`, but grows ranges over edits instead of refusing
    fn translate_lenient(&self, range: Range<usize>, generation: u64) -> Option<Range<usize>> {
        Some(
            self.edits_since(generation)?
                .fold(range, |r, edit| range::adjust(r, edit)),
        )
    }

    /// Next stale region that no live request is already covering
    fn next_pending_region(
        &self,
        visible: Option<&Range<usize>>,
        len: usize,
        max_len: Option<usize>,
    ) -> Option<Range<usize>> {
        let mut pending = self.tracker.clone();
        for request in self.in_flight.values() {
            for covered in request.reinvalidated.valid_parts(&request.target) {
                pending.clear(&covered, len);
            }
        }

        let region = pending.next_region(visible, len)?;
        Some(match max_len {
            Some(max) if max > 0 && region.len() > max => region.start..region.start + max,
            _ => region,
        })
    }

    fn plan_application(&self, request: &InFlight, batch: TokenBatch, len: usize) -> Application {
        let total = batch.tokens.len();
        let covered = self
            .translate_lenient(batch.range, request.generation)
            .map(|r| r.start.min(request.target.start)..r.end.max(request.target.end));

        let Some(covered) = covered.map(|r| range::clamp(r, len)) else {
            // Too old to translate; the region stays stale and will be re-requested
            return Application {
                pieces: Vec::new(),
                tokens: Vec::new(),
                restale: Vec::new(),
                dropped: total,
            };
        };

        let pieces = request.reinvalidated.valid_parts(&covered);
        let mut tokens = Vec::with_capacity(total);
        let mut restale = Vec::new();
        for token in batch.tokens {
            let Some(translated) = self.translate_strict(token.range.clone(), request.generation) else {
                // An edit landed inside the token; all of it needs fresh tokens
                if let Some(grown) = self.translate_lenient(token.range, request.generation) {
                    restale.push(range::clamp(grown, len));
                }
                continue;
            };
            let Some(clipped) = range::intersect(&translated, &covered) else {
                continue;
            };
            if request.reinvalidated.intersects(&clipped) {
                restale.push(clipped);
                continue;
            }
            tokens.push(Token {
                name: token.name,
                range: clipped,
            });
        }
        restale.retain(|r| !r.is_empty());

        let dropped = total - tokens.len();
        Application {
            pieces,
            tokens,
            restale,
            dropped,
        }
    }
}

/// Restores [`Phase::Idle`] when style application ends, even on panic
struct PhaseGuard<'a> {
    phase: &'a Cell<Phase>,
}

impl<'a> PhaseGuard<'a> {
    fn enter(phase: &'a Cell<Phase>) -> Self {
        phase.set(Phase::ApplyingStyle);
        Self { phase }
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.phase.set(Phase::Idle);
    }
}

/// Coordinator between a text system and a token provider
pub struct Highlighter<T, P> {
    text: T,
    provider: RefCell<P>,
    config: HighlighterConfig,
    state: RefCell<State>,
    phase: Cell<Phase>,
    /// Set when a reconciliation request arrived mid-application
    rescan: Cell<bool>,
    /// Whether `will_change_content` was seen for the edit in progress
    edit_open: Cell<bool>,
    tx: Sender<ProviderEvent>,
    rx: Receiver<ProviderEvent>,
    waker: Option<Waker>,
}

impl<T, P> Highlighter<T, P>
where
    T: TextSystemInterface,
    P: TokenProvider,
{
    /// Create a coordinator. Fails when the text system cannot store styles.
    pub fn new(text: T, provider: P, config: HighlighterConfig) -> Result<Self> {
        if !text.has_attribute_storage() {
            return Err(HighlightError::NoTextStorage);
        }

        let (tx, rx) = unbounded();
        Ok(Self {
            text,
            provider: RefCell::new(provider),
            config,
            state: RefCell::new(State::default()),
            phase: Cell::new(Phase::Idle),
            rescan: Cell::new(false),
            edit_open: Cell::new(false),
            tx,
            rx,
            waker: None,
        })
    }

    /// Wake the host's event loop whenever an asynchronous delivery arrives
    pub fn with_waker(mut self, waker: Waker) -> Self {
        self.waker = Some(waker);
        self
    }

    // === Inbound notifications ===

    /// Mark `target` stale and reconcile. No-op on an empty buffer.
    pub fn invalidate(&self, target: TextTarget) {
        if self.is_applying_style() {
            self.suppress("invalidate");
            return;
        }
        if self.text.length() == 0 {
            return;
        }

        {
            let mut state = self.state.borrow_mut();
            if target == TextTarget::All {
                state.forget_history();
            }
            state.mark_stale(&target);
        }
        tracing::trace!(?target, "invalidated");
        self.reconcile();
    }

    /// Pre-edit hook. Must run before the mutation is observable.
    pub fn will_change_content(&self, range: Range<usize>) {
        if self.is_applying_style() {
            self.suppress("will_change_content");
            return;
        }
        self.edit_open.set(true);
        self.provider.borrow_mut().will_change_content(range);
    }

    /// Post-edit hook. `range` is the span touched by the edit in post-edit
    /// coordinates; `delta` is the change in buffer length.
    pub fn did_change_content(&self, range: Range<usize>, delta: isize) {
        if self.is_applying_style() {
            self.suppress("did_change_content");
            return;
        }
        if !self.edit_open.replace(false) {
            tracing::warn!(?range, delta, "did_change_content without will_change_content");
        }

        let edit = ContentEdit::new(range, delta);
        let region = edited_region(&edit.range, &self.text);
        {
            let mut state = self.state.borrow_mut();
            state.generation += 1;
            state.translate(&edit, self.config.edit_history_limit);
            state.mark_stale(&TextTarget::range(region));
            tracing::trace!(generation = state.generation, ?edit, "content changed");
        }

        let structural = self
            .provider
            .borrow_mut()
            .did_change_content(&edit, &self.text);
        if !structural.is_empty() {
            tracing::trace!(ranges = ?structural, "provider invalidated ranges");
            self.state
                .borrow_mut()
                .mark_stale(&TextTarget::Set(structural));
        }

        self.reconcile();
    }

    /// The viewport moved or resized; reconcile with the new visible range
    pub fn visible_content_did_change(&self) {
        if self.is_applying_style() {
            self.rescan.set(true);
            return;
        }
        self.reconcile();
    }

    /// Apply every asynchronous delivery waiting on the channel.
    ///
    /// Call from the owner thread (e.g. after the waker fired). Returns the
    /// number of events handled.
    pub fn process_events(&self) -> usize {
        if self.is_applying_style() {
            self.rescan.set(true);
            return 0;
        }

        let mut handled = 0;
        while let Ok(event) = self.rx.try_recv() {
            handled += 1;
            match event {
                ProviderEvent::Tokens { request, batch, .. } => self.complete(request, batch),
                ProviderEvent::Abandoned { request } => {
                    let mut state = self.state.borrow_mut();
                    if state.in_flight.remove(&request).is_some() {
                        state.stats.abandoned += 1;
                        tracing::debug!(request = request.0, "provider abandoned request");
                    }
                }
                ProviderEvent::Invalidated { generation, ranges } => {
                    self.apply_late_invalidation(generation, ranges)
                }
            }
        }

        if handled > 0 || self.rescan.get() {
            self.reconcile();
        }
        handled
    }

    // === Reconciliation ===

    fn reconcile(&self) {
        if self.is_applying_style() {
            self.rescan.set(true);
            return;
        }
        self.rescan.set(false);

        loop {
            let len = self.text.length();
            let visible = self.text.visible_range();
            let region = {
                let mut state = self.state.borrow_mut();
                state.tracker.truncate(len);
                if state.in_flight.len() >= self.config.max_in_flight.max(1) {
                    break;
                }
                state.next_pending_region(visible.as_ref(), len, self.config.max_region_len)
            };

            match region {
                Some(region) => self.request(region),
                None => break,
            }
        }
    }

    fn request(&self, region: Range<usize>) {
        let (request, generation) = {
            let mut state = self.state.borrow_mut();
            let request = RequestId(state.next_request);
            state.next_request += 1;
            state.stats.requests += 1;

            let generation = state.generation;
            state.in_flight.insert(
                request,
                InFlight {
                    generation,
                    target: region.clone(),
                    reinvalidated: InvalidationTracker::new(),
                },
            );
            (request, generation)
        };

        let mode = self.config.mode;
        let completion = if mode.is_synchronous() {
            TokenCompletion::inline(request, generation, self.tx.clone())
        } else {
            TokenCompletion::new(request, generation, self.tx.clone(), self.waker.clone())
        };

        tracing::trace!(request = request.0, generation, ?region, ?mode, "requesting tokens");
        let fetch = self
            .provider
            .borrow_mut()
            .tokens(region, mode, &self.text, completion);

        if let TokenFetch::Ready(batch) = fetch {
            self.complete(request, batch);
        }
    }

    fn complete(&self, request: RequestId, batch: TokenBatch) {
        let len = self.text.length();
        let application = {
            let mut state = self.state.borrow_mut();
            let Some(in_flight) = state.in_flight.remove(&request) else {
                tracing::trace!(request = request.0, "delivery for unknown request");
                return;
            };
            state.plan_application(&in_flight, batch, len)
        };

        {
            let _phase = PhaseGuard::enter(&self.phase);
            for piece in &application.pieces {
                self.text.clear_style(piece.clone());
            }
            for token in &application.tokens {
                self.text.apply_style(token);
            }
        }

        let mut state = self.state.borrow_mut();
        for piece in &application.pieces {
            state.tracker.clear(piece, len);
        }
        if !application.restale.is_empty() {
            state
                .tracker
                .invalidate(&TextTarget::Set(application.restale.clone()));
        }
        state.stats.batches_applied += 1;
        state.stats.tokens_applied += application.tokens.len() as u64;
        state.stats.tokens_dropped += application.dropped as u64;

        if application.dropped > 0 {
            tracing::debug!(
                request = request.0,
                dropped = application.dropped,
                "dropped stale tokens"
            );
        }
        tracing::trace!(
            request = request.0,
            applied = application.tokens.len(),
            pieces = application.pieces.len(),
            "applied tokens"
        );
    }

    fn apply_late_invalidation(&self, generation: u64, ranges: Vec<Range<usize>>) {
        let mut state = self.state.borrow_mut();
        let translated: Option<Vec<Range<usize>>> = ranges
            .into_iter()
            .map(|r| state.translate_lenient(r, generation))
            .collect();

        match translated {
            Some(ranges) => state.mark_stale(&TextTarget::Set(ranges)),
            None => {
                tracing::debug!(generation, "late invalidation predates edit history");
                state.forget_history();
                state.mark_stale(&TextTarget::All);
            }
        }
    }

    fn suppress(&self, hook: &'static str) {
        self.state.borrow_mut().stats.suppressed_notifications += 1;
        tracing::trace!(hook, "ignoring notification caused by style application");
    }

    // === Inspection ===

    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    pub fn is_applying_style(&self) -> bool {
        self.phase.get() == Phase::ApplyingStyle
    }

    /// Current edit generation
    pub fn generation(&self) -> u64 {
        self.state.borrow().generation
    }

    /// Stale ranges in current coordinates
    pub fn pending_regions(&self) -> Vec<Range<usize>> {
        self.state.borrow().tracker.ranges(self.text.length())
    }

    /// True when any position in `range` is stale
    pub fn is_stale(&self, range: &Range<usize>) -> bool {
        self.state.borrow().tracker.intersects(range)
    }

    /// Number of unanswered token requests
    pub fn in_flight(&self) -> usize {
        self.state.borrow().in_flight.len()
    }

    /// True when nothing is stale and nothing is outstanding
    pub fn is_idle(&self) -> bool {
        let state = self.state.borrow();
        state.tracker.is_empty() && state.in_flight.is_empty()
    }

    pub fn stats(&self) -> HighlightStats {
        self.state.borrow().stats.clone()
    }

    pub fn config(&self) -> &HighlighterConfig {
        &self.config
    }

    pub fn text_system(&self) -> &T {
        &self.text
    }

    /// Run `f` with the provider borrowed mutably
    pub fn with_provider<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        f(&mut self.provider.borrow_mut())
    }
}

/// Region to re-derive for an edit. A pure deletion leaves an empty range;
/// the characters joined by it still need fresh tokens.
fn edited_region(range: &Range<usize>, text: &dyn TextContent) -> Range<usize> {
    let len = text.length();
    if !range.is_empty() {
        return range::clamp(range.clone(), len);
    }

    let pos = range.start.min(len);
    let start = (1..=4)
        .map(|n| pos.saturating_sub(n))
        .find(|&start| text.content(start..pos).is_some())
        .unwrap_or(pos);
    let end = (1..=4)
        .map(|n| (pos + n).min(len))
        .find(|&end| text.content(pos..end).is_some())
        .unwrap_or(pos);
    start..end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edited_region_widens_deletions() {
        let text = &String::from("let x = 10");
        assert_eq!(edited_region(&(4..4), text), 3..5);
        assert_eq!(edited_region(&(0..0), text), 0..1);
        assert_eq!(edited_region(&(10..10), text), 9..10);
        assert_eq!(edited_region(&(0..2), text), 0..2);
    }

    #[test]
    fn test_edited_region_stops_at_char_boundaries() {
        // `é` is two bytes, `€` three
        let text = &String::from("aé b€c");
        assert_eq!(edited_region(&(3..3), text), 1..4);
        assert_eq!(edited_region(&(5..5), text), 4..8);
        assert_eq!(edited_region(&(8..8), text), 5..9);
        assert_eq!(edited_region(&(1..3), text), 1..3);
    }

    #[test]
    fn test_translate_strict_respects_history_floor() {
        let mut state = State::default();
        state.generation = 1;
        state.translate(&ContentEdit::insert(0, 2), 1);
        state.generation = 2;
        state.translate(&ContentEdit::insert(0, 2), 1);

        // Only the second edit is remembered
        assert_eq!(state.translate_strict(10..12, 1), Some(12..14));
        assert_eq!(state.translate_strict(10..12, 0), None);
    }

    #[test]
    fn test_pending_region_skips_live_requests() {
        let mut state = State::default();
        state.tracker.invalidate(&TextTarget::Set(vec![0..10, 20..30]));
        state.in_flight.insert(
            RequestId(0),
            InFlight {
                generation: 0,
                target: 0..10,
                reinvalidated: InvalidationTracker::new(),
            },
        );

        assert_eq!(state.next_pending_region(None, 40, None), Some(20..30));

        state.mark_stale(&TextTarget::range(2..4));
        assert_eq!(state.next_pending_region(None, 40, None), Some(2..4));
    }
}
