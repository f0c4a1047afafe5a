//! Token provider contract
//!
//! A provider owns the parser. It hears about every edit and produces tokens
//! for requested ranges, either inline or later from a background worker.
//! Late results travel back over a channel and are only applied once the
//! owner thread drains it.

use crate::range::ContentEdit;
use crate::text_system::TextContent;
use crossbeam::channel::Sender;
use serde::Deserialize;
use std::ops::Range;
use std::sync::Arc;

/// A named classification of a span of text
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub name: Arc<str>,
    pub range: Range<usize>,
}

impl Token {
    pub fn new(name: impl Into<Arc<str>>, range: Range<usize>) -> Self {
        Self {
            name: name.into(),
            range,
        }
    }
}

/// Tokens produced for one request
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenBatch {
    /// Range the tokens describe completely (may exceed the request when prefetching)
    pub range: Range<usize>,
    /// Tokens in buffer order
    pub tokens: Vec<Token>,
}

impl TokenBatch {
    pub fn new(range: Range<usize>, tokens: Vec<Token>) -> Self {
        Self { range, tokens }
    }
}

/// How a provider produces tokens
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Tokens are computed before `tokens` returns
    Synchronous,
    /// Tokens are computed off-thread and delivered through the completion
    Asynchronous {
        /// Also deliver tokens around the requested range
        #[serde(default)]
        prefetch: bool,
    },
}

impl ExecutionMode {
    pub fn is_synchronous(&self) -> bool {
        matches!(self, Self::Synchronous)
    }

    pub fn prefetch(&self) -> bool {
        matches!(self, Self::Asynchronous { prefetch: true })
    }
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::Asynchronous { prefetch: true }
    }
}

/// Identifier of a token request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

/// Results marshaled back to the owner thread
#[derive(Debug)]
pub enum ProviderEvent {
    /// Tokens for a request
    Tokens {
        request: RequestId,
        generation: u64,
        batch: TokenBatch,
    },
    /// The provider gave up on a request without delivering
    Abandoned { request: RequestId },
    /// Ranges found stale after the fact, in the coordinates of `generation`
    Invalidated {
        generation: u64,
        ranges: Vec<Range<usize>>,
    },
}

/// Callback used to wake the owner's event loop after a delivery
pub type Waker = Arc<dyn Fn() + Send + Sync>;

/// One-shot handle for delivering a request's tokens
///
/// Dropping it without delivering reports the request as abandoned, so the
/// owner never waits forever on a provider that lost a job.
pub struct TokenCompletion {
    request: RequestId,
    generation: u64,
    tx: Sender<ProviderEvent>,
    waker: Option<Waker>,
    delivered: bool,
    /// Synchronous requests are settled by the return value, not the drop
    report_abandon: bool,
}

impl TokenCompletion {
    pub(crate) fn new(
        request: RequestId,
        generation: u64,
        tx: Sender<ProviderEvent>,
        waker: Option<Waker>,
    ) -> Self {
        Self {
            request,
            generation,
            tx,
            waker,
            delivered: false,
            report_abandon: true,
        }
    }

    /// Completion whose drop is silent
    pub(crate) fn inline(request: RequestId, generation: u64, tx: Sender<ProviderEvent>) -> Self {
        Self {
            request,
            generation,
            tx,
            waker: None,
            delivered: false,
            report_abandon: false,
        }
    }

    pub fn request(&self) -> RequestId {
        self.request
    }

    /// Edit generation the request was issued in
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Deliver the tokens. Safe to call from any thread.
    pub fn deliver(mut self, batch: TokenBatch) {
        self.delivered = true;
        let event = ProviderEvent::Tokens {
            request: self.request,
            generation: self.generation,
            batch,
        };
        self.send(event);
    }

    /// Settle the request without sending anything.
    ///
    /// For providers that answer with [`TokenFetch::Ready`] after all; the
    /// coordinator already has the tokens and needs no wake-up.
    pub fn dismiss(mut self) {
        self.report_abandon = false;
    }

    /// Report ranges that turned out stale while serving this request
    pub fn invalidate(&self, ranges: Vec<Range<usize>>) {
        if ranges.is_empty() {
            return;
        }
        self.send(ProviderEvent::Invalidated {
            generation: self.generation,
            ranges,
        });
    }

    fn send(&self, event: ProviderEvent) {
        // The receiver only disappears when the highlighter was torn down
        if self.tx.send(event).is_err() {
            tracing::trace!(request = self.request.0, "highlighter gone, dropping delivery");
            return;
        }
        if let Some(waker) = &self.waker {
            waker();
        }
    }
}

impl Drop for TokenCompletion {
    fn drop(&mut self) {
        if !self.delivered && self.report_abandon {
            self.send(ProviderEvent::Abandoned {
                request: self.request,
            });
        }
    }
}

impl std::fmt::Debug for TokenCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCompletion")
            .field("request", &self.request)
            .field("generation", &self.generation)
            .field("delivered", &self.delivered)
            .finish()
    }
}

/// Outcome of a token request
#[derive(Debug)]
pub enum TokenFetch {
    /// Tokens are available now; the completion was not used
    Ready(TokenBatch),
    /// Tokens will arrive through the completion
    Pending,
}

/// Parser collaborator producing tokens and hearing about edits
pub trait TokenProvider {
    /// Request tokens for `range`.
    ///
    /// Synchronous providers return [`TokenFetch::Ready`] and drop the
    /// completion unused; asynchronous ones keep it and return
    /// [`TokenFetch::Pending`]. An asynchronous request answered inline
    /// should [`dismiss`](TokenCompletion::dismiss) its completion.
    fn tokens(
        &mut self,
        range: Range<usize>,
        mode: ExecutionMode,
        text: &dyn TextContent,
        completion: TokenCompletion,
    ) -> TokenFetch;

    /// Called before the buffer is mutated
    fn will_change_content(&mut self, _range: Range<usize>) {}

    /// Called after the buffer was mutated. Returns ranges whose tokens changed
    /// beyond the edited span (e.g. an opened block comment).
    fn did_change_content(&mut self, _edit: &ContentEdit, _text: &dyn TextContent) -> Vec<Range<usize>> {
        Vec::new()
    }
}

impl TokenProvider for Box<dyn TokenProvider> {
    fn tokens(
        &mut self,
        range: Range<usize>,
        mode: ExecutionMode,
        text: &dyn TextContent,
        completion: TokenCompletion,
    ) -> TokenFetch {
        (**self).tokens(range, mode, text, completion)
    }

    fn will_change_content(&mut self, range: Range<usize>) {
        (**self).will_change_content(range)
    }

    fn did_change_content(&mut self, edit: &ContentEdit, text: &dyn TextContent) -> Vec<Range<usize>> {
        (**self).did_change_content(edit, text)
    }
}
