//! Language-agnostic tree-sitter token provider
//!
//! Supports any language with a tree-sitter grammar and highlight query.
//! The parse tree is kept current on the owner thread (reparsing
//! incrementally on every edit); highlight queries either run inline or on a
//! background worker against an immutable snapshot of tree and text.

use crate::config::HighlighterConfig;
use crate::error::{HighlightError, Result};
use crate::range::{self, ContentEdit};
use crate::text_system::TextContent;
use crate::token::{ExecutionMode, Token, TokenBatch, TokenCompletion, TokenFetch, TokenProvider};
use ahash::AHashMap;
use lazy_static::lazy_static;
use std::ops::Range;
use std::path::Path;
use std::sync::{mpsc, Arc};
use std::thread;
use tree_sitter::{InputEdit, Language, Parser, Point, Query, QueryCursor, StreamingIterator, Tree};

/// Language configuration for syntax highlighting
#[derive(Clone)]
pub struct LanguageConfig {
    pub language: Language,
    pub highlights_query: &'static str,
    pub name: &'static str,
    pub extensions: &'static [&'static str],
}

impl std::fmt::Debug for LanguageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageConfig")
            .field("name", &self.name)
            .field("extensions", &self.extensions)
            .finish()
    }
}

/// Supported languages
pub struct Languages;

impl Languages {
    /// Rust language configuration
    pub fn rust() -> LanguageConfig {
        LanguageConfig {
            language: tree_sitter_rust::LANGUAGE.into(),
            highlights_query: tree_sitter_rust::HIGHLIGHTS_QUERY,
            name: "rust",
            extensions: &["rs"],
        }
    }

    /// Look a language up by name
    pub fn by_name(name: &str) -> Result<LanguageConfig> {
        BY_NAME
            .get(name.to_ascii_lowercase().as_str())
            .map(|load| load())
            .ok_or_else(|| HighlightError::UnknownLanguage(name.to_string()))
    }

    /// Pick a language from a file's extension
    pub fn for_path(path: impl AsRef<Path>) -> Result<LanguageConfig> {
        let path = path.as_ref();
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| BY_EXTENSION.get(ext))
            .map(|load| load())
            .ok_or_else(|| HighlightError::UnknownLanguage(path.display().to_string()))
    }
}

type LoadLanguage = fn() -> LanguageConfig;

const REGISTERED: &[LoadLanguage] = &[Languages::rust];

lazy_static! {
    static ref BY_NAME: AHashMap<&'static str, LoadLanguage> = REGISTERED
        .iter()
        .map(|load| (load().name, *load))
        .collect();
    static ref BY_EXTENSION: AHashMap<&'static str, LoadLanguage> = REGISTERED
        .iter()
        .flat_map(|load| load().extensions.iter().map(move |ext| (*ext, *load)))
        .collect();
}

/// Parse tree together with the text it was parsed from
#[derive(Clone)]
struct Snapshot {
    tree: Tree,
    text: Arc<str>,
}

/// Compiled highlight query plus its capture names, shared with the worker
struct HighlightQuery {
    query: Query,
    names: Vec<Arc<str>>,
}

impl HighlightQuery {
    fn new(config: &LanguageConfig) -> Result<Self> {
        let query = Query::new(&config.language, config.highlights_query)?;
        let names = query.capture_names().iter().map(|name| Arc::from(*name)).collect();
        Ok(Self { query, names })
    }

    /// Tokens for `range`, de-overlapped and clipped to it
    fn run(&self, snapshot: &Snapshot, range: Range<usize>) -> TokenBatch {
        let range = range::clamp(range, snapshot.text.len());
        let mut cursor = QueryCursor::new();
        // tree-sitter will only visit nodes that intersect this range
        cursor.set_byte_range(range.clone());

        let mut tokens = Vec::new();
        let mut matches = cursor.matches(&self.query, snapshot.tree.root_node(), snapshot.text.as_bytes());
        while let Some(match_) = matches.next() {
            for capture in match_.captures {
                let Some(clipped) = range::intersect(&capture.node.byte_range(), &range) else {
                    continue;
                };
                tokens.push(Token {
                    name: self.names[capture.index as usize].clone(),
                    range: clipped,
                });
            }
        }

        TokenBatch::new(range, flatten(tokens))
    }
}

/// Resolve nested and overlapping captures into disjoint tokens.
///
/// Inner captures win over the captures enclosing them; of two captures on
/// the same span the first one reported is kept.
pub fn flatten(mut tokens: Vec<Token>) -> Vec<Token> {
    tokens.sort_by(|a, b| {
        a.range
            .start
            .cmp(&b.range.start)
            .then(b.range.end.cmp(&a.range.end))
    });
    tokens.dedup_by(|later, earlier| later.range == earlier.range);

    let mut result = Vec::with_capacity(tokens.len());
    let mut open: Vec<Token> = Vec::new();
    let mut pos = 0;

    let emit = |result: &mut Vec<Token>, token: &Token, range: Range<usize>| {
        if !range.is_empty() {
            result.push(Token {
                name: token.name.clone(),
                range,
            });
        }
    };

    for mut token in tokens {
        while let Some(top) = open.last() {
            if top.range.end > token.range.start {
                break;
            }
            emit(&mut result, top, pos.max(top.range.start)..top.range.end);
            pos = pos.max(top.range.end);
            open.pop();
        }

        if let Some(top) = open.last() {
            // Partial overlap: the enclosing capture bounds the new one
            token.range.end = token.range.end.min(top.range.end);
            emit(&mut result, top, pos.max(top.range.start)..token.range.start);
        }
        if token.range.is_empty() {
            continue;
        }
        pos = pos.max(token.range.start);
        open.push(token);
    }

    while let Some(top) = open.pop() {
        emit(&mut result, &top, pos.max(top.range.start)..top.range.end);
        pos = pos.max(top.range.end);
    }

    result
}

/// Convert a byte offset into a tree-sitter point (row, byte column)
fn byte_to_point(text: &str, byte: usize) -> Point {
    let before = &text.as_bytes()[..byte.min(text.len())];
    let row = bytecount::count(before, b'\n');
    let column = match memchr::memrchr(b'\n', before) {
        Some(newline) => before.len() - newline - 1,
        None => before.len(),
    };
    Point { row, column }
}

/// Build the tree-sitter edit for `edit`, given the text before and after it
fn input_edit(old_text: &str, new_text: &str, edit: &ContentEdit) -> InputEdit {
    let start_byte = edit.range.start;
    let old_end_byte = edit.pre_edit_range().end;
    let new_end_byte = edit.range.end;

    InputEdit {
        start_byte,
        old_end_byte,
        new_end_byte,
        start_position: byte_to_point(old_text, start_byte),
        old_end_position: byte_to_point(old_text, old_end_byte),
        new_end_position: byte_to_point(new_text, new_end_byte),
    }
}

/// Query job for the background worker
struct QueryJob {
    snapshot: Snapshot,
    range: Range<usize>,
    completion: TokenCompletion,
}

/// Background thread running highlight queries
struct QueryWorker {
    tx: Option<mpsc::Sender<QueryJob>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl QueryWorker {
    fn spawn(query: Arc<HighlightQuery>, name: &str) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<QueryJob>();
        let handle = thread::Builder::new()
            .name(format!("{name}-highlight"))
            .spawn(move || {
                tracing::debug!("query worker started");
                while let Ok(job) = rx.recv() {
                    let batch = query.run(&job.snapshot, job.range);
                    tracing::trace!(
                        request = job.completion.request().0,
                        tokens = batch.tokens.len(),
                        "query finished"
                    );
                    job.completion.deliver(batch);
                }
                tracing::debug!("query worker stopped");
            })?;

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    /// Hand a job to the worker, giving it back if the worker is gone
    fn submit(&self, job: QueryJob) -> std::result::Result<(), QueryJob> {
        match &self.tx {
            Some(tx) => tx.send(job).map_err(|err| err.0),
            None => Err(job),
        }
    }
}

impl Drop for QueryWorker {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("query worker panicked");
            }
        }
    }
}

/// Incremental tree-sitter parser acting as a [`TokenProvider`]
pub struct TreeSitterClient {
    name: &'static str,
    parser: Parser,
    query: Arc<HighlightQuery>,
    snapshot: Option<Snapshot>,
    prefetch_margin: usize,
    /// Spawned on the first asynchronous request
    worker: Option<QueryWorker>,
}

impl TreeSitterClient {
    /// Create a client for any language with a grammar and highlight query
    pub fn new(config: LanguageConfig) -> Result<Self> {
        let mut parser = Parser::new();
        parser.set_language(&config.language)?;
        let query = Arc::new(HighlightQuery::new(&config)?);

        Ok(Self {
            name: config.name,
            parser,
            query,
            snapshot: None,
            prefetch_margin: HighlighterConfig::default().prefetch_margin,
            worker: None,
        })
    }

    /// Create a client for Rust (convenience method)
    pub fn rust() -> Result<Self> {
        Self::new(Languages::rust())
    }

    /// Take tuning knobs from a highlighter configuration
    pub fn with_config(mut self, config: &HighlighterConfig) -> Self {
        self.prefetch_margin = config.prefetch_margin;
        self
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// Current parse tree, if the text was parsed yet
    pub fn tree(&self) -> Option<&Tree> {
        self.snapshot.as_ref().map(|s| &s.tree)
    }

    /// Capture names the highlight query can produce
    pub fn capture_names(&self) -> &[Arc<str>] {
        &self.query.names
    }

    /// Snapshot matching `text`, parsing from scratch when needed
    fn snapshot_for(&mut self, text: &dyn TextContent) -> Option<Snapshot> {
        if let Some(snapshot) = &self.snapshot {
            if snapshot.text.len() == text.length() {
                return Some(snapshot.clone());
            }
            tracing::warn!(
                parsed = snapshot.text.len(),
                current = text.length(),
                "parse tree out of sync with the buffer, reparsing"
            );
        }

        let source: Arc<str> = Arc::from(text.full_text());
        let Some(tree) = self.parser.parse(&*source, None) else {
            tracing::warn!(name = self.name, "tree-sitter produced no tree");
            self.snapshot = None;
            return None;
        };
        tracing::debug!(name = self.name, bytes = source.len(), "parsed from scratch");

        let snapshot = Snapshot { tree, text: source };
        self.snapshot = Some(snapshot.clone());
        Some(snapshot)
    }

    /// Answer a job on the calling thread when no worker can take it
    fn run_inline(&self, job: QueryJob, range: Range<usize>) -> TokenFetch {
        let batch = self.query.run(&job.snapshot, range);
        job.completion.dismiss();
        TokenFetch::Ready(batch)
    }

        fn worker(&mut self) -> Option<&QueryWorker> {
        if self.worker.is_none() {
            match QueryWorker::spawn(self.query.clone(), self.name) {
                Ok(worker) => self.worker = Some(worker),
                Err(err) => {
                    tracing::warn!(%err, "failed to start query worker, querying inline");
                    return None;
                }
            }
        }
        self.worker.as_ref()
    }
}

impl TokenProvider for TreeSitterClient {
    fn tokens(
        &mut self,
        range: Range<usize>,
        mode: ExecutionMode,
        text: &dyn TextContent,
        completion: TokenCompletion,
    ) -> TokenFetch {
        let Some(snapshot) = self.snapshot_for(text) else {
            completion.dismiss();
            return TokenFetch::Ready(TokenBatch::new(range, Vec::new()));
        };

        let prefetch = mode.prefetch();
        let queried = if prefetch {
            range.start.saturating_sub(self.prefetch_margin)..range.end.saturating_add(self.prefetch_margin)
        } else {
            range.clone()
        };

        if mode.is_synchronous() {
            completion.dismiss();
            return TokenFetch::Ready(self.query.run(&snapshot, range));
        }

        let job = QueryJob {
            snapshot,
            range: queried,
            completion,
        };
        let Some(worker) = self.worker() else {
            return self.run_inline(job, range);
        };
        match worker.submit(job) {
            Ok(()) => TokenFetch::Pending,
            Err(job) => self.run_inline(job, range),
        }
    }

    fn did_change_content(&mut self, edit: &ContentEdit, text: &dyn TextContent) -> Vec<Range<usize>> {
        let Some(old) = self.snapshot.take() else {
            // Nothing parsed yet; the next request parses from scratch
            return Vec::new();
        };

        let new_text: Arc<str> = Arc::from(text.full_text());
        if edit.old_len(new_text.len()) != old.text.len() {
            tracing::warn!(?edit, "edit does not match the parsed text, reparsing later");
            return vec![0..new_text.len()];
        }

        let mut edited = old.tree;
        edited.edit(&input_edit(&old.text, &new_text, edit));

        let Some(tree) = self.parser.parse(&*new_text, Some(&edited)) else {
            tracing::warn!(name = self.name, "incremental parse failed");
            return vec![0..new_text.len()];
        };

        let changed: Vec<Range<usize>> = edited
            .changed_ranges(&tree)
            .map(|r| r.start_byte..r.end_byte)
            .filter(|r| !r.is_empty())
            .collect();
        tracing::trace!(?edit, changed = ?changed, "reparsed incrementally");

        self.snapshot = Some(Snapshot { tree, text: new_text });
        changed
    }
}
