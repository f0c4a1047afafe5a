//! Test doubles shared by the integration tests
#![allow(dead_code)]

use std::ops::Range;
use tiny_highlight::{
    ContentEdit, ExecutionMode, TextContent, Token, TokenBatch, TokenCompletion, TokenFetch,
    TokenProvider,
};

const KEYWORDS: &[&str] = &["fn", "let", "mut", "if", "else", "return"];

/// Tokenize whole lines of `text` overlapping `range`, clipped to `range`
pub fn lex(text: &str, range: Range<usize>) -> Vec<Token> {
    let range = range.start.min(text.len())..range.end.min(text.len());
    let bytes = text.as_bytes();
    let line_start = bytes[..range.start]
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |nl| nl + 1);

    let mut tokens = Vec::new();
    let mut pos = line_start;
    while pos < range.end {
        let b = bytes[pos];
        if b == b'/' && bytes.get(pos + 1) == Some(&b'/') {
            let end = bytes[pos..]
                .iter()
                .position(|b| *b == b'\n')
                .map_or(bytes.len(), |n| pos + n);
            tokens.push(Token::new("comment", pos..end));
            pos = end;
        } else if b.is_ascii_alphabetic() || b == b'_' {
            let end = pos + bytes[pos..]
                .iter()
                .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
                .count();
            let word = &text[pos..end];
            let name = if KEYWORDS.contains(&word) { "keyword" } else { "variable" };
            tokens.push(Token::new(name, pos..end));
            pos = end;
        } else if b.is_ascii_digit() {
            let end = pos + bytes[pos..].iter().take_while(|b| b.is_ascii_digit()).count();
            tokens.push(Token::new("number", pos..end));
            pos = end;
        } else {
            pos += 1;
        }
    }

    tokens
        .into_iter()
        .filter_map(|t| {
            let start = t.range.start.max(range.start);
            let end = t.range.end.min(range.end);
            (start < end).then(|| Token::new(t.name, start..end))
        })
        .collect()
}

/// Span of the lines touched by `range`
pub fn line_span(text: &str, range: &Range<usize>) -> Range<usize> {
    let bytes = text.as_bytes();
    let start = bytes[..range.start.min(bytes.len())]
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |nl| nl + 1);
    let end = bytes[range.end.min(bytes.len())..]
        .iter()
        .position(|b| *b == b'\n')
        .map_or(bytes.len(), |n| range.end + n);
    start..end
}

/// Request captured by an asynchronous [`WordProvider`]
pub struct Job {
    pub range: Range<usize>,
    /// Text at the time of the request
    pub text: String,
    pub completion: TokenCompletion,
}

impl Job {
    /// Deliver the tokens the provider would have computed
    pub fn deliver(self) {
        let tokens = lex(&self.text, self.range.clone());
        self.completion.deliver(TokenBatch::new(self.range, tokens));
    }
}

/// Word-level tokenizer. Synchronous requests are answered inline;
/// asynchronous ones are queued until the test delivers them.
#[derive(Default)]
pub struct WordProvider {
    /// Report the edited lines as changed (a comment marker affects the whole line)
    pub structural_lines: bool,
    /// Answer asynchronous requests inline instead of queueing them
    pub answer_inline: bool,
    pub queue: Vec<Job>,
    pub requested: Vec<Range<usize>>,
    pub edits: Vec<ContentEdit>,
}

impl WordProvider {
    pub fn new() -> Self {
        Self {
            structural_lines: true,
            ..Self::default()
        }
    }

    pub fn without_structure() -> Self {
        Self::default()
    }

    pub fn answering_inline() -> Self {
        Self {
            answer_inline: true,
            ..Self::new()
        }
    }

    /// Remove the `index`-th queued job (modulo the queue length)
    pub fn take_job(&mut self, index: usize) -> Option<Job> {
        if self.queue.is_empty() {
            return None;
        }
        let index = index % self.queue.len();
        Some(self.queue.remove(index))
    }
}

impl TokenProvider for WordProvider {
    fn tokens(
        &mut self,
        range: Range<usize>,
        mode: ExecutionMode,
        text: &dyn TextContent,
        completion: TokenCompletion,
    ) -> TokenFetch {
        self.requested.push(range.clone());
        let text = text.full_text().into_owned();

        if mode.is_synchronous() || self.answer_inline {
            completion.dismiss();
            let tokens = lex(&text, range.clone());
            return TokenFetch::Ready(TokenBatch::new(range, tokens));
        }

        self.queue.push(Job {
            range,
            text,
            completion,
        });
        TokenFetch::Pending
    }

    fn did_change_content(&mut self, edit: &ContentEdit, text: &dyn TextContent) -> Vec<Range<usize>> {
        self.edits.push(edit.clone());
        if !self.structural_lines {
            return Vec::new();
        }
        vec![line_span(&text.full_text(), &edit.range)]
    }
}

/// Tokens for the whole text, for comparing against a settled buffer
pub fn expected_tokens(text: &str) -> Vec<Token> {
    lex(text, 0..text.len())
}
