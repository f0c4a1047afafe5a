//! Incremental, invalidation-driven syntax highlighting
//!
//! A [`Highlighter`] sits between a text system (which stores styled text and
//! reports edits) and a [`TokenProvider`] (which parses and classifies text).
//! Edits mark regions stale; stale regions are re-tokenized visible-first, and
//! tokens are applied only while nothing has invalidated them since they were
//! requested.

pub mod binding;
pub mod buffer;
pub mod config;
pub mod error;
pub mod highlighter;
pub mod invalidation;
pub mod range;
pub mod style;
pub mod syntax;
pub mod text_system;
pub mod theme;
pub mod token;

// Re-export core types
pub use binding::BufferHighlighter;
pub use buffer::{Edit, EditMask, EditObserver, SharedBuffer, StyleRun, StyledBuffer};
pub use config::HighlighterConfig;
pub use error::{HighlightError, Result};
pub use highlighter::{HighlightStats, Highlighter, Phase};
pub use invalidation::{InvalidationTracker, TextTarget};
pub use range::ContentEdit;
pub use style::{FontWeight, StyleAttributes, StyleResolver, UnderlineStyle};
pub use syntax::{LanguageConfig, Languages, TreeSitterClient};
pub use text_system::{TextContent, TextSystemInterface};
pub use theme::{Theme, ThemeResolver, Themes};
pub use token::{
    ExecutionMode, ProviderEvent, RequestId, Token, TokenBatch, TokenCompletion, TokenFetch,
    TokenProvider, Waker,
};
