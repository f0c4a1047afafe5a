//! Error types for highlighter construction
//!
//! Only construction can fail. Stale tokens and out-of-range styles are
//! expected at runtime and are handled where they happen.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HighlightError {
    /// The presentation layer has nowhere to store attributes
    #[error("text view has no attribute storage")]
    NoTextStorage,

    /// Grammar could not be loaded into the parser
    #[error("incompatible grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    /// Highlight query failed to compile
    #[error("invalid highlight query: {0}")]
    Query(#[from] tree_sitter::QueryError),

    /// No registered language matches the name or extension
    #[error("unknown language: {0}")]
    UnknownLanguage(String),

    #[error("unknown theme: {0}")]
    UnknownTheme(String),

    /// Configuration file could not be parsed
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Buffer contents are not UTF-8
    #[error("buffer is not valid UTF-8")]
    Utf8,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = HighlightError> = std::result::Result<T, E>;
