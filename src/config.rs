//! Configuration for the highlighter and the tree-sitter client

use crate::error::Result;
use crate::token::ExecutionMode;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HighlighterConfig {
    /// Synchronous or asynchronous token production
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Bytes queried on each side of a request when prefetching
    #[serde(default = "default_prefetch_margin")]
    pub prefetch_margin: usize,
    /// Upper bound on a single request's length (no bound when unset)
    #[serde(default)]
    pub max_region_len: Option<usize>,
    /// Upper bound on concurrently outstanding asynchronous requests
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Edits remembered for translating late results
    #[serde(default = "default_edit_history_limit")]
    pub edit_history_limit: usize,
}

impl HighlighterConfig {
    /// Deterministic configuration for tests and short-lived buffers
    pub fn synchronous() -> Self {
        Self {
            mode: ExecutionMode::Synchronous,
            ..Self::default()
        }
    }

    /// Asynchronous configuration for interactive editing
    pub fn asynchronous(prefetch: bool) -> Self {
        Self {
            mode: ExecutionMode::Asynchronous { prefetch },
            ..Self::default()
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

impl Default for HighlighterConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            prefetch_margin: default_prefetch_margin(),
            max_region_len: None,
            max_in_flight: default_max_in_flight(),
            edit_history_limit: default_edit_history_limit(),
        }
    }
}

fn default_prefetch_margin() -> usize {
    4096
}

fn default_max_in_flight() -> usize {
    4
}

fn default_edit_history_limit() -> usize {
    512
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = HighlighterConfig::from_toml_str("").unwrap();
        assert_eq!(config, HighlighterConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = HighlighterConfig::from_toml_str(
            r#"
mode = "synchronous"
max_region_len = 2048
"#,
        )
        .unwrap();

        assert_eq!(config.mode, ExecutionMode::Synchronous);
        assert_eq!(config.max_region_len, Some(2048));
        assert_eq!(config.max_in_flight, 4);
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        assert!(HighlighterConfig::from_toml_str("mode = 3").is_err());
    }
}
