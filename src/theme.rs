//! Themes for syntax highlighting
//!
//! A theme maps highlight capture names to attributes. Lookups fall back
//! along the dotted name, so `keyword.control.repeat` uses the `keyword`
//! entry unless a more specific one exists.

use crate::style::{StyleAttributes, StyleResolver, UnderlineStyle};
use ahash::AHashMap;
use arc_swap::ArcSwap;
use std::sync::Arc;

/// A theme defining attributes per capture name
#[derive(Clone, Debug)]
pub struct Theme {
    pub name: String,
    styles: AHashMap<String, StyleAttributes>,
    /// Attributes for names the theme doesn't know
    pub fallback: StyleAttributes,
}

impl Theme {
    /// Create an empty theme
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            styles: AHashMap::new(),
            fallback: StyleAttributes::default(),
        }
    }

    /// Set attributes for a capture name
    pub fn set(&mut self, name: impl Into<String>, style: StyleAttributes) {
        self.styles.insert(name.into(), style);
    }

    /// Builder form of [`Theme::set`]
    pub fn with(mut self, name: impl Into<String>, style: StyleAttributes) -> Self {
        self.set(name, style);
        self
    }

    /// Attributes for `name`, walking up the dotted hierarchy
    pub fn style_for(&self, name: &str) -> &StyleAttributes {
        let mut key = name;
        loop {
            if let Some(style) = self.styles.get(key) {
                return style;
            }
            match key.rfind('.') {
                Some(dot) => key = &key[..dot],
                None => return &self.fallback,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

impl StyleResolver for Theme {
    fn resolve(&self, name: &str) -> StyleAttributes {
        self.style_for(name).clone()
    }
}

/// Built-in themes
pub struct Themes;

impl Themes {
    /// One Dark
    pub fn one_dark() -> Theme {
        Theme::new("One Dark")
            .with("keyword", StyleAttributes::color(0xC678DDFF)) // Purple
            .with("function", StyleAttributes::color(0x61AFEFFF)) // Blue
            .with("function.macro", StyleAttributes::color(0x56B6C2FF))
            .with("type", StyleAttributes::color(0xE5C07BFF)) // Yellow-orange
            .with("constructor", StyleAttributes::color(0xE5C07BFF))
            .with("string", StyleAttributes::color(0x98C379FF)) // Green
            .with("escape", StyleAttributes::color(0x56B6C2FF))
            .with("number", StyleAttributes::color(0xD19A66FF)) // Orange
            .with("constant", StyleAttributes::color(0xD19A66FF))
            .with("comment", StyleAttributes::color(0x5C6370FF).italic()) // Gray
            .with("comment.documentation", StyleAttributes::color(0x737A87FF).italic())
            .with("operator", StyleAttributes::color(0x56B6C2FF)) // Cyan
            .with("punctuation", StyleAttributes::color(0xABB2BFFF))
            .with("variable", StyleAttributes::color(0xABB2BFFF))
            .with("variable.builtin", StyleAttributes::color(0xC678DDFF))
            .with("variable.parameter", StyleAttributes::color(0xABB2BFFF))
            .with("attribute", StyleAttributes::color(0xE06C75FF)) // Red
            .with("label", StyleAttributes::color(0x56B6C2FF))
            .with("property", StyleAttributes::color(0xE06C75FF))
            .with("error", StyleAttributes::color(0xE06C75FF).underline(UnderlineStyle::Wavy))
    }

    /// Monokai
    pub fn monokai() -> Theme {
        Theme::new("Monokai")
            .with("keyword", StyleAttributes::color(0xF92672FF))
            .with("function", StyleAttributes::color(0xA6E22EFF))
            .with("type", StyleAttributes::color(0x66D9EFFF).italic())
            .with("constructor", StyleAttributes::color(0x66D9EFFF))
            .with("string", StyleAttributes::color(0xE6DB74FF))
            .with("number", StyleAttributes::color(0xAE81FFFF))
            .with("constant", StyleAttributes::color(0xAE81FFFF))
            .with("comment", StyleAttributes::color(0x75715EFF))
            .with("operator", StyleAttributes::color(0xF92672FF))
            .with("punctuation", StyleAttributes::color(0xF8F8F2FF))
            .with("variable", StyleAttributes::color(0xF8F8F2FF))
            .with("attribute", StyleAttributes::color(0xA6E22EFF))
            .with("property", StyleAttributes::color(0xF8F8F2FF))
    }

    /// Look up a built-in theme by name
    pub fn by_name(name: &str) -> Option<Theme> {
        match name.to_ascii_lowercase().as_str() {
            "one-dark" | "one_dark" | "one dark" => Some(Self::one_dark()),
            "monokai" => Some(Self::monokai()),
            _ => None,
        }
    }
}

/// Theme holder that can be swapped while readers keep resolving
///
/// Swapping does not restyle anything by itself; follow it with a full
/// invalidation of the highlighter.
pub struct ThemeResolver {
    theme: ArcSwap<Theme>,
}

impl ThemeResolver {
    pub fn new(theme: Theme) -> Self {
        Self {
            theme: ArcSwap::from_pointee(theme),
        }
    }

    /// Replace the active theme
    pub fn set_theme(&self, theme: Theme) {
        tracing::debug!(theme = %theme.name, "switching theme");
        self.theme.store(Arc::new(theme));
    }

    /// Current theme snapshot
    pub fn theme(&self) -> Arc<Theme> {
        self.theme.load_full()
    }
}

impl StyleResolver for ThemeResolver {
    fn resolve(&self, name: &str) -> StyleAttributes {
        self.theme.load().resolve(name)
    }
}

impl Default for ThemeResolver {
    fn default() -> Self {
        Self::new(Themes::one_dark())
    }
}
