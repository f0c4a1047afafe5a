//! Style attributes and the token-name → style resolution seam
//!
//! The coordinator never interprets token names. The presentation layer asks
//! a [`StyleResolver`] for the attributes of a name, and the answer must be
//! the same every time for the same name.

/// Visual attributes applied to a styled run of text
#[derive(Clone, Debug, PartialEq)]
pub struct StyleAttributes {
    /// Foreground color (RGBA)
    pub foreground: u32,
    /// Optional background color (RGBA)
    pub background: Option<u32>,
    pub weight: FontWeight,
    pub italic: bool,
    pub underline: Option<UnderlineStyle>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FontWeight {
    Thin = 100,
    Light = 300,
    Regular = 400,
    Medium = 500,
    Bold = 700,
    Black = 900,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnderlineStyle {
    Solid,
    Dashed,
    Dotted,
    Wavy,
    Double,
}

impl StyleAttributes {
    /// Plain text in the given color
    pub const fn color(foreground: u32) -> Self {
        Self {
            foreground,
            background: None,
            weight: FontWeight::Regular,
            italic: false,
            underline: None,
        }
    }

    pub fn bold(mut self) -> Self {
        self.weight = FontWeight::Bold;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    pub fn underline(mut self, style: UnderlineStyle) -> Self {
        self.underline = Some(style);
        self
    }

    /// Split the foreground into RGB components
    pub fn rgb(&self) -> (u8, u8, u8) {
        let [r, g, b, _] = self.foreground.to_be_bytes();
        (r, g, b)
    }
}

impl Default for StyleAttributes {
    fn default() -> Self {
        Self::color(0xABB2BFFF)
    }
}

/// Maps token names to attributes
pub trait StyleResolver {
    /// Attributes for `name`. Must be deterministic for a given name.
    fn resolve(&self, name: &str) -> StyleAttributes;
}

impl<F> StyleResolver for F
where
    F: Fn(&str) -> StyleAttributes,
{
    fn resolve(&self, name: &str) -> StyleAttributes {
        self(name)
    }
}
