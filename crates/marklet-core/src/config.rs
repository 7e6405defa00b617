//! Converter options.

use serde::{Deserialize, Serialize};

/// Deepest nesting level the rule table will ever generate.
pub const NESTING_LIMIT: usize = 16;

/// Options recognised by [`Parser`](crate::Parser).
///
/// Every field has a default, so a partial JSON object deserializes into a
/// complete configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Deepest indentation level tokenized for lists, quotes and code blocks.
    pub max_nesting: usize,
    /// Spaces per nesting level.
    pub indent_width: usize,
    /// Extra characters treated as markup-significant.
    pub reserved_chars: String,
    /// HTML-escape the input before scanning instead of passing tags through.
    pub escape_html: bool,
    /// Wrap loose text in `<p>` after conversion.
    pub auto_paragraph: bool,
    /// Spaces a tab expands to during normalization.
    pub tab_width: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_nesting: 4,
            indent_width: 4,
            reserved_chars: String::new(),
            escape_html: false,
            auto_paragraph: true,
            tab_width: 4,
        }
    }
}

impl Config {
    pub fn with_max_nesting(mut self, max_nesting: usize) -> Self {
        self.max_nesting = max_nesting;
        self
    }

    pub fn with_indent_width(mut self, indent_width: usize) -> Self {
        self.indent_width = indent_width;
        self
    }

    pub fn with_reserved_chars(mut self, chars: impl Into<String>) -> Self {
        self.reserved_chars = chars.into();
        self
    }

    pub fn with_escape_html(mut self, escape: bool) -> Self {
        self.escape_html = escape;
        self
    }

    pub fn with_auto_paragraph(mut self, enabled: bool) -> Self {
        self.auto_paragraph = enabled;
        self
    }

    pub fn with_tab_width(mut self, width: usize) -> Self {
        self.tab_width = width;
        self
    }

    /// The clamped nesting geometry used to build rules and block contexts.
    pub fn layout(&self) -> Layout {
        Layout {
            max_nesting: self.max_nesting.clamp(1, NESTING_LIMIT) as u8,
            indent_width: self.indent_width.max(1),
        }
    }
}

/// Nesting geometry shared by the rule table and the block engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub max_nesting: u8,
    pub indent_width: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.max_nesting, 4);
        assert_eq!(config.indent_width, 4);
        assert!(config.auto_paragraph);
        assert!(!config.escape_html);
    }

    #[test]
    fn test_layout_clamps_to_one() {
        let layout = Config::default()
            .with_max_nesting(0)
            .with_indent_width(0)
            .layout();
        assert_eq!(layout.max_nesting, 1);
        assert_eq!(layout.indent_width, 1);
    }

    #[test]
    fn test_layout_caps_nesting() {
        let layout = Config::default().with_max_nesting(500).layout();
        assert_eq!(layout.max_nesting as usize, NESTING_LIMIT);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"indent_width": 2}"#).unwrap();
        assert_eq!(config.indent_width, 2);
        assert_eq!(config.max_nesting, 4);
        assert!(config.auto_paragraph);
    }
}
