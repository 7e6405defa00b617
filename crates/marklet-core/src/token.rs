//! Tokens produced by the scanner and consumed by the block engine.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// How a heading was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum HeadingStyle {
    /// `# Title`
    Atx,
    /// `Title` underlined with `=` or `-`
    Setext,
}

/// Container kinds tracked by the block engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum BlockKind {
    Blockquote,
    List,
    ListItem,
    CodeBlock,
    FencedCodeBlock,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlockKind::Blockquote => "BLOCKQUOTE",
            BlockKind::List => "LIST",
            BlockKind::ListItem => "LIST_ITEM",
            BlockKind::CodeBlock => "CODE_BLOCK",
            BlockKind::FencedCodeBlock => "FENCED_CODE_BLOCK",
        };
        f.write_str(name)
    }
}

/// The classification of a token.
///
/// Block kinds carry their nesting level: a list at depth 2 is a different
/// kind from a list at depth 0 as far as nesting is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    Raw,
    Escaped,
    /// A blank line.
    Line,
    HorizontalRule,
    Heading(HeadingStyle),
    /// Quote marker; the level is the number of `>` characters.
    Blockquote(u8),
    /// List marker; the level is the number of indent units before it.
    List(u8),
    /// Indentation; the level is the number of indent units.
    CodeBlock(u8),
    FencedCodeBlock,
    InlineSpan,
    InlineLink,
    InlineImage,
    InlineReference,
    FootnoteReference,
    ReferenceDefinition,
    FootnoteDefinition,
    AbbrDefinition,
    Url,
    Email,
    /// Synthetic token emitted when a block opens.
    OpenMarker(BlockKind),
    /// Synthetic token emitted when a block closes.
    CloseMarker(BlockKind),
    /// Kind produced by a rule registered at runtime.
    Custom(String),
}

impl TokenKind {
    /// The kind with its nesting level stripped.
    pub fn base(&self) -> TokenKind {
        match self {
            TokenKind::Blockquote(_) => TokenKind::Blockquote(0),
            TokenKind::List(_) => TokenKind::List(0),
            TokenKind::CodeBlock(_) => TokenKind::CodeBlock(0),
            other => other.clone(),
        }
    }

    /// The container this kind opens, if any.
    pub fn block(&self) -> Option<BlockKind> {
        match self {
            TokenKind::Blockquote(_) => Some(BlockKind::Blockquote),
            TokenKind::List(_) => Some(BlockKind::List),
            TokenKind::CodeBlock(_) => Some(BlockKind::CodeBlock),
            TokenKind::FencedCodeBlock => Some(BlockKind::FencedCodeBlock),
            _ => None,
        }
    }

    #[inline]
    pub fn is_block_start(&self) -> bool {
        self.block().is_some()
    }

    /// Marker kinds only the block engine may produce.
    pub fn is_synthetic(&self) -> bool {
        matches!(self, TokenKind::OpenMarker(_) | TokenKind::CloseMarker(_))
    }

    pub fn is_definition(&self) -> bool {
        matches!(
            self,
            TokenKind::ReferenceDefinition | TokenKind::FootnoteDefinition | TokenKind::AbbrDefinition
        )
    }

    /// Kinds whose matched text may carry `{#id .class}` syntax.
    pub fn allows_attributes(&self) -> bool {
        matches!(
            self,
            TokenKind::Heading(_)
                | TokenKind::FencedCodeBlock
                | TokenKind::InlineLink
                | TokenKind::InlineImage
                | TokenKind::InlineReference
                | TokenKind::ReferenceDefinition
                | TokenKind::AbbrDefinition
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Raw => f.write_str("RAW"),
            TokenKind::Escaped => f.write_str("ESCAPED"),
            TokenKind::Line => f.write_str("LINE"),
            TokenKind::HorizontalRule => f.write_str("HR"),
            TokenKind::Heading(HeadingStyle::Atx) => f.write_str("HEADING"),
            TokenKind::Heading(HeadingStyle::Setext) => f.write_str("SETEXT_HEADING"),
            TokenKind::Blockquote(n) => write!(f, "BLOCKQUOTE:{}", n),
            TokenKind::List(n) => write!(f, "LIST:{}", n),
            TokenKind::CodeBlock(n) => write!(f, "CODE_BLOCK:{}", n),
            TokenKind::FencedCodeBlock => f.write_str("FENCED_CODE_BLOCK"),
            TokenKind::InlineSpan => f.write_str("INLINE_SPAN"),
            TokenKind::InlineLink => f.write_str("INLINE_LINK"),
            TokenKind::InlineImage => f.write_str("INLINE_IMAGE"),
            TokenKind::InlineReference => f.write_str("INLINE_REFERENCE"),
            TokenKind::FootnoteReference => f.write_str("FOOTNOTE_REFERENCE"),
            TokenKind::ReferenceDefinition => f.write_str("REFERENCE_DEFINITION"),
            TokenKind::FootnoteDefinition => f.write_str("FOOTNOTE_DEFINITION"),
            TokenKind::AbbrDefinition => f.write_str("ABBR_DEFINITION"),
            TokenKind::Url => f.write_str("URL"),
            TokenKind::Email => f.write_str("EMAIL"),
            TokenKind::OpenMarker(block) => write!(f, "OPEN_{}", block),
            TokenKind::CloseMarker(block) => write!(f, "CLOSE_{}", block),
            TokenKind::Custom(name) => f.write_str(name),
        }
    }
}

/// `{#id .class}` attributes attached to a token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Attributes {
    pub id: Option<String>,
    pub classes: BTreeSet<String>,
}

static ATTRIBUTE_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([#.][^{}]*)\}").unwrap());

impl Attributes {
    /// Parse the inside of a `{...}` block.
    ///
    /// Every part must be `#name` or `.name`; anything else rejects the
    /// whole block. The first id wins.
    pub fn parse(body: &str) -> Option<Self> {
        let mut attrs = Attributes::default();
        let mut parts = 0;
        for part in body.split_whitespace() {
            let mut chars = part.chars();
            let sigil = chars.next()?;
            let name = chars.as_str();
            if name.is_empty() || !name.chars().all(is_name_char) {
                return None;
            }
            match sigil {
                '#' => {
                    if attrs.id.is_none() {
                        attrs.id = Some(name.to_string());
                    }
                }
                '.' => {
                    attrs.classes.insert(name.to_string());
                }
                _ => return None,
            }
            parts += 1;
        }
        (parts > 0).then_some(attrs)
    }

    /// Find the first well-formed attribute block in `text`.
    ///
    /// Returns the byte range of the whole `{...}` block and the parsed
    /// attributes. Malformed blocks are skipped.
    pub fn find(text: &str) -> Option<(std::ops::Range<usize>, Attributes)> {
        ATTRIBUTE_BLOCK.captures_iter(text).find_map(|caps| {
            let whole = caps.get(0)?;
            let attrs = Attributes::parse(caps.get(1)?.as_str())?;
            Some((whole.range(), attrs))
        })
    }

    /// Render as HTML attributes with a leading space, or nothing.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        if let Some(id) = &self.id {
            out.push_str(&format!(" id=\"{}\"", id));
        }
        if !self.classes.is_empty() {
            let classes: Vec<&str> = self.classes.iter().map(String::as_str).collect();
            out.push_str(&format!(" class=\"{}\"", classes.join(" ")));
        }
        out
    }
}

#[inline]
fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | ':')
}

/// A classified span of source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    /// The matched source text, unmodified.
    pub raw_text: String,
    /// Group captures; index 0 is the whole match with attribute syntax stripped.
    pub captures: Vec<String>,
    /// Zero-based line number.
    pub line: usize,
    /// Byte offset within the line.
    pub column: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Attributes>,
}

impl Token {
    pub fn new(kind: TokenKind, raw_text: impl Into<String>, line: usize, column: usize) -> Self {
        let raw_text = raw_text.into();
        Self {
            kind,
            captures: vec![raw_text.clone()],
            raw_text,
            line,
            column,
            attributes: None,
        }
    }

    pub fn with_captures(mut self, captures: Vec<String>) -> Self {
        self.captures = captures;
        self
    }

    pub fn with_attributes(mut self, attributes: Option<Attributes>) -> Self {
        self.attributes = attributes;
        self
    }

    /// A synthetic token of `kind` that carries `source`'s text and
    /// captures, positioned on `line`.
    pub fn derived(kind: TokenKind, source: &Token, line: usize) -> Self {
        Self {
            kind,
            raw_text: source.raw_text.clone(),
            captures: source.captures.clone(),
            line,
            column: 0,
            attributes: source.attributes.clone(),
        }
    }

    /// Capture group `index`, or `""` when the group did not participate.
    #[inline]
    pub fn capture(&self, index: usize) -> &str {
        self.captures.get(index).map(String::as_str).unwrap_or("")
    }

    /// HTML attribute string for this token, or `""`.
    pub fn attribute_html(&self) -> String {
        self.attributes.as_ref().map(Attributes::to_html).unwrap_or_default()
    }
}
