//! Render dispatch: token kind → HTML emitter.
//!
//! Emitters are pure functions of a single token. The table is keyed by
//! [`TokenKind::base`], so one emitter serves every nesting level of a
//! block kind. Installing an emitter for a kind replaces the default.

use crate::error::{Error, Result};
use crate::token::{BlockKind, HeadingStyle, Token, TokenKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;

static ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(?:[A-Za-z][A-Za-z0-9]*|#[0-9]+|#[xX][0-9A-Fa-f]+);").unwrap());

static DESTINATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*<?([^\s>]*)>?(?:\s+(?:"(.*)"|'(.*)'|\((.*)\)))?\s*$"#).unwrap()
});

/// HTML-escape `text` without touching entities that are already encoded.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for entity in ENTITY.find_iter(text) {
        out.push_str(&html_escape::encode_quoted_attribute(&text[last..entity.start()]));
        out.push_str(entity.as_str());
        last = entity.end();
    }
    out.push_str(&html_escape::encode_quoted_attribute(&text[last..]));
    out
}

/// Split a link destination into its target and optional title.
///
/// Accepts `url`, `<url>`, and a title quoted with `"`, `'` or `( )`.
pub fn split_destination(destination: &str) -> (String, Option<String>) {
    match DESTINATION.captures(destination) {
        Some(caps) => {
            let target = caps.get(1).map_or("", |m| m.as_str()).to_string();
            let title = (2..=4)
                .find_map(|i| caps.get(i))
                .map(|m| m.as_str().to_string());
            (target, title)
        }
        None => (destination.trim().to_string(), None),
    }
}

/// Encode each character as an HTML entity, alternating decimal and hex.
pub fn obfuscate(text: &str) -> String {
    text.chars()
        .enumerate()
        .map(|(i, c)| {
            if i % 2 == 0 {
                format!("&#{};", c as u32)
            } else {
                format!("&#x{:x};", c as u32)
            }
        })
        .collect()
}

/// Produces the HTML for one token.
pub trait Emitter {
    fn emit(&self, token: &Token) -> String;
}

impl<F> Emitter for F
where
    F: Fn(&Token) -> String,
{
    #[inline]
    fn emit(&self, token: &Token) -> String {
        self(token)
    }
}

type BoxedEmitter = Box<dyn Emitter + Send + Sync>;

/// Kind-keyed emitter table.
pub struct RenderDispatch {
    emitters: HashMap<TokenKind, BoxedEmitter>,
}

impl RenderDispatch {
    /// A table with no emitters at all.
    pub fn empty() -> Self {
        Self {
            emitters: HashMap::new(),
        }
    }

    /// The default emitters for every built-in kind.
    pub fn new() -> Self {
        let mut dispatch = Self::empty();
        dispatch.register(TokenKind::Raw, raw);
        dispatch.register(TokenKind::Escaped, escaped);
        dispatch.register(TokenKind::Line, nothing);
        dispatch.register(TokenKind::HorizontalRule, |_: &Token| "<hr />".to_string());
        dispatch.register(TokenKind::Heading(HeadingStyle::Atx), atx_heading);
        dispatch.register(TokenKind::Heading(HeadingStyle::Setext), setext_heading);
        dispatch.register(TokenKind::Blockquote(0), raw);
        dispatch.register(TokenKind::CodeBlock(0), raw);
        dispatch.register(TokenKind::FencedCodeBlock, raw);
        dispatch.register(TokenKind::List(0), |_: &Token| "<li>".to_string());
        dispatch.register(TokenKind::InlineSpan, inline_span);
        dispatch.register(TokenKind::InlineLink, inline_link);
        dispatch.register(TokenKind::InlineImage, inline_image);
        dispatch.register(TokenKind::InlineReference, raw);
        dispatch.register(TokenKind::FootnoteReference, footnote_reference);
        dispatch.register(TokenKind::ReferenceDefinition, nothing);
        dispatch.register(TokenKind::FootnoteDefinition, nothing);
        dispatch.register(TokenKind::AbbrDefinition, nothing);
        dispatch.register(TokenKind::Url, url);
        dispatch.register(TokenKind::Email, email);

        for block in [
            BlockKind::Blockquote,
            BlockKind::List,
            BlockKind::ListItem,
            BlockKind::CodeBlock,
            BlockKind::FencedCodeBlock,
        ] {
            dispatch.register(TokenKind::OpenMarker(block), open_marker);
            dispatch.register(TokenKind::CloseMarker(block), close_marker);
        }
        dispatch
    }

    /// Install `emitter` for `kind`, replacing any existing one.
    pub fn register<E>(&mut self, kind: TokenKind, emitter: E)
    where
        E: Emitter + Send + Sync + 'static,
    {
        self.emitters.insert(kind.base(), Box::new(emitter));
    }

    pub fn contains(&self, kind: &TokenKind) -> bool {
        self.emitters.contains_key(&kind.base())
    }

    /// Render `token` with the emitter for its kind.
    pub fn emit(&self, token: &Token) -> Result<String> {
        self.emitters
            .get(&token.kind.base())
            .map(|emitter| emitter.emit(token))
            .ok_or_else(|| Error::missing_emitter(&token.kind))
    }
}

impl Default for RenderDispatch {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RenderDispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<String> = self.emitters.keys().map(ToString::to_string).collect();
        kinds.sort();
        f.debug_struct("RenderDispatch").field("kinds", &kinds).finish()
    }
}

// ============================================================================
// Default emitters
// ============================================================================

fn raw(token: &Token) -> String {
    token.raw_text.clone()
}

fn nothing(_: &Token) -> String {
    String::new()
}

fn escaped(token: &Token) -> String {
    escape_html(token.capture(1))
}

fn atx_heading(token: &Token) -> String {
    let level = token.capture(1).len().clamp(1, 6);
    heading(level, token.capture(2), token)
}

fn setext_heading(token: &Token) -> String {
    let level = if token.capture(2).starts_with('=') { 1 } else { 2 };
    heading(level, token.capture(1), token)
}

fn heading(level: usize, content: &str, token: &Token) -> String {
    format!(
        "<h{level}{}>{}</h{level}>",
        token.attribute_html(),
        content.trim(),
        level = level
    )
}

fn inline_span(token: &Token) -> String {
    let content = token.capture(2);
    match token.capture(1) {
        "`" | "``" => format!("<code>{}</code>", escape_html(content)),
        "~~" => format!("<del>{}</del>", content),
        "**" | "__" => format!("<strong>{}</strong>", content),
        _ => format!("<em>{}</em>", content),
    }
}

fn title_attribute(title: Option<&str>) -> String {
    match title {
        Some(title) if !title.is_empty() => format!(" title=\"{}\"", escape_html(title)),
        _ => String::new(),
    }
}

fn image_html(alt: &str, destination: &str, attributes: &str) -> String {
    let (src, title) = split_destination(destination);
    format!(
        "<img src=\"{}\" alt=\"{}\"{}{} />",
        escape_html(&src),
        escape_html(alt),
        title_attribute(title.as_deref()),
        attributes
    )
}

fn inline_link(token: &Token) -> String {
    // [![alt](src)](href)
    if token.raw_text.starts_with("[![") && token.captures.len() > 3 {
        let image = image_html(token.capture(1), token.capture(2), "");
        let (href, title) = split_destination(token.capture(3));
        return format!(
            "<a href=\"{}\"{}{}>{}</a>",
            escape_html(&href),
            title_attribute(title.as_deref()),
            token.attribute_html(),
            image
        );
    }

    let (href, title) = split_destination(token.capture(2));
    format!(
        "<a href=\"{}\"{}{}>{}</a>",
        escape_html(&href),
        title_attribute(title.as_deref()),
        token.attribute_html(),
        token.capture(1)
    )
}

fn inline_image(token: &Token) -> String {
    image_html(token.capture(1), token.capture(2), &token.attribute_html())
}

/// Resolved footnote references carry their number in capture 2.
fn footnote_reference(token: &Token) -> String {
    match token.capture(2) {
        "" => token.raw_text.clone(),
        number => format!(
            "<sup id=\"fnref-{n}\"><a href=\"#fn-{n}\" rel=\"footnote\">{n}</a></sup>",
            n = number
        ),
    }
}

fn url(token: &Token) -> String {
    let target = escape_html(token.capture(1));
    format!("<a href=\"{}\">{}</a>", target, target)
}

fn email(token: &Token) -> String {
    let address = token.capture(1);
    format!(
        "<a href=\"{}\">{}</a>",
        obfuscate(&format!("mailto:{}", address)),
        obfuscate(address)
    )
}

fn is_ordered(token: &Token) -> bool {
    token.capture(1).starts_with(|c: char| c.is_ascii_digit())
}

fn open_marker(token: &Token) -> String {
    match token.kind {
        TokenKind::OpenMarker(BlockKind::Blockquote) => "<blockquote>".to_string(),
        TokenKind::OpenMarker(BlockKind::List) if is_ordered(token) => "<ol>".to_string(),
        TokenKind::OpenMarker(BlockKind::List) => "<ul>".to_string(),
        TokenKind::OpenMarker(BlockKind::ListItem) => "<li>".to_string(),
        TokenKind::OpenMarker(BlockKind::CodeBlock) => "<pre><code>\n".to_string(),
        TokenKind::OpenMarker(BlockKind::FencedCodeBlock) => {
            let language = match token.capture(1) {
                "" => String::new(),
                lang => format!(" class=\"language-{}\"", escape_html(lang)),
            };
            format!("<pre{}><code{}>", token.attribute_html(), language)
        }
        _ => String::new(),
    }
}

fn close_marker(token: &Token) -> String {
    match token.kind {
        TokenKind::CloseMarker(BlockKind::Blockquote) => "</blockquote>".to_string(),
        TokenKind::CloseMarker(BlockKind::List) if is_ordered(token) => "</ol>".to_string(),
        TokenKind::CloseMarker(BlockKind::List) => "</ul>".to_string(),
        TokenKind::CloseMarker(BlockKind::ListItem) => "</li>".to_string(),
        TokenKind::CloseMarker(BlockKind::CodeBlock)
        | TokenKind::CloseMarker(BlockKind::FencedCodeBlock) => "</code></pre>".to_string(),
        _ => String::new(),
    }
}
