//! Forward-reference resolution.
//!
//! Definitions (`[id]: url "title"`, `[^note]: text`, `*[TERM]: expansion`)
//! may appear anywhere in a document, before or after their uses. The block
//! engine stores them in a [`ReferenceTable`] owned by the parse and leaves
//! deferred fragments in its line buffer; the [`Resolver`] rewrites those
//! once the whole stream has been seen, then appends footnotes and applies
//! abbreviations.

use crate::block::{Fragment, LineBuffer};
use crate::error::{Error, Result};
use crate::render::{escape_html, split_destination, RenderDispatch};
use crate::token::{Attributes, Token, TokenKind};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static TAG_OR_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>|[^<]+|<").unwrap());

/// Case-fold a reference key and collapse inner whitespace.
pub fn normalize_key(key: &str) -> String {
    key.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// A link or image target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkDefinition {
    pub target: String,
    pub title: Option<String>,
    pub attributes: Option<Attributes>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Footnote {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Abbreviation {
    pub term: String,
    pub expansion: String,
    pub attributes: Option<Attributes>,
}

/// Anything a definition line can declare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Definition {
    Link(LinkDefinition),
    Footnote(String),
    Abbreviation {
        expansion: String,
        attributes: Option<Attributes>,
    },
}

impl Definition {
    /// Read the key and definition out of a definition token. A blank key
    /// defines nothing.
    pub fn from_token(token: &Token) -> Option<(String, Definition)> {
        let key = token.capture(1).trim().to_string();
        if key.is_empty() {
            return None;
        }
        let body = token.capture(2).trim();
        let definition = match token.kind {
            TokenKind::ReferenceDefinition => {
                let (target, title) = split_destination(body);
                Definition::Link(LinkDefinition {
                    target,
                    title,
                    attributes: token.attributes.clone(),
                })
            }
            TokenKind::FootnoteDefinition => Definition::Footnote(body.to_string()),
            TokenKind::AbbrDefinition => Definition::Abbreviation {
                expansion: body.to_string(),
                attributes: token.attributes.clone(),
            },
            _ => return None,
        };
        Some((key, definition))
    }
}

/// Per-parse definition storage. Later definitions of a key replace
/// earlier ones; a redefined footnote keeps its original number.
#[derive(Debug, Default)]
pub struct ReferenceTable {
    links: HashMap<String, LinkDefinition>,
    footnotes: Vec<Footnote>,
    footnote_numbers: HashMap<String, usize>,
    abbreviations: Vec<Abbreviation>,
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&mut self, key: &str, definition: Definition) {
        let normalized = normalize_key(key);
        match definition {
            Definition::Link(link) => {
                self.links.insert(normalized, link);
            }
            Definition::Footnote(text) => match self.footnote_numbers.get(&normalized) {
                Some(&number) => self.footnotes[number - 1].text = text,
                None => {
                    self.footnotes.push(Footnote {
                        id: key.to_string(),
                        text,
                    });
                    self.footnote_numbers.insert(normalized, self.footnotes.len());
                }
            },
            Definition::Abbreviation {
                expansion,
                attributes,
            } => {
                let abbreviation = Abbreviation {
                    term: key.to_string(),
                    expansion,
                    attributes,
                };
                match self.abbreviations.iter_mut().find(|a| a.term == key) {
                    Some(existing) => *existing = abbreviation,
                    None => self.abbreviations.push(abbreviation),
                }
            }
        }
    }

    /// Store the definition carried by `token`, if it is a definition.
    pub fn store_token(&mut self, token: &Token) {
        if let Some((key, definition)) = Definition::from_token(token) {
            debug!("line {}: defined {} `{}`", token.line, token.kind, key);
            self.store(&key, definition);
        }
    }

    pub fn link(&self, key: &str) -> Option<&LinkDefinition> {
        self.links.get(&normalize_key(key))
    }

    /// 1-based footnote number, in definition order.
    pub fn footnote_number(&self, id: &str) -> Option<usize> {
        self.footnote_numbers.get(&normalize_key(id)).copied()
    }

    pub fn footnotes(&self) -> &[Footnote] {
        &self.footnotes
    }

    pub fn abbreviations(&self) -> &[Abbreviation] {
        &self.abbreviations
    }

    /// Rewrite a provisional reference into its final token.
    ///
    /// References without a definition come back as raw literal text.
    pub fn resolve(&self, token: &Token) -> Token {
        match token.kind {
            TokenKind::InlineReference => self.resolve_link(token),
            TokenKind::FootnoteReference => self.resolve_footnote(token),
            _ => token.clone(),
        }
    }

    fn resolve_link(&self, token: &Token) -> Token {
        let text = token.capture(2);
        let key = match token.capture(3) {
            "" => text,
            id => id,
        };
        let Some(link) = self.link(key) else {
            debug!("line {}: unresolved reference `{}`", token.line, key);
            return literal(token);
        };

        let destination = match &link.title {
            Some(title) => format!("{} \"{}\"", link.target, title),
            None => link.target.clone(),
        };
        let kind = if token.capture(1) == "!" {
            TokenKind::InlineImage
        } else {
            TokenKind::InlineLink
        };
        Token::derived(kind, token, token.line)
            .with_captures(vec![token.raw_text.clone(), text.to_string(), destination])
            .with_attributes(token.attributes.clone().or_else(|| link.attributes.clone()))
    }

    fn resolve_footnote(&self, token: &Token) -> Token {
        let id = token.capture(1);
        match self.footnote_number(id) {
            Some(number) => Token::derived(TokenKind::FootnoteReference, token, token.line)
                .with_captures(vec![token.raw_text.clone(), id.to_string(), number.to_string()]),
            None => {
                debug!("line {}: unresolved footnote `{}`", token.line, id);
                literal(token)
            }
        }
    }

    /// The footnote list appended after the document, if any footnotes exist.
    pub fn footnotes_html(&self) -> Option<String> {
        if self.footnotes.is_empty() {
            return None;
        }
        let mut html = String::from("<div class=\"footnotes\">\n<hr />\n<ol>\n");
        for (index, note) in self.footnotes.iter().enumerate() {
            let n = index + 1;
            html.push_str(&format!(
                "<li id=\"fn-{n}\">{} <a href=\"#fnref-{n}\" class=\"footnote-backref\">&#8617;</a></li>\n",
                note.text,
                n = n
            ));
        }
        html.push_str("</ol>\n</div>");
        Some(html)
    }
}

fn literal(token: &Token) -> Token {
    Token::new(TokenKind::Raw, token.raw_text.clone(), token.line, token.column)
}

/// Second pass over the engine's line buffer.
pub struct Resolver<'a> {
    references: &'a ReferenceTable,
    dispatch: &'a RenderDispatch,
}

impl<'a> Resolver<'a> {
    pub fn new(references: &'a ReferenceTable, dispatch: &'a RenderDispatch) -> Self {
        Self {
            references,
            dispatch,
        }
    }

    /// Join the buffer into HTML, resolving deferred fragments, appending
    /// footnotes and substituting abbreviations.
    pub fn render(&self, buffer: &LineBuffer) -> Result<String> {
        let mut lines = Vec::with_capacity(buffer.len());
        for fragments in buffer.lines() {
            let mut line = String::new();
            for fragment in fragments {
                match fragment {
                    Fragment::Html(html) => line.push_str(html),
                    Fragment::Deferred(token) => {
                        let resolved = self.references.resolve(token);
                        line.push_str(&self.dispatch.emit(&resolved)?);
                    }
                }
            }
            lines.push(line);
        }

        let mut html = lines.join("\n");
        if let Some(footnotes) = self.references.footnotes_html() {
            html.push_str("\n\n");
            html.push_str(&footnotes);
        }
        apply_abbreviations(&html, self.references.abbreviations())
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Match `term` as a whole word. A word boundary is only required on an
/// edge where the term itself starts or ends with a word character, so
/// terms like `C++` or `.NET` still match.
fn term_pattern(term: &str) -> String {
    let lead = if term.starts_with(is_word_char) { r"\b" } else { "" };
    let trail = if term.ends_with(is_word_char) { r"\b" } else { "" };
    format!("{}{}{}", lead, regex::escape(term), trail)
}

/// Wrap whole-word occurrences of each term in `<abbr>`, outside tags and
/// code.
pub fn apply_abbreviations(html: &str, abbreviations: &[Abbreviation]) -> Result<String> {
    let mut html = html.to_string();
    for abbreviation in abbreviations.iter().filter(|a| !a.term.is_empty()) {
        let pattern = term_pattern(&abbreviation.term);
        let word = Regex::new(&pattern).map_err(|source| Error::invalid_pattern(&pattern, source))?;
        let replacement = format!(
            "<abbr title=\"{}\"{}>{}</abbr>",
            escape_html(&abbreviation.expansion),
            abbreviation
                .attributes
                .as_ref()
                .map(Attributes::to_html)
                .unwrap_or_default(),
            abbreviation.term
        );

        let mut out = String::with_capacity(html.len());
        let mut code_depth = 0usize;
        for piece in TAG_OR_TEXT.find_iter(&html) {
            let piece = piece.as_str();
            if piece.starts_with("<code") {
                code_depth += 1;
                out.push_str(piece);
            } else if piece.starts_with("</code") {
                code_depth = code_depth.saturating_sub(1);
                out.push_str(piece);
            } else if piece.starts_with('<') || code_depth > 0 {
                out.push_str(piece);
            } else {
                out.push_str(&word.replace_all(piece, regex::NoExpand(&replacement)));
            }
        }
        html = out;
    }
    Ok(html)
}
