//! Turns normalized text into a flat token stream.
//!
//! The scanner walks the document one line at a time. A blank line becomes
//! a single [`TokenKind::Line`] token. Otherwise rules are tried in table
//! order at the current offset and the offset advances by the matched
//! length; when nothing matches, exactly one character is consumed as raw
//! text.
//!
//! Line-start rules only apply at offset 0, or after nothing but quote
//! markers, so `> - item` still opens a list inside the quote.

use crate::lexer::{Lexer, Line};
use crate::rules::{Rule, RuleTable};
use crate::token::{Attributes, HeadingStyle, Token, TokenKind};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static SETEXT_UNDERLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(=+|-+)[ ]*$").unwrap());

/// Stateless scanner over a rule table.
pub struct Scanner<'r> {
    rules: &'r RuleTable,
}

impl<'r> Scanner<'r> {
    #[inline]
    pub fn new(rules: &'r RuleTable) -> Self {
        Self { rules }
    }

    pub fn scan(&self, text: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(text);
        let mut tokens = Vec::new();

        while let Some(line) = lexer.next_line() {
            if line.is_blank() {
                tokens.push(Token::new(TokenKind::Line, "", line.number, 0));
                continue;
            }

            let underline = lexer
                .peek_line()
                .filter(|next| SETEXT_UNDERLINE.is_match(next.text))
                .copied();
            if let Some(underline) = underline {
                if self.is_setext_title(&line) {
                    lexer.next_line();
                    tokens.push(setext_heading(&line, &underline));
                    continue;
                }
            }

            self.scan_line(&line, &mut tokens);
        }

        tokens
    }

    fn scan_line(&self, line: &Line<'_>, tokens: &mut Vec<Token>) {
        let text = line.text;
        let mut offset = 0;
        let mut line_start = true;

        while offset < text.len() {
            let token = self.match_at(&text[offset..], line_start, line.number, offset);
            offset += token.raw_text.len();
            line_start = line_start && matches!(token.kind, TokenKind::Blockquote(_));
            tokens.push(token);
        }
    }

    fn match_at(&self, rest: &str, line_start: bool, line: usize, column: usize) -> Token {
        for rule in self.rules.rules() {
            if rule.line_start() && !line_start {
                continue;
            }
            if let Some(caps) = rule.captures(rest) {
                return token_from_match(rule, &caps, line, column);
            }
        }

        let len = rest.chars().next().map_or(1, char::len_utf8);
        Token::new(TokenKind::Raw, &rest[..len], line, column)
    }

    /// A plain content line: no indentation and no line-start rule applies.
    fn is_setext_title(&self, line: &Line<'_>) -> bool {
        !line.starts_with_space() && !self.rules.matches_line_start(line.text)
    }
}

fn token_from_match(rule: &Rule, caps: &Captures<'_>, line: usize, column: usize) -> Token {
    let raw = caps.get(0).map_or("", |m| m.as_str()).to_string();
    let captures: Vec<String> = caps
        .iter()
        .map(|m| m.map_or_else(String::new, |m| m.as_str().to_string()))
        .collect();

    let token = Token::new(rule.kind().clone(), raw, line, column).with_captures(captures);
    if rule.kind().allows_attributes() {
        extract_attributes(token)
    } else {
        token
    }
}

/// Move a well-formed `{#id .class}` block out of the captures and into
/// the token's attributes. Malformed blocks stay where they are.
fn extract_attributes(mut token: Token) -> Token {
    let Some((range, attrs)) = Attributes::find(&token.raw_text) else {
        return token;
    };
    let block = token.raw_text[range].to_string();
    for capture in token.captures.iter_mut() {
        if capture.contains(&block) {
            *capture = capture.replacen(&block, "", 1);
        }
    }
    token.attributes = Some(attrs);
    token
}

fn setext_heading(title: &Line<'_>, underline: &Line<'_>) -> Token {
    let raw = format!("{}\n{}", title.text, underline.text);
    let marker = underline.text.trim_end().to_string();
    let token = Token::new(TokenKind::Heading(HeadingStyle::Setext), raw.clone(), title.number, 0)
        .with_captures(vec![raw, title.text.to_string(), marker]);
    extract_attributes(token)
}
