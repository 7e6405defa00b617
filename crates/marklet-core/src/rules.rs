//! The priority-ordered rule table.
//!
//! A rule maps an anchored pattern to a [`TokenKind`]. The table is built
//! once per configuration: indentation-sensitive rules are generated one
//! per nesting level, deepest first, and the escaped/raw catch-all pair
//! always sits at the bottom. Rules are tried from the highest priority
//! down; ties keep declaration order, and rules registered later are
//! placed ahead of existing rules of equal priority.

use crate::config::{Config, Layout};
use crate::error::{Error, Result};
use crate::token::{HeadingStyle, TokenKind};
use log::debug;
use regex::{Captures, Regex};

/// Characters that always carry markup meaning.
pub const RESERVED_CHARS: &str = "\\`*_{}[]()#+-.!~<>=";

/// Reserved characters that raw text may still contain.
const RAW_ALLOWED: [char; 4] = [']', '}', ')', '>'];

pub const PRIORITY_RULE: i32 = 1000;
pub const PRIORITY_DEFINITION: i32 = 90;
pub const PRIORITY_LIST: i32 = 80;
pub const PRIORITY_QUOTE: i32 = 60;
pub const PRIORITY_FOOTNOTE: i32 = 55;
pub const PRIORITY_INLINE: i32 = 50;
pub const PRIORITY_INDENT: i32 = 40;
pub const PRIORITY_ESCAPED: i32 = 2;
pub const PRIORITY_RAW: i32 = 1;

/// One pattern → kind mapping.
#[derive(Debug, Clone)]
pub struct Rule {
    pattern: String,
    regex: Regex,
    kind: TokenKind,
    priority: i32,
    line_start: bool,
}

impl Rule {
    /// Compile `pattern`, anchored at the current scan position.
    ///
    /// Fails when the pattern does not compile, when it can match the
    /// empty string, or when `kind` is an engine-owned marker.
    pub fn new(pattern: &str, kind: TokenKind, priority: i32) -> Result<Self> {
        if kind.is_synthetic() {
            return Err(Error::ReservedKind { kind });
        }
        let regex = Regex::new(&format!("^(?:{})", pattern))
            .map_err(|source| Error::invalid_pattern(pattern, source))?;
        if regex.is_match("") {
            return Err(Error::EmptyMatch {
                pattern: pattern.to_string(),
            });
        }
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
            kind,
            priority,
            line_start: false,
        })
    }

    /// Restrict the rule to the start of a line.
    pub fn at_line_start(mut self) -> Self {
        self.line_start = true;
        self
    }

    #[inline]
    pub fn kind(&self) -> &TokenKind {
        &self.kind
    }

    #[inline]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    #[inline]
    pub fn line_start(&self) -> bool {
        self.line_start
    }

    /// Match at the start of `text`. Zero-length matches count as no match.
    #[inline]
    pub fn captures<'t>(&self, text: &'t str) -> Option<Captures<'t>> {
        self.regex
            .captures(text)
            .filter(|caps| caps.get(0).is_some_and(|m| !m.is_empty()))
    }
}

/// Ordered rules for one configuration.
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    /// Build the built-in rules for `config`.
    pub fn new(config: &Config) -> Result<Self> {
        let layout = config.layout();
        let reserved = reserved_set(&config.reserved_chars);
        let mut rules = Vec::new();

        rules.push(
            Rule::new(
                r"[ ]{0,3}(?:(?:\*[ ]*){3,}|(?:-[ ]*){3,}|(?:_[ ]*){3,})$",
                TokenKind::HorizontalRule,
                PRIORITY_RULE,
            )?
            .at_line_start(),
        );

        rules.push(
            Rule::new(
                r"[ ]{0,3}\[\^([^\]\s]+)\]:[ ]*(.*)$",
                TokenKind::FootnoteDefinition,
                PRIORITY_DEFINITION,
            )?
            .at_line_start(),
        );
        rules.push(
            Rule::new(
                r"[ ]{0,3}\*\[([^\]]+)\]:[ ]*(.*)$",
                TokenKind::AbbrDefinition,
                PRIORITY_DEFINITION,
            )?
            .at_line_start(),
        );
        rules.push(
            Rule::new(
                r"[ ]{0,3}\[([^\]^][^\]]*)\]:[ ]*(\S.*)$",
                TokenKind::ReferenceDefinition,
                PRIORITY_DEFINITION,
            )?
            .at_line_start(),
        );

        rules.push(
            Rule::new(
                r"[ ]{0,3}```[ ]*([^`\s{]*)[ ]*(\{[^}]*\})?[ ]*$",
                TokenKind::FencedCodeBlock,
                PRIORITY_LIST,
            )?
            .at_line_start(),
        );
        for depth in (0..layout.max_nesting).rev() {
            rules.push(
                Rule::new(
                    &format!(r"{}([-+*]|\d+\.)(?:[ ]+|$)", list_indent(depth, layout)),
                    TokenKind::List(depth),
                    PRIORITY_LIST,
                )?
                .at_line_start(),
            );
        }

        for level in (1..=layout.max_nesting).rev() {
            let repeat = if level == layout.max_nesting {
                format!("{{{},}}", level)
            } else {
                format!("{{{}}}", level)
            };
            rules.push(
                Rule::new(
                    &format!(r"[ ]{{0,3}}(?:>[ ]?){}", repeat),
                    TokenKind::Blockquote(level),
                    PRIORITY_QUOTE,
                )?
                .at_line_start(),
            );
        }

        rules.push(Rule::new(
            r"\[\^([^\]\s]+)\]",
            TokenKind::FootnoteReference,
            PRIORITY_FOOTNOTE,
        )?);

        let inline = [
            (
                r"\[!\[([^\]]*)\]\(([^)]*)\)\]\(([^)]*)\)(\{[^}]*\})?",
                TokenKind::InlineLink,
            ),
            (r"!\[([^\]]*)\]\(([^)]*)\)(\{[^}]*\})?", TokenKind::InlineImage),
            (r"\[([^\]]+)\]\(([^)]*)\)(\{[^}]*\})?", TokenKind::InlineLink),
            (
                r"(!?)\[([^\]]+)\][ ]?\[([^\]]*)\](\{[^}]*\})?",
                TokenKind::InlineReference,
            ),
            (r"<((?i:https?|ftp)://[^\s<>]+)>", TokenKind::Url),
            (r"<(?:mailto:)?([^\s@<>]+@[^\s@<>]+\.[^\s@<>]+)>", TokenKind::Email),
            (r"(``)[ ]?(.+?)[ ]?``", TokenKind::InlineSpan),
            (r"(`)([^`]+)`", TokenKind::InlineSpan),
            (r"(\*\*)(\S(?:.*?\S)?)\*\*", TokenKind::InlineSpan),
            (r"(__)(\S(?:.*?\S)?)__", TokenKind::InlineSpan),
            (r"(~~)(\S(?:.*?\S)?)~~", TokenKind::InlineSpan),
            (r"(\*)([^*\s](?:[^*]*[^*\s])?)\*", TokenKind::InlineSpan),
            (r"(_)([^_\s](?:[^_]*[^_\s])?)_", TokenKind::InlineSpan),
        ];
        for (pattern, kind) in inline {
            rules.push(Rule::new(pattern, kind, PRIORITY_INLINE)?);
        }

        rules.push(
            Rule::new(
                r"(#+)[ ]+(.*?)(?:[ ]+#+)?[ ]*$",
                TokenKind::Heading(HeadingStyle::Atx),
                PRIORITY_INDENT,
            )?
            .at_line_start(),
        );
        for depth in (1..=layout.max_nesting).rev() {
            rules.push(
                Rule::new(
                    &format!("[ ]{{{}}}", layout.indent_width * depth as usize),
                    TokenKind::CodeBlock(depth),
                    PRIORITY_INDENT,
                )?
                .at_line_start(),
            );
        }

        let all: String = reserved.iter().map(|c| regex::escape(&c.to_string())).collect();
        let stops: String = reserved
            .iter()
            .filter(|c| !RAW_ALLOWED.contains(c))
            .map(|c| regex::escape(&c.to_string()))
            .collect();
        rules.push(Rule::new(
            &format!(r"\\([{}])", all),
            TokenKind::Escaped,
            PRIORITY_ESCAPED,
        )?);
        rules.push(Rule::new(&format!("[^{}]+", stops), TokenKind::Raw, PRIORITY_RAW)?);

        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        debug!("built rule table with {} rules", rules.len());
        Ok(Self { rules })
    }

    /// Insert `rule` ahead of every rule with the same or lower priority.
    pub fn register(&mut self, rule: Rule) {
        let at = self
            .rules
            .iter()
            .position(|existing| existing.priority <= rule.priority)
            .unwrap_or(self.rules.len());
        debug!("registered rule {} for {} at position {}", rule.pattern, rule.kind, at);
        self.rules.insert(at, rule);
    }

    #[inline]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether any line-start rule matches at the beginning of `text`.
    pub fn matches_line_start(&self, text: &str) -> bool {
        self.rules
            .iter()
            .filter(|rule| rule.line_start)
            .any(|rule| rule.captures(text).is_some())
    }
}

/// Leading-space pattern for a list marker at `depth`.
///
/// Depth `d > 0` covers `(d-1)*w+1 ..= d*w` spaces, so partial indents
/// round up to the next level.
fn list_indent(depth: u8, layout: Layout) -> String {
    if depth == 0 {
        return String::new();
    }
    let width = layout.indent_width;
    let depth = depth as usize;
    format!("[ ]{{{},{}}}", (depth - 1) * width + 1, depth * width)
}

fn reserved_set(extra: &str) -> Vec<char> {
    let mut chars: Vec<char> = Vec::new();
    for c in RESERVED_CHARS.chars().chain(extra.chars()) {
        if !c.is_whitespace() && !chars.contains(&c) {
            chars.push(c);
        }
    }
    chars
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RuleTable {
        RuleTable::new(&Config::default()).unwrap()
    }

    fn first_match(table: &RuleTable, text: &str) -> Option<TokenKind> {
        table
            .rules()
            .iter()
            .find(|rule| rule.captures(text).is_some())
            .map(|rule| rule.kind().clone())
    }

    #[test]
    fn test_sorted_by_priority() {
        let table = table();
        let priorities: Vec<i32> = table.rules().iter().map(Rule::priority).collect();
        assert!(priorities.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(table.rules().last().map(|r| r.kind().clone()), Some(TokenKind::Raw));
    }

    #[test]
    fn test_levels_generated_deepest_first() {
        let table = table();
        let lists: Vec<u8> = table
            .rules()
            .iter()
            .filter_map(|r| match r.kind() {
                TokenKind::List(d) => Some(*d),
                _ => None,
            })
            .collect();
        assert_eq!(lists, vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_deep_markers_win() {
        let table = table();
        assert_eq!(first_match(&table, "> > > x"), Some(TokenKind::Blockquote(3)));
        assert_eq!(first_match(&table, ">>>>>> x"), Some(TokenKind::Blockquote(4)));
        assert_eq!(first_match(&table, "        - x"), Some(TokenKind::List(2)));
        assert_eq!(first_match(&table, "  - x"), Some(TokenKind::List(1)));
        assert_eq!(first_match(&table, "        code"), Some(TokenKind::CodeBlock(2)));
    }

    #[test]
    fn test_rule_beats_list_marker() {
        assert_eq!(first_match(&table(), "* * *"), Some(TokenKind::HorizontalRule));
        assert_eq!(first_match(&table(), "* item"), Some(TokenKind::List(0)));
    }

    #[test]
    fn test_raw_stops_at_reserved() {
        let table = table();
        let raw = table.rules().last().unwrap();
        let caps = raw.captures("plain] text*more").unwrap();
        assert_eq!(&caps[0], "plain] text");
    }

    #[test]
    fn test_extra_reserved_chars() {
        let table = RuleTable::new(&Config::default().with_reserved_chars("@")).unwrap();
        let raw = table.rules().last().unwrap();
        assert_eq!(&raw.captures("a@b").unwrap()[0], "a");
        assert_eq!(first_match(&table, "\\@"), Some(TokenKind::Escaped));
    }

    #[test]
    fn test_register_wins_ties() {
        let mut table = table();
        let rule = Rule::new(r"\.\.(\d+)\.\.", TokenKind::Custom("HOUSE".into()), PRIORITY_INLINE).unwrap();
        table.register(rule);
        let first_inline = table
            .rules()
            .iter()
            .find(|r| r.priority() == PRIORITY_INLINE)
            .unwrap();
        assert_eq!(first_inline.kind(), &TokenKind::Custom("HOUSE".into()));
    }

    #[test]
    fn test_registration_errors() {
        assert!(matches!(
            Rule::new("(", TokenKind::Raw, 1),
            Err(Error::InvalidPattern { .. })
        ));
        assert!(matches!(
            Rule::new("a*", TokenKind::Raw, 1),
            Err(Error::EmptyMatch { .. })
        ));
        assert!(matches!(
            Rule::new("x", TokenKind::CloseMarker(crate::token::BlockKind::List), 1),
            Err(Error::ReservedKind { .. })
        ));
    }

    #[test]
    fn test_nesting_clamped() {
        let table = RuleTable::new(&Config::default().with_max_nesting(0)).unwrap();
        assert!(table.rules().iter().any(|r| r.kind() == &TokenKind::List(0)));
        assert!(!table.rules().iter().any(|r| r.kind() == &TokenKind::List(1)));
    }
}
