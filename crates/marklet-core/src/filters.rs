//! Post-processing filters applied to finished HTML.
//!
//! The converter always runs [`corrections`], then [`paragraphs`] when
//! auto-paragraphs are enabled, then every user filter in registration
//! order.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// A pure HTML → HTML transformation.
pub trait Filter {
    fn apply(&self, html: &str) -> String;
}

impl<F> Filter for F
where
    F: Fn(&str) -> String,
{
    #[inline]
    fn apply(&self, html: &str) -> String {
        self(html)
    }
}

/// User filters, applied in the order they were added.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn Filter + Send + Sync>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F>(&mut self, filter: F)
    where
        F: Filter + Send + Sync + 'static,
    {
        self.filters.push(Box::new(filter));
    }

    pub fn apply(&self, html: String) -> String {
        self.filters
            .iter()
            .fold(html, |html, filter| filter.apply(&html))
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.filters.len())
            .finish()
    }
}

// ============================================================================
// Corrections
// ============================================================================

static ITEM_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n</li>").unwrap());
static EMPTY_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"<li>\s*</li>").unwrap());
static ADJACENT_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</code></pre>\n(?:[ \t]*\n)*<pre><code>\n").unwrap());

/// Small fixes to the engine's raw output: item closers pulled onto the
/// item's last line, empty items dropped, and indented code blocks split
/// by a blank line merged back together.
pub fn corrections(html: &str) -> String {
    let html = ITEM_END.replace_all(html, "</li>");
    let html = EMPTY_ITEM.replace_all(&html, "");
    ADJACENT_CODE.replace_all(&html, "\n").into_owned()
}

// ============================================================================
// Paragraphs
// ============================================================================

const PLACEHOLDER_MARK: char = '\u{1A}';

static PROTECTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)<pre\b[^>]*>.*?</pre>|<h[1-6]\b[^>]*>.*?</h[1-6]>|<p\b[^>]*>.*?</p>|<div class="footnotes">.*?</div>"#,
    )
    .unwrap()
});
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new("\u{1A}([0-9]+)\u{1A}").unwrap());
static BLOCK_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"</?(?:address|article|aside|blockquote|dd|details|div|dl|dt|fieldset|figcaption|figure|footer|form|header|hr|li|nav|ol|section|summary|table|tbody|td|tfoot|th|thead|tr|ul)\b[^>]*>",
    )
    .unwrap()
});
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());
static LEADING_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]+").unwrap());
static HARD_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)[ ]{2,}$").unwrap());

/// Wrap loose text in `<p>` and put block-level tags on their own lines.
///
/// `<pre>` blocks, headings, existing paragraphs and the footnote list pass
/// through verbatim.
/// A line ending in two spaces becomes a `<br />`.
pub fn paragraphs(html: &str) -> String {
    let mut protected: Vec<String> = Vec::new();
    let text = PROTECTED.replace_all(html, |caps: &Captures<'_>| {
        protected.push(caps[0].to_string());
        format!(
            "\n\n{mark}{}{mark}\n\n",
            protected.len() - 1,
            mark = PLACEHOLDER_MARK
        )
    });
    let text = BLOCK_TAG.replace_all(&text, "\n\n$0\n\n");

    let mut chunks: Vec<String> = Vec::new();
    for chunk in BLANK_LINES.split(&text) {
        let chunk = chunk.trim();
        if chunk.is_empty() {
            continue;
        }
        if is_whole_match(&PLACEHOLDER, chunk) || is_whole_match(&BLOCK_TAG, chunk) {
            chunks.push(chunk.to_string());
            continue;
        }
        let body = LEADING_SPACE.replace_all(chunk, "");
        let body = HARD_BREAK.replace_all(&body, "<br />");
        chunks.push(format!("<p>{}</p>", body));
    }

    let joined = chunks.join("\n");
    PLACEHOLDER
        .replace_all(&joined, |caps: &Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|index| protected.get(index))
                .cloned()
                .unwrap_or_default()
        })
        .into_owned()
}

fn is_whole_match(pattern: &Regex, text: &str) -> bool {
    pattern
        .find(text)
        .is_some_and(|m| m.start() == 0 && m.end() == text.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_corrections_drop_empty_items() {
        assert_eq!(corrections("<ul><li>\n</li><li>a\n</li></ul>"), "<ul><li>a</li></ul>");
    }

    #[test]
    fn test_corrections_merge_code_blocks() {
        assert_eq!(
            corrections("<pre><code>\na\n</code></pre>\n<pre><code>\nb\n</code></pre>"),
            "<pre><code>\na\n\nb\n</code></pre>"
        );
    }

    #[test]
    fn test_paragraph_wraps_text() {
        assert_eq!(paragraphs("one\ntwo\n\nthree"), "<p>one\ntwo</p>\n<p>three</p>");
    }

    #[test]
    fn test_block_tags_isolated() {
        assert_eq!(
            paragraphs("<blockquote>quoted text\n</blockquote>"),
            "<blockquote>\n<p>quoted text</p>\n</blockquote>"
        );
    }

    #[test]
    fn test_pre_kept_verbatim() {
        let html = "<pre><code>\n  a\n\n  b\n</code></pre>";
        assert_eq!(paragraphs(html), html);
    }

    #[test]
    fn test_footnote_list_kept_verbatim() {
        let notes = "<div class=\"footnotes\">\n<hr />\n<ol>\n<li id=\"fn-1\">Note</li>\n</ol>\n</div>";
        assert_eq!(
            paragraphs(&format!("text\n\n{}", notes)),
            format!("<p>text</p>\n{}", notes)
        );
    }

    #[test]
    fn test_heading_not_wrapped() {
        assert_eq!(paragraphs("<h1>T</h1>\ntext"), "<h1>T</h1>\n<p>text</p>");
    }

    #[test]
    fn test_hard_break_and_leading_space() {
        assert_eq!(paragraphs("  a  \n  b"), "<p>a<br />\nb</p>");
    }

    #[test]
    fn test_existing_paragraph_untouched() {
        assert_eq!(paragraphs("<p>done</p>"), "<p>done</p>");
    }

    #[test]
    fn test_inline_tags_stay_in_paragraph() {
        assert_eq!(
            paragraphs("this is an <object>, used here"),
            "<p>this is an <object>, used here</p>"
        );
    }

    #[test]
    fn test_chain_runs_in_order() {
        let mut chain = FilterChain::new();
        chain.push(|html: &str| html.replace('a', "b"));
        chain.push(|html: &str| html.replace('b', "c"));
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.apply("abc".to_string()), "ccc");
    }
}
