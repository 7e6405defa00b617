//! Input clean-up applied before scanning.

use crate::config::Config;
use crate::render::escape_html;
use once_cell::sync::Lazy;
use regex::Regex;

static ESCAPED_QUOTE_MARKERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^(?:&gt;[ ]?)+").unwrap());

/// Bring `input` into the shape the scanner expects.
///
/// Strips a byte-order mark and `\x1A`, unifies line endings to `\n`,
/// expands tabs, empties whitespace-only lines and trims blank lines from
/// both ends. With `escape_html` the text is entity-escaped, but leading
/// quote markers are turned back into `>` so blockquotes still work.
pub fn normalize(input: &str, config: &Config) -> String {
    let text = input.strip_prefix('\u{FEFF}').unwrap_or(input);
    let text = text.replace("\r\n", "\n").replace('\r', "\n").replace('\u{1A}', "");
    let tab = " ".repeat(config.tab_width);

    let mut lines: Vec<String> = text
        .split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else if line.contains('\t') {
                line.replace('\t', &tab)
            } else {
                line.to_string()
            }
        })
        .collect();

    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    let first = lines.iter().position(|line| !line.is_empty()).unwrap_or(lines.len());
    let text = lines[first..].join("\n");

    if config.escape_html {
        let escaped = escape_html(&text);
        ESCAPED_QUOTE_MARKERS
            .replace_all(&escaped, |caps: &regex::Captures<'_>| caps[0].replace("&gt;", ">"))
            .into_owned()
    } else {
        text
    }
}
