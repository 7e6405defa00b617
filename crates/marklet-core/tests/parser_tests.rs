//! Integration tests for the marklet converter

use marklet_core::{Config, Error, Parser, Token, TokenKind};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn convert(input: &str) -> String {
    convert_with(Config::default(), input)
}

fn convert_with(config: Config, input: &str) -> String {
    Parser::new(config).unwrap().parse(input).unwrap()
}

// ============================================================================
// Plain Text Tests
// ============================================================================

#[test]
fn test_plain_text_becomes_paragraph() {
    assert_eq!(convert("Hello, world!"), "<p>Hello, world!</p>");
}

#[test]
fn test_blank_line_separates_paragraphs() {
    assert_eq!(convert("one\ntwo\n\nthree"), "<p>one\ntwo</p>\n<p>three</p>");
}

#[test]
fn test_inline_tag_does_not_break_paragraph() {
    assert_eq!(
        convert("this is an <object>, used to test stupid paragraph conditional"),
        "<p>this is an <object>, used to test stupid paragraph conditional</p>"
    );
}

#[test]
fn test_empty_input() {
    assert_eq!(convert(""), "");
    assert_eq!(convert("\n\n  \n"), "");
}

#[test]
fn test_escaped_markup_is_literal() {
    assert_eq!(convert(r"\*not em\*"), "<p>*not em*</p>");
}

// ============================================================================
// Heading Tests
// ============================================================================

#[rstest]
#[case("# One", "<h1>One</h1>")]
#[case("### Three ###", "<h3>Three</h3>")]
#[case("###### Six", "<h6>Six</h6>")]
#[case("## Title {#top .big}", "<h2 id=\"top\" class=\"big\">Title</h2>")]
fn test_atx_headings(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(convert(input), expected);
}

#[test]
fn test_setext_headings() {
    assert_eq!(convert("Title\n=====\n\ntext"), "<h1>Title</h1>\n<p>text</p>");
    assert_eq!(convert("Sub {#s}\n---"), "<h2 id=\"s\">Sub</h2>");
}

#[test]
fn test_hash_mid_line_is_text() {
    assert_eq!(convert("a # b"), "<p>a # b</p>");
}

#[test]
fn test_horizontal_rule() {
    assert_eq!(convert("a\n\n---\n\nb"), "<p>a</p>\n<hr />\n<p>b</p>");
    assert_eq!(convert("* * *"), "<hr />");
}

// ============================================================================
// Inline Tests
// ============================================================================

#[test]
fn test_inline_spans() {
    assert_eq!(
        convert("*em* and **strong** and `code` and ~~gone~~"),
        "<p><em>em</em> and <strong>strong</strong> and <code>code</code> and <del>gone</del></p>"
    );
}

#[test]
fn test_code_span_escapes_content() {
    assert_eq!(convert("`a < b`"), "<p><code>a &lt; b</code></p>");
}

#[test]
fn test_inline_link_with_title() {
    assert_eq!(
        convert("[site](http://x.test \"Home\")"),
        "<p><a href=\"http://x.test\" title=\"Home\">site</a></p>"
    );
}

#[test]
fn test_inline_image() {
    assert_eq!(
        convert("![logo](/l.png)"),
        "<p><img src=\"/l.png\" alt=\"logo\" /></p>"
    );
}

#[test]
fn test_image_link() {
    assert_eq!(
        convert("[![logo](l.png)](/home)"),
        "<p><a href=\"/home\"><img src=\"l.png\" alt=\"logo\" /></a></p>"
    );
}

#[test]
fn test_autolinks() {
    assert_eq!(
        convert("<https://example.com>"),
        "<p><a href=\"https://example.com\">https://example.com</a></p>"
    );

    let email = convert("<me@x.io>");
    assert!(email.starts_with("<p><a href=\"&#109;&#x61;"));
    assert!(!email.contains("me@x.io"));
}

// ============================================================================
// Blockquote Tests
// ============================================================================

#[test]
fn test_blockquote() {
    assert_eq!(
        convert("> quoted text"),
        "<blockquote>\n<p>quoted text</p>\n</blockquote>"
    );
}

#[test]
fn test_nested_blockquote() {
    assert_eq!(
        convert("> a\n> > b"),
        "<blockquote>\n<p>a</p>\n<blockquote>\n<p>b</p>\n</blockquote>\n</blockquote>"
    );
}

#[test]
fn test_blank_line_ends_blockquote() {
    assert_eq!(
        convert("> a\n\nb"),
        "<blockquote>\n<p>a</p>\n</blockquote>\n<p>b</p>"
    );
}

// ============================================================================
// List Tests
// ============================================================================

#[test]
fn test_unordered_list() {
    assert_eq!(
        convert("- a\n- b"),
        "<ul>\n<li>\n<p>a</p>\n</li>\n<li>\n<p>b</p>\n</li>\n</ul>"
    );
}

#[test]
fn test_ordered_list() {
    assert_eq!(
        convert("1. one\n2. two"),
        "<ol>\n<li>\n<p>one</p>\n</li>\n<li>\n<p>two</p>\n</li>\n</ol>"
    );
}

#[test]
fn test_nested_list() {
    assert_eq!(
        convert("- a\n    - b\n- c"),
        "<ul>\n<li>\n<p>a</p>\n<ul>\n<li>\n<p>b</p>\n</li>\n</ul>\n</li>\n<li>\n<p>c</p>\n</li>\n</ul>"
    );
}

#[test]
fn test_list_beyond_max_nesting_is_text() {
    let config = Config::default().with_max_nesting(0).with_indent_width(2);
    assert_eq!(
        convert_with(config, "- level 1\n    - level 2"),
        "<ul>\n<li>\n<p>level 1\n- level 2</p>\n</li>\n</ul>"
    );
}

// ============================================================================
// Code Block Tests
// ============================================================================

#[test]
fn test_indented_code_block() {
    assert_eq!(convert("    let x;"), "<pre><code>\nlet x;\n</code></pre>");
}

#[test]
fn test_indented_code_block_custom_width() {
    let config = Config::default().with_max_nesting(0).with_indent_width(2);
    assert_eq!(
        convert_with(config, "  This should be inside a code block"),
        "<pre><code>\nThis should be inside a code block\n</code></pre>"
    );
}

#[test]
fn test_unterminated_fence() {
    assert_eq!(convert("```\ncode"), "<pre><code>\ncode\n</code></pre>");
}

#[test]
fn test_fence_with_language() {
    assert_eq!(
        convert("```rust\nlet x = 1;\n```"),
        "<pre><code class=\"language-rust\">\nlet x = 1;\n</code></pre>"
    );
}

#[test]
fn test_fence_with_attributes() {
    assert_eq!(
        convert("```python {#ex .hl}\nprint(1)\n```"),
        "<pre id=\"ex\" class=\"hl\"><code class=\"language-python\">\nprint(1)\n</code></pre>"
    );
}

#[test]
fn test_fence_content_is_not_markup() {
    assert_eq!(
        convert("```\n# not a heading\n- not a list\n```"),
        "<pre><code>\n# not a heading\n- not a list\n</code></pre>"
    );
}

// ============================================================================
// Reference Tests
// ============================================================================

#[test]
fn test_reference_link_with_title() {
    let html = convert("[a][1]\n\n[1]: http://x.test \"T\"");
    assert!(html.contains("<a href=\"http://x.test\" title=\"T\">a</a>"));
}

#[test]
fn test_definition_after_use() {
    assert_eq!(
        convert("[docs][d]\n\n[d]: /docs"),
        "<p><a href=\"/docs\">docs</a></p>"
    );
}

#[test]
fn test_implicit_reference_is_case_insensitive() {
    assert_eq!(
        convert("[Docs][]\n\n[docs]: /docs"),
        "<p><a href=\"/docs\">Docs</a></p>"
    );
}

#[test]
fn test_reference_image() {
    assert_eq!(
        convert("![alt][logo]\n\n[logo]: /l.png"),
        "<p><img src=\"/l.png\" alt=\"alt\" /></p>"
    );
}

#[test]
fn test_reference_attributes_at_use_site() {
    assert_eq!(
        convert("![i][x]{#q}\n\n[x]: /img.png"),
        "<p><img src=\"/img.png\" alt=\"i\" id=\"q\" /></p>"
    );
    assert_eq!(
        convert("[a][x]{.btn}\n\n[x]: /u"),
        "<p><a href=\"/u\" class=\"btn\">a</a></p>"
    );
}

#[test]
fn test_unresolved_reference_is_literal() {
    assert_eq!(convert("see [x][nope] here"), "<p>see [x][nope] here</p>");
}

#[test]
fn test_footnotes() {
    assert_eq!(
        convert("Text[^1]\n\n[^1]: Note."),
        "<p>Text<sup id=\"fnref-1\"><a href=\"#fn-1\" rel=\"footnote\">1</a></sup></p>\n\
         <div class=\"footnotes\">\n<hr />\n<ol>\n\
         <li id=\"fn-1\">Note. <a href=\"#fnref-1\" class=\"footnote-backref\">&#8617;</a></li>\n\
         </ol>\n</div>"
    );
}

#[test]
fn test_footnote_text_is_not_wrapped_in_paragraph() {
    let html = convert("One[^a] two[^b]\n\n[^a]: First.\n[^b]: Second.");
    assert!(html.contains("<li id=\"fn-1\">First. <a href=\"#fnref-1\""));
    assert!(html.contains("<li id=\"fn-2\">Second. <a href=\"#fnref-2\""));
    assert!(!html.contains("<p>First."));
    assert!(!html.contains("<p>Second."));
}

#[test]
fn test_unresolved_footnote_is_literal() {
    assert_eq!(convert("Text[^x]"), "<p>Text[^x]</p>");
}

#[rstest]
#[case(
    "The HTML standard\n\n*[HTML]: Hyper Text Markup Language",
    "<p>The <abbr title=\"Hyper Text Markup Language\">HTML</abbr> standard</p>"
)]
#[case(
    "HTML5 is not HTML\n\n*[HTML]: markup",
    "<p>HTML5 is not <abbr title=\"markup\">HTML</abbr></p>"
)]
#[case(
    "I like C++ a lot\n\n*[C++]: lang",
    "<p>I like <abbr title=\"lang\">C++</abbr> a lot</p>"
)]
#[case(
    "Use .NET today\n\n*[.NET]: framework",
    "<p>Use <abbr title=\"framework\">.NET</abbr> today</p>"
)]
#[case(
    "Use `HTML` or HTML\n\n*[HTML]: markup",
    "<p>Use <code>HTML</code> or <abbr title=\"markup\">HTML</abbr></p>"
)]
#[case(
    "The HTML way\n\n*[HTML]: markup {.term}",
    "<p>The <abbr title=\"markup\" class=\"term\">HTML</abbr> way</p>"
)]
#[case("The word\n\n*[ ]: blank", "<p>The word</p>")]
fn test_abbreviation(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(convert(input), expected);
}

#[test]
fn test_definitions_do_not_leak_between_parses() {
    let parser = Parser::new(Config::default()).unwrap();
    let first = parser.parse("[a][x]\n\n[x]: /one").unwrap();
    assert_eq!(first, "<p><a href=\"/one\">a</a></p>");
    assert_eq!(parser.parse("[a][x]").unwrap(), "<p>[a][x]</p>");
}

// ============================================================================
// Escape Mode Tests
// ============================================================================

#[test]
fn test_escape_mode_escapes_tags() {
    let config = Config::default().with_escape_html(true).with_auto_paragraph(false);
    assert_eq!(
        convert_with(config, "<i>This is italic</i>, and this is **strong**"),
        "&lt;i&gt;This is italic&lt;/i&gt;, and this is <strong>strong</strong>"
    );
}

#[test]
fn test_escape_mode_keeps_blockquotes() {
    let config = Config::default().with_escape_html(true);
    assert_eq!(
        convert_with(config, "> This should be a blockquote"),
        "<blockquote>\n<p>This should be a blockquote</p>\n</blockquote>"
    );
}

#[test]
fn test_config_from_json() {
    let config: Config = serde_json::from_str(r#"{"escape_html": true, "auto_paragraph": false}"#).unwrap();
    assert_eq!(config.indent_width, 4);
    assert_eq!(convert_with(config, "a <b>"), "a &lt;b&gt;");
}

// ============================================================================
// Idempotence Tests
// ============================================================================

#[rstest]
#[case("<p>text</p>")]
#[case("<blockquote>\n<p>quoted text</p>\n</blockquote>")]
fn test_converted_html_is_stable(#[case] html: &str) {
    assert_eq!(convert(html), html);
}

// ============================================================================
// Extension Tests
// ============================================================================

#[test]
fn test_custom_rule_and_emitter() {
    let mut parser = Parser::new(Config::default()).unwrap();
    let house = TokenKind::Custom("HOUSE".into());
    parser.register_rule(r"\.\.(\d+)\.\.", house.clone(), 50).unwrap();
    parser.register_emitter(house, |token: &Token| format!("{}th", token.capture(1)));

    assert_eq!(
        parser.parse("Hi friends today is the ..14.. of november").unwrap(),
        "<p>Hi friends today is the 14th of november</p>"
    );
}

#[test]
fn test_override_raw_emitter() {
    let mut parser = Parser::new(Config::default()).unwrap();
    parser.register_emitter(TokenKind::Raw, |token: &Token| {
        token.raw_text.replace("Hello", "World")
    });
    assert_eq!(parser.parse("Hello!").unwrap(), "<p>World!</p>");
}

#[test]
fn test_user_filter_runs_last() {
    let mut parser = Parser::new(Config::default()).unwrap();
    parser.add_filter(|html: &str| html.replace('a', "b"));
    assert_eq!(
        parser.parse("Hola Amigos, como están? Feliz Navidad").unwrap(),
        "<p>Holb Amigos, como están? Feliz Nbvidbd</p>"
    );
}

#[test]
fn test_registration_errors() {
    let mut parser = Parser::new(Config::default()).unwrap();
    let custom = TokenKind::Custom("X".into());

    let err = parser.register_rule("x*", custom.clone(), 10).unwrap_err();
    assert!(matches!(err, Error::EmptyMatch { .. }));
    assert!(err.is_registration());

    let err = parser
        .register_rule("x", TokenKind::OpenMarker(marklet_core::BlockKind::List), 10)
        .unwrap_err();
    assert!(matches!(err, Error::ReservedKind { .. }));
}

#[test]
fn test_tokenize_exposes_stream() {
    let parser = Parser::new(Config::default()).unwrap();
    let kinds: Vec<TokenKind> = parser
        .tokenize("> - item")
        .into_iter()
        .map(|token| token.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![TokenKind::Blockquote(1), TokenKind::List(0), TokenKind::Raw]
    );
}
