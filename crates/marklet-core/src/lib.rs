//! # Marklet Core
//!
//! A rule-driven converter from a Markdown-flavoured markup language to
//! HTML.
//!
//! Text is split into typed tokens by a priority-ordered rule table, grouped
//! into nested blocks (quotes, lists, indented and fenced code) by a
//! stack-based block engine, and rendered through a kind-keyed emitter
//! table. References, footnotes and abbreviations may be defined anywhere
//! in the document; they are resolved after the block pass.
//!
//! ## Quick Start
//!
//! ```rust
//! use marklet_core::{Config, Parser};
//!
//! let parser = Parser::new(Config::default()).unwrap();
//! let html = parser.parse("> quoted text\n").unwrap();
//!
//! assert_eq!(html, "<blockquote>\n<p>quoted text</p>\n</blockquote>");
//! ```
//!
//! ## Extending
//!
//! Rules, emitters and filters can be added to a parser. Later
//! registrations win ties with earlier ones.
//!
//! ```rust
//! use marklet_core::{Config, Parser, Token, TokenKind};
//!
//! let mut parser = Parser::new(Config::default()).unwrap();
//! let day = TokenKind::Custom("DAY".into());
//! parser.register_rule(r"\.\.(\d+)\.\.", day.clone(), 50).unwrap();
//! parser.register_emitter(day, |token: &Token| format!("{}th", token.capture(1)));
//! parser.add_filter(|html: &str| html.replace("november", "November"));
//!
//! let html = parser.parse("the ..14.. of november").unwrap();
//! assert_eq!(html, "<p>the 14th of November</p>");
//! ```

pub mod block;
pub mod config;
pub mod error;
pub mod filters;
pub mod lexer;
pub mod normalize;
pub mod parser;
pub mod reference;
pub mod render;
pub mod rules;
pub mod scanner;
pub mod token;

pub use config::Config;
pub use error::{Error, Result};
pub use filters::Filter;
pub use parser::Parser;
pub use render::Emitter;
pub use token::{Attributes, BlockKind, HeadingStyle, Token, TokenKind};
