//! The conversion pipeline.
//!
//! normalize → scan → block engine → reference resolution → filters.
//! Each call to [`Parser::parse`] owns its block stack and reference table;
//! the rule table and emitters are shared read-only between calls.

use crate::block::BlockEngine;
use crate::config::Config;
use crate::error::Result;
use crate::filters::{corrections, paragraphs, Filter, FilterChain};
use crate::normalize::normalize;
use crate::reference::Resolver;
use crate::render::{Emitter, RenderDispatch};
use crate::rules::{Rule, RuleTable};
use crate::scanner::Scanner;
use crate::token::{Token, TokenKind};
use log::{debug, info};

/// Markup to HTML converter.
#[derive(Debug)]
pub struct Parser {
    config: Config,
    rules: RuleTable,
    dispatch: RenderDispatch,
    filters: FilterChain,
}

impl Parser {
    /// Build a converter for `config` with the default rules and emitters.
    pub fn new(config: Config) -> Result<Self> {
        let rules = RuleTable::new(&config)?;
        Ok(Self {
            config,
            rules,
            dispatch: RenderDispatch::new(),
            filters: FilterChain::new(),
        })
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Add a rule ahead of every existing rule of the same priority.
    ///
    /// The pattern is checked now: it must compile, must not match the
    /// empty string, and may not produce an open/close marker kind.
    pub fn register_rule(&mut self, pattern: &str, kind: TokenKind, priority: i32) -> Result<()> {
        let rule = Rule::new(pattern, kind, priority)?;
        self.rules.register(rule);
        Ok(())
    }

    /// Like [`register_rule`](Self::register_rule), for a rule that only
    /// applies at the start of a line.
    pub fn register_line_rule(
        &mut self,
        pattern: &str,
        kind: TokenKind,
        priority: i32,
    ) -> Result<()> {
        let rule = Rule::new(pattern, kind, priority)?.at_line_start();
        self.rules.register(rule);
        Ok(())
    }

    /// Install `emitter` for `kind`, replacing the current one.
    pub fn register_emitter<E>(&mut self, kind: TokenKind, emitter: E)
    where
        E: Emitter + Send + Sync + 'static,
    {
        debug!("registered emitter for {}", kind);
        self.dispatch.register(kind, emitter);
    }

    /// Append a filter that runs after the built-in ones.
    pub fn add_filter<F>(&mut self, filter: F)
    where
        F: Filter + Send + Sync + 'static,
    {
        self.filters.push(filter);
    }

    /// Normalize and scan `input` without building blocks.
    pub fn tokenize(&self, input: &str) -> Vec<Token> {
        let text = normalize(input, &self.config);
        Scanner::new(&self.rules).scan(&text)
    }

    /// Convert `input` to HTML.
    ///
    /// Fails only when a token kind has no emitter.
    pub fn parse(&self, input: &str) -> Result<String> {
        let tokens = self.tokenize(input);
        let token_count = tokens.len();

        let output = BlockEngine::new(&self.dispatch, self.config.layout()).run(tokens)?;
        let html = Resolver::new(&output.references, &self.dispatch).render(&output.buffer)?;

        let mut html = corrections(&html);
        if self.config.auto_paragraph {
            html = paragraphs(&html);
        }
        let html = self.filters.apply(html);

        info!(
            "converted {} bytes ({} tokens) into {} bytes of HTML",
            input.len(),
            token_count,
            html.len()
        );
        Ok(html.trim_matches('\n').to_string())
    }
}
