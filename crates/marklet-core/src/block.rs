//! The block engine.
//!
//! Consumes the scanner's token stream and keeps an explicit stack of open
//! [`BlockContext`]s (quotes, lists, indented and fenced code). For each
//! token the innermost context decides, in order, whether the token is
//! ignored, opens a nested block, closes the innermost block (after which
//! the token is evaluated again against the new innermost block), is
//! retyped to escaped raw text, or is rendered.
//!
//! Rendered HTML goes into a [`LineBuffer`] keyed by source line.
//! Reference uses are stored as deferred fragments and definitions go into
//! the parse's [`ReferenceTable`]; both are resolved after the pass.

use crate::config::Layout;
use crate::error::Result;
use crate::reference::ReferenceTable;
use crate::render::{escape_html, RenderDispatch};
use crate::token::{BlockKind, HeadingStyle, Token, TokenKind};
use log::{debug, trace};
use std::collections::{BTreeMap, HashMap, HashSet};

// ============================================================================
// Line buffer
// ============================================================================

/// A piece of output for one source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Html(String),
    /// A reference rendered once every definition is known.
    Deferred(Token),
}

/// Output fragments keyed by source line.
#[derive(Debug, Default)]
pub struct LineBuffer {
    lines: BTreeMap<usize, Vec<Fragment>>,
}

impl LineBuffer {
    pub fn push_html(&mut self, line: usize, html: String) {
        self.lines.entry(line).or_default().push(Fragment::Html(html));
    }

    pub fn push_deferred(&mut self, line: usize, token: Token) {
        self.lines.entry(line).or_default().push(Fragment::Deferred(token));
    }

    /// Fragments per line, in line order. Lines without output are absent.
    pub fn lines(&self) -> impl Iterator<Item = &[Fragment]> {
        self.lines.values().map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

// ============================================================================
// Block contexts
// ============================================================================

/// Which contained tokens a block turns into escaped raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retype {
    Nothing,
    /// Kinds compared by [`TokenKind::base`].
    Kinds(HashSet<TokenKind>),
    Everything,
}

impl Retype {
    fn applies(&self, kind: &TokenKind) -> bool {
        match self {
            Retype::Nothing => false,
            Retype::Kinds(kinds) => kinds.contains(&kind.base()),
            Retype::Everything => true,
        }
    }
}

/// One open container and its transition rules.
#[derive(Debug, Clone)]
pub struct BlockContext {
    kind: BlockKind,
    level: u8,
    opener: Token,
    ignore: HashSet<TokenKind>,
    close_on: HashSet<TokenKind>,
    /// Closes the block and is consumed by it.
    terminator: Option<TokenKind>,
    retype: Retype,
    on_create: Vec<TokenKind>,
    close_markers: Vec<TokenKind>,
    before: HashMap<TokenKind, Vec<TokenKind>>,
    after: HashMap<TokenKind, Vec<TokenKind>>,
    /// Closes when a line's first content token is not indentation.
    needs_indent: bool,
    collapse_blank_lines: bool,
    blank_run: usize,
}

impl BlockContext {
    /// The context opened by `token`, nested under `parent`.
    pub fn open(token: &Token, parent: Option<&BlockContext>, layout: Layout) -> Option<Self> {
        let mut context = match token.kind {
            TokenKind::Blockquote(level) => Self::blockquote(token, level),
            TokenKind::List(depth) => Self::list(token, depth, layout),
            TokenKind::CodeBlock(depth) => Self::code_block(token, depth, layout),
            TokenKind::FencedCodeBlock => Self::fenced(token),
            _ => return None,
        };
        if let Some(parent) = parent {
            context.inherit(parent);
        }
        Some(context)
    }

    fn new(kind: BlockKind, level: u8, opener: &Token) -> Self {
        Self {
            kind,
            level,
            opener: opener.clone(),
            ignore: HashSet::new(),
            close_on: HashSet::new(),
            terminator: None,
            retype: Retype::Nothing,
            on_create: vec![TokenKind::OpenMarker(kind)],
            close_markers: vec![TokenKind::CloseMarker(kind)],
            before: HashMap::new(),
            after: HashMap::new(),
            needs_indent: false,
            collapse_blank_lines: false,
            blank_run: 0,
        }
    }

    fn blockquote(opener: &Token, level: u8) -> Self {
        let mut context = Self::new(BlockKind::Blockquote, level, opener);
        context.ignore.insert(TokenKind::Blockquote(level));
        context.close_on.insert(TokenKind::Line);
        context.close_on.extend((1..level).map(TokenKind::Blockquote));
        context
    }

    fn list(opener: &Token, depth: u8, layout: Layout) -> Self {
        let mut context = Self::new(BlockKind::List, depth, opener);
        context.close_on.insert(TokenKind::Line);
        context.close_on.extend((0..depth).map(TokenKind::List));
        context
            .close_on
            .extend((1..=layout.max_nesting).map(TokenKind::Blockquote));
        context.close_on.extend([
            TokenKind::HorizontalRule,
            TokenKind::Heading(HeadingStyle::Atx),
            TokenKind::Heading(HeadingStyle::Setext),
        ]);
        context.retype = Retype::Kinds(HashSet::from([TokenKind::CodeBlock(0)]));

        let item_close = vec![TokenKind::CloseMarker(BlockKind::ListItem)];
        context.before.insert(TokenKind::List(depth), item_close.clone());
        context
            .before
            .insert(TokenKind::CloseMarker(BlockKind::List), item_close);
        context
    }

    fn code_block(opener: &Token, depth: u8, layout: Layout) -> Self {
        let mut context = Self::new(BlockKind::CodeBlock, depth, opener);
        context.close_on.insert(TokenKind::Line);
        context
            .close_on
            .extend((1..=layout.max_nesting).map(TokenKind::Blockquote));
        context.retype = Retype::Everything;
        context.needs_indent = true;
        context
    }

    fn fenced(opener: &Token) -> Self {
        let mut context = Self::new(BlockKind::FencedCodeBlock, 0, opener);
        context.terminator = Some(TokenKind::FencedCodeBlock);
        context.retype = Retype::Everything;
        context.collapse_blank_lines = true;
        context
    }

    /// Take over the quote continuation markers and quote closers of a
    /// quoted ancestor chain.
    fn inherit(&mut self, parent: &BlockContext) {
        if self.kind == BlockKind::Blockquote {
            return;
        }
        let quoted = parent.kind == BlockKind::Blockquote
            || parent.ignore.iter().any(|k| matches!(k, TokenKind::Blockquote(_)));
        if !quoted {
            return;
        }
        self.ignore.extend(
            parent
                .ignore
                .iter()
                .filter(|k| matches!(k, TokenKind::Blockquote(_)))
                .cloned(),
        );
        self.close_on.extend(
            parent
                .close_on
                .iter()
                .filter(|k| matches!(k, TokenKind::Blockquote(_)))
                .cloned(),
        );
    }

    #[inline]
    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    #[inline]
    pub fn level(&self) -> u8 {
        self.level
    }

    #[inline]
    pub fn ignores(&self, kind: &TokenKind) -> bool {
        self.ignore.contains(kind)
    }

    #[inline]
    pub fn is_terminator(&self, kind: &TokenKind) -> bool {
        self.terminator.as_ref() == Some(kind)
    }

    #[inline]
    pub fn retypes(&self, kind: &TokenKind) -> bool {
        self.retype.applies(kind)
    }

    /// Whether `kind` opens a block nested inside this one.
    pub fn accepts(&self, kind: &TokenKind) -> bool {
        if self.retypes(kind) {
            return false;
        }
        match (self.kind, kind) {
            (BlockKind::Blockquote, TokenKind::Blockquote(level)) => *level > self.level,
            (BlockKind::Blockquote, TokenKind::List(_))
            | (BlockKind::Blockquote, TokenKind::CodeBlock(_))
            | (BlockKind::Blockquote, TokenKind::FencedCodeBlock) => true,
            (BlockKind::List, TokenKind::List(depth)) => *depth > self.level,
            (BlockKind::List, TokenKind::FencedCodeBlock) => true,
            _ => false,
        }
    }

    /// `line_head` is true for the first token of a line after any quote
    /// continuation markers.
    pub fn closes_on(&self, kind: &TokenKind, line_head: bool) -> bool {
        self.close_on.contains(kind)
            || (self.needs_indent && line_head && !matches!(kind, TokenKind::CodeBlock(_)))
    }

    /// Count blank lines; true when this one should be dropped.
    fn collapses(&mut self, kind: &TokenKind) -> bool {
        if !self.collapse_blank_lines {
            return false;
        }
        if *kind == TokenKind::Line {
            self.blank_run += 1;
            self.blank_run > 1
        } else {
            self.blank_run = 0;
            false
        }
    }

    /// `token` as escaped raw text. Indentation inside an indented code
    /// block keeps only what goes beyond one indent unit.
    pub fn retype(&self, token: &Token, layout: Layout) -> Token {
        let text = match (self.kind, &token.kind) {
            (BlockKind::CodeBlock, TokenKind::CodeBlock(_)) => token
                .raw_text
                .get(layout.indent_width..)
                .unwrap_or_default()
                .to_string(),
            _ => escape_html(&token.raw_text),
        };
        Token::new(TokenKind::Raw, text, token.line, token.column)
    }

    /// Synthetic tokens rendered when the block opens, followed by whatever
    /// the opening token itself contributes.
    fn opening_tokens(&self, layout: Layout) -> Vec<Token> {
        let line = self.opener.line;
        let mut tokens: Vec<Token> = self
            .on_create
            .iter()
            .map(|kind| Token::derived(kind.clone(), &self.opener, line))
            .collect();
        match self.kind {
            BlockKind::List => tokens.push(self.opener.clone()),
            BlockKind::CodeBlock => {
                let surplus = self.retype(&self.opener, layout);
                if !surplus.raw_text.is_empty() {
                    tokens.push(surplus);
                }
            }
            _ => {}
        }
        tokens
    }

    /// Trigger tokens to render around a token of `kind`.
    fn triggered(&self, kind: &TokenKind, line: usize) -> (Vec<Token>, Vec<Token>) {
        let build = |map: &HashMap<TokenKind, Vec<TokenKind>>| -> Vec<Token> {
            map.get(kind)
                .map(|kinds| {
                    kinds
                        .iter()
                        .map(|k| Token::derived(k.clone(), &self.opener, line))
                        .collect()
                })
                .unwrap_or_default()
        };
        (build(&self.before), build(&self.after))
    }

    /// The block's closing tokens for `line`.
    fn close(&self, line: usize) -> Vec<Token> {
        let mut tokens = Vec::new();
        for marker in &self.close_markers {
            let (before, after) = self.triggered(marker, line);
            tokens.extend(before);
            tokens.push(Token::derived(marker.clone(), &self.opener, line));
            tokens.extend(after);
        }
        tokens
    }
}

// ============================================================================
// Engine
// ============================================================================

/// What the engine hands to reference resolution.
#[derive(Debug, Default)]
pub struct EngineOutput {
    pub buffer: LineBuffer,
    pub references: ReferenceTable,
}

enum Step {
    Discard,
    Open,
    Terminate,
    Close,
    Retype,
    Dispatch,
}

/// Single-use engine for one document.
pub struct BlockEngine<'d> {
    dispatch: &'d RenderDispatch,
    layout: Layout,
    stack: Vec<BlockContext>,
    output: EngineOutput,
    current_line: Option<usize>,
    line_quoted: bool,
    head_seen: bool,
}

impl<'d> BlockEngine<'d> {
    pub fn new(dispatch: &'d RenderDispatch, layout: Layout) -> Self {
        Self {
            dispatch,
            layout,
            stack: Vec::new(),
            output: EngineOutput::default(),
            current_line: None,
            line_quoted: false,
            head_seen: false,
        }
    }

    /// Process a whole token stream.
    pub fn run(mut self, tokens: impl IntoIterator<Item = Token>) -> Result<EngineOutput> {
        for token in tokens {
            self.feed(token)?;
        }
        self.finish()
    }

    /// Open blocks, innermost last.
    pub fn stack(&self) -> &[BlockContext] {
        &self.stack
    }

    pub fn feed(&mut self, token: Token) -> Result<()> {
        if self.current_line != Some(token.line) {
            self.current_line = Some(token.line);
            self.line_quoted = false;
            self.head_seen = false;
        }

        let is_quote = matches!(token.kind, TokenKind::Blockquote(_));
        let line_head = !is_quote && !self.head_seen;
        if is_quote {
            self.line_quoted = true;
        } else {
            self.head_seen = true;
        }

        // A block starting on an unquoted line ends every open quote.
        if line_head && !self.line_quoted && interrupts_quote(&token.kind) {
            self.close_quotes(token.line)?;
        }

        loop {
            let step = match self.stack.last() {
                None if token.kind.is_block_start() => Step::Open,
                None => Step::Dispatch,
                Some(top) if top.ignores(&token.kind) => Step::Discard,
                Some(top) if top.is_terminator(&token.kind) => Step::Terminate,
                Some(top) if top.accepts(&token.kind) => Step::Open,
                Some(top) if top.closes_on(&token.kind, line_head) => Step::Close,
                Some(top) if top.retypes(&token.kind) => Step::Retype,
                Some(_) => Step::Dispatch,
            };

            match step {
                Step::Discard => {
                    trace!("line {}: {} ignored", token.line, token.kind);
                    return Ok(());
                }
                Step::Open => return self.open(token),
                Step::Terminate => return self.close_innermost(token.line),
                Step::Close => {
                    self.close_innermost(token.line)?;
                    debug!("line {}: {} re-evaluated after close", token.line, token.kind);
                }
                Step::Retype => return self.retype(token),
                Step::Dispatch => return self.dispatch_in_context(token),
            }
        }
    }

    /// Force-close everything still open, one line past the last token.
    pub fn finish(mut self) -> Result<EngineOutput> {
        let line = self.current_line.map_or(0, |line| line + 1);
        while !self.stack.is_empty() {
            self.close_innermost(line)?;
        }
        Ok(self.output)
    }

    fn open(&mut self, token: Token) -> Result<()> {
        if let TokenKind::Blockquote(level) = token.kind {
            let outer = self
                .stack
                .iter()
                .rev()
                .find(|c| c.kind == BlockKind::Blockquote)
                .map_or(0, BlockContext::level);
            for intermediate in outer + 1..level {
                let mut step = token.clone();
                step.kind = TokenKind::Blockquote(intermediate);
                self.push(step)?;
            }
        }
        self.push(token)
    }

    fn push(&mut self, token: Token) -> Result<()> {
        let Some(context) = BlockContext::open(&token, self.stack.last(), self.layout) else {
            return self.render(token);
        };
        debug!(
            "line {}: open {} level {} (depth {})",
            token.line,
            context.kind,
            context.level,
            self.stack.len() + 1
        );
        for opening in context.opening_tokens(self.layout) {
            self.render(opening)?;
        }
        self.stack.push(context);
        Ok(())
    }

    fn close_innermost(&mut self, line: usize) -> Result<()> {
        let Some(context) = self.stack.pop() else {
            return Ok(());
        };
        debug!("line {}: close {} level {}", line, context.kind, context.level);
        for token in context.close(line) {
            self.render(token)?;
        }
        Ok(())
    }

    fn close_quotes(&mut self, line: usize) -> Result<()> {
        if let Some(index) = self
            .stack
            .iter()
            .position(|c| c.kind == BlockKind::Blockquote)
        {
            while self.stack.len() > index {
                self.close_innermost(line)?;
            }
        }
        Ok(())
    }

    fn retype(&mut self, token: Token) -> Result<()> {
        let layout = self.layout;
        let Some(top) = self.stack.last_mut() else {
            return self.render(token);
        };
        if top.collapses(&token.kind) {
            trace!("line {}: blank line collapsed", token.line);
            return Ok(());
        }
        let raw = top.retype(&token, layout);
        self.render(raw)
    }

    fn dispatch_in_context(&mut self, token: Token) -> Result<()> {
        let (before, after) = match self.stack.last() {
            Some(top) => top.triggered(&token.kind, token.line),
            None => (Vec::new(), Vec::new()),
        };
        for trigger in before {
            self.render(trigger)?;
        }
        self.render(token)?;
        for trigger in after {
            self.render(trigger)?;
        }
        Ok(())
    }

    fn render(&mut self, token: Token) -> Result<()> {
        trace!("line {}: render {}", token.line, token.kind);
        match token.kind {
            TokenKind::ReferenceDefinition
            | TokenKind::FootnoteDefinition
            | TokenKind::AbbrDefinition => {
                self.output.references.store_token(&token);
            }
            TokenKind::InlineReference | TokenKind::FootnoteReference => {
                self.output.buffer.push_deferred(token.line, token);
            }
            _ => {
                let html = self.dispatch.emit(&token)?;
                self.output.buffer.push_html(token.line, html);
            }
        }
        Ok(())
    }
}

fn interrupts_quote(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::List(_)
            | TokenKind::CodeBlock(_)
            | TokenKind::FencedCodeBlock
            | TokenKind::HorizontalRule
            | TokenKind::Heading(_)
    )
}
