//! mlt - convert marklet documents to HTML
//!
//! Usage:
//!   mlt [OPTIONS] [FILE]
//!   mlt [OPTIONS] <COMMAND> [FILE]
//!
//! Commands:
//!   html      Convert to HTML (default)
//!   tokens    Print the token stream
//!   stats     Show document statistics
//!
//! Reads standard input when FILE is omitted or `-`.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Args, Parser as ClapParser, Subcommand};
use log::{debug, LevelFilter};
use marklet_core::{Config, Parser, Token};
use serde::Serialize;

#[derive(ClapParser)]
#[command(
    name = "mlt",
    version,
    about = "Convert marklet documents to HTML",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// JSON file with converter options
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// HTML-escape the input instead of passing tags through
    #[arg(long, global = true)]
    escape: bool,

    /// Do not wrap loose text in <p>
    #[arg(long, global = true)]
    no_paragraph: bool,

    /// Deepest nesting level for lists, quotes and code blocks
    #[arg(long, global = true, value_name = "N")]
    max_nesting: Option<usize>,

    /// Spaces per nesting level
    #[arg(long, global = true, value_name = "N")]
    indent_width: Option<usize>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    html: HtmlArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a document to HTML
    Html(HtmlArgs),

    /// Print the token stream produced by the scanner
    Tokens(InspectArgs),

    /// Show document statistics
    Stats(InspectArgs),
}

#[derive(Args)]
struct HtmlArgs {
    /// Input file, or `-` for standard input
    input: Option<PathBuf>,

    /// Write HTML here instead of standard output
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct InspectArgs {
    /// Input file, or `-` for standard input
    input: Option<PathBuf>,

    /// Output as JSON
    #[arg(short, long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("error: {:#}", e);
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    // RUST_LOG still wins for individual modules.
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = build_config(&cli)?;
    debug!("using {:?}", config);
    let parser = Parser::new(config).context("failed to build converter")?;

    match cli.command {
        Some(Command::Html(args)) => cmd_html(&parser, &args),
        Some(Command::Tokens(args)) => cmd_tokens(&parser, &args),
        Some(Command::Stats(args)) => cmd_stats(&parser, &args),
        None => cmd_html(&parser, &cli.html),
    }
}

fn build_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config '{}'", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("invalid config '{}'", path.display()))?
        }
        None => Config::default(),
    };

    if cli.escape {
        config.escape_html = true;
    }
    if cli.no_paragraph {
        config.auto_paragraph = false;
    }
    if let Some(max_nesting) = cli.max_nesting {
        config.max_nesting = max_nesting;
    }
    if let Some(indent_width) = cli.indent_width {
        config.indent_width = indent_width;
    }
    Ok(config)
}

fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) if path.as_os_str() != "-" => fs::read_to_string(path)
            .with_context(|| format!("failed to read '{}'", path.display())),
        _ => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("failed to read standard input")?;
            Ok(text)
        }
    }
}

// =============================================================================
// Html Command
// =============================================================================

fn cmd_html(parser: &Parser, args: &HtmlArgs) -> Result<()> {
    let input = read_input(args.input.as_ref())?;
    let html = parser.parse(&input).context("conversion failed")?;

    match &args.output {
        Some(path) => fs::write(path, format!("{}\n", html))
            .with_context(|| format!("failed to write '{}'", path.display()))?,
        None => println!("{}", html),
    }
    Ok(())
}

// =============================================================================
// Tokens Command
// =============================================================================

fn cmd_tokens(parser: &Parser, args: &InspectArgs) -> Result<()> {
    let input = read_input(args.input.as_ref())?;
    let tokens = parser.tokenize(&input);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&tokens)?);
        return Ok(());
    }

    for token in &tokens {
        println!("{}", describe_token(token));
    }
    Ok(())
}

fn describe_token(token: &Token) -> String {
    let mut line = format!(
        "{:>4}:{:<3} {:<20} {:?}",
        token.line + 1,
        token.column,
        token.kind.to_string(),
        token.raw_text
    );
    if let Some(attributes) = &token.attributes {
        line.push_str(&attributes.to_html());
    }
    line
}

// =============================================================================
// Stats Command
// =============================================================================

#[derive(Debug, Serialize)]
struct DocumentStats {
    bytes: usize,
    lines: usize,
    words: usize,
    tokens: usize,
    headings: usize,
    blockquotes: usize,
    list_items: usize,
    code_blocks: usize,
    links: usize,
    definitions: usize,
    kinds: BTreeMap<String, usize>,
    html_bytes: usize,
}

impl DocumentStats {
    fn collect(parser: &Parser, input: &str) -> Result<Self> {
        let tokens = parser.tokenize(input);
        let html = parser.parse(input).context("conversion failed")?;

        let mut kinds: BTreeMap<String, usize> = BTreeMap::new();
        for token in &tokens {
            *kinds.entry(token.kind.base().to_string()).or_default() += 1;
        }

        Ok(Self {
            bytes: input.len(),
            lines: input.lines().count(),
            words: input.split_whitespace().count(),
            tokens: tokens.len(),
            headings: count_tags(&html, &["<h1", "<h2", "<h3", "<h4", "<h5", "<h6"]),
            blockquotes: count_tags(&html, &["<blockquote>"]),
            list_items: count_tags(&html, &["<li>"]),
            code_blocks: count_tags(&html, &["<pre"]),
            links: count_tags(&html, &["<a href"]),
            definitions: tokens.iter().filter(|t| t.kind.is_definition()).count(),
            kinds,
            html_bytes: html.len(),
        })
    }
}

fn count_tags(html: &str, tags: &[&str]) -> usize {
    tags.iter().map(|tag| html.matches(tag).count()).sum()
}

fn cmd_stats(parser: &Parser, args: &InspectArgs) -> Result<()> {
    let input = read_input(args.input.as_ref())?;
    let stats = DocumentStats::collect(parser, &input)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Document Statistics");
    println!("-------------------");
    println!("Size:");
    println!("  Bytes:          {}", stats.bytes);
    println!("  Lines:          {}", stats.lines);
    println!("  Words (est.):   {}", stats.words);
    println!();
    println!("Content:");
    println!("  Headings:       {}", stats.headings);
    println!("  Blockquotes:    {}", stats.blockquotes);
    println!("  List items:     {}", stats.list_items);
    println!("  Code blocks:    {}", stats.code_blocks);
    println!("  Links:          {}", stats.links);
    println!("  Definitions:    {}", stats.definitions);
    println!();
    println!("Tokens:           {}", stats.tokens);
    for (kind, count) in &stats.kinds {
        println!("  {:<16}{}", kind, count);
    }
    println!();
    println!("HTML bytes:       {}", stats.html_bytes);

    Ok(())
}
