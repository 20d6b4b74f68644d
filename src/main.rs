//! Markmaid - render mermaid code blocks in markdown to inline diagrams.
//!
//! # Usage
//!
//! ```bash
//! markmaid README.md
//! markmaid --format html --output README.html README.md
//! markmaid --config mermaid.json5 docs/arch.md
//! ```

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use comrak::{Arena, format_commonmark, format_html, parse_document};

use markmaid::options::DarkSetting;
use markmaid::{Options, transform};

/// Render mermaid code blocks in markdown documents to inline HTML diagrams
#[derive(Parser, Debug)]
#[command(name = "markmaid", version, about, long_about = None)]
struct Cli {
    /// Markdown file to transform
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Write the result here instead of stdout
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Output serialization
    #[arg(long, value_enum, default_value = "markdown")]
    format: OutputFormat,

    /// JSON5 file holding the transform configuration
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Skip the additional dark-mode render of each diagram
    #[arg(long)]
    no_dark: bool,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Markdown,
    Html,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let mut options = load_options(cli.config.as_deref())?;
    if cli.no_dark {
        options.render_dark = Some(DarkSetting::Enabled(false));
    }

    let source = fs::read_to_string(&cli.file)
        .with_context(|| format!("failed to read {}", cli.file.display()))?;

    let arena = Arena::new();
    let parse_options = markdown_options();
    let root = parse_document(&arena, &source, &parse_options);

    // The transform future borrows the arena tree and is not Send, so it is
    // driven to completion on this thread.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build async runtime")?;
    runtime
        .block_on(transform(root, &arena, &options))
        .context("mermaid transform failed")?;

    let mut rendered = Vec::new();
    match cli.format {
        OutputFormat::Markdown => format_commonmark(root, &parse_options, &mut rendered)?,
        OutputFormat::Html => format_html(root, &parse_options, &mut rendered)?,
    }

    match &cli.output {
        Some(path) => fs::write(path, &rendered)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => std::io::stdout().write_all(&rendered)?,
    }

    Ok(())
}

fn load_options(path: Option<&std::path::Path>) -> Result<Options> {
    let Some(path) = path else {
        return Ok(Options::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    json5::from_str(&text).with_context(|| format!("failed to parse config {}", path.display()))
}

fn markdown_options() -> comrak::Options {
    let mut options = comrak::Options::default();

    // Enable GFM extensions
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.extension.footnotes = true;

    // Spliced diagrams are raw HTML; keep them in the output.
    options.render.unsafe_ = true;

    options
}
