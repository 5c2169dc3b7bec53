//! Delver CLI - Command-line interface for deep research
//!
//! Wires the concrete SearxNG and siumai capabilities into the research
//! engine and drives a single research run from the terminal.

use clap::Parser;
use delver_core::{init_logging, performance, DelverConfig, LoggingConfig, OutputMode};
use delver_research::{DeepResearcher, SearxngProvider, SiumaiGenerator};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "delver")]
#[command(about = "Recursive deep research over web search")]
#[command(version = "0.1.0")]
struct Cli {
    /// Research topic or question
    topic: String,

    /// Number of search queries per level (halves at each recursion)
    #[arg(short, long)]
    breadth: Option<usize>,

    /// Recursion depth below the root level
    #[arg(short, long)]
    depth: Option<usize>,

    /// Maximum concurrent external calls across the whole tree
    #[arg(long)]
    concurrency: Option<usize>,

    /// Output mode: report or answer
    #[arg(short, long, default_value = "report")]
    mode: OutputMode,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the result to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Override the SearxNG base URL
    #[arg(long)]
    search_url: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logging_config = LoggingConfig {
        level: if cli.verbose {
            "debug".to_string()
        } else {
            "info".to_string()
        },
        ..LoggingConfig::default()
    };
    init_logging(&logging_config).map_err(|e| anyhow::anyhow!(e))?;

    let mut config = match &cli.config {
        Some(path) => DelverConfig::from_file(path)?,
        None => DelverConfig::default(),
    };

    if let Some(url) = &cli.search_url {
        config.search.base_url = url.clone();
    }
    if let Some(concurrency) = cli.concurrency {
        config.research.concurrency = concurrency;
    }
    config.validate()?;

    let provider = Arc::new(SearxngProvider::new(
        &config.search.base_url,
        config.search.timeout_ms,
    )?);
    let generator = Arc::new(SiumaiGenerator::new(config.llm.clone()).await?);

    let engine = DeepResearcher::new(provider, generator, config)?;

    let outcome = performance::measure_async(
        "deep_research",
        engine.run(&cli.topic, cli.breadth, cli.depth, cli.mode),
    )
    .await?;

    info!(
        learnings = outcome.learnings.len(),
        sources = outcome.visited_urls.len(),
        "Research complete"
    );

    match &cli.output {
        Some(path) => {
            std::fs::write(path, &outcome.result)?;
            println!("Result written to {}", path.display());
        }
        None => {
            println!("{}", outcome.result);
        }
    }

    Ok(())
}
