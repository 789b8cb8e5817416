use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use paper_fetcher::config::{load_config, FetchConfig};
use paper_fetcher::run_with_config;
use paper_fetcher::sources::Platform;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Paper Fetcher - Fetch papers from academic sources into a deduplicated JSON store
#[derive(Parser, Debug)]
#[command(name = "paper-fetcher")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fetch papers from PubMed, arXiv, CrossRef or Google Scholar into a deduplicated JSON store", long_about = None)]
#[command(after_help = "Exit codes:\n  0  new papers were saved\n  3  the run succeeded but found nothing new\n  1  error")]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short)]
    quiet: bool,

    /// Log line format (logs go to stderr)
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Configuration file path (default: ./paper-fetcher.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Source to fetch from
    #[arg(long, short, value_enum)]
    platform: Option<Platform>,

    /// Keyword to search for
    #[arg(long, short)]
    keyword: Option<String>,

    /// Author filter
    #[arg(long, short)]
    author: Option<String>,

    /// Journal filter (PubMed only)
    #[arg(long, short)]
    journal: Option<String>,

    /// Publication year filter
    #[arg(long, short)]
    year: Option<String>,

    /// Maximum number of results
    #[arg(long, short)]
    max_results: Option<usize>,

    /// Store file name inside the results directory
    #[arg(long, short)]
    output_file_name: Option<String>,

    /// Directory holding the store files
    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// Print the fetched batch as JSON on stdout
    #[arg(long)]
    output_json: bool,

    /// Re-read the store before every save instead of keeping it in memory
    #[arg(long)]
    no_cache: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

impl Cli {
    /// Layer CLI flags over the file/environment configuration.
    fn apply(&self, config: &mut FetchConfig) {
        if let Some(platform) = self.platform {
            config.platform = platform;
        }
        if let Some(keyword) = &self.keyword {
            config.keyword = keyword.clone();
        }
        if let Some(author) = &self.author {
            config.author = author.clone();
        }
        if let Some(journal) = &self.journal {
            config.journal = journal.clone();
        }
        if let Some(year) = &self.year {
            config.year = year.clone();
        }
        if let Some(max_results) = self.max_results {
            config.max_results = max_results;
        }
        if let Some(name) = &self.output_file_name {
            config.output_file_name = Some(name.clone());
        }
        if let Some(dir) = &self.results_dir {
            config.results_dir = dir.clone();
        }
        if self.output_json {
            config.output_json = true;
        }
        if self.no_cache {
            config.cache_enabled = false;
        }
    }

    fn load_config(&self) -> Result<FetchConfig> {
        let mut config = load_config(self.config.as_deref()).with_context(|| match &self.config {
            Some(path) => format!("Failed to load config from {}", path.display()),
            None => "Failed to load configuration".to_string(),
        })?;
        self.apply(&mut config);
        Ok(config)
    }
}

fn init_tracing(cli: &Cli) {
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter = if cli.quiet { "error" } else { log_level };
    let json = cli.log_format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("paper_fetcher={}", env_filter)),
        ))
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let config = cli.load_config()?;
    tracing::debug!("Using store {}", config.store_path().display());

    let outcome = run_with_config(&config).await;
    if let Some(json) = outcome.json() {
        println!("{}", json);
    }

    std::process::exit(outcome.exit_code());
}
