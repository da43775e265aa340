//! CLI entry point for the paper crawler.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use paper_crawler::http::{DEFAULT_CONCURRENCY, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_READ_TIMEOUT_SECS};
use paper_crawler::source::MAX_PAGE_SIZE;
use paper_crawler::{
    ArxivSource, ConcurrencyGate, DblpSource, FetchPipeline, HttpTimeouts, PaperEnricher,
    RetryingHttpClient, RobotsCache, SemanticScholarSource, UnpaywallSource, build_http_client,
};
use tracing::{debug, info, warn};

mod app_config;
mod cli;

use app_config::{FileConfig, load_file_config};
use cli::Args;

/// Effective settings after merging CLI flags over the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Settings {
    concurrency: usize,
    page_size: usize,
    check_robots: bool,
    timeouts: HttpTimeouts,
    unpaywall_email: Option<String>,
    semantic_scholar_api_key: Option<String>,
    log_level: &'static str,
}

impl Settings {
    /// Command-line values win; config fills the gaps; built-in defaults last.
    fn resolve(args: &Args, file: Option<&FileConfig>) -> Self {
        let file = file.cloned().unwrap_or_default();

        let log_level = if args.quiet {
            "error"
        } else {
            match args.verbose {
                0 => file.verbosity.map_or("info", |v| v.log_level()),
                1 => "debug",
                _ => "trace",
            }
        };

        Self {
            concurrency: args
                .concurrency
                .or(file.concurrency)
                .map_or(DEFAULT_CONCURRENCY, usize::from),
            page_size: args
                .page_size
                .or(file.page_size)
                .map_or(MAX_PAGE_SIZE, usize::from),
            check_robots: !args.no_robots && file.check_robots.unwrap_or(true),
            timeouts: HttpTimeouts {
                connect_timeout_secs: args
                    .connect_timeout
                    .or(file.connect_timeout_secs)
                    .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
                read_timeout_secs: args
                    .read_timeout
                    .or(file.read_timeout_secs)
                    .unwrap_or(DEFAULT_READ_TIMEOUT_SECS),
            },
            unpaywall_email: args.unpaywall_email.clone().or(file.unpaywall_email),
            semantic_scholar_api_key: args
                .semantic_scholar_api_key
                .clone()
                .or(file.semantic_scholar_api_key),
            log_level,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    let file_config = load_file_config(args.config.as_deref())?;
    let settings = Settings::resolve(&args, file_config.as_ref());

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config verbosity > info
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(settings.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(
        concurrency = settings.concurrency,
        page_size = settings.page_size,
        check_robots = settings.check_robots,
        connect_timeout_secs = settings.timeouts.connect_timeout_secs,
        read_timeout_secs = settings.timeouts.read_timeout_secs,
        has_api_key = settings.semantic_scholar_api_key.is_some(),
        "configuration resolved"
    );
    info!(conf = %args.conf, year = args.year, "paper crawler starting");

    let client = RetryingHttpClient::new(
        build_http_client(settings.timeouts).context("failed to build HTTP client")?,
    );
    let gate = ConcurrencyGate::new(settings.concurrency)?;
    let robots = settings
        .check_robots
        .then(|| Arc::new(RobotsCache::new(client.clone())));

    let pipeline = build_pipeline(&client, robots.as_ref(), &settings);
    let papers = pipeline
        .run(&args.conf, args.year, settings.page_size, &gate)
        .await?;

    info!(count = papers.len(), "crawl complete");

    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &papers)?;
    writeln!(stdout)?;
    Ok(())
}

fn build_pipeline(
    client: &RetryingHttpClient,
    robots: Option<&Arc<RobotsCache>>,
    settings: &Settings,
) -> FetchPipeline {
    let mut dblp = DblpSource::new(client.clone());
    let mut semantic_scholar = SemanticScholarSource::new(client.clone());
    let mut arxiv = ArxivSource::new(client.clone());
    if let Some(robots) = robots {
        dblp = dblp.with_robots(Arc::clone(robots));
        semantic_scholar = semantic_scholar.with_robots(Arc::clone(robots));
        arxiv = arxiv.with_robots(Arc::clone(robots));
    }
    if let Some(api_key) = &settings.semantic_scholar_api_key {
        semantic_scholar = semantic_scholar.with_api_key(api_key.clone());
    }

    let mut enrichers: Vec<Box<dyn PaperEnricher>> = vec![Box::new(semantic_scholar)];
    match &settings.unpaywall_email {
        Some(email) => {
            let mut unpaywall = UnpaywallSource::new(client.clone(), email.clone());
            if let Some(robots) = robots {
                unpaywall = unpaywall.with_robots(Arc::clone(robots));
            }
            enrichers.push(Box::new(unpaywall));
        }
        None => warn!("no Unpaywall contact email configured; skipping Unpaywall enrichment"),
    }
    enrichers.push(Box::new(arxiv));

    FetchPipeline::new(Box::new(dblp), enrichers)
}
