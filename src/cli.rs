//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Crawl a conference year's papers and enrich their metadata.
///
/// Lists papers from DBLP, then fills in abstracts and PDF links from
/// Semantic Scholar, Unpaywall and arXiv. Prints the result as JSON.
#[derive(Parser, Debug, Clone)]
#[command(name = "paper-crawler")]
#[command(author, version, about)]
pub struct Args {
    /// DBLP conference key (e.g. recsys, kdd, sigir)
    #[arg(long, default_value = "recsys")]
    pub conf: String,

    /// Publication year
    #[arg(long, value_parser = clap::value_parser!(i32).range(1900..=2100))]
    pub year: i32,

    /// Maximum concurrent requests (1-100)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// DBLP page size (1-1000)
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=1000))]
    pub page_size: Option<u16>,

    /// Contact email sent to Unpaywall
    #[arg(long, env = "UNPAYWALL_EMAIL")]
    pub unpaywall_email: Option<String>,

    /// Semantic Scholar API key
    #[arg(long, env = "SEMANTIC_SCHOLAR_API_KEY", hide_env_values = true)]
    pub semantic_scholar_api_key: Option<String>,

    /// Skip robots.txt checks
    #[arg(long)]
    pub no_robots: bool,

    /// HTTP connect timeout in seconds (1-3600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout: Option<u64>,

    /// HTTP request timeout in seconds (1-3600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout: Option<u64>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Config file path (defaults to $XDG_CONFIG_HOME/paper-crawler/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}
