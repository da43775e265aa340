//! Paper Crawler Core Library
//!
//! Collects metadata for every paper of a conference year and enriches it
//! from several bibliographic services.
//!
//! # Architecture
//!
//! - [`http`] - Retrying HTTP client, concurrency gate, robots.txt cache
//! - [`paper`] - Paper record and field-level merge rules
//! - [`source`] - DBLP, Semantic Scholar, Unpaywall and arXiv adapters
//! - [`pipeline`] - Fetch, filter, enrich orchestration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod http;
pub mod paper;
pub mod pipeline;
pub mod source;

mod user_agent;

// Re-export commonly used types
pub use http::{
    ConcurrencyGate, GateError, HttpError, HttpResponse, HttpTimeouts, RetryPolicy,
    RetryingHttpClient, RobotsCache, build_http_client,
};
pub use paper::{Paper, merge};
pub use pipeline::{FetchPipeline, PipelineError, PipelineStage};
pub use source::{
    ArxivSource, DblpSource, PaperEnricher, PaperRetriever, SemanticScholarSource, SourceError,
    UnpaywallSource,
};
