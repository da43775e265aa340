//! Bibliographic source adapters.
//!
//! - [`DblpSource`] - primary index; lists every paper of a conference year
//! - [`SemanticScholarSource`] - batch lookup by DOI
//! - [`UnpaywallSource`] - single lookup by DOI, open-access PDF links
//! - [`ArxivSource`] - fallback search by DOI, then by title
//!
//! The primary index implements [`PaperRetriever`]; the others implement
//! [`PaperEnricher`] and fold what they find into existing records with
//! [`crate::paper::merge`]. Every request passes through the shared
//! [`ConcurrencyGate`].

mod arxiv;
mod dblp;
mod error;
mod http_client;
mod semantic_scholar;
mod unpaywall;
mod utils;

pub use arxiv::{ArxivSource, parse_feed};
pub use dblp::{DblpSource, MAX_PAGE_SIZE, parse_authors, parse_papers};
pub use error::SourceError;
pub use semantic_scholar::{BATCH_CHUNK_SIZE, SemanticScholarSource, parse_single_paper};
pub use unpaywall::UnpaywallSource;

use async_trait::async_trait;

use crate::http::ConcurrencyGate;
use crate::paper::Paper;

/// A source that produces the initial list of papers.
#[async_trait]
pub trait PaperRetriever: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Fetches every paper of `conf` published in `year`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the list cannot be retrieved.
    async fn fetch_papers(
        &self,
        conf: &str,
        year: i32,
        page_size: usize,
        gate: &ConcurrencyGate,
    ) -> Result<Vec<Paper>, SourceError>;
}

/// A source that fills in fields of existing papers.
///
/// Implementations never fail the batch: per-record errors are logged and
/// the record is left as it was.
#[async_trait]
pub trait PaperEnricher: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Enriches `papers` in place and returns how many records received data.
    async fn enrich_papers(
        &self,
        papers: &mut [Paper],
        gate: &ConcurrencyGate,
        overwrite: bool,
    ) -> usize;
}
