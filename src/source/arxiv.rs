//! arXiv fallback search.
//!
//! Each record is looked up by `doi:"<doi>"` first and, when that finds
//! nothing, by `ti:"<normalized title>"`. Only the first Atom entry is used.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::header::HeaderMap;
use roxmltree::{Document, Node};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::http::{ConcurrencyGate, HttpError, RetryingHttpClient, RobotsCache};
use crate::paper::{Paper, merge};

use super::http_client::SourceHttp;
use super::utils::{collapse_whitespace, non_blank, normalize_title};
use super::{PaperEnricher, SourceError};

const SOURCE_NAME: &str = "arxiv";

/// Default arXiv export API base URL.
const DEFAULT_BASE_URL: &str = "https://export.arxiv.org";

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
const ARXIV_NS: &str = "http://arxiv.org/schemas/atom";

/// Parses the first `<entry>` of an arXiv Atom feed.
///
/// Missing title becomes `""`; missing summary or PDF link stay `None`.
/// A feed without entries, or XML that does not parse, yields `None`.
#[must_use]
pub fn parse_feed(xml: &str) -> Option<Paper> {
    let doc = Document::parse(xml)
        .inspect_err(|e| debug!(error = %e, "arXiv response is not valid XML"))
        .ok()?;
    let entry = doc
        .descendants()
        .find(|n| n.has_tag_name((ATOM_NS, "entry")))?;

    let mut paper = Paper::default();
    for child in entry.children().filter(Node::is_element) {
        let tag = child.tag_name();
        match (tag.namespace(), tag.name()) {
            (Some(ATOM_NS), "title") => paper.title = element_text(child).unwrap_or_default(),
            (Some(ATOM_NS), "summary") => paper.abstract_text = element_text(child),
            (Some(ATOM_NS), "published") => {
                paper.year = child
                    .text()
                    .and_then(|published| published.trim().split('-').next())
                    .and_then(|year| year.parse().ok())
                    .unwrap_or(0);
            }
            (Some(ATOM_NS), "author") => {
                if let Some(name) = child
                    .children()
                    .find(|n| n.has_tag_name((ATOM_NS, "name")))
                    .and_then(element_text)
                {
                    paper.authors.push(name);
                }
            }
            (Some(ATOM_NS), "link") => {
                let is_pdf = child.attribute("rel") == Some("related")
                    && child.attribute("type") == Some("application/pdf");
                if is_pdf && paper.pdf_url.is_none() {
                    paper.pdf_url = non_blank(child.attribute("href"));
                }
            }
            (Some(ARXIV_NS), "doi") => paper.doi = element_text(child),
            (Some(ARXIV_NS), "journal_ref") if paper.venue.is_empty() => {
                paper.venue = element_text(child).unwrap_or_default();
            }
            _ => {}
        }
    }

    Some(paper)
}

fn element_text(node: Node<'_, '_>) -> Option<String> {
    node.text()
        .map(collapse_whitespace)
        .filter(|text| !text.is_empty())
}

/// Finds abstracts and PDF links on arXiv for papers the other sources missed.
#[derive(Debug, Clone)]
pub struct ArxivSource {
    http: SourceHttp,
    base_url: String,
}

impl ArxivSource {
    /// Creates an arXiv source using the public export endpoint.
    #[must_use]
    pub fn new(client: RetryingHttpClient) -> Self {
        Self {
            http: SourceHttp::new(SOURCE_NAME, client),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Points the source at a different base URL (for testing with wiremock).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Checks robots.txt before each request.
    #[must_use]
    pub fn with_robots(mut self, robots: Arc<RobotsCache>) -> Self {
        self.http.set_robots(robots);
        self
    }

    fn query_url(&self, search_query: &str) -> Result<String, SourceError> {
        let endpoint = format!("{}/api/query", self.base_url.trim_end_matches('/'));
        let mut url = Url::parse(&endpoint)
            .map_err(|_| SourceError::http(SOURCE_NAME, HttpError::invalid_url(&endpoint)))?;
        url.query_pairs_mut()
            .append_pair("search_query", search_query)
            .append_pair("max_results", "1");
        Ok(url.into())
    }

    async fn search(
        &self,
        search_query: &str,
        gate: &ConcurrencyGate,
    ) -> Result<Option<Paper>, SourceError> {
        let url = self.query_url(search_query)?;
        let response = self.http.get(&url, &HeaderMap::new(), gate).await?;
        Ok(parse_feed(response.body()))
    }

    /// Looks `paper` up by DOI, then by title.
    ///
    /// # Errors
    ///
    /// Returns the first [`SourceError`] encountered.
    pub async fn lookup(
        &self,
        paper: &Paper,
        gate: &ConcurrencyGate,
    ) -> Result<Option<Paper>, SourceError> {
        if let Some(doi) = paper.doi()
            && let Some(found) = self.search(&format!("doi:\"{doi}\""), gate).await?
        {
            return Ok(Some(found));
        }

        let title = normalize_title(&paper.title);
        if title.is_empty() {
            return Ok(None);
        }
        debug!(title = %title, "no arXiv match by DOI, searching by title");
        self.search(&format!("ti:\"{title}\""), gate).await
    }
}

#[async_trait]
impl PaperEnricher for ArxivSource {
    fn name(&self) -> &'static str {
        self.http.source_name()
    }

    #[instrument(skip_all, fields(source = SOURCE_NAME, papers = papers.len(), overwrite))]
    async fn enrich_papers(
        &self,
        papers: &mut [Paper],
        gate: &ConcurrencyGate,
        overwrite: bool,
    ) -> usize {
        let results = join_all(papers.iter().map(|paper| self.lookup(paper, gate))).await;

        let mut enriched = 0;
        for (paper, result) in papers.iter_mut().zip(results) {
            match result {
                Ok(Some(found)) => {
                    merge(paper, &found, overwrite);
                    enriched += 1;
                }
                Ok(None) => debug!(doi = ?paper.doi, "no arXiv match"),
                Err(error) => warn!(doi = ?paper.doi, error = %error, "arXiv lookup failed"),
            }
        }

        info!(enriched, "enriched papers from arXiv");
        enriched
    }
}
