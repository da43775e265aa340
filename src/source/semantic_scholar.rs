//! Semantic Scholar batch enrichment.
//!
//! DOIs are POSTed to the Graph API batch endpoint in chunks; the response
//! is a positional array with `null` for ids Semantic Scholar does not know.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::http::{ConcurrencyGate, RetryingHttpClient, RobotsCache};
use crate::paper::{Paper, merge};

use super::http_client::SourceHttp;
use super::utils::non_blank;
use super::{PaperEnricher, SourceError};

const SOURCE_NAME: &str = "semantic_scholar";

/// Default Semantic Scholar API base URL.
const DEFAULT_BASE_URL: &str = "https://api.semanticscholar.org";

/// Fields requested for every paper.
const FIELDS: &str = "externalIds,abstract,openAccessPdf,title,year,venue,authors";

/// Largest id list the batch endpoint accepts.
pub const BATCH_CHUNK_SIZE: usize = 500;

// ==================== Response Types ====================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    external_ids: Option<S2ExternalIds>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    open_access_pdf: Option<S2OpenAccessPdf>,
    title: Option<String>,
    year: Option<i64>,
    venue: Option<String>,
    authors: Option<Vec<S2Author>>,
}

#[derive(Debug, Deserialize)]
struct S2ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2OpenAccessPdf {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2Author {
    name: Option<String>,
}

/// Parses one element of a batch response.
///
/// Returns `None` for `null`, malformed items, or items without
/// `externalIds.DOI` (they cannot be correlated).
#[must_use]
pub fn parse_single_paper(item: &Value) -> Option<Paper> {
    if item.is_null() {
        return None;
    }
    let paper = S2Paper::deserialize(item)
        .inspect_err(|e| debug!(error = %e, "skipping malformed Semantic Scholar item"))
        .ok()?;
    let doi = non_blank(paper.external_ids?.doi.as_deref())?;

    Some(Paper {
        title: paper.title.unwrap_or_default(),
        authors: paper
            .authors
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| non_blank(a.name.as_deref()))
            .collect(),
        year: paper
            .year
            .and_then(|y| i32::try_from(y).ok())
            .unwrap_or(0),
        venue: paper.venue.unwrap_or_default(),
        doi: Some(doi),
        abstract_text: non_blank(paper.abstract_text.as_deref()),
        pdf_url: paper
            .open_access_pdf
            .and_then(|pdf| non_blank(pdf.url.as_deref())),
    })
}

// ==================== SemanticScholarSource ====================

/// Enriches papers with abstracts and open-access PDFs from Semantic Scholar.
#[derive(Clone)]
pub struct SemanticScholarSource {
    http: SourceHttp,
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for SemanticScholarSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticScholarSource")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl SemanticScholarSource {
    /// Creates a Semantic Scholar source using the public endpoint.
    #[must_use]
    pub fn new(client: RetryingHttpClient) -> Self {
        Self {
            http: SourceHttp::new(SOURCE_NAME, client),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
        }
    }

    /// Points the source at a different base URL (for testing with wiremock).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sends `x-api-key` with every request.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let api_key: String = api_key.into();
        self.api_key = non_blank(Some(api_key.as_str()));
        self
    }

    /// Checks robots.txt before each request.
    #[must_use]
    pub fn with_robots(mut self, robots: Arc<RobotsCache>) -> Self {
        self.http.set_robots(robots);
        self
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(key) = &self.api_key {
            match HeaderValue::from_str(key) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert("x-api-key", value);
                }
                Err(_) => {
                    warn!("Semantic Scholar API key is not a valid header value, sending without it");
                }
            }
        }
        headers
    }

    fn batch_url(&self) -> String {
        format!(
            "{}/graph/v1/paper/batch?fields={FIELDS}",
            self.base_url.trim_end_matches('/')
        )
    }

    /// Looks up every DOI-bearing paper, chunked and gated.
    ///
    /// The result is sparse: unknown ids and failed chunks contribute
    /// nothing.
    #[instrument(skip_all, fields(source = SOURCE_NAME, papers = papers.len()))]
    pub async fn fetch_papers_batch(
        &self,
        papers: &[Paper],
        gate: &ConcurrencyGate,
    ) -> Vec<Paper> {
        let ids: Vec<String> = papers
            .iter()
            .filter_map(Paper::doi)
            .map(|doi| format!("DOI:{doi}"))
            .collect();
        if ids.is_empty() {
            return Vec::new();
        }

        let chunks = ids.chunks(BATCH_CHUNK_SIZE);
        let results = join_all(chunks.map(|chunk| self.fetch_chunk(chunk, gate))).await;

        results
            .into_iter()
            .enumerate()
            .flat_map(|(index, result)| match result {
                Ok(found) => found,
                Err(error) => {
                    warn!(chunk = index, error = %error, "Semantic Scholar batch chunk failed");
                    Vec::new()
                }
            })
            .collect()
    }

    async fn fetch_chunk(
        &self,
        ids: &[String],
        gate: &ConcurrencyGate,
    ) -> Result<Vec<Paper>, SourceError> {
        let body = json!({ "ids": ids });
        let response = self
            .http
            .post_json(&self.batch_url(), &body, &self.headers(), gate)
            .await?;
        let data: Value = self.http.json(&response)?;

        let Value::Array(items) = data else {
            return Err(SourceError::decode(
                SOURCE_NAME,
                "batch response is not a JSON array",
            ));
        };
        let found: Vec<Paper> = items.iter().filter_map(parse_single_paper).collect();
        debug!(requested = ids.len(), found = found.len(), "Semantic Scholar chunk received");
        Ok(found)
    }
}

#[async_trait]
impl PaperEnricher for SemanticScholarSource {
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
        let fetched = self.fetch_papers_batch(papers, gate).await;
        let by_doi: HashMap<String, Paper> = fetched
            .into_iter()
            .filter_map(|paper| paper.doi_key().map(|key| (key, paper)))
            .collect();

        let mut enriched = 0;
        for paper in papers.iter_mut() {
            if let Some(found) = paper.doi_key().and_then(|key| by_doi.get(&key)) {
                merge(paper, found, overwrite);
                enriched += 1;
            }
        }

        info!(enriched, "enriched papers from Semantic Scholar");
        enriched
    }
}
