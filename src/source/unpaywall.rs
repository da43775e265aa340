//! Unpaywall single-DOI lookups for open-access PDF links.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::http::{ConcurrencyGate, HttpError, RetryingHttpClient, RobotsCache};
use crate::paper::{Paper, merge};

use super::http_client::SourceHttp;
use super::utils::non_blank;
use super::{PaperEnricher, SourceError};

const SOURCE_NAME: &str = "unpaywall";

/// Default Unpaywall API base URL.
const DEFAULT_BASE_URL: &str = "https://api.unpaywall.org";

#[derive(Debug, Deserialize)]
struct UnpaywallResponse {
    doi: Option<String>,
    title: Option<String>,
    journal_name: Option<String>,
    year: Option<i64>,
    best_oa_location: Option<UnpaywallLocation>,
}

#[derive(Debug, Deserialize)]
struct UnpaywallLocation {
    url_for_pdf: Option<String>,
}

/// Parses an Unpaywall DOI record. Missing `doi` yields `None`.
#[must_use]
pub(crate) fn parse_record(data: &Value) -> Option<Paper> {
    let record = UnpaywallResponse::deserialize(data).ok()?;
    let doi = non_blank(record.doi.as_deref())?;

    Some(Paper {
        title: record.title.unwrap_or_default(),
        authors: Vec::new(),
        year: record
            .year
            .and_then(|y| i32::try_from(y).ok())
            .unwrap_or(0),
        venue: record.journal_name.unwrap_or_default(),
        doi: Some(doi),
        abstract_text: None,
        pdf_url: record
            .best_oa_location
            .and_then(|loc| non_blank(loc.url_for_pdf.as_deref())),
    })
}

/// Looks up open-access locations on Unpaywall, one DOI per request.
#[derive(Debug, Clone)]
pub struct UnpaywallSource {
    http: SourceHttp,
    base_url: String,
    email: String,
}

impl UnpaywallSource {
    /// Creates an Unpaywall source. Unpaywall requires a contact `email`
    /// on every request.
    #[must_use]
    pub fn new(client: RetryingHttpClient, email: impl Into<String>) -> Self {
        Self {
            http: SourceHttp::new(SOURCE_NAME, client),
            base_url: DEFAULT_BASE_URL.to_string(),
            email: email.into(),
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

    /// `{base}/v2/{doi}?email=..`, each DOI segment percent-encoded so that
    /// `#`, `?` and `%` stay inside the path.
    fn record_url(&self, doi: &str) -> Result<String, SourceError> {
        let invalid = || SourceError::http(SOURCE_NAME, HttpError::invalid_url(&self.base_url));
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .pop_if_empty()
            .push("v2")
            .extend(doi.trim().split('/'));
        url.query_pairs_mut().append_pair("email", &self.email);
        Ok(url.into())
    }

    /// Fetches the Unpaywall record for `doi`.
    ///
    /// Returns `None` when the DOI is unknown (404) or on any other failure;
    /// failures other than 404 are logged at warn.
    #[instrument(skip(self, gate), fields(source = SOURCE_NAME))]
    pub async fn fetch_by_doi(&self, doi: &str, gate: &ConcurrencyGate) -> Option<Paper> {
        let url = match self.record_url(doi) {
            Ok(url) => url,
            Err(error) => {
                warn!(doi, error = %error, "Unpaywall URL could not be built");
                return None;
            }
        };

        let response = match self.http.get(&url, &HeaderMap::new(), gate).await {
            Ok(response) => response,
            Err(error) if error.is_not_found() => {
                debug!("No paper found for DOI {doi} on Unpaywall (404).");
                return None;
            }
            Err(error) => {
                warn!(doi, error = %error, "Unpaywall lookup failed");
                return None;
            }
        };

        match self.http.json::<Value>(&response) {
            Ok(data) => parse_record(&data),
            Err(error) => {
                warn!(doi, error = %error, "Unpaywall response could not be decoded");
                None
            }
        }
    }
}

#[async_trait]
impl PaperEnricher for UnpaywallSource {
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
        let lookups: Vec<(usize, String)> = papers
            .iter()
            .enumerate()
            .filter_map(|(index, paper)| paper.doi().map(|doi| (index, doi.to_string())))
            .collect();

        let results = join_all(
            lookups
                .iter()
                .map(|(_, doi)| self.fetch_by_doi(doi, gate)),
        )
        .await;

        let mut enriched = 0;
        for ((index, _), found) in lookups.iter().zip(results) {
            if let Some(found) = found {
                merge(&mut papers[*index], &found, overwrite);
                enriched += 1;
            }
        }

        info!(enriched, "enriched papers from Unpaywall");
        enriched
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_record_full() {
        let data = json!({
            "doi": "10.1145/test",
            "title": "Test Paper",
            "journal_name": "Test Journal",
            "year": 2023,
            "best_oa_location": {"url_for_pdf": "https://example.com/paper.pdf"}
        });

        let paper = parse_record(&data).unwrap();
        assert_eq!(paper.doi.as_deref(), Some("10.1145/test"));
        assert_eq!(paper.title, "Test Paper");
        assert_eq!(paper.venue, "Test Journal");
        assert_eq!(paper.year, 2023);
        assert_eq!(paper.pdf_url.as_deref(), Some("https://example.com/paper.pdf"));
    }

    #[test]
    fn test_parse_record_without_oa_location() {
        let data = json!({"doi": "10.1145/test", "best_oa_location": null});
        let paper = parse_record(&data).unwrap();
        assert!(paper.pdf_url.is_none());
        assert_eq!(paper.venue, "");
    }

    #[test]
    fn test_record_url_keeps_doi_slashes_and_encodes_the_rest() {
        let source = UnpaywallSource::new(
            RetryingHttpClient::new(reqwest::Client::new()),
            "crawler+test@example.org",
        )
        .with_base_url("https://api.unpaywall.org/");

        let url = Url::parse(&source.record_url(" 10.1000/a#b?c ").unwrap()).unwrap();
        assert_eq!(url.path(), "/v2/10.1000/a%23b%3Fc");
        assert!(url.fragment().is_none());
        assert_eq!(
            url.query_pairs().collect::<Vec<_>>(),
            vec![("email".into(), "crawler+test@example.org".into())]
        );
    }

    #[test]
    fn test_record_url_plain_doi() {
        let source = UnpaywallSource::new(
            RetryingHttpClient::new(reqwest::Client::new()),
            "me@example.org",
        );
        assert_eq!(
            source.record_url("10.1145/3640457.3688104").unwrap(),
            "https://api.unpaywall.org/v2/10.1145/3640457.3688104?email=me%40example.org"
        );
    }

    #[test]
    fn test_parse_record_missing_doi() {
        assert!(parse_record(&json!({"title": "No DOI"})).is_none());
        assert!(parse_record(&json!([])).is_none());
    }
}
