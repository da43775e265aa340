//! DBLP primary index - lists all papers of a conference year.
//!
//! Queries the table-of-contents search
//! `search/publ/api?q=toc:db/conf/{conf}/{conf}{year}.bht:` page by page
//! until the reported total has been collected.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument};
use url::Url;

use crate::http::{ConcurrencyGate, HttpError, RetryingHttpClient, RobotsCache};
use crate::paper::Paper;

use super::http_client::SourceHttp;
use super::utils::non_blank;
use super::{PaperRetriever, SourceError};

const SOURCE_NAME: &str = "dblp";

/// Default DBLP base URL.
const DEFAULT_BASE_URL: &str = "https://dblp.org";

/// Largest page DBLP serves per request.
pub const MAX_PAGE_SIZE: usize = 1000;

// ==================== DBLP Response Types ====================

/// `info` object of one search hit.
#[derive(Debug, Deserialize)]
struct DblpInfo {
    title: Option<String>,
    /// Kept raw; an unexpected shape yields no authors instead of dropping the hit.
    authors: Option<Value>,
    year: Option<NumberOrText>,
    venue: Option<OneOrMany<String>>,
    doi: Option<String>,
}

/// `authors` wrapper; `author` is a single object when there is one author.
#[derive(Debug, Default, Deserialize)]
struct DblpAuthors {
    author: Option<OneOrMany<DblpAuthor>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DblpAuthor {
    Named { text: String },
    Bare(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::Many(items) => items,
            Self::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(i64),
    Text(String),
}

impl NumberOrText {
    fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

// ==================== Parsing ====================

/// Parses every hit of a DBLP search response.
///
/// Hits without a title are skipped; a response without hits (or not shaped
/// like a DBLP response at all) yields an empty list.
#[must_use]
pub fn parse_papers(data: &Value) -> Vec<Paper> {
    let Some(hits) = data.pointer("/result/hits/hit") else {
        return Vec::new();
    };
    let hits: Vec<&Value> = match hits {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![hits],
        _ => return Vec::new(),
    };

    hits.into_iter()
        .filter_map(|hit| hit.get("info"))
        .filter_map(parse_info)
        .collect()
}

fn parse_info(info: &Value) -> Option<Paper> {
    let info = DblpInfo::deserialize(info)
        .inspect_err(|e| debug!(error = %e, "skipping malformed DBLP hit"))
        .ok()?;

    let title = non_blank(info.title.as_deref())?;
    let title = title.strip_suffix('.').unwrap_or(&title).to_string();

    let year = info
        .year
        .as_ref()
        .and_then(NumberOrText::as_i64)
        .and_then(|y| i32::try_from(y).ok())
        .unwrap_or(0);

    let venue = info
        .venue
        .and_then(|v| v.into_vec().into_iter().next())
        .unwrap_or_default();

    Some(Paper {
        title,
        authors: parse_authors(info.authors.as_ref()),
        year,
        venue,
        doi: non_blank(info.doi.as_deref()),
        abstract_text: None,
        pdf_url: None,
    })
}

/// Normalizes a DBLP `authors` value to an ordered list of names.
///
/// Accepts `{"author": [...]}`, `{"author": {...}}` and bare-string authors;
/// any other shape yields an empty list.
#[must_use]
pub fn parse_authors(authors: Option<&Value>) -> Vec<String> {
    authors
        .and_then(|value| DblpAuthors::deserialize(value).ok())
        .map(authors_to_names)
        .unwrap_or_default()
}

fn authors_to_names(authors: DblpAuthors) -> Vec<String> {
    authors
        .author
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|author| match author {
            DblpAuthor::Named { text } | DblpAuthor::Bare(text) => non_blank(Some(text.as_str())),
        })
        .collect()
}

/// `(@total, @sent)` of a search response; `@sent` falls back to the hit count.
fn hit_counts(data: &Value) -> (usize, usize) {
    let hits = data.pointer("/result/hits");
    let count = |key: &str| {
        hits.and_then(|h| h.get(key))
            .and_then(|v| NumberOrText::deserialize(v).ok())
            .and_then(|n| n.as_i64())
            .and_then(|n| usize::try_from(n).ok())
    };

    let sent = count("@sent").unwrap_or_else(|| {
        hits.and_then(|h| h.get("hit"))
            .map_or(0, |hit| hit.as_array().map_or(1, Vec::len))
    });
    (count("@total").unwrap_or(0), sent)
}

// ==================== DblpSource ====================

/// Retrieves a conference's paper list from DBLP.
#[derive(Debug, Clone)]
pub struct DblpSource {
    http: SourceHttp,
    base_url: String,
}

impl DblpSource {
    /// Creates a DBLP source using the public endpoint.
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

    fn page_url(
        &self,
        conf: &str,
        year: i32,
        page_size: usize,
        offset: usize,
    ) -> Result<String, SourceError> {
        let endpoint = format!("{}/search/publ/api", self.base_url.trim_end_matches('/'));
        let mut url = Url::parse(&endpoint)
            .map_err(|_| SourceError::http(SOURCE_NAME, HttpError::invalid_url(&endpoint)))?;
        url.query_pairs_mut()
            .append_pair("q", &format!("toc:db/conf/{conf}/{conf}{year}.bht:"))
            .append_pair("h", &page_size.to_string())
            .append_pair("f", &offset.to_string())
            .append_pair("format", "json");
        Ok(url.into())
    }
}

#[async_trait]
impl PaperRetriever for DblpSource {
    fn name(&self) -> &'static str {
        self.http.source_name()
    }

    #[instrument(skip(self, gate), fields(source = SOURCE_NAME))]
    async fn fetch_papers(
        &self,
        conf: &str,
        year: i32,
        page_size: usize,
        gate: &ConcurrencyGate,
    ) -> Result<Vec<Paper>, SourceError> {
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let mut papers = Vec::new();
        let mut offset = 0;

        loop {
            let url = self.page_url(conf, year, page_size, offset)?;
            let response = self.http.get(&url, &HeaderMap::new(), gate).await?;
            let data: Value = self.http.json(&response)?;

            let (total, sent) = hit_counts(&data);
            let page = parse_papers(&data);
            debug!(offset, total, sent, parsed = page.len(), "DBLP page received");
            papers.extend(page);

            offset += sent;
            if sent == 0 || offset >= total {
                break;
            }
        }

        info!(count = papers.len(), "fetched papers from DBLP");
        Ok(papers)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample_response() -> Value {
        json!({
            "result": {
                "hits": {
                    "@total": "2",
                    "@sent": "2",
                    "hit": [
                        {
                            "info": {
                                "title": "Test Paper 1.",
                                "authors": {"author": [{"@pid": "1", "text": "Author A"}, {"text": "Author B"}]},
                                "year": "2025",
                                "venue": "RecSys",
                                "doi": "10.1145/test1",
                                "url": "https://dblp.org/rec/conf/recsys/test1"
                            }
                        },
                        {
                            "info": {
                                "title": "Test Paper 2",
                                "authors": {"author": {"text": "Author C"}},
                                "year": 2025,
                                "venue": ["RecSys", "Workshop"],
                                "doi": null
                            }
                        }
                    ]
                }
            }
        })
    }

    // ==================== parse_papers Tests ====================

    #[test]
    fn test_parse_papers_valid_response() {
        let papers = parse_papers(&sample_response());

        assert_eq!(papers.len(), 2);
        assert_eq!(papers[0].title, "Test Paper 1");
        assert_eq!(papers[0].authors, vec!["Author A", "Author B"]);
        assert_eq!(papers[0].year, 2025);
        assert_eq!(papers[0].venue, "RecSys");
        assert_eq!(papers[0].doi.as_deref(), Some("10.1145/test1"));

        assert_eq!(papers[1].title, "Test Paper 2");
        assert_eq!(papers[1].authors, vec!["Author C"]);
        assert_eq!(papers[1].year, 2025);
        assert_eq!(papers[1].venue, "RecSys");
        assert!(papers[1].doi.is_none());
    }

    #[test]
    fn test_parse_papers_no_hits() {
        assert!(parse_papers(&json!({"result": {"hits": {"@total": "0"}}})).is_empty());
    }

    #[test]
    fn test_parse_papers_invalid_data() {
        assert!(parse_papers(&json!({"invalid": "data"})).is_empty());
    }

    #[test]
    fn test_parse_papers_skips_hit_without_title() {
        let data = json!({"result": {"hits": {"hit": [
            {"info": {"authors": {"author": {"text": "Nobody"}}}},
            {"info": {"title": "Kept"}},
            {"no_info": true}
        ]}}});
        let papers = parse_papers(&data);
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].title, "Kept");
        assert_eq!(papers[0].year, 0);
    }

    #[test]
    fn test_parse_papers_keeps_hit_with_odd_authors_shape() {
        let data = json!({"result": {"hits": {"hit": [
            {"info": {"title": "Empty List", "authors": [], "doi": "10.1/empty"}},
            {"info": {"title": "Empty Text", "authors": "", "doi": "10.1/text"}},
            {"info": {"title": "Null", "authors": null, "year": "2024"}}
        ]}}});
        let papers = parse_papers(&data);
        assert_eq!(papers.len(), 3);
        assert_eq!(papers[0].doi.as_deref(), Some("10.1/empty"));
        assert!(papers[0].authors.is_empty());
        assert_eq!(papers[1].doi.as_deref(), Some("10.1/text"));
        assert!(papers[1].authors.is_empty());
        assert_eq!(papers[2].year, 2024);
        assert!(papers[2].authors.is_empty());
    }

    #[test]
    fn test_parse_papers_unparseable_year_is_unknown() {
        let data = json!({"result": {"hits": {"hit": [{"info": {"title": "T", "year": "n/a"}}]}}});
        assert_eq!(parse_papers(&data)[0].year, 0);
    }

    // ==================== parse_authors Tests ====================

    #[test]
    fn test_parse_authors_shapes() {
        let list = json!({"author": [{"text": "A"}, {"text": "B"}]});
        assert_eq!(parse_authors(Some(&list)), vec!["A", "B"]);

        let single = json!({"author": {"text": "C"}});
        assert_eq!(parse_authors(Some(&single)), vec!["C"]);

        let bare = json!({"author": ["D", "E"]});
        assert_eq!(parse_authors(Some(&bare)), vec!["D", "E"]);

        assert!(parse_authors(None).is_empty());
        assert!(parse_authors(Some(&json!({}))).is_empty());
        assert!(parse_authors(Some(&json!([]))).is_empty());
        assert!(parse_authors(Some(&json!(""))).is_empty());
    }

    // ==================== Pagination Helpers ====================

    #[test]
    fn test_hit_counts_reads_total_and_sent() {
        assert_eq!(hit_counts(&sample_response()), (2, 2));
    }

    #[test]
    fn test_hit_counts_sent_falls_back_to_hit_len() {
        let data = json!({"result": {"hits": {"@total": 5, "hit": [{}, {}, {}]}}});
        assert_eq!(hit_counts(&data), (5, 3));
        assert_eq!(hit_counts(&json!({})), (0, 0));
    }

    #[test]
    fn test_page_url_encodes_toc_query() {
        let client = RetryingHttpClient::new(reqwest::Client::new());
        let source = DblpSource::new(client).with_base_url("http://localhost:1234/");
        let url = Url::parse(&source.page_url("recsys", 2024, 1000, 0).unwrap()).unwrap();

        assert_eq!(url.path(), "/search/publ/api");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("q".into(), "toc:db/conf/recsys/recsys2024.bht:".into())));
        assert!(pairs.contains(&("h".into(), "1000".into())));
        assert!(pairs.contains(&("f".into(), "0".into())));
        assert!(pairs.contains(&("format".into(), "json".into())));
    }
}
