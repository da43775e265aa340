//! Common paper record shared by every source.
//!
//! Sources parse their native payloads into [`Paper`]; enrichment stages then
//! fold fetched records into existing ones with [`merge`].

mod merge;

pub use merge::merge;

use serde::{Deserialize, Serialize};

/// Bibliographic record for one paper.
///
/// Absent values are represented as `None`, an empty string, an empty author
/// list, or `year == 0`. Once `doi` is known it is the only key used to
/// correlate the record across sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paper {
    /// Title as published by the primary index.
    pub title: String,
    /// Author names in publication order.
    pub authors: Vec<String>,
    /// Publication year, `0` when unknown.
    pub year: i32,
    /// Venue (conference or journal) name.
    pub venue: String,
    /// Digital Object Identifier.
    pub doi: Option<String>,
    /// Abstract text.
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    /// Direct link to a PDF.
    pub pdf_url: Option<String>,
}

impl Paper {
    /// Creates a record with only a title set.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Sets the DOI.
    #[must_use]
    pub fn with_doi(mut self, doi: impl Into<String>) -> Self {
        self.doi = Some(doi.into());
        self
    }

    /// Returns the DOI when present and non-blank.
    #[must_use]
    pub fn doi(&self) -> Option<&str> {
        self.doi.as_deref().map(str::trim).filter(|doi| !doi.is_empty())
    }

    /// Returns the normalized DOI used to correlate records across sources.
    #[must_use]
    pub fn doi_key(&self) -> Option<String> {
        self.doi().map(doi_key)
    }
}

/// Normalizes a DOI for cross-source comparison.
///
/// DOIs are case-insensitive; a leading `https://doi.org/` or `doi:` is
/// dropped.
#[must_use]
pub fn doi_key(doi: &str) -> String {
    let trimmed = doi.trim();
    let lower = trimmed.to_ascii_lowercase();
    let stripped = ["https://doi.org/", "http://doi.org/", "https://dx.doi.org/", "doi:"]
        .iter()
        .find_map(|prefix| lower.strip_prefix(prefix))
        .unwrap_or(&lower);
    stripped.to_string()
}
