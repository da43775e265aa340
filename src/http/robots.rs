//! robots.txt precondition for polite crawling.
//!
//! Only the wildcard group (`User-agent: *`) and its `Disallow:` prefixes are
//! honored. Rules are cached per origin for 24h; a robots.txt that does not
//! exist (404) allows everything.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use reqwest::header::HeaderMap;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use super::{HttpError, RetryingHttpClient};

const ROBOTS_TTL: Duration = Duration::from_secs(24 * 3600);

/// Errors from robots.txt checking.
#[derive(Debug, Error)]
pub enum RobotsError {
    /// The target URL has no usable origin.
    #[error("invalid URL for robots check: {0}")]
    InvalidUrl(String),

    /// robots.txt could not be fetched.
    #[error("failed to fetch robots.txt for {origin}: {source}")]
    Fetch {
        /// Origin whose robots.txt failed.
        origin: String,
        /// Underlying HTTP failure.
        #[source]
        source: HttpError,
    },
}

/// Outcome of a robots.txt check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotsDecision {
    /// URL may be fetched.
    Allowed,
    /// URL is disallowed by robots.txt.
    Disallowed,
}

#[derive(Debug)]
struct CachedRules {
    disallowed_prefixes: Vec<String>,
    fetched_at: Instant,
}

/// Per-origin robots.txt cache shared by all sources.
#[derive(Debug)]
pub struct RobotsCache {
    client: RetryingHttpClient,
    rules: DashMap<String, CachedRules>,
}

impl RobotsCache {
    /// Creates an empty cache that fetches robots.txt through `client`.
    #[must_use]
    pub fn new(client: RetryingHttpClient) -> Self {
        Self {
            client,
            rules: DashMap::new(),
        }
    }

    /// Checks `url` against its origin's robots.txt, fetching it when the
    /// cached copy is missing or stale.
    ///
    /// # Errors
    ///
    /// Returns [`RobotsError`] if the URL has no origin or robots.txt cannot
    /// be fetched (other than 404).
    #[instrument(skip(self), fields(url = %url))]
    pub async fn check(&self, url: &str) -> Result<RobotsDecision, RobotsError> {
        let parsed = Url::parse(url).map_err(|_| RobotsError::InvalidUrl(url.to_string()))?;
        let origin = parsed.origin();
        if !origin.is_tuple() {
            return Err(RobotsError::InvalidUrl(url.to_string()));
        }
        let origin = origin.ascii_serialization();

        let stale = self
            .rules
            .get(&origin)
            .is_none_or(|cached| cached.fetched_at.elapsed() > ROBOTS_TTL);
        if stale {
            let body = self.fetch_robots_txt(&origin).await?;
            self.rules.insert(
                origin.clone(),
                CachedRules {
                    disallowed_prefixes: parse_disallow_rules(&body),
                    fetched_at: Instant::now(),
                },
            );
        }

        let path = parsed.path();
        let disallowed = self.rules.get(&origin).is_some_and(|cached| {
            cached
                .disallowed_prefixes
                .iter()
                .any(|prefix| path.starts_with(prefix.as_str()))
        });

        if disallowed {
            debug!(path, origin = %origin, "robots.txt disallows path");
            Ok(RobotsDecision::Disallowed)
        } else {
            Ok(RobotsDecision::Allowed)
        }
    }

    async fn fetch_robots_txt(&self, origin: &str) -> Result<String, RobotsError> {
        let robots_url = format!("{origin}/robots.txt");
        debug!(robots_url = %robots_url, "fetching robots.txt");

        match self.client.get(&robots_url, &HeaderMap::new()).await {
            Ok(response) => Ok(response.into_body()),
            Err(error) if error.is_not_found() => Ok(String::new()),
            Err(source) => Err(RobotsError::Fetch {
                origin: origin.to_string(),
                source,
            }),
        }
    }
}

/// Collects `Disallow:` prefixes from the wildcard user-agent group,
/// longest first.
fn parse_disallow_rules(body: &str) -> Vec<String> {
    let mut in_wildcard_group = false;
    let mut disallowed: Vec<String> = Vec::new();

    for raw_line in body.lines() {
        let line = raw_line.split('#').next().unwrap_or_default().trim();
        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();

        if field.trim().eq_ignore_ascii_case("user-agent") {
            in_wildcard_group = value == "*";
        } else if in_wildcard_group
            && field.trim().eq_ignore_ascii_case("disallow")
            && !value.is_empty()
        {
            let prefix = if value.starts_with('/') {
                value.to_string()
            } else {
                format!("/{value}")
            };
            if !disallowed.contains(&prefix) {
                disallowed.push(prefix);
            }
        }
    }

    disallowed.sort_by_key(|prefix| std::cmp::Reverse(prefix.len()));
    disallowed
}
