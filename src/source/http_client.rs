//! Shared request path for source adapters.
//!
//! Every adapter request goes robots precondition (when enabled), then gate
//! admission, then the retrying client. The permit is held until the body
//! has been read in full. Failures come back as [`SourceError`] tagged with
//! the adapter name.

use std::sync::Arc;

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::http::{
    ConcurrencyGate, HttpResponse, RetryingHttpClient, RobotsCache, RobotsDecision,
};

use super::SourceError;

/// Retrying client plus the optional robots cache, bound to one adapter name.
#[derive(Debug, Clone)]
pub(crate) struct SourceHttp {
    source_name: &'static str,
    client: RetryingHttpClient,
    robots: Option<Arc<RobotsCache>>,
}

impl SourceHttp {
    pub(crate) fn new(source_name: &'static str, client: RetryingHttpClient) -> Self {
        Self {
            source_name,
            client,
            robots: None,
        }
    }

    pub(crate) fn set_robots(&mut self, robots: Arc<RobotsCache>) {
        self.robots = Some(robots);
    }

    pub(crate) fn source_name(&self) -> &'static str {
        self.source_name
    }

    async fn ensure_allowed(&self, url: &str) -> Result<(), SourceError> {
        let Some(robots) = &self.robots else {
            return Ok(());
        };
        match robots.check(url).await? {
            RobotsDecision::Allowed => Ok(()),
            RobotsDecision::Disallowed => Err(SourceError::robots_disallowed(url)),
        }
    }

    /// GET under a gate permit.
    pub(crate) async fn get(
        &self,
        url: &str,
        headers: &HeaderMap,
        gate: &ConcurrencyGate,
    ) -> Result<HttpResponse, SourceError> {
        self.ensure_allowed(url).await?;
        debug!(source = self.source_name, url = %url, "GET");
        gate.run(self.client.get(url, headers))
            .await
            .map_err(|e| SourceError::gate(self.source_name, e))?
            .map_err(|e| SourceError::http(self.source_name, e))
    }

    /// POST a JSON body under a gate permit.
    pub(crate) async fn post_json(
        &self,
        url: &str,
        body: &Value,
        headers: &HeaderMap,
        gate: &ConcurrencyGate,
    ) -> Result<HttpResponse, SourceError> {
        self.ensure_allowed(url).await?;
        debug!(source = self.source_name, url = %url, "POST");
        gate.run(self.client.post_json(url, body, headers))
            .await
            .map_err(|e| SourceError::gate(self.source_name, e))?
            .map_err(|e| SourceError::http(self.source_name, e))
    }

    /// Decodes the response body as JSON.
    pub(crate) fn json<T: DeserializeOwned>(
        &self,
        response: &HttpResponse,
    ) -> Result<T, SourceError> {
        serde_json::from_str(response.body())
            .map_err(|e| SourceError::decode(self.source_name, e.to_string()))
    }
}
