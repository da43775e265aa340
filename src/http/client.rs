//! HTTP client with bounded retries and rate-limit-aware waiting.
//!
//! Every request, GET or POST, runs through the same loop:
//!
//! 1. Send the request and read the whole body
//! 2. On 2xx return the buffered [`HttpResponse`]
//! 3. Classify the failure; permanent failures return at once
//! 4. On 429 with a usable `Retry-After`, wait exactly that long; otherwise
//!    wait the policy's randomized exponential backoff
//! 5. Give up with [`HttpError::ExhaustedRetries`] after the attempt ceiling
//!
//! A timeout or reset while the body is still streaming is a transport
//! failure of that attempt, retried like a failed connect.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tracing::{debug, error, instrument, warn};
use url::Url;

use super::retry::{
    FailureType, RetryDecision, RetryPolicy, RetryState, Sleeper, TokioSleeper, classify_error,
};
use super::retry_after::parse_retry_after;
use super::HttpError;

/// Successful response with its body fully read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    status: StatusCode,
    body: String,
}

impl HttpResponse {
    /// Status code of the response.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Consumes the response, returning its body.
    #[must_use]
    pub fn into_body(self) -> String {
        self.body
    }
}

/// Retrying wrapper around a reqwest [`Client`].
///
/// Cloning is cheap; clones share the connection pool and sleeper.
#[derive(Debug, Clone)]
pub struct RetryingHttpClient {
    inner: Client,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryingHttpClient {
    /// Wraps `inner` with the default policy (5 attempts, 1-10s backoff).
    #[must_use]
    pub fn new(inner: Client) -> Self {
        Self {
            inner,
            policy: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the sleeper used between attempts.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Returns the configured retry policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// Issues a GET with retries.
    ///
    /// # Errors
    ///
    /// See [`RetryingHttpClient::request`].
    pub async fn get(&self, url: &str, headers: &HeaderMap) -> Result<HttpResponse, HttpError> {
        self.request(Method::GET, url, None, headers).await
    }

    /// Issues a POST with a JSON body and retries.
    ///
    /// # Errors
    ///
    /// See [`RetryingHttpClient::request`].
    pub async fn post_json(
        &self,
        url: &str,
        body: &Value,
        headers: &HeaderMap,
    ) -> Result<HttpResponse, HttpError> {
        self.request(Method::POST, url, Some(body), headers).await
    }

    /// Issues a request, retrying rate-limited and transient failures.
    ///
    /// # Errors
    ///
    /// - [`HttpError::InvalidUrl`] when `url` does not parse
    /// - [`HttpError::Status`] immediately for any non-2xx status except 429
    /// - [`HttpError::Transport`] immediately for non-retryable transport errors
    /// - [`HttpError::ExhaustedRetries`] once the attempt ceiling is reached
    #[instrument(skip(self, body, headers), fields(method = %method, url = %url))]
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        headers: &HeaderMap,
    ) -> Result<HttpResponse, HttpError> {
        let parsed = Url::parse(url).map_err(|_| HttpError::invalid_url(url))?;
        let mut state = RetryState::new();

        loop {
            debug!(attempt = state.attempt, "sending request");

            let failure = match self.send_once(&method, &parsed, body, headers).await {
                Ok(response) => return Ok(response),
                Err(failure) => failure,
            };
            state.last_status = failure.status_code();
            let failure_type = classify_error(&failure);

            match self.policy.should_retry(failure_type, state.attempt) {
                RetryDecision::Retry {
                    delay: backoff_delay,
                    attempt: next_attempt,
                } => {
                    let retry_after_delay = retry_after_delay(&failure);
                    let delay = retry_after_delay.unwrap_or(backoff_delay);

                    warn!(
                        attempt = state.attempt,
                        max_attempts = self.policy.max_attempts(),
                        wait_secs = delay.as_secs_f64(),
                        using_retry_after = retry_after_delay.is_some(),
                        error = %failure,
                        "request failed, retrying"
                    );
                    self.sleeper.sleep(delay).await;
                    state.advance(delay, next_attempt);
                }
                RetryDecision::DoNotRetry { reason } => {
                    if failure_type == FailureType::Permanent {
                        debug!(%reason, error = %failure, "not retrying request");
                        return Err(failure);
                    }

                    error!(
                        attempts = state.attempt,
                        elapsed_backoff_ms = duration_millis(state.elapsed_backoff),
                        last_status = ?state.last_status,
                        error = %failure,
                        "request failed after all attempts"
                    );
                    return Err(HttpError::exhausted(url, state.attempt, failure));
                }
            }
        }
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&Value>,
        headers: &HeaderMap,
    ) -> Result<HttpResponse, HttpError> {
        let mut builder = self
            .inner
            .request(method.clone(), url.clone())
            .headers(headers.clone());
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| HttpError::transport(url.as_str(), e))?;

        let status = response.status();
        if status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| HttpError::transport(url.as_str(), e))?;
            return Ok(HttpResponse { status, body });
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Err(HttpError::status_with_retry_after(
            method.clone(),
            url.as_str(),
            status.as_u16(),
            retry_after,
        ))
    }
}

/// Server-mandated wait for a 429 response, if it sent a usable one.
fn retry_after_delay(error: &HttpError) -> Option<Duration> {
    match error {
        HttpError::Status {
            status: 429,
            retry_after: Some(value),
            ..
        } => parse_retry_after(value),
        _ => None,
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
