//! Resilient HTTP plumbing shared by every source.
//!
//! - [`RetryingHttpClient`] - GET/POST with bounded retries, exponential
//!   backoff, and `Retry-After` compliance
//! - [`ConcurrencyGate`] - bounded admission for in-flight requests
//! - [`RobotsCache`] - robots.txt precondition per origin
//!
//! # Example
//!
//! ```no_run
//! use paper_crawler::http::{
//!     ConcurrencyGate, HttpTimeouts, RetryingHttpClient, build_http_client,
//! };
//! use reqwest::header::HeaderMap;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RetryingHttpClient::new(build_http_client(HttpTimeouts::default())?);
//! let gate = ConcurrencyGate::new(5)?;
//! let response = gate
//!     .run(client.get("https://dblp.org/search/publ/api?q=recsys&format=json", &HeaderMap::new()))
//!     .await??;
//! println!("status: {}", response.status());
//! # Ok(())
//! # }
//! ```

mod builder;
mod client;
mod error;
mod gate;
mod retry;
mod retry_after;
mod robots;

pub use builder::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_READ_TIMEOUT_SECS, HttpTimeouts, build_http_client,
};
pub use client::{HttpResponse, RetryingHttpClient};
pub use error::HttpError;
pub use gate::{
    ConcurrencyGate, DEFAULT_CONCURRENCY, GateError, GatePermit, MAX_CONCURRENCY, MIN_CONCURRENCY,
};
pub use retry::{
    DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryPolicy, RetryState, Sleeper,
    TokioSleeper, classify_error,
};
pub use retry_after::parse_retry_after;
pub use robots::{RobotsCache, RobotsDecision, RobotsError};
