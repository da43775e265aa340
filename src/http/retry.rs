//! Retry policy with randomized exponential backoff for HTTP requests.
//!
//! Failures are classified into a [`FailureType`]:
//! - [`FailureType::RateLimited`] - HTTP 429, retried (honoring `Retry-After`)
//! - [`FailureType::Transient`] - connection/timeout failures, retried
//! - [`FailureType::Permanent`] - any other error status, never retried
//!
//! [`RetryPolicy::should_retry`] turns a failure and the attempt number into a
//! [`RetryDecision`].
//!
//! # Example
//!
//! ```
//! use paper_crawler::http::{FailureType, RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::default();
//! match policy.should_retry(FailureType::RateLimited, 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         assert!(delay.as_secs_f64() >= 1.0);
//!         assert_eq!(attempt, 2);
//!     }
//!     RetryDecision::DoNotRetry { reason } => panic!("{reason}"),
//! }
//! ```

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, instrument};

use super::HttpError;

/// Default attempt ceiling (1 initial attempt + 4 retries).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Lower bound of a backoff wait.
const DEFAULT_MIN_BACKOFF: Duration = Duration::from_secs(1);

/// Upper bound of a backoff wait.
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Classification of request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Connection reset, refused, or timed out. May succeed on retry.
    Transient,

    /// Server rate limiting (HTTP 429).
    RateLimited,

    /// Any other failure; retrying would not help.
    Permanent,
}

/// Decision on whether to retry a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the request after the specified backoff delay.
    Retry {
        /// Backoff delay. A server `Retry-After` directive takes precedence.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, first retry is 2).
        attempt: u32,
    },

    /// Do not retry the request.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Retry configuration.
///
/// # Delay Calculation
///
/// ```text
/// ceiling = min(min_backoff * 2^(attempt - 1), max_backoff)
/// delay   = uniform(min_backoff ..= max(ceiling, min_backoff))
/// ```
///
/// With defaults every delay lies in `[1s, 10s]` and the window doubles per
/// attempt: 1s, 1-2s, 1-4s, 1-8s.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Smallest wait between attempts.
    min_backoff: Duration,

    /// Largest wait between attempts.
    max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            min_backoff: DEFAULT_MIN_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with custom settings.
    ///
    /// `max_attempts` is clamped to at least 1 and `max_backoff` to at least
    /// `min_backoff`.
    #[must_use]
    pub fn new(max_attempts: u32, min_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            min_backoff,
            max_backoff: max_backoff.max(min_backoff),
        }
    }

    /// Creates a policy with a custom `max_attempts`, using defaults for other settings.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the backoff bounds `(min, max)`.
    #[must_use]
    pub fn backoff_bounds(&self) -> (Duration, Duration) {
        (self.min_backoff, self.max_backoff)
    }

    /// Determines whether to retry a failed request.
    ///
    /// `attempt` is the attempt number that just failed (1-indexed).
    #[instrument(level = "trace", skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        RetryDecision::Retry {
            delay: self.backoff_delay(attempt),
            attempt: attempt + 1,
        }
    }

    /// Samples the backoff for the retry following `attempt`.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let min = self.min_backoff.as_secs_f64();
        let max = self.max_backoff.as_secs_f64();

        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let ceiling = (min * 2f64.powi(exponent)).min(max).max(min);

        let seconds = if ceiling > min {
            rand::thread_rng().gen_range(min..=ceiling)
        } else {
            min
        };
        Duration::from_secs_f64(seconds)
    }
}

/// Classifies a request error for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | HTTP 429 | RateLimited |
/// | other HTTP status | Permanent |
/// | connect / timeout / request send / body read | Transient |
/// | other transport (decode, redirect, builder) | Permanent |
/// | invalid URL | Permanent |
#[must_use]
pub fn classify_error(error: &HttpError) -> FailureType {
    match error {
        HttpError::Status { status: 429, .. } => FailureType::RateLimited,
        HttpError::Status { .. } => FailureType::Permanent,
        HttpError::Transport { source, .. } => {
            if source.is_connect()
                || source.is_timeout()
                || source.is_request()
                || source.is_body()
            {
                FailureType::Transient
            } else {
                FailureType::Permanent
            }
        }
        HttpError::ExhaustedRetries { .. } | HttpError::InvalidUrl { .. } => FailureType::Permanent,
    }
}

/// Bookkeeping for one logical request across its attempts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Attempt currently in flight (1-indexed).
    pub attempt: u32,
    /// Total time spent waiting between attempts.
    pub elapsed_backoff: Duration,
    /// Status code of the most recent response, if any.
    pub last_status: Option<u16>,
}

impl RetryState {
    /// State before the first attempt.
    #[must_use]
    pub fn new() -> Self {
        Self {
            attempt: 1,
            ..Self::default()
        }
    }

    /// Records a wait and moves to the next attempt.
    pub fn advance(&mut self, waited: Duration, next_attempt: u32) {
        self.elapsed_backoff += waited;
        self.attempt = next_attempt;
    }
}

/// Waits between attempts.
///
/// The client sleeps through this trait so that tests can observe the exact
/// waits without real time passing.
#[async_trait]
pub trait Sleeper: Send + Sync + fmt::Debug {
    /// Suspends the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
