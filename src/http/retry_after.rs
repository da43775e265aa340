//! `Retry-After` header parsing.

use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

/// Maximum honored Retry-After value (1 hour).
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Parses a `Retry-After` header value into a wait duration.
///
/// Accepts a number of seconds (integer or fractional, e.g. `"15"` or
/// `"1.5"`) or an RFC 7231 HTTP-date. Dates in the past yield zero. Values
/// are capped at one hour. Negative, non-finite, or unparseable values
/// return `None` so the caller falls back to exponential backoff.
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<f64>() {
        if !seconds.is_finite() || seconds < 0.0 {
            debug!(header_value, "invalid Retry-After value, ignoring");
            return None;
        }

        if seconds > MAX_RETRY_AFTER.as_secs_f64() {
            warn!(
                seconds,
                max_seconds = MAX_RETRY_AFTER.as_secs(),
                "Retry-After exceeds maximum, capping at 1 hour"
            );
            return Some(MAX_RETRY_AFTER);
        }

        return Some(Duration::from_secs_f64(seconds));
    }

    let Ok(datetime) = httpdate::parse_http_date(header_value) else {
        debug!(header_value, "unparseable Retry-After value");
        return None;
    };

    match datetime.duration_since(SystemTime::now()) {
        Ok(duration) if duration > MAX_RETRY_AFTER => {
            warn!(
                delay_secs = duration.as_secs(),
                max_secs = MAX_RETRY_AFTER.as_secs(),
                "Retry-After date exceeds maximum, capping at 1 hour"
            );
            Some(MAX_RETRY_AFTER)
        }
        Ok(duration) => Some(duration),
        Err(_) => {
            debug!(header_value, "Retry-After date is in the past, returning zero");
            Some(Duration::ZERO)
        }
    }
}
