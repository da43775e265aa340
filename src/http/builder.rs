//! Shared reqwest client construction policy.
//!
//! Every source talks through a client built here so that timeouts, the
//! User-Agent, and compression stay consistent across adapters.

use std::time::Duration;

use reqwest::Client;

use crate::user_agent;

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default total request timeout in seconds.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;

/// Transport timeouts applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds.
    pub read_timeout_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
        }
    }
}

/// Builds a reqwest client with the crawler's User-Agent and the given timeouts.
///
/// # Errors
///
/// Returns the reqwest error when the TLS backend or system configuration
/// cannot be initialized.
pub fn build_http_client(timeouts: HttpTimeouts) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(Duration::from_secs(timeouts.connect_timeout_secs))
        .timeout(Duration::from_secs(timeouts.read_timeout_secs))
        .user_agent(user_agent::default_user_agent())
        .gzip(true)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts() {
        let timeouts = HttpTimeouts::default();
        assert_eq!(timeouts.connect_timeout_secs, 10);
        assert_eq!(timeouts.read_timeout_secs, 30);
    }

    #[test]
    fn test_build_http_client_with_custom_timeouts() {
        let client = build_http_client(HttpTimeouts {
            connect_timeout_secs: 1,
            read_timeout_secs: 2,
        });
        assert!(client.is_ok());
    }
}
