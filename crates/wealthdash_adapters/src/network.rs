//! Shared HTTP client configuration for broker requests.

use std::time::Duration;

use reqwest::Client;
use wealthdash_core::Error;

/// Default timeout for HTTP requests (30 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect timeout (10 seconds)
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub const USER_AGENT: &str = concat!("wealthdash/", env!("CARGO_PKG_VERSION"));

/// Build a configured HTTP client for the broker API.
///
/// A zero timeout falls back to [`DEFAULT_TIMEOUT`]. The connect timeout
/// never exceeds the request timeout.
pub fn build_broker_client(timeout: Duration) -> Result<Client, Error> {
    let timeout = effective_timeout(timeout);
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(timeout))
        .build()
        .map_err(|e| Error::Network(format!("failed to create broker HTTP client: {}", e)))
}

fn effective_timeout(timeout: Duration) -> Duration {
    if timeout.is_zero() {
        DEFAULT_TIMEOUT
    } else {
        timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_broker_client() {
        assert!(build_broker_client(DEFAULT_TIMEOUT).is_ok());
        assert!(build_broker_client(Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_zero_timeout_uses_default() {
        assert_eq!(effective_timeout(Duration::ZERO), DEFAULT_TIMEOUT);
        assert_eq!(effective_timeout(Duration::from_secs(5)), Duration::from_secs(5));
        assert!(build_broker_client(Duration::ZERO).is_ok());
    }

    #[test]
    fn test_timeout_constants() {
        assert_eq!(DEFAULT_TIMEOUT, Duration::from_secs(30));
        assert_eq!(DEFAULT_CONNECT_TIMEOUT, Duration::from_secs(10));
    }
}
