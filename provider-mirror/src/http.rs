//! Shared HTTP client construction.

use std::time::Duration;

/// User agent sent with every registry and download request.
pub(crate) const USER_AGENT: &str = concat!("provider-mirror/", env!("CARGO_PKG_VERSION"));

/// Build a reqwest client with the crate's user agent and the given timeout.
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}
