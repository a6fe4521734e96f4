//! Byte sources for provider archives.

use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;
use tracing::debug;

use super::error::{FetchError, FetchResult};
use crate::http::build_client;
use crate::BoxFuture;

/// Something that can hand back the full contents of an archive URL.
///
/// Implementations report failures as [`FetchError::Transient`] when another
/// attempt might succeed and [`FetchError::Rejected`] otherwise. Checksum
/// verification and retries happen in the fetcher, not here.
pub trait PackageSource: Send + Sync {
    /// Download the complete body at `url`.
    fn download<'a>(&'a self, url: &'a str) -> BoxFuture<'a, FetchResult<Bytes>>;
}

/// HTTP(S) download source backed by reqwest.
pub struct HttpPackageSource {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpPackageSource {
    /// Create a source with the given per-request timeout.
    pub fn new(timeout: Duration) -> FetchResult<Self> {
        let client = build_client(timeout).map_err(|e| FetchError::Rejected {
            url: String::new(),
            reason: format!("failed to create HTTP client: {}", e),
        })?;
        Ok(Self { client, timeout })
    }

    async fn get(&self, url: &str) -> FetchResult<Bytes> {
        debug!(url = %url, "Downloading archive");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let reason = format!("GET request failed with status {}", status);
            return Err(if is_transient_status(status) {
                FetchError::Transient {
                    url: url.to_string(),
                    reason,
                }
            } else {
                FetchError::Rejected {
                    url: url.to_string(),
                    reason,
                }
            });
        }

        let expected_len = response.content_length();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.request_error(url, e))?;

        if let Some(expected) = expected_len {
            if body.len() as u64 != expected {
                return Err(FetchError::Transient {
                    url: url.to_string(),
                    reason: format!("truncated body: got {} of {} bytes", body.len(), expected),
                });
            }
        }

        Ok(body)
    }

    fn request_error(&self, url: &str, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Transient {
                url: url.to_string(),
                reason: format!("timed out after {}s", self.timeout.as_secs()),
            }
        } else if e.is_connect() || e.is_request() || e.is_body() || e.is_decode() {
            FetchError::Transient {
                url: url.to_string(),
                reason: e.to_string(),
            }
        } else {
            FetchError::Rejected {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

impl PackageSource for HttpPackageSource {
    fn download<'a>(&'a self, url: &'a str) -> BoxFuture<'a, FetchResult<Bytes>> {
        Box::pin(self.get(url))
    }
}

/// Server errors, request timeouts and rate limiting are worth retrying.
fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}
