//! Checksum-verified fetching with retry and cancellation.

use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::{FetchError, FetchResult};
use super::retry::RetryPolicy;
use super::source::PackageSource;
use crate::checksum::{checksums_match, sha256_hex};
use crate::provider::PlatformPackage;

/// Downloads archives and verifies them against their published checksum.
///
/// Transient failures are retried according to the [`RetryPolicy`]; checksum
/// mismatches and rejected requests fail immediately. Cancellation is
/// observed both while a request is in flight and while backing off.
#[derive(Clone)]
pub struct ArtifactFetcher {
    source: Arc<dyn PackageSource>,
    retry: RetryPolicy,
}

impl ArtifactFetcher {
    /// Create a fetcher over a package source.
    pub fn new(source: Arc<dyn PackageSource>, retry: RetryPolicy) -> Self {
        Self { source, retry }
    }

    /// The retry policy in effect.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Fetch `package` and return its bytes once they hash to `package.checksum`.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Cancelled`] if `cancel` fires first
    /// - [`FetchError::ChecksumMismatch`] if the downloaded bytes are wrong
    /// - [`FetchError::Rejected`] on a non-retryable failure
    /// - [`FetchError::Exhausted`] when transient failures outlast the policy
    pub async fn fetch(
        &self,
        package: &PlatformPackage,
        cancel: &CancellationToken,
    ) -> FetchResult<Bytes> {
        let url = package.download_url.as_str();
        let cancelled = || FetchError::Cancelled {
            url: url.to_string(),
        };
        let mut attempt = 1;

        loop {
            if cancel.is_cancelled() {
                return Err(cancelled());
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled()),
                result = self.source.download(url) => result,
            };

            match result {
                Ok(bytes) => {
                    verify(package, bytes.clone()).await?;
                    debug!(
                        file = %package.filename,
                        bytes = bytes.len(),
                        attempt,
                        "Archive downloaded and verified"
                    );
                    return Ok(bytes);
                }
                Err(e) if e.is_transient() => match self.retry.delay_after(attempt) {
                    Some(delay) => {
                        warn!(
                            url = %url,
                            attempt,
                            max_attempts = self.retry.max_attempts(),
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Download failed, retrying"
                        );
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return Err(cancelled()),
                            _ = tokio::time::sleep(delay) => {}
                        }
                        attempt += 1;
                    }
                    None => {
                        return Err(FetchError::Exhausted {
                            url: url.to_string(),
                            attempts: attempt,
                            reason: e.to_string(),
                        })
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }
}

/// Hash on the blocking pool; archives can be hundreds of megabytes.
async fn verify(package: &PlatformPackage, bytes: Bytes) -> FetchResult<()> {
    let actual = tokio::task::spawn_blocking(move || sha256_hex(&bytes))
        .await
        .map_err(|e| FetchError::Rejected {
            url: package.download_url.clone(),
            reason: format!("checksum task failed: {}", e),
        })?;
    if checksums_match(&actual, &package.checksum) {
        Ok(())
    } else {
        Err(FetchError::ChecksumMismatch {
            filename: package.filename.clone(),
            expected: package.checksum.clone(),
            actual,
        })
    }
}
