//! Registry client speaking the provider registry protocol over HTTPS.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::{StatusCode, Url};
use semver::Version;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::error::{RegistryError, RegistryResult};
use super::{RegistryClient, RegistryPackage};
use crate::http::build_client;
use crate::provider::{Platform, ProviderAddress};
use crate::BoxFuture;

/// Service discovery document path.
const DISCOVERY_PATH: &str = "/.well-known/terraform.json";

/// Discovery key for the provider registry protocol.
const PROVIDERS_SERVICE: &str = "providers.v1";

/// Base path used when a host publishes no discovery document.
const DEFAULT_PROVIDERS_PATH: &str = "/v1/providers/";

#[derive(Debug, Deserialize)]
struct VersionsResponse {
    versions: Vec<VersionEntry>,
}

#[derive(Debug, Deserialize)]
struct VersionEntry {
    version: String,
}

#[derive(Debug, Deserialize)]
struct DownloadResponse {
    filename: String,
    download_url: String,
    shasum: String,
}

/// Reqwest-backed [`RegistryClient`].
///
/// Discovered service URLs are remembered per host for the lifetime of the
/// client, so each registry host is discovered at most once per run.
pub struct HttpRegistryClient {
    client: reqwest::Client,
    timeout: Duration,
    discovered: Mutex<HashMap<String, Url>>,
}

impl HttpRegistryClient {
    /// Create a registry client with the given request timeout.
    pub fn new(timeout: Duration) -> RegistryResult<Self> {
        let client = build_client(timeout).map_err(|e| RegistryError::Unavailable {
            url: String::new(),
            reason: format!("failed to create HTTP client: {}", e),
        })?;
        Ok(Self {
            client,
            timeout,
            discovered: Mutex::new(HashMap::new()),
        })
    }

    /// Request timeout applied to every registry call.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve the providers.v1 base URL for a registry host.
    async fn providers_base(&self, host: &str) -> RegistryResult<Url> {
        let cached = self.discovered.lock().get(host).cloned();
        if let Some(url) = cached {
            return Ok(url);
        }

        let root = parse_url(&format!("https://{}/", host))?;
        let discovery = join_url(&root, DISCOVERY_PATH)?;
        let services: Option<HashMap<String, serde_json::Value>> =
            self.get_json(&discovery).await?;

        let base = match services {
            None => join_url(&root, DEFAULT_PROVIDERS_PATH)?,
            Some(services) => match services.get(PROVIDERS_SERVICE).and_then(|v| v.as_str()) {
                Some(path) => join_url(&root, &ensure_trailing_slash(path))?,
                None => {
                    return Err(RegistryError::InvalidResponse {
                        url: discovery.to_string(),
                        reason: format!("host {} does not offer {}", host, PROVIDERS_SERVICE),
                    })
                }
            },
        };

        debug!(host = %host, base = %base, "Discovered provider registry");
        self.discovered
            .lock()
            .insert(host.to_string(), base.clone());
        Ok(base)
    }

    /// GET a JSON document. Returns `Ok(None)` on 404.
    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> RegistryResult<Option<T>> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| RegistryError::Unavailable {
                url: url.to_string(),
                reason: if e.is_timeout() {
                    format!("timed out after {}s", self.timeout.as_secs())
                } else {
                    e.to_string()
                },
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(RegistryError::Unavailable {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RegistryError::Unavailable {
                url: url.to_string(),
                reason: format!("failed to read response: {}", e),
            })?;

        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| RegistryError::InvalidResponse {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    async fn fetch_versions(&self, address: &ProviderAddress) -> RegistryResult<Vec<String>> {
        let base = self.providers_base(address.host()).await?;
        let url = join_url(
            &base,
            &format!("{}/{}/versions", address.namespace(), address.provider_type()),
        )?;

        let response: Option<VersionsResponse> = self.get_json(&url).await?;
        match response {
            Some(body) => Ok(body.versions.into_iter().map(|v| v.version).collect()),
            None => Err(RegistryError::NotFound {
                provider: address.to_string(),
            }),
        }
    }

    async fn fetch_package(
        &self,
        address: &ProviderAddress,
        version: &Version,
        platform: &Platform,
    ) -> RegistryResult<RegistryPackage> {
        let base = self.providers_base(address.host()).await?;
        let url = join_url(
            &base,
            &format!(
                "{}/{}/{}/download/{}/{}",
                address.namespace(),
                address.provider_type(),
                version,
                platform.os(),
                platform.arch()
            ),
        )?;

        let response: Option<DownloadResponse> = self.get_json(&url).await?;
        let body = response.ok_or_else(|| RegistryError::PlatformUnavailable {
            provider: address.to_string(),
            version: version.to_string(),
            platform: platform.to_string(),
        })?;

        // Registries may answer with a download URL relative to the request.
        let download_url = join_url(&url, &body.download_url)?;

        Ok(RegistryPackage {
            filename: body.filename,
            download_url: download_url.to_string(),
            shasum: body.shasum,
        })
    }
}

impl RegistryClient for HttpRegistryClient {
    fn list_versions<'a>(
        &'a self,
        address: &'a ProviderAddress,
    ) -> BoxFuture<'a, RegistryResult<Vec<String>>> {
        Box::pin(self.fetch_versions(address))
    }

    fn get_package<'a>(
        &'a self,
        address: &'a ProviderAddress,
        version: &'a Version,
        platform: &'a Platform,
    ) -> BoxFuture<'a, RegistryResult<RegistryPackage>> {
        Box::pin(self.fetch_package(address, version, platform))
    }
}

fn parse_url(raw: &str) -> RegistryResult<Url> {
    Url::parse(raw).map_err(|e| RegistryError::InvalidResponse {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

fn join_url(base: &Url, path: &str) -> RegistryResult<Url> {
    base.join(path).map_err(|e| RegistryError::InvalidResponse {
        url: format!("{}{}", base, path),
        reason: e.to_string(),
    })
}

fn ensure_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}
