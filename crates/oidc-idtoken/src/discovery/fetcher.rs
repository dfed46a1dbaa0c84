//! Discovery document fetcher

use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

use super::types::DiscoveryDocument;
use crate::error::{Error, Result};
use crate::jwks::is_loopback;

/// Discovery document fetcher
///
/// One GET per call, no caching: the provider fetches the document once
/// at construction time.
#[derive(Debug, Clone)]
pub struct DiscoveryFetcher {
    client: reqwest::Client,
}

impl DiscoveryFetcher {
    /// Fetcher with its own HTTP client and request timeout
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::InvalidOption {
                name: "httpTimeoutSecs".to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self::with_client(client))
    }

    /// Fetcher sharing an existing client (it should not follow redirects)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Fetch and validate the document at `discovery_uri`
    ///
    /// # Errors
    ///
    /// Returns [`Error::DiscoveryUnavailable`] on an insecure or invalid URL,
    /// transport failure, non-success status, invalid JSON, or a document
    /// missing a required endpoint.
    pub async fn fetch(&self, discovery_uri: &str) -> Result<DiscoveryDocument> {
        let unavailable = |reason: String| Error::DiscoveryUnavailable {
            url: discovery_uri.to_string(),
            reason,
        };

        let url = Url::parse(discovery_uri).map_err(|e| unavailable(format!("invalid URL: {e}")))?;
        if url.scheme() != "https" && !(url.scheme() == "http" && is_loopback(&url)) {
            return Err(unavailable(
                "discovery URL must use HTTPS (HTTP only allowed for loopback)".to_string(),
            ));
        }

        info!(discovery_uri = %discovery_uri, "Fetching OpenID configuration");

        let response = self.client.get(url).send().await.map_err(|e| {
            error!(discovery_uri = %discovery_uri, error = %e, "Discovery request failed");
            unavailable(format!("request failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            error!(discovery_uri = %discovery_uri, status = %status, "Discovery endpoint returned error status");
            return Err(unavailable(format!(
                "HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| unavailable(format!("failed to read response: {e}")))?;

        let document: DiscoveryDocument = serde_json::from_slice(&body)
            .map_err(|e| unavailable(format!("invalid JSON: {e}")))?;
        document.validate().map_err(|e| unavailable(e.to_string()))?;

        debug!(
            discovery_uri = %discovery_uri,
            issuer = %document.issuer,
            jwks_uri = %document.jwks_uri,
            "Discovered provider endpoints"
        );
        Ok(document)
    }
}
