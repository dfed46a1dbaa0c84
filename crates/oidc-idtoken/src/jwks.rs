//! JWKS document retrieval
//!
//! The verifier talks to the key endpoint only through [`JwksFetcher`], which
//! returns the raw document text. Parsing stays in
//! [`KeySet::from_document`](crate::jwk::KeySet::from_document) so every
//! verification attempt builds its own key set.
//!
//! - [`HttpJwksFetcher`]: `reqwest` GET with a request timeout (default 10s).
//!   HTTPS is required except for loopback hosts.
//! - [`CachedJwksFetcher`]: optional TTL cache of raw documents in front of
//!   any other fetcher. When a key id is missing from a cached document the
//!   verifier asks for a [`refresh`](JwksFetcher::refresh), which refetches
//!   at most once per [`DEFAULT_MIN_REFRESH_INTERVAL`] so rotated keys are
//!   picked up before the TTL runs out.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use url::{Host, Url};

use crate::error::FetchError;

/// Default timeout for a JWKS request
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Minimum time between two refreshes of one cached endpoint
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Source of JWKS documents
#[async_trait]
pub trait JwksFetcher: Send + Sync {
    /// Retrieve the JWKS document published at `uri`
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on transport failure, timeout, non-success
    /// status, or an endpoint the fetcher refuses to call.
    async fn fetch(&self, uri: &str) -> Result<String, FetchError>;

    /// Retrieve a newer document after a key lookup in the last one missed
    ///
    /// `Ok(None)` means nothing newer is available. The default never
    /// refetches: a fetcher without a cache already returned a fresh document.
    ///
    /// # Errors
    ///
    /// As for [`fetch`](Self::fetch).
    async fn refresh(&self, _uri: &str) -> Result<Option<String>, FetchError> {
        Ok(None)
    }
}

#[async_trait]
impl<T: JwksFetcher + ?Sized> JwksFetcher for Arc<T> {
    async fn fetch(&self, uri: &str) -> Result<String, FetchError> {
        (**self).fetch(uri).await
    }

    async fn refresh(&self, uri: &str) -> Result<Option<String>, FetchError> {
        (**self).refresh(uri).await
    }
}

/// Whether `url` may be fetched over plain HTTP
pub(crate) fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

/// JWKS fetcher over HTTP
///
/// # Example
///
/// ```rust,no_run
/// use oidc_idtoken::jwks::{HttpJwksFetcher, JwksFetcher};
///
/// # tokio_test::block_on(async {
/// let fetcher = HttpJwksFetcher::new()?;
/// let document = fetcher.fetch("https://idp.example.com/.well-known/jwks.json").await?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct HttpJwksFetcher {
    client: reqwest::Client,
    allow_insecure_http: bool,
}

impl HttpJwksFetcher {
    /// Fetcher with the default request timeout
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    /// Fetcher with a custom request timeout
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the HTTP client cannot be built.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| FetchError::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client))
    }

    /// Fetcher sharing an existing client (its timeout and redirect policy apply)
    ///
    /// Only the requested URL is checked against the scheme rules, so the
    /// client should not follow redirects.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            allow_insecure_http: false,
        }
    }

    /// Permit plain HTTP for non-loopback hosts
    pub fn allow_insecure_http(mut self, allow: bool) -> Self {
        self.allow_insecure_http = allow;
        self
    }

    fn check_endpoint(&self, uri: &str) -> Result<Url, FetchError> {
        let url = Url::parse(uri).map_err(|e| FetchError::InsecureEndpoint {
            uri: uri.to_string(),
            reason: format!("invalid URL: {e}"),
        })?;

        match url.scheme() {
            "https" => Ok(url),
            "http" if self.allow_insecure_http || is_loopback(&url) => Ok(url),
            scheme => Err(FetchError::InsecureEndpoint {
                uri: uri.to_string(),
                reason: format!(
                    "scheme {scheme} not allowed (HTTPS required, HTTP only for loopback)"
                ),
            }),
        }
    }
}

#[async_trait]
impl JwksFetcher for HttpJwksFetcher {
    async fn fetch(&self, uri: &str) -> Result<String, FetchError> {
        let url = self.check_endpoint(uri)?;

        info!(jwks_uri = %uri, "Fetching JWKS from endpoint");

        let response = self.client.get(url).send().await.map_err(|e| {
            error!(jwks_uri = %uri, error = %e, "Failed to fetch JWKS");
            FetchError::Http(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            error!(jwks_uri = %uri, status = %status, "JWKS endpoint returned error status");
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| {
            error!(jwks_uri = %uri, error = %e, "Failed to read JWKS body");
            FetchError::Http(e.to_string())
        })?;

        debug!(jwks_uri = %uri, bytes = body.len(), "Fetched JWKS document");
        Ok(body)
    }
}

/// Cached JWKS document with metadata
#[derive(Debug, Clone)]
struct CachedDocument {
    document: String,
    cached_at: SystemTime,
}

impl CachedDocument {
    fn is_valid(&self, ttl: Duration) -> bool {
        is_younger_than(self.cached_at, ttl)
    }
}

fn is_younger_than(at: SystemTime, age: Duration) -> bool {
    match SystemTime::now().duration_since(at) {
        Ok(elapsed) => elapsed < age,
        // Clock went backwards
        Err(_) => false,
    }
}

/// TTL cache of raw JWKS documents, keyed by endpoint
///
/// Only successful fetches are cached. Key sets are still parsed fresh for
/// each verification attempt.
///
/// [`refresh`](JwksFetcher::refresh) bypasses the TTL for key rotation, but
/// is rate limited per endpoint: no refetch happens while the cached
/// document, or the last refresh attempt, is younger than the minimum
/// refresh interval.
#[derive(Debug)]
pub struct CachedJwksFetcher<F> {
    inner: F,
    ttl: Duration,
    min_refresh_interval: Duration,
    cache: RwLock<HashMap<String, CachedDocument>>,
    refresh_attempts: RwLock<HashMap<String, SystemTime>>,
}

impl<F: JwksFetcher> CachedJwksFetcher<F> {
    /// Cache documents from `inner` for `ttl`
    pub fn new(inner: F, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            cache: RwLock::new(HashMap::new()),
            refresh_attempts: RwLock::new(HashMap::new()),
        }
    }

    /// Set the minimum time between refreshes of one endpoint
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Cache time-to-live
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Minimum time between refreshes of one endpoint
    pub fn min_refresh_interval(&self) -> Duration {
        self.min_refresh_interval
    }

    /// Drop the cached document for `uri`
    pub async fn invalidate(&self, uri: &str) {
        self.cache.write().await.remove(uri);
        self.refresh_attempts.write().await.remove(uri);
        debug!(jwks_uri = %uri, "JWKS cache entry invalidated");
    }

    /// Drop every cached document
    pub async fn clear(&self) {
        self.cache.write().await.clear();
        self.refresh_attempts.write().await.clear();
        debug!("JWKS cache cleared");
    }

    async fn fetch_and_cache(&self, uri: &str) -> Result<String, FetchError> {
        let document = self.inner.fetch(uri).await?;

        self.cache.write().await.insert(
            uri.to_string(),
            CachedDocument {
                document: document.clone(),
                cached_at: SystemTime::now(),
            },
        );

        Ok(document)
    }
}

#[async_trait]
impl<F: JwksFetcher> JwksFetcher for CachedJwksFetcher<F> {
    async fn fetch(&self, uri: &str) -> Result<String, FetchError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(uri)
                && cached.is_valid(self.ttl)
            {
                debug!(jwks_uri = %uri, "Using cached JWKS");
                return Ok(cached.document.clone());
            }
        }

        self.fetch_and_cache(uri).await
    }

    async fn refresh(&self, uri: &str) -> Result<Option<String>, FetchError> {
        let cached_at = self.cache.read().await.get(uri).map(|c| c.cached_at);
        {
            let mut attempts = self.refresh_attempts.write().await;
            let last = attempts.get(uri).copied().max(cached_at);
            if let Some(last) = last
                && is_younger_than(last, self.min_refresh_interval)
            {
                warn!(jwks_uri = %uri, "JWKS refresh rate limited, using cache");
                return Ok(None);
            }
            attempts.insert(uri.to_string(), SystemTime::now());
        }

        info!(jwks_uri = %uri, "Refreshing cached JWKS");
        self.fetch_and_cache(uri).await.map(Some)
    }
}
