//! Provider configuration
//!
//! [`ProviderConfig`] deserialises from camelCase option names
//! (`clientId`, `clientSecret`, `discoveryUri`, `redirectUri`, ...), either
//! from any serde source or from a loose option map via
//! [`ProviderConfig::from_options`].

use std::collections::HashMap;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::jwt::TimeClaimPolicy;

/// Upper bound for the clock leeway
pub const MAX_LEEWAY_SECS: u64 = 300;

/// Options that must be present and non-empty
pub const REQUIRED_OPTIONS: [&str; 4] = ["clientId", "clientSecret", "discoveryUri", "redirectUri"];

/// OpenID Connect provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Client ID; also the expected ID token audience
    pub client_id: String,
    /// Client secret (stored securely with automatic zeroization on drop)
    #[serde(
        serialize_with = "serialize_secret",
        deserialize_with = "deserialize_secret"
    )]
    pub client_secret: SecretString,
    /// URL of the OpenID configuration document
    pub discovery_uri: String,
    /// Redirect URI registered with the provider
    pub redirect_uri: String,
    /// Default scopes, joined with a single space
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Clock leeway for `exp` / `nbf`, in seconds
    #[serde(default = "default_leeway_secs")]
    pub leeway_secs: u64,
    /// Treatment of ID tokens without `exp` / `nbf`
    #[serde(default)]
    pub time_claims: TimeClaimPolicy,
    /// Cache JWKS documents for this many seconds (no caching when unset)
    #[serde(default)]
    pub jwks_cache_ttl_secs: Option<u64>,
    /// Timeout for discovery, JWKS and token requests, in seconds
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

// Custom serialization for SecretString
fn serialize_secret<S>(secret: &SecretString, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(secret.expose_secret())
}

// Custom deserialization for SecretString
fn deserialize_secret<'de, D>(deserializer: D) -> std::result::Result<SecretString, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = serde::Deserialize::deserialize(deserializer)?;
    Ok(SecretString::new(s))
}

fn default_leeway_secs() -> u64 {
    30
}

fn default_http_timeout_secs() -> u64 {
    10
}

impl ProviderConfig {
    /// Configuration with defaults for every optional setting
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        discovery_uri: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
            discovery_uri: discovery_uri.into(),
            redirect_uri: redirect_uri.into(),
            scopes: Vec::new(),
            leeway_secs: default_leeway_secs(),
            time_claims: TimeClaimPolicy::default(),
            jwks_cache_ttl_secs: None,
            http_timeout_secs: default_http_timeout_secs(),
        }
    }

    /// Build from a loose option map
    ///
    /// # Errors
    ///
    /// - [`Error::RequiredOptionMissing`] naming every required option that
    ///   is absent, null or empty
    /// - [`Error::InvalidOption`] if an option has the wrong type or fails
    ///   [`validate`](Self::validate)
    ///
    /// # Example
    ///
    /// ```rust
    /// use oidc_idtoken::ProviderConfig;
    /// use serde_json::json;
    ///
    /// let options = json!({
    ///     "clientId": "client-1",
    ///     "clientSecret": "s3cret",
    ///     "discoveryUri": "https://idp.example.com/.well-known/openid-configuration",
    ///     "redirectUri": "https://app.example.com/callback",
    ///     "leewaySecs": 60
    /// });
    /// let options = options.as_object().unwrap().clone().into_iter().collect();
    ///
    /// let config = ProviderConfig::from_options(options)?;
    /// assert_eq!(config.leeway().as_secs(), 60);
    /// # Ok::<(), oidc_idtoken::Error>(())
    /// ```
    pub fn from_options(options: HashMap<String, serde_json::Value>) -> Result<Self> {
        let missing: Vec<String> = REQUIRED_OPTIONS
            .iter()
            .filter(|name| is_blank(options.get(**name)))
            .map(|name| (*name).to_string())
            .collect();
        if !missing.is_empty() {
            return Err(Error::RequiredOptionMissing(missing));
        }

        let object: serde_json::Map<String, serde_json::Value> = options.into_iter().collect();
        let config: Self =
            serde_json::from_value(serde_json::Value::Object(object)).map_err(|e| {
                Error::InvalidOption {
                    name: "options".to_string(),
                    reason: e.to_string(),
                }
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration
    ///
    /// # Errors
    ///
    /// - [`Error::RequiredOptionMissing`] for empty required values
    /// - [`Error::InvalidOption`] for unparsable URLs, a leeway above
    ///   [`MAX_LEEWAY_SECS`] or a zero timeout
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<String> = [
            ("clientId", self.client_id.as_str()),
            ("clientSecret", self.client_secret.expose_secret().as_str()),
            ("discoveryUri", self.discovery_uri.as_str()),
            ("redirectUri", self.redirect_uri.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name.to_string())
        .collect();
        if !missing.is_empty() {
            return Err(Error::RequiredOptionMissing(missing));
        }

        for (name, value) in [
            ("discoveryUri", &self.discovery_uri),
            ("redirectUri", &self.redirect_uri),
        ] {
            Url::parse(value).map_err(|e| Error::InvalidOption {
                name: name.to_string(),
                reason: format!("invalid URL: {e}"),
            })?;
        }

        if self.leeway_secs > MAX_LEEWAY_SECS {
            return Err(Error::InvalidOption {
                name: "leewaySecs".to_string(),
                reason: format!("must not exceed {MAX_LEEWAY_SECS} seconds"),
            });
        }

        if self.http_timeout_secs == 0 {
            return Err(Error::InvalidOption {
                name: "httpTimeoutSecs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Clock leeway
    pub fn leeway(&self) -> Duration {
        Duration::from_secs(self.leeway_secs)
    }

    /// HTTP request timeout
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// JWKS cache TTL, when caching is enabled
    pub fn jwks_cache_ttl(&self) -> Option<Duration> {
        self.jwks_cache_ttl_secs.map(Duration::from_secs)
    }
}

fn is_blank(value: Option<&serde_json::Value>) -> bool {
    match value {
        None | Some(serde_json::Value::Null) => true,
        Some(serde_json::Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}
