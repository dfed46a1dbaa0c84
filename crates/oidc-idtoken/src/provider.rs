//! Configuration-driven OpenID Connect provider
//!
//! [`OidcProvider`] ties the pieces together for one identity provider:
//!
//! 1. Discovery of the provider endpoints
//! 2. Authorization URL with PKCE (`S256`), `state` and `nonce`
//! 3. Code and refresh-token grants against the token endpoint
//!    (`client_secret_post`)
//! 4. Verification of the returned ID token through [`IdTokenVerifier`]
//!
//! The PKCE code verifier is generated and stored by the caller, keyed by the
//! returned `state`, until the authorization code comes back.

use std::sync::Arc;

use http::header::ACCEPT;
use secrecy::ExposeSecret;
use tracing::{debug, error, info};
use url::Url;

use crate::config::ProviderConfig;
use crate::discovery::{DiscoveryDocument, DiscoveryFetcher};
use crate::error::{Error, Result};
use crate::jwks::{CachedJwksFetcher, HttpJwksFetcher, JwksFetcher};
use crate::jwt::ValidationContext;
use crate::pkce;
use crate::types::{TokenExchangeResponse, VerifiedIdentity};
use crate::verifier::IdTokenVerifier;

/// Parameters computed by the provider; callers cannot override them
const RESERVED_PARAMS: [&str; 8] = [
    "client_id",
    "redirect_uri",
    "response_type",
    "scope",
    "state",
    "code_challenge",
    "code_challenge_method",
    "nonce",
];

/// Inputs for one authorization request
///
/// # Example
///
/// ```rust
/// use oidc_idtoken::AuthorizationRequest;
///
/// let request = AuthorizationRequest::new("MVLkNAsW0uy5PnH3L3YwUzXqcPzMfNeKPIfD4K32MN4")
///     .with_scopes(["openid", "offline_access"])
///     .with_response_type("code id_token")
///     .with_response_mode("fragment")
///     .with_param("merchant_vat", "DK12345678");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    code_verifier: String,
    scopes: Option<Vec<String>>,
    response_type: String,
    response_mode: Option<String>,
    state: Option<String>,
    nonce: Option<String>,
    extra_params: Vec<(String, String)>,
}

impl AuthorizationRequest {
    /// Request for the PKCE `code_verifier` held by the caller
    pub fn new(code_verifier: impl Into<String>) -> Self {
        Self {
            code_verifier: code_verifier.into(),
            scopes: None,
            response_type: "code".to_string(),
            response_mode: None,
            state: None,
            nonce: None,
            extra_params: Vec::new(),
        }
    }

    /// Request these scopes instead of the configured defaults
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = Some(scopes.into_iter().map(Into::into).collect());
        self
    }

    /// `response_type` (default `code`)
    pub fn with_response_type(mut self, response_type: impl Into<String>) -> Self {
        self.response_type = response_type.into();
        self
    }

    /// `response_mode`, e.g. `fragment`
    pub fn with_response_mode(mut self, response_mode: impl Into<String>) -> Self {
        self.response_mode = Some(response_mode.into());
        self
    }

    /// Use this `state` instead of a random one
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Use this `nonce` instead of a random one
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Additional provider-specific query parameter
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.push((name.into(), value.into()));
        self
    }
}

/// Authorization URL plus the values the caller must keep for the callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationUrl {
    /// URL to redirect the user agent to
    pub url: Url,
    /// `state` sent with the request
    pub state: String,
    /// `nonce` sent with the request
    pub nonce: String,
}

/// OpenID Connect provider for one client registration
#[derive(Debug, Clone)]
pub struct OidcProvider {
    config: ProviderConfig,
    discovery: DiscoveryDocument,
    http_client: reqwest::Client,
    verifier: IdTokenVerifier,
}

impl OidcProvider {
    /// Validate `config`, fetch the discovery document and build the provider
    ///
    /// # Errors
    ///
    /// - [`Error::RequiredOptionMissing`] / [`Error::InvalidOption`] for a
    ///   bad configuration
    /// - [`Error::DiscoveryUnavailable`] if the discovery document cannot be
    ///   fetched or is incomplete
    pub async fn discover(config: ProviderConfig) -> Result<Self> {
        config.validate()?;
        let http_client = build_http_client(&config)?;

        let discovery = DiscoveryFetcher::with_client(http_client.clone())
            .fetch(&config.discovery_uri)
            .await?;

        Self::assemble(config, discovery, http_client)
    }

    /// Build the provider from an already known discovery document
    ///
    /// # Errors
    ///
    /// Configuration errors as for [`discover`](Self::discover), and
    /// [`Error::DiscoveryUnavailable`] if the document is incomplete.
    pub fn from_discovery(config: ProviderConfig, discovery: DiscoveryDocument) -> Result<Self> {
        config.validate()?;
        discovery
            .validate()
            .map_err(|e| Error::DiscoveryUnavailable {
                url: config.discovery_uri.clone(),
                reason: e.to_string(),
            })?;
        let http_client = build_http_client(&config)?;

        Self::assemble(config, discovery, http_client)
    }

    fn assemble(
        config: ProviderConfig,
        discovery: DiscoveryDocument,
        http_client: reqwest::Client,
    ) -> Result<Self> {
        let http_fetcher = HttpJwksFetcher::with_client(http_client.clone());
        let fetcher: Arc<dyn JwksFetcher> = match config.jwks_cache_ttl() {
            Some(ttl) => Arc::new(CachedJwksFetcher::new(http_fetcher, ttl)),
            None => Arc::new(http_fetcher),
        };
        let verifier = IdTokenVerifier::new(discovery.jwks_uri.clone(), fetcher);

        info!(
            issuer = %discovery.issuer,
            client_id = %config.client_id,
            jwks_uri = %discovery.jwks_uri,
            "OpenID Connect provider configured"
        );

        Ok(Self {
            config,
            discovery,
            http_client,
            verifier,
        })
    }

    /// Replace the JWKS source
    pub fn with_jwks_fetcher(mut self, fetcher: Arc<dyn JwksFetcher>) -> Self {
        self.verifier = IdTokenVerifier::new(self.discovery.jwks_uri.clone(), fetcher);
        self
    }

    /// Provider configuration
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Discovered provider metadata
    pub fn discovery(&self) -> &DiscoveryDocument {
        &self.discovery
    }

    /// ID token verifier for the discovered JWKS endpoint
    pub fn verifier(&self) -> &IdTokenVerifier {
        &self.verifier
    }

    /// Build the authorization URL
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] if the code verifier is empty, an
    /// extra parameter collides with a computed one, or the discovered
    /// authorization endpoint is not a URL.
    pub fn authorization_url(&self, request: &AuthorizationRequest) -> Result<AuthorizationUrl> {
        if request.code_verifier.is_empty() {
            return Err(Error::InvalidOption {
                name: "codeVerifier".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if let Some((name, _)) = request
            .extra_params
            .iter()
            .find(|(name, _)| RESERVED_PARAMS.contains(&name.as_str()))
        {
            return Err(Error::InvalidOption {
                name: name.clone(),
                reason: "parameter is computed by the provider".to_string(),
            });
        }

        let mut url =
            Url::parse(&self.discovery.authorization_endpoint).map_err(|e| Error::InvalidOption {
                name: "authorization_endpoint".to_string(),
                reason: format!("invalid URL: {e}"),
            })?;

        let state = request.state.clone().unwrap_or_else(pkce::random_token);
        let nonce = request.nonce.clone().unwrap_or_else(pkce::random_token);
        let scope = request
            .scopes
            .as_ref()
            .unwrap_or(&self.config.scopes)
            .join(" ");

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.config.client_id)
                .append_pair("redirect_uri", &self.config.redirect_uri)
                .append_pair("response_type", &request.response_type)
                .append_pair("scope", &scope)
                .append_pair("state", &state)
                .append_pair(
                    "code_challenge",
                    &pkce::code_challenge(&request.code_verifier),
                )
                .append_pair("code_challenge_method", pkce::CODE_CHALLENGE_METHOD)
                .append_pair("nonce", &nonce);
            if let Some(mode) = &request.response_mode {
                query.append_pair("response_mode", mode);
            }
            for (name, value) in &request.extra_params {
                query.append_pair(name, value);
            }
        }

        debug!(authorization_endpoint = %self.discovery.authorization_endpoint, "Built authorization URL");
        Ok(AuthorizationUrl { url, state, nonce })
    }

    /// Redeem an authorization code and verify the returned ID token
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] if the token endpoint is unreachable, otherwise
    /// any verification error (see [`IdTokenVerifier::verify`]).
    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<VerifiedIdentity> {
        let response = self.request_code_grant(code, code_verifier).await?;
        self.verifier
            .verify(&response, &self.validation_context(None))
            .await
    }

    /// Like [`exchange_code`](Self::exchange_code), also requiring the ID
    /// token `nonce` to equal the one sent with the authorization request
    ///
    /// # Errors
    ///
    /// As for [`exchange_code`](Self::exchange_code).
    pub async fn exchange_code_with_nonce(
        &self,
        code: &str,
        code_verifier: &str,
        nonce: &str,
    ) -> Result<VerifiedIdentity> {
        let response = self.request_code_grant(code, code_verifier).await?;
        self.verifier
            .verify(&response, &self.validation_context(Some(nonce)))
            .await
    }

    /// Run the refresh-token grant and verify the returned ID token
    ///
    /// # Errors
    ///
    /// As for [`exchange_code`](Self::exchange_code).
    pub async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<VerifiedIdentity> {
        let response = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await?;
        self.verifier
            .verify(&response, &self.validation_context(None))
            .await
    }

    /// Verify a token response obtained by other means
    ///
    /// # Errors
    ///
    /// Any verification error (see [`IdTokenVerifier::verify`]).
    pub async fn verify_token_response(
        &self,
        response: &TokenExchangeResponse,
    ) -> Result<VerifiedIdentity> {
        self.verifier
            .verify(response, &self.validation_context(None))
            .await
    }

    /// Validation context for an attempt starting now
    pub fn validation_context(&self, nonce: Option<&str>) -> ValidationContext {
        let context = ValidationContext::new(&self.discovery.issuer, &self.config.client_id)
            .with_leeway(self.config.leeway())
            .with_time_claim_policy(self.config.time_claims);
        match nonce {
            Some(nonce) => context.with_nonce(nonce),
            None => context,
        }
    }

    async fn request_code_grant(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenExchangeResponse> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code_verifier", code_verifier),
        ])
        .await
    }

    /// POST a grant to the token endpoint with client_secret_post
    async fn token_request(&self, grant: &[(&str, &str)]) -> Result<TokenExchangeResponse> {
        let mut form: Vec<(&str, &str)> = grant.to_vec();
        form.push(("client_id", self.config.client_id.as_str()));
        form.push(("client_secret", self.config.client_secret.expose_secret().as_str()));

        let grant_type = grant
            .iter()
            .find(|(name, _)| *name == "grant_type")
            .map_or("", |(_, value)| *value);
        info!(
            token_endpoint = %self.discovery.token_endpoint,
            grant_type,
            "Requesting tokens"
        );

        let response = self
            .http_client
            .post(&self.discovery.token_endpoint)
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!(token_endpoint = %self.discovery.token_endpoint, error = %e, "Token request failed");
                Error::Transport(e.to_string())
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            error!(token_endpoint = %self.discovery.token_endpoint, error = %e, "Failed to read token response");
            Error::Transport(e.to_string())
        })?;

        debug!(status = %status, bytes = body.len(), "Token endpoint responded");
        Ok(TokenExchangeResponse::from_bytes(status, &body))
    }
}

fn build_http_client(config: &ProviderConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.http_timeout())
        // A redirect could leave HTTPS after the endpoint check
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| Error::InvalidOption {
            name: "httpTimeoutSecs".to_string(),
            reason: format!("failed to build HTTP client: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn config() -> ProviderConfig {
        ProviderConfig::new(
            "mock_client_id",
            "mock_secret",
            "https://idp.example.com/.well-known/openid-configuration",
            "https://app.example.com/callback",
        )
    }

    fn discovery() -> DiscoveryDocument {
        DiscoveryDocument {
            issuer: "https://idp.example.com".to_string(),
            authorization_endpoint: "https://idp.example.com/authorize".to_string(),
            token_endpoint: "https://idp.example.com/token".to_string(),
            jwks_uri: "https://idp.example.com/jwks".to_string(),
            additional: HashMap::new(),
        }
    }

    fn provider() -> OidcProvider {
        OidcProvider::from_discovery(config(), discovery()).unwrap()
    }

    fn query(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn test_authorization_url_parameters() {
        let verifier = "MVLkNAsW0uy5PnH3L3YwUzXqcPzMfNeKPIfD4K32MN4";
        let auth = provider()
            .authorization_url(
                &AuthorizationRequest::new(verifier)
                    .with_scopes(["openid", "subscriptions", "offline_access"])
                    .with_response_type("code id_token")
                    .with_response_mode("fragment")
                    .with_param("merchant_vat", "DK12345678"),
            )
            .unwrap();

        assert!(auth.url.as_str().starts_with("https://idp.example.com/authorize?"));
        let q = query(&auth.url);
        assert_eq!(q["client_id"], "mock_client_id");
        assert_eq!(q["redirect_uri"], "https://app.example.com/callback");
        assert_eq!(q["response_type"], "code id_token");
        assert_eq!(q["response_mode"], "fragment");
        assert_eq!(q["scope"], "openid subscriptions offline_access");
        assert_eq!(q["code_challenge_method"], "S256");
        assert_eq!(q["code_challenge"], pkce::code_challenge(verifier));
        assert_eq!(q["merchant_vat"], "DK12345678");
        assert_eq!(q["state"], auth.state);
        assert_eq!(q["nonce"], auth.nonce);
        assert!(!q.contains_key("approval_prompt"));
        assert!(!q.contains_key("code_verifier"));
    }

    #[test]
    fn test_default_scope_is_present_and_empty() {
        let auth = provider()
            .authorization_url(&AuthorizationRequest::new("mock_code_verifier"))
            .unwrap();
        let q = query(&auth.url);
        assert_eq!(q["scope"], "");
        assert_eq!(q["response_type"], "code");
        assert!(!q.contains_key("response_mode"));
    }

    #[test]
    fn test_configured_scopes_are_space_separated() {
        let mut config = config();
        config.scopes = vec!["openid".into(), "profile".into()];
        let provider = OidcProvider::from_discovery(config, discovery()).unwrap();

        let auth = provider
            .authorization_url(&AuthorizationRequest::new("v"))
            .unwrap();
        assert_eq!(query(&auth.url)["scope"], "openid profile");
    }

    #[test]
    fn test_state_and_nonce_are_random_unless_given() {
        let provider = provider();
        let a = provider
            .authorization_url(&AuthorizationRequest::new("v"))
            .unwrap();
        let b = provider
            .authorization_url(&AuthorizationRequest::new("v"))
            .unwrap();
        assert_ne!(a.state, b.state);
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.state, a.nonce);

        let fixed = provider
            .authorization_url(
                &AuthorizationRequest::new("v")
                    .with_state("s-1")
                    .with_nonce("n-1"),
            )
            .unwrap();
        assert_eq!(fixed.state, "s-1");
        assert_eq!(fixed.nonce, "n-1");
    }

    #[test]
    fn test_reserved_extra_params_rejected() {
        let err = provider()
            .authorization_url(&AuthorizationRequest::new("v").with_param("nonce", "x"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOption { name, .. } if name == "nonce"));
    }

    #[test]
    fn test_empty_code_verifier_rejected() {
        assert!(matches!(
            provider().authorization_url(&AuthorizationRequest::new("")),
            Err(Error::InvalidOption { .. })
        ));
    }

    #[test]
    fn test_from_discovery_rejects_incomplete_document() {
        let mut doc = discovery();
        doc.jwks_uri = String::new();
        assert!(matches!(
            OidcProvider::from_discovery(config(), doc),
            Err(Error::DiscoveryUnavailable { .. })
        ));
    }

    #[test]
    fn test_from_discovery_validates_config() {
        let mut config = config();
        config.client_id = String::new();
        assert!(matches!(
            OidcProvider::from_discovery(config, discovery()),
            Err(Error::RequiredOptionMissing(names)) if names == vec!["clientId".to_string()]
        ));
    }

    #[test]
    fn test_validation_context_uses_discovery_and_config() {
        let mut config = config();
        config.leeway_secs = 90;
        let provider = OidcProvider::from_discovery(config, discovery()).unwrap();

        let ctx = provider.validation_context(Some("n-1"));
        assert_eq!(ctx.expected_issuer(), "https://idp.example.com");
        assert_eq!(ctx.expected_audience(), "mock_client_id");
        assert_eq!(ctx.leeway().as_secs(), 90);
        assert_eq!(ctx.expected_nonce(), Some("n-1"));
        assert_eq!(provider.verifier().jwks_uri(), "https://idp.example.com/jwks");
    }
}
