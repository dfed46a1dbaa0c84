//! Common test utilities for integration tests
//!
//! A wiremock identity provider (discovery, token and JWKS endpoints) plus
//! RSA key pairs and ID token minting.

#![allow(dead_code)]

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use oidc_idtoken::ProviderConfig;
use oidc_idtoken::jwk::Jwk;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub const CLIENT_ID: &str = "mock_client_id";
pub const CLIENT_SECRET: &str = "mock_client_secret";
pub const REDIRECT_URI: &str = "https://app.example.com/callback";
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Key the provider signs with
pub static SIGNING_KEY: LazyLock<RsaPrivateKey> = LazyLock::new(|| {
    RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("Failed to generate RSA key")
});

/// Unrelated key, for forged tokens
pub static ATTACKER_KEY: LazyLock<RsaPrivateKey> = LazyLock::new(|| {
    RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("Failed to generate RSA key")
});

/// Mock OpenID Connect identity provider
pub struct MockIdentityProvider {
    pub server: MockServer,
    pub issuer: String,
    pub discovery_uri: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
}

impl MockIdentityProvider {
    /// Start the server; no endpoints are mounted yet
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let base_url = server.uri();

        Self {
            issuer: base_url.clone(),
            discovery_uri: format!("{base_url}{DISCOVERY_PATH}"),
            authorization_endpoint: format!("{base_url}/authorize"),
            token_endpoint: format!("{base_url}/token"),
            jwks_uri: format!("{base_url}/jwks"),
            server,
        }
    }

    /// Provider configuration pointing at this server
    pub fn config(&self) -> ProviderConfig {
        ProviderConfig::new(CLIENT_ID, CLIENT_SECRET, &self.discovery_uri, REDIRECT_URI)
    }

    pub fn discovery_document(&self) -> serde_json::Value {
        json!({
            "issuer": self.issuer,
            "authorization_endpoint": self.authorization_endpoint,
            "token_endpoint": self.token_endpoint,
            "jwks_uri": self.jwks_uri,
            "response_types_supported": ["code", "code id_token"],
            "code_challenge_methods_supported": ["S256"]
        })
    }

    /// Mount the discovery document
    pub async fn mock_discovery(&self) {
        Mock::given(method("GET"))
            .and(path(DISCOVERY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(self.discovery_document()))
            .mount(&self.server)
            .await;
    }

    /// Mount a JWKS endpoint publishing the signing key under `kid`
    pub async fn mock_jwks(&self, kid: &str) {
        self.mock_jwks_document(json!({ "keys": [rsa_jwk(kid, &SIGNING_KEY)] }))
            .await;
    }

    /// Mount a JWKS endpoint serving `document` verbatim
    pub async fn mock_jwks_document(&self, document: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(document))
            .mount(&self.server)
            .await;
    }

    /// Mount a successful token response carrying `id_token`
    pub async fn mock_token_success(&self, id_token: &str, refresh_token: Option<&str>) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body(id_token, refresh_token)))
            .mount(&self.server)
            .await;
    }

    /// Mount a token endpoint error response
    pub async fn mock_token_error(&self, status: u16, error: &str, description: &str) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "error": error,
                "error_description": description,
            })))
            .mount(&self.server)
            .await;
    }

    /// Requests received for `path`
    pub async fn requests_to(&self, request_path: &str) -> Vec<wiremock::Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.url.path() == request_path)
            .collect()
    }

    /// Claims this provider would issue for `sub`
    pub fn claims(&self, sub: &str) -> serde_json::Value {
        let now = current_timestamp();
        json!({
            "iss": self.issuer,
            "sub": sub,
            "aud": CLIENT_ID,
            "exp": now + 600,
            "iat": now,
            "nbf": now,
        })
    }
}

/// Successful token response body
pub fn token_body(id_token: &str, refresh_token: Option<&str>) -> serde_json::Value {
    let mut body = json!({
        "access_token": "mock_access_token",
        "token_type": "Bearer",
        "expires_in": 3600,
        "scope": "openid",
        "id_token": id_token,
    });
    if let Some(refresh) = refresh_token {
        body["refresh_token"] = json!(refresh);
    }
    body
}

/// JWKS entry for the public half of `key`
pub fn rsa_jwk(kid: &str, key: &RsaPrivateKey) -> serde_json::Value {
    let jwk = Jwk::from_public_key(kid, &key.to_public_key());
    json!({
        "kty": "RSA",
        "use": "sig",
        "alg": "RS256",
        "kid": kid,
        "n": jwk.encoded_modulus(),
        "e": jwk.encoded_exponent(),
    })
}

/// Compact RS256 JWS with the given header and claims
pub fn mint_token(
    key: &RsaPrivateKey,
    header: &serde_json::Value,
    claims: &serde_json::Value,
) -> String {
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    );
    let digest = Sha256::digest(signing_input.as_bytes());
    let signature = key
        .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
        .expect("Failed to sign test token");
    format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature))
}

/// ID token signed by the provider key under `kid`
pub fn signed_id_token(kid: &str, claims: &serde_json::Value) -> String {
    mint_token(
        &SIGNING_KEY,
        &json!({"alg": "RS256", "typ": "JWT", "kid": kid}),
        claims,
    )
}

/// Get current Unix timestamp
pub fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs() as i64
}
