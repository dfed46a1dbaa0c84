//! # oidc-idtoken - Verified OpenID Connect ID Tokens
//!
//! OpenID Connect Authorization Code flow with PKCE for backend applications,
//! with cryptographic verification of the returned ID token before any of its
//! claims are trusted.
//!
//! ## Key Features
//!
//! - **PKCE** - `S256` code challenges (RFC 7636)
//! - **Claim validation** - issuer, audience, `exp` / `nbf` with symmetric leeway, optional nonce
//! - **JWKS** - HTTPS key retrieval with an optional TTL cache
//! - **RS256** - RSA public keys rebuilt from JWK modulus and exponent
//! - **Provider** - discovery, authorization URL and token grants driven by one config
//!
//! ## Architecture
//!
//! - [`pkce`] - code challenge derivation, `state` / `nonce` generation
//! - [`jwk`] - RSA JSON Web Keys and key sets
//! - [`jwt`] - token decoding, claim validation, signature verification
//! - [`jwks`] - JWKS fetcher seam, HTTP and caching implementations
//! - [`discovery`] - OpenID configuration document
//! - [`verifier`] - the staged verification pipeline
//! - [`provider`] - configuration-driven provider
//! - [`config`] - provider configuration
//! - [`types`] - token responses and verified identities
//! - [`error`] - error types
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use oidc_idtoken::{AuthorizationRequest, OidcProvider, ProviderConfig, ResourceOwner};
//!
//! # async fn example() -> Result<(), oidc_idtoken::Error> {
//! let config = ProviderConfig::new(
//!     "client-id",
//!     "client-secret",
//!     "https://idp.example.com/.well-known/openid-configuration",
//!     "https://app.example.com/callback",
//! );
//! let provider = OidcProvider::discover(config).await?;
//!
//! // Redirect the user; keep the verifier and state for the callback
//! let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
//! let auth = provider.authorization_url(
//!     &AuthorizationRequest::new(verifier).with_scopes(["openid"]),
//! )?;
//! println!("redirect to {}", auth.url);
//!
//! // On the callback
//! let identity = provider.exchange_code("code-from-callback", verifier).await?;
//! let owner = ResourceOwner::from_identity(&identity);
//! println!("merchant {:?}", owner.id());
//! # Ok(())
//! # }
//! ```
//!
//! ## Standards
//!
//! - **RFC 7519** - JSON Web Token (JWT)
//! - **RFC 7517** - JSON Web Key (JWK)
//! - **RFC 7636** - Proof Key for Code Exchange (PKCE)
//! - **OpenID Connect Core 1.0 / Discovery 1.0**

pub mod config;
pub mod discovery;
pub mod error;
pub mod jwk;
pub mod jwks;
pub mod jwt;
pub mod pkce;
pub mod provider;
pub mod types;
pub mod verifier;

#[cfg(test)]
pub(crate) mod test_keys;

#[doc(inline)]
pub use config::ProviderConfig;

#[doc(inline)]
pub use error::{
    ClaimError, Error, FetchError, KeyError, Result, SignatureError, UnverifiableReason,
    VerificationStage,
};

#[doc(inline)]
pub use jwt::{IdTokenClaims, TimeClaimPolicy, ValidationContext};

#[doc(inline)]
pub use provider::{AuthorizationRequest, AuthorizationUrl, OidcProvider};

#[doc(inline)]
pub use types::{ResourceOwner, TokenExchangeResponse, TokenInfo, VerifiedIdentity};

#[doc(inline)]
pub use verifier::IdTokenVerifier;
