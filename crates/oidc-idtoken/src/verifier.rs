//! ID token verification pipeline
//!
//! One call to [`IdTokenVerifier::verify`] runs these stages in order and
//! stops at the first failure:
//!
//! | Stage | Failure |
//! |---|---|
//! | ResponseCheck | [`Error::IdentityProvider`] |
//! | ParseToken | [`Error::TokenFormat`] |
//! | ClaimCheck | [`Error::TokenInvalid`] |
//! | KeyResolution | [`Error::SignatureUnverifiable`] |
//! | SignatureCheck | [`Error::SignatureUnverifiable`] |
//!
//! Claims are checked before any key is fetched, so a token for the wrong
//! issuer or audience never causes a request to the JWKS endpoint. Nothing
//! is retried. When the key id is missing from the key set, the fetcher is
//! asked once for a newer document ([`JwksFetcher::refresh`]); only caching
//! fetchers return one.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Error, KeyError, Result, UnverifiableReason, VerificationStage};
use crate::jwk::KeySet;
use crate::jwks::JwksFetcher;
use crate::jwt::{DecodedToken, ValidationContext, signature};
use crate::types::{TokenExchangeResponse, TokenInfo, VerifiedIdentity};

/// Verifies ID tokens against the keys published at one JWKS endpoint
///
/// Cheap to clone and safe to share across tasks.
///
/// # Example
///
/// ```rust,no_run
/// use http::StatusCode;
/// use oidc_idtoken::jwks::HttpJwksFetcher;
/// use oidc_idtoken::jwt::ValidationContext;
/// use oidc_idtoken::types::TokenExchangeResponse;
/// use oidc_idtoken::IdTokenVerifier;
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let verifier = IdTokenVerifier::new(
///     "https://idp.example.com/jwks",
///     Arc::new(HttpJwksFetcher::new()?),
/// );
///
/// let response = TokenExchangeResponse::new(
///     StatusCode::OK,
///     serde_json::json!({"access_token": "...", "id_token": "..."}),
/// );
/// let context = ValidationContext::new("https://idp.example.com", "client-id");
///
/// let identity = verifier.verify(&response, &context).await?;
/// println!("verified subject {:?}", identity.subject());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Clone)]
pub struct IdTokenVerifier {
    jwks_uri: String,
    fetcher: Arc<dyn JwksFetcher>,
}

impl std::fmt::Debug for IdTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdTokenVerifier")
            .field("jwks_uri", &self.jwks_uri)
            .field("fetcher", &"<dyn JwksFetcher>")
            .finish()
    }
}

impl IdTokenVerifier {
    /// Verifier for keys published at `jwks_uri`
    pub fn new(jwks_uri: impl Into<String>, fetcher: Arc<dyn JwksFetcher>) -> Self {
        Self {
            jwks_uri: jwks_uri.into(),
            fetcher,
        }
    }

    /// JWKS endpoint
    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    /// Verify the ID token carried by a token-exchange response
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing stage; [`Error::stage`] tells
    /// which one.
    pub async fn verify(
        &self,
        response: &TokenExchangeResponse,
        context: &ValidationContext,
    ) -> Result<VerifiedIdentity> {
        let result = self.run(response, context).await;

        match &result {
            Ok(identity) => info!(
                subject = identity.subject().unwrap_or("<none>"),
                key_id = %identity.key_id,
                "ID token verified"
            ),
            Err(e) => warn!(
                stage = ?e.stage(),
                error = %e,
                "ID token rejected"
            ),
        }

        result
    }

    async fn run(
        &self,
        response: &TokenExchangeResponse,
        context: &ValidationContext,
    ) -> Result<VerifiedIdentity> {
        let body = response.check()?;
        debug!(stage = ?VerificationStage::ResponseCheck, "Token response accepted");

        let raw_token = body
            .id_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::TokenFormat("response carries no id_token".to_string()))?;
        let token = DecodedToken::parse(raw_token)?;
        debug!(
            stage = ?VerificationStage::ParseToken,
            algorithm = ?token.algorithm(),
            key_id = token.key_id().unwrap_or("<none>"),
            "ID token decoded"
        );

        context.validate(token.claims())?;
        debug!(stage = ?VerificationStage::ClaimCheck, "ID token claims accepted");

        let key_id = token
            .key_id()
            .ok_or(UnverifiableReason::MissingKeyId)?
            .to_string();
        let key_set = self.key_set_for(&key_id).await?;
        let jwk = key_set.find(&key_id)?;
        debug!(
            stage = ?VerificationStage::KeyResolution,
            jwks_uri = %self.jwks_uri,
            key_id = %key_id,
            key_count = key_set.len(),
            "Signing key resolved"
        );

        let public_key = jwk.to_public_key()?;
        let verified = signature::verify(
            token.signing_input(),
            token.signature(),
            &public_key,
            token.algorithm(),
        )?;
        if !verified {
            return Err(UnverifiableReason::Mismatch(key_id).into());
        }
        debug!(stage = ?VerificationStage::SignatureCheck, key_id = %key_id, "Signature verified");

        let algorithm = token.algorithm();
        Ok(VerifiedIdentity {
            claims: token.into_claims(),
            key_id,
            algorithm,
            token: TokenInfo {
                access_token: body.access_token,
                token_type: body.token_type.unwrap_or_else(|| "Bearer".to_string()),
                refresh_token: body.refresh_token,
                expires_in: body.expires_in,
                scope: body.scope,
                id_token: raw_token.to_string(),
            },
        })
    }

    /// Key set expected to carry `key_id`
    ///
    /// When the key is missing the fetcher may have served a document from
    /// before a key rotation, so it is asked once for something newer.
    async fn key_set_for(&self, key_id: &str) -> Result<KeySet> {
        let document = self.fetcher.fetch(&self.jwks_uri).await?;
        let key_set = KeySet::from_document(&document);
        let missing = match &key_set {
            Ok(keys) => matches!(keys.find(key_id), Err(KeyError::KeyNotFound(_))),
            Err(e) => *e == KeyError::NoKeysAvailable,
        };
        if !missing {
            return Ok(key_set?);
        }

        match self.fetcher.refresh(&self.jwks_uri).await? {
            Some(document) => {
                debug!(jwks_uri = %self.jwks_uri, key_id, "Key id not in cached JWKS, refreshed");
                Ok(KeySet::from_document(&document)?)
            }
            None => Ok(key_set?),
        }
    }
}
