//! OpenID Connect discovery document

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use url::Url;

/// Discovery document validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    /// A required field is empty
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A field is present but unusable
    #[error("Invalid field value for {field}: {reason}")]
    InvalidField {
        /// Field name
        field: &'static str,
        /// What was wrong
        reason: String,
    },
}

/// OpenID provider configuration (`/.well-known/openid-configuration`)
///
/// Only the members the authorization-code flow needs are typed; all other
/// members are retained in `additional`.
///
/// ## Example
///
/// ```json
/// {
///   "issuer": "https://idp.example.com",
///   "authorization_endpoint": "https://idp.example.com/authorize",
///   "token_endpoint": "https://idp.example.com/token",
///   "jwks_uri": "https://idp.example.com/jwks",
///   "response_types_supported": ["code"]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    /// Issuer identifier; the expected `iss` of every ID token
    pub issuer: String,

    /// Authorization endpoint URL
    pub authorization_endpoint: String,

    /// Token endpoint URL
    pub token_endpoint: String,

    /// JWK Set document URL
    pub jwks_uri: String,

    /// All other provider metadata
    #[serde(flatten)]
    pub additional: HashMap<String, serde_json::Value>,
}

impl DiscoveryDocument {
    /// Check that the issuer is set and every endpoint is an absolute URL
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] for the first unusable field.
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        if self.issuer.is_empty() {
            return Err(DiscoveryError::MissingField("issuer"));
        }

        for (field, value) in [
            ("authorization_endpoint", &self.authorization_endpoint),
            ("token_endpoint", &self.token_endpoint),
            ("jwks_uri", &self.jwks_uri),
        ] {
            if value.is_empty() {
                return Err(DiscoveryError::MissingField(field));
            }
            Url::parse(value).map_err(|e| DiscoveryError::InvalidField {
                field,
                reason: format!("Invalid URL: {e}"),
            })?;
        }

        Ok(())
    }

    /// PKCE methods advertised by the provider, if any
    pub fn code_challenge_methods(&self) -> Vec<&str> {
        self.additional
            .get("code_challenge_methods_supported")
            .and_then(serde_json::Value::as_array)
            .map(|methods| methods.iter().filter_map(serde_json::Value::as_str).collect())
            .unwrap_or_default()
    }
}
