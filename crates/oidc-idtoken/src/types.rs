//! Token exchange and verified identity types

use http::StatusCode;
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::jwt::IdTokenClaims;

/// Raw result of a token-endpoint call: HTTP status plus parsed body
///
/// This is the input of the verification pipeline. It is built by the
/// provider after a code or refresh-token grant, or by callers that perform
/// the exchange themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenExchangeResponse {
    status: StatusCode,
    body: serde_json::Value,
}

impl TokenExchangeResponse {
    /// Wrap an already parsed body
    pub fn new(status: StatusCode, body: serde_json::Value) -> Self {
        Self { status, body }
    }

    /// Parse a raw body; anything that is not JSON is kept as a string
    pub fn from_bytes(status: StatusCode, body: &[u8]) -> Self {
        let body = serde_json::from_slice(body).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(body).into_owned())
        });
        Self { status, body }
    }

    /// HTTP status of the token response
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Parsed response body
    pub fn body(&self) -> &serde_json::Value {
        &self.body
    }

    /// Accept only a 200 response carrying an access token and no `error`
    ///
    /// # Errors
    ///
    /// Returns [`Error::IdentityProvider`] with the status, the provider's
    /// error message when it sent one, and the body.
    pub fn check(&self) -> Result<TokenResponseBody> {
        let rejected = |message: String| Error::IdentityProvider {
            status: self.status.as_u16(),
            message,
            body: self.body.clone(),
        };

        if let Some(message) = self.provider_error() {
            return Err(rejected(message));
        }
        if self.status != StatusCode::OK {
            return Err(rejected(format!("unexpected status {}", self.status)));
        }

        if !self.body.is_object() {
            return Err(rejected("token response is not a JSON object".to_string()));
        }
        let body: TokenResponseBody = serde_json::from_value(self.body.clone())
            .map_err(|e| rejected(format!("invalid token response: {e}")))?;
        if body.access_token.is_empty() {
            return Err(rejected("response carries no access token".to_string()));
        }

        Ok(body)
    }

    /// `error` / `error_description` from the body
    fn provider_error(&self) -> Option<String> {
        let error = self.body.get("error").filter(|e| !e.is_null())?;
        let code = error.as_str().map_or_else(|| error.to_string(), str::to_string);
        match self.body.get("error_description").and_then(|d| d.as_str()) {
            Some(description) => Some(format!("{code}: {description}")),
            None => Some(code),
        }
    }
}

/// Successful token endpoint response body
///
/// Only `access_token` is checked by the pipeline. The other members are
/// read leniently: a member with an unexpected type is treated as absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponseBody {
    /// Access token
    #[serde(default, deserialize_with = "lenient_string")]
    pub access_token: String,
    /// Token type (Bearer, etc.)
    #[serde(default, deserialize_with = "lenient_optional_string")]
    pub token_type: Option<String>,
    /// Token expiry in seconds; numeric strings are accepted
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub expires_in: Option<u64>,
    /// Refresh token
    #[serde(default, deserialize_with = "lenient_optional_string")]
    pub refresh_token: Option<String>,
    /// Granted scope; an array of scopes is joined with spaces
    #[serde(default, deserialize_with = "lenient_scope")]
    pub scope: Option<String>,
    /// Compact serialized ID token
    #[serde(default, deserialize_with = "lenient_optional_string")]
    pub id_token: Option<String>,
    /// Other members
    #[serde(flatten)]
    pub additional: HashMap<String, serde_json::Value>,
}

fn lenient_optional_string<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_str().map(str::to_string))
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_optional_string(deserializer)?.unwrap_or_default())
}

fn lenient_seconds<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(number) => number
            .as_u64()
            .or_else(|| {
                number
                    .as_f64()
                    .filter(|s| s.is_finite() && *s >= 0.0)
                    .map(|s| s as u64)
            }),
        serde_json::Value::String(text) => text.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_scope<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(scope) => Some(scope),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| item.as_str())
            .collect::<Option<Vec<_>>>()
            .map(|scopes| scopes.join(" ")),
        _ => None,
    })
}

/// Token information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// Access token
    pub access_token: String,
    /// Token type (Bearer, etc.)
    pub token_type: String,
    /// Refresh token
    pub refresh_token: Option<String>,
    /// Token expiry in seconds
    pub expires_in: Option<u64>,
    /// Token scope
    pub scope: Option<String>,
    /// The verified ID token
    pub id_token: String,
}

/// Outcome of a successful verification
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedIdentity {
    /// Claims of the verified ID token
    pub claims: IdTokenClaims,
    /// Key id that verified the signature
    pub key_id: String,
    /// Signing algorithm
    pub algorithm: Algorithm,
    /// Tokens issued alongside the ID token
    pub token: TokenInfo,
}

impl VerifiedIdentity {
    /// `sub` claim
    pub fn subject(&self) -> Option<&str> {
        self.claims.sub.as_deref()
    }
}

/// Resource owner described by a verified ID token
///
/// The owner id is the `merchant_id` claim.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceOwner {
    claims: serde_json::Map<String, serde_json::Value>,
    merchant_id: Option<String>,
}

impl ResourceOwner {
    /// Build from a verified identity
    pub fn from_identity(identity: &VerifiedIdentity) -> Self {
        Self {
            claims: identity.claims.to_map(),
            merchant_id: identity.claims.merchant_id(),
        }
    }

    /// `merchant_id` claim, `None` when absent
    pub fn id(&self) -> Option<&str> {
        self.merchant_id.as_deref()
    }

    /// Single claim by name
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.claims.get(name)
    }

    /// All claims
    pub fn to_map(&self) -> serde_json::Map<String, serde_json::Value> {
        self.claims.clone()
    }
}
