//! ID token decoding, claim validation and signature verification
//!
//! ```text
//!  compact JWS ──► DecodedToken ──► ValidationContext::validate (claims)
//!                       │
//!                       └─► signature::verify (signing input + key)
//! ```
//!
//! Decoding never checks anything beyond well-formedness. Trust decisions
//! are made by [`validator`] and [`signature`], driven by the
//! [`IdTokenVerifier`](crate::verifier::IdTokenVerifier).

pub mod signature;
pub mod validator;

pub use validator::{TimeClaimPolicy, ValidationContext};

use jsonwebtoken::{Algorithm, Header, decode_header};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::jwk::decode_base64url;

/// `aud` claim: a single audience or an array of audiences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// `"aud": "client"`
    Single(String),
    /// `"aud": ["client", "other"]`
    Multiple(Vec<String>),
}

impl Audience {
    /// Whether `audience` is one of the values
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Self::Single(value) => value == audience,
            Self::Multiple(values) => values.iter().any(|value| value == audience),
        }
    }
}

/// Claims carried by an OpenID Connect ID token
///
/// Registered claims are typed; everything else (for example `merchant_id`)
/// lands in `additional`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Issuer (iss)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Subject (sub)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Audience (aud)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,

    /// Expiration time (exp), unix seconds
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub exp: Option<i64>,

    /// Not before (nbf), unix seconds
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub nbf: Option<i64>,

    /// Issued at (iat), unix seconds
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub iat: Option<i64>,

    /// Nonce echoed from the authorization request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Claims not listed above
    #[serde(flatten)]
    pub additional: HashMap<String, serde_json::Value>,
}

impl IdTokenClaims {
    /// Additional (non-registered) claim by name
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.additional.get(name)
    }

    /// `merchant_id` claim, when present as a string or number
    pub fn merchant_id(&self) -> Option<String> {
        match self.get("merchant_id")? {
            serde_json::Value::String(id) => Some(id.clone()),
            serde_json::Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    /// All claims as one JSON object
    pub fn to_map(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map: serde_json::Map<String, serde_json::Value> = self
            .additional
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        let mut put = |name: &str, value: Option<serde_json::Value>| {
            if let Some(value) = value {
                map.insert(name.to_string(), value);
            }
        };
        put("iss", self.iss.clone().map(Into::into));
        put("sub", self.sub.clone().map(Into::into));
        put(
            "aud",
            self.aud.as_ref().map(|aud| match aud {
                Audience::Single(value) => value.clone().into(),
                Audience::Multiple(values) => values.clone().into(),
            }),
        );
        put("exp", self.exp.map(Into::into));
        put("nbf", self.nbf.map(Into::into));
        put("iat", self.iat.map(Into::into));
        put("nonce", self.nonce.clone().map(Into::into));

        map
    }
}

/// NumericDate accepting integers and floats; fractions are truncated
fn numeric_date<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(number)) => {
            if let Some(seconds) = number.as_i64() {
                Ok(Some(seconds))
            } else if let Some(seconds) = number.as_f64().filter(|s| s.is_finite()) {
                Ok(Some(seconds.trunc() as i64))
            } else {
                Err(D::Error::custom(format!("NumericDate out of range: {number}")))
            }
        }
        Some(other) => Err(D::Error::custom(format!(
            "NumericDate must be a number, got {other}"
        ))),
    }
}

/// A compact JWS split into its parts
///
/// Holds the parsed header, the parsed claims, the exact bytes that were
/// signed and the raw signature. Nothing here has been verified.
#[derive(Debug, Clone)]
pub struct DecodedToken {
    raw: String,
    header: Header,
    claims: IdTokenClaims,
    signing_input: String,
    signature: Vec<u8>,
}

impl DecodedToken {
    /// Decode a compact serialized token
    ///
    /// # Errors
    ///
    /// Returns [`Error::TokenFormat`] if the token does not have three
    /// base64url segments, the header has no recognised `alg`, or the
    /// payload is not a JSON object of claims.
    pub fn parse(token: &str) -> Result<Self> {
        let segments: Vec<&str> = token.split('.').collect();
        let [header_b64, payload_b64, signature_b64] = segments.as_slice() else {
            return Err(Error::TokenFormat(format!(
                "expected 3 segments, found {}",
                segments.len()
            )));
        };

        let header = decode_header(token)
            .map_err(|e| Error::TokenFormat(format!("invalid header: {e}")))?;

        let payload = decode_base64url(payload_b64)
            .map_err(|e| Error::TokenFormat(format!("payload is not base64url: {e}")))?;
        let claims: IdTokenClaims = serde_json::from_slice(&payload)
            .map_err(|e| Error::TokenFormat(format!("invalid claims: {e}")))?;

        let signature = decode_base64url(signature_b64)
            .map_err(|e| Error::TokenFormat(format!("signature is not base64url: {e}")))?;

        Ok(Self {
            raw: token.to_string(),
            header,
            claims,
            signing_input: format!("{header_b64}.{payload_b64}"),
            signature,
        })
    }

    /// The token as received
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parsed JOSE header
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Parsed claims
    pub fn claims(&self) -> &IdTokenClaims {
        &self.claims
    }

    /// Consume the token, keeping only its claims
    pub fn into_claims(self) -> IdTokenClaims {
        self.claims
    }

    /// `<header>.<payload>` exactly as signed
    pub fn signing_input(&self) -> &[u8] {
        self.signing_input.as_bytes()
    }

    /// Raw signature bytes
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// `kid` header parameter
    pub fn key_id(&self) -> Option<&str> {
        self.header.kid.as_deref()
    }

    /// `alg` header parameter
    pub fn algorithm(&self) -> Algorithm {
        self.header.alg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_keys::{mint, primary_private_key};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn encode(value: &serde_json::Value) -> String {
        use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
        URL_SAFE_NO_PAD.encode(value.to_string())
    }

    #[test]
    fn test_parse_well_formed_token() {
        let token = mint(
            primary_private_key(),
            &json!({"alg": "RS256", "typ": "JWT", "kid": "k1"}),
            &json!({
                "iss": "https://idp.example.com",
                "sub": "user-1",
                "aud": "client-1",
                "exp": 1_700_000_000,
                "merchant_id": "m-42"
            }),
        );

        let decoded = DecodedToken::parse(&token).unwrap();
        assert_eq!(decoded.key_id(), Some("k1"));
        assert_eq!(decoded.algorithm(), Algorithm::RS256);
        assert_eq!(decoded.claims().sub.as_deref(), Some("user-1"));
        assert_eq!(decoded.claims().merchant_id().as_deref(), Some("m-42"));
        assert_eq!(decoded.signature().len(), 256);

        let dot = token.rfind('.').unwrap();
        assert_eq!(decoded.signing_input(), token[..dot].as_bytes());
    }

    #[test]
    fn test_wrong_segment_count() {
        for token in ["", "abc", "a.b", "a.b.c.d"] {
            assert!(matches!(
                DecodedToken::parse(token),
                Err(Error::TokenFormat(_))
            ));
        }
    }

    #[test]
    fn test_unknown_algorithm_is_format_error() {
        let token = format!(
            "{}.{}.sig",
            encode(&json!({"alg": "none"})),
            encode(&json!({"sub": "x"}))
        );
        assert!(matches!(
            DecodedToken::parse(&token),
            Err(Error::TokenFormat(_))
        ));
    }

    #[test]
    fn test_payload_must_be_object() {
        let token = format!(
            "{}.{}.c2ln",
            encode(&json!({"alg": "RS256"})),
            encode(&json!(["not", "claims"]))
        );
        assert!(matches!(
            DecodedToken::parse(&token),
            Err(Error::TokenFormat(_))
        ));
    }

    #[test]
    fn test_numeric_dates_accept_floats() {
        let claims: IdTokenClaims =
            serde_json::from_value(json!({"exp": 1_700_000_000.9, "nbf": 12, "iat": null}))
                .unwrap();
        assert_eq!(claims.exp, Some(1_700_000_000));
        assert_eq!(claims.nbf, Some(12));
        assert_eq!(claims.iat, None);

        let err = serde_json::from_value::<IdTokenClaims>(json!({"exp": "tomorrow"}));
        assert!(err.is_err());
    }

    #[test]
    fn test_audience_forms() {
        let single: IdTokenClaims = serde_json::from_value(json!({"aud": "a"})).unwrap();
        let many: IdTokenClaims = serde_json::from_value(json!({"aud": ["b", "a"]})).unwrap();

        assert!(single.aud.as_ref().unwrap().contains("a"));
        assert!(many.aud.as_ref().unwrap().contains("a"));
        assert!(!many.aud.as_ref().unwrap().contains("A"));
    }

    #[test]
    fn test_to_map_contains_all_claims() {
        let claims: IdTokenClaims = serde_json::from_value(json!({
            "iss": "i",
            "sub": "s",
            "aud": ["x", "y"],
            "exp": 10,
            "merchant_id": 7
        }))
        .unwrap();

        let map = claims.to_map();
        assert_eq!(map["iss"], json!("i"));
        assert_eq!(map["aud"], json!(["x", "y"]));
        assert_eq!(map["exp"], json!(10));
        assert_eq!(map["merchant_id"], json!(7));
        assert!(!map.contains_key("nbf"));
        assert_eq!(claims.merchant_id().as_deref(), Some("7"));
    }
}
