//! Error types
//!
//! Every component owns a small error enum so callers that use a component
//! directly (key set parsing, claim validation, signature checks) get precise
//! failures. The verification pipeline folds them into [`Error`], keeping the
//! distinction between a bad network, a bad token and a bad signature.

use jsonwebtoken::Algorithm;
use thiserror::Error;

/// Crate result type
pub type Result<T> = std::result::Result<T, Error>;

/// Stages of a single verification attempt, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerificationStage {
    /// Status code and body of the token-exchange response
    ResponseCheck,
    /// Decoding of the ID token header and claims
    ParseToken,
    /// Issuer, audience, expiry and not-before checks
    ClaimCheck,
    /// JWKS retrieval and key lookup by key id
    KeyResolution,
    /// Public key reconstruction and signature verification
    SignatureCheck,
}

/// Errors surfaced by the provider and the verification pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// One or more required configuration options were not supplied
    #[error("Required options not defined: {}", .0.join(", "))]
    RequiredOptionMissing(Vec<String>),

    /// A configuration option was supplied but is unusable
    #[error("Invalid option {name}: {reason}")]
    InvalidOption {
        /// Option name
        name: String,
        /// Why the value was rejected
        reason: String,
    },

    /// The OpenID configuration document could not be retrieved or parsed
    #[error("Unable to retrieve OpenID configuration from {url}: {reason}")]
    DiscoveryUnavailable {
        /// Discovery document URL
        url: String,
        /// Underlying failure
        reason: String,
    },

    /// The token endpoint answered with a non-200 status or an error body
    #[error("Identity provider returned an invalid response (HTTP {status}): {message}")]
    IdentityProvider {
        /// HTTP status code of the token response
        status: u16,
        /// `error` / `error_description` from the body, or a generic message
        message: String,
        /// Parsed response body, kept for diagnostics
        body: serde_json::Value,
    },

    /// The ID token is missing or is not a well-formed compact JWS
    #[error("Malformed ID token: {0}")]
    TokenFormat(String),

    /// A claim check failed
    #[error("Invalid token: {0}")]
    TokenInvalid(#[from] ClaimError),

    /// No usable key was found, or the signature did not verify
    #[error("Unable to verify token signature: {0}")]
    SignatureUnverifiable(#[from] UnverifiableReason),

    /// The token endpoint could not be reached
    #[error("Token endpoint request failed: {0}")]
    Transport(String),
}

impl Error {
    /// The verification stage that produced this error, if any
    pub fn stage(&self) -> Option<VerificationStage> {
        match self {
            Self::IdentityProvider { .. } => Some(VerificationStage::ResponseCheck),
            Self::TokenFormat(_) => Some(VerificationStage::ParseToken),
            Self::TokenInvalid(_) => Some(VerificationStage::ClaimCheck),
            Self::SignatureUnverifiable(reason) => Some(reason.stage()),
            Self::RequiredOptionMissing(_)
            | Self::InvalidOption { .. }
            | Self::DiscoveryUnavailable { .. }
            | Self::Transport(_) => None,
        }
    }
}

/// A single failed claim check
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    /// `iss` does not equal the expected issuer
    #[error("issuer mismatch: expected {expected}, got {}", .actual.as_deref().unwrap_or("<none>"))]
    IssuerMismatch {
        /// Configured issuer
        expected: String,
        /// Issuer carried by the token
        actual: Option<String>,
    },

    /// `aud` does not contain the expected audience
    #[error("audience does not contain {expected}")]
    AudienceMismatch {
        /// Configured audience (the client id)
        expected: String,
    },

    /// `exp` lies further in the past than the leeway allows
    #[error("token expired at {exp} (now {now}, leeway {leeway}s)")]
    Expired {
        /// Expiry claim
        exp: i64,
        /// Validation instant
        now: i64,
        /// Leeway in seconds
        leeway: u64,
    },

    /// `nbf` lies further in the future than the leeway allows
    #[error("token not valid before {nbf} (now {now}, leeway {leeway}s)")]
    NotYetValid {
        /// Not-before claim
        nbf: i64,
        /// Validation instant
        now: i64,
        /// Leeway in seconds
        leeway: u64,
    },

    /// A time claim is absent while the policy requires it
    #[error("missing required claim: {0}")]
    MissingClaim(&'static str),

    /// `nonce` does not equal the nonce sent with the authorization request
    #[error("nonce mismatch")]
    NonceMismatch,
}

/// Failures while building or querying a key set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// Exponent or modulus is empty, undecodable or not a valid RSA key
    #[error("invalid key material for key {kid}: {reason}")]
    KeyMaterial {
        /// Key id of the offending key
        kid: String,
        /// What was wrong
        reason: String,
    },

    /// The document holds no usable RSA key
    #[error("No keys available")]
    NoKeysAvailable,

    /// Zero or several keys carry the requested key id
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// The document is not a JSON object
    #[error("malformed key set document: {0}")]
    MalformedDocument(String),
}

/// Failures of the signature primitive itself (not a wrong signature)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// Only RS256 is accepted
    #[error("unsupported signing algorithm {0:?}")]
    UnsupportedAlgorithm(Algorithm),

    /// The key cannot be used for verification
    #[error("key unusable for verification: {0}")]
    UnusableKey(String),
}

/// Failures retrieving a JWKS document
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Endpoint rejected before any request was made
    #[error("refusing to fetch JWKS from {uri}: {reason}")]
    InsecureEndpoint {
        /// JWKS endpoint
        uri: String,
        /// Why it was rejected
        reason: String,
    },

    /// Transport failure or timeout
    #[error("JWKS request failed: {0}")]
    Http(String),

    /// Non-success status code
    #[error("JWKS endpoint returned status {0}")]
    Status(u16),
}

/// Why a token signature could not be accepted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnverifiableReason {
    /// The token header carries no `kid`
    #[error("token header carries no key id")]
    MissingKeyId,

    /// The JWKS document could not be fetched
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The key set is empty, malformed, or has no unique match
    #[error(transparent)]
    Key(#[from] KeyError),

    /// The verification primitive refused the input
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// The signature does not match the selected key
    #[error("signature does not match key {0}")]
    Mismatch(String),
}

impl UnverifiableReason {
    /// Stage in which this failure occurs
    pub fn stage(&self) -> VerificationStage {
        match self {
            Self::MissingKeyId
            | Self::Fetch(_)
            | Self::Key(KeyError::NoKeysAvailable)
            | Self::Key(KeyError::KeyNotFound(_))
            | Self::Key(KeyError::MalformedDocument(_)) => VerificationStage::KeyResolution,
            Self::Key(KeyError::KeyMaterial { .. }) | Self::Signature(_) | Self::Mismatch(_) => {
                VerificationStage::SignatureCheck
            }
        }
    }
}

impl From<FetchError> for Error {
    fn from(e: FetchError) -> Self {
        Self::SignatureUnverifiable(e.into())
    }
}

impl From<KeyError> for Error {
    fn from(e: KeyError) -> Self {
        Self::SignatureUnverifiable(e.into())
    }
}

impl From<SignatureError> for Error {
    fn from(e: SignatureError) -> Self {
        Self::SignatureUnverifiable(e.into())
    }
}
