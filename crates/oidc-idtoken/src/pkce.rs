//! PKCE (RFC 7636) challenge derivation
//!
//! The verifier itself is generated and stored by the caller; this module
//! only derives the `S256` challenge sent with the authorization request.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Value of the `code_challenge_method` authorization parameter
pub const CODE_CHALLENGE_METHOD: &str = "S256";

/// Derive the `S256` code challenge for a verifier
///
/// SHA-256 over the verifier bytes, base64url encoded without padding.
///
/// # Example
///
/// ```rust
/// use oidc_idtoken::pkce::code_challenge;
///
/// let challenge = code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
/// assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
/// ```
pub fn code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Random hex token for `state` and `nonce` (16 bytes of OS randomness)
pub fn random_token() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
