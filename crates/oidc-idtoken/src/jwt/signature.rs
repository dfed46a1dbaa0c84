//! RS256 signature verification

use jsonwebtoken::Algorithm;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::error::SignatureError;

/// Verify `signature` over `signing_input` with `key`
///
/// Only RS256 (RSASSA-PKCS1-v1_5 with SHA-256) is accepted. A signature that
/// simply does not match yields `Ok(false)`.
///
/// # Errors
///
/// - [`SignatureError::UnsupportedAlgorithm`] for anything but RS256
/// - [`SignatureError::UnusableKey`] if the primitive fails for a reason
///   other than a mismatch
pub fn verify(
    signing_input: &[u8],
    signature: &[u8],
    key: &RsaPublicKey,
    algorithm: Algorithm,
) -> Result<bool, SignatureError> {
    if algorithm != Algorithm::RS256 {
        return Err(SignatureError::UnsupportedAlgorithm(algorithm));
    }

    let digest = Sha256::digest(signing_input);
    match key.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature) {
        Ok(()) => Ok(true),
        Err(rsa::Error::Verification) => Ok(false),
        Err(e) => Err(SignatureError::UnusableKey(e.to_string())),
    }
}
