//! RSA JSON Web Key
//!
//! A [`Jwk`] holds the raw big-endian exponent and modulus of one RSA public
//! key. Components are decoded when the key is constructed, so an instance
//! always carries non-empty key material.

use base64::Engine as _;
use base64::alphabet;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};

use crate::error::KeyError;

/// base64url decoder accepting both padded and unpadded input
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode a base64url JWK member
pub(crate) fn decode_base64url(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_LENIENT.decode(value)
}

/// RSA public key in JWK form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Jwk {
    kid: String,
    exponent: Vec<u8>,
    modulus: Vec<u8>,
}

impl Jwk {
    /// Build a key from raw big-endian components
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::KeyMaterial`] if either component is empty.
    pub fn new(
        kid: impl Into<String>,
        exponent: Vec<u8>,
        modulus: Vec<u8>,
    ) -> Result<Self, KeyError> {
        let kid = kid.into();
        if exponent.is_empty() {
            return Err(KeyError::KeyMaterial {
                kid,
                reason: "empty exponent".to_string(),
            });
        }
        if modulus.is_empty() {
            return Err(KeyError::KeyMaterial {
                kid,
                reason: "empty modulus".to_string(),
            });
        }
        Ok(Self {
            kid,
            exponent,
            modulus,
        })
    }

    /// Build a key from the base64url `e` and `n` members of a JWK
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::KeyMaterial`] if a member is not valid base64url
    /// or decodes to nothing.
    pub fn from_encoded(kid: impl Into<String>, e: &str, n: &str) -> Result<Self, KeyError> {
        let kid = kid.into();
        let exponent = decode_base64url(e).map_err(|err| KeyError::KeyMaterial {
            kid: kid.clone(),
            reason: format!("exponent is not base64url: {err}"),
        })?;
        let modulus = decode_base64url(n).map_err(|err| KeyError::KeyMaterial {
            kid: kid.clone(),
            reason: format!("modulus is not base64url: {err}"),
        })?;
        Self::new(kid, exponent, modulus)
    }

    /// Build the JWK form of an existing public key
    pub fn from_public_key(kid: impl Into<String>, key: &RsaPublicKey) -> Self {
        Self {
            kid: kid.into(),
            exponent: key.e().to_bytes_be(),
            modulus: key.n().to_bytes_be(),
        }
    }

    /// Key id (`kid`)
    pub fn key_id(&self) -> &str {
        &self.kid
    }

    /// Raw big-endian public exponent
    pub fn exponent(&self) -> &[u8] {
        &self.exponent
    }

    /// Raw big-endian modulus
    pub fn modulus(&self) -> &[u8] {
        &self.modulus
    }

    /// Exponent as an unpadded base64url string (the JWK `e` member)
    pub fn encoded_exponent(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.exponent)
    }

    /// Modulus as an unpadded base64url string (the JWK `n` member)
    pub fn encoded_modulus(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.modulus)
    }

    /// Reconstruct the RSA public key
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::KeyMaterial`] if the components do not form a
    /// valid RSA public key (exponent out of range, oversized modulus).
    pub fn to_public_key(&self) -> Result<RsaPublicKey, KeyError> {
        let n = BigUint::from_bytes_be(&self.modulus);
        let e = BigUint::from_bytes_be(&self.exponent);
        RsaPublicKey::new(n, e).map_err(|err| KeyError::KeyMaterial {
            kid: self.kid.clone(),
            reason: err.to_string(),
        })
    }

    /// Render the key as a SubjectPublicKeyInfo PEM document
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::KeyMaterial`] if the key cannot be reconstructed
    /// or encoded.
    pub fn to_pem(&self) -> Result<String, KeyError> {
        self.to_public_key()?
            .to_public_key_pem(LineEnding::LF)
            .map_err(|err| KeyError::KeyMaterial {
                kid: self.kid.clone(),
                reason: format!("PEM encoding failed: {err}"),
            })
    }
}
