//! Shared RSA fixtures for unit tests

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

static PRIMARY: LazyLock<RsaPrivateKey> = LazyLock::new(|| {
    RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("generate primary test key")
});

static SECONDARY: LazyLock<RsaPrivateKey> = LazyLock::new(|| {
    RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("generate secondary test key")
});

pub(crate) fn primary_private_key() -> &'static RsaPrivateKey {
    &PRIMARY
}

pub(crate) fn secondary_private_key() -> &'static RsaPrivateKey {
    &SECONDARY
}

pub(crate) fn primary_public_key() -> RsaPublicKey {
    PRIMARY.to_public_key()
}

pub(crate) fn secondary_public_key() -> RsaPublicKey {
    SECONDARY.to_public_key()
}

/// PKCS#1 v1.5 / SHA-256 signature over `input`
pub(crate) fn sign(key: &RsaPrivateKey, input: &[u8]) -> Vec<u8> {
    key.sign(Pkcs1v15Sign::new::<Sha256>(), &Sha256::digest(input))
        .expect("sign test input")
}

/// Compact JWS over arbitrary header and claims JSON
pub(crate) fn mint(
    key: &RsaPrivateKey,
    header: &serde_json::Value,
    claims: &serde_json::Value,
) -> String {
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    );
    let signature = sign(key, signing_input.as_bytes());
    format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature))
}
