//! RSA JSON Web Keys and key sets

mod key;
mod key_set;

pub(crate) use key::decode_base64url;
pub use key::Jwk;
pub use key_set::KeySet;
