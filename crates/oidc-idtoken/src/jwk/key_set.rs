//! JWKS document parsing and key lookup
//!
//! Only RSA keys are supported. Entries of any other key type are skipped
//! without error: they mark the boundary of what this verifier accepts, not a
//! malformed document. RSA entries that cannot become a usable [`Jwk`] are
//! skipped with a warning.

use serde::Deserialize;
use tracing::{debug, warn};

use super::Jwk;
use crate::error::KeyError;

/// Top-level JWKS document; `keys` may be missing or null
#[derive(Debug, Deserialize)]
struct JwksDocument {
    #[serde(default)]
    keys: Option<Vec<serde_json::Value>>,
}

/// RSA members of a JWKS entry
#[derive(Debug, Deserialize)]
struct RsaKeyEntry {
    kid: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

/// Ordered set of RSA keys taken from one JWKS document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySet {
    keys: Vec<Jwk>,
}

impl KeySet {
    /// Parse a JWKS document
    ///
    /// Retained keys keep their document order.
    ///
    /// # Errors
    ///
    /// - [`KeyError::MalformedDocument`] if the input is not a JSON object
    /// - [`KeyError::NoKeysAvailable`] if no usable RSA key remains
    ///
    /// # Example
    ///
    /// ```rust
    /// use oidc_idtoken::jwk::KeySet;
    ///
    /// let keys = KeySet::from_document(
    ///     r#"{"keys": [
    ///         {"kty": "EC", "kid": "ec-1", "crv": "P-256", "x": "AA", "y": "AA"},
    ///         {"kty": "RSA", "kid": "rsa-1", "n": "sXchDaQebHnPiGvyDOAT4saGEUetSyo9MKLOoWFsueri", "e": "AQAB"}
    ///     ]}"#,
    /// )?;
    ///
    /// assert_eq!(keys.len(), 1);
    /// assert_eq!(keys.find("rsa-1")?.key_id(), "rsa-1");
    /// # Ok::<(), oidc_idtoken::KeyError>(())
    /// ```
    pub fn from_document(json: &str) -> Result<Self, KeyError> {
        let document: JwksDocument = serde_json::from_str(json)
            .map_err(|e| KeyError::MalformedDocument(e.to_string()))?;

        let entries = document.keys.unwrap_or_default();
        let mut key_set = Self::default();

        for (index, entry) in entries.into_iter().enumerate() {
            let kty = entry.get("kty").and_then(serde_json::Value::as_str);
            if kty != Some("RSA") {
                debug!(index, kty = ?kty, "Skipping non-RSA JWKS entry");
                continue;
            }

            match Self::rsa_entry(entry) {
                Ok(jwk) => key_set.keys.push(jwk),
                Err(reason) => {
                    warn!(index, reason = %reason, "Skipping unusable RSA JWKS entry");
                }
            }
        }

        if key_set.keys.is_empty() {
            return Err(KeyError::NoKeysAvailable);
        }

        debug!(key_count = key_set.keys.len(), "Parsed JWKS document");
        Ok(key_set)
    }

    fn rsa_entry(entry: serde_json::Value) -> Result<Jwk, String> {
        let entry: RsaKeyEntry = serde_json::from_value(entry).map_err(|e| e.to_string())?;
        let kid = entry.kid.ok_or("missing kid")?;
        let n = entry.n.ok_or("missing n")?;
        let e = entry.e.ok_or("missing e")?;
        Jwk::from_encoded(kid, &e, &n).map_err(|e| e.to_string())
    }

    /// Look up the single key carrying `kid`
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::KeyNotFound`] when no key or more than one key
    /// carries the id. Duplicate ids are a data error in the document.
    pub fn find(&self, kid: &str) -> Result<&Jwk, KeyError> {
        let mut matches = self.keys.iter().filter(|key| key.key_id() == kid);

        match (matches.next(), matches.next()) {
            (Some(key), None) => Ok(key),
            (None, _) => Err(KeyError::KeyNotFound(kid.to_string())),
            (Some(_), Some(_)) => {
                warn!(key_id = kid, "JWKS document carries duplicate key id");
                Err(KeyError::KeyNotFound(kid.to_string()))
            }
        }
    }

    /// Number of usable keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the set is empty (never true for a parsed document)
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterate over keys in document order
    pub fn iter(&self) -> std::slice::Iter<'_, Jwk> {
        self.keys.iter()
    }
}

impl<'a> IntoIterator for &'a KeySet {
    type Item = &'a Jwk;
    type IntoIter = std::slice::Iter<'a, Jwk>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
