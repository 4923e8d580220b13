//! JSON Web Key representation and thumbprint computation
//!
//! The thumbprint (RFC 7638) is the SHA-256 digest of the canonical JWK
//! JSON: exactly the required public fields, names in lexicographic order,
//! no whitespace, big-integer parameters base64url-encoded from their
//! minimal big-endian octets. Servers recompute this digest from the account
//! key they hold, so the text must be reproducible byte-for-byte.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Canonical public-key parameters of an account key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Jwk {
    params: Map<String, Value>,
}

impl Jwk {
    /// Build the JWK of an RSA public key: `{"e": ..., "kty": "RSA", "n": ...}`.
    pub fn rsa(public_key: &RsaPublicKey) -> Self {
        let mut params = Map::new();
        params.insert(
            "e".to_string(),
            Value::String(URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be())),
        );
        params.insert("kty".to_string(), Value::String("RSA".to_string()));
        params.insert(
            "n".to_string(),
            Value::String(URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be())),
        );
        Self { params }
    }

    /// The public parameters, for merging into a claim object.
    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// The JWK as a JSON value, for embedding in a protected header.
    pub fn to_value(&self) -> Value {
        Value::Object(self.params.clone())
    }

    /// Canonical JSON text: compact, field names in lexicographic order.
    pub fn canonical_json(&self) -> String {
        // Map iteration is key-ordered, so plain serialization is canonical
        serde_json::to_string(&self.params).expect("JWK parameters serialize")
    }

    /// SHA-256 digest of the canonical JSON text.
    pub fn thumbprint(&self) -> [u8; 32] {
        Sha256::digest(self.canonical_json().as_bytes()).into()
    }

    /// Thumbprint as base64url without padding, the form used inside key
    /// authorization strings.
    pub fn thumbprint_base64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.thumbprint())
    }
}
