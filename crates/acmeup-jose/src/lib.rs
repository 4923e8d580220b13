//! JOSE primitives for the ACME protocol
//!
//! Canonical claim construction, JWK thumbprints and JWS request signing.
//! The claim builder's serialized output is used both as the HTTP body and as
//! the signing payload, so everything in this crate is deterministic: claims
//! and JWK parameters serialize with lexicographically ordered keys and
//! base64url encoding without padding.

pub mod claims;
pub mod jwk;
pub mod jws;
pub mod key;

pub use claims::ClaimBuilder;
pub use jwk::Jwk;
pub use jws::{sign, KeyIdentifier};
pub use key::AccountKey;

use thiserror::Error;

/// JOSE and key-material errors
///
/// These are construction-time failures. They are fatal to the operation that
/// produced them and are never retried.
#[derive(Debug, Error)]
pub enum JoseError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
