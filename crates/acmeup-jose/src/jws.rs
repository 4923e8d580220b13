//! JWS request signing
//!
//! Wraps a serialized claim payload in the flattened JSON envelope the ACME
//! server expects: a signature-protected header carrying the anti-replay
//! nonce and the account key identification, the base64url payload, and the
//! RS256 signature over `protected "." payload`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use tracing::trace;

use crate::claims::ClaimBuilder;
use crate::key::AccountKey;
use crate::JoseError;

/// How the account key is identified in the protected header.
///
/// A first request for a new account embeds the full public JWK; once the
/// server has assigned an account URL, subsequent requests reference it by
/// key identifier instead. Both modes run through the same signing path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyIdentifier {
    /// Embed the full public JWK (`"jwk"` header field).
    PublicJwk,
    /// Reference the account by URL (`"kid"` header field).
    KeyId(String),
}

/// Sign `payload` (an already-serialized claim object) into a flattened JWS
/// envelope ready to be POSTed.
///
/// The payload text is embedded as given. Callers serialize their claims
/// exactly once and pass the same bytes here and nowhere else, which is what
/// keeps the signed text and the sent text identical.
pub fn sign(
    key: &AccountKey,
    nonce: &str,
    identifier: &KeyIdentifier,
    payload: &str,
) -> Result<String, JoseError> {
    let mut protected = ClaimBuilder::new();
    protected.put("alg", key.algorithm());
    match identifier {
        KeyIdentifier::PublicJwk => {
            protected.put("jwk", key.public_jwk().to_value());
        }
        KeyIdentifier::KeyId(kid) => {
            protected.put("kid", kid.as_str());
        }
    }
    protected.put("nonce", nonce);

    let protected_b64 = URL_SAFE_NO_PAD.encode(protected.to_string());
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload);

    let signing_input = format!("{}.{}", protected_b64, payload_b64);
    let signature = key.sign(signing_input.as_bytes())?;
    trace!(nonce, "signed request envelope");

    let mut envelope = ClaimBuilder::new();
    envelope.put("payload", payload_b64);
    envelope.put("protected", protected_b64);
    envelope.put_base64url("signature", &signature);

    Ok(envelope.to_string())
}
