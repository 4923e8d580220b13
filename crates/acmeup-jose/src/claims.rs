//! Canonical claim construction
//!
//! A [`ClaimBuilder`] accumulates the key/value pairs of an outgoing request
//! body. The backing map orders keys lexicographically, so the serialized
//! text is canonical: serializing the same claims always yields the same
//! bytes. The signed-request layer serializes a builder exactly once and both
//! signs and sends those bytes.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{Map, Value};

/// Builder for canonical JSON claim objects
#[derive(Debug, Clone, Default)]
pub struct ClaimBuilder {
    claims: Map<String, Value>,
}

impl ClaimBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a scalar or pre-built JSON value.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.claims.insert(key.into(), value.into());
        self
    }

    /// Insert the `"resource"` discriminator field.
    pub fn put_resource(&mut self, resource: &str) -> &mut Self {
        self.put("resource", resource)
    }

    /// Insert binary data as base64url without padding.
    pub fn put_base64url(&mut self, key: impl Into<String>, data: &[u8]) -> &mut Self {
        self.put(key, URL_SAFE_NO_PAD.encode(data))
    }

    /// Insert a nested claim object.
    pub fn put_object(&mut self, key: impl Into<String>, object: ClaimBuilder) -> &mut Self {
        self.put(key, Value::Object(object.claims))
    }

    /// Merge an external parameter map into the claims, for example a JWK
    /// object used as an account-key proof. Existing keys are overwritten.
    pub fn merge(&mut self, params: Map<String, Value>) -> &mut Self {
        self.claims.extend(params);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// The claims as a JSON value.
    pub fn json(&self) -> Value {
        Value::Object(self.claims.clone())
    }
}

impl fmt::Display for ClaimBuilder {
    /// Canonical serialized form: compact, keys in lexicographic order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(&self.claims).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_builder() {
        let cb = ClaimBuilder::new();
        assert!(cb.is_empty());
        assert_eq!(cb.to_string(), "{}");
    }

    #[test]
    fn test_keys_are_ordered() {
        let mut cb = ClaimBuilder::new();
        cb.put_resource("new-reg");
        cb.put("contact", json!(["mailto:foo@example.com"]));

        // Insertion order was resource first, serialization is lexicographic
        assert_eq!(
            cb.to_string(),
            r#"{"contact":["mailto:foo@example.com"],"resource":"new-reg"}"#
        );
    }

    #[test]
    fn test_scalars_and_nested_objects() {
        let mut inner = ClaimBuilder::new();
        inner.put("token", "IlirfxKKXAsHtmzK29Pj8A");

        let mut cb = ClaimBuilder::new();
        cb.put("type", "http-01");
        cb.put("proof", 42);
        cb.put_object("challenge", inner);

        assert_eq!(
            cb.to_string(),
            r#"{"challenge":{"token":"IlirfxKKXAsHtmzK29Pj8A"},"proof":42,"type":"http-01"}"#
        );
    }

    #[test]
    fn test_put_base64url() {
        let mut cb = ClaimBuilder::new();
        cb.put_base64url("csr", &[0xfb, 0xef, 0xff]);

        // base64url alphabet, no padding
        assert_eq!(cb.to_string(), r#"{"csr":"--__"}"#);
    }

    #[test]
    fn test_merge_overwrites() {
        let mut cb = ClaimBuilder::new();
        cb.put("kty", "oct");

        let mut params = Map::new();
        params.insert("kty".to_string(), json!("RSA"));
        params.insert("e".to_string(), json!("AQAB"));
        cb.merge(params);

        assert_eq!(cb.to_string(), r#"{"e":"AQAB","kty":"RSA"}"#);
    }

    #[test]
    fn test_display_matches_json_value() {
        let mut cb = ClaimBuilder::new();
        cb.put("b", 2).put("a", 1);

        let from_value = serde_json::to_string(&cb.json()).unwrap();
        assert_eq!(cb.to_string(), from_value);
    }
}
