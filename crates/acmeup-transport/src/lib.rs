//! Transport abstraction layer for ACME server connections
//!
//! This crate provides the boundary between the protocol core and the actual
//! HTTP/TLS stack. The core only ever talks to an [`AcmeTransport`] trait
//! object: one request, one response, and accessors for the response metadata
//! the protocol cares about (Location, relation links, Retry-After, the
//! replay nonce). Implementations own connection pooling, TLS configuration
//! and header normalization.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

/// Transport-level errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection error: {0}")]
    ConnectionFailed(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// A single HTTP connection to an ACME server.
///
/// The request methods (`get`, `post_signed`) perform one blocking round trip
/// and return the raw status code; the accessor methods expose metadata of
/// the most recent response. The core never retries through this trait and
/// never interprets status codes here.
///
/// Implementations must expose the `Replay-Nonce` header of every response,
/// including error responses, because the protocol rotates the nonce on each
/// round trip regardless of outcome.
#[async_trait]
pub trait AcmeTransport: Send {
    /// Perform a plain GET against `url`, returning the HTTP status code.
    async fn get(&mut self, url: &str) -> TransportResult<u16>;

    /// POST a signed JWS envelope to `url`, returning the HTTP status code.
    ///
    /// `body` is sent verbatim; it already carries the signature, so the
    /// transport must not re-encode or reformat it.
    async fn post_signed(&mut self, url: &str, body: &str) -> TransportResult<u16>;

    /// Parse the body of the most recent response as a JSON object.
    async fn read_json_body(&mut self) -> TransportResult<Map<String, Value>>;

    /// `Location` header of the most recent response, if present.
    fn location_header(&self) -> Option<String>;

    /// `Link` header URI with the given relation, if present.
    fn link_header(&self, relation: &str) -> Option<String>;

    /// `Retry-After` header of the most recent response, normalized to an
    /// absolute timestamp (see [`parse_retry_after`]).
    fn retry_after_header(&self) -> Option<DateTime<Utc>>;

    /// `Replay-Nonce` header of the most recent response, if present.
    fn replay_nonce_header(&self) -> Option<String>;
}

/// Normalize a `Retry-After` header value to an absolute timestamp.
///
/// The wire form is either delta-seconds (`"30"`) or an HTTP-date
/// (`"Tue, 15 Nov 1994 08:12:31 GMT"`). `now` is the reference instant for
/// the delta form. Returns `None` for values in neither form.
///
/// Transport implementations are expected to route the raw header through
/// this helper so all of them agree on the parse.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        let seconds: i64 = value.parse().ok()?;
        return Some(now + Duration::seconds(seconds));
    }

    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests;
