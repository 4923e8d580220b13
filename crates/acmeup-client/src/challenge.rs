//! Challenge state machine
//!
//! A challenge is a polymorphic server resource: the wire document declares
//! a `type` tag, and a registry maps that tag onto a concrete kind (http-01,
//! dns-01) or a generic fallback for mechanisms this client does not know.
//! The client drives it through two operations: `trigger` tells the server
//! to start validating, `update` polls the result. Status only ever moves
//! away from pending; the server owns the transitions and this client will
//! not synthesize a regression.

use std::collections::HashMap;
use std::sync::Arc;

use acmeup_jose::ClaimBuilder;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::directory::Resource;
use crate::error::AcmeError;
use crate::resource::{parse_timestamp, str_field, AcmeResource, Location};
use crate::session::Session;

/// Challenge type tag for HTTP-based validation
pub const HTTP_01: &str = "http-01";
/// Challenge type tag for DNS-based validation
pub const DNS_01: &str = "dns-01";

/// Normalized challenge status
///
/// The wire may carry additional intermediate values (e.g. `"processing"`);
/// anything that is not terminal normalizes to `Pending`. The raw wire
/// value stays observable through [`Challenge::raw_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Pending,
    Valid,
    Invalid,
}

impl Status {
    fn from_wire(value: &str) -> Self {
        match value {
            "valid" => Status::Valid,
            "invalid" => Status::Invalid,
            _ => Status::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Valid | Status::Invalid)
    }
}

/// Type-specific payload of a challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeKind {
    /// Fallback for unrecognized challenge types: status, location and
    /// validation timestamp remain accessible, but there is no proof
    /// material.
    Generic,
    /// HTTP validation: the key authorization is served over HTTP under
    /// `/.well-known/acme-challenge/<token>`.
    Http01 { token: Option<String> },
    /// DNS validation: a digest of the key authorization is published in a
    /// TXT record.
    Dns01 { token: Option<String> },
}

impl ChallengeKind {
    /// The wire type this kind insists on, if any.
    fn expected_type(&self) -> Option<&'static str> {
        match self {
            ChallengeKind::Generic => None,
            ChallengeKind::Http01 { .. } => Some(HTTP_01),
            ChallengeKind::Dns01 { .. } => Some(DNS_01),
        }
    }

    fn token(&self) -> Option<&str> {
        match self {
            ChallengeKind::Generic => None,
            ChallengeKind::Http01 { token } | ChallengeKind::Dns01 { token } => token.as_deref(),
        }
    }

    /// Populate type-specific fields from a server document.
    fn absorb(&mut self, document: &Map<String, Value>) {
        match self {
            ChallengeKind::Generic => {}
            ChallengeKind::Http01 { token } | ChallengeKind::Dns01 { token } => {
                if let Some(value) = str_field(document, "token") {
                    *token = Some(value.to_string());
                }
            }
        }
    }

    fn set_token(&mut self, value: Option<String>) {
        match self {
            ChallengeKind::Generic => {}
            ChallengeKind::Http01 { token } | ChallengeKind::Dns01 { token } => *token = value,
        }
    }
}

/// Constructor for the kind matching a wire type tag
pub type KindFactory = fn() -> ChallengeKind;

/// Registry dispatching wire `type` tags onto challenge kinds.
///
/// Unknown tags fall back to [`ChallengeKind::Generic`].
pub struct ChallengeRegistry {
    kinds: HashMap<&'static str, KindFactory>,
}

impl Default for ChallengeRegistry {
    fn default() -> Self {
        let mut registry = Self {
            kinds: HashMap::new(),
        };
        registry.register(HTTP_01, || ChallengeKind::Http01 { token: None });
        registry.register(DNS_01, || ChallengeKind::Dns01 { token: None });
        registry
    }
}

impl ChallengeRegistry {
    pub fn register(&mut self, wire_type: &'static str, factory: KindFactory) {
        self.kinds.insert(wire_type, factory);
    }

    pub fn dispatch(&self, wire_type: &str) -> ChallengeKind {
        match self.kinds.get(wire_type) {
            Some(factory) => factory(),
            None => {
                debug!(wire_type, "unknown challenge type, using generic fallback");
                ChallengeKind::Generic
            }
        }
    }
}

/// Result of polling a challenge via [`Challenge::update`].
///
/// `RetryAfter` is not a failure: the body update has already been applied
/// to the challenge, and the timestamp is the server's hint for when to poll
/// again. Waiting it out is entirely the caller's business; this layer never
/// sleeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Final answer for this poll, no retry requested.
    Done(Status),
    /// State was updated; try again no earlier than the carried instant.
    RetryAfter(Status, DateTime<Utc>),
}

/// Snapshot format version written by [`Challenge::snapshot`]
pub const CHALLENGE_SNAPSHOT_VERSION: u32 = 1;

/// Versioned, inspectable persistence record of a challenge.
///
/// This is the stable external form for callers that park a challenge
/// between polls (e.g. across process restarts while waiting out a
/// Retry-After window).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeSnapshot {
    pub version: u32,
    #[serde(rename = "type")]
    pub challenge_type: Option<String>,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wire_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validated: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// A domain-validation challenge resource
#[derive(Debug, Clone)]
pub struct Challenge {
    session: Arc<Session>,
    kind: ChallengeKind,
    declared_type: Option<String>,
    status: Status,
    wire_status: Option<String>,
    uri: Option<String>,
    location: Location,
    validated: Option<DateTime<Utc>>,
}

impl Challenge {
    /// A fresh challenge with no type expectation (accepts any document).
    pub fn new(session: Arc<Session>) -> Self {
        Self::of_kind(session, ChallengeKind::Generic)
    }

    /// A fresh http-01 challenge; unmarshalling any other type fails.
    pub fn http01(session: Arc<Session>) -> Self {
        Self::of_kind(session, ChallengeKind::Http01 { token: None })
    }

    /// A fresh dns-01 challenge; unmarshalling any other type fails.
    pub fn dns01(session: Arc<Session>) -> Self {
        Self::of_kind(session, ChallengeKind::Dns01 { token: None })
    }

    pub fn of_kind(session: Arc<Session>, kind: ChallengeKind) -> Self {
        Self {
            session,
            kind,
            declared_type: None,
            status: Status::default(),
            wire_status: None,
            uri: None,
            location: Location::new(),
            validated: None,
        }
    }

    /// Fetch the challenge at `location` and materialize it, dispatching the
    /// document's declared type through the default registry. Unknown types
    /// come back as generic challenges rather than failing.
    pub async fn bind(session: Arc<Session>, location: &str) -> Result<Self, AcmeError> {
        Self::bind_with(session, location, &ChallengeRegistry::default(), None).await
    }

    /// Like [`Challenge::bind`], but insist on a concrete challenge type.
    /// A document declaring any other type fails with a protocol error.
    pub async fn bind_typed(
        session: Arc<Session>,
        location: &str,
        expected_type: &str,
    ) -> Result<Self, AcmeError> {
        Self::bind_with(
            session,
            location,
            &ChallengeRegistry::default(),
            Some(expected_type),
        )
        .await
    }

    /// Bind with a caller-supplied registry (for custom challenge kinds).
    pub async fn bind_with(
        session: Arc<Session>,
        location: &str,
        registry: &ChallengeRegistry,
        expected_type: Option<&str>,
    ) -> Result<Self, AcmeError> {
        let document = {
            let mut transport = session.transport().await;
            let status = transport.get(location).await?;
            session.record_nonce(&**transport);
            if status != 200 && status != 202 {
                return Err(AcmeError::from_response(status, &mut **transport).await);
            }
            transport.read_json_body().await?
        };

        let declared = str_field(&document, "type").ok_or_else(|| {
            AcmeError::Protocol("challenge document has no type field".to_string())
        })?;
        if let Some(expected) = expected_type {
            if declared != expected {
                return Err(AcmeError::Protocol(format!(
                    "challenge type mismatch: expected {expected}, got {declared}"
                )));
            }
        }

        let kind = registry.dispatch(declared);
        let mut challenge = Self::of_kind(session, kind);
        challenge.unmarshall(&document)?;
        challenge.location.set_once(location);
        Ok(challenge)
    }

    /// Populate fields from a server document.
    ///
    /// Fails if the document declares a type that conflicts with this
    /// instance's expected kind, or with the type it was first unmarshalled
    /// as. Applying the same well-formed document twice is a no-op.
    pub fn unmarshall(&mut self, document: &Map<String, Value>) -> Result<(), AcmeError> {
        if let Some(declared) = str_field(document, "type") {
            if let Some(expected) = self.kind.expected_type() {
                if declared != expected {
                    return Err(AcmeError::Protocol(format!(
                        "challenge type mismatch: expected {expected}, got {declared}"
                    )));
                }
            }
            match &self.declared_type {
                Some(existing) if existing != declared => {
                    return Err(AcmeError::Protocol(format!(
                        "challenge type changed from {existing} to {declared}"
                    )));
                }
                Some(_) => {}
                None => self.declared_type = Some(declared.to_string()),
            }
        }

        if let Some(raw) = str_field(document, "status") {
            let next = Status::from_wire(raw);
            if self.status.is_terminal() && !next.is_terminal() {
                debug!(
                    current = ?self.status,
                    wire = raw,
                    "ignoring status regression from server document"
                );
            } else {
                self.status = next;
            }
            self.wire_status = Some(raw.to_string());
        }

        if let Some(uri) = str_field(document, "uri") {
            self.uri = Some(uri.to_string());
        }

        if let Some(validated) = str_field(document, "validated") {
            self.validated = Some(parse_timestamp(validated)?);
        }

        self.kind.absorb(document);
        Ok(())
    }

    /// Contribute this challenge's response material to an outgoing claim:
    /// the type tag, plus the key authorization for kinds that prove control
    /// with one.
    pub fn respond(&self, claims: &mut ClaimBuilder) -> Result<(), AcmeError> {
        let challenge_type = self
            .declared_type
            .as_deref()
            .or_else(|| self.kind.expected_type())
            .ok_or_else(|| AcmeError::Protocol("challenge has no type".to_string()))?;
        claims.put("type", challenge_type);

        if !matches!(self.kind, ChallengeKind::Generic) {
            claims.put("keyAuthorization", self.key_authorization()?);
        }
        Ok(())
    }

    /// The key authorization string: `token "." base64url(thumbprint)` over
    /// the session's account key.
    pub fn key_authorization(&self) -> Result<String, AcmeError> {
        let token = self
            .kind
            .token()
            .ok_or_else(|| AcmeError::Protocol("challenge has no token".to_string()))?;
        Ok(format!(
            "{}.{}",
            token,
            self.session.key().public_jwk().thumbprint_base64url()
        ))
    }

    /// Digest of the key authorization for the dns-01 TXT record, base64url
    /// without padding.
    pub fn dns_txt_digest(&self) -> Result<String, AcmeError> {
        if !matches!(self.kind, ChallengeKind::Dns01 { .. }) {
            return Err(AcmeError::Protocol(
                "TXT digest is only defined for dns-01 challenges".to_string(),
            ));
        }
        let digest = Sha256::digest(self.key_authorization()?.as_bytes());
        Ok(URL_SAFE_NO_PAD.encode(digest))
    }

    /// Tell the server to start validating this challenge.
    ///
    /// Sends the response claims to the challenge's resource URI, expects
    /// 202 Accepted, applies the response body and captures the resource
    /// location from the `Location` header if not already set.
    pub async fn trigger(&mut self) -> Result<(), AcmeError> {
        let uri = self
            .uri
            .clone()
            .ok_or_else(|| AcmeError::Protocol("challenge has no resource URI".to_string()))?;

        let mut claims = ClaimBuilder::new();
        claims.put_resource(Resource::Challenge.as_str());
        self.respond(&mut claims)?;

        let session = Arc::clone(&self.session);
        let mut transport = session.transport().await;
        let status = session.send_signed(&mut **transport, &uri, &claims).await?;
        if status != 202 {
            return Err(AcmeError::from_response(status, &mut **transport).await);
        }

        let document = transport.read_json_body().await?;
        let location = transport.location_header();
        drop(transport);

        self.unmarshall(&document)?;
        if let Some(location) = location {
            self.location.set_once(location);
        }
        info!(
            challenge_type = self.declared_type.as_deref().unwrap_or("unknown"),
            "challenge triggered"
        );
        Ok(())
    }

    /// Poll the challenge's current state.
    ///
    /// 200 applies the body and completes. 202 applies the body too and, if
    /// the server attached a Retry-After hint, reports it as
    /// [`UpdateOutcome::RetryAfter`] — the partial update is visible on this
    /// challenge either way. Any other status is an error.
    pub async fn update(&mut self) -> Result<UpdateOutcome, AcmeError> {
        let location = self
            .location
            .get()
            .ok_or_else(|| AcmeError::Protocol("challenge is not bound to a location".to_string()))?
            .to_string();

        let session = Arc::clone(&self.session);
        let mut transport = session.transport().await;
        let status = transport.get(&location).await?;
        session.record_nonce(&**transport);

        match status {
            200 => {
                let document = transport.read_json_body().await?;
                drop(transport);
                self.unmarshall(&document)?;
                Ok(UpdateOutcome::Done(self.status))
            }
            202 => {
                let document = transport.read_json_body().await?;
                let retry_after = transport.retry_after_header();
                drop(transport);
                self.unmarshall(&document)?;
                match retry_after {
                    Some(instant) => {
                        debug!(%instant, "server asked to poll again later");
                        Ok(UpdateOutcome::RetryAfter(self.status, instant))
                    }
                    None => Ok(UpdateOutcome::Done(self.status)),
                }
            }
            other => Err(AcmeError::from_response(other, &mut **transport).await),
        }
    }

    pub fn challenge_type(&self) -> Option<&str> {
        self.declared_type.as_deref()
    }

    pub fn kind(&self) -> &ChallengeKind {
        &self.kind
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// The status string exactly as the server last sent it, for callers
    /// that care about wire values the normalized enum folds together.
    pub fn raw_status(&self) -> Option<&str> {
        self.wire_status.as_deref()
    }

    /// The resource URI trigger requests are sent to (from the document's
    /// `uri` field; not necessarily equal to the location).
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn validated(&self) -> Option<DateTime<Utc>> {
        self.validated
    }

    pub fn token(&self) -> Option<&str> {
        self.kind.token()
    }

    /// Capture the challenge's state in its stable persistence form.
    pub fn snapshot(&self) -> ChallengeSnapshot {
        ChallengeSnapshot {
            version: CHALLENGE_SNAPSHOT_VERSION,
            challenge_type: self.declared_type.clone(),
            status: self.status,
            wire_status: self.wire_status.clone(),
            uri: self.uri.clone(),
            location: self.location.get().map(str::to_string),
            validated: self.validated,
            token: self.kind.token().map(str::to_string),
        }
    }

    /// Rebuild a challenge from a snapshot, re-dispatching its kind through
    /// the default registry.
    pub fn restore(session: Arc<Session>, snapshot: ChallengeSnapshot) -> Result<Self, AcmeError> {
        if snapshot.version != CHALLENGE_SNAPSHOT_VERSION {
            return Err(AcmeError::Protocol(format!(
                "unsupported challenge snapshot version {}",
                snapshot.version
            )));
        }

        let mut kind = ChallengeRegistry::default()
            .dispatch(snapshot.challenge_type.as_deref().unwrap_or_default());
        kind.set_token(snapshot.token);

        let mut location = Location::new();
        if let Some(uri) = snapshot.location {
            location.set_once(uri);
        }

        Ok(Self {
            session,
            kind,
            declared_type: snapshot.challenge_type,
            status: snapshot.status,
            wire_status: snapshot.wire_status,
            uri: snapshot.uri,
            location,
            validated: snapshot.validated,
        })
    }
}

impl AcmeResource for Challenge {
    fn session(&self) -> &Arc<Session> {
        &self.session
    }

    fn location(&self) -> Option<&str> {
        self.location.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_wire() {
        assert_eq!(Status::from_wire("pending"), Status::Pending);
        assert_eq!(Status::from_wire("processing"), Status::Pending);
        assert_eq!(Status::from_wire("valid"), Status::Valid);
        assert_eq!(Status::from_wire("invalid"), Status::Invalid);
        assert_eq!(Status::from_wire("somethingelse"), Status::Pending);
    }

    #[test]
    fn test_status_terminality() {
        assert!(!Status::Pending.is_terminal());
        assert!(Status::Valid.is_terminal());
        assert!(Status::Invalid.is_terminal());
    }

    #[test]
    fn test_registry_dispatch() {
        let registry = ChallengeRegistry::default();

        assert!(matches!(
            registry.dispatch(HTTP_01),
            ChallengeKind::Http01 { token: None }
        ));
        assert!(matches!(
            registry.dispatch(DNS_01),
            ChallengeKind::Dns01 { token: None }
        ));
        assert!(matches!(
            registry.dispatch("tls-sni-01"),
            ChallengeKind::Generic
        ));
    }

    #[test]
    fn test_registry_accepts_custom_kinds() {
        let mut registry = ChallengeRegistry::default();
        registry.register("custom-01", || ChallengeKind::Http01 { token: None });

        assert!(matches!(
            registry.dispatch("custom-01"),
            ChallengeKind::Http01 { .. }
        ));
    }

    #[test]
    fn test_status_serde_uses_wire_names() {
        assert_eq!(serde_json::to_string(&Status::Valid).unwrap(), r#""valid""#);
        let parsed: Status = serde_json::from_str(r#""invalid""#).unwrap();
        assert_eq!(parsed, Status::Invalid);
    }
}
