//! Base model for location-addressable server resources
//!
//! Registration and Challenge are lazily-materialized JSON-backed entities:
//! they get a location exactly once (at bind time or from a response's
//! `Location` header), and populate their fields from server documents.
//! The shared pieces live here.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::AcmeError;
use crate::session::Session;

/// A resource URI that can be assigned exactly once.
///
/// Later assignments are ignored, which keeps the "location is immutable
/// once set" invariant in one place instead of at every call site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location(Option<String>);

impl Location {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    /// Assign the location if it is still unset. Returns whether the value
    /// was taken.
    pub fn set_once(&mut self, uri: impl Into<String>) -> bool {
        if self.0.is_some() {
            debug!("resource location already set, keeping existing value");
            return false;
        }
        self.0 = Some(uri.into());
        true
    }
}

impl From<&str> for Location {
    fn from(uri: &str) -> Self {
        Location(Some(uri.to_string()))
    }
}

/// Common surface of server-bound resources.
pub trait AcmeResource {
    /// The session this resource performs its operations through.
    fn session(&self) -> &Arc<Session>;

    /// The resource's location URI, if it has been bound yet.
    fn location(&self) -> Option<&str>;
}

/// Extract a string field from a server document.
pub(crate) fn str_field<'a>(document: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    document.get(key).and_then(Value::as_str)
}

/// Parse an RFC 3339 timestamp field (nanosecond precision is preserved).
pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, AcmeError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AcmeError::Protocol(format!("invalid timestamp {value:?}: {e}")))
}
