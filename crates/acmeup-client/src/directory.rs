//! Directory of server resource URIs
//!
//! The server publishes a mapping from logical resource names to the URIs
//! where they live. The session fetches it once and resolves every resource
//! lookup against the cached copy.

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};

/// Logical server resources addressed through the directory, plus the
/// discriminator values used in request claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    NewRegistration,
    NewAuthorization,
    NewCertificate,
    RevokeCertificate,
    Challenge,
}

impl Resource {
    /// The wire name, as it appears in directory documents and in the
    /// `"resource"` claim field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::NewRegistration => "new-reg",
            Resource::NewAuthorization => "new-authz",
            Resource::NewCertificate => "new-cert",
            Resource::RevokeCertificate => "revoke-cert",
            Resource::Challenge => "challenge",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed directory document
#[derive(Debug, Clone, Default)]
pub struct Directory {
    entries: HashMap<String, String>,
}

impl Directory {
    /// Parse a directory JSON document. Entries with non-string values
    /// (e.g. a `meta` object) are skipped; unknown names are kept verbatim
    /// so future resources stay resolvable by name.
    pub fn from_json(document: &Map<String, Value>) -> Self {
        let entries = document
            .iter()
            .filter_map(|(name, value)| {
                value
                    .as_str()
                    .map(|uri| (name.clone(), uri.to_string()))
            })
            .collect();
        Self { entries }
    }

    pub fn uri(&self, resource: Resource) -> Option<&str> {
        self.uri_for(resource.as_str())
    }

    pub fn uri_for(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
