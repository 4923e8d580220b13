//! Protocol error types

use acmeup_jose::JoseError;
use acmeup_transport::{AcmeTransport, TransportError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Problem details a server may attach to an error response
/// (`application/problem+json` style document).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Problem {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub problem_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// ACME protocol errors
///
/// A Retry-After hint is deliberately not an error; polling operations
/// report it through [`crate::challenge::UpdateOutcome`] instead.
#[derive(Debug, Error)]
pub enum AcmeError {
    /// Malformed or semantically invalid server response: wrong resource
    /// type, unexpected status code, missing required field. Never retried.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server answered with an unexpected status code, with any
    /// problem details it supplied.
    #[error("Server error (status {status}): {}", problem_detail(.problem))]
    Server { status: u16, problem: Option<Problem> },

    /// Network/TLS failure from the transport collaborator, propagated
    /// unchanged.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Key or signature construction failure. Fatal, never retried.
    #[error("JOSE error: {0}")]
    Jose(#[from] JoseError),
}

fn problem_detail(problem: &Option<Problem>) -> &str {
    problem
        .as_ref()
        .and_then(|p| p.detail.as_deref())
        .unwrap_or("no details")
}

impl AcmeError {
    /// Build a [`AcmeError::Server`] from the current response, picking up
    /// problem details from the body when it carries any.
    pub(crate) async fn from_response(status: u16, transport: &mut (dyn AcmeTransport)) -> Self {
        let problem = match transport.read_json_body().await {
            Ok(body) => serde_json::from_value::<Problem>(Value::Object(body)).ok(),
            Err(_) => None,
        };
        AcmeError::Server { status, problem }
    }
}
