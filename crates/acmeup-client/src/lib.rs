//! ACME protocol client core
//!
//! Client-side engine for automated certificate issuance: account
//! registration, signed requests authenticated by an account key, and the
//! per-domain challenge state machine with its trigger/poll protocol.
//!
//! The HTTP/TLS stack stays behind the [`AcmeTransport`] trait; challenge
//! fulfilment mechanics (serving tokens, publishing DNS records) and
//! certificate handling are the caller's side of the boundary.

pub mod challenge;
pub mod directory;
pub mod error;
pub mod registration;
pub mod resource;
pub mod session;

pub use challenge::{
    Challenge, ChallengeKind, ChallengeRegistry, ChallengeSnapshot, Status, UpdateOutcome,
    CHALLENGE_SNAPSHOT_VERSION, DNS_01, HTTP_01,
};
pub use directory::{Directory, Resource};
pub use error::{AcmeError, Problem};
pub use registration::{Registration, RegistrationBuilder};
pub use resource::{AcmeResource, Location};
pub use session::Session;

// Re-export the boundary types callers implement or construct directly
pub use acmeup_jose::{AccountKey, ClaimBuilder, Jwk, JoseError, KeyIdentifier};
pub use acmeup_transport::{AcmeTransport, TransportError};
