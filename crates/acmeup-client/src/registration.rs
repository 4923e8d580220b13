//! Account registration
//!
//! [`RegistrationBuilder`] accumulates contact URIs and creates the account
//! resource through the signed-request protocol. The created
//! [`Registration`] carries the account's location and the
//! terms-of-service agreement link when the server advertises one.

use std::sync::Arc;

use acmeup_jose::ClaimBuilder;
use serde_json::Value;
use tracing::info;

use crate::directory::Resource;
use crate::error::AcmeError;
use crate::resource::{AcmeResource, Location};
use crate::session::Session;

/// Builder for a new account registration
#[derive(Debug)]
pub struct RegistrationBuilder {
    session: Arc<Session>,
    contacts: Vec<String>,
    agreement: Option<String>,
}

impl RegistrationBuilder {
    pub fn bind(session: Arc<Session>) -> Self {
        Self {
            session,
            contacts: Vec::new(),
            agreement: None,
        }
    }

    /// Add a contact URI (e.g. `mailto:admin@example.com`).
    pub fn add_contact(mut self, contact: impl Into<String>) -> Self {
        self.contacts.push(contact.into());
        self
    }

    /// Add an email address contact.
    pub fn add_email(self, email: &str) -> Self {
        self.add_contact(format!("mailto:{email}"))
    }

    /// Accept the terms of service at `uri` as part of the registration.
    pub fn agree_to_terms(mut self, uri: impl Into<String>) -> Self {
        self.agreement = Some(uri.into());
        self
    }

    /// Create the account.
    ///
    /// Sends the registration claim to the directory's new-registration URI
    /// and expects 201 Created. The account location comes from the
    /// response's `Location` header; the terms-of-service agreement URI from
    /// the `Link` header with that relation (servers may omit it).
    pub async fn create(self) -> Result<Registration, AcmeError> {
        let mut claims = ClaimBuilder::new();
        claims.put_resource(Resource::NewRegistration.as_str());
        claims.put(
            "contact",
            Value::Array(self.contacts.iter().cloned().map(Value::String).collect()),
        );
        if let Some(agreement) = &self.agreement {
            claims.put("agreement", agreement.as_str());
        }

        let mut transport = self.session.transport().await;
        let uri = self
            .session
            .resource_uri_with(&mut **transport, Resource::NewRegistration)
            .await?;

        let status = self
            .session
            .send_signed(&mut **transport, &uri, &claims)
            .await?;
        if status != 201 {
            return Err(AcmeError::from_response(status, &mut **transport).await);
        }

        let location = transport.location_header().ok_or_else(|| {
            AcmeError::Protocol("registration response has no Location header".to_string())
        })?;
        let agreement = transport.link_header("terms-of-service");
        drop(transport);

        info!(%location, "account registration created");

        Ok(Registration {
            session: self.session,
            location: Location::from(location.as_str()),
            contacts: self.contacts,
            agreement,
        })
    }
}

/// A created account registration resource
#[derive(Debug, Clone)]
pub struct Registration {
    session: Arc<Session>,
    location: Location,
    contacts: Vec<String>,
    agreement: Option<String>,
}

impl Registration {
    /// Contact URIs the account was registered with, in order.
    pub fn contacts(&self) -> &[String] {
        &self.contacts
    }

    /// Terms-of-service URI from the response's `Link` header, if the
    /// server advertised one.
    pub fn agreement(&self) -> Option<&str> {
        self.agreement.as_deref()
    }
}

impl AcmeResource for Registration {
    fn session(&self) -> &Arc<Session> {
        &self.session
    }

    fn location(&self) -> Option<&str> {
        self.location.get()
    }
}
