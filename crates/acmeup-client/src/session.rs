//! Session context for a client run
//!
//! A [`Session`] binds the transport, the account key and the per-run
//! protocol state: the lazily-fetched directory of resource URIs and the
//! single current anti-replay nonce. It also implements the signed-request
//! protocol every resource operation goes through.
//!
//! A session is `Send + Sync` so it can sit behind an `Arc`, but it models
//! one logical client: the nonce is a single slot that every signed request
//! consumes and refills. Drive a session from one task at a time; concurrent
//! callers must coordinate externally or accept interleaved nonce churn.

use std::sync::Mutex;

use acmeup_jose::{jws, AccountKey, ClaimBuilder, KeyIdentifier};
use acmeup_transport::AcmeTransport;
use tokio::sync::MutexGuard;
use tracing::debug;

use crate::directory::{Directory, Resource};
use crate::error::AcmeError;

/// Process-scoped client context: transport, account key, directory cache
/// and nonce lifecycle.
pub struct Session {
    transport: tokio::sync::Mutex<Box<dyn AcmeTransport>>,
    key: AccountKey,
    directory_url: String,
    directory: tokio::sync::Mutex<Option<Directory>>,
    nonce: Mutex<Option<String>>,
    identifier: Mutex<KeyIdentifier>,
}

impl Session {
    /// Create a session against `directory_url`, authenticating with `key`.
    ///
    /// Resources hold shared handles onto their session, so wrap it in an
    /// `Arc` before binding any. New sessions identify the account by its
    /// full public JWK; switch to the assigned account URL with
    /// [`Session::use_key_id`] once registration has produced one.
    pub fn new(
        transport: Box<dyn AcmeTransport>,
        key: AccountKey,
        directory_url: impl Into<String>,
    ) -> Self {
        Self {
            transport: tokio::sync::Mutex::new(transport),
            key,
            directory_url: directory_url.into(),
            directory: tokio::sync::Mutex::new(None),
            nonce: Mutex::new(None),
            identifier: Mutex::new(KeyIdentifier::PublicJwk),
        }
    }

    pub fn key(&self) -> &AccountKey {
        &self.key
    }

    pub fn directory_url(&self) -> &str {
        &self.directory_url
    }

    /// How signed requests currently identify the account key.
    pub fn key_identifier(&self) -> KeyIdentifier {
        self.identifier.lock().unwrap().clone()
    }

    /// Identify the account by URL (`kid`) in subsequent signed requests.
    pub fn use_key_id(&self, account_url: impl Into<String>) {
        *self.identifier.lock().unwrap() = KeyIdentifier::KeyId(account_url.into());
    }

    /// The currently cached nonce, if any.
    pub fn nonce(&self) -> Option<String> {
        self.nonce.lock().unwrap().clone()
    }

    pub fn set_nonce(&self, nonce: impl Into<String>) {
        *self.nonce.lock().unwrap() = Some(nonce.into());
    }

    fn take_nonce(&self) -> Option<String> {
        self.nonce.lock().unwrap().take()
    }

    /// Store the rotated nonce of the most recent response, when present.
    /// This is the only place a response nonce enters the session.
    pub(crate) fn record_nonce(&self, transport: &dyn AcmeTransport) {
        if let Some(nonce) = transport.replay_nonce_header() {
            *self.nonce.lock().unwrap() = Some(nonce);
        }
    }

    /// Lock the transport for a request/response exchange.
    ///
    /// Operations hold the guard across the request and all response reads
    /// so the response state cannot be clobbered by another call.
    pub async fn transport(&self) -> MutexGuard<'_, Box<dyn AcmeTransport>> {
        self.transport.lock().await
    }

    /// Resolve a logical resource name to its URI via the directory.
    pub async fn resource_uri(&self, resource: Resource) -> Result<String, AcmeError> {
        let mut transport = self.transport().await;
        self.resource_uri_with(&mut **transport, resource).await
    }

    /// Resolve a resource URI using an already-locked transport.
    ///
    /// The directory is fetched on the first lookup and cached for the rest
    /// of the session.
    pub(crate) async fn resource_uri_with(
        &self,
        transport: &mut (dyn AcmeTransport),
        resource: Resource,
    ) -> Result<String, AcmeError> {
        let mut cache = self.directory.lock().await;

        if cache.is_none() {
            debug!(url = %self.directory_url, "fetching directory");
            let status = transport.get(&self.directory_url).await?;
            self.record_nonce(transport);
            if status != 200 {
                return Err(AcmeError::from_response(status, transport).await);
            }
            let document = transport.read_json_body().await?;
            *cache = Some(Directory::from_json(&document));
        }

        cache
            .as_ref()
            .and_then(|directory| directory.uri(resource))
            .map(str::to_string)
            .ok_or_else(|| {
                AcmeError::Protocol(format!("directory has no entry for resource {resource}"))
            })
    }

    /// Send a signed request to `url` and return the raw status code.
    ///
    /// The claim object is serialized exactly once; those bytes are both
    /// signed and sent. The response's rotated nonce is stored even when the
    /// status denotes an error, because the server invalidates the consumed
    /// nonce either way. Interpreting the status code is the caller's job;
    /// response body and headers stay readable on the locked transport.
    pub async fn send_signed(
        &self,
        transport: &mut (dyn AcmeTransport),
        url: &str,
        claims: &ClaimBuilder,
    ) -> Result<u16, AcmeError> {
        let nonce = match self.take_nonce() {
            Some(nonce) => nonce,
            None => {
                // harvest an initial nonce from the directory endpoint
                debug!("no nonce cached, fetching one from the directory");
                transport.get(&self.directory_url).await?;
                self.record_nonce(transport);
                self.take_nonce().ok_or_else(|| {
                    AcmeError::Protocol("server did not supply a replay nonce".to_string())
                })?
            }
        };

        let payload = claims.to_string();
        let body = jws::sign(&self.key, &nonce, &self.key_identifier(), &payload)?;

        debug!(url, "sending signed request");
        let status = transport.post_signed(url, &body).await?;
        self.record_nonce(transport);

        Ok(status)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("directory_url", &self.directory_url)
            .field("key", &self.key)
            .field("has_nonce", &self.nonce.lock().unwrap().is_some())
            .finish()
    }
}
