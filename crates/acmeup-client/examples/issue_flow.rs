//! Walk through the registration and challenge flow against a scripted
//! in-memory server.
//!
//! Usage:
//!   cargo run --example issue_flow
//!
//! A real integration implements [`AcmeTransport`] on top of an HTTP/TLS
//! client; the scripted transport here stands in for the server so the flow
//! can run offline.

use std::collections::VecDeque;
use std::sync::Arc;

use acmeup_client::{
    AccountKey, AcmeResource, AcmeTransport, Challenge, RegistrationBuilder, Session,
    TransportError, UpdateOutcome,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Map, Value};

struct ScriptedResponse {
    status: u16,
    body: Value,
    location: Option<String>,
    links: Vec<(&'static str, &'static str)>,
    retry_after: Option<DateTime<Utc>>,
    nonce: &'static str,
}

#[derive(Default)]
struct ScriptedTransport {
    responses: VecDeque<ScriptedResponse>,
    current: Option<ScriptedResponse>,
}

#[async_trait]
impl AcmeTransport for ScriptedTransport {
    async fn get(&mut self, url: &str) -> Result<u16, TransportError> {
        println!("-> GET  {url}");
        self.current = self.responses.pop_front();
        Ok(self.current.as_ref().unwrap().status)
    }

    async fn post_signed(&mut self, url: &str, _body: &str) -> Result<u16, TransportError> {
        println!("-> POST {url} (signed)");
        self.current = self.responses.pop_front();
        Ok(self.current.as_ref().unwrap().status)
    }

    async fn read_json_body(&mut self) -> Result<Map<String, Value>, TransportError> {
        match &self.current.as_ref().unwrap().body {
            Value::Object(map) => Ok(map.clone()),
            _ => Err(TransportError::InvalidResponse("no body".to_string())),
        }
    }

    fn location_header(&self) -> Option<String> {
        self.current.as_ref().unwrap().location.clone()
    }

    fn link_header(&self, relation: &str) -> Option<String> {
        self.current
            .as_ref()
            .unwrap()
            .links
            .iter()
            .find(|(rel, _)| *rel == relation)
            .map(|(_, uri)| uri.to_string())
    }

    fn retry_after_header(&self) -> Option<DateTime<Utc>> {
        self.current.as_ref().unwrap().retry_after
    }

    fn replay_nonce_header(&self) -> Option<String> {
        Some(self.current.as_ref().unwrap().nonce.to_string())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let mut transport = ScriptedTransport::default();
    // directory fetch
    transport.responses.push_back(ScriptedResponse {
        status: 200,
        body: json!({ "new-reg": "https://ca.example.com/acme/new-reg" }),
        location: None,
        links: vec![],
        retry_after: None,
        nonce: "nonce-1",
    });
    // registration
    transport.responses.push_back(ScriptedResponse {
        status: 201,
        body: json!({}),
        location: Some("https://ca.example.com/acme/reg/42".to_string()),
        links: vec![("terms-of-service", "https://ca.example.com/terms")],
        retry_after: None,
        nonce: "nonce-2",
    });
    // challenge trigger
    transport.responses.push_back(ScriptedResponse {
        status: 202,
        body: json!({ "type": "http-01", "status": "pending", "token": "curiosity-drives-me" }),
        location: Some("https://ca.example.com/acme/challenge/7".to_string()),
        links: vec![],
        retry_after: None,
        nonce: "nonce-3",
    });
    // first poll: still pending, come back in 30s
    transport.responses.push_back(ScriptedResponse {
        status: 202,
        body: json!({ "type": "http-01", "status": "pending", "token": "curiosity-drives-me" }),
        location: None,
        links: vec![],
        retry_after: Some(Utc::now() + Duration::seconds(30)),
        nonce: "nonce-4",
    });
    // second poll: validated
    transport.responses.push_back(ScriptedResponse {
        status: 200,
        body: json!({
            "type": "http-01",
            "status": "valid",
            "token": "curiosity-drives-me",
            "validated": "2016-01-08T12:30:00Z"
        }),
        location: None,
        links: vec![],
        retry_after: None,
        nonce: "nonce-5",
    });

    let key = AccountKey::generate()?;
    let session = Arc::new(Session::new(
        Box::new(transport),
        key,
        "https://ca.example.com/acme/directory",
    ));

    let registration = RegistrationBuilder::bind(session.clone())
        .add_email("admin@example.com")
        .create()
        .await?;
    println!("registered account at {}", registration.location().unwrap());
    if let Some(terms) = registration.agreement() {
        println!("terms of service: {terms}");
    }
    // subsequent requests reference the account URL instead of the full JWK
    session.use_key_id(registration.location().unwrap());

    let mut challenge = Challenge::http01(session.clone());
    challenge.unmarshall(&match json!({
        "type": "http-01",
        "uri": "https://ca.example.com/acme/challenge/7",
        "token": "curiosity-drives-me"
    }) {
        Value::Object(map) => map,
        _ => unreachable!(),
    })?;

    println!(
        "serve this under /.well-known/acme-challenge/{}: {}",
        challenge.token().unwrap(),
        challenge.key_authorization()?
    );

    challenge.trigger().await?;

    loop {
        match challenge.update().await? {
            UpdateOutcome::Done(status) => {
                println!("challenge finished with status {status:?}");
                break;
            }
            UpdateOutcome::RetryAfter(status, at) => {
                // a real caller would sleep until `at`; the script answers
                // immediately on the next poll
                println!("still {status:?}, server asks us back at {at}");
            }
        }
    }

    Ok(())
}
