//! Shared test transport: replays canned responses and records requests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock};

use acmeup_client::{AccountKey, AcmeTransport, TransportError};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

pub const DIRECTORY_URL: &str = "https://example.com/acme/directory";

/// One scripted server response
#[derive(Debug, Clone, Default)]
pub struct CannedResponse {
    pub status: u16,
    pub body: Option<Value>,
    pub location: Option<String>,
    pub links: Vec<(String, String)>,
    pub retry_after: Option<DateTime<Utc>>,
    pub nonce: Option<String>,
}

impl CannedResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }

    pub fn with_link(mut self, relation: &str, uri: &str) -> Self {
        self.links.push((relation.to_string(), uri.to_string()));
        self
    }

    pub fn with_retry_after(mut self, instant: DateTime<Utc>) -> Self {
        self.retry_after = Some(instant);
        self
    }

    pub fn with_nonce(mut self, nonce: &str) -> Self {
        self.nonce = Some(nonce.to_string());
        self
    }
}

/// A recorded request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: &'static str,
    pub url: String,
    pub body: Option<String>,
}

/// Shared handle onto the requests a [`TestTransport`] has performed
#[derive(Debug, Clone, Default)]
pub struct RequestLog(Arc<Mutex<Vec<Request>>>);

impl RequestLog {
    pub fn all(&self) -> Vec<Request> {
        self.0.lock().unwrap().clone()
    }

    pub fn last(&self) -> Request {
        self.0.lock().unwrap().last().expect("no requests recorded").clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    fn record(&self, request: Request) {
        self.0.lock().unwrap().push(request);
    }
}

/// Transport double replaying scripted responses in order
#[derive(Debug, Default)]
pub struct TestTransport {
    responses: VecDeque<CannedResponse>,
    current: Option<CannedResponse>,
    log: RequestLog,
}

impl TestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, response: CannedResponse) {
        self.responses.push_back(response);
    }

    pub fn log(&self) -> RequestLog {
        self.log.clone()
    }

    fn advance(&mut self) -> u16 {
        let response = self
            .responses
            .pop_front()
            .expect("test transport ran out of canned responses");
        let status = response.status;
        self.current = Some(response);
        status
    }

    fn current(&self) -> &CannedResponse {
        self.current.as_ref().expect("no response received yet")
    }
}

#[async_trait]
impl AcmeTransport for TestTransport {
    async fn get(&mut self, url: &str) -> Result<u16, TransportError> {
        self.log.record(Request {
            method: "GET",
            url: url.to_string(),
            body: None,
        });
        Ok(self.advance())
    }

    async fn post_signed(&mut self, url: &str, body: &str) -> Result<u16, TransportError> {
        self.log.record(Request {
            method: "POST",
            url: url.to_string(),
            body: Some(body.to_string()),
        });
        Ok(self.advance())
    }

    async fn read_json_body(&mut self) -> Result<Map<String, Value>, TransportError> {
        match &self.current().body {
            Some(Value::Object(map)) => Ok(map.clone()),
            _ => Err(TransportError::InvalidResponse(
                "canned response has no JSON object body".to_string(),
            )),
        }
    }

    fn location_header(&self) -> Option<String> {
        self.current().location.clone()
    }

    fn link_header(&self, relation: &str) -> Option<String> {
        self.current()
            .links
            .iter()
            .find(|(rel, _)| rel == relation)
            .map(|(_, uri)| uri.clone())
    }

    fn retry_after_header(&self) -> Option<DateTime<Utc>> {
        self.current().retry_after
    }

    fn replay_nonce_header(&self) -> Option<String> {
        self.current().nonce.clone()
    }
}

/// Account key shared across the test binary (RSA generation is slow)
pub fn test_key() -> AccountKey {
    static KEY: OnceLock<AccountKey> = OnceLock::new();
    KEY.get_or_init(|| AccountKey::generate().unwrap()).clone()
}

/// Convert a `json!` object literal into the wire document map
pub fn document(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected a JSON object"),
    }
}

/// Decode the payload text embedded in a signed envelope
pub fn jws_payload_text(envelope: &str) -> String {
    let envelope: Value = serde_json::from_str(envelope).expect("envelope is JSON");
    let payload = envelope["payload"].as_str().expect("payload field");
    String::from_utf8(URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap()
}
