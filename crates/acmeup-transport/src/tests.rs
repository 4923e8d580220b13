//! Tests for the transport abstraction layer

use super::*;
use chrono::TimeZone;
use serde_json::json;

/// Mock transport that replays a single canned response
#[derive(Debug, Default)]
struct MockTransport {
    status: u16,
    body: Option<Value>,
    location: Option<String>,
    links: Vec<(String, String)>,
    retry_after: Option<DateTime<Utc>>,
    nonce: Option<String>,
}

#[async_trait]
impl AcmeTransport for MockTransport {
    async fn get(&mut self, _url: &str) -> TransportResult<u16> {
        Ok(self.status)
    }

    async fn post_signed(&mut self, _url: &str, _body: &str) -> TransportResult<u16> {
        Ok(self.status)
    }

    async fn read_json_body(&mut self) -> TransportResult<Map<String, Value>> {
        match &self.body {
            Some(Value::Object(map)) => Ok(map.clone()),
            _ => Err(TransportError::InvalidResponse(
                "response body is not a JSON object".to_string(),
            )),
        }
    }

    fn location_header(&self) -> Option<String> {
        self.location.clone()
    }

    fn link_header(&self, relation: &str) -> Option<String> {
        self.links
            .iter()
            .find(|(rel, _)| rel == relation)
            .map(|(_, uri)| uri.clone())
    }

    fn retry_after_header(&self) -> Option<DateTime<Utc>> {
        self.retry_after
    }

    fn replay_nonce_header(&self) -> Option<String> {
        self.nonce.clone()
    }
}

#[tokio::test]
async fn test_mock_round_trip() {
    let mut transport = MockTransport {
        status: 200,
        body: Some(json!({"status": "valid"})),
        location: Some("https://example.com/acme/reg/1".to_string()),
        links: vec![(
            "terms-of-service".to_string(),
            "https://example.com/terms".to_string(),
        )],
        nonce: Some("nonce-1".to_string()),
        ..Default::default()
    };

    let status = transport.get("https://example.com/acme/directory").await.unwrap();
    assert_eq!(status, 200);

    let body = transport.read_json_body().await.unwrap();
    assert_eq!(body.get("status"), Some(&json!("valid")));

    assert_eq!(
        transport.location_header().as_deref(),
        Some("https://example.com/acme/reg/1")
    );
    assert_eq!(
        transport.link_header("terms-of-service").as_deref(),
        Some("https://example.com/terms")
    );
    assert_eq!(transport.link_header("up"), None);
    assert_eq!(transport.replay_nonce_header().as_deref(), Some("nonce-1"));
}

#[tokio::test]
async fn test_non_object_body_is_invalid() {
    let mut transport = MockTransport {
        status: 200,
        body: Some(json!([1, 2, 3])),
        ..Default::default()
    };

    let result = transport.read_json_body().await;
    assert!(matches!(result, Err(TransportError::InvalidResponse(_))));
}

#[test]
fn test_parse_retry_after_delta_seconds() {
    let now = Utc.with_ymd_and_hms(2016, 1, 8, 12, 0, 0).unwrap();

    let parsed = parse_retry_after("30", now).unwrap();
    assert_eq!(parsed, now + Duration::seconds(30));

    let parsed = parse_retry_after(" 120 ", now).unwrap();
    assert_eq!(parsed, now + Duration::seconds(120));
}

#[test]
fn test_parse_retry_after_http_date() {
    let now = Utc.with_ymd_and_hms(2016, 1, 8, 12, 0, 0).unwrap();

    let parsed = parse_retry_after("Tue, 15 Nov 1994 08:12:31 GMT", now).unwrap();
    assert_eq!(parsed, Utc.with_ymd_and_hms(1994, 11, 15, 8, 12, 31).unwrap());
}

#[test]
fn test_parse_retry_after_garbage() {
    let now = Utc::now();

    assert_eq!(parse_retry_after("", now), None);
    assert_eq!(parse_retry_after("soon", now), None);
    assert_eq!(parse_retry_after("-5", now), None);
}
