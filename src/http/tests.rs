//! Tests for the HTTP client module

use super::*;
use crate::error::Error;
use crate::types::BackoffType;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use test_case::test_case;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helpers
// ============================================================================

fn gate() -> RateGate {
    RateGate::new(RateGateConfig::default()).unwrap()
}

fn scripted_client(
    outcomes: Vec<crate::error::Result<HttpResponse>>,
    max_retries: u32,
) -> (HttpClient, Arc<ScriptedTransport>) {
    let transport = Arc::new(ScriptedTransport::new(outcomes));
    let config = HttpClientConfig::builder()
        .base_url("https://api.mailgun.net/v3")
        .max_retries(max_retries)
        .build();
    let client = HttpClient::with_transport(config, gate(), transport.clone());
    (client, transport)
}

fn timeout() -> crate::error::Result<HttpResponse> {
    Err(Error::Timeout { timeout_ms: 30_000 })
}

fn ok(body: &str) -> crate::error::Result<HttpResponse> {
    Ok(HttpResponse::new(200, body))
}

fn gaps(instants: &[tokio::time::Instant]) -> Vec<Duration> {
    instants.windows(2).map(|w| w[1] - w[0]).collect()
}

fn mock_client(server: &MockServer) -> HttpClient {
    let config = HttpClientConfig::builder()
        .base_url(format!("{}/v3", server.uri()))
        .backoff(
            BackoffType::Exponential,
            Duration::from_millis(10),
            Duration::from_millis(50),
        )
        .header("Authorization", "Basic YXBpOmtleS10ZXN0")
        .header("Content-Type", "application/json")
        .build();
    HttpClient::new(config, gate()).unwrap()
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn test_http_client_config_default() {
    let config = HttpClientConfig::default();
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.initial_backoff, Duration::from_secs(1));
    assert_eq!(config.backoff_type, BackoffType::Exponential);
    assert!(!config.retry_server_errors);
    assert!(config.base_url.is_none());
    assert!(config.user_agent.starts_with("mailgun-export/"));
}

#[test]
fn test_http_client_config_builder() {
    let config = HttpClientConfig::builder()
        .base_url("https://api.eu.mailgun.net/v3")
        .timeout(Duration::from_secs(10))
        .max_retries(5)
        .backoff(
            BackoffType::Linear,
            Duration::from_millis(200),
            Duration::from_secs(30),
        )
        .retry_server_errors(true)
        .header("X-Custom", "value")
        .user_agent("test-agent/1.0")
        .build();

    assert_eq!(
        config.base_url,
        Some("https://api.eu.mailgun.net/v3".to_string())
    );
    assert_eq!(config.timeout, Duration::from_secs(10));
    assert_eq!(config.max_retries, 5);
    assert_eq!(config.backoff_type, BackoffType::Linear);
    assert!(config.retry_server_errors);
    assert_eq!(
        config.default_headers.get("X-Custom"),
        Some(&"value".to_string())
    );
    assert_eq!(config.user_agent, "test-agent/1.0");
}

// ============================================================================
// URL building
// ============================================================================

#[test]
fn test_build_url() {
    let (client, _) = scripted_client(vec![], 0);
    assert_eq!(
        client.build_url("/domains"),
        "https://api.mailgun.net/v3/domains"
    );
    assert_eq!(
        client.build_url("mg.example.com/bounces"),
        "https://api.mailgun.net/v3/mg.example.com/bounces"
    );
    assert_eq!(
        client.build_url("https://api.mailgun.net/v3/events/WzMsIFsiZSJd"),
        "https://api.mailgun.net/v3/events/WzMsIFsiZSJd"
    );
}

#[test]
fn test_url_with_query_keeps_repeated_keys() {
    let (client, _) = scripted_client(vec![], 0);
    let url = client
        .url_with_query(
            "/mg.example.com/stats/total",
            &[
                ("event", "accepted".to_string()),
                ("event", "delivered".to_string()),
                ("duration", "30d".to_string()),
            ],
        )
        .unwrap();
    assert_eq!(
        url,
        "https://api.mailgun.net/v3/mg.example.com/stats/total?event=accepted&event=delivered&duration=30d"
    );

    let bare = client.url_with_query("/domains", &[]).unwrap();
    assert_eq!(bare, "https://api.mailgun.net/v3/domains");
}

// ============================================================================
// Backoff
// ============================================================================

#[test_case(BackoffType::Exponential, &[1000, 2000, 4000, 8000, 10_000] ; "exponential")]
#[test_case(BackoffType::Linear, &[1000, 2000, 3000, 4000, 5000] ; "linear")]
#[test_case(BackoffType::Constant, &[1000, 1000, 1000, 1000, 1000] ; "constant")]
fn test_calculate_backoff(backoff_type: BackoffType, expected_ms: &[u64]) {
    let config = HttpClientConfig::builder()
        .backoff(
            backoff_type,
            Duration::from_millis(1000),
            Duration::from_secs(10),
        )
        .build();
    let (_, transport) = scripted_client(vec![], 0);
    let client = HttpClient::with_transport(config, gate(), transport);

    let delays: Vec<u64> = (1..=5)
        .map(|attempt| client.calculate_backoff(attempt).as_millis() as u64)
        .collect();
    assert_eq!(delays, expected_ms);
}

// ============================================================================
// Retry loop (virtual time)
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_transient_failures_then_success() {
    let (client, transport) = scripted_client(vec![timeout(), timeout(), ok("{}")], 3);

    let response = client.fetch("/domains").await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(transport.call_count(), 3);
    assert_eq!(
        gaps(&transport.instants()),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_always_failing_gives_up_after_bound() {
    let outcomes = (0..10)
        .map(|_| Err(Error::transport("connection reset by peer")))
        .collect();
    let (client, transport) = scripted_client(outcomes, 3);

    let err = client.fetch("/domains").await.unwrap_err();

    assert!(matches!(err, Error::Transport { .. }));
    assert_eq!(transport.call_count(), 4);
    assert_eq!(
        gaps(&transport.instants()),
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_zero_retries_means_single_attempt() {
    let (client, transport) = scripted_client(vec![timeout(), ok("{}")], 0);

    let err = client.fetch("/domains").await.unwrap_err();

    assert!(matches!(err, Error::Timeout { .. }));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_longer_than_backoff_is_honoured() {
    let limited = Ok(HttpResponse {
        status: 429,
        body: String::new(),
        retry_after: Some(5),
    });
    let (client, transport) = scripted_client(vec![limited, ok("{}")], 3);

    client.fetch("/events").await.unwrap();

    assert_eq!(gaps(&transport.instants()), vec![Duration::from_secs(5)]);
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_shorter_than_backoff_uses_backoff() {
    let limited = |secs| {
        Ok(HttpResponse {
            status: 429,
            body: String::new(),
            retry_after: Some(secs),
        })
    };
    let (client, transport) = scripted_client(vec![limited(0), limited(1), ok("{}")], 3);

    client.fetch("/events").await.unwrap();

    assert_eq!(
        gaps(&transport.instants()),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_exhausts_budget() {
    let outcomes = (0..4).map(|_| Ok(HttpResponse::new(429, ""))).collect();
    let (client, transport) = scripted_client(outcomes, 3);

    let err = client.fetch("/events").await.unwrap_err();

    assert!(matches!(
        err,
        Error::RateLimited {
            retry_after_seconds: None
        }
    ));
    assert_eq!(transport.call_count(), 4);
}

#[test_case(400 ; "bad request")]
#[test_case(401 ; "unauthorized")]
#[test_case(403 ; "forbidden")]
#[test_case(404 ; "not found")]
#[test_case(500 ; "internal error")]
#[test_case(503 ; "unavailable")]
#[tokio::test]
async fn test_terminal_status_is_single_attempt(status: u16) {
    let (client, transport) =
        scripted_client(vec![Ok(HttpResponse::new(status, "nope")), ok("{}")], 3);

    let err = client.fetch("/domains").await.unwrap_err();

    assert_eq!(err.status(), Some(status));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_server_errors_retried_when_enabled() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Ok(HttpResponse::new(502, "bad gateway")),
        ok("{\"ok\":true}"),
    ]));
    let config = HttpClientConfig::builder().retry_server_errors(true).build();
    let client = HttpClient::with_transport(config, gate(), transport.clone());

    let body = client.fetch_json("https://api.mailgun.net/v3/domains").await.unwrap();

    assert_eq!(body["ok"], true);
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_every_attempt_passes_the_gate() {
    let transport = Arc::new(ScriptedTransport::new(vec![timeout(), timeout(), ok("{}")]));
    let gate = RateGate::new(RateGateConfig::new(2, 10)).unwrap();
    let config = HttpClientConfig::builder()
        .base_url("https://api.mailgun.net/v3")
        .build();
    let client = HttpClient::with_transport(config, gate, transport.clone());

    client.fetch("/domains").await.unwrap();

    // Two attempts fill the window; the third waits for the first to age out.
    let instants = transport.instants();
    assert_eq!(instants[2] - instants[0], WINDOW);
}

#[tokio::test]
async fn test_fetch_json_rejects_invalid_body() {
    let (client, _) = scripted_client(vec![ok("not json")], 0);
    let err = client.fetch_json("/domains").await.unwrap_err();
    assert!(matches!(err, Error::JsonParse(_)));
}

// ============================================================================
// Wire behaviour (wiremock)
// ============================================================================

#[tokio::test]
async fn test_sends_default_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v3/domains"))
        .and(header("Authorization", "Basic YXBpOmtleS10ZXN0"))
        .and(header("Content-Type", "application/json"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [{"name": "mg.example.com"}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = mock_client(&mock_server);
    let url = client
        .url_with_query("/domains", &[("limit", "100".to_string())])
        .unwrap();
    let data = client.fetch_json(&url).await.unwrap();

    assert_eq!(data["items"][0]["name"], "mg.example.com");
}

#[tokio::test]
async fn test_unauthorized_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v3/domains"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Forbidden"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = mock_client(&mock_server);
    let err = client.fetch("/domains").await.unwrap_err();

    assert!(err.is_client_error());
    assert_eq!(err.to_string(), "HTTP 401: Forbidden");
}

#[tokio::test]
async fn test_rate_limit_response_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v3/events"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v3/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = mock_client(&mock_server);
    let data = client.fetch_json("/events").await.unwrap();

    assert_eq!(data["items"], serde_json::json!([]));
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v3/domains"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&mock_server)
        .await;

    let config = HttpClientConfig::builder()
        .base_url(format!("{}/v3", mock_server.uri()))
        .timeout(Duration::from_millis(100))
        .max_retries(0)
        .build();
    let client = HttpClient::new(config, gate()).unwrap();

    let err = client.fetch("/domains").await.unwrap_err();
    assert!(matches!(err, Error::Timeout { timeout_ms: 100 }));
}

#[tokio::test]
async fn test_refused_connection_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = HttpClientConfig::builder()
        .base_url(format!("http://127.0.0.1:{port}/v3"))
        .max_retries(1)
        .backoff(
            BackoffType::Constant,
            Duration::from_millis(5),
            Duration::from_millis(5),
        )
        .build();
    let client = HttpClient::new(config, gate()).unwrap();

    let err = client.fetch("/domains").await.unwrap_err();
    assert!(err.is_retryable(), "unexpected error: {err:?}");
}
