//! Integration tests using mock HTTP server
//!
//! Tests the full end-to-end flow: config → rate-gated HTTP requests →
//! pagination → mapped records → JSON/CSV output

use mailgun_export::config::{load_config_from_str, ExportConfig, HttpSettings};
use mailgun_export::engine::{ExportEngine, ExportStatus};
use mailgun_export::http::{HttpClient, HttpClientConfig, RateGate, RateGateConfig};
use mailgun_export::pagination::Paginator;
use mailgun_export::types::{BackoffType, ExportFormat, ResourceKind};
use mailgun_export::Error;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::tempdir;
use wiremock::matchers::{header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(max_retries: u32) -> HttpClient {
    let config = HttpClientConfig::builder()
        .timeout(Duration::from_secs(5))
        .max_retries(max_retries)
        .backoff(
            BackoffType::Exponential,
            Duration::from_millis(10),
            Duration::from_millis(50),
        )
        .build();
    let gate = RateGate::new(RateGateConfig::new(300, 4)).unwrap();
    HttpClient::new(config, gate).unwrap()
}

fn config_for(server: &MockServer, output_dir: &std::path::Path) -> ExportConfig {
    let mut config = ExportConfig {
        api_key: Some("key-integration".to_string()),
        domain: Some("mg.example.com".to_string()),
        api_host: Some(server.uri()),
        http: HttpSettings {
            max_retries: 1,
            initial_backoff_ms: 10,
            max_backoff_ms: 50,
            ..HttpSettings::default()
        },
        ..ExportConfig::default()
    };
    config.export.output_dir = output_dir.display().to_string();
    config
}

// ============================================================================
// Pagination Integration Tests
// ============================================================================

#[tokio::test]
async fn test_two_page_collection() {
    let server = MockServer::start().await;
    let page2 = format!("{}/v3/items?page=2", server.uri());

    Mock::given(method("GET"))
        .and(path("/v3/items"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"items": [{"id": 3}], "paging": {}})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": 1}, {"id": 2}],
            "paging": {"next": page2}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let paginator = Paginator::new(client(0));
    let records = paginator
        .fetch_all(&format!("{}/v3/items", server.uri()))
        .await
        .unwrap();

    assert_eq!(records, vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})]);
}

#[tokio::test]
async fn test_single_object_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/domains/mg.example.com/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"domain": {"state": "active"}})))
        .expect(1)
        .mount(&server)
        .await;

    let records = Paginator::new(client(0))
        .fetch_all(&format!("{}/v3/domains/mg.example.com/verify", server.uri()))
        .await
        .unwrap();
    assert_eq!(records, vec![json!({"domain": {"state": "active"}})]);
}

// ============================================================================
// Retry Integration Tests
// ============================================================================

#[tokio::test]
async fn test_rate_limited_request_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/lists"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/lists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(1)
        .mount(&server)
        .await;

    let body: Value = client(2)
        .fetch_json(&format!("{}/v3/lists", server.uri()))
        .await
        .unwrap();
    assert_eq!(body, json!({"items": []}));
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/domains"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Forbidden"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(3)
        .fetch_json(&format!("{}/v3/domains", server.uri()))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert!(matches!(err, Error::HttpStatus { .. }));
    assert_eq!(err.to_string(), "HTTP 401: Forbidden");
}

#[tokio::test]
async fn test_retries_exhausted_on_persistent_429() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/events"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(2)
        .fetch_json(&format!("{}/v3/events", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(429));
}

// ============================================================================
// Export Integration Tests
// ============================================================================

#[tokio::test]
async fn test_export_events_across_pages() {
    let server = MockServer::start().await;
    let page2 = format!("{}/v3/events/page2", server.uri());

    Mock::given(method("GET"))
        .and(path("/v3/events"))
        .and(query_param("limit", "300"))
        .and(header_exists("Authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {"id": "e1", "event": "delivered", "timestamp": 1_709_296_200.5,
                 "recipient": "a@example.org", "message": {"headers": {"subject": "Hi"}}},
                {"id": "e2", "event": "opened", "timestamp": 1_709_296_300.0,
                 "recipient": "b@example.org"}
            ],
            "paging": {"next": page2}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/events/page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [], "paging": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = config_for(&server, dir.path());
    let engine = ExportEngine::from_config(&config).unwrap();

    let report = engine
        .run(&[ResourceKind::Events], ExportFormat::Both)
        .await
        .unwrap();

    let events = report.outcome(ResourceKind::Events).unwrap();
    assert_eq!(events.status, ExportStatus::Success);
    assert_eq!(events.record_count, 2);
    assert_eq!(events.files.len(), 2);

    let json_file: Value =
        serde_json::from_str(&std::fs::read_to_string(&events.files[0]).unwrap()).unwrap();
    assert_eq!(json_file["dataType"], json!("events"));
    assert_eq!(json_file["totalRecords"], json!(2));
    assert_eq!(json_file["data"][0]["id"], json!("e1"));

    let csv = std::fs::read_to_string(&events.files[1]).unwrap();
    let header = csv.lines().next().unwrap();
    assert!(header.starts_with("id,"));
    assert_eq!(csv.lines().count(), 3);

    assert!(report.summary_path.is_some());
}

#[tokio::test]
async fn test_export_isolates_failed_kinds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/lists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v4/mg.example.com/templates"))
        .respond_with(ResponseTemplate::new(404).set_body_string("domain not found"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = config_for(&server, dir.path());
    let engine = ExportEngine::from_config(&config).unwrap();

    let report = engine
        .run(&[ResourceKind::Templates, ResourceKind::Lists], ExportFormat::Json)
        .await
        .unwrap();

    assert_eq!(report.success_count(), 1);
    let templates = report.outcome(ResourceKind::Templates).unwrap();
    assert_eq!(templates.errors, vec!["HTTP 404: domain not found"]);

    let summary: Value = serde_json::from_str(
        &std::fs::read_to_string(report.summary_path.as_deref().unwrap()).unwrap(),
    )
    .unwrap();
    assert_eq!(summary["dataType"], json!("export_summary"));
    assert_eq!(summary["data"]["exports"]["lists"]["status"], json!("success"));
    assert_eq!(summary["data"]["exports"]["templates"]["status"], json!("error"));
}

#[tokio::test]
async fn test_engine_from_yaml_config() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/domains"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let yaml = format!(
        "api_key: key-yaml\ndomain: mg.example.com\napi_host: {}\nexport:\n  output_dir: {}\n  file_prefix: acme\n",
        server.uri(),
        dir.path().display()
    );
    let config = load_config_from_str(&yaml).unwrap();
    config.validate().unwrap();

    let report = ExportEngine::from_config(&config)
        .unwrap()
        .run(&[ResourceKind::Domains], ExportFormat::Json)
        .await
        .unwrap();

    let domains = report.outcome(ResourceKind::Domains).unwrap();
    assert!(domains.is_success());
    assert_eq!(domains.record_count, 0);
    assert!(domains.files[0].contains("acme_domains_"));
}
