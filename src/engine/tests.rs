//! Tests for engine module

use super::*;
use crate::config::{ExportConfig, HttpSettings};
use crate::error::Error;
use crate::output::ExportDestination;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use tempfile::tempdir;
use test_case::test_case;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TS: &str = "2024-03-01_12-30-00";

/// Serves fixed payloads; kinds without one fail with HTTP 500
#[derive(Default)]
struct StubFetcher {
    payloads: HashMap<ResourceKind, JsonValue>,
    calls: Mutex<Vec<ResourceKind>>,
}

impl StubFetcher {
    fn with(mut self, kind: ResourceKind, payload: JsonValue) -> Self {
        self.payloads.insert(kind, payload);
        self
    }

    fn calls(&self) -> Vec<ResourceKind> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceFetcher for StubFetcher {
    async fn fetch(&self, kind: ResourceKind) -> Result<JsonValue> {
        self.calls.lock().unwrap().push(kind);
        self.payloads
            .get(&kind)
            .cloned()
            .ok_or_else(|| Error::http_status(500, "upstream exploded"))
    }
}

fn engine_with(fetcher: Arc<StubFetcher>, dir: &std::path::Path) -> ExportEngine {
    let exporter = FileExporter::new(ExportDestination::local(dir), "mailgun");
    ExportEngine::new(fetcher, exporter)
}

// ============================================================================
// Report Type Tests
// ============================================================================

#[test_case(json!([1, 2, 3]), 3 ; "array")]
#[test_case(json!([]), 0 ; "empty array")]
#[test_case(json!({"bounces": [1, 2], "complaints": [3], "unsubscribes": [], "whitelists": [4]}), 4 ; "object of arrays")]
#[test_case(json!({"general": null, "generatedAt": "now"}), 2 ; "object without arrays")]
#[test_case(json!(null), 0 ; "null")]
fn test_record_count(data: JsonValue, expected: usize) {
    assert_eq!(record_count(&data), expected);
}

#[test]
fn test_plan_label() {
    assert_eq!(
        plan_label(&[ResourceKind::Events, ResourceKind::Stats]),
        "events, stats"
    );
    assert_eq!(plan_label(&ResourceKind::ALL).split(", ").count(), 6);
    assert_eq!(plan_label(&[]), "");
}

#[test]
fn test_outcome_constructors() {
    let ok = ResourceOutcome::success(ResourceKind::Events, 5, vec!["a.json".into()])
        .with_duration_ms(1500);
    assert!(ok.is_success());
    assert_eq!(ok.duration_label(), "1.5s");

    let failed = ResourceOutcome::failure(ResourceKind::Lists, "HTTP 401: nope");
    assert!(!failed.is_success());
    assert_eq!(failed.record_count, 0);
    assert!(failed.files.is_empty());
    assert_eq!(failed.errors, vec!["HTTP 401: nope"]);
    assert_eq!(failed.duration_label(), "0.0s");
}

#[test]
fn test_report_totals_and_summary() {
    let mut report = ExportReport::new(TS);
    report.outcomes.push(
        ResourceOutcome::success(ResourceKind::Events, 10, vec!["e.json".into(), "e.csv".into()])
            .with_duration_ms(200),
    );
    report
        .outcomes
        .push(ResourceOutcome::failure(ResourceKind::Stats, "boom"));

    assert_eq!(report.total_records(), 10);
    assert_eq!(report.total_files(), 2);
    assert_eq!(report.success_count(), 1);
    assert_eq!(report.failure_count(), 1);
    assert!(!report.is_success());
    assert!(report.outcome(ResourceKind::Stats).is_some());
    assert!(report.outcome(ResourceKind::Lists).is_none());

    let summary = report.summary("2024-03-01T12:30:00Z");
    assert_eq!(
        summary,
        json!({
            "exportedAt": "2024-03-01T12:30:00Z",
            "totalDataTypes": 2,
            "exports": {
                "events": {
                    "status": "success",
                    "recordCount": 10,
                    "files": ["e.json", "e.csv"],
                    "duration": "0.2s",
                    "errors": []
                },
                "stats": {
                    "status": "error",
                    "recordCount": 0,
                    "files": [],
                    "duration": "0.0s",
                    "errors": ["boom"]
                }
            }
        })
    );
}

// ============================================================================
// ExportEngine Tests
// ============================================================================

#[tokio::test]
async fn test_run_isolates_failures() {
    let dir = tempdir().unwrap();
    let fetcher = Arc::new(
        StubFetcher::default()
            .with(ResourceKind::Events, json!([{"id": 1}, {"id": 2}]))
            .with(ResourceKind::Lists, json!([])),
    );
    let engine = engine_with(fetcher.clone(), dir.path());

    let kinds = [
        ResourceKind::Events,
        ResourceKind::Domains,
        ResourceKind::Lists,
    ];
    let report = engine.run_at(&kinds, ExportFormat::Json, TS).await.unwrap();

    assert_eq!(fetcher.calls(), kinds.to_vec());
    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.success_count(), 2);

    let events = report.outcome(ResourceKind::Events).unwrap();
    assert_eq!(events.record_count, 2);
    assert_eq!(events.files.len(), 1);

    let domains = report.outcome(ResourceKind::Domains).unwrap();
    assert_eq!(domains.status, ExportStatus::Error);
    assert_eq!(domains.record_count, 0);
    assert_eq!(domains.errors, vec!["HTTP 500: upstream exploded"]);

    let summary_path = report.summary_path.as_deref().unwrap();
    assert!(summary_path.ends_with("mailgun_export_summary_2024-03-01_12-30-00.json"));
    let summary: JsonValue =
        serde_json::from_str(&std::fs::read_to_string(summary_path).unwrap()).unwrap();
    assert_eq!(summary["data"]["totalDataTypes"], json!(3));
    assert_eq!(
        summary["data"]["exports"]["domains"]["errors"],
        json!(["HTTP 500: upstream exploded"])
    );
    assert_eq!(summary["data"]["exports"]["events"]["recordCount"], json!(2));
}

#[tokio::test]
async fn test_run_with_csv_writes_tabular_files() {
    let dir = tempdir().unwrap();
    let fetcher = Arc::new(
        StubFetcher::default()
            .with(ResourceKind::Events, json!([{"id": 1, "message": {"subject": "Hi"}}]))
            .with(
                ResourceKind::Suppressions,
                json!({"bounces": [{"address": "a@example.org"}], "complaints": []}),
            ),
    );
    let engine = engine_with(fetcher, dir.path());

    let report = engine
        .run_at(
            &[ResourceKind::Events, ResourceKind::Suppressions],
            ExportFormat::Both,
            TS,
        )
        .await
        .unwrap();

    let events = report.outcome(ResourceKind::Events).unwrap();
    assert_eq!(events.files.len(), 2);
    let csv = std::fs::read_to_string(&events.files[1]).unwrap();
    assert_eq!(csv, "id,message_subject\n1,Hi\n");

    // suppressions are an object: JSON only
    let suppressions = report.outcome(ResourceKind::Suppressions).unwrap();
    assert_eq!(suppressions.files.len(), 1);
    assert_eq!(suppressions.record_count, 1);
    assert!(report.is_success());
}

#[tokio::test]
async fn test_export_kind_never_fails() {
    let dir = tempdir().unwrap();
    let engine = engine_with(Arc::new(StubFetcher::default()), dir.path());

    let outcome = engine
        .export_kind(ResourceKind::Templates, ExportFormat::Json, TS)
        .await;
    assert_eq!(outcome.status, ExportStatus::Error);
    assert!(outcome.files.is_empty());
}

#[tokio::test]
async fn test_engine_from_config_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/domains"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/lists"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Forbidden"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let mut config = ExportConfig {
        api_key: Some("key-test".to_string()),
        domain: Some("example.com".to_string()),
        api_host: Some(server.uri()),
        http: HttpSettings {
            max_retries: 0,
            ..HttpSettings::default()
        },
        ..ExportConfig::default()
    };
    config.export.output_dir = dir.path().join("exports").display().to_string();

    let engine = ExportEngine::from_config(&config).unwrap();
    let report = engine
        .run(&[ResourceKind::Domains, ResourceKind::Lists], ExportFormat::Json)
        .await
        .unwrap();

    assert!(report.outcome(ResourceKind::Domains).unwrap().is_success());
    let lists = report.outcome(ResourceKind::Lists).unwrap();
    assert_eq!(lists.status, ExportStatus::Error);
    assert!(lists.errors[0].contains("401"));
    assert!(dir.path().join("exports").is_dir());
}
