//! Engine types
//!
//! Per-resource outcomes and the report of a whole export run.

use crate::types::{JsonValue, ResourceKind};
use serde::Serialize;
use serde_json::{json, Map};

/// Result of exporting one resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStatus {
    Success,
    Error,
}

/// What happened to one resource kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceOutcome {
    pub kind: ResourceKind,
    pub status: ExportStatus,
    pub record_count: usize,
    pub files: Vec<String>,
    pub duration_ms: u64,
    pub errors: Vec<String>,
}

impl ResourceOutcome {
    pub fn success(kind: ResourceKind, record_count: usize, files: Vec<String>) -> Self {
        Self {
            kind,
            status: ExportStatus::Success,
            record_count,
            files,
            duration_ms: 0,
            errors: Vec::new(),
        }
    }

    /// Failed export: zero records, no files, the error recorded
    pub fn failure(kind: ResourceKind, error: impl Into<String>) -> Self {
        Self {
            kind,
            status: ExportStatus::Error,
            record_count: 0,
            files: Vec::new(),
            duration_ms: 0,
            errors: vec![error.into()],
        }
    }

    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ExportStatus::Success
    }

    /// Duration as shown in summaries, e.g. `1.5s`
    pub fn duration_label(&self) -> String {
        format!("{:.1}s", self.duration_ms as f64 / 1000.0)
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReport {
    /// Timestamp shared by every file of the run
    pub timestamp: String,
    pub outcomes: Vec<ResourceOutcome>,
    /// Where the summary report was written
    pub summary_path: Option<String>,
    pub duration_ms: u64,
}

impl ExportReport {
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            ..Self::default()
        }
    }

    pub fn total_records(&self) -> usize {
        self.outcomes.iter().map(|o| o.record_count).sum()
    }

    pub fn total_files(&self) -> usize {
        self.outcomes.iter().map(|o| o.files.len()).sum()
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }

    /// True when every resource kind exported
    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }

    pub fn outcome(&self, kind: ResourceKind) -> Option<&ResourceOutcome> {
        self.outcomes.iter().find(|o| o.kind == kind)
    }

    /// Body of the summary report file
    pub fn summary(&self, exported_at: &str) -> JsonValue {
        let exports: Map<String, JsonValue> = self
            .outcomes
            .iter()
            .map(|o| {
                let entry = json!({
                    "status": o.status,
                    "recordCount": o.record_count,
                    "files": o.files,
                    "duration": o.duration_label(),
                    "errors": o.errors,
                });
                (o.kind.to_string(), entry)
            })
            .collect();

        json!({
            "exportedAt": exported_at,
            "totalDataTypes": self.outcomes.len(),
            "exports": exports,
        })
    }
}

/// Records in a fetched payload
///
/// Arrays count their elements. Objects count the elements of their array
/// fields (the four suppression lists), or their keys when they hold no
/// arrays. Anything else counts as nothing.
pub fn record_count(data: &JsonValue) -> usize {
    match data {
        JsonValue::Array(items) => items.len(),
        JsonValue::Object(map) => {
            let arrays: Vec<usize> = map
                .values()
                .filter_map(JsonValue::as_array)
                .map(Vec::len)
                .collect();
            if arrays.is_empty() {
                map.len()
            } else {
                arrays.iter().sum()
            }
        }
        _ => 0,
    }
}
