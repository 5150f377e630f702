//! Export engine module
//!
//! Runs an export: fetches each requested resource kind, writes its files
//! and records the outcome.
//!
//! # Overview
//!
//! The engine module provides:
//! - `ExportEngine` - Exports resource kinds in order, isolating failures
//! - `ResourceFetcher` - Source of resource payloads (the Mailgun API)
//! - `ExportReport` - Per-kind outcomes and the summary report

mod types;

pub use types::{record_count, ExportReport, ExportStatus, ResourceOutcome};

use crate::config::ExportConfig;
use crate::error::Result;
use crate::output::{export_timestamp, FileExporter};
use crate::resources::{ApiContext, MailgunResources};
use crate::types::{ExportFormat, JsonValue, ResourceKind};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Produces the export payload of a resource kind
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, kind: ResourceKind) -> Result<JsonValue>;
}

#[async_trait]
impl ResourceFetcher for MailgunResources {
    async fn fetch(&self, kind: ResourceKind) -> Result<JsonValue> {
        MailgunResources::fetch(self, kind).await
    }
}

/// Export engine
pub struct ExportEngine {
    fetcher: Arc<dyn ResourceFetcher>,
    exporter: FileExporter,
}

impl ExportEngine {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>, exporter: FileExporter) -> Self {
        Self { fetcher, exporter }
    }

    /// Engine over the Mailgun API and the configured output
    pub fn from_config(config: &ExportConfig) -> Result<Self> {
        let resources = MailgunResources::new(ApiContext::from_config(config)?);
        let exporter = FileExporter::from_settings(&config.export)?;
        Ok(Self::new(Arc::new(resources), exporter))
    }

    pub fn exporter(&self) -> &FileExporter {
        &self.exporter
    }

    /// Export `kinds` in order and write the summary report
    ///
    /// A failing kind is recorded in the report and the run moves on.
    /// Only a failure to write the summary itself is returned as an error.
    pub async fn run(&self, kinds: &[ResourceKind], format: ExportFormat) -> Result<ExportReport> {
        self.run_at(kinds, format, &export_timestamp()).await
    }

    /// [`run`](Self::run) with an explicit file timestamp
    pub async fn run_at(
        &self,
        kinds: &[ResourceKind],
        format: ExportFormat,
        timestamp: &str,
    ) -> Result<ExportReport> {
        let start = Instant::now();
        let mut report = ExportReport::new(timestamp);

        info!("Export plan: {}", plan_label(kinds));

        for &kind in kinds {
            report
                .outcomes
                .push(self.export_kind(kind, format, timestamp).await);
        }

        let summary = report.summary(&Utc::now().to_rfc3339());
        report.summary_path = Some(self.exporter.export_summary(&summary, timestamp).await?);
        report.duration_ms = elapsed_ms(start);

        log_report(&report);
        Ok(report)
    }

    /// Fetch and write one kind; never fails, errors land in the outcome
    pub async fn export_kind(
        &self,
        kind: ResourceKind,
        format: ExportFormat,
        timestamp: &str,
    ) -> ResourceOutcome {
        info!("Exporting {}...", kind);
        let start = Instant::now();

        match self.fetch_and_write(kind, format, timestamp).await {
            Ok((count, files)) => {
                let outcome = ResourceOutcome::success(kind, count, files)
                    .with_duration_ms(elapsed_ms(start));
                info!(
                    "{} exported successfully ({})",
                    kind,
                    outcome.duration_label()
                );
                outcome
            }
            Err(e) => {
                error!("Failed to export {}: {}", kind, e);
                ResourceOutcome::failure(kind, e.to_string())
            }
        }
    }

    async fn fetch_and_write(
        &self,
        kind: ResourceKind,
        format: ExportFormat,
        timestamp: &str,
    ) -> Result<(usize, Vec<String>)> {
        let data = self.fetcher.fetch(kind).await?;
        let files = self
            .exporter
            .export_data(&data, kind.as_str(), format, timestamp)
            .await?;
        Ok((record_count(&data), files))
    }
}

/// Kinds as a comma-separated list, in export order
pub fn plan_label(kinds: &[ResourceKind]) -> String {
    kinds
        .iter()
        .map(|kind| kind.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn log_report(report: &ExportReport) {
    for outcome in &report.outcomes {
        let mark = if outcome.is_success() { "ok" } else { "FAILED" };
        info!(
            "{:<6} {:<15} {:>8} records {:>8}",
            mark,
            outcome.kind.as_str(),
            outcome.record_count,
            outcome.duration_label()
        );
    }
    info!(
        "Total: {} records, {} files; {} successful, {} failed",
        report.total_records(),
        report.total_files(),
        report.success_count(),
        report.failure_count()
    );
}

#[cfg(test)]
mod tests;
