//! Export files: naming, JSON envelope and tabular formats

use super::destination::ExportDestination;
use super::flatten::FlatTable;
use super::writer::{encode_csv, encode_json, encode_parquet, ParquetWriterConfig};
use crate::config::ExportSettings;
use crate::error::Result;
use crate::types::{ExportFormat, JsonValue};
use chrono::{Local, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// Timestamp embedded in file names
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Data type name of the summary report
pub const SUMMARY_DATA_TYPE: &str = "export_summary";

/// Current local time formatted for file names
pub fn export_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Records in a payload: array length, else one
pub fn total_records(data: &JsonValue) -> usize {
    data.as_array().map_or(1, Vec::len)
}

/// JSON file body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEnvelope<'a> {
    pub exported_at: String,
    pub data_type: &'a str,
    pub total_records: usize,
    pub data: &'a JsonValue,
}

/// Writes export payloads to a destination
#[derive(Debug, Clone)]
pub struct FileExporter {
    destination: ExportDestination,
    prefix: String,
    parquet: ParquetWriterConfig,
}

impl FileExporter {
    pub fn new(destination: ExportDestination, prefix: impl Into<String>) -> Self {
        Self {
            destination,
            prefix: prefix.into(),
            parquet: ParquetWriterConfig::default(),
        }
    }

    /// Exporter for the configured output directory or URL
    pub fn from_settings(settings: &ExportSettings) -> Result<Self> {
        let destination = ExportDestination::parse(&settings.output_dir)?;
        Ok(Self::new(destination, settings.file_prefix.clone()))
    }

    #[must_use]
    pub fn with_parquet_config(mut self, config: ParquetWriterConfig) -> Self {
        self.parquet = config;
        self
    }

    pub fn destination(&self) -> &ExportDestination {
        &self.destination
    }

    /// `<prefix>_<dataType>_<timestamp>.<ext>`
    pub fn file_name(&self, data_type: &str, extension: &str, timestamp: &str) -> String {
        format!("{}_{data_type}_{timestamp}.{extension}", self.prefix)
    }

    /// Write the payload in an `{exportedAt, dataType, totalRecords, data}` envelope
    pub async fn export_json(
        &self,
        data: &JsonValue,
        data_type: &str,
        timestamp: &str,
    ) -> Result<String> {
        let envelope = ExportEnvelope {
            exported_at: Utc::now().to_rfc3339(),
            data_type,
            total_records: total_records(data),
            data,
        };
        let file_name = self.file_name(data_type, "json", timestamp);
        let location = self.destination.write(&file_name, encode_json(&envelope)?).await?;
        info!("Exported {} records to {}", envelope.total_records, file_name);
        Ok(location)
    }

    /// Flattened CSV; `None` when the payload is not a non-empty array
    pub async fn export_csv(
        &self,
        data: &JsonValue,
        data_type: &str,
        timestamp: &str,
    ) -> Result<Option<String>> {
        let Some(table) = tabular(data, data_type) else {
            return Ok(None);
        };
        let body = encode_csv(&table.to_record_batch()?)?;
        let file_name = self.file_name(data_type, "csv", timestamp);
        let location = self.destination.write(&file_name, body).await?;
        info!("Exported {} records to {}", table.num_rows(), file_name);
        Ok(Some(location))
    }

    /// Flattened Parquet; `None` when the payload is not a non-empty array
    pub async fn export_parquet(
        &self,
        data: &JsonValue,
        data_type: &str,
        timestamp: &str,
    ) -> Result<Option<String>> {
        let Some(table) = tabular(data, data_type) else {
            return Ok(None);
        };
        let body = encode_parquet(&table.to_record_batch()?, &self.parquet)?;
        let file_name = self.file_name(data_type, "parquet", timestamp);
        let location = self.destination.write(&file_name, body).await?;
        info!("Exported {} records to {}", table.num_rows(), file_name);
        Ok(Some(location))
    }

    /// Write every file `format` asks for and return their locations
    pub async fn export_data(
        &self,
        data: &JsonValue,
        data_type: &str,
        format: ExportFormat,
        timestamp: &str,
    ) -> Result<Vec<String>> {
        let mut files = Vec::new();
        if format.wants_json() {
            files.push(self.export_json(data, data_type, timestamp).await?);
        }
        if format.wants_csv() {
            files.extend(self.export_csv(data, data_type, timestamp).await?);
        }
        if format.wants_parquet() {
            files.extend(self.export_parquet(data, data_type, timestamp).await?);
        }
        Ok(files)
    }

    /// Summary report, always JSON
    pub async fn export_summary(&self, summary: &JsonValue, timestamp: &str) -> Result<String> {
        let location = self
            .export_json(summary, SUMMARY_DATA_TYPE, timestamp)
            .await?;
        info!("Summary report created: {}", location);
        Ok(location)
    }
}

fn tabular(data: &JsonValue, data_type: &str) -> Option<FlatTable> {
    match data.as_array() {
        Some(records) if !records.is_empty() => Some(FlatTable::from_records(records)),
        _ => {
            warn!("No tabular data to export for {}", data_type);
            None
        }
    }
}
