//! File encoders
//!
//! Every format is encoded into memory first so the same bytes can go to
//! a local directory or an object store.

use crate::error::{Error, Result};
use arrow::csv::WriterBuilder;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde::Serialize;

/// Configuration for Parquet output
#[derive(Debug, Clone)]
pub struct ParquetWriterConfig {
    compression: Compression,
    row_group_size: usize,
}

impl Default for ParquetWriterConfig {
    fn default() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: 1024 * 1024,
        }
    }
}

impl ParquetWriterConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    #[must_use]
    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    #[must_use]
    pub fn compression(&self) -> Compression {
        self.compression
    }

    fn build_properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build()
    }
}

/// Pretty-printed JSON document
pub fn encode_json<T: Serialize>(value: &T) -> Result<Bytes> {
    let body = serde_json::to_vec_pretty(value)?;
    Ok(Bytes::from(body))
}

/// CSV with a header row; null cells are written empty
pub fn encode_csv(batch: &RecordBatch) -> Result<Bytes> {
    let mut writer = WriterBuilder::new().with_header(true).build(Vec::new());
    writer
        .write(batch)
        .map_err(|e| Error::output(format!("Failed to write CSV: {e}")))?;
    Ok(Bytes::from(writer.into_inner()))
}

/// Single-batch Parquet file
pub fn encode_parquet(batch: &RecordBatch, config: &ParquetWriterConfig) -> Result<Bytes> {
    let props = config.build_properties();
    let mut writer = ArrowWriter::try_new(Vec::new(), batch.schema(), Some(props))
        .map_err(|e| Error::output(format!("Failed to create Parquet writer: {e}")))?;
    writer
        .write(batch)
        .map_err(|e| Error::output(format!("Failed to write batch: {e}")))?;
    let buffer = writer
        .into_inner()
        .map_err(|e| Error::output(format!("Failed to close Parquet writer: {e}")))?;
    Ok(Bytes::from(buffer))
}
