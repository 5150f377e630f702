//! Output module
//!
//! Writes export payloads as files.
//!
//! # Overview
//!
//! This module provides utilities for:
//! - Flattening nested JSON records into string tables
//! - Encoding JSON envelopes, CSV and Parquet (via Arrow)
//! - Writing to a local directory or cloud storage (S3, R2, GCS, Azure)

mod destination;
mod exporter;
mod flatten;
mod writer;

pub use destination::ExportDestination;
pub use exporter::{
    export_timestamp, total_records, ExportEnvelope, FileExporter, SUMMARY_DATA_TYPE,
    TIMESTAMP_FORMAT,
};
pub use flatten::{flatten_record, flatten_with_depth, FlatTable, MAX_FLATTEN_DEPTH};
pub use writer::{encode_csv, encode_json, encode_parquet, ParquetWriterConfig};
