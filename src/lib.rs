// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # mailgun-export
//!
//! Exports the data of a Mailgun account (events, suppressions, domains,
//! mailing lists, templates and statistics) to JSON, CSV or Parquet files,
//! locally or in an object store.
//!
//! ## Features
//!
//! - **Rate Gate**: Sliding one-minute quota plus a concurrency cap shared by every request
//! - **Retries**: Bounded exponential backoff for 429s, timeouts and transport errors
//! - **Pagination**: Follows `paging.next` links with repeated-cursor and empty-page guards
//! - **Enrichment**: Domains, lists and templates joined with their sub-resources
//! - **Output**: JSON envelopes, flattened CSV and Parquet tables, object store destinations
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mailgun_export::{config::ExportConfig, engine::ExportEngine, ExportFormat, ResourceKind};
//!
//! #[tokio::main]
//! async fn main() -> mailgun_export::Result<()> {
//!     let config = ExportConfig {
//!         api_key: Some("key-...".into()),
//!         domain: Some("mg.example.com".into()),
//!         ..ExportConfig::default()
//!     };
//!     config.validate()?;
//!
//!     let engine = ExportEngine::from_config(&config)?;
//!     let report = engine.run(&ResourceKind::ALL, ExportFormat::Both).await?;
//!     println!("{} records exported", report.total_records());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 ExportEngine (per-kind isolation)               │
//! └─────────────────────────────────────────────────────────────────┘
//!                 │                                   │
//! ┌───────────────┴───────────────┐   ┌───────────────┴─────────────┐
//! │          Resources            │   │           Output            │
//! │ events  domains  suppressions │   │ JSON envelope   CSV         │
//! │ lists   templates  stats      │   │ Parquet   local / cloud     │
//! └───────────────────────────────┘   └─────────────────────────────┘
//!                 │
//! ┌───────────────┴───────────────┐
//! │  Paginator → HttpClient       │
//! │  (retry, backoff) → RateGate  │
//! │  → Transport (reqwest)        │
//! └───────────────────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// API key credential
pub mod auth;

/// Rate-gated HTTP client with retry
pub mod http;

/// Link-following pagination
pub mod pagination;

/// Mailgun resource fetchers
pub mod resources;

/// JSON/CSV/Parquet output
pub mod output;

/// Export orchestration
pub mod engine;

/// Configuration
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use config::{load_config, load_config_from_str, ExportConfig};
pub use engine::{ExportEngine, ExportReport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
