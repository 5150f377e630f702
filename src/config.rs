//! Exporter configuration
//!
//! Settings are layered: built-in defaults, then an optional YAML/JSON file,
//! then environment variables and CLI flags (applied by the CLI layer).
//! The HTTP core receives everything it needs at construction and never
//! reads the environment itself.

use crate::auth::{mask_secret, AuthConfig};
use crate::error::{Error, Result};
use crate::http::{HttpClientConfig, RateGateConfig};
use crate::types::{BackoffType, ExportFormat, Region};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete exporter configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Mailgun private API key
    #[serde(default)]
    pub api_key: Option<String>,

    /// Sending domain to export
    #[serde(default)]
    pub domain: Option<String>,

    /// Hosting region
    #[serde(default)]
    pub region: Region,

    /// Host override (tests, proxies); replaces the region host
    #[serde(default)]
    pub api_host: Option<String>,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpSettings,

    /// Output settings
    #[serde(default)]
    pub export: ExportSettings,
}

// ============================================================================
// HTTP Settings
// ============================================================================

/// Rate limit, retry and timeout settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Requests per minute
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,

    /// Concurrent requests in flight
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff growth between retries
    #[serde(default)]
    pub backoff_type: BackoffType,

    /// Base backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Backoff cap in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Per-attempt timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Treat 5xx responses as transient
    #[serde(default)]
    pub retry_server_errors: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            rate_limit: default_rate_limit(),
            max_concurrent: default_max_concurrent(),
            max_retries: default_max_retries(),
            backoff_type: BackoffType::default(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            timeout_secs: default_timeout_secs(),
            retry_server_errors: false,
        }
    }
}

fn default_rate_limit() -> u32 {
    300
}

fn default_max_concurrent() -> usize {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_timeout_secs() -> u64 {
    30
}

// ============================================================================
// Export Settings
// ============================================================================

/// Where and how exports are written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Local directory or object store URL
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// File format
    #[serde(default)]
    pub format: ExportFormat,

    /// File name prefix
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// Start of the historical range (events, stats)
    #[serde(default)]
    pub date_from: Option<NaiveDate>,

    /// End of the historical range
    #[serde(default)]
    pub date_to: Option<NaiveDate>,

    /// Export unsubscribed list members too
    #[serde(default)]
    pub include_unsubscribed: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            format: ExportFormat::default(),
            file_prefix: default_file_prefix(),
            date_from: None,
            date_to: None,
            include_unsubscribed: false,
        }
    }
}

fn default_output_dir() -> String {
    "./exports".to_string()
}

fn default_file_prefix() -> String {
    "mailgun".to_string()
}

// ============================================================================
// Loading
// ============================================================================

/// Load a config file (YAML or JSON, YAML being a superset)
pub fn load_config(path: impl AsRef<Path>) -> Result<ExportConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        Error::config(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;
    load_config_from_str(&content)
}

/// Parse a config document
pub fn load_config_from_str(content: &str) -> Result<ExportConfig> {
    serde_yaml::from_str(content)
        .map_err(|e| Error::config(format!("Failed to parse config: {e}")))
}

// ============================================================================
// Derived Values
// ============================================================================

impl ExportConfig {
    /// Check that the config can drive an export
    pub fn validate(&self) -> Result<()> {
        if self.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(Error::missing_field("api_key (MAILGUN_API_KEY)"));
        }
        if self.domain.as_deref().map_or(true, str::is_empty) {
            return Err(Error::missing_field("domain (MAILGUN_DOMAIN)"));
        }
        if self.http.rate_limit == 0 {
            return Err(Error::invalid_value("rate_limit", "must be greater than zero"));
        }
        if self.http.max_concurrent == 0 {
            return Err(Error::invalid_value(
                "max_concurrent",
                "must be greater than zero",
            ));
        }
        if self.http.timeout_secs == 0 {
            return Err(Error::invalid_value("timeout_secs", "must be greater than zero"));
        }
        if let (Some(from), Some(to)) = (self.export.date_from, self.export.date_to) {
            if from > to {
                return Err(Error::invalid_value(
                    "date_from",
                    format!("{from} is after date_to {to}"),
                ));
            }
        }
        Ok(())
    }

    /// Host serving the API, without version prefix
    pub fn api_host(&self) -> &str {
        self.api_host
            .as_deref()
            .map_or(self.region.api_host(), |h| h.trim_end_matches('/'))
    }

    /// Base URL for v3 resources
    pub fn base_url_v3(&self) -> String {
        format!("{}/v3", self.api_host())
    }

    /// Base URL for v4 resources (templates)
    pub fn base_url_v4(&self) -> String {
        format!("{}/v4", self.api_host())
    }

    /// Domain, or an error if unset
    pub fn require_domain(&self) -> Result<&str> {
        self.domain
            .as_deref()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| Error::missing_field("domain (MAILGUN_DOMAIN)"))
    }

    /// Credential for the configured API key
    pub fn auth(&self) -> AuthConfig {
        self.api_key
            .as_deref()
            .map_or(AuthConfig::None, AuthConfig::api_key)
    }

    /// API key for display
    pub fn masked_api_key(&self) -> String {
        self.api_key
            .as_deref()
            .map_or_else(|| "(not set)".to_string(), mask_secret)
    }

    /// Rate gate settings
    pub fn rate_gate_config(&self) -> RateGateConfig {
        RateGateConfig::new(self.http.rate_limit, self.http.max_concurrent)
    }

    /// HTTP client settings, including the auth and content-type headers
    pub fn http_client_config(&self) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder()
            .base_url(self.base_url_v3())
            .timeout(Duration::from_secs(self.http.timeout_secs))
            .max_retries(self.http.max_retries)
            .backoff(
                self.http.backoff_type,
                Duration::from_millis(self.http.initial_backoff_ms),
                Duration::from_millis(self.http.max_backoff_ms),
            )
            .retry_server_errors(self.http.retry_server_errors)
            .header("Content-Type", "application/json");

        if let Some(value) = self.auth().header_value() {
            builder = builder.header("Authorization", value);
        }
        builder.build()
    }

    /// `date_from` as an RFC 2822 timestamp at midnight UTC
    pub fn begin_rfc2822(&self) -> Option<String> {
        self.export.date_from.map(rfc2822_midnight)
    }

    /// `date_to` as an RFC 2822 timestamp at midnight UTC
    pub fn end_rfc2822(&self) -> Option<String> {
        self.export.date_to.map(rfc2822_midnight)
    }

    /// Output location as a path (local destinations only)
    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.export.output_dir)
    }
}

/// Render a date as RFC 2822 at 00:00:00 UTC
pub fn rfc2822_midnight(date: NaiveDate) -> String {
    date.and_time(NaiveTime::MIN).and_utc().to_rfc2822()
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| {
        Error::invalid_value("date", format!("'{value}' is not YYYY-MM-DD: {e}"))
    })
}
