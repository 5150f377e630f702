//! HTTP client with retry and rate limiting
//!
//! Provides the retrying requester every resource fetch goes through:
//! - Each attempt is admitted by the shared [`RateGate`]
//! - Transient failures are retried with capped backoff
//! - Terminal failures surface immediately
//! - Response bodies are parsed as JSON on request

use super::rate_limit::RateGate;
use super::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
use crate::error::{Error, Result};
use crate::types::BackoffType;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL for relative paths
    pub base_url: Option<String>,
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Maximum delay between attempts
    pub max_backoff: Duration,
    /// Type of backoff strategy
    pub backoff_type: BackoffType,
    /// Treat 5xx responses as transient
    pub retry_server_errors: bool,
    /// Headers sent with every request
    pub default_headers: HashMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_backoff: Duration::from_millis(1000),
            max_backoff: Duration::from_secs(60),
            backoff_type: BackoffType::Exponential,
            retry_server_errors: false,
            default_headers: HashMap::new(),
            user_agent: format!("mailgun-export/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set max retries
    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set backoff configuration
    #[must_use]
    pub fn backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.config.backoff_type = backoff_type;
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    /// Retry 5xx responses
    #[must_use]
    pub fn retry_server_errors(mut self, retry: bool) -> Self {
        self.config.retry_server_errors = retry;
        self
    }

    /// Add a default header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// HTTP client with retry and rate limiting
///
/// Cheap to clone; clones share the transport and the rate gate.
#[derive(Clone)]
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    gate: RateGate,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Create a client backed by reqwest
    pub fn new(config: HttpClientConfig, gate: RateGate) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.user_agent)?;
        Ok(Self::with_transport(config, gate, Arc::new(transport)))
    }

    /// Create a client over an arbitrary transport
    pub fn with_transport(
        config: HttpClientConfig,
        gate: RateGate,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            transport,
            gate,
            config,
        }
    }

    /// Get the client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Get the shared rate gate
    pub fn gate(&self) -> &RateGate {
        &self.gate
    }

    /// Issue one logical GET, retrying transient failures
    ///
    /// Returns the 2xx response, or the last error once retries are spent.
    pub async fn fetch(&self, url: &str) -> Result<HttpResponse> {
        let request = HttpRequest {
            url: self.build_url(url),
            headers: self.config.default_headers.clone(),
            timeout: self.config.timeout,
        };
        let max_attempts = self.config.max_retries + 1;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let outcome = {
                let _permit = self.gate.admit().await;
                self.transport.get(&request).await
            };

            let err = match outcome.and_then(check_status) {
                Ok(response) => {
                    debug!("GET {} -> {}", request.url, response.status);
                    return Ok(response);
                }
                Err(e) => e,
            };

            if !self.should_retry(&err) {
                return Err(err);
            }
            if attempt >= max_attempts {
                warn!(
                    "Giving up on {} after {} attempts: {}",
                    request.url, attempt, err
                );
                return Err(err);
            }

            let delay = self.retry_delay(attempt, &err);
            warn!(
                "Request failed ({}), attempt {}/{}, retrying in {:?}",
                err, attempt, max_attempts, delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Fetch and parse the body as JSON
    pub async fn fetch_json(&self, url: &str) -> Result<Value> {
        let response = self.fetch(url).await?;
        Ok(serde_json::from_str(&response.body)?)
    }

    /// Resolve a path against the base URL and append query parameters
    ///
    /// Repeated keys are kept, in order.
    pub fn url_with_query(&self, path: &str, params: &[(&str, String)]) -> Result<String> {
        let mut url = Url::parse(&self.build_url(path))?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url.into())
    }

    /// Build full URL from path
    ///
    /// Absolute URLs, such as pagination cursors, pass through untouched.
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        match &self.config.base_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                let path = path.trim_start_matches('/');
                format!("{base}/{path}")
            }
            None => path.to_string(),
        }
    }

    /// Backoff delay after the given 1-based attempt
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let step = attempt.max(1);
        let delay = match self.config.backoff_type {
            BackoffType::Constant => self.config.initial_backoff,
            BackoffType::Linear => self.config.initial_backoff.saturating_mul(step),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(step - 1);
                self.config.initial_backoff.saturating_mul(factor)
            }
        };

        std::cmp::min(delay, self.config.max_backoff)
    }

    fn should_retry(&self, err: &Error) -> bool {
        err.is_retryable() || (self.config.retry_server_errors && err.is_server_error())
    }

    /// Backoff, stretched to a larger server-requested Retry-After
    fn retry_delay(&self, attempt: u32, err: &Error) -> Duration {
        let computed = self.calculate_backoff(attempt);
        match err {
            Error::RateLimited {
                retry_after_seconds: Some(seconds),
            } => {
                let requested = Duration::from_secs(*seconds).min(self.config.max_backoff);
                computed.max(requested)
            }
            _ => computed,
        }
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.config.base_url)
            .field("max_retries", &self.config.max_retries)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

/// Map a non-2xx response to its error class
fn check_status(response: HttpResponse) -> Result<HttpResponse> {
    match response.status {
        200..=299 => Ok(response),
        429 => Err(Error::RateLimited {
            retry_after_seconds: response.retry_after,
        }),
        status => Err(Error::http_status(status, response.body)),
    }
}
