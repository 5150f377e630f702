//! Network transport
//!
//! The retrying client talks to the network only through [`Transport`], so
//! tests can script responses and failures without sockets.

use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::io::ErrorKind;
use std::time::Duration;

/// One outbound GET
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Fully-qualified URL
    pub url: String,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Attempt timeout
    pub timeout: Duration,
}

/// Response as seen by the retry loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
    /// `Retry-After` in seconds, when present
    pub retry_after: Option<u64>,
}

impl HttpResponse {
    /// Response with the given status and body
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            retry_after: None,
        }
    }
}

/// Performs a single HTTP attempt
///
/// Implementations must map timeouts to [`Error::Timeout`] and connection
/// level failures to [`Error::Transport`] so the client can retry them.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// Transport backed by reqwest
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with the given user agent
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut req = self.client.get(&request.url).timeout(request.timeout);
        for (key, value) in &request.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        let response = req
            .send()
            .await
            .map_err(|e| classify_error(e, request.timeout))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok());
        let body = response
            .text()
            .await
            .map_err(|e| classify_error(e, request.timeout))?;

        Ok(HttpResponse {
            status,
            body,
            retry_after,
        })
    }
}

/// Sort a reqwest failure into the retryable or terminal error classes
fn classify_error(err: reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        return Error::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        };
    }
    if err.is_connect() || has_connection_io_error(&err) {
        return Error::transport(err.to_string());
    }
    Error::Http(err)
}

/// Walk the source chain looking for a dropped connection
fn has_connection_io_error(err: &(dyn StdError + 'static)) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::ConnectionRefused
                    | ErrorKind::BrokenPipe
                    | ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

// ============================================================================
// Scripted transport (tests)
// ============================================================================
