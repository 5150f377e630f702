//! HTTP client module
//!
//! Provides the rate-gated, retrying requester used by every fetch.
//!
//! # Features
//!
//! - **Rate Gate**: sliding 60s request window plus bounded concurrency
//! - **Automatic Retries**: bounded attempts with capped backoff
//! - **Transport Seam**: reqwest in production, scripted in tests

mod client;
mod rate_limit;
mod transport;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder};
pub use rate_limit::{AdmissionPermit, RateGate, RateGateConfig, RateGateStatus, WINDOW};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};

#[cfg(test)]
pub(crate) use transport::scripted::ScriptedTransport;

#[cfg(test)]
mod tests;
