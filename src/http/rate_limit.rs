//! Rate gate implementation
//!
//! Combines a sliding one-minute request window with a bounded pool of
//! concurrency slots. Every outbound request passes through one shared gate.

use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info};

/// Length of the sliding request window
pub const WINDOW: Duration = Duration::from_secs(60);

/// Configuration for the rate gate
#[derive(Debug, Clone)]
pub struct RateGateConfig {
    /// Maximum requests admitted in any trailing 60s window
    pub requests_per_minute: u32,
    /// Maximum number of requests in flight
    pub max_concurrent: usize,
}

impl Default for RateGateConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 300,
            max_concurrent: 10,
        }
    }
}

impl RateGateConfig {
    /// Create a new rate gate config
    pub fn new(requests_per_minute: u32, max_concurrent: usize) -> Self {
        Self {
            requests_per_minute,
            max_concurrent,
        }
    }

    /// Reject configurations the gate can never satisfy
    pub fn validate(&self) -> Result<()> {
        if self.requests_per_minute == 0 {
            return Err(Error::invalid_value(
                "requests_per_minute",
                "must be greater than zero",
            ));
        }
        if self.max_concurrent == 0 {
            return Err(Error::invalid_value(
                "max_concurrent",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Snapshot of the gate's current usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateGateStatus {
    /// Requests admitted in the trailing window
    pub requests_in_window: usize,
    /// Admissions left before callers start waiting
    pub remaining: usize,
    /// Configured per-minute quota
    pub limit: u32,
    /// Free concurrency slots
    pub available_slots: usize,
}

/// Held for the duration of one request; dropping it frees the slot
#[derive(Debug)]
pub struct AdmissionPermit {
    _slot: OwnedSemaphorePermit,
}

/// Sliding-window rate gate with bounded concurrency
///
/// Cloning is cheap and every clone shares the same window and slots.
#[derive(Clone)]
pub struct RateGate {
    config: RateGateConfig,
    window: Arc<Mutex<VecDeque<Instant>>>,
    slots: Arc<Semaphore>,
}

impl RateGate {
    /// Create a new rate gate, failing on a zero quota or slot count
    pub fn new(config: RateGateConfig) -> Result<Self> {
        config.validate()?;
        let slots = Arc::new(Semaphore::new(config.max_concurrent));
        Ok(Self {
            window: Arc::new(Mutex::new(VecDeque::with_capacity(
                config.requests_per_minute as usize,
            ))),
            slots,
            config,
        })
    }

    /// Get the gate configuration
    pub fn config(&self) -> &RateGateConfig {
        &self.config
    }

    /// Wait until a request may be issued, then reserve a slot for it
    ///
    /// The quota is checked first and the slot taken last, so callers held
    /// back by a full window do not sit on slots. Never fails: the quota only
    /// ever delays callers.
    pub async fn admit(&self) -> AdmissionPermit {
        loop {
            self.wait_for_quota().await;

            // The semaphore is owned by the gate and never closed.
            let slot = Arc::clone(&self.slots)
                .acquire_owned()
                .await
                .expect("rate gate semaphore is never closed");

            let mut window = self.window.lock().await;
            let now = Instant::now();
            prune(&mut window, now);
            if window.len() < self.config.requests_per_minute as usize {
                window.push_back(now);
                debug!("Request admitted");
                return AdmissionPermit { _slot: slot };
            }
            // Window filled up while waiting for the slot; give it back.
        }
    }

    /// Sleep until the window has room for one more request
    async fn wait_for_quota(&self) {
        loop {
            let wait = {
                let mut window = self.window.lock().await;
                let now = Instant::now();
                prune(&mut window, now);

                if window.len() < self.config.requests_per_minute as usize {
                    None
                } else {
                    // Window is full, so it has a front entry.
                    window
                        .front()
                        .map(|oldest| (*oldest + WINDOW).saturating_duration_since(now))
                }
            };

            match wait {
                None => return,
                Some(delay) if delay.is_zero() => {}
                Some(delay) => {
                    info!(
                        "Rate limit reached ({}/min), waiting {}s",
                        self.config.requests_per_minute,
                        delay.as_secs_f64().ceil()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Current usage of the window and slots
    pub async fn status(&self) -> RateGateStatus {
        let mut window = self.window.lock().await;
        prune(&mut window, Instant::now());
        let in_window = window.len();
        RateGateStatus {
            requests_in_window: in_window,
            remaining: (self.config.requests_per_minute as usize).saturating_sub(in_window),
            limit: self.config.requests_per_minute,
            available_slots: self.slots.available_permits(),
        }
    }
}

impl std::fmt::Debug for RateGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateGate")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Drop timestamps that have aged out of the window
fn prune(window: &mut VecDeque<Instant>, now: Instant) {
    while let Some(oldest) = window.front() {
        if now.saturating_duration_since(*oldest) >= WINDOW {
            window.pop_front();
        } else {
            break;
        }
    }
}
