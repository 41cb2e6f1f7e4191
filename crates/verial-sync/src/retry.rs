//! # Bounded Retry
//!
//! Every ERP and store call goes through [`RetryPolicy::run`]: a per-call
//! timeout plus exponential backoff, capped by a total attempt count.
//!
//! ## Attempt Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   attempt 1 ──► timeout(call) ──► Ok ─────────────────────► return     │
//! │                     │                                                   │
//! │                     ├── Err(retryable) && attempt < max                 │
//! │                     │        │                                          │
//! │                     │        ▼                                          │
//! │                     │   sleep(backoff.next)  200ms, ~400ms, ... ≤ 5s    │
//! │                     │        │                                          │
//! │                     │        └──► attempt 2 ...                         │
//! │                     │                                                   │
//! │                     └── Err(other) or budget spent ───────► return Err │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::RetrySettings;
use crate::error::{SyncError, SyncResult};

/// Attempt budget, backoff bounds and call timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from_settings(&RetrySettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &RetrySettings) -> Self {
        RetryPolicy {
            max_attempts: settings.max_attempts.max(1),
            initial_backoff: settings.initial_backoff(),
            max_backoff: settings.max_backoff(),
            call_timeout: settings.call_timeout(),
        }
    }

    /// Runs `call` until it succeeds, fails with a non-retryable error, or
    /// the attempt budget is spent.
    ///
    /// A call that exceeds the timeout counts as a retryable
    /// [`SyncError::Timeout`] named after `operation`.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> SyncResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        let mut backoff = self.create_backoff();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result = match timeout(self.call_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(SyncError::Timeout {
                    operation: operation.to_string(),
                    secs: self.call_timeout.as_secs(),
                }),
            };

            match result {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let wait = backoff.next_backoff().unwrap_or(self.max_backoff);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "Call failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    if e.is_retryable() {
                        warn!(operation, attempts = attempt, error = %e, "Retry budget exhausted");
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Creates the exponential backoff configuration.
    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}
