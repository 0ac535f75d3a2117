//! Dataset fetches with a bounded retry budget.

use std::time::Duration;
use tracing::{error, warn};

use crate::freshness::DatasetKey;
use crate::source::{Dataset, TransitSource};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP {status} from {path}")]
    Status { status: u16, path: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl FetchError {
    /// Client errors other than timeouts and rate limiting will fail again on retry
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Status { status, .. } => {
                !(400..500).contains(status) || *status == 408 || *status == 429
            }
            _ => true,
        }
    }
}

/// A fetch that exhausted its retry budget
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{error} (after {attempts} attempts)")]
pub struct FetchFailure {
    pub error: FetchError,
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure
    pub retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Backoff before the attempt following `attempt` (1-based): base * 2^(attempt-1), capped
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Fetches `key`, retrying transient failures up to `retry.retries` more times.
pub async fn fetch_dataset(
    source: &dyn TransitSource,
    key: &DatasetKey,
    retry: &RetryPolicy,
) -> Result<Dataset, FetchFailure> {
    let max_attempts = retry.retries + 1;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match source.fetch(key).await {
            Ok(dataset) => return Ok(dataset),
            Err(e) if !e.is_transient() => {
                error!(dataset = %key, error = %e, attempt, "Fetch failed with a permanent error");
                return Err(FetchFailure {
                    error: e,
                    attempts: attempt,
                });
            }
            Err(e) => {
                if attempt >= max_attempts {
                    error!(dataset = %key, error = %e, attempts = attempt, "Fetch failed after max retries");
                    return Err(FetchFailure {
                        error: e,
                        attempts: attempt,
                    });
                }
                let wait = retry.delay_after(attempt);
                warn!(dataset = %key, error = %e, attempt, wait_ms = wait.as_millis() as u64, "Fetch failed, retrying...");
                tokio::time::sleep(wait).await;
            }
        }
    }
}
