//! Retry engine: linear backoff for transient provider failures.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use focusmate_core::CompanionError;

/// Retry policy configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub retry_count: u32,
    /// Base delay in milliseconds, multiplied by the failed attempt number.
    pub retry_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_count: 3,
            retry_delay_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// One attempt, no backoff.
    pub fn single_attempt() -> Self {
        Self {
            retry_count: 1,
            retry_delay_ms: 0,
        }
    }

    /// Delay after attempt `attempt_number` (1-indexed) failed.
    pub fn delay_for(&self, attempt_number: u32) -> Duration {
        Duration::from_millis(self.retry_delay_ms.saturating_mul(attempt_number as u64))
    }

    pub fn should_retry(&self, attempt_number: u32, error: &CompanionError) -> bool {
        error.is_retryable() && attempt_number < self.retry_count.max(1)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy is exhausted. The last error is returned unchanged.
///
/// `op` receives the 1-indexed attempt number.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, CompanionError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, CompanionError>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(label, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if policy.should_retry(attempt, &err) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    label,
                    attempt,
                    max = policy.retry_count,
                    delay_ms = delay.as_millis() as u64,
                    kind = err.kind(),
                    "Request failed, will retry"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
