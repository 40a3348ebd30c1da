//! Persistence coordinator: bounded exponential-backoff retry
//!
//! Wraps a single data-store operation. Retries only errors classified
//! as transient, up to three attempts, doubling the delay each time.
//! The coordinator touches neither counters nor events; surviving errors
//! propagate to the caller, which owns that bookkeeping.

use std::future::Future;
use std::time::Duration;

use crate::store::StoreError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based):
    /// `base_delay * 2^(attempt-1)`.
    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Run `op`, retrying per the policy. `label` names the operation in logs.
pub async fn execute_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                log::error!(
                    "{} failed (attempt {}/{}): {}",
                    label,
                    attempt,
                    policy.max_attempts,
                    err
                );

                if attempt >= policy.max_attempts || !err.is_retryable() {
                    return Err(err);
                }

                let delay = policy.backoff(attempt);
                log::info!("retrying {} in {}ms", label, delay.as_millis());
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
