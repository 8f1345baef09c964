//! Timeout and exponential backoff for store round-trips.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tokio::time::{sleep, timeout};

use super::StoreError;

/// Retry policy applied to every statement a networked backend issues.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Retries after the first attempt (0 disables retrying).
    pub max_retries: u32,
    /// Single attempt timeout (milliseconds).
    pub timeout_ms: u64,
    /// First backoff delay (milliseconds).
    pub base_delay_ms: u64,
    /// Upper bound on the backoff delay (milliseconds).
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout_ms: 2_000,
            base_delay_ms: 50,
            max_delay_ms: 1_000,
        }
    }
}

/// Runs `task` under `policy`, retrying transient failures.
///
/// Each attempt is bounded by `policy.timeout_ms`; a timed-out attempt
/// counts as [`StoreError::Timeout`]. Non-transient errors are returned
/// immediately. The delay doubles after every failed attempt, capped at
/// `policy.max_delay_ms`.
///
/// Only for idempotent statements: a timed-out attempt may still commit.
///
/// # Errors
///
/// Returns the last error once retries are exhausted, or the first
/// non-transient error.
pub async fn with_backoff<F, Fut, T>(
    policy: BackoffPolicy,
    op: &'static str,
    task: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    retry_while(policy, op, StoreError::is_transient, task).await
}

/// Like [`with_backoff`], but retries only failures that never reached
/// the backend.
///
/// Use for claims whose result depends on the state the first attempt
/// may already have changed (set removal, pop). A timeout is returned to
/// the caller instead of being retried.
///
/// # Errors
///
/// Returns the last error once retries are exhausted, or the first error
/// that may have reached the backend.
pub async fn with_claim_backoff<F, Fut, T>(
    policy: BackoffPolicy,
    op: &'static str,
    task: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    retry_while(policy, op, StoreError::is_unsent, task).await
}

async fn retry_while<F, Fut, T>(
    policy: BackoffPolicy,
    op: &'static str,
    retryable: fn(&StoreError) -> bool,
    mut task: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let attempt_timeout = Duration::from_millis(policy.timeout_ms);
    let max_delay = Duration::from_millis(policy.max_delay_ms);
    let mut delay = Duration::from_millis(policy.base_delay_ms);
    let mut attempt: u32 = 0;

    loop {
        let err = match timeout(attempt_timeout, task()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => err,
            Err(_) => StoreError::Timeout(attempt_timeout),
        };

        if !retryable(&err) || attempt >= policy.max_retries {
            return Err(err);
        }

        attempt = attempt.saturating_add(1);
        tracing::warn!(op, attempt, error = %err, ?delay, "store operation failed, retrying");
        sleep(delay).await;
        delay = delay.saturating_mul(2).min(max_delay);
    }
}
