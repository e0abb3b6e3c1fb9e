//! Rate-limit aware retry helpers.
//!
//! Two flavours are used by the pipeline:
//!
//! - [`retry_forever`] never gives up. A rate limit waits the signaled time,
//!   anything else waits a fixed backoff; both re-issue the same call.
//! - [`retry_rate_limited`] only absorbs rate limits and hands every other
//!   error back to the caller.

use crate::config::PipelineConfig;
use crate::error::ChatError;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Retry timings shared by every call site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait after a non rate-limit failure
    pub error_backoff: Duration,
    /// Maximum sleep between progress reports while rate limited
    pub progress_every: Duration,
    /// Wait applied to a flood marker that carries no duration
    pub default_flood_wait: Duration,
}

impl From<&PipelineConfig> for RetryPolicy {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            error_backoff: config.error_backoff,
            progress_every: config.flood_progress,
            default_flood_wait: config.default_flood_wait,
        }
    }
}

/// Sleep for a provider-signaled cool-down, logging what is left.
///
/// A zero wait is treated as one second so a misbehaving provider cannot turn
/// the retry into a busy loop.
pub async fn wait_rate_limit(wait: Duration, progress_every: Duration, stage: &str) {
    let mut remaining = if wait.is_zero() {
        Duration::from_secs(1)
    } else {
        wait
    };
    let step = if progress_every.is_zero() {
        remaining
    } else {
        progress_every
    };

    info!(stage, wait_secs = remaining.as_secs(), "Rate limited, sleeping");
    while !remaining.is_zero() {
        info!(stage, remaining_secs = remaining.as_secs(), "Waiting for rate limit");
        let chunk = remaining.min(step);
        tokio::time::sleep(chunk).await;
        remaining = remaining.saturating_sub(chunk);
    }
    info!(stage, "Rate limit wait finished");
}

/// Re-issue `operation` until it succeeds.
///
/// Raw provider errors are classified with the policy's default flood wait.
pub async fn retry_forever<F, Fut, T>(policy: RetryPolicy, stage: &str, mut operation: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ChatError>>,
{
    loop {
        match operation()
            .await
            .map_err(|e| e.classified(policy.default_flood_wait))
        {
            Ok(value) => return value,
            Err(ChatError::RateLimited { wait_secs }) => {
                wait_rate_limit(Duration::from_secs(wait_secs), policy.progress_every, stage)
                    .await;
            }
            Err(e) => {
                warn!(stage, error = %e, backoff = ?policy.error_backoff, "Call failed, retrying");
                tokio::time::sleep(policy.error_backoff).await;
            }
        }
    }
}

/// Re-issue `operation` while it is rate limited.
///
/// # Errors
///
/// Returns the first error that is not [`ChatError::RateLimited`].
pub async fn retry_rate_limited<F, Fut, T>(
    policy: RetryPolicy,
    stage: &str,
    mut operation: F,
) -> Result<T, ChatError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ChatError>>,
{
    loop {
        match operation()
            .await
            .map_err(|e| e.classified(policy.default_flood_wait))
        {
            Err(ChatError::RateLimited { wait_secs }) => {
                wait_rate_limit(Duration::from_secs(wait_secs), policy.progress_every, stage)
                    .await;
            }
            other => return other,
        }
    }
}
