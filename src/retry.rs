//! Bounded retry with exponential backoff
//!
//! Wraps `backoff::future::retry` with an attempt cap. Only errors that
//! report [`crate::error::Error::is_retryable`] are retried.

use backoff::{future::retry, ExponentialBackoff};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::Result;

/// Attempt cap and delay schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (minimum 1)
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.base_delay,
            max_interval: self.base_delay * 8,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Run `operation` until it succeeds, fails permanently or runs out of attempts
pub async fn retry_transient<T, F, Fut>(policy: RetryPolicy, what: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;

    retry(policy.backoff(), || {
        attempt += 1;
        let current = attempt;
        let fut = operation();
        async move {
            match fut.await {
                Ok(value) => Ok(value),
                Err(e) if e.is_retryable() && current < policy.max_attempts => {
                    warn!(
                        "{} failed (attempt {}/{}): {}, retrying",
                        what, current, policy.max_attempts, e
                    );
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        }
    })
    .await
}
