//! Retry logic.
//!
//! # Responsibilities
//! - Decide per error whether another attempt may help
//! - Execute retries with exponential backoff + jitter
//! - Stop early when the run is cancelled
//!
//! # Design Decisions
//! - Only the caller retries; the compilation core never does
//! - Only timeouts are retryable; parse and validation failures are final
//! - Jittered backoff prevents thundering herd against shared secret stores

use std::future::Future;

use crate::lifecycle::Shutdown;
use crate::resilience::backoff::RetryPolicy;

/// Run `op` until it succeeds, fails with a non-retryable error, runs out of
/// retries, or `shutdown` fires during a backoff pause.
pub async fn retry_with_backoff<T, E, F, Fut, R>(
    policy: &RetryPolicy,
    shutdown: &Shutdown,
    is_retryable: R,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.retries && is_retryable(&e) => {
                attempt += 1;
                let delay = policy.delay(attempt);
                tracing::warn!(
                    attempt,
                    max_retries = policy.retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retryable failure, backing off"
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.cancelled() => return Err(e),
                }
            }
            Err(e) => return Err(e),
        }
    }
}
