//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap every external call (file read, secret store fetch) with the
//!   caller-supplied budget
//! - Report expiry as a distinct, retryable error naming the source
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the inner future is dropped on expiry
//! - Never retries by itself

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// An external source did not answer within the budget.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("source {origin} timed out after {}ms", budget.as_millis())]
pub struct SourceTimeoutError {
    pub origin: String,
    pub budget: Duration,
}

/// Run `fut` with a deadline of `budget`.
pub async fn with_budget<F, T>(origin: &str, budget: Duration, fut: F) -> Result<T, SourceTimeoutError>
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(value) => Ok(value),
        Err(_) => {
            tracing::warn!(origin = %origin, budget_ms = budget.as_millis() as u64, "Source timed out");
            Err(SourceTimeoutError {
                origin: origin.to_string(),
                budget,
            })
        }
    }
}
