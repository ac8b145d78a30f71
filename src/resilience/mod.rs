//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! External call (file read, secret store fetch):
//!     → timeouts.rs (enforce the caller's budget)
//!     → On SourceTimeoutError: caller may use retries.rs
//!     → backoff.rs (jittered exponential delay between attempts)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Retries live at the caller (CLI), never inside a compilation run
//! - Only timeouts are retried

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use backoff::{calculate_backoff, RetryPolicy};
pub use retries::retry_with_backoff;
pub use timeouts::{with_budget, SourceTimeoutError};
