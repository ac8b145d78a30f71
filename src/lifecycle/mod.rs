//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → every compile_until() / watch loop stops, partial state dropped
//!
//! Signals (signals.rs):
//!     Ctrl-C / SIGTERM → Shutdown::trigger()
//!
//! Watcher (watcher.rs):
//!     source or schema file changed → event on channel → watch loop recompiles
//! ```
//!
//! # Design Decisions
//! - Cancellation is cooperative: in-flight futures are dropped, never aborted mid-write
//! - A trigger is sticky; late subscribers still observe it
//! - Watching happens on parent directories so editors that replace files are seen

pub mod shutdown;
pub mod signals;
pub mod watcher;

pub use shutdown::Shutdown;
pub use watcher::SourceWatcher;
