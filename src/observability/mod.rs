//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events on stderr)
//!     → metrics.rs (counters, histograms through the `metrics` facade)
//!
//! Consumers:
//!     → Operators reading stderr (text or JSON lines)
//!     → Whatever recorder the embedding application installs
//! ```
//!
//! # Design Decisions
//! - stdout is reserved for command output; logs always go to stderr
//! - Every compilation run is a span carrying its run id
//! - The CLI installs no metrics exporter; recording is a no-op until a host does
//! - Key paths, origins and reference names are logged, values never are

pub mod logging;
pub mod metrics;
