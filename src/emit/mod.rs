//! Compiled config emission.
//!
//! # Data Flow
//! ```text
//! ResolvedConfig
//!     → to_tree() (nested, sorted Mapping)
//!     → serde_json::Value / toml::Value
//!     → bytes (pretty, trailing newline)
//!     → write_atomic (temp file in target dir + rename)
//! ```
//!
//! # Design Decisions
//! - Stateless and deterministic: equal configs give identical bytes
//! - Artifacts contain secret values by necessity; only the file is trusted
//! - A failed run never leaves a partial artifact behind

pub mod emitter;
pub mod writer;

pub use emitter::{EmitError, Emitter, OutputFormat};
pub use writer::write_atomic;
