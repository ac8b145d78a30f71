//! Compilation orchestration.
//!
//! # Data Flow
//! ```text
//! &[Source]
//!     → FragmentLoader::load_all (concurrent, budgeted)
//!     → merge
//!     → Validator::validate
//!     → SecretResolver::resolve (deferred paths only)
//!     → Validator::complete
//!     → Emitter::emit
//!     → Compilation { config, artifact, provenance }
//! ```
//!
//! # Design Decisions
//! - One run is sequential apart from fragment loads
//! - Every run gets a v4 UUID and its own span; nothing is cached between runs
//! - Cancellation drops the in-flight run and all of its partial state
//! - Writing the artifact is left to the caller (see `emit::write_atomic`)

pub mod run;

pub use run::{Compilation, CompileOptions, Compiler};
