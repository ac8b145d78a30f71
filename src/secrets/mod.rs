//! Secret resolution subsystem.
//!
//! # Data Flow
//! ```text
//! MergedTree (with Value::Reference nodes)
//!     → reference.rs (parse env:NAME / secret://STORE/KEY)
//!     → resolver.rs (env lookup or SecretStore::fetch, within the budget)
//!     → MergedTree (references replaced by strings, text-only provenance)
//! ```
//!
//! # Design Decisions
//! - The environment is read at resolve time, never earlier
//! - Resolved values are attributed to the reference's origin so the
//!   validator applies text-only coercions to them
//! - No value ever reaches a log line or an error message

pub mod reference;
pub mod resolver;

pub use reference::{Reference, ReferenceError};
pub use resolver::{EnvLookup, SecretResolutionError, SecretResolver};
