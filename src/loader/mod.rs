//! Fragment loading subsystem.
//!
//! # Data Flow
//! ```text
//! Source::File         → tokio::fs read → parse.rs (TOML / JSON) ┐
//! Source::Environment  → env.rs (PREFIX__A__B pairs)            ├→ ConfigFragment
//! Source::SecretStore  → secret_store.rs fetch → parse.rs       ┘
//! ```
//!
//! # Design Decisions
//! - Every load runs inside the caller's timeout budget
//! - A malformed fragment is rejected wholesale, never partially applied
//! - `load_all` runs loads concurrently but reports errors in source order
//! - Environment and secret-store values stay strings; typing is the
//!   validator's job

pub mod env;
pub mod error;
pub mod fragment;
pub mod parse;
pub mod secret_store;
pub mod source;

pub use error::{LoadError, Location};
pub use fragment::{ConfigFragment, Origin, SourceKind};
pub use parse::{parse_fragment, Format, REFERENCE_KEY};
pub use secret_store::{
    DirectorySecretStore, HttpSecretStore, MemorySecretStore, SecretStore, SecretStoreError,
};
pub use source::{FragmentLoader, Source};
