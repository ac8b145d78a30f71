//! Schema subsystem.
//!
//! # Data Flow
//! ```text
//! schema.toml (or SchemaEntry builders)
//!     → file.rs (deserialize [[entry]] tables)
//!     → registry.rs (register, reject duplicates/overlaps, freeze)
//!     → SchemaRegistry (frozen, shared read-only with the validator)
//! ```
//!
//! # Design Decisions
//! - The key set is closed: anything not declared is an unknown key
//! - Entries are immutable; the registry is frozen before the first run
//! - Defaults are checked against their own entry at registration time
//! - An entry owns its whole subtree, so entry paths may not nest

pub mod entry;
pub mod file;
pub mod registry;

pub use entry::{Constraint, SchemaEntry, ValueType};
pub use file::{load_schema, parse_schema};
pub use registry::{SchemaError, SchemaRegistry};
