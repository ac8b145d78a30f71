//! Untyped configuration tree shared by every stage.
//!
//! # Data Flow
//! ```text
//! fragment text / env pairs / secret documents
//!     → loader (parse into Value::Mapping)
//!     → merge (fold into one Mapping)
//!     → validation (typed values keyed by KeyPath)
//!     → emit (nested Mapping again)
//! ```
//!
//! # Design Decisions
//! - Mappings are `BTreeMap`s so every traversal and every emission is sorted
//! - Unresolved indirections are a distinct `Value::Reference` variant, never a
//!   magic string, so no stage can mistake one for a literal
//! - `KeyPath` keeps segments verbatim; keys with literal dots stay one segment

pub mod path;
pub mod value;

pub use path::{KeyPath, KeyPathError};
pub use value::{insert, lookup, Mapping, Value};
