//! Validation subsystem.
//!
//! # Data Flow
//! ```text
//! MergedTree + SchemaRegistry
//!     → validator.rs validate() (defaults, coercion, type check, predicates,
//!                                unknown keys; references deferred)
//!     → [secret resolution]
//!     → validator.rs complete() (deferred paths only)
//!     → ResolvedConfig
//! ```
//!
//! # Design Decisions
//! - All errors of a pass are collected and sorted by key path
//! - Coercions are limited to the table in coerce.rs; nothing else converts
//! - Secret keys and indirection-sourced values never appear in errors
//! - Unknown keys are reported but never carried into the output

pub mod coerce;
pub mod config;
pub mod error;
pub mod validator;

pub use config::ResolvedConfig;
pub use error::{ValidationError, ValidationErrorKind, ValidationErrors, ValidationWarning, REDACTED};
pub use validator::{Validated, ValidationOptions, Validator};
