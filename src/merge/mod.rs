//! Merge subsystem.
//!
//! # Data Flow
//! ```text
//! Vec<ConfigFragment>
//!     → engine.rs (sort by priority desc, origin id asc; deep fold)
//!     → provenance.rs (winner per leaf, shadowed origins per path)
//!     → MergedTree
//! ```
//!
//! # Design Decisions
//! - Type-agnostic: conflicting shapes are left for the validator to report
//! - Sequences and scalars are replaced wholesale; only mappings merge key-wise
//! - Ordering is total, so the result never depends on load order

pub mod engine;
pub mod provenance;

pub use engine::{merge, MergedTree};
pub use provenance::Provenance;
