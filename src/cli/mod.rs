//! Command-line interface.
//!
//! # Data Flow
//! ```text
//! argv → args.rs (clap derive)
//!      → commands.rs (build stores, sources, Compiler)
//!      → compile / check / explain / watch
//!      → ExitCode (0 ok, 1 validation, 2 anything else)
//! ```
//!
//! # Design Decisions
//! - stdout carries command output only; reports and logs go to stderr
//! - The schema file is re-read on every run so `watch` picks up edits
//! - Retries happen here, around whole runs, and only after timeouts

pub mod args;
pub mod commands;

pub use args::{Cli, Command};
pub use commands::{run, CliError};
