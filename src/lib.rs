//! Typed configuration compiler.
//!
//! Validates, merges and compiles layered configuration fragments (files,
//! environment variables, secret stores) into one resolved configuration.
//!
//! # Architecture Overview
//!
//! ```text
//!   files ──┐
//!   env   ──┼─▶ loader ──▶ merge ──▶ validation ──▶ secrets ──▶ validation ──▶ emit
//!   stores ─┘   (concurrent,  (priority,  (schema,      (env:/       (deferred     (JSON/TOML,
//!                budgeted)     provenance)  coercions)    secret://)    paths only)   atomic write)
//!
//!   Cross-cutting: schema (frozen registry), resilience (timeouts, retries),
//!                  lifecycle (cancellation, signals, watcher), observability
//! ```
//!
//! # Example
//!
//! ```no_run
//! use config_compiler::{CompileOptions, Compiler, Source};
//! use config_compiler::schema::load_schema;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = load_schema("schema.toml".as_ref())?;
//! let compiler = Compiler::new(schema, CompileOptions::default());
//! let compilation = compiler
//!     .compile(&[Source::file("server-base.toml", 10), Source::environment("NC", 100)])
//!     .await?;
//! config_compiler::emit::write_atomic("config.json".as_ref(), &compilation.artifact).await?;
//! # Ok(())
//! # }
//! ```

// Pipeline stages
pub mod emit;
pub mod loader;
pub mod merge;
pub mod schema;
pub mod secrets;
pub mod tree;
pub mod validation;

// Orchestration
pub mod cli;
pub mod compiler;
pub mod error;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use compiler::{Compilation, CompileOptions, Compiler};
pub use error::CompileError;
pub use lifecycle::Shutdown;
pub use loader::Source;
pub use tree::{KeyPath, Value};
pub use validation::ResolvedConfig;
