//! Command-line arguments.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use url::Url;

use crate::emit::OutputFormat;
use crate::observability::logging::LogFormat;
use crate::tree::KeyPath;

#[derive(Debug, Parser)]
#[command(name = "config-compiler", version)]
#[command(about = "Validate, merge and compile layered configuration fragments", long_about = None)]
pub struct Cli {
    /// Log filter directive, e.g. `config_compiler=debug` (overrides RUST_LOG)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compile the sources and write the artifact atomically
    Compile(CompileArgs),
    /// Validate the sources without writing anything
    Check(SourceArgs),
    /// Show the merged value of each key and where it came from
    Explain(ExplainArgs),
    /// Compile, then recompile whenever a source or the schema changes
    Watch(CompileArgs),
}

/// Options shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Fragment source: a .toml/.json path or secret://STORE/NAME, with an
    /// optional @PRIORITY suffix. Defaults to (position + 1) * 10.
    #[arg(long = "source", value_name = "SOURCE[@PRIORITY]", required = true)]
    pub sources: Vec<SourceSpec>,

    /// Schema document (TOML, [[entry]] tables)
    #[arg(long)]
    pub schema: PathBuf,

    /// Treat unknown keys as errors
    #[arg(long)]
    pub strict: bool,

    /// Budget in seconds for each file read and secret fetch
    #[arg(long, value_name = "SECONDS", default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// Load PREFIX__A__B environment variables as a fragment above all files
    #[arg(long, value_name = "PREFIX")]
    pub env_prefix: Option<String>,

    /// Directory secret store: one file per key
    #[arg(long = "secret-dir", value_name = "NAME=DIR", value_parser = parse_named::<PathBuf>)]
    pub secret_dirs: Vec<(String, PathBuf)>,

    /// HTTP secret store: GET URL/KEY
    #[arg(long = "secret-url", value_name = "NAME=URL", value_parser = parse_named::<Url>)]
    pub secret_urls: Vec<(String, Url)>,

    /// Bearer token for HTTP secret stores
    #[arg(long, env = "SECRET_STORE_TOKEN", hide_env_values = true)]
    pub secret_token: Option<String>,

    /// Retry the whole run this many times after a timeout
    #[arg(long, default_value_t = 0)]
    pub retries: u32,
}

#[derive(Debug, Clone, Args)]
pub struct CompileArgs {
    #[command(flatten)]
    pub sources: SourceArgs,

    /// Artifact path
    #[arg(long)]
    pub out: PathBuf,

    /// Artifact format; defaults to the extension of --out, then JSON
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}

impl CompileArgs {
    pub fn output_format(&self) -> OutputFormat {
        self.format.unwrap_or_else(|| {
            match self.out.extension().and_then(|e| e.to_str()) {
                Some(ext) if ext.eq_ignore_ascii_case("toml") => OutputFormat::Toml,
                _ => OutputFormat::Json,
            }
        })
    }
}

#[derive(Debug, Clone, Args)]
pub struct ExplainArgs {
    #[command(flatten)]
    pub sources: SourceArgs,

    /// Only explain this key (and anything below it)
    #[arg(long, value_parser = parse_key_path)]
    pub key: Option<KeyPath>,
}

/// What a `--source` argument points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceTarget {
    File(PathBuf),
    Secret { store: String, name: String },
}

/// A parsed `--source` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub target: SourceTarget,
    pub priority: Option<i32>,
}

impl FromStr for SourceSpec {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let (target, priority) = match text.rsplit_once('@') {
            Some((target, suffix)) => match suffix.parse::<i32>() {
                Ok(priority) => (target, Some(priority)),
                Err(_) => (text, None),
            },
            None => (text, None),
        };
        if target.is_empty() {
            return Err("source must not be empty".to_string());
        }

        let target = if target.starts_with("secret://") {
            let url = Url::parse(target).map_err(|e| format!("invalid secret source {:?}: {}", target, e))?;
            let store = url.host_str().unwrap_or_default().to_string();
            let name = url.path().trim_start_matches('/').to_string();
            if store.is_empty() || name.is_empty() {
                return Err(format!("secret source {:?} must be secret://STORE/NAME", target));
            }
            SourceTarget::Secret { store, name }
        } else {
            SourceTarget::File(PathBuf::from(target))
        };

        Ok(SourceSpec { target, priority })
    }
}

fn parse_named<T>(text: &str) -> Result<(String, T), String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let (name, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {:?}", text))?;
    if name.is_empty() {
        return Err("store name must not be empty".to_string());
    }
    let value = value.parse::<T>().map_err(|e| format!("{}: {}", name, e))?;
    Ok((name.to_string(), value))
}

fn parse_key_path(text: &str) -> Result<KeyPath, String> {
    text.parse::<KeyPath>().map_err(|e| e.to_string())
}
