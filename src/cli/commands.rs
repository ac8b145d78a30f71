//! Subcommand execution.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::cli::args::{Cli, Command, CompileArgs, ExplainArgs, SourceArgs, SourceSpec, SourceTarget};
use crate::compiler::{CompileOptions, Compiler};
use crate::emit::{write_atomic, OutputFormat};
use crate::error::{CompileError, EXIT_FAILURE};
use crate::lifecycle::signals::spawn_signal_handler;
use crate::lifecycle::{Shutdown, SourceWatcher};
use crate::loader::{DirectorySecretStore, HttpSecretStore, SecretStore, Source, SourceKind};
use crate::observability::metrics;
use crate::resilience::{retry_with_backoff, RetryPolicy};
use crate::schema::load_schema;
use crate::secrets::SecretResolver;
use crate::tree::{KeyPath, Value};
use crate::validation::{ResolvedConfig, REDACTED};

/// Pause after a change event so editors can finish writing.
const DEBOUNCE: Duration = Duration::from_millis(200);

/// Failures outside the compilation itself.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("--source {0} names unknown secret store {1:?} (declare it with --secret-dir or --secret-url)")]
    UnknownStore(String, String),

    #[error("secret store {0:?} is declared more than once")]
    DuplicateStore(String),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("file watcher failed: {0}")]
    Watch(#[from] notify::Error),

    #[error("failed to write to stdout: {0}")]
    Stdout(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Compile(e) => e.exit_code(),
            _ => EXIT_FAILURE,
        }
    }
}

/// Run the parsed command line and map the outcome to an exit code.
pub async fn run(cli: Cli) -> ExitCode {
    metrics::describe_metrics();
    let shutdown = Shutdown::new();
    let _signals = spawn_signal_handler(shutdown.clone());

    let result = match cli.command {
        Command::Compile(args) => compile(&args, &shutdown).await,
        Command::Check(args) => check(&args, &shutdown).await,
        Command::Explain(args) => explain(&args).await,
        Command::Watch(args) => watch(&args, &shutdown).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::from(e.exit_code())
        }
    }
}

/// Everything one run needs, rebuilt from the arguments (and the schema
/// file) every time.
struct Setup {
    compiler: Compiler,
    sources: Vec<Source>,
    policy: RetryPolicy,
}

impl Setup {
    fn prepare(args: &SourceArgs, format: OutputFormat) -> Result<Self, CliError> {
        let schema = load_schema(&args.schema).map_err(CompileError::from)?;
        let timeout = Duration::from_secs(args.timeout);
        let stores = build_stores(args)?;
        let sources = build_sources(args, &stores)?;

        let resolver = stores
            .values()
            .cloned()
            .fold(SecretResolver::new(timeout), SecretResolver::with_store);
        let options = CompileOptions {
            strict: args.strict,
            timeout,
            format,
        };

        Ok(Self {
            compiler: Compiler::new(schema, options).with_resolver(resolver),
            sources,
            policy: RetryPolicy::new(args.retries),
        })
    }

    async fn compile(&self, shutdown: &Shutdown) -> Result<crate::compiler::Compilation, CliError> {
        let compiler = &self.compiler;
        let sources = self.sources.as_slice();
        let compilation = retry_with_backoff(&self.policy, shutdown, CompileError::is_retryable, move || {
            compiler.compile_until(sources, shutdown)
        })
        .await?;
        print_warnings(&compilation.config);
        Ok(compilation)
    }
}

fn build_stores(args: &SourceArgs) -> Result<BTreeMap<String, Arc<dyn SecretStore>>, CliError> {
    let mut stores: BTreeMap<String, Arc<dyn SecretStore>> = BTreeMap::new();

    for (name, dir) in &args.secret_dirs {
        let store = Arc::new(DirectorySecretStore::new(name.clone(), dir.clone()));
        if stores.insert(name.clone(), store).is_some() {
            return Err(CliError::DuplicateStore(name.clone()));
        }
    }
    for (name, url) in &args.secret_urls {
        let mut store = HttpSecretStore::new(name.clone(), url.clone());
        if let Some(token) = &args.secret_token {
            store = store.with_token(token.clone());
        }
        if stores.insert(name.clone(), Arc::new(store)).is_some() {
            return Err(CliError::DuplicateStore(name.clone()));
        }
    }
    Ok(stores)
}

/// Turn `--source` arguments into sources. Unranked sources get
/// `(position + 1) * 10`; the environment fragment ranks above all of them.
fn build_sources(
    args: &SourceArgs,
    stores: &BTreeMap<String, Arc<dyn SecretStore>>,
) -> Result<Vec<Source>, CliError> {
    let mut sources = Vec::with_capacity(args.sources.len() + 1);

    for (position, spec) in args.sources.iter().enumerate() {
        let priority = spec.priority.unwrap_or((position as i32 + 1) * 10);
        let source = match &spec.target {
            SourceTarget::File(path) => Source::file(path.clone(), priority),
            SourceTarget::Secret { store, name } => {
                let backend = stores
                    .get(store)
                    .ok_or_else(|| CliError::UnknownStore(describe_spec(spec), store.clone()))?;
                Source::secret_store(backend.clone(), name.clone(), priority)
            }
        };
        sources.push(source);
    }

    if let Some(prefix) = &args.env_prefix {
        let top = sources.iter().map(Source::priority).max().unwrap_or(0);
        sources.push(Source::environment(prefix.clone(), top.saturating_add(10)));
    }
    Ok(sources)
}

fn describe_spec(spec: &SourceSpec) -> String {
    match &spec.target {
        SourceTarget::File(path) => path.display().to_string(),
        SourceTarget::Secret { store, name } => format!("secret://{}/{}", store, name),
    }
}

async fn compile(args: &CompileArgs, shutdown: &Shutdown) -> Result<(), CliError> {
    let setup = Setup::prepare(&args.sources, args.output_format())?;
    let compilation = setup.compile(shutdown).await?;
    write_atomic(&args.out, &compilation.artifact)
        .await
        .map_err(CompileError::from)?;
    Ok(())
}

async fn check(args: &SourceArgs, shutdown: &Shutdown) -> Result<(), CliError> {
    let setup = Setup::prepare(args, OutputFormat::Json)?;
    let compilation = setup.compile(shutdown).await?;
    let mut stdout = std::io::stdout().lock();
    writeln!(
        stdout,
        "ok\t{} keys\t{} warnings",
        compilation.config.len(),
        compilation.config.warnings().len()
    )?;
    Ok(())
}

async fn explain(args: &ExplainArgs) -> Result<(), CliError> {
    let setup = Setup::prepare(&args.sources, OutputFormat::Json)?;
    let merged = setup.compiler.merge_sources(&setup.sources).await?;
    let schema = setup.compiler.schema();
    let wanted = |path: &KeyPath| match &args.key {
        Some(key) => path.starts_with(key) || key.starts_with(path),
        None => true,
    };

    let mut stdout = std::io::stdout().lock();
    for (path, value) in merged.leaves() {
        if !wanted(&path) {
            continue;
        }
        let origin = merged.origin_of(&path);
        let secret = schema.covering(&path).is_some_and(|entry| entry.is_secret())
            || origin.is_some_and(|o| o.kind() == SourceKind::SecretStore);
        let shown = match value {
            Value::Reference(reference) => format!("$ref {}", reference),
            _ if secret => REDACTED.to_string(),
            _ => value.describe(),
        };
        let status = if schema.covering(&path).is_some() {
            "declared"
        } else {
            "unknown"
        };
        let shadowed: Vec<String> = merged
            .provenance()
            .shadowed_under(&path)
            .into_iter()
            .map(|(_, origin)| origin.to_string())
            .collect();
        writeln!(
            stdout,
            "{}\t{}\t{}\t{}\t{}",
            path,
            shown,
            origin.map(ToString::to_string).unwrap_or_else(|| "-".to_string()),
            status,
            if shadowed.is_empty() {
                "-".to_string()
            } else {
                shadowed.join(",")
            }
        )?;
    }

    for entry in schema.entries() {
        if merged.get(entry.path()).is_some() || !wanted(entry.path()) {
            continue;
        }
        let (shown, status) = match entry.default() {
            Some(_) if entry.is_secret() => (REDACTED.to_string(), "default"),
            Some(default) => (default.describe(), "default"),
            None if entry.is_required() => ("absent".to_string(), "missing"),
            None => ("absent".to_string(), "unset"),
        };
        writeln!(stdout, "{}\t{}\t-\t{}\t-", entry.path(), shown, status)?;
    }
    Ok(())
}

async fn watch(args: &CompileArgs, shutdown: &Shutdown) -> Result<(), CliError> {
    let mut files: Vec<PathBuf> = Vec::new();
    for spec in &args.sources.sources {
        if let SourceTarget::File(path) = &spec.target {
            files.push(path.clone());
        }
    }
    files.push(args.sources.schema.clone());

    let (watcher, mut changes) = SourceWatcher::new(&files);
    let _watcher = watcher.run()?;

    loop {
        match compile(args, shutdown).await {
            Ok(()) => tracing::info!(out = %args.out.display(), "Artifact up to date"),
            Err(CliError::Compile(CompileError::Cancelled)) => break,
            // keep the previous artifact and wait for the next change
            Err(e) => report(&e),
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            changed = changes.recv() => match changed {
                Some(path) => {
                    tokio::time::sleep(DEBOUNCE).await;
                    while changes.try_recv().is_ok() {}
                    tracing::info!(path = %path.display(), "Change detected, recompiling");
                }
                None => break,
            },
        }
    }

    tracing::info!("Watch stopped");
    Ok(())
}

fn print_warnings(config: &ResolvedConfig) {
    let mut stderr = std::io::stderr().lock();
    for warning in config.warnings() {
        let _ = writeln!(stderr, "{}", warning.to_line());
    }
}

/// Validation failures are one tab-separated line per error; everything
/// else is a single `error: ...` line.
fn report(error: &CliError) {
    let mut stderr = std::io::stderr().lock();
    match error {
        CliError::Compile(CompileError::Validation(errors)) => {
            for e in errors.iter() {
                let _ = writeln!(stderr, "{}", e.to_line());
            }
        }
        other => {
            let _ = writeln!(stderr, "error: {}", other);
        }
    }
}
