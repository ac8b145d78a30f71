//! One compilation run, end to end.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

use crate::emit::{Emitter, OutputFormat};
use crate::error::CompileError;
use crate::lifecycle::Shutdown;
use crate::loader::{FragmentLoader, Source};
use crate::merge::{merge, MergedTree, Provenance};
use crate::observability::metrics;
use crate::schema::SchemaRegistry;
use crate::secrets::SecretResolver;
use crate::tree::KeyPath;
use crate::validation::{ResolvedConfig, ValidationOptions, Validator};

/// Default budget for each external call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Options shared by every run of a [`Compiler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Unknown keys are errors instead of warnings.
    pub strict: bool,
    /// Budget for each fragment load and each secret fetch.
    pub timeout: Duration,
    pub format: OutputFormat,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            strict: false,
            timeout: DEFAULT_TIMEOUT,
            format: OutputFormat::Json,
        }
    }
}

/// Output of a successful run.
pub struct Compilation {
    pub run_id: Uuid,
    pub config: ResolvedConfig,
    /// Serialized configuration, ready for [`crate::emit::write_atomic`].
    pub artifact: Vec<u8>,
    pub provenance: Provenance,
}

impl fmt::Debug for Compilation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The artifact holds resolved secrets.
        f.debug_struct("Compilation")
            .field("run_id", &self.run_id)
            .field("config", &self.config)
            .field("artifact_bytes", &self.artifact.len())
            .finish()
    }
}

/// Compiles sources against a frozen schema.
#[derive(Debug, Clone)]
pub struct Compiler {
    schema: Arc<SchemaRegistry>,
    options: CompileOptions,
    loader: FragmentLoader,
    resolver: SecretResolver,
}

impl Compiler {
    /// Freeze `schema` and build a compiler with a resolver that only knows
    /// the process environment.
    pub fn new(mut schema: SchemaRegistry, options: CompileOptions) -> Self {
        schema.freeze();
        Self {
            schema: Arc::new(schema),
            options,
            loader: FragmentLoader::new(options.timeout),
            resolver: SecretResolver::new(options.timeout),
        }
    }

    /// Use `resolver` for indirections (e.g. one with secret stores).
    pub fn with_resolver(mut self, resolver: SecretResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Load and merge only; used to explain where values come from.
    pub async fn merge_sources(&self, sources: &[Source]) -> Result<MergedTree, CompileError> {
        let fragments = self.loader.load_all(sources).await?;
        Ok(merge(fragments))
    }

    /// Run the whole pipeline once.
    pub async fn compile(&self, sources: &[Source]) -> Result<Compilation, CompileError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("compile", run_id = %run_id, sources = sources.len());
        let start = Instant::now();

        let result = self.run(sources, run_id).instrument(span).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.stage(),
        };
        metrics::record_compile(outcome, start.elapsed());
        result
    }

    /// Like [`Compiler::compile`], but gives up as soon as `shutdown` fires.
    ///
    /// A run that is cancelled leaves nothing behind.
    pub async fn compile_until(&self, sources: &[Source], shutdown: &Shutdown) -> Result<Compilation, CompileError> {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                tracing::warn!("Compilation cancelled");
                Err(CompileError::Cancelled)
            }
            result = self.compile(sources) => result,
        }
    }

    async fn run(&self, sources: &[Source], run_id: Uuid) -> Result<Compilation, CompileError> {
        tracing::info!(strict = self.options.strict, format = %self.options.format, "Compilation started");

        let merged = self.merge_sources(sources).await?;
        let validator = Validator::new(
            &self.schema,
            ValidationOptions {
                strict: self.options.strict,
            },
        );
        let validated = validator.validate(&merged)?;

        let resolved = if validated.has_deferred() {
            let scope: Vec<KeyPath> = validated.deferred().cloned().collect();
            self.resolver.resolve_within(&merged, &scope).await?
        } else {
            merged
        };

        let config = validator.complete(validated, &resolved)?;
        let artifact = Emitter::new(self.options.format).emit(&config)?;

        tracing::info!(
            keys = config.len(),
            warnings = config.warnings().len(),
            bytes = artifact.len(),
            "Compilation finished"
        );
        Ok(Compilation {
            run_id,
            config,
            artifact,
            provenance: resolved.provenance().clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{MemorySecretStore, SecretStore, SecretStoreError};
    use crate::schema::{SchemaEntry, ValueType};
    use crate::tree::Value;

    fn schema() -> SchemaRegistry {
        let mut schema = SchemaRegistry::new();
        schema
            .register(SchemaEntry::new(KeyPath::new(["loglevel"]), ValueType::Integer).required())
            .unwrap();
        schema
            .register(
                SchemaEntry::new(KeyPath::new(["secret"]), ValueType::String)
                    .required()
                    .secret(),
            )
            .unwrap();
        schema
    }

    #[tokio::test]
    async fn test_compile_resolves_and_emits() {
        let resolver = SecretResolver::new(Duration::from_secs(1))
            .with_env_lookup(|name| (name == "NEXTCLOUD_LOGLEVEL").then(|| "3".to_string()))
            .with_store(Arc::new(MemorySecretStore::new("vault").with_entry("secret", "t0p")));
        let compiler = Compiler::new(schema(), CompileOptions::default()).with_resolver(resolver);
        assert!(compiler.schema().is_frozen());

        let sources = [Source::environment_from(
            "NC",
            [
                ("NC__LOGLEVEL", r#"{"$ref": "env:NEXTCLOUD_LOGLEVEL"}"#),
                ("NC__SECRET", "plain"),
            ],
            10,
        )];
        // Environment values are plain strings, so the JSON above stays text.
        let err = compiler.compile(&sources).await.unwrap_err();
        assert_eq!(err.exit_code(), 1);

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("base.toml");
        std::fs::write(
            &file,
            "loglevel = { \"$ref\" = \"env:NEXTCLOUD_LOGLEVEL\" }\n\
             secret = { \"$ref\" = \"secret://vault/secret\" }\n",
        )
        .unwrap();
        let compilation = compiler.compile(&[Source::file(&file, 10)]).await.unwrap();
        assert_eq!(compilation.config.get_i64(&KeyPath::new(["loglevel"])), Some(3));
        assert_eq!(
            compilation.config.get(&KeyPath::new(["secret"])),
            Some(&Value::String("t0p".into()))
        );
        assert_eq!(
            String::from_utf8(compilation.artifact.clone()).unwrap(),
            "{\n  \"loglevel\": 3,\n  \"secret\": \"t0p\"\n}\n"
        );
        assert!(!format!("{:?}", compilation).contains("t0p"));
    }

    #[tokio::test]
    async fn test_cancelled_run() {
        let compiler = Compiler::new(schema(), CompileOptions::default());
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let err = compiler.compile_until(&[], &shutdown).await.unwrap_err();
        assert!(matches!(err, CompileError::Cancelled));
        assert_eq!(err.exit_code(), 2);
    }

    #[derive(Debug)]
    struct StalledStore;

    #[async_trait::async_trait]
    impl SecretStore for StalledStore {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn fetch(&self, _key: &str) -> Result<Option<String>, SecretStoreError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Some("never".to_string()))
        }
    }

    #[tokio::test]
    async fn test_cancelled_during_secret_fetch() {
        let resolver = SecretResolver::new(Duration::from_secs(60))
            .with_env_lookup(|name| (name == "NEXTCLOUD_LOGLEVEL").then(|| "3".to_string()))
            .with_store(Arc::new(StalledStore));
        let compiler = Compiler::new(schema(), CompileOptions::default()).with_resolver(resolver);

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("base.toml");
        std::fs::write(
            &file,
            "loglevel = { \"$ref\" = \"env:NEXTCLOUD_LOGLEVEL\" }\n\
             secret = { \"$ref\" = \"secret://stalled/secret\" }\n",
        )
        .unwrap();

        let shutdown = Shutdown::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.trigger();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            compiler.compile_until(&[Source::file(&file, 10)], &shutdown),
        )
        .await
        .expect("cancellation should end the run");
        assert!(matches!(result, Err(CompileError::Cancelled)));
        assert!(shutdown.is_triggered());
    }
}
