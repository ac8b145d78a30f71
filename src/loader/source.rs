//! Fragment sources and the loader that reads them.

use futures_util::future::join_all;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::loader::env::tree_from_pairs;
use crate::loader::error::{LoadError, Location};
use crate::loader::fragment::{ConfigFragment, Origin};
use crate::loader::parse::{parse_fragment, Format};
use crate::loader::secret_store::SecretStore;
use crate::observability::metrics;
use crate::resilience::timeouts::with_budget;

/// Where a fragment comes from.
#[derive(Clone)]
pub enum Source {
    /// Readable as text.
    File { path: PathBuf, priority: i32 },
    /// Enumerable as name/value pairs. `vars` pins a snapshot; `None` reads
    /// the process environment at load time.
    Environment {
        prefix: String,
        vars: Option<Vec<(String, String)>>,
        priority: i32,
    },
    /// Fetchable by name from a secret store.
    SecretStore {
        store: Arc<dyn SecretStore>,
        name: String,
        priority: i32,
    },
}

impl Source {
    pub fn file(path: impl Into<PathBuf>, priority: i32) -> Self {
        Source::File {
            path: path.into(),
            priority,
        }
    }

    pub fn environment(prefix: impl Into<String>, priority: i32) -> Self {
        Source::Environment {
            prefix: prefix.into(),
            vars: None,
            priority,
        }
    }

    /// Environment source over a fixed set of pairs.
    pub fn environment_from<I, K, V>(prefix: impl Into<String>, vars: I, priority: i32) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Source::Environment {
            prefix: prefix.into(),
            vars: Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
            priority,
        }
    }

    pub fn secret_store(store: Arc<dyn SecretStore>, name: impl Into<String>, priority: i32) -> Self {
        Source::SecretStore {
            store,
            name: name.into(),
            priority,
        }
    }

    pub fn priority(&self) -> i32 {
        match self {
            Source::File { priority, .. }
            | Source::Environment { priority, .. }
            | Source::SecretStore { priority, .. } => *priority,
        }
    }

    pub fn origin(&self) -> Origin {
        match self {
            Source::File { path, .. } => Origin::file(path),
            Source::Environment { prefix, .. } => Origin::environment(prefix),
            Source::SecretStore { store, name, .. } => Origin::secret_store(store.name(), name),
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Environment values may be secrets; show the origin only.
        f.debug_struct("Source")
            .field("origin", &self.origin().to_string())
            .field("priority", &self.priority())
            .finish()
    }
}

/// Reads sources into fragments, each within the same time budget.
#[derive(Debug, Clone)]
pub struct FragmentLoader {
    budget: Duration,
}

impl FragmentLoader {
    pub fn new(budget: Duration) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Load one source.
    pub async fn load(&self, source: &Source) -> Result<ConfigFragment, LoadError> {
        let origin = source.origin();
        let label = origin.to_string();

        let result = match with_budget(&label, self.budget, self.read(source, &origin)).await {
            Ok(inner) => inner,
            Err(timeout) => Err(LoadError::from(timeout)),
        };

        metrics::record_fragment_load(origin.kind().as_str(), result.is_ok());
        match &result {
            Ok(fragment) => tracing::debug!(
                origin = %origin,
                priority = fragment.priority(),
                keys = fragment.tree().len(),
                "Fragment loaded"
            ),
            Err(e) => tracing::warn!(origin = %origin, error = %e, "Fragment rejected"),
        }
        result
    }

    /// Load every source concurrently.
    ///
    /// Fragments come back in source order. On failure every error is logged
    /// and the first failing source (in source order) is reported.
    pub async fn load_all(&self, sources: &[Source]) -> Result<Vec<ConfigFragment>, LoadError> {
        let results = join_all(sources.iter().map(|source| self.load(source))).await;

        let mut fragments = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok(fragment) => fragments.push(fragment),
                Err(e) if first_error.is_none() => first_error = Some(e),
                Err(_) => {}
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                tracing::info!(fragments = fragments.len(), "All fragments loaded");
                Ok(fragments)
            }
        }
    }

    async fn read(&self, source: &Source, origin: &Origin) -> Result<ConfigFragment, LoadError> {
        let tree = match source {
            Source::File { path, .. } => {
                let format = Format::from_path(path).ok_or_else(|| LoadError::UnsupportedFormat {
                    origin: origin.clone(),
                })?;
                let text = match tokio::fs::read_to_string(path).await {
                    Ok(text) => text,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        return Err(LoadError::SourceMissing {
                            origin: origin.clone(),
                        })
                    }
                    Err(source) => {
                        return Err(LoadError::Io {
                            origin: origin.clone(),
                            source,
                        })
                    }
                };
                parse_fragment(&text, format, origin)?
            }
            Source::Environment { prefix, vars, .. } => {
                let snapshot;
                let pairs = match vars {
                    Some(vars) => vars,
                    None => {
                        snapshot = process_env();
                        &snapshot
                    }
                };
                tree_from_pairs(prefix, pairs).map_err(|(name, reason)| LoadError::Parse {
                    origin: origin.clone(),
                    location: Location::Unknown,
                    message: format!("variable {}: {}", name, reason),
                })?
            }
            Source::SecretStore { store, name, .. } => {
                let text = store
                    .fetch(name)
                    .await
                    .map_err(|source| LoadError::Store {
                        origin: origin.clone(),
                        source,
                    })?
                    .ok_or_else(|| LoadError::SourceMissing {
                        origin: origin.clone(),
                    })?;
                parse_fragment(&text, Format::sniff(&text), origin)?
            }
        };

        Ok(ConfigFragment::new(origin.clone(), source.priority(), tree))
    }
}

/// Snapshot of the process environment; non-UTF-8 variables are skipped.
fn process_env() -> Vec<(String, String)> {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}
