//! Indirection resolution.
//!
//! # Security Constraints
//! - Errors name the key path and the reference, never a resolved value
//! - Log events carry the same fields as errors and nothing more

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::loader::{SecretStore, SecretStoreError};
use crate::merge::MergedTree;
use crate::resilience::timeouts::{with_budget, SourceTimeoutError};
use crate::secrets::reference::{Reference, ReferenceError};
use crate::tree::{KeyPath, Value};

/// Environment lookup used for `env:` references.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Errors from resolving a reference.
#[derive(Debug, Error)]
pub enum SecretResolutionError {
    #[error("invalid reference at {path}: {source}")]
    Invalid {
        path: KeyPath,
        #[source]
        source: ReferenceError,
    },

    #[error("{reference} (for {path}) is not set")]
    Missing { path: KeyPath, reference: String },

    #[error("{reference} (for {path}) names unknown secret store {store:?}")]
    UnknownStore {
        path: KeyPath,
        reference: String,
        store: String,
    },

    #[error("secret store failed resolving {reference} (for {path}): {source}")]
    Store {
        path: KeyPath,
        reference: String,
        #[source]
        source: SecretStoreError,
    },

    #[error("resolving {reference} (for {path}): {source}")]
    Timeout {
        path: KeyPath,
        reference: String,
        #[source]
        source: SourceTimeoutError,
    },
}

impl SecretResolutionError {
    pub fn path(&self) -> &KeyPath {
        match self {
            SecretResolutionError::Invalid { path, .. }
            | SecretResolutionError::Missing { path, .. }
            | SecretResolutionError::UnknownStore { path, .. }
            | SecretResolutionError::Store { path, .. }
            | SecretResolutionError::Timeout { path, .. } => path,
        }
    }
}

/// Replaces every reference in a merged tree with the value it points at.
#[derive(Clone)]
pub struct SecretResolver {
    stores: BTreeMap<String, Arc<dyn SecretStore>>,
    env: EnvLookup,
    budget: Duration,
}

impl SecretResolver {
    /// Resolver reading `env:` references from the process environment.
    pub fn new(budget: Duration) -> Self {
        Self {
            stores: BTreeMap::new(),
            env: Arc::new(|name: &str| std::env::var(name).ok()),
            budget,
        }
    }

    /// Register a store under its own name, replacing any previous one.
    pub fn with_store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.stores.insert(store.name().to_string(), store);
        self
    }

    /// Replace the environment lookup.
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(lookup);
        self
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub fn store(&self, name: &str) -> Option<&Arc<dyn SecretStore>> {
        self.stores.get(name)
    }

    /// Resolve every reference in `tree`.
    ///
    /// Resolved values are strings attributed to the reference's text-only
    /// origin. References are resolved one at a time, in key order.
    pub async fn resolve(&self, tree: &MergedTree) -> Result<MergedTree, SecretResolutionError> {
        self.resolve_within(tree, &[KeyPath::root()]).await
    }

    /// Resolve only the references at or below one of `scope`.
    ///
    /// References elsewhere (e.g. under ignored unknown keys) are left as is.
    pub async fn resolve_within(
        &self,
        tree: &MergedTree,
        scope: &[KeyPath],
    ) -> Result<MergedTree, SecretResolutionError> {
        let references: Vec<(KeyPath, String)> = tree
            .references()
            .into_iter()
            .filter(|(path, _)| scope.iter().any(|prefix| path.starts_with(prefix)))
            .collect();
        if references.is_empty() {
            return Ok(tree.clone());
        }

        let count = references.len();
        let mut resolved = tree.clone();
        for (path, text) in references {
            let reference: Reference = text
                .parse()
                .map_err(|source| SecretResolutionError::Invalid {
                    path: path.clone(),
                    source,
                })?;
            let value = self.fetch(&path, &reference).await?;
            resolved.replace(&path, Value::String(value), reference.origin());
            tracing::debug!(key = %path, reference = %reference, "Reference resolved");
        }

        tracing::info!(count, "References resolved");
        Ok(resolved)
    }

    async fn fetch(&self, path: &KeyPath, reference: &Reference) -> Result<String, SecretResolutionError> {
        let found = match reference {
            Reference::Env { var } => (self.env)(var),
            Reference::Secret { store, key } => {
                let backend = self
                    .stores
                    .get(store)
                    .ok_or_else(|| SecretResolutionError::UnknownStore {
                        path: path.clone(),
                        reference: reference.to_string(),
                        store: store.clone(),
                    })?;
                with_budget(&reference.to_string(), self.budget, backend.fetch(key))
                    .await
                    .map_err(|source| SecretResolutionError::Timeout {
                        path: path.clone(),
                        reference: reference.to_string(),
                        source,
                    })?
                    .map_err(|source| SecretResolutionError::Store {
                        path: path.clone(),
                        reference: reference.to_string(),
                        source,
                    })?
            }
        };

        found.ok_or_else(|| {
            tracing::warn!(key = %path, reference = %reference, "Reference target missing");
            SecretResolutionError::Missing {
                path: path.clone(),
                reference: reference.to_string(),
            }
        })
    }
}

impl fmt::Debug for SecretResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretResolver")
            .field("stores", &self.stores.keys().collect::<Vec<_>>())
            .field("budget", &self.budget)
            .finish()
    }
}
