//! The schema registry: the closed set of recognized keys.

use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::schema::entry::SchemaEntry;
use crate::tree::KeyPath;

/// Errors from building or querying the schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("duplicate schema key: {0}")]
    DuplicateKey(KeyPath),

    #[error("unknown schema key: {0}")]
    UnknownKey(KeyPath),

    #[error("schema is frozen; cannot register {0}")]
    Frozen(KeyPath),

    #[error("schema key {path} overlaps registered key {existing}")]
    OverlappingKey { path: KeyPath, existing: KeyPath },

    #[error("default for {path} is invalid: {reason}")]
    InvalidDefault { path: KeyPath, reason: String },

    #[error("invalid schema entry {key}: {reason}")]
    InvalidEntry { key: String, reason: String },

    #[error("failed to parse schema {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("failed to read schema {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Registry of schema entries keyed by path.
///
/// Entries are registered during construction; after [`SchemaRegistry::freeze`]
/// every further `register` call is rejected.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    entries: BTreeMap<KeyPath, SchemaEntry>,
    frozen: bool,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register all entries and freeze the result.
    pub fn from_entries<I>(entries: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = SchemaEntry>,
    {
        let mut registry = Self::new();
        for entry in entries {
            registry.register(entry)?;
        }
        registry.freeze();
        Ok(registry)
    }

    /// Register a new entry.
    pub fn register(&mut self, entry: SchemaEntry) -> Result<(), SchemaError> {
        let path = entry.path().clone();
        if self.frozen {
            return Err(SchemaError::Frozen(path));
        }
        if path.is_empty() {
            return Err(SchemaError::InvalidEntry {
                key: String::new(),
                reason: "key path must not be empty".to_string(),
            });
        }
        if self.entries.contains_key(&path) {
            return Err(SchemaError::DuplicateKey(path));
        }
        if let Some(existing) = self
            .entries
            .keys()
            .find(|existing| path.starts_with(existing) || existing.starts_with(&path))
        {
            return Err(SchemaError::OverlappingKey {
                path,
                existing: existing.clone(),
            });
        }
        if let Some(default) = entry.default() {
            if !entry.value_type().accepts(default) {
                return Err(SchemaError::InvalidDefault {
                    reason: format!("expected {}, found {}", entry.value_type(), default.kind()),
                    path,
                });
            }
            entry
                .check_constraints(default)
                .map_err(|reason| SchemaError::InvalidDefault {
                    path: path.clone(),
                    reason,
                })?;
        }

        tracing::debug!(key = %path, value_type = %entry.value_type(), "Schema entry registered");
        self.entries.insert(path, entry);
        Ok(())
    }

    /// Reject all further registrations.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Find the entry declared for exactly `path`.
    pub fn lookup(&self, path: &KeyPath) -> Result<&SchemaEntry, SchemaError> {
        self.entries
            .get(path)
            .ok_or_else(|| SchemaError::UnknownKey(path.clone()))
    }

    /// Find the entry whose path equals `path` or is one of its ancestors.
    pub fn covering(&self, path: &KeyPath) -> Option<&SchemaEntry> {
        path.prefixes().find_map(|prefix| self.entries.get(&prefix))
    }

    /// True if some entry lives strictly below `path`.
    pub fn has_descendants(&self, path: &KeyPath) -> bool {
        self.entries
            .range(path.clone()..)
            .take_while(|(key, _)| key.starts_with(path))
            .any(|(key, _)| key.len() > path.len())
    }

    /// Entries in key order.
    pub fn entries(&self) -> impl Iterator<Item = &SchemaEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
