//! The resolved, typed configuration.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::tree::{insert, KeyPath, Mapping, Value};
use crate::validation::error::{ValidationWarning, REDACTED};

/// Final configuration: every value is concrete and satisfies its entry.
///
/// Immutable once built. `Debug` output replaces secret values with
/// `<redacted>`.
#[derive(Clone, PartialEq)]
pub struct ResolvedConfig {
    values: BTreeMap<KeyPath, Value>,
    secrets: BTreeSet<KeyPath>,
    warnings: Vec<ValidationWarning>,
}

impl ResolvedConfig {
    pub(crate) fn new(
        values: BTreeMap<KeyPath, Value>,
        secrets: BTreeSet<KeyPath>,
        warnings: Vec<ValidationWarning>,
    ) -> Self {
        Self {
            values,
            secrets,
            warnings,
        }
    }

    pub fn get(&self, path: &KeyPath) -> Option<&Value> {
        self.values.get(path)
    }

    pub fn get_bool(&self, path: &KeyPath) -> Option<bool> {
        self.get(path)?.as_bool()
    }

    pub fn get_i64(&self, path: &KeyPath) -> Option<i64> {
        self.get(path)?.as_i64()
    }

    pub fn get_f64(&self, path: &KeyPath) -> Option<f64> {
        self.get(path)?.as_f64()
    }

    pub fn get_str(&self, path: &KeyPath) -> Option<&str> {
        self.get(path)?.as_str()
    }

    pub fn is_secret(&self, path: &KeyPath) -> bool {
        self.secrets.contains(path)
    }

    /// Warnings collected while validating (e.g. ignored unknown keys).
    pub fn warnings(&self) -> &[ValidationWarning] {
        &self.warnings
    }

    /// Values in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&KeyPath, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Nest the flat key map back into a tree.
    pub fn to_tree(&self) -> Mapping {
        let mut tree = Mapping::new();
        for (path, value) in &self.values {
            // entry paths never nest, so there is nothing to collide with
            if let Err(conflict) = insert(&mut tree, path, value.clone()) {
                tracing::error!(key = %path, conflict = %conflict, "Resolved key collides with another key");
            }
        }
        tree
    }
}

impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (path, value) in &self.values {
            if self.secrets.contains(path) {
                map.entry(&path.to_string(), &REDACTED);
            } else {
                map.entry(&path.to_string(), value);
            }
        }
        map.finish()
    }
}
