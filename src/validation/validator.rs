//! Schema validation of merged trees.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::loader::SourceKind;
use crate::merge::MergedTree;
use crate::observability::metrics;
use crate::schema::{SchemaEntry, SchemaRegistry};
use crate::secrets::Reference;
use crate::tree::{KeyPath, Value};
use crate::validation::coerce::coerce;
use crate::validation::config::ResolvedConfig;
use crate::validation::error::{
    ValidationError, ValidationErrorKind, ValidationErrors, ValidationWarning, REDACTED,
};

/// Options for a validation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Report unknown keys as errors instead of warnings.
    pub strict: bool,
}

/// Result of the first pass: checked values plus the paths whose values
/// still contain references.
#[derive(Clone)]
pub struct Validated {
    values: BTreeMap<KeyPath, Value>,
    deferred: BTreeSet<KeyPath>,
    warnings: Vec<ValidationWarning>,
}

impl Validated {
    /// Entry paths waiting for their references to be resolved.
    pub fn deferred(&self) -> impl Iterator<Item = &KeyPath> {
        self.deferred.iter()
    }

    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }

    pub fn warnings(&self) -> &[ValidationWarning] {
        &self.warnings
    }
}

impl fmt::Debug for Validated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validated")
            .field("keys", &self.values.keys().map(ToString::to_string).collect::<Vec<_>>())
            .field("deferred", &self.deferred)
            .field("warnings", &self.warnings.len())
            .finish()
    }
}

/// Checks merged trees against a registry.
#[derive(Debug, Clone, Copy)]
pub struct Validator<'a> {
    schema: &'a SchemaRegistry,
    options: ValidationOptions,
}

impl<'a> Validator<'a> {
    pub fn new(schema: &'a SchemaRegistry, options: ValidationOptions) -> Self {
        Self { schema, options }
    }

    /// First pass over the merged tree.
    ///
    /// Values that contain references are only checked for reference syntax
    /// and deferred to [`Validator::complete`]. All errors are collected.
    pub fn validate(&self, tree: &MergedTree) -> Result<Validated, ValidationErrors> {
        let text_only = |path: &KeyPath| is_text_only(tree, path);
        let mut values = BTreeMap::new();
        let mut deferred = BTreeSet::new();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for entry in self.schema.entries() {
            let path = entry.path();
            match tree.get(path) {
                None => match entry.default() {
                    Some(default) => {
                        values.insert(path.clone(), default.clone());
                    }
                    None if entry.is_required() => errors.push(missing(entry)),
                    None => {}
                },
                Some(value) if value.contains_reference() => {
                    let before = errors.len();
                    check_reference_syntax(entry, value, &mut errors);
                    if errors.len() == before {
                        deferred.insert(path.clone());
                    }
                }
                Some(value) => {
                    let redact = entry.is_secret() || from_secret_store(tree, path);
                    match check_entry(entry, value, &text_only, redact) {
                        Ok(checked) => {
                            values.insert(path.clone(), checked);
                        }
                        Err(e) => errors.push(e),
                    }
                }
            }
        }

        for (path, value) in tree.leaves() {
            if self.schema.covering(&path).is_some() {
                continue;
            }
            if self.schema.has_descendants(&path) {
                if !matches!(value, Value::Mapping(_)) {
                    errors.push(ValidationError {
                        path,
                        kind: ValidationErrorKind::TypeMismatch,
                        expected: "mapping".to_string(),
                        actual: value.kind().to_string(),
                        message: "keys are declared below this key, so it must be a table".to_string(),
                    });
                }
                continue;
            }
            if self.options.strict {
                errors.push(ValidationError {
                    path,
                    kind: ValidationErrorKind::UnknownKey,
                    expected: "declared key".to_string(),
                    actual: value.kind().to_string(),
                    message: "unknown key".to_string(),
                });
            } else {
                tracing::warn!(key = %path, "Unknown key ignored");
                warnings.push(ValidationWarning {
                    path,
                    message: "unknown key ignored".to_string(),
                });
            }
        }

        if !errors.is_empty() {
            return Err(report(errors));
        }

        tracing::debug!(
            checked = values.len(),
            deferred = deferred.len(),
            warnings = warnings.len(),
            "Merged tree validated"
        );
        Ok(Validated {
            values,
            deferred,
            warnings,
        })
    }

    /// Second pass: check the deferred paths against the resolved tree and
    /// build the final configuration.
    ///
    /// Values reached through an indirection are always redacted in errors.
    pub fn complete(&self, validated: Validated, resolved: &MergedTree) -> Result<ResolvedConfig, ValidationErrors> {
        let text_only = |path: &KeyPath| is_text_only(resolved, path);
        let Validated {
            mut values,
            deferred,
            warnings,
        } = validated;
        let mut errors = Vec::new();

        for path in &deferred {
            let Ok(entry) = self.schema.lookup(path) else {
                continue;
            };
            match resolved.get(path) {
                None => errors.push(missing(entry)),
                Some(value) if value.contains_reference() => errors.push(ValidationError {
                    path: path.clone(),
                    kind: ValidationErrorKind::InvalidReference,
                    expected: entry.value_type().to_string(),
                    actual: "reference".to_string(),
                    message: "reference was not resolved".to_string(),
                }),
                Some(value) => match check_entry(entry, value, &text_only, true) {
                    Ok(checked) => {
                        values.insert(path.clone(), checked);
                    }
                    Err(e) => errors.push(e),
                },
            }
        }

        if !errors.is_empty() {
            return Err(report(errors));
        }

        let secrets = self
            .schema
            .entries()
            .filter(|entry| entry.is_secret() && values.contains_key(entry.path()))
            .map(|entry| entry.path().clone())
            .collect();

        tracing::debug!(keys = values.len(), "Configuration resolved");
        Ok(ResolvedConfig::new(values, secrets, warnings))
    }
}

fn is_text_only(tree: &MergedTree, path: &KeyPath) -> bool {
    tree.origin_of(path)
        .is_some_and(|origin| origin.kind().is_text_only())
}

fn from_secret_store(tree: &MergedTree, path: &KeyPath) -> bool {
    tree.origin_of(path)
        .is_some_and(|origin| origin.kind() == SourceKind::SecretStore)
}

fn missing(entry: &SchemaEntry) -> ValidationError {
    ValidationError {
        path: entry.path().clone(),
        kind: ValidationErrorKind::Missing,
        expected: entry.value_type().to_string(),
        actual: "absent".to_string(),
        message: "required key is missing".to_string(),
    }
}

fn check_reference_syntax(entry: &SchemaEntry, value: &Value, errors: &mut Vec<ValidationError>) {
    let mut references = Vec::new();
    value.references(entry.path(), &mut references);
    for (at, text) in references {
        if let Err(e) = text.parse::<Reference>() {
            errors.push(ValidationError {
                path: at,
                kind: ValidationErrorKind::InvalidReference,
                expected: "env:NAME or secret://STORE/KEY".to_string(),
                actual: "reference".to_string(),
                message: e.to_string(),
            });
        }
    }
}

/// Coerce, type-check and run the predicates of one entry.
fn check_entry<F>(entry: &SchemaEntry, value: &Value, text_only: &F, redact: bool) -> Result<Value, ValidationError>
where
    F: Fn(&KeyPath) -> bool,
{
    let path = entry.path();
    let actual = || {
        if redact {
            format!("{} {}", value.kind(), REDACTED)
        } else {
            value.describe()
        }
    };

    let checked = coerce(value, entry.value_type(), path, text_only).ok_or_else(|| ValidationError {
        path: path.clone(),
        kind: ValidationErrorKind::TypeMismatch,
        expected: entry.value_type().to_string(),
        actual: actual(),
        message: format!("expected {}, found {}", entry.value_type(), value.kind()),
    })?;

    entry
        .check_constraints(&checked)
        .map_err(|message| ValidationError {
            path: path.clone(),
            kind: ValidationErrorKind::Constraint,
            expected: entry.value_type().to_string(),
            actual: actual(),
            message,
        })?;

    Ok(checked)
}

fn report(errors: Vec<ValidationError>) -> ValidationErrors {
    for error in &errors {
        metrics::record_validation_error(error.kind.as_str());
    }
    let errors = ValidationErrors::new(errors);
    tracing::warn!(errors = errors.len(), "Validation failed");
    errors
}
