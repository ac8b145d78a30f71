//! Schema entry definitions.

use std::fmt;
use std::sync::Arc;

use crate::tree::{KeyPath, Value};

/// Declared type of a configuration key.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    Boolean,
    Integer,
    Float,
    String,
    /// A string restricted to the listed variants.
    Enum(Vec<String>),
    /// A sequence, optionally with a declared item type.
    Sequence(Option<Box<ValueType>>),
    /// A free-form mapping; its children are not checked individually.
    Mapping,
}

impl ValueType {
    /// Strict type test without any coercion.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (ValueType::Boolean, Value::Bool(_)) => true,
            (ValueType::Integer, Value::Integer(_)) => true,
            (ValueType::Float, Value::Float(_) | Value::Integer(_)) => true,
            (ValueType::String, Value::String(_)) => true,
            (ValueType::Enum(variants), Value::String(s)) => variants.iter().any(|v| v == s),
            (ValueType::Sequence(None), Value::Sequence(_)) => true,
            (ValueType::Sequence(Some(item)), Value::Sequence(items)) => {
                items.iter().all(|v| item.accepts(v))
            }
            (ValueType::Mapping, Value::Mapping(_)) => true,
            _ => false,
        }
    }

    /// Widen integers to floats wherever this type expects a float.
    pub fn widen(&self, value: Value) -> Value {
        match (self, value) {
            (ValueType::Float, Value::Integer(i)) => Value::Float(i as f64),
            (ValueType::Sequence(Some(item)), Value::Sequence(items)) => {
                Value::Sequence(items.into_iter().map(|v| item.widen(v)).collect())
            }
            (_, value) => value,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Boolean => f.write_str("boolean"),
            ValueType::Integer => f.write_str("integer"),
            ValueType::Float => f.write_str("float"),
            ValueType::String => f.write_str("string"),
            ValueType::Enum(variants) => write!(f, "one of [{}]", variants.join(", ")),
            ValueType::Sequence(None) => f.write_str("sequence"),
            ValueType::Sequence(Some(item)) => write!(f, "sequence of {}", item),
            ValueType::Mapping => f.write_str("mapping"),
        }
    }
}

/// Caller-supplied predicate over an already type-checked value.
pub type PredicateFn = dyn Fn(&Value) -> Result<(), String> + Send + Sync;

/// Validation predicate attached to an entry.
///
/// Failure messages describe the rule only; they never echo the value, so
/// they are safe for secret keys.
#[derive(Clone)]
pub enum Constraint {
    /// Inclusive numeric bounds.
    Range { min: Option<i64>, max: Option<i64> },
    /// Inclusive bounds on string length (chars) or item count.
    Length { min: Option<usize>, max: Option<usize> },
    /// Strings, sequences and mappings must not be empty.
    NonEmpty,
    Custom { name: String, check: Arc<PredicateFn> },
}

impl Constraint {
    /// Build a custom predicate.
    pub fn custom<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        Constraint::Custom {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// Check `value` against this constraint.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            Constraint::Range { min, max } => {
                let Some(n) = value.as_f64() else {
                    return Ok(());
                };
                if let Some(min) = min {
                    if n < *min as f64 {
                        return Err(format!("must be at least {}", min));
                    }
                }
                if let Some(max) = max {
                    if n > *max as f64 {
                        return Err(format!("must be at most {}", max));
                    }
                }
                Ok(())
            }
            Constraint::Length { min, max } => {
                let Some(len) = length_of(value) else {
                    return Ok(());
                };
                if let Some(min) = min {
                    if len < *min {
                        return Err(format!("length must be at least {}", min));
                    }
                }
                if let Some(max) = max {
                    if len > *max {
                        return Err(format!("length must be at most {}", max));
                    }
                }
                Ok(())
            }
            Constraint::NonEmpty => match length_of(value) {
                Some(0) => Err("must not be empty".to_string()),
                _ => Ok(()),
            },
            Constraint::Custom { name, check } => {
                check(value).map_err(|reason| format!("{}: {}", name, reason))
            }
        }
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Range { min, max } => f
                .debug_struct("Range")
                .field("min", min)
                .field("max", max)
                .finish(),
            Constraint::Length { min, max } => f
                .debug_struct("Length")
                .field("min", min)
                .field("max", max)
                .finish(),
            Constraint::NonEmpty => f.write_str("NonEmpty"),
            Constraint::Custom { name, .. } => f.debug_struct("Custom").field("name", name).finish(),
        }
    }
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Sequence(items) => Some(items.len()),
        Value::Mapping(map) => Some(map.len()),
        _ => None,
    }
}

/// Declaration of one recognized configuration key.
///
/// Built with the consuming `with_*` methods and immutable afterwards.
#[derive(Debug, Clone)]
pub struct SchemaEntry {
    path: KeyPath,
    value_type: ValueType,
    default: Option<Value>,
    required: bool,
    secret: bool,
    constraints: Vec<Constraint>,
    description: Option<String>,
}

impl SchemaEntry {
    /// Create an optional, non-secret entry without default.
    pub fn new(path: KeyPath, value_type: ValueType) -> Self {
        Self {
            path,
            value_type,
            default: None,
            required: false,
            secret: false,
            constraints: Vec::new(),
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark the key secret: its value is redacted from every error and log.
    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    /// Set the default; integers given for a float are stored as floats.
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(self.value_type.widen(value));
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn path(&self) -> &KeyPath {
        &self.path
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_secret(&self) -> bool {
        self.secret
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Run every constraint, returning the first failure.
    pub fn check_constraints(&self, value: &Value) -> Result<(), String> {
        self.constraints.iter().try_for_each(|c| c.check(value))
    }
}
