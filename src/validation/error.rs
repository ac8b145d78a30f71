//! Validation errors and warnings.

use std::fmt;

use crate::tree::KeyPath;

/// Placeholder printed instead of a value that must not be shown.
pub const REDACTED: &str = "<redacted>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValidationErrorKind {
    Missing,
    TypeMismatch,
    Constraint,
    UnknownKey,
    InvalidReference,
}

impl ValidationErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationErrorKind::Missing => "missing",
            ValidationErrorKind::TypeMismatch => "type-mismatch",
            ValidationErrorKind::Constraint => "constraint",
            ValidationErrorKind::UnknownKey => "unknown-key",
            ValidationErrorKind::InvalidReference => "invalid-reference",
        }
    }
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One problem with one key.
///
/// `actual` is already redacted when the key is secret or the value came
/// from an indirection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub path: KeyPath,
    pub kind: ValidationErrorKind,
    pub expected: String,
    pub actual: String,
    pub message: String,
}

impl ValidationError {
    /// Tab-separated report line:
    /// `error\t<key>\t<kind>\t<expected>\t<actual>\t<message>`.
    pub fn to_line(&self) -> String {
        format!(
            "error\t{}\t{}\t{}\t{}\t{}",
            field(&self.path.to_string()),
            self.kind,
            field(&self.expected),
            field(&self.actual),
            field(&self.message)
        )
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {} [expected {}, found {}]",
            self.path, self.kind, self.message, self.expected, self.actual
        )
    }
}

/// A non-fatal finding, such as an ignored unknown key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub path: KeyPath,
    pub message: String,
}

impl ValidationWarning {
    /// `warning\t<key>\t<message>`.
    pub fn to_line(&self) -> String {
        format!("warning\t{}\t{}", field(&self.path.to_string()), field(&self.message))
    }
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Every error of a validation pass, sorted by key path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new(mut errors: Vec<ValidationError>) -> Self {
        errors.sort_by(|a, b| a.path.cmp(&b.path).then(a.kind.cmp(&b.kind)));
        Self { errors }
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.errors.iter()
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation error(s)", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Keep report lines one record per line.
fn field(text: &str) -> String {
    text.replace(['\t', '\n', '\r'], " ")
}
