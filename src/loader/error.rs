//! Fragment loading errors.

use std::fmt;
use thiserror::Error;

use crate::loader::fragment::Origin;
use crate::loader::secret_store::SecretStoreError;
use crate::resilience::timeouts::SourceTimeoutError;
use crate::tree::KeyPath;

/// Where in a fragment a parse failure was detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// 1-based line and column in the fragment text.
    LineColumn { line: usize, column: usize },
    /// The key whose value was malformed.
    Key(KeyPath),
    Unknown,
}

impl Location {
    /// Convert a byte offset into a 1-based line/column location.
    pub fn from_offset(text: &str, offset: usize) -> Self {
        let mut offset = offset.min(text.len());
        while !text.is_char_boundary(offset) {
            offset -= 1;
        }
        let before = &text[..offset];
        let line = before.matches('\n').count() + 1;
        let column = before
            .rfind('\n')
            .map(|nl| before[nl + 1..].chars().count())
            .unwrap_or_else(|| before.chars().count())
            + 1;
        Location::LineColumn { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::LineColumn { line, column } => write!(f, "line {}, column {}", line, column),
            Location::Key(path) => write!(f, "key {}", path),
            Location::Unknown => f.write_str("unknown location"),
        }
    }
}

/// Errors from loading a single fragment.
///
/// Any of these rejects the whole fragment; nothing is partially applied.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Malformed fragment content.
    #[error("failed to parse {origin} at {location}: {message}")]
    Parse {
        origin: Origin,
        location: Location,
        message: String,
    },

    #[error("failed to read {origin}: {source}")]
    Io {
        origin: Origin,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported fragment format for {origin} (expected .toml or .json)")]
    UnsupportedFormat { origin: Origin },

    #[error("source {origin} does not exist")]
    SourceMissing { origin: Origin },

    #[error("secret store failed for {origin}: {source}")]
    Store {
        origin: Origin,
        #[source]
        source: SecretStoreError,
    },

    #[error(transparent)]
    Timeout(#[from] SourceTimeoutError),
}

impl LoadError {
    /// Timeouts may succeed when the caller tries again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LoadError::Timeout(_))
    }
}
