//! Fragments and their origins.

use std::fmt;
use std::path::Path;

use crate::tree::Mapping;

/// Which kind of source produced a fragment or a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceKind {
    File,
    Environment,
    SecretStore,
}

impl SourceKind {
    /// Sources that can only carry text; their values may be coerced from strings.
    pub fn is_text_only(self) -> bool {
        !matches!(self, SourceKind::File)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::File => "file",
            SourceKind::Environment => "env",
            SourceKind::SecretStore => "secret",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies where a fragment (or a single resolved value) came from.
///
/// The identifier doubles as the tie-break key for equal priorities.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Origin {
    kind: SourceKind,
    id: String,
}

impl Origin {
    pub fn new(kind: SourceKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }

    pub fn file(path: &Path) -> Self {
        Self::new(SourceKind::File, path.display().to_string())
    }

    pub fn environment(prefix: &str) -> Self {
        Self::new(SourceKind::Environment, prefix)
    }

    pub fn secret_store(store: &str, name: &str) -> Self {
        Self::new(SourceKind::SecretStore, format!("{}/{}", store, name))
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// One independently loaded unit of configuration. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFragment {
    origin: Origin,
    priority: i32,
    tree: Mapping,
}

impl ConfigFragment {
    pub fn new(origin: Origin, priority: i32, tree: Mapping) -> Self {
        Self {
            origin,
            priority,
            tree,
        }
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Higher priority wins during merge.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn tree(&self) -> &Mapping {
        &self.tree
    }
}
