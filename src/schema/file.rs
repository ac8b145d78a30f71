//! Schema documents on disk.
//!
//! A schema is a TOML file with one `[[entry]]` table per key:
//!
//! ```toml
//! [[entry]]
//! key = "session_lifetime"
//! type = "integer"
//! default = 1800
//! min = 60
//!
//! [[entry]]
//! path = ["htaccess.RewriteBase"]
//! type = "string"
//! default = "/"
//! ```

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::loader::parse::from_toml_value;
use crate::schema::entry::{Constraint, SchemaEntry, ValueType};
use crate::schema::registry::{SchemaError, SchemaRegistry};
use crate::tree::KeyPath;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaDocument {
    #[serde(default, rename = "entry")]
    entries: Vec<EntryDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntryDocument {
    key: Option<String>,
    path: Option<Vec<String>>,
    #[serde(rename = "type")]
    kind: TypeName,
    #[serde(default)]
    values: Vec<String>,
    items: Option<TypeName>,
    default: Option<toml::Value>,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    secret: bool,
    min: Option<i64>,
    max: Option<i64>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    #[serde(default)]
    non_empty: bool,
    description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TypeName {
    Boolean,
    Integer,
    Float,
    String,
    Enum,
    Sequence,
    Mapping,
}

/// Read and build a frozen registry from a schema file.
pub fn load_schema(path: &Path) -> Result<SchemaRegistry, SchemaError> {
    let content = fs::read_to_string(path).map_err(|source| SchemaError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let registry = parse_schema(&content, path)?;
    tracing::info!(path = %path.display(), entries = registry.len(), "Schema loaded");
    Ok(registry)
}

/// Build a frozen registry from schema document text.
///
/// `origin` is only used in error messages.
pub fn parse_schema(content: &str, origin: &Path) -> Result<SchemaRegistry, SchemaError> {
    let document: SchemaDocument = toml::from_str(content).map_err(|e| SchemaError::Parse {
        path: origin.to_path_buf(),
        message: e.message().to_string(),
    })?;

    let entries = document
        .entries
        .into_iter()
        .map(build_entry)
        .collect::<Result<Vec<_>, _>>()?;

    SchemaRegistry::from_entries(entries)
}

fn build_entry(doc: EntryDocument) -> Result<SchemaEntry, SchemaError> {
    let label = doc
        .key
        .clone()
        .or_else(|| doc.path.as_ref().map(|p| p.join(".")))
        .unwrap_or_default();
    let invalid = |reason: &str| SchemaError::InvalidEntry {
        key: label.clone(),
        reason: reason.to_string(),
    };

    let path = match (&doc.key, &doc.path) {
        (Some(key), None) => key
            .parse::<KeyPath>()
            .map_err(|e| invalid(&e.to_string()))?,
        (None, Some(segments)) if !segments.is_empty() => KeyPath::new(segments.iter().cloned()),
        (None, Some(_)) => return Err(invalid("path must not be empty")),
        (Some(_), Some(_)) => return Err(invalid("use either key or path, not both")),
        (None, None) => return Err(invalid("missing key or path")),
    };

    let value_type = match doc.kind {
        TypeName::Sequence => {
            let item = doc
                .items
                .map(|item| scalar_type(item, &doc.values).ok_or_else(|| invalid("unsupported item type")))
                .transpose()?;
            ValueType::Sequence(item.map(Box::new))
        }
        other => scalar_type(other, &doc.values).ok_or_else(|| invalid("unsupported type"))?,
    };
    if matches!(value_type, ValueType::Enum(ref v) if v.is_empty())
        || matches!(&value_type, ValueType::Sequence(Some(item)) if matches!(item.as_ref(), ValueType::Enum(v) if v.is_empty()))
    {
        return Err(invalid("enum requires a non-empty values list"));
    }
    if doc.items.is_some() && doc.kind != TypeName::Sequence {
        return Err(invalid("items is only valid for sequences"));
    }

    let mut entry = SchemaEntry::new(path, value_type);
    if doc.required {
        entry = entry.required();
    }
    if doc.secret {
        entry = entry.secret();
    }
    if doc.min.is_some() || doc.max.is_some() {
        entry = entry.with_constraint(Constraint::Range {
            min: doc.min,
            max: doc.max,
        });
    }
    if doc.min_length.is_some() || doc.max_length.is_some() {
        entry = entry.with_constraint(Constraint::Length {
            min: doc.min_length,
            max: doc.max_length,
        });
    }
    if doc.non_empty {
        entry = entry.with_constraint(Constraint::NonEmpty);
    }
    if let Some(description) = doc.description {
        entry = entry.with_description(description);
    }
    if let Some(default) = doc.default {
        let value = from_toml_value(default).map_err(|reason| invalid(&reason))?;
        entry = entry.with_default(value);
    }

    Ok(entry)
}

fn scalar_type(name: TypeName, values: &[String]) -> Option<ValueType> {
    Some(match name {
        TypeName::Boolean => ValueType::Boolean,
        TypeName::Integer => ValueType::Integer,
        TypeName::Float => ValueType::Float,
        TypeName::String => ValueType::String,
        TypeName::Enum => ValueType::Enum(values.to_vec()),
        TypeName::Mapping => ValueType::Mapping,
        TypeName::Sequence => return None,
    })
}
