//! Serialization of resolved configurations.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::tree::{KeyPath, Mapping, Value};
use crate::validation::ResolvedConfig;

/// Errors from emitting or writing an artifact.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("value at {0} is not a finite number and cannot be written as JSON")]
    NonFiniteFloat(KeyPath),

    #[error("value at {0} is still an unresolved reference")]
    Unresolved(KeyPath),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialization failed: {0}")]
    Toml(#[from] toml::ser::Error),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Artifact format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Toml,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Toml => "toml",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Turns a [`ResolvedConfig`] into artifact bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Emitter {
    format: OutputFormat,
}

impl Emitter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Serialize `config`. Keys are sorted and the output ends with a newline.
    pub fn emit(&self, config: &ResolvedConfig) -> Result<Vec<u8>, EmitError> {
        let tree = config.to_tree();
        let mut text = match self.format {
            OutputFormat::Json => {
                let value = serde_json::Value::Object(json_object(&tree, &KeyPath::root())?);
                serde_json::to_string_pretty(&value)?
            }
            OutputFormat::Toml => toml::to_string_pretty(&toml_table(&tree, &KeyPath::root())?)?,
        };
        if !text.ends_with('\n') {
            text.push('\n');
        }
        Ok(text.into_bytes())
    }
}

fn json_object(map: &Mapping, at: &KeyPath) -> Result<serde_json::Map<String, serde_json::Value>, EmitError> {
    map.iter()
        .map(|(key, value)| json_value(value, &at.child(key.clone())).map(|v| (key.clone(), v)))
        .collect()
}

fn json_value(value: &Value, at: &KeyPath) -> Result<serde_json::Value, EmitError> {
    use serde_json::Value as J;

    Ok(match value {
        Value::Bool(b) => J::Bool(*b),
        Value::Integer(i) => J::from(*i),
        Value::Float(x) => serde_json::Number::from_f64(*x)
            .map(J::Number)
            .ok_or_else(|| EmitError::NonFiniteFloat(at.clone()))?,
        Value::String(s) => J::String(s.clone()),
        Value::Sequence(items) => J::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| json_value(item, &at.child(i.to_string())))
                .collect::<Result<_, _>>()?,
        ),
        Value::Mapping(map) => J::Object(json_object(map, at)?),
        Value::Reference(_) => return Err(EmitError::Unresolved(at.clone())),
    })
}

fn toml_table(map: &Mapping, at: &KeyPath) -> Result<toml::Table, EmitError> {
    map.iter()
        .map(|(key, value)| toml_value(value, &at.child(key.clone())).map(|v| (key.clone(), v)))
        .collect()
}

fn toml_value(value: &Value, at: &KeyPath) -> Result<toml::Value, EmitError> {
    Ok(match value {
        Value::Bool(b) => toml::Value::Boolean(*b),
        Value::Integer(i) => toml::Value::Integer(*i),
        Value::Float(x) => toml::Value::Float(*x),
        Value::String(s) => toml::Value::String(s.clone()),
        Value::Sequence(items) => toml::Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| toml_value(item, &at.child(i.to_string())))
                .collect::<Result<_, _>>()?,
        ),
        Value::Mapping(map) => toml::Value::Table(toml_table(map, at)?),
        Value::Reference(_) => return Err(EmitError::Unresolved(at.clone())),
    })
}
