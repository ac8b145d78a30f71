//! Fragment text parsing.
//!
//! # Responsibilities
//! - Decode TOML and JSON fragment text into an untyped [`Mapping`]
//! - Turn `{ "$ref" = "..." }` tables into [`Value::Reference`]
//! - Attach a line/column or key hint to every failure

use std::path::Path;

use crate::loader::error::{LoadError, Location};
use crate::loader::fragment::Origin;
use crate::tree::{KeyPath, Mapping, Value};

/// Key of the single-entry table that marks an indirection.
pub const REFERENCE_KEY: &str = "$ref";

/// Text formats accepted for fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Json,
}

impl Format {
    /// Choose the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "toml" => Some(Format::Toml),
            "json" => Some(Format::Json),
            _ => None,
        }
    }

    /// Guess the format of a document that has no file name.
    pub fn sniff(text: &str) -> Self {
        if text.trim_start().starts_with('{') {
            Format::Json
        } else {
            Format::Toml
        }
    }
}

/// Parse fragment text into a mapping.
pub fn parse_fragment(text: &str, format: Format, origin: &Origin) -> Result<Mapping, LoadError> {
    let parse_error = |location: Location, message: String| LoadError::Parse {
        origin: origin.clone(),
        location,
        message,
    };

    match format {
        Format::Toml => {
            let table = toml::from_str::<toml::Table>(text).map_err(|e| {
                let location = e
                    .span()
                    .map(|span| Location::from_offset(text, span.start))
                    .unwrap_or(Location::Unknown);
                parse_error(location, e.message().to_string())
            })?;
            toml_table(table, &KeyPath::root())
                .map_err(|(path, message)| parse_error(Location::Key(path), message))
        }
        Format::Json => {
            let value: serde_json::Value = serde_json::from_str(text).map_err(|e| {
                parse_error(
                    Location::LineColumn {
                        line: e.line(),
                        column: e.column(),
                    },
                    e.to_string(),
                )
            })?;
            match value {
                serde_json::Value::Object(map) => json_object(map, &KeyPath::root())
                    .map_err(|(path, message)| parse_error(Location::Key(path), message)),
                other => Err(parse_error(
                    Location::LineColumn { line: 1, column: 1 },
                    format!("fragment root must be an object, found {}", json_kind(&other)),
                )),
            }
        }
    }
}

/// Convert a standalone TOML value (e.g. a schema default).
pub fn from_toml_value(value: toml::Value) -> Result<Value, String> {
    toml_value(value, &KeyPath::root()).map_err(|(_, message)| message)
}

type ConvertResult<T> = Result<T, (KeyPath, String)>;

fn toml_table(table: toml::Table, at: &KeyPath) -> ConvertResult<Mapping> {
    table
        .into_iter()
        .map(|(key, value)| {
            let path = at.child(key.clone());
            toml_value(value, &path).map(|v| (key, v))
        })
        .collect()
}

fn toml_value(value: toml::Value, at: &KeyPath) -> ConvertResult<Value> {
    Ok(match value {
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Integer(i) => Value::Integer(i),
        toml::Value::Float(x) => Value::Float(x),
        toml::Value::String(s) => Value::String(s),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Sequence(
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| toml_value(item, &at.child(i.to_string())))
                .collect::<ConvertResult<_>>()?,
        ),
        toml::Value::Table(table) => {
            if table.contains_key(REFERENCE_KEY) {
                return reference_from(table.len(), table.get(REFERENCE_KEY).and_then(|v| v.as_str()), at);
            }
            Value::Mapping(toml_table(table, at)?)
        }
    })
}

fn json_object(map: serde_json::Map<String, serde_json::Value>, at: &KeyPath) -> ConvertResult<Mapping> {
    let mut out = Mapping::new();
    for (key, value) in map {
        let path = at.child(key.clone());
        // null members are treated as absent
        if let Some(v) = json_value(value, &path)? {
            out.insert(key, v);
        }
    }
    Ok(out)
}

fn json_value(value: serde_json::Value, at: &KeyPath) -> ConvertResult<Option<Value>> {
    use serde_json::Value as J;

    Ok(Some(match value {
        J::Null => return Ok(None),
        J::Bool(b) => Value::Bool(b),
        J::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if n.is_f64() {
                Value::Float(n.as_f64().unwrap_or_default())
            } else {
                // values never appear in parse errors
                return Err((at.clone(), "integer is out of range for i64".to_string()));
            }
        }
        J::String(s) => Value::String(s),
        J::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                let path = at.child(i.to_string());
                match json_value(item, &path)? {
                    Some(v) => out.push(v),
                    None => return Err((path, "null is not allowed inside a sequence".to_string())),
                }
            }
            Value::Sequence(out)
        }
        J::Object(map) => {
            if map.contains_key(REFERENCE_KEY) {
                return reference_from(map.len(), map.get(REFERENCE_KEY).and_then(|v| v.as_str()), at)
                    .map(Some);
            }
            Value::Mapping(json_object(map, at)?)
        }
    }))
}

fn reference_from(table_len: usize, target: Option<&str>, at: &KeyPath) -> ConvertResult<Value> {
    match target {
        Some(target) if table_len == 1 => Ok(Value::Reference(target.to_string())),
        Some(_) => Err((
            at.clone(),
            format!("an indirection table must contain only the {} key", REFERENCE_KEY),
        )),
        None => Err((at.clone(), format!("{} must be a string", REFERENCE_KEY))),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::lookup;

    fn origin() -> Origin {
        Origin::file(Path::new("server-base.toml"))
    }

    #[test]
    fn test_parse_toml_fragment() {
        let text = r#"
"htaccess.RewriteBase" = "/"
session_lifetime = 1800
passwordsalt = { "$ref" = "env:PASSWORD_SALT" }

[user_oidc]
use_pkce = true
"#;
        let tree = parse_fragment(text, Format::Toml, &origin()).unwrap();
        assert_eq!(
            lookup(&tree, &KeyPath::new(["htaccess.RewriteBase"])),
            Some(&Value::String("/".into()))
        );
        assert_eq!(
            lookup(&tree, &KeyPath::new(["passwordsalt"])),
            Some(&Value::Reference("env:PASSWORD_SALT".into()))
        );
        assert_eq!(
            lookup(&tree, &KeyPath::new(["user_oidc", "use_pkce"])),
            Some(&Value::Bool(true))
        );
    }

    #[test]
    fn test_toml_error_has_line_hint() {
        let err = parse_fragment("a = 1\nb = \n", Format::Toml, &origin()).unwrap_err();
        match err {
            LoadError::Parse {
                location: Location::LineColumn { line, .. },
                ..
            } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_reference_rejected() {
        let text = "secret = { \"$ref\" = \"env:SECRET\", extra = 1 }\n";
        let err = parse_fragment(text, Format::Toml, &origin()).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Parse { location: Location::Key(ref p), .. } if p == &KeyPath::new(["secret"])
        ));
    }

    #[test]
    fn test_parse_json_fragment() {
        let text = r#"{"preview_max_x": 2048, "log_file": null, "jpeg_quality": 60.5,
                       "forwarded_for_headers": {"0": "HTTP_X_FORWARDED_FOR"}}"#;
        let tree = parse_fragment(text, Format::Json, &origin()).unwrap();
        assert_eq!(tree.get("preview_max_x"), Some(&Value::Integer(2048)));
        assert_eq!(tree.get("jpeg_quality"), Some(&Value::Float(60.5)));
        assert!(!tree.contains_key("log_file"));
    }

    #[test]
    fn test_json_root_must_be_object() {
        let err = parse_fragment("[1, 2]", Format::Json, &origin()).unwrap_err();
        assert!(err.to_string().contains("must be an object"));
    }

    #[test]
    fn test_json_null_in_sequence_rejected() {
        let err = parse_fragment(r#"{"a": [1, null]}"#, Format::Json, &origin()).unwrap_err();
        assert!(matches!(err, LoadError::Parse { location: Location::Key(_), .. }));
    }

    #[test]
    fn test_json_out_of_range_integer_not_echoed() {
        let text = r#"{"secret": 18446744073709551615}"#;
        let err = parse_fragment(text, Format::Json, &origin()).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Parse { location: Location::Key(ref p), .. } if p == &KeyPath::new(["secret"])
        ));
        let message = err.to_string();
        assert!(message.contains("out of range"));
        assert!(!message.contains("18446744073709551615"));
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(Format::from_path(Path::new("a/b.TOML")), Some(Format::Toml));
        assert_eq!(Format::from_path(Path::new("a/b.json")), Some(Format::Json));
        assert_eq!(Format::from_path(Path::new("a/b.php")), None);
        assert_eq!(Format::sniff("  {\"a\": 1}"), Format::Json);
        assert_eq!(Format::sniff("a = 1"), Format::Toml);
    }
}
