//! Untyped tree values.

use std::collections::BTreeMap;

use crate::tree::KeyPath;

/// A mapping node. Sorted so traversal order never depends on load order.
pub type Mapping = BTreeMap<String, Value>;

/// A node in an untyped configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Sequence(Vec<Value>),
    Mapping(Mapping),
    /// Unresolved indirection; carries the raw reference text.
    Reference(String),
}

impl Value {
    /// Short type name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
            Value::Reference(_) => "reference",
        }
    }

    /// Human-readable description including the value itself for scalars.
    ///
    /// Callers must use [`Value::kind`] instead when the value may be secret.
    pub fn describe(&self) -> String {
        const MAX_TEXT: usize = 40;
        match self {
            Value::Bool(b) => format!("boolean {}", b),
            Value::Integer(i) => format!("integer {}", i),
            Value::Float(x) => format!("float {}", x),
            Value::String(s) if s.chars().count() > MAX_TEXT => {
                let head: String = s.chars().take(MAX_TEXT).collect();
                format!("string {:?}...", head)
            }
            Value::String(s) => format!("string {:?}", s),
            Value::Sequence(items) => format!("sequence of {} items", items.len()),
            Value::Mapping(map) => format!("mapping with {} keys", map.len()),
            Value::Reference(r) => format!("reference {}", r),
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// True if this node or any descendant is an unresolved reference.
    pub fn contains_reference(&self) -> bool {
        match self {
            Value::Reference(_) => true,
            Value::Sequence(items) => items.iter().any(Value::contains_reference),
            Value::Mapping(map) => map.values().any(Value::contains_reference),
            _ => false,
        }
    }

    /// Collect every reference below this node together with its text.
    ///
    /// Sequence elements are addressed by their index rendered as a segment.
    pub fn references(&self, at: &KeyPath, out: &mut Vec<(KeyPath, String)>) {
        match self {
            Value::Reference(r) => out.push((at.clone(), r.clone())),
            Value::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    item.references(&at.child(i.to_string()), out);
                }
            }
            Value::Mapping(map) => {
                for (key, value) in map {
                    value.references(&at.child(key.clone()), out);
                }
            }
            _ => {}
        }
    }
}

/// Look up `path` below `root`, walking mapping nodes only.
pub fn lookup<'a>(root: &'a Mapping, path: &KeyPath) -> Option<&'a Value> {
    let (first, rest) = path.segments().split_first()?;
    let mut current = root.get(first)?;
    for segment in rest {
        current = current.as_mapping()?.get(segment)?;
    }
    Some(current)
}

/// Insert `value` at `path`, creating intermediate mappings.
///
/// Returns the offending prefix if a non-mapping node is in the way.
pub fn insert(root: &mut Mapping, path: &KeyPath, value: Value) -> Result<(), KeyPath> {
    let Some((last, parents)) = path.segments().split_last() else {
        return Err(KeyPath::root());
    };

    let mut current = root;
    let mut walked = KeyPath::root();
    for segment in parents {
        walked = walked.child(segment.clone());
        let node = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        current = match node {
            Value::Mapping(map) => map,
            _ => return Err(walked),
        };
    }

    if matches!(current.get(last), Some(Value::Mapping(_))) && !matches!(value, Value::Mapping(_)) {
        return Err(path.clone());
    }
    current.insert(last.clone(), value);
    Ok(())
}
