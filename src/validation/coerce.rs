//! Safe coercions applied before the type check.
//!
//! | target  | accepted input                                   |
//! |---------|--------------------------------------------------|
//! | boolean | boolean; `"true"`/`"false"` from text-only origins |
//! | integer | integer; integer-valued string from any origin   |
//! | float   | float, integer; numeric string from text-only origins |
//!
//! Nothing else is converted.

use crate::schema::ValueType;
use crate::tree::{KeyPath, Value};

/// Coerce `value` (found at `path`) to `ty`, or `None` on mismatch.
///
/// `text_only` tells whether the value at a path came from a text-only origin.
pub fn coerce<F>(value: &Value, ty: &ValueType, path: &KeyPath, text_only: &F) -> Option<Value>
where
    F: Fn(&KeyPath) -> bool,
{
    let coerced = match (ty, value) {
        (ValueType::Boolean, Value::String(s)) if text_only(path) => match s.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => return None,
        },
        (ValueType::Integer, Value::String(s)) => Value::Integer(s.parse::<i64>().ok()?),
        (ValueType::Float, Value::Integer(i)) => Value::Float(*i as f64),
        (ValueType::Float, Value::String(s)) if text_only(path) => {
            let x = s.parse::<f64>().ok().filter(|x| x.is_finite())?;
            Value::Float(x)
        }
        (ValueType::Sequence(Some(item)), Value::Sequence(items)) => Value::Sequence(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| coerce(v, item, &path.child(i.to_string()), text_only))
                .collect::<Option<Vec<_>>>()?,
        ),
        _ => value.clone(),
    };

    ty.accepts(&coerced).then_some(coerced)
}
