use serde_json::{Map, Number, Value};
use std::collections::HashSet;
use std::sync::Arc;

use crate::record::{PropertyValue, ScalarValue, StructureValue};

/// Key under which a structure's type tag is shipped.
pub const TYPE_TAG_KEY: &str = "_typeTag";

/// Error raised when a property value cannot be read.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PropertyError {
    #[error("structure properties are unreadable: lock poisoned")]
    Poisoned,
}

/// Map a property value onto plain JSON.
///
/// Structures reached again while one of their own ancestors is being
/// simplified are elided: the field or element holding them is left out.
pub fn simplify(value: &PropertyValue) -> Result<Value, PropertyError> {
    let mut ancestors = HashSet::new();
    Ok(simplify_inner(value, &mut ancestors)?.unwrap_or(Value::Null))
}

pub fn simplify_scalar(scalar: &ScalarValue) -> Value {
    match scalar {
        ScalarValue::Null => Value::Null,
        ScalarValue::Bool(v) => Value::Bool(*v),
        ScalarValue::Int(v) => Value::from(*v),
        ScalarValue::UInt(v) => Value::from(*v),
        ScalarValue::Float(v) => match Number::from_f64(*v) {
            Some(n) => Value::Number(n),
            None if v.is_nan() => Value::String("NaN".to_string()),
            None if v.is_sign_positive() => Value::String("Infinity".to_string()),
            None => Value::String("-Infinity".to_string()),
        },
        ScalarValue::String(v) => Value::String(v.clone()),
    }
}

fn simplify_inner(
    value: &PropertyValue,
    ancestors: &mut HashSet<*const StructureValue>,
) -> Result<Option<Value>, PropertyError> {
    let simple = match value {
        PropertyValue::Scalar(scalar) => simplify_scalar(scalar),
        PropertyValue::Sequence(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                if let Some(v) = simplify_inner(item, ancestors)? {
                    out.push(v);
                }
            }
            Value::Array(out)
        }
        PropertyValue::Dictionary(entries) => {
            let mut out = Map::new();
            for (key, item) in entries {
                if let Some(v) = simplify_inner(item, ancestors)? {
                    out.insert(key.to_string(), v);
                }
            }
            Value::Object(out)
        }
        PropertyValue::Structure(structure) => {
            let id = Arc::as_ptr(structure);
            if !ancestors.insert(id) {
                return Ok(None);
            }
            let result = simplify_structure(structure, ancestors);
            ancestors.remove(&id);
            result?
        }
    };
    Ok(Some(simple))
}

fn simplify_structure(
    structure: &StructureValue,
    ancestors: &mut HashSet<*const StructureValue>,
) -> Result<Value, PropertyError> {
    let mut out = Map::new();
    if let Some(tag) = structure.type_tag() {
        out.insert(TYPE_TAG_KEY.to_string(), Value::String(tag.to_string()));
    }
    for prop in structure.properties()? {
        if let Some(v) = simplify_inner(&prop.value, ancestors)? {
            out.insert(prop.name, v);
        }
    }
    Ok(Value::Object(out))
}
