//! Schema data model: a validated tagged node over `serde_json` maps.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::SchemaError;
use crate::literal::serialize_literal;

/// A tagged schema node: an object map with a required string `type`
/// discriminator plus type-specific fields.
///
/// Schemas are immutable inputs to the compiler; construction clones the
/// backing map, so caller-held values are never altered and two
/// compilations never alias state.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    node: Map<String, Value>,
}

impl Schema {
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        match value {
            Value::Object(map) if map.get("type").is_some_and(Value::is_string) => {
                Ok(Schema { node: map.clone() })
            }
            other => Err(SchemaError::NotASchema(serialize_literal(other))),
        }
    }

    /// Convenience loader with path-located diagnostics for malformed text.
    pub fn from_json_str(src: &str) -> Result<Self, SchemaError> {
        let de = &mut serde_json::Deserializer::from_str(src);
        match serde_path_to_error::deserialize::<_, Value>(de) {
            Ok(value) => Schema::from_value(&value),
            Err(err) => {
                let path = err.path().to_string();
                Err(SchemaError::Load(format!("at JSON path {path} → {}", err.into_inner())))
            }
        }
    }

    pub fn type_name(&self) -> &str {
        self.node.get("type").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.node.get(key)
    }

    /// Boolean option with a default; non-boolean values fall back to the
    /// default rather than failing.
    pub fn flag(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.node.clone())
    }

    pub fn node(&self) -> &Map<String, Value> {
        &self.node
    }
}

impl TryFrom<&Value> for Schema {
    type Error = SchemaError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Schema::from_value(value)
    }
}

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.node.serialize(serializer)
    }
}

/// True iff `value` is a well-formed tagged node.
pub fn is_schema(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.get("type").is_some_and(Value::is_string))
}

/// Value-based equality for literal comparison: numbers compare numerically
/// (`1 == 1.0`) rather than by representation, recursively through
/// composites.
pub(crate) fn literal_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => number_eq(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| literal_eq(x, y))
        }
        (Value::Object(xm), Value::Object(ym)) => {
            xm.len() == ym.len()
                && xm.iter().all(|(k, v)| ym.get(k).is_some_and(|w| literal_eq(v, w)))
        }
        _ => a == b,
    }
}

fn number_eq(x: &serde_json::Number, y: &serde_json::Number) -> bool {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a == b;
    }
    match (x.as_f64(), y.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Unsigned 32-bit-range size, the only shape accepted for length bounds.
pub(crate) fn as_unsigned_size(value: &Value) -> Option<usize> {
    value
        .as_u64()
        .filter(|n| *n <= u32::MAX as u64)
        .map(|n| n as usize)
}
