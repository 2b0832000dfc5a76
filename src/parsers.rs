//! Code generators for canonical schema forms.
//!
//! A parser takes a canonical node, the codegen context (for recursion and
//! loop bindings), and the path of the value under test, and returns the
//! check tree for that node. Structural problems in the schema fail here,
//! before any value is ever tested.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::check::Check;
use crate::compiler::Codegen;
use crate::error::{CompileError, SchemaError};
use crate::literal::serialize_literal;
use crate::path::Path;
use crate::schema::{Schema, as_unsigned_size, is_schema};

pub type Parser =
    Arc<dyn Fn(&Schema, &mut Codegen<'_>, &Path) -> Result<Check, CompileError> + Send + Sync>;

/// Insertion-ordered name → parser table. Built-ins are registered before
/// any user extension, and enumeration preserves that order.
pub struct ParserRegistry {
    entries: IndexMap<String, Parser>,
}

impl ParserRegistry {
    pub fn empty() -> Self {
        ParserRegistry { entries: IndexMap::new() }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        let builtins: [(&str, Parser); 11] = [
            ("string", Arc::new(parse_string)),
            ("number", Arc::new(parse_number)),
            ("integer", Arc::new(parse_integer)),
            ("boolean", Arc::new(parse_boolean)),
            ("null", Arc::new(parse_null)),
            ("any", Arc::new(parse_any)),
            ("const", Arc::new(parse_const)),
            ("union", Arc::new(parse_union)),
            ("object", Arc::new(parse_object)),
            ("tuple", Arc::new(parse_tuple)),
            ("array", Arc::new(parse_array)),
        ];
        for (name, parser) in builtins {
            registry.register(name, parser);
        }
        registry
    }

    /// False when the name is already taken; the original registration stays
    /// intact.
    pub fn register(&mut self, name: &str, parser: Parser) -> bool {
        if self.entries.contains_key(name) {
            return false;
        }
        debug!(name, "registering parser");
        self.entries.insert(name.to_string(), parser);
        true
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.entries.shift_remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Parser> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

// ------------------------------ Primitives -------------------------------- //

fn parse_string(_schema: &Schema, _cx: &mut Codegen, path: &Path) -> Result<Check, CompileError> {
    Ok(Check::IsString(path.clone()))
}

fn parse_number(schema: &Schema, _cx: &mut Codegen, path: &Path) -> Result<Check, CompileError> {
    Ok(Check::IsNumber {
        path: path.clone(),
        allow_nan: schema.flag("allowNaN", false),
        finite: schema.flag("finite", true),
    })
}

// NaN is never an integer, so `allowNaN` has nothing to admit here.
fn parse_integer(_schema: &Schema, _cx: &mut Codegen, path: &Path) -> Result<Check, CompileError> {
    Ok(Check::IsInteger(path.clone()))
}

fn parse_boolean(_schema: &Schema, _cx: &mut Codegen, path: &Path) -> Result<Check, CompileError> {
    Ok(Check::IsBoolean(path.clone()))
}

fn parse_null(_schema: &Schema, _cx: &mut Codegen, path: &Path) -> Result<Check, CompileError> {
    Ok(Check::IsNull(path.clone()))
}

fn parse_any(_schema: &Schema, _cx: &mut Codegen, _path: &Path) -> Result<Check, CompileError> {
    Ok(Check::True)
}

// ------------------------------ Composites -------------------------------- //

/// Keyed constants become structural checks with per-location diagnostics;
/// scalar constants compare strictly against the literal.
fn parse_const(schema: &Schema, cx: &mut Codegen, path: &Path) -> Result<Check, CompileError> {
    let value = schema.get("value").ok_or(SchemaError::MissingConstValue)?;

    match value {
        Value::Object(map) => {
            let fields: Map<String, Value> = map
                .iter()
                .map(|(key, sub)| (key.clone(), json!({ "type": "const", "value": sub })))
                .collect();
            let object = Schema::from_value(&json!({ "type": "object", "fields": fields }))?;
            parse_object(&object, cx, path)
        }
        Value::Array(items) => {
            let consts: Vec<Value> = items
                .iter()
                .map(|sub| json!({ "type": "const", "value": sub }))
                .collect();
            let tuple = Schema::from_value(&json!({ "type": "tuple", "items": consts }))?;
            parse_tuple(&tuple, cx, path)
        }
        _ => Ok(Check::Equals { path: path.clone(), value: value.clone() }),
    }
}

/// OR across all variants. Variant subtrees are generated with reporting
/// suppressed so only the union's own location reports a failure.
fn parse_union(schema: &Schema, cx: &mut Codegen, path: &Path) -> Result<Check, CompileError> {
    let variants = schema
        .get("variants")
        .and_then(Value::as_array)
        .ok_or(SchemaError::InvalidUnionVariants)?;

    if variants.is_empty() {
        return Err(SchemaError::EmptyUnion.into());
    }

    let mut arms = Vec::with_capacity(variants.len());
    for variant in variants {
        arms.push(cx.parse_suppressed(variant, path)?);
    }
    Ok(Check::Any(arms))
}

fn parse_object(schema: &Schema, cx: &mut Codegen, path: &Path) -> Result<Check, CompileError> {
    let fields = match schema.get("fields") {
        None => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => return Err(SchemaError::InvalidObjectFields.into()),
    };

    for field in fields.values() {
        if !is_schema(field) {
            return Err(SchemaError::InvalidFieldSchema(serialize_literal(field)).into());
        }
    }

    let strict = schema.flag("strict", true);
    let keys: Vec<&String> = fields.keys().collect();
    let required: Vec<&String> = fields
        .iter()
        .filter(|(_, field)| field_required(field))
        .map(|(key, _)| key)
        .collect();

    let mut checks = vec![Check::ObjectTyped(path.clone())];

    let exact_keys = strict && keys.len() == required.len();
    if exact_keys {
        checks.push(Check::KeyCountEq { path: path.clone(), count: keys.len() });
    }
    if strict && !exact_keys {
        checks.push(Check::KeyCountLe { path: path.clone(), count: keys.len() });
    }
    if !exact_keys && !required.is_empty() {
        checks.push(Check::KeyCountGe { path: path.clone(), count: required.len() });
    }
    for key in &required {
        checks.push(Check::HasKey { path: path.clone(), key: (*key).clone() });
    }
    if strict && !exact_keys && !keys.is_empty() {
        checks.push(Check::KeysSubsetOf {
            path: path.clone(),
            keys: keys.iter().map(|key| (*key).clone()).collect(),
        });
    }
    for (key, field) in &fields {
        let body = cx.parse(field, &path.key(key))?;
        checks.push(Check::FieldGuard {
            path: path.clone(),
            key: key.clone(),
            body: Box::new(body),
        });
    }

    Ok(Check::All(checks))
}

fn field_required(field: &Value) -> bool {
    !matches!(field.get("required"), Some(Value::Bool(false)))
}

fn parse_tuple(schema: &Schema, cx: &mut Codegen, path: &Path) -> Result<Check, CompileError> {
    let items = schema
        .get("items")
        .and_then(Value::as_array)
        .ok_or(SchemaError::InvalidTupleItems)?;

    for item in items {
        if !is_schema(item) {
            return Err(SchemaError::InvalidItemSchema(serialize_literal(item)).into());
        }
    }

    let mut checks = vec![
        Check::ObjectTyped(path.clone()),
        Check::LenEq { path: path.clone(), len: items.len() },
        Check::IsArray(path.clone()),
    ];
    for (i, item) in items.iter().enumerate() {
        checks.push(cx.parse(item, &path.index(i))?);
    }

    Ok(Check::All(checks))
}

fn parse_array(schema: &Schema, cx: &mut Codegen, path: &Path) -> Result<Check, CompileError> {
    let item = match schema.get("item") {
        Some(value) if is_schema(value) => value.clone(),
        other => {
            let shown = serialize_literal(other.unwrap_or(&Value::Null));
            return Err(SchemaError::InvalidItemSchema(shown).into());
        }
    };

    let length = length_bound(schema, "length")?;
    let min_length = length_bound(schema, "minLength")?;
    let max_length = length_bound(schema, "maxLength")?;

    if length.is_some() && (min_length.is_some() || max_length.is_some()) {
        return Err(SchemaError::ExclusiveArrayBounds.into());
    }

    let mut checks = vec![Check::ObjectTyped(path.clone())];
    if let Some(len) = length {
        checks.push(Check::LenEq { path: path.clone(), len });
    }
    if let Some(len) = min_length {
        checks.push(Check::LenGe { path: path.clone(), len });
    }
    if let Some(len) = max_length {
        checks.push(Check::LenLe { path: path.clone(), len });
    }
    checks.push(Check::IsArray(path.clone()));

    let var = cx.fresh_binding();
    let body = cx.parse(&item, &path.binding(var))?;
    checks.push(Check::Every { path: path.clone(), var, body: Box::new(body) });

    Ok(Check::All(checks))
}

fn length_bound(schema: &Schema, name: &'static str) -> Result<Option<usize>, SchemaError> {
    match schema.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => as_unsigned_size(value)
            .map(Some)
            .ok_or_else(|| SchemaError::InvalidArrayBound {
                bound: name,
                value: serialize_literal(value),
            }),
    }
}
