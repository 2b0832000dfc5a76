//! The check expression tree: what parsers emit instead of source strings.
//!
//! Each node is a boolean-valued check over the value at a [`Path`]. The
//! tree renders to the generated-source shape a reader would expect from
//! the validator's `source` property, and evaluates directly against a
//! value with the current loop-binding environment. Injection safety holds
//! by construction: nodes only ever carry already-validated literal values,
//! paths, and compiler-minted loop variables.

use std::fmt::Write as _;

use serde_json::Value;

use crate::error::ValidationError;
use crate::literal::{RawFragment, croak_literal, serialize_literal};
use crate::path::{LoopVar, Path};
use crate::schema::{Schema, literal_eq};

#[derive(Debug, Clone)]
pub enum Check {
    /// Always passes.
    True,
    /// Value has string type.
    IsString(Path),
    /// Value has number type, with NaN and finiteness policy.
    IsNumber { path: Path, allow_nan: bool, finite: bool },
    /// Value is a mathematically integral number. NaN is never an integer.
    IsInteger(Path),
    /// Value is strictly `true` or `false`.
    IsBoolean(Path),
    /// Value is loosely null: null or absent.
    IsNull(Path),
    /// Value strictly equals a literal constant.
    Equals { path: Path, value: Value },
    /// Non-null object-typed value (objects and arrays both qualify).
    ObjectTyped(Path),
    IsArray(Path),
    KeyCountEq { path: Path, count: usize },
    KeyCountLe { path: Path, count: usize },
    KeyCountGe { path: Path, count: usize },
    HasKey { path: Path, key: String },
    /// Every present key is one of the declared keys.
    KeysSubsetOf { path: Path, keys: Vec<String> },
    LenEq { path: Path, len: usize },
    LenGe { path: Path, len: usize },
    LenLe { path: Path, len: usize },
    All(Vec<Check>),
    Any(Vec<Check>),
    /// `!(key in value) || body`: a field check gated on presence.
    FieldGuard { path: Path, key: String, body: Box<Check> },
    /// Loop over all elements, binding the index variable per iteration.
    Every { path: Path, var: LoopVar, body: Box<Check> },
    /// Parenthesized subtree with reporting suppressed (union variants).
    Group(Box<Check>),
    /// `body || croak({...})`: reports the first failure at this location.
    Report { expected: Schema, at: Path, body: Box<Check> },
}

// ------------------------------ Rendering -------------------------------- //

impl Check {
    /// Renders the boolean expression this tree stands for.
    pub fn render_source(&self) -> String {
        let mut out = String::new();
        self.render(&mut out);
        out
    }

    fn render(&self, out: &mut String) {
        match self {
            Check::True => out.push_str("true"),
            Check::IsString(path) => {
                let arg = path.render(true);
                let _ = write!(out, "typeof {arg} === \"string\"");
            }
            Check::IsNumber { path, allow_nan, finite } => {
                let arg = path.render(true);
                let _ = write!(out, "typeof {arg} === \"number\"");
                if !allow_nan {
                    let _ = write!(out, " && !isNaN({arg})");
                }
                if *finite {
                    if *allow_nan {
                        let _ = write!(out, " && (isFinite({arg}) || isNaN({arg}))");
                    } else {
                        let _ = write!(out, " && isFinite({arg})");
                    }
                }
            }
            Check::IsInteger(path) => {
                let arg = path.render(true);
                let _ = write!(out, "typeof {arg} === \"number\" && Number.isInteger({arg})");
            }
            Check::IsBoolean(path) => {
                let arg = path.render(true);
                let _ = write!(out, "{arg} === true || {arg} === false");
            }
            Check::IsNull(path) => {
                let _ = write!(out, "{} == null", path.render(true));
            }
            Check::Equals { path, value } => {
                let _ = write!(out, "{} === {}", path.render(true), serialize_literal(value));
            }
            Check::ObjectTyped(path) => {
                let arg = path.render(true);
                let _ = write!(out, "{arg} != null && typeof {arg} === \"object\"");
            }
            Check::IsArray(path) => {
                let _ = write!(out, "Array.isArray({})", path.render(true));
            }
            Check::KeyCountEq { path, count } => {
                let _ = write!(out, "Object.keys({}).length === {count}", path.render(true));
            }
            Check::KeyCountLe { path, count } => {
                let _ = write!(out, "Object.keys({}).length <= {count}", path.render(true));
            }
            Check::KeyCountGe { path, count } => {
                let _ = write!(out, "Object.keys({}).length >= {count}", path.render(true));
            }
            Check::HasKey { path, key } => {
                let _ = write!(
                    out,
                    "{} in {}",
                    serialize_literal(&Value::String(key.clone())),
                    path.render(true)
                );
            }
            Check::KeysSubsetOf { path, keys } => {
                let arg = path.render(true);
                let alternatives = keys
                    .iter()
                    .map(|key| format!("key === {}", serialize_literal(&Value::String(key.clone()))))
                    .collect::<Vec<_>>()
                    .join(" || ");
                let _ = write!(out, "Object.keys({arg}).every((key) => {alternatives})");
            }
            Check::LenEq { path, len } => {
                let _ = write!(out, "{}.length === {len}", path.render(true));
            }
            Check::LenGe { path, len } => {
                let _ = write!(out, "{}.length >= {len}", path.render(true));
            }
            Check::LenLe { path, len } => {
                let _ = write!(out, "{}.length <= {len}", path.render(true));
            }
            Check::All(checks) => {
                for (i, check) in checks.iter().enumerate() {
                    if i > 0 {
                        out.push_str(" && ");
                    }
                    check.render(out);
                }
            }
            Check::Any(checks) => {
                for (i, check) in checks.iter().enumerate() {
                    if i > 0 {
                        out.push_str(" || ");
                    }
                    check.render(out);
                }
            }
            Check::FieldGuard { path, key, body } => {
                let _ = write!(
                    out,
                    "(!({} in {}) || ",
                    serialize_literal(&Value::String(key.clone())),
                    path.render(true)
                );
                body.render(out);
                out.push(')');
            }
            Check::Every { path, var, body } => {
                let _ = write!(out, "{}.every((_, {}) => ", path.render(true), var.render());
                body.render(out);
                out.push(')');
            }
            Check::Group(body) => {
                out.push('(');
                body.render(out);
                out.push(')');
            }
            Check::Report { expected, at, body } => {
                out.push('(');
                body.render(out);
                let croak = croak_literal(
                    &expected.as_value(),
                    &at.render_diagnostic_source(),
                    RawFragment(at.render(true)),
                );
                let _ = write!(out, " || croak({croak})");
                out.push(')');
            }
        }
    }
}

// ------------------------------ Evaluation -------------------------------- //

/// How a failing [`Check::Report`] behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Record the first failure, keep evaluating as ordinary boolean logic.
    Predicate,
    /// Unwind at the first failure.
    Assert,
}

/// Per-invocation evaluation state: the mode, one slot per loop binding,
/// and the first recorded failure.
pub(crate) struct Scope {
    mode: Mode,
    bindings: Vec<Option<usize>>,
    first_error: Option<ValidationError>,
}

impl Scope {
    pub(crate) fn new(mode: Mode, binding_count: usize) -> Self {
        Scope { mode, bindings: vec![None; binding_count], first_error: None }
    }

    pub(crate) fn take_error(&mut self) -> Option<ValidationError> {
        self.first_error.take()
    }
}

impl Check {
    /// Evaluates the check against `root`. `Err` only in assert mode, where
    /// the first failure unwinds immediately.
    pub(crate) fn eval(&self, root: &Value, scope: &mut Scope) -> Result<bool, ValidationError> {
        match self {
            Check::True => Ok(true),
            Check::IsString(path) => {
                Ok(matches!(path.walk(root, &scope.bindings), Some(Value::String(_))))
            }
            Check::IsNumber { path, allow_nan, finite } => {
                let Some(Value::Number(n)) = path.walk(root, &scope.bindings) else {
                    return Ok(false);
                };
                let Some(f) = n.as_f64() else { return Ok(false) };
                if f.is_nan() {
                    return Ok(*allow_nan);
                }
                Ok(!*finite || f.is_finite())
            }
            Check::IsInteger(path) => {
                let Some(Value::Number(n)) = path.walk(root, &scope.bindings) else {
                    return Ok(false);
                };
                Ok(n.as_i64().is_some()
                    || n.as_u64().is_some()
                    || n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0))
            }
            Check::IsBoolean(path) => {
                Ok(matches!(path.walk(root, &scope.bindings), Some(Value::Bool(_))))
            }
            Check::IsNull(path) => {
                Ok(matches!(path.walk(root, &scope.bindings), None | Some(Value::Null)))
            }
            Check::Equals { path, value } => {
                Ok(path.walk(root, &scope.bindings).is_some_and(|v| literal_eq(v, value)))
            }
            Check::ObjectTyped(path) => Ok(matches!(
                path.walk(root, &scope.bindings),
                Some(Value::Object(_)) | Some(Value::Array(_))
            )),
            Check::IsArray(path) => {
                Ok(matches!(path.walk(root, &scope.bindings), Some(Value::Array(_))))
            }
            Check::KeyCountEq { path, count } => {
                Ok(key_count(path.walk(root, &scope.bindings)) == Some(*count))
            }
            Check::KeyCountLe { path, count } => {
                Ok(key_count(path.walk(root, &scope.bindings)).is_some_and(|c| c <= *count))
            }
            Check::KeyCountGe { path, count } => {
                Ok(key_count(path.walk(root, &scope.bindings)).is_some_and(|c| c >= *count))
            }
            Check::HasKey { path, key } => {
                Ok(path.walk(root, &scope.bindings).is_some_and(|v| has_key(v, key)))
            }
            Check::KeysSubsetOf { path, keys } => {
                let Some(value) = path.walk(root, &scope.bindings) else { return Ok(false) };
                Ok(match value {
                    Value::Object(map) => map.keys().all(|k| keys.iter().any(|d| d == k)),
                    Value::Array(items) => (0..items.len())
                        .all(|i| keys.iter().any(|d| *d == i.to_string())),
                    _ => false,
                })
            }
            Check::LenEq { path, len } => {
                Ok(array_len(path.walk(root, &scope.bindings)) == Some(*len))
            }
            Check::LenGe { path, len } => {
                Ok(array_len(path.walk(root, &scope.bindings)).is_some_and(|l| l >= *len))
            }
            Check::LenLe { path, len } => {
                Ok(array_len(path.walk(root, &scope.bindings)).is_some_and(|l| l <= *len))
            }
            Check::All(checks) => {
                for check in checks {
                    if !check.eval(root, scope)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Check::Any(checks) => {
                for check in checks {
                    if check.eval(root, scope)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Check::FieldGuard { path, key, body } => {
                if !path.walk(root, &scope.bindings).is_some_and(|v| has_key(v, key)) {
                    return Ok(true);
                }
                body.eval(root, scope)
            }
            Check::Every { path, var, body } => {
                let len = match path.walk(root, &scope.bindings) {
                    Some(Value::Array(items)) => items.len(),
                    _ => return Ok(false),
                };
                let slot = var.id() as usize;
                let result = (|| {
                    for i in 0..len {
                        scope.bindings[slot] = Some(i);
                        if !body.eval(root, scope)? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                })();
                scope.bindings[slot] = None;
                result
            }
            Check::Group(body) => body.eval(root, scope),
            Check::Report { expected, at, body } => {
                if body.eval(root, scope)? {
                    return Ok(true);
                }
                let error = ValidationError {
                    expected: expected.clone(),
                    at: at.resolve_entries(&scope.bindings),
                    got: at.walk(root, &scope.bindings).cloned(),
                };
                match scope.mode {
                    Mode::Assert => Err(error),
                    Mode::Predicate => {
                        // first failure wins; later reports are no-ops
                        if scope.first_error.is_none() {
                            scope.first_error = Some(error);
                        }
                        Ok(false)
                    }
                }
            }
        }
    }
}

// Key semantics follow the generated source's host rules: arrays answer for
// numeric-string keys and enumerate their indices as keys.
fn has_key(value: &Value, key: &str) -> bool {
    match value {
        Value::Object(map) => map.contains_key(key),
        Value::Array(items) => key.parse::<usize>().is_ok_and(|i| i < items.len()),
        _ => false,
    }
}

fn key_count(value: Option<&Value>) -> Option<usize> {
    match value {
        Some(Value::Object(map)) => Some(map.len()),
        Some(Value::Array(items)) => Some(items.len()),
        _ => None,
    }
}

fn array_len(value: Option<&Value>) -> Option<usize> {
    match value {
        Some(Value::Array(items)) => Some(items.len()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(check: &Check, root: &Value) -> bool {
        let mut scope = Scope::new(Mode::Predicate, 4);
        check.eval(root, &mut scope).unwrap()
    }

    #[test]
    fn object_typed_accepts_arrays_like_the_host_language() {
        let check = Check::ObjectTyped(Path::root());
        assert!(eval(&check, &json!({})));
        assert!(eval(&check, &json!([])));
        assert!(!eval(&check, &json!(null)));
        assert!(!eval(&check, &json!("x")));
    }

    #[test]
    fn key_checks_treat_arrays_as_indexed_objects() {
        let root = Path::root();
        assert!(eval(&Check::KeyCountEq { path: root.clone(), count: 2 }, &json!(["a", "b"])));
        assert!(eval(&Check::HasKey { path: root.clone(), key: "1".into() }, &json!(["a", "b"])));
        assert!(!eval(&Check::HasKey { path: root.clone(), key: "2".into() }, &json!(["a", "b"])));
        let subset = Check::KeysSubsetOf { path: root, keys: vec!["0".into(), "1".into()] };
        assert!(eval(&subset, &json!(["a", "b"])));
        assert!(!eval(&subset, &json!(["a", "b", "c"])));
    }

    #[test]
    fn loose_null_accepts_absence() {
        let check = Check::IsNull(Path::root().key("missing"));
        assert!(eval(&check, &json!({})));
        assert!(eval(&check, &json!({ "missing": null })));
        assert!(!eval(&check, &json!({ "missing": 0 })));
    }

    #[test]
    fn integers_are_numeric_not_representational() {
        let check = Check::IsInteger(Path::root());
        assert!(eval(&check, &json!(2)));
        assert!(eval(&check, &json!(2.0)));
        assert!(eval(&check, &json!(-3)));
        assert!(!eval(&check, &json!(2.5)));
        assert!(!eval(&check, &json!("2")));
    }

    #[test]
    fn render_matches_the_generated_source_shape() {
        let path = Path::root().key("a");
        assert_eq!(
            Check::IsString(path.clone()).render_source(),
            "typeof root.a === \"string\""
        );
        assert_eq!(
            Check::IsNumber { path: path.clone(), allow_nan: false, finite: true }.render_source(),
            "typeof root.a === \"number\" && !isNaN(root.a) && isFinite(root.a)"
        );
        assert_eq!(
            Check::IsBoolean(path.clone()).render_source(),
            "root.a === true || root.a === false"
        );
        assert_eq!(
            Check::FieldGuard {
                path: Path::root(),
                key: "a".into(),
                body: Box::new(Check::Group(Box::new(Check::IsString(path)))),
            }
            .render_source(),
            "(!(\"a\" in root) || (typeof root.a === \"string\"))"
        );
    }

    #[test]
    fn every_binds_and_releases_its_loop_variable() {
        let var = LoopVar::new(0);
        let check = Check::Every {
            path: Path::root(),
            var,
            body: Box::new(Check::IsNumber {
                path: Path::root().binding(var),
                allow_nan: false,
                finite: true,
            }),
        };
        assert!(eval(&check, &json!([1, 2, 3])));
        assert!(!eval(&check, &json!([1, "x", 3])));
        assert!(!eval(&check, &json!("not an array")));
        assert_eq!(check.render_source(), "root.every((_, i0) => typeof root[i0] === \"number\" && !isNaN(root[i0]) && isFinite(root[i0]))");
    }
}
