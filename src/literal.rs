//! Serializes arbitrary values as injection-safe literal source text.
//!
//! Everything that flows from schema content into rendered source goes
//! through here (or through [`crate::ident::is_safe_ident`]): a value is
//! rendered as a literal expression that evaluates back to an equal value,
//! with every quote and control character escaped so no input can terminate
//! a literal early or smuggle syntax past it.

use std::fmt::Write as _;

use serde_json::Value;

use crate::ident::is_safe_ident;

/// `serde_json::Value` trees are acyclic, so depth is the only unbounded
/// dimension. Past this bound we render `undefined` instead of recursing.
const MAX_DEPTH: usize = 128;

/// Render `value` as literal source text. Total: never errors, always
/// terminates.
pub fn serialize_literal(value: &Value) -> String {
    let mut out = String::new();
    write_literal(&mut out, value, 0);
    out
}

fn write_literal(out: &mut String, value: &Value, depth: usize) {
    if depth > MAX_DEPTH {
        out.push_str("undefined");
        return;
    }

    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => {
            let _ = write!(out, "{n}");
        }
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_literal(out, item, depth + 1);
            }
            out.push(']');
        }
        Value::Object(map) => {
            if map.is_empty() {
                out.push_str("{}");
                return;
            }
            out.push_str("{ ");
            for (i, (key, val)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                if is_safe_ident(key) {
                    out.push_str(key);
                } else {
                    write_string(out, key);
                }
                out.push_str(": ");
                write_literal(out, val, depth + 1);
            }
            out.push_str(" }");
        }
    }
}

/// Double-quoted string literal with every quote, backslash, control
/// character, and line separator escaped.
fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// A fragment of already-safe source text, rendered verbatim.
///
/// Only the compiler constructs these (for access expressions and loop
/// variables it generated itself); schema or user content can never reach
/// this type, which is what keeps verbatim rendering sound.
pub(crate) struct RawFragment(pub(crate) String);

/// Assembles the error-object literal embedded next to a failing check:
/// `{ expected: <schema>, at: [<segments>], got: <access expression> }`.
pub(crate) fn croak_literal(expected: &Value, at_source: &str, got: RawFragment) -> String {
    format!(
        "{{ expected: {}, at: {}, got: {} }}",
        serialize_literal(expected),
        at_source,
        got.0
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn primitives_render_canonically() {
        assert_eq!(serialize_literal(&json!(null)), "null");
        assert_eq!(serialize_literal(&json!(true)), "true");
        assert_eq!(serialize_literal(&json!(false)), "false");
        assert_eq!(serialize_literal(&json!(42)), "42");
        assert_eq!(serialize_literal(&json!(-7)), "-7");
        assert_eq!(serialize_literal(&json!(1.5)), "1.5");
        assert_eq!(serialize_literal(&json!("hi")), "\"hi\"");
    }

    #[test]
    fn strings_cannot_break_out_of_the_literal() {
        let hostile = "\"]; } croak(); [\"\\";
        let rendered = serialize_literal(&json!(hostile));
        assert_eq!(rendered, "\"\\\"]; } croak(); [\\\"\\\\\"");
        // round-trips through a JSON parser to the same value
        let back: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(back, json!(hostile));
    }

    #[test]
    fn control_characters_are_escaped() {
        assert_eq!(serialize_literal(&json!("a\nb\t\u{1}")), "\"a\\nb\\t\\u0001\"");
        assert_eq!(serialize_literal(&json!("\u{2028}\u{2029}")), "\"\\u2028\\u2029\"");
    }

    #[test]
    fn objects_use_bare_keys_only_when_safe() {
        let rendered = serialize_literal(&json!({ "ok": 1, "not ok": 2, "if": 3 }));
        assert_eq!(rendered, "{ ok: 1, \"not ok\": 2, \"if\": 3 }");
    }

    #[test]
    fn nested_composites_render_recursively() {
        let rendered = serialize_literal(&json!({ "xs": [1, "two", null], "empty": {} }));
        assert_eq!(rendered, "{ xs: [1, \"two\", null], empty: {} }");
    }

    #[test]
    fn depth_bound_terminates() {
        let mut v = json!(0);
        for _ in 0..(MAX_DEPTH * 2) {
            v = json!([v]);
        }
        let rendered = serialize_literal(&v);
        assert!(rendered.contains("undefined"));
        assert!(!rendered.contains('0'));
    }

    #[test]
    fn croak_literal_shape() {
        let s = croak_literal(
            &json!({ "type": "string" }),
            "[\"a\"]",
            RawFragment("root.a".into()),
        );
        assert_eq!(s, "{ expected: { type: \"string\" }, at: [\"a\"], got: root.a }");
    }
}
