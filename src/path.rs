//! Ordered property-access paths from the root value to a nested location.
//!
//! A path renders two ways: as an access expression for generated source
//! (`root.a["b c"][i0]`) and as plain data for diagnostics. The segment sum
//! is closed: a [`Segment::Binding`] carries a [`LoopVar`] that only the
//! codegen context can mint, so a loop-bound segment can never be forged
//! from schema content.

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::ident::is_safe_ident;
use crate::literal::serialize_literal;

/// Identity of a compiler-generated loop index variable (`i0`, `i1`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopVar(u32);

impl LoopVar {
    pub(crate) fn new(id: u32) -> Self {
        LoopVar(id)
    }

    pub fn id(&self) -> u32 {
        self.0
    }

    /// The variable name emitted into generated source. Compiler-generated,
    /// so it is rendered verbatim.
    pub(crate) fn render(&self) -> String {
        format!("i{}", self.0)
    }
}

/// One property-access step.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Literal string key.
    Key(String),
    /// Literal array index.
    Index(usize),
    /// Index known only inside a generated loop.
    Binding(LoopVar),
}

/// Ordered segment chain; the first segment is always the root identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Path(Vec<Segment>);

/// A resolved diagnostic segment: what lands in `ValidationError::at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathEntry {
    Key(String),
    Index(u64),
}

impl Serialize for PathEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PathEntry::Key(k) => serializer.serialize_str(k),
            PathEntry::Index(i) => serializer.serialize_u64(*i),
        }
    }
}

impl Path {
    pub fn root() -> Self {
        Path(vec![Segment::Key("root".into())])
    }

    pub fn key(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Key(key.to_string()));
        Path(segments)
    }

    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Index(index));
        Path(segments)
    }

    pub fn binding(&self, var: LoopVar) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Binding(var));
        Path(segments)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Builds the access-expression text. When `rooted`, the first segment
    /// renders as the bare root identifier; every later segment renders
    /// `.key` for safe identifiers, `[<literal>]` otherwise, and `[<var>]`
    /// for loop bindings.
    pub fn render(&self, rooted: bool) -> String {
        let mut out = String::new();
        let mut rest = self.0.iter();

        if rooted {
            match rest.next() {
                Some(Segment::Key(k)) if is_safe_ident(k) => out.push_str(k),
                Some(seg) => render_step(&mut out, seg),
                None => {}
            }
        }

        for seg in rest {
            match seg {
                Segment::Key(k) if is_safe_ident(k) => {
                    out.push('.');
                    out.push_str(k);
                }
                seg => render_step(&mut out, seg),
            }
        }

        out
    }

    /// Array-literal text for the `at` field of an embedded error object.
    /// Literal segments serialize; bindings render as their variable names
    /// (the one raw-fragment position in the system). The root segment is
    /// elided, matching the diagnostic contract.
    pub(crate) fn render_diagnostic_source(&self) -> String {
        let mut out = String::from("[");
        for (i, seg) in self.0[1..].iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            match seg {
                Segment::Key(k) => out.push_str(&serialize_literal(&Value::String(k.clone()))),
                Segment::Index(n) => out.push_str(&n.to_string()),
                Segment::Binding(var) => out.push_str(&var.render()),
            }
        }
        out.push(']');
        out
    }

    /// Resolves the path to plain diagnostic entries, substituting the
    /// current loop index for each binding. Best effort: an unresolved
    /// binding falls back to its variable name.
    pub(crate) fn resolve_entries(&self, bindings: &[Option<usize>]) -> Vec<PathEntry> {
        self.0[1..]
            .iter()
            .map(|seg| match seg {
                Segment::Key(k) => PathEntry::Key(k.clone()),
                Segment::Index(n) => PathEntry::Index(*n as u64),
                Segment::Binding(var) => match bindings.get(var.id() as usize).copied().flatten() {
                    Some(i) => PathEntry::Index(i as u64),
                    None => PathEntry::Key(var.render()),
                },
            })
            .collect()
    }

    /// Follows the path through `root` with the current binding environment.
    /// `None` when any step is absent, mirroring an `undefined` access.
    pub(crate) fn walk<'v>(
        &self,
        root: &'v Value,
        bindings: &[Option<usize>],
    ) -> Option<&'v Value> {
        let mut current = root;
        for seg in &self.0[1..] {
            current = match seg {
                Segment::Key(k) => access_key(current, k)?,
                Segment::Index(n) => access_index(current, *n)?,
                Segment::Binding(var) => {
                    let i = bindings.get(var.id() as usize).copied().flatten()?;
                    access_index(current, i)?
                }
            };
        }
        Some(current)
    }
}

fn render_step(out: &mut String, seg: &Segment) {
    match seg {
        Segment::Key(k) => {
            out.push('[');
            out.push_str(&serialize_literal(&Value::String(k.clone())));
            out.push(']');
        }
        Segment::Index(n) => {
            out.push('[');
            out.push_str(&n.to_string());
            out.push(']');
        }
        Segment::Binding(var) => {
            out.push('[');
            out.push_str(&var.render());
            out.push(']');
        }
    }
}

// Property access follows the host-language rule the generated source would
// use: numeric-string keys address array elements and numeric indices
// address their string-keyed twins.
fn access_key<'v>(value: &'v Value, key: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn access_index(value: &Value, index: usize) -> Option<&Value> {
    match value {
        Value::Array(items) => items.get(index),
        Value::Object(map) => map.get(index.to_string().as_str()),
        _ => None,
    }
}

/// Human-readable form of resolved entries, rooted: `root.a["b c"][0]`.
pub fn render_entries(entries: &[PathEntry]) -> String {
    let mut out = String::from("root");
    for entry in entries {
        match entry {
            PathEntry::Key(k) if is_safe_ident(k) => {
                out.push('.');
                out.push_str(k);
            }
            PathEntry::Key(k) => {
                out.push('[');
                out.push_str(&serialize_literal(&Value::String(k.clone())));
                out.push(']');
            }
            PathEntry::Index(i) => {
                out.push('[');
                out.push_str(&i.to_string());
                out.push(']');
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_safe_keys_bare_and_unsafe_keys_bracketed() {
        let path = Path::root().key("a").key("b c").key("if").index(3);
        assert_eq!(path.render(true), "root.a[\"b c\"][\"if\"][3]");
    }

    #[test]
    fn renders_bindings_as_their_variable_names() {
        let path = Path::root().key("xs").binding(LoopVar::new(0)).binding(LoopVar::new(1));
        assert_eq!(path.render(true), "root.xs[i0][i1]");
        assert_eq!(path.render_diagnostic_source(), "[\"xs\", i0, i1]");
    }

    #[test]
    fn hostile_keys_stay_inside_the_literal() {
        let path = Path::root().key("a\"] ; croak() ; [\"");
        assert_eq!(path.render(true), "root[\"a\\\"] ; croak() ; [\\\"\"]");
    }

    #[test]
    fn resolve_entries_substitutes_live_indices() {
        let path = Path::root().key("xs").binding(LoopVar::new(0));
        let entries = path.resolve_entries(&[Some(4)]);
        assert_eq!(entries, vec![PathEntry::Key("xs".into()), PathEntry::Index(4)]);
        // unresolved binding falls back to the variable name
        let entries = path.resolve_entries(&[None]);
        assert_eq!(entries, vec![PathEntry::Key("xs".into()), PathEntry::Key("i0".into())]);
    }

    #[test]
    fn walk_follows_keys_indices_and_bindings() {
        let value = json!({ "xs": [{ "y": 1 }, { "y": 2 }] });
        let path = Path::root().key("xs").binding(LoopVar::new(0)).key("y");
        assert_eq!(path.walk(&value, &[Some(1)]), Some(&json!(2)));
        assert_eq!(path.walk(&value, &[Some(9)]), None);
        assert_eq!(path.walk(&value, &[None]), None);
    }

    #[test]
    fn walk_uses_host_language_key_semantics_on_arrays() {
        let value = json!(["a", "b"]);
        assert_eq!(Path::root().key("1").walk(&value, &[]), Some(&json!("b")));
        assert_eq!(Path::root().key("x").walk(&value, &[]), None);
    }

    #[test]
    fn entry_rendering_matches_access_syntax() {
        let entries = vec![
            PathEntry::Key("a".into()),
            PathEntry::Key("b c".into()),
            PathEntry::Index(0),
        ];
        assert_eq!(render_entries(&entries), "root.a[\"b c\"][0]");
    }
}
