//! Named rewrites from sugared schema forms to canonical forms.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::SchemaError;
use crate::schema::Schema;

/// A transformer rewrites one sugared node into a canonical (or closer to
/// canonical) node. It must not mutate its input; it returns a fresh value.
pub type Transformer = Arc<dyn Fn(&Schema) -> Result<Value, SchemaError> + Send + Sync>;

/// Insertion-ordered name → transformer table. Built-ins are registered
/// before any user extension, and enumeration preserves that order.
pub struct TransformerRegistry {
    entries: IndexMap<String, Transformer>,
}

impl TransformerRegistry {
    pub fn empty() -> Self {
        TransformerRegistry { entries: IndexMap::new() }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("enum", Arc::new(enum_to_union));
        registry
    }

    /// False when the name is already taken; the original registration stays
    /// intact.
    pub fn register(&mut self, name: &str, transformer: Transformer) -> bool {
        if self.entries.contains_key(name) {
            return false;
        }
        debug!(name, "registering transformer");
        self.entries.insert(name.to_string(), transformer);
        true
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.entries.shift_remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Transformer> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl Default for TransformerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// `enum{variants}` → `union` of one `const` per variant.
fn enum_to_union(schema: &Schema) -> Result<Value, SchemaError> {
    let variants = schema
        .get("variants")
        .and_then(Value::as_array)
        .ok_or(SchemaError::InvalidEnumVariants)?;

    if variants.is_empty() {
        return Err(SchemaError::EmptyEnum);
    }

    Ok(json!({
        "type": "union",
        "variants": variants
            .iter()
            .map(|variant| json!({ "type": "const", "value": variant }))
            .collect::<Vec<_>>(),
    }))
}
