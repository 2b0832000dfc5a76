use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::path::{self, PathEntry};
use crate::schema::Schema;

/// Structural problems in a schema node. All of these are fatal at compile
/// time and are never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("invalid schema: {0}")]
    NotASchema(String),
    #[error("invalid schema type: {0:?}")]
    UnknownType(String),
    #[error("missing const value")]
    MissingConstValue,
    #[error("invalid union variants")]
    InvalidUnionVariants,
    #[error("a union must have at least one variant")]
    EmptyUnion,
    #[error("invalid enum variants")]
    InvalidEnumVariants,
    #[error("an enum must have at least one variant")]
    EmptyEnum,
    #[error("invalid object fields")]
    InvalidObjectFields,
    #[error("invalid field schema: {0}")]
    InvalidFieldSchema(String),
    #[error("invalid tuple items")]
    InvalidTupleItems,
    #[error("invalid item schema: {0}")]
    InvalidItemSchema(String),
    #[error("invalid array {bound}: {value}")]
    InvalidArrayBound { bound: &'static str, value: String },
    #[error("array length cannot be combined with minLength or maxLength")]
    ExclusiveArrayBounds,
    #[error("failed to load schema: {0}")]
    Load(String),
}

/// Failure of the external minifier collaborator. The message is opaque to
/// the core.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct MinifyError(pub String);

/// Everything that can go wrong while turning a schema into a validator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// A transformer chain rewrote the schema more than the iteration bound
    /// allows. Signals a cyclic transformer registration.
    #[error("too many schema transformations for type {type_name:?}")]
    TransformCycle { type_name: String },
    #[error("minification failed: {0}")]
    Minify(#[from] MinifyError),
}

/// A concrete value failed to satisfy a compiled schema at a specific path.
///
/// `at` holds the segments below the root value (the root itself is elided),
/// already resolved: loop positions appear as plain indices. `got` is `None`
/// when the failing location does not exist in the value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    pub expected: Schema,
    pub at: Vec<PathEntry>,
    pub got: Option<Value>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "expected {} at {}",
            self.expected.type_name(),
            path::render_entries(&self.at)
        )
    }
}

impl std::error::Error for ValidationError {}
