//! Compile declarative JSON-like schemas into executable validators.
//!
//! Pipeline: resolve sugar forms through registered transformers, generate a
//! boolean check tree per schema node (parsers), and wrap the tree as a
//! callable validator that reports one path-located failure per call. The
//! tree also renders to the source text a string-emitting backend would have
//! produced, exposed on the validator for inspection.
//!
//! Design goals:
//! - Schema content never escapes its syntactic role: property names pass
//!   the identifier check or the string-literal path, constants pass the
//!   literal serializer, and loop variables are compiler-minted values that
//!   cannot be forged from data.
//! - Registries are per-compiler, insertion-ordered, first-come-first-kept.
//! - One deterministic failure per validation call (first failure wins).

pub mod check;
pub mod compiler;
pub mod error;
pub mod ident;
pub mod literal;
pub mod parsers;
pub mod path;
pub mod schema;
pub mod transformers;

pub use check::Check;
pub use compiler::{
    Codegen, CompileOptions, Compiler, SourceMinifier, TRANSFORM_BOUND, Validator, compile,
};
pub use error::{CompileError, MinifyError, SchemaError, ValidationError};
pub use ident::is_safe_ident;
pub use literal::serialize_literal;
pub use parsers::{Parser, ParserRegistry};
pub use path::{LoopVar, Path, PathEntry, Segment};
pub use schema::{Schema, is_schema};
pub use transformers::{Transformer, TransformerRegistry};
