//! Orchestrates resolution and codegen over a schema tree and wraps the
//! result as a callable validator.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};

use crate::check::{Check, Mode, Scope};
use crate::error::{CompileError, MinifyError, SchemaError, ValidationError};
use crate::parsers::{Parser, ParserRegistry};
use crate::path::{LoopVar, Path};
use crate::schema::Schema;
use crate::transformers::TransformerRegistry;

/// Iteration bound for transformer chains. Exceeding it means a transformer
/// rewrites a type back to itself (or an equivalent) indefinitely.
pub const TRANSFORM_BOUND: usize = 256;

/// The external source-shrinking collaborator. Opaque to the core: it takes
/// source text and either returns replacement text or fails. Timeouts and
/// cancellation are the caller's concern, wrapped around this call.
pub trait SourceMinifier: Send + Sync {
    fn minify(&self, source: &str, single_expression: bool) -> Result<String, MinifyError>;
}

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Hand the generated source to the minifier collaborator.
    pub minify: bool,
    /// Assertion mode: the validator unwinds at the first failure instead of
    /// recording it and returning false.
    pub throw_on_error: bool,
}

/// A compiler instance owns its registries, so independently extended
/// compilers coexist without sharing state. Registration happens through
/// `&mut` access and is therefore finished before a shared compiler starts
/// serving compilations.
pub struct Compiler {
    parsers: ParserRegistry,
    transformers: TransformerRegistry,
    minifier: Option<Arc<dyn SourceMinifier>>,
}

impl Compiler {
    pub fn new() -> Self {
        Compiler {
            parsers: ParserRegistry::builtin(),
            transformers: TransformerRegistry::builtin(),
            minifier: None,
        }
    }

    pub fn with_minifier(mut self, minifier: Arc<dyn SourceMinifier>) -> Self {
        self.minifier = Some(minifier);
        self
    }

    pub fn parsers(&self) -> &ParserRegistry {
        &self.parsers
    }

    pub fn parsers_mut(&mut self) -> &mut ParserRegistry {
        &mut self.parsers
    }

    pub fn transformers(&self) -> &TransformerRegistry {
        &self.transformers
    }

    pub fn transformers_mut(&mut self) -> &mut TransformerRegistry {
        &mut self.transformers
    }

    /// Compiles `schema` into a validator. The input is deep-copied first;
    /// the caller's value is never altered.
    pub fn compile(
        &self,
        schema: &Value,
        options: &CompileOptions,
    ) -> Result<Validator, CompileError> {
        let schema = schema.clone();

        let mut cx = Codegen { compiler: self, suppress: 0, next_binding: 0 };
        let root = cx.parse(&schema, &Path::root())?;
        let binding_count = cx.next_binding as usize;

        let expression = root.render_source();
        let mut source = if options.throw_on_error {
            format!("(root, croak) => void {expression};")
        } else {
            format!("(root, croak) => {expression};")
        };
        debug!(
            bindings = binding_count,
            throw_on_error = options.throw_on_error,
            source_len = source.len(),
            "compiled schema"
        );

        if options.minify {
            let minifier = self
                .minifier
                .as_deref()
                .ok_or_else(|| MinifyError("no minifier configured".into()))?;
            source = minifier.minify(&source, true)?;
        }

        let mode = if options.throw_on_error { Mode::Assert } else { Mode::Predicate };
        Ok(Validator { source, check: root, mode, binding_count, error: None })
    }

    /// Strips any trailing `::`-suffixed tag from the type name, then either
    /// finds a registered parser or applies a registered transformer to a
    /// fresh copy and retries, up to the iteration bound.
    fn resolve(&self, schema: Value) -> Result<(Parser, Schema), CompileError> {
        let mut current = schema;
        let mut last_type = String::new();

        for _ in 0..TRANSFORM_BOUND {
            let node = Schema::from_value(&current)?;
            let full = node.type_name();
            let bare = full.split_once("::").map_or(full, |(head, _)| head);

            if let Some(parser) = self.parsers.get(bare) {
                return Ok((parser.clone(), node));
            }
            let Some(transformer) = self.transformers.get(bare) else {
                return Err(SchemaError::UnknownType(full.to_string()).into());
            };
            trace!(schema_type = full, "applying transformer");
            last_type = full.to_string();
            current = transformer(&node)?;
        }

        Err(CompileError::TransformCycle { type_name: last_type })
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Recursion state for one compilation: the suppression counter for union
/// variants and the loop-binding allocator. Passed explicitly, never global.
pub struct Codegen<'c> {
    compiler: &'c Compiler,
    suppress: u32,
    next_binding: u32,
}

impl Codegen<'_> {
    /// Validates and resolves a nested schema node, runs its parser, and
    /// wraps the result for reporting (or grouping, when suppressed).
    pub fn parse(&mut self, schema: &Value, path: &Path) -> Result<Check, CompileError> {
        let node = Schema::from_value(schema)?;
        let (parser, resolved) = self.compiler.resolve(node.as_value())?;
        let body = parser(&resolved, self, path)?;

        if self.suppress > 0 {
            Ok(Check::Group(Box::new(body)))
        } else {
            Ok(Check::Report { expected: node, at: path.clone(), body: Box::new(body) })
        }
    }

    /// Like [`parse`](Self::parse), with failure reporting suppressed for
    /// the whole subtree. The counter is restored on the way out.
    pub fn parse_suppressed(&mut self, schema: &Value, path: &Path) -> Result<Check, CompileError> {
        self.suppress += 1;
        let result = self.parse(schema, path);
        self.suppress -= 1;
        result
    }

    /// Mints a loop index variable. Each loop gets its own, so nested loops
    /// never shadow one another.
    pub fn fresh_binding(&mut self) -> LoopVar {
        let var = LoopVar::new(self.next_binding);
        self.next_binding += 1;
        var
    }
}

/// A compiled validator: the generated source (immutable after
/// construction), the executable check tree, and a single error slot that
/// is reset at the start of each invocation.
#[derive(Debug)]
pub struct Validator {
    source: String,
    check: Check,
    mode: Mode,
    binding_count: usize,
    error: Option<ValidationError>,
}

impl Validator {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The failure recorded by the most recent invocation, if any.
    pub fn error(&self) -> Option<&ValidationError> {
        self.error.as_ref()
    }

    /// Predicate call: true iff `value` conforms. On failure the first
    /// failing location is recorded in the error slot; on success the slot
    /// is cleared.
    pub fn validate(&mut self, value: &Value) -> bool {
        self.error = None;
        match self.run(value, self.mode) {
            Ok(()) => true,
            Err(error) => {
                self.error = Some(error);
                false
            }
        }
    }

    /// Assertion call: unwinds with the first failure.
    pub fn assert(&mut self, value: &Value) -> Result<(), ValidationError> {
        self.error = None;
        match self.run(value, Mode::Assert) {
            Ok(()) => Ok(()),
            Err(error) => {
                self.error = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Per-call result with no shared state: safe to call on a shared
    /// reference from multiple threads.
    pub fn check(&self, value: &Value) -> Result<(), ValidationError> {
        self.run(value, Mode::Predicate)
    }

    fn run(&self, value: &Value, mode: Mode) -> Result<(), ValidationError> {
        let mut scope = Scope::new(mode, self.binding_count);
        match self.check.eval(value, &mut scope) {
            Ok(true) => Ok(()),
            Ok(false) => Err(scope.take_error().expect("the root check reports its own failure")),
            Err(error) => Err(error),
        }
    }
}

/// Compiles with a fresh default compiler (built-in registries only).
pub fn compile(schema: &Value, options: &CompileOptions) -> Result<Validator, CompileError> {
    Compiler::new().compile(schema, options)
}
