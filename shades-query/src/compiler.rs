//! Compiler driver.
//!
//! A shader is a clause chain (see [`query`]):
//!
//! 1. One or more `from` clauses binding declaration sources (inputs, uniforms, constants). Their fields become global
//!    declarations and, once they are all declared, the entry point is opened.
//! 2. Zero or more `let` clauses, each becoming a local variable of the entry point.
//! 3. Exactly one `select`, projecting the outputs.
//!
//! User functions called by the shader are spliced right before the entry point, each after the functions it calls.

use crate::{
  error::{CompileError, CompileResult},
  expr::Expr,
  fun::{FunctionCache, FunctionDef, FunctionRecord},
  parser::{exactly_one, one_or_more, zero_or_more, Parser, Source},
  query::{self, Clause},
  reflect::{FieldCache, FieldPath},
  syntax::SyntaxRegistry,
  writer::glsl::{self, Emitter, INDENT_SPACES},
};
use std::{fmt, sync::Arc};

/// Target dialect of the generated code.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Target {
  /// Content of the `#version` directive.
  pub version: String,

  /// Default precision of floats, if the dialect needs one.
  pub precision: Option<String>,

  /// Suffix appended to float literals.
  pub float_suffix: String,

  /// Number of spaces per indent level.
  pub indent: usize,
}

impl Target {
  /// Desktop GLSL 3.30, core profile.
  pub fn glsl330() -> Self {
    Self {
      version: "330 core".to_owned(),
      precision: None,
      float_suffix: String::new(),
      indent: INDENT_SPACES,
    }
  }

  /// GLSL ES 3.00, floats in high precision.
  pub fn gles300() -> Self {
    Self {
      version: "300 es".to_owned(),
      precision: Some("highp".to_owned()),
      float_suffix: String::new(),
      indent: INDENT_SPACES,
    }
  }

  pub fn with_float_suffix(self, float_suffix: impl Into<String>) -> Self {
    Self {
      float_suffix: float_suffix.into(),
      ..self
    }
  }

  pub fn with_precision(self, precision: impl Into<String>) -> Self {
    Self {
      precision: Some(precision.into()),
      ..self
    }
  }

  pub fn with_indent(self, indent: usize) -> Self {
    Self { indent, ..self }
  }
}

impl Default for Target {
  fn default() -> Self {
    Self::glsl330()
  }
}

/// Output of a compilation.
#[derive(Clone, Debug)]
pub struct CompiledShader {
  /// Shader source.
  pub source: String,

  /// Flattened inputs, in declaration order.
  pub inputs: Vec<FieldPath>,

  /// Flattened uniforms, in declaration order; their accessors read the values to upload.
  pub uniforms: Vec<FieldPath>,
}

impl fmt::Display for CompiledShader {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str(&self.source)
  }
}

/// Compilation context.
///
/// The caches can be shared between compilers, possibly on different threads, with [`Compiler::with_caches`].
#[derive(Debug)]
pub struct Compiler {
  registry: Arc<SyntaxRegistry>,
  target: Target,
  functions: Arc<FunctionCache>,
  fields: Arc<FieldCache>,
}

impl Default for Compiler {
  fn default() -> Self {
    Self::new(SyntaxRegistry::glsl(), Target::default())
  }
}

impl Compiler {
  /// Compiler with its own, empty caches.
  pub fn new(registry: impl Into<Arc<SyntaxRegistry>>, target: Target) -> Self {
    Self::with_caches(
      registry,
      target,
      Arc::new(FunctionCache::new()),
      Arc::new(FieldCache::new()),
    )
  }

  pub fn with_caches(
    registry: impl Into<Arc<SyntaxRegistry>>,
    target: Target,
    functions: Arc<FunctionCache>,
    fields: Arc<FieldCache>,
  ) -> Self {
    Self {
      registry: registry.into(),
      target,
      functions,
      fields,
    }
  }

  pub fn registry(&self) -> &SyntaxRegistry {
    &self.registry
  }

  pub fn target(&self) -> &Target {
    &self.target
  }

  pub fn functions(&self) -> &Arc<FunctionCache> {
    &self.functions
  }

  pub fn fields(&self) -> &Arc<FieldCache> {
    &self.fields
  }

  fn emitter(&self) -> Emitter<'_> {
    Emitter::new(&self.registry, &self.functions, &self.fields, &self.target)
  }

  /// Compile a user function, unless a function with the same identity is already compiled.
  ///
  /// The functions it calls must be defined first. Returns the record stored in the function cache.
  pub fn define_function(&self, def: &FunctionDef) -> CompileResult<Arc<FunctionRecord>> {
    if let Some(record) = self.functions.get(&def.decl) {
      return Ok(record);
    }

    log::debug!("defining function {} ({})", def.name, def.decl);

    let mut emitter = self.emitter();
    emitter.begin_function(def)?;

    if query::is_clause(&def.body) {
      let clauses = query::clauses(&def.body)?;
      let mut source = Source::new(&clauses);

      zero_or_more(glsl::let_clause)
        .then(exactly_one(return_clause).if_fail(|| CompileError::MissingReturnClause))
        .parse(&mut source, &mut emitter)?;

      if let Some(clause) = source.current() {
        return Err(CompileError::malformed(format!(
          "unexpected {} clause after the select of function {}",
          clause.keyword(),
          def.name
        )));
      }
    } else {
      emitter.write_return(&def.body)?;
    }

    let record = emitter.finish_function(def)?;
    Ok(self.functions.insert(record))
  }

  /// Compile a shader.
  pub fn compile(&self, shader: &Expr) -> CompileResult<CompiledShader> {
    log::debug!("compiling shader (#version {})", self.target.version);

    let clauses = query::clauses(shader)?;
    let mut source = Source::new(&clauses);
    let mut emitter = self.emitter();

    emitter.write_preamble()?;

    one_or_more(declaration)
      .if_fail(|| CompileError::MissingDeclarationClause)
      .if_succeed(|emitter: &mut Emitter| emitter.open_entry())
      .then(zero_or_more(glsl::let_clause))
      .then(exactly_one(projection).if_fail(|| CompileError::MissingReturnClause))
      .parse(&mut source, &mut emitter)?;

    if let Some(clause) = source.current() {
      return Err(CompileError::malformed(format!(
        "unexpected {} clause after the select",
        clause.keyword()
      )));
    }

    let shader = emitter.finish_shader()?;
    log::debug!(
      "compiled shader: {} input(s), {} uniform(s)",
      shader.inputs.len(),
      shader.uniforms.len()
    );

    Ok(shader)
  }

  /// Compile a shader and only keep its source.
  pub fn compile_to_string(&self, shader: &Expr) -> CompileResult<String> {
    self.compile(shader).map(|shader| shader.source)
  }

  /// Compile a standalone expression.
  pub fn compile_expr(&self, e: &Expr) -> CompileResult<String> {
    self.emitter().emit_standalone(e)
  }
}

fn declaration(clause: &Clause, emitter: &mut Emitter) -> CompileResult<bool> {
  match *clause {
    Clause::From { name, source } => {
      if emitter.declare_source(name, source)? {
        log::trace!("declaration clause {}", name);
        Ok(true)
      } else {
        Err(CompileError::malformed(format!(
          "`{}` must be bound to inputs, uniforms or constants",
          name
        )))
      }
    }

    _ => Ok(false),
  }
}

fn projection(clause: &Clause, emitter: &mut Emitter) -> CompileResult<bool> {
  match *clause {
    Clause::Select { projection } => {
      log::trace!("select clause");
      emitter.write_projection(projection)?;
      Ok(true)
    }

    _ => Ok(false),
  }
}

fn return_clause(clause: &Clause, emitter: &mut Emitter) -> CompileResult<bool> {
  match *clause {
    Clause::Select { projection } => {
      emitter.write_return(projection)?;
      Ok(true)
    }

    Clause::From { name, .. } => Err(CompileError::malformed(format!(
      "functions cannot declare `{}` with a from clause",
      name
    ))),

    Clause::Let { .. } => Ok(false),
  }
}
