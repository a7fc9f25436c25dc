//! GLSL writer.
//!
//! The [`Emitter`] holds the state of one compilation: the output text, the current indentation, the local names
//! generated so far, the struct types already declared and the user functions referenced. Expressions are emitted
//! recursively into strings; statements (declarations, bindings, loops, assignments) are written to the output as soon
//! as they are known, which lets folds write their loop right before the statement using their result.

use crate::{
  compiler::{CompiledShader, Target},
  decl::{self, DeclId},
  error::{CompileError, CompileResult},
  expr::{BinOp, Expr, ExprKind, Literal, UnOp},
  fun::{FunctionCache, FunctionDef, FunctionRecord},
  parser::{exactly_one, zero_or_more, Parser, Source},
  query::{self, Clause},
  reflect::{FieldCache, FieldPath},
  stdlib,
  syntax::SyntaxRegistry,
  types::{Dim, MatrixDim, PrimType, SamplerDim, StructDef, Type},
};
use indexmap::IndexSet;
use std::{
  collections::{HashMap, HashSet},
  fmt::{self, Write as _},
  mem,
  sync::Arc,
};

/// Default number of spaces an indent level represents.
pub const INDENT_SPACES: usize = 2;

/// Emission state of one compilation.
#[derive(Debug)]
pub struct Emitter<'a> {
  registry: &'a SyntaxRegistry,
  functions: &'a FunctionCache,
  fields: &'a FieldCache,
  target: &'a Target,
  out: String,
  indent: usize,
  next_local: usize,
  entry_opened: bool,
  entry_offset: usize,
  referenced: IndexSet<DeclId>,
  declared_structs: IndexSet<String>,
  struct_types: Vec<Arc<StructDef>>,
  // struct declarations discovered once the entry point is opened; spliced before it
  late_structs: String,
  outputs: String,
  scopes: Vec<HashMap<String, String>>,
  // variables bound to declaration sources; their fields are globals
  sources: HashSet<String>,
  defining: Option<(DeclId, String)>,
  inputs: Vec<FieldPath>,
  uniforms: Vec<FieldPath>,
}

impl<'a> Emitter<'a> {
  pub fn new(
    registry: &'a SyntaxRegistry,
    functions: &'a FunctionCache,
    fields: &'a FieldCache,
    target: &'a Target,
  ) -> Self {
    Self {
      registry,
      functions,
      fields,
      target,
      out: String::new(),
      indent: 0,
      next_local: 0,
      entry_opened: false,
      entry_offset: 0,
      referenced: IndexSet::new(),
      declared_structs: IndexSet::new(),
      struct_types: Vec::new(),
      late_structs: String::new(),
      outputs: String::new(),
      scopes: Vec::new(),
      sources: HashSet::new(),
      defining: None,
      inputs: Vec::new(),
      uniforms: Vec::new(),
    }
  }

  /// Text written so far.
  pub fn output(&self) -> &str {
    &self.out
  }

  /// Emit a standalone expression.
  ///
  /// Expressions that need statements, such as folds, are rejected.
  pub fn emit_standalone(mut self, e: &Expr) -> CompileResult<String> {
    let text = self.emit(e)?;

    if !self.out.is_empty() {
      return Err(CompileError::UnsupportedExpression(
        "a fold needs a shader or function body to be written into".to_owned(),
      ));
    }

    Ok(text)
  }

  pub fn write_preamble(&mut self) -> CompileResult<()> {
    writeln!(self.out, "#version {}", self.target.version)?;

    if let Some(ref precision) = self.target.precision {
      writeln!(self.out, "precision {} float;", precision)?;
    }

    self.out.push('\n');
    Ok(())
  }

  /// Declare the fields of a declaration source as globals.
  ///
  /// Returns `false` if `source` is not a declaration source (inputs, uniforms or constants).
  pub fn declare_source(&mut self, name: &str, source: &Expr) -> CompileResult<bool> {
    let (decl, args) = match source.kind() {
      ExprKind::Call { decl, args, .. } => (decl, args),
      _ => return Ok(false),
    };

    let qualifier = if decl::is(decl, decl::INPUTS) {
      "in"
    } else if decl::is(decl, decl::UNIFORMS) {
      "uniform"
    } else if decl::is(decl, decl::CONSTANTS) {
      "const"
    } else {
      return Ok(false);
    };

    let def = source.ty().as_struct().cloned().ok_or_else(|| {
      CompileError::UnsupportedExpression(format!(
        "declaration source `{}` must be a struct, not {:?}",
        name,
        source.ty()
      ))
    })?;

    log::trace!("declaring `{}` as {} {}", name, qualifier, def.name);
    self.sources.insert(name.to_owned());

    if qualifier == "const" {
      let values = match args.as_slice() {
        [value] => match value.kind() {
          ExprKind::Construct { args, .. } if args.len() == def.fields.len() => args,
          _ => {
            return Err(CompileError::UnsupportedExpression(format!(
              "constants `{}` must be a construction of {}",
              name, def.name
            )))
          }
        },

        _ => {
          return Err(CompileError::UnsupportedExpression(format!(
            "constants `{}` carry no value",
            name
          )))
        }
      };

      for (field, value) in def.fields.iter().zip(values) {
        self.declare_type(&field.ty)?;
        let text = self.emit(value)?;
        writeln!(self.out, "const {} = {};", declarator(&field.ty, &field.name)?, text)?;
      }

      return Ok(true);
    }

    let paths = self.fields.fields(source.ty(), "")?;

    for field in &def.fields {
      self.declare_type(&field.ty)?;
      writeln!(self.out, "{} {};", qualifier, declarator(&field.ty, &field.name)?)?;
    }

    if qualifier == "in" {
      self.inputs.extend(paths.iter().cloned());
    } else {
      self.uniforms.extend(paths.iter().cloned());
    }

    Ok(true)
  }

  /// Open the `main` function.
  pub fn open_entry(&mut self) -> CompileResult<()> {
    self.entry_offset = self.out.len();
    self.entry_opened = true;
    self.out.push_str("\nvoid main() {\n");
    self.indent = 1;

    Ok(())
  }

  /// Write `T name = value;`.
  pub fn write_let(&mut self, name: &str, value: &Expr) -> CompileResult<()> {
    let text = self.emit(value)?;
    self.declare_type(value.ty())?;
    let declarator = declarator(value.ty(), name)?;
    self.sources.remove(name);

    self.write_indent()?;
    writeln!(self.out, "{} = {};", declarator, text)?;
    Ok(())
  }

  /// Assign every field of the output struct constructed by `projection`.
  ///
  /// Fields not starting with `gl_` are declared as outputs.
  pub fn write_projection(&mut self, projection: &Expr) -> CompileResult<()> {
    let (def, values) = match (projection.ty(), projection.kind()) {
      (Type::Struct(def), ExprKind::Construct { args, .. }) if args.len() == def.fields.len() => {
        (def.clone(), args)
      }

      (_, kind) => {
        return Err(CompileError::UnsupportedExpression(format!(
          "a shader must select a construction of its output struct, not a {}",
          kind.name()
        )))
      }
    };

    for (field, value) in def.fields.iter().zip(values) {
      if !field.name.starts_with("gl_") {
        self.declare_type(&field.ty)?;
        writeln!(self.outputs, "out {};", declarator(&field.ty, &field.name)?)?;
      }

      let text = self.emit(value)?;
      self.write_indent()?;
      writeln!(self.out, "{} = {};", field.name, text)?;
    }

    Ok(())
  }

  /// Write `return value;`.
  pub fn write_return(&mut self, value: &Expr) -> CompileResult<()> {
    let text = self.emit(value)?;

    self.write_indent()?;
    writeln!(self.out, "return {};", text)?;
    Ok(())
  }

  /// Close `main`, then splice the late struct declarations, the outputs and the referenced functions right before it.
  pub fn finish_shader(mut self) -> CompileResult<CompiledShader> {
    self.out.push_str("}\n");

    let records = self.functions.resolve(self.referenced.iter())?;
    for record in &records {
      for def in &record.struct_types {
        self.declare_type(&Type::Struct(def.clone()))?;
      }
    }

    let mut splice = mem::take(&mut self.late_structs);
    splice.push_str(&self.outputs);

    for record in &records {
      splice.push('\n');
      splice.push_str(&record.code);
    }

    self.out.insert_str(self.entry_offset, &splice);

    Ok(CompiledShader {
      source: self.out,
      inputs: self.inputs,
      uniforms: self.uniforms,
    })
  }

  /// Write the signature of a user function and open its body.
  pub fn begin_function(&mut self, def: &FunctionDef) -> CompileResult<()> {
    self.entry_opened = true;
    self.defining = Some((def.decl.clone(), def.name.clone()));

    self.declare_type(&def.ret)?;
    let ret = type_name(&def.ret)?;

    let mut params = Vec::with_capacity(def.params.len());
    for param in &def.params {
      self.declare_type(&param.ty)?;
      params.push(declarator(&param.ty, &param.name)?);
    }

    writeln!(self.out, "{} {}({}) {{", ret, def.name, params.join(", "))?;
    self.indent = 1;

    Ok(())
  }

  /// Close the body of a user function and turn it into a [`FunctionRecord`].
  pub fn finish_function(mut self, def: &FunctionDef) -> CompileResult<FunctionRecord> {
    self.out.push_str("}\n");

    if self.referenced.contains(&def.decl) {
      return Err(CompileError::CyclicFunctionDependency(format!(
        "{} -> {}",
        def.decl, def.decl
      )));
    }

    Ok(FunctionRecord {
      identity: def.decl.clone(),
      name: def.name.clone(),
      code: self.out,
      dependencies: self.referenced,
      struct_types: self.struct_types,
    })
  }

  /// Emit an expression.
  pub fn emit(&mut self, e: &Expr) -> CompileResult<String> {
    match e.kind() {
      ExprKind::Binary { op, lhs, rhs, decl } => self.emit_binary(*op, lhs, rhs, decl.as_ref()),

      ExprKind::Unary { op, operand, decl } => self.emit_unary(*op, operand, decl.as_ref()),

      ExprKind::Call {
        decl,
        is_static,
        target,
        args,
      } => self.emit_call(decl, *is_static, target.as_ref(), args),

      ExprKind::Member {
        target,
        member,
        decl,
      } => self.emit_member(target, member, decl.as_ref()),

      ExprKind::Construct { decl, args } => self.emit_construct(e.ty(), decl, args),

      ExprKind::Constant(lit) => write_literal(lit, &self.target.float_suffix),

      ExprKind::Conditional {
        test,
        then,
        otherwise,
      } => {
        let test = self.emit(test)?;
        let then = self.emit(then)?;
        let otherwise = self.emit(otherwise)?;
        Ok(format!("({} ? {} : {})", test, then, otherwise))
      }

      ExprKind::Parameter(name) => Ok(self.lookup(name)),

      ExprKind::Lambda { .. } => Err(CompileError::UnsupportedExpression(
        "lambda outside of a fold".to_owned(),
      )),
    }
  }

  fn emit_args(&mut self, args: &[Expr]) -> CompileResult<Vec<String>> {
    args.iter().map(|arg| self.emit(arg)).collect()
  }

  fn emit_binary(
    &mut self,
    op: BinOp,
    lhs: &Expr,
    rhs: &Expr,
    decl: Option<&DeclId>,
  ) -> CompileResult<String> {
    let registry = self.registry;
    let l = self.emit(lhs)?;
    let r = self.emit(rhs)?;

    if let Some(decl) = decl {
      if let Some(template) = registry.lookup(decl) {
        return Ok(format!("({})", template.apply(decl, &[l, r])?));
      }
    }

    let booleans = is_bool(lhs.ty()) && is_bool(rhs.ty());
    let symbol = match op {
      BinOp::Rem if !is_integral(lhs.ty()) => return Ok(format!("mod({}, {})", l, r)),
      BinOp::BitAnd if booleans => "&&",
      BinOp::BitOr if booleans => "||",
      BinOp::BitXor if booleans => "^^",
      op => binop_symbol(op),
    };

    Ok(format!("({} {} {})", l, symbol, r))
  }

  fn emit_unary(&mut self, op: UnOp, operand: &Expr, decl: Option<&DeclId>) -> CompileResult<String> {
    let registry = self.registry;
    let x = self.emit(operand)?;

    if let Some(decl) = decl {
      if let Some(template) = registry.lookup(decl) {
        return template.apply(decl, &[x]);
      }
    }

    let text = match op {
      // avoid writing `--`
      UnOp::Neg if x.starts_with('-') => format!("-({})", x),
      UnOp::Neg => format!("-{}", x),

      UnOp::Not => match operand.ty().as_prim() {
        Some(PrimType::Bool(Dim::Scalar)) => format!("!{}", x),
        Some(PrimType::Bool(_)) => format!("not({})", x),
        Some(PrimType::Int(_)) | Some(PrimType::UInt(_)) => format!("~{}", x),
        _ => format!("!{}", x),
      },
    };

    Ok(text)
  }

  fn emit_call(
    &mut self,
    decl: &DeclId,
    is_static: bool,
    target: Option<&Expr>,
    args: &[Expr],
  ) -> CompileResult<String> {
    let registry = self.registry;

    if let Some(template) = registry.lookup(decl) {
      let mut texts = Vec::with_capacity(args.len() + 1);

      if let (false, Some(target)) = (is_static, target) {
        texts.push(self.emit(target)?);
      }

      texts.extend(self.emit_args(args)?);
      return template.apply(decl, &texts);
    }

    let own_name = match &self.defining {
      Some((defining, name)) if defining == decl => Some(name.clone()),
      _ => None,
    };
    let functions = self.functions;
    let user_fun = own_name.or_else(|| functions.get(decl).map(|record| record.name.clone()));

    if let Some(name) = user_fun {
      self.referenced.insert(decl.clone());
      let texts = self.emit_args(args)?;
      return Ok(format!("{}({})", name, texts.join(", ")));
    }

    if decl::is(decl, decl::AGGREGATE) {
      return self.fold(target, args);
    }

    Err(CompileError::unsupported_decl(
      decl,
      "no template, user function or fold for this call",
    ))
  }

  fn emit_member(
    &mut self,
    target: &Expr,
    member: &str,
    decl: Option<&DeclId>,
  ) -> CompileResult<String> {
    let registry = self.registry;

    if let Some(decl) = decl {
      if let Some(template) = registry.lookup(decl) {
        let text = self.emit(target)?;
        return template.apply(decl, &[text]);
      }
    }

    // fields of flattened declaration sources are globals
    if let ExprKind::Parameter(name) = target.kind() {
      if self.sources.contains(name) && !self.is_scoped(name) {
        return Ok(member.to_owned());
      }
    }

    let text = self.emit(target)?;
    self.declare_type(target.ty())?;
    Ok(format!("{}.{}", text, member))
  }

  fn emit_construct(&mut self, ty: &Type, decl: &DeclId, args: &[Expr]) -> CompileResult<String> {
    let registry = self.registry;
    let texts = self.emit_args(args)?;

    if let Some(template) = registry.lookup(decl) {
      return template.apply(decl, &texts);
    }

    match ty {
      Type::Struct(def) if *decl == stdlib::struct_ctor(&def.name) => {
        self.declare_type(ty)?;
        Ok(format!("{}({})", def.name, texts.join(", ")))
      }

      Type::Array(item, len) if decl::is(decl, stdlib::ARRAY) => {
        let sized = Type::array((**item).clone(), len.unwrap_or(texts.len()));
        Ok(format!("{}({})", type_name(&sized)?, texts.join(", ")))
      }

      _ => Err(CompileError::unsupported_decl(
        decl,
        "constructor without template",
      )),
    }
  }

  /// Desugar a fold into a counted loop and return the name of its accumulator.
  fn fold(&mut self, source: Option<&Expr>, args: &[Expr]) -> CompileResult<String> {
    let source = source.ok_or_else(|| CompileError::malformed("a fold needs a source sequence"))?;

    let (seed, params, body) = match args {
      [seed, lambda] => match lambda.kind() {
        ExprKind::Lambda { params, body } if params.len() == 2 => (seed, params, body),
        _ => {
          return Err(CompileError::UnsupportedExpression(
            "a fold combines items with a lambda of two parameters".to_owned(),
          ))
        }
      },

      _ => {
        return Err(CompileError::UnsupportedExpression(
          "a fold takes a seed and a combining lambda".to_owned(),
        ))
      }
    };

    let clauses = query::clauses(source)?;

    let acc = self.local("acc");
    let seed_text = self.emit(seed)?;
    self.declare_type(seed.ty())?;
    let acc_declarator = declarator(seed.ty(), &acc)?;
    self.write_indent()?;
    writeln!(self.out, "{} = {};", acc_declarator, seed_text)?;

    let indent = self.indent;
    let sources = self.sources.clone();
    let mut source = Source::new(&clauses);
    let mut item = None;

    {
      let select = |clause: &Clause, emitter: &mut Emitter| match *clause {
        Clause::Select { projection } => {
          item = Some(emitter.emit(projection)?);
          Ok(true)
        }

        Clause::From { name, .. } => Err(CompileError::malformed(format!(
          "a fold source iterates once; unexpected from clause binding `{}`",
          name
        ))),

        Clause::Let { .. } => Ok(false),
      };

      let mut grammar = exactly_one(for_clause)
        .if_fail(|| CompileError::malformed("a fold source must start with exactly one for clause"))
        .then(zero_or_more(let_clause))
        .then(exactly_one(select).if_fail(|| CompileError::MissingReturnClause));

      grammar.parse(&mut source, self)?;
    }

    if let Some(clause) = source.current() {
      return Err(CompileError::malformed(format!(
        "unexpected {} clause after the select of a fold source",
        clause.keyword()
      )));
    }

    let item = item.ok_or(CompileError::MissingReturnClause)?;

    let mut scope = HashMap::new();
    scope.insert(params[0].name.clone(), acc.clone());
    scope.insert(params[1].name.clone(), item);

    self.scopes.push(scope);
    let body = self.emit(body);
    self.scopes.pop();
    let body = body?;

    self.write_indent()?;
    writeln!(self.out, "{} = {};", acc, body)?;

    self.indent = indent;
    self.sources = sources;
    self.write_indent()?;
    self.out.push_str("}\n");

    Ok(acc)
  }

  /// Declare a struct type, and the struct types of its fields first, unless already declared.
  fn declare_type(&mut self, ty: &Type) -> CompileResult<()> {
    let def = match ty {
      Type::Prim(_) => return Ok(()),
      Type::Array(item, _) => return self.declare_type(item),
      Type::Struct(def) => def,
    };

    if self.declared_structs.contains(&def.name) {
      return Ok(());
    }

    for field in &def.fields {
      self.declare_type(&field.ty)?;
    }

    let mut block = String::new();
    writeln!(block, "struct {} {{", def.name)?;
    for field in &def.fields {
      writeln!(
        block,
        "{:width$}{};",
        "",
        declarator(&field.ty, &field.name)?,
        width = self.target.indent
      )?;
    }
    block.push_str("};\n");

    log::trace!("declared struct {}", def.name);

    self.declared_structs.insert(def.name.clone());
    self.struct_types.push(def.clone());

    if self.entry_opened {
      self.late_structs.push_str(&block);
    } else {
      self.out.push_str(&block);
    }

    Ok(())
  }

  /// Generate a fresh local name.
  fn local(&mut self, base: &str) -> String {
    let name = format!("{}_{}", base, self.next_local);
    self.next_local += 1;
    name
  }

  fn is_scoped(&self, name: &str) -> bool {
    self.scopes.iter().any(|scope| scope.contains_key(name))
  }

  fn lookup(&self, name: &str) -> String {
    self
      .scopes
      .iter()
      .rev()
      .find_map(|scope| scope.get(name))
      .cloned()
      .unwrap_or_else(|| name.to_owned())
  }

  fn write_indent(&mut self) -> Result<(), fmt::Error> {
    write!(
      self.out,
      "{indent:<width$}",
      indent = "",
      width = self.target.indent * self.indent
    )
  }
}

/// Open the loop of a fold.
fn for_clause(clause: &Clause, emitter: &mut Emitter) -> CompileResult<bool> {
  let (name, source) = match *clause {
    Clause::From { name, source } => (name, source),
    _ => return Ok(false),
  };

  let array = match source.kind() {
    ExprKind::Call {
      decl,
      target: Some(array),
      ..
    } if decl::is(decl, decl::EACH) => array,

    _ => {
      return Err(CompileError::malformed(format!(
        "`{}` must iterate over an array in a fold source",
        name
      )))
    }
  };

  let array_text = emitter.emit(array)?;
  let (item_ty, len) = array.ty().as_array().ok_or_else(|| {
    CompileError::UnsupportedExpression(format!("cannot iterate over {}", array_text))
  })?;
  let len = len.ok_or_else(|| CompileError::MissingArrayLengthAnnotation(array_text.clone()))?;

  log::trace!("fold over {} ({} items)", array_text, len);

  let idx = emitter.local("idx");
  emitter.write_indent()?;
  writeln!(emitter.out, "for (int {0} = 0; {0} < {1}; {0}++) {{", idx, len)?;
  emitter.indent += 1;
  emitter.sources.remove(name);

  emitter.declare_type(item_ty)?;
  let declarator = declarator(item_ty, name)?;
  emitter.write_indent()?;
  writeln!(emitter.out, "{} = {}[{}];", declarator, array_text, idx)?;

  Ok(true)
}

/// Write a `let` clause; `from` clauses are not allowed past the first clauses.
pub(crate) fn let_clause(clause: &Clause, emitter: &mut Emitter) -> CompileResult<bool> {
  match *clause {
    Clause::Let { name, value } => {
      log::trace!("let {}", name);
      emitter.write_let(name, value)?;
      Ok(true)
    }

    Clause::From { name, .. } => Err(CompileError::malformed(format!(
      "unexpected from clause binding `{}`",
      name
    ))),

    Clause::Select { .. } => Ok(false),
  }
}

fn is_bool(ty: &Type) -> bool {
  matches!(ty.as_prim(), Some(PrimType::Bool(_)))
}

fn is_integral(ty: &Type) -> bool {
  matches!(ty.as_prim(), Some(PrimType::Int(_)) | Some(PrimType::UInt(_)))
}

fn binop_symbol(op: BinOp) -> &'static str {
  match op {
    BinOp::Add => "+",
    BinOp::Sub => "-",
    BinOp::Mul => "*",
    BinOp::Div => "/",
    BinOp::Rem => "%",
    BinOp::And => "&&",
    BinOp::Or => "||",
    BinOp::Xor => "^^",
    BinOp::BitAnd => "&",
    BinOp::BitOr => "|",
    BinOp::BitXor => "^",
    BinOp::Shl => "<<",
    BinOp::Shr => ">>",
    BinOp::Eq => "==",
    BinOp::Neq => "!=",
    BinOp::Lt => "<",
    BinOp::Lte => "<=",
    BinOp::Gt => ">",
    BinOp::Gte => ">=",
  }
}

fn write_literal(lit: &Literal, float_suffix: &str) -> CompileResult<String> {
  match *lit {
    Literal::Int(x) => Ok(x.to_string()),
    Literal::UInt(x) => Ok(format!("{}u", x)),
    Literal::Float(x) => write_f32(x, float_suffix),
    Literal::Bool(x) => Ok(x.to_string()),
  }
}

fn write_f32(x: f32, suffix: &str) -> CompileResult<String> {
  if !x.is_finite() {
    return Err(CompileError::UnsupportedExpression(format!(
      "non-finite float literal {}",
      x
    )));
  }

  // the debug representation is the shortest that round-trips and always has a dot or an exponent
  Ok(format!("{:?}{}", x, suffix))
}

fn write_prim_type(f: &mut impl fmt::Write, prim_ty: &PrimType) -> Result<(), fmt::Error> {
  let ty_str = match prim_ty {
    // ints
    PrimType::Int(Dim::Scalar) => "int",
    PrimType::Int(Dim::D2) => "ivec2",
    PrimType::Int(Dim::D3) => "ivec3",
    PrimType::Int(Dim::D4) => "ivec4",

    // uints
    PrimType::UInt(Dim::Scalar) => "uint",
    PrimType::UInt(Dim::D2) => "uvec2",
    PrimType::UInt(Dim::D3) => "uvec3",
    PrimType::UInt(Dim::D4) => "uvec4",

    // floats
    PrimType::Float(Dim::Scalar) => "float",
    PrimType::Float(Dim::D2) => "vec2",
    PrimType::Float(Dim::D3) => "vec3",
    PrimType::Float(Dim::D4) => "vec4",

    // booleans
    PrimType::Bool(Dim::Scalar) => "bool",
    PrimType::Bool(Dim::D2) => "bvec2",
    PrimType::Bool(Dim::D3) => "bvec3",
    PrimType::Bool(Dim::D4) => "bvec4",

    // matrices
    PrimType::Matrix(MatrixDim::D22) => "mat2",
    PrimType::Matrix(MatrixDim::D23) => "mat2x3",
    PrimType::Matrix(MatrixDim::D24) => "mat2x4",
    PrimType::Matrix(MatrixDim::D32) => "mat3x2",
    PrimType::Matrix(MatrixDim::D33) => "mat3",
    PrimType::Matrix(MatrixDim::D34) => "mat3x4",
    PrimType::Matrix(MatrixDim::D42) => "mat4x2",
    PrimType::Matrix(MatrixDim::D43) => "mat4x3",
    PrimType::Matrix(MatrixDim::D44) => "mat4",

    // samplers
    PrimType::Sampler(SamplerDim::D2) => "sampler2D",
    PrimType::Sampler(SamplerDim::D3) => "sampler3D",
    PrimType::Sampler(SamplerDim::Cube) => "samplerCube",
  };

  f.write_str(ty_str)
}

/// Name of a type, with array notation; `[[f32; 2]; 3]` is `float[3][2]`.
fn type_name(ty: &Type) -> CompileResult<String> {
  let mut name = String::new();

  match ty.leaf() {
    Type::Prim(prim) => write_prim_type(&mut name, prim)?,
    Type::Struct(def) => name.push_str(&def.name),
    Type::Array(..) => unreachable!("leaf types are never arrays"),
  }

  for dim in ty.array_dims() {
    match dim {
      Some(len) => write!(name, "[{}]", len)?,
      None => return Err(CompileError::MissingArrayLengthAnnotation(name)),
    }
  }

  Ok(name)
}

/// Declarator of a variable; `[f32; 4]` named `w` is `float w[4]`.
fn declarator(ty: &Type, name: &str) -> CompileResult<String> {
  let mut decl = type_name(ty.leaf())?;
  write!(decl, " {}", name)?;

  for dim in ty.array_dims() {
    match dim {
      Some(len) => write!(decl, "[{}]", len)?,
      None => return Err(CompileError::MissingArrayLengthAnnotation(name.to_owned())),
    }
  }

  Ok(decl)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    expr::Param,
    query::{self, Query},
    stdlib::{Common, Geometry},
    types::{FieldDef, ToType, V3},
  };

  struct Env {
    registry: SyntaxRegistry,
    functions: FunctionCache,
    fields: FieldCache,
    target: Target,
  }

  impl Env {
    fn new() -> Self {
      Env {
        registry: SyntaxRegistry::glsl(),
        functions: FunctionCache::new(),
        fields: FieldCache::new(),
        target: Target::glsl330(),
      }
    }

    fn emitter(&self) -> Emitter<'_> {
      Emitter::new(&self.registry, &self.functions, &self.fields, &self.target)
    }
  }

  #[test]
  fn float_literals() {
    assert_eq!(write_f32(1., "").unwrap(), "1.0");
    assert_eq!(write_f32(0.5, "f").unwrap(), "0.5f");
    assert_eq!(write_f32(-2., "").unwrap(), "-2.0");
    assert!(matches!(
      write_f32(f32::NAN, ""),
      Err(CompileError::UnsupportedExpression(_))
    ));
  }

  #[test]
  fn other_literals() {
    assert_eq!(write_literal(&Literal::UInt(3), "f").unwrap(), "3u");
    assert_eq!(write_literal(&Literal::Int(-3), "f").unwrap(), "-3");
    assert_eq!(write_literal(&Literal::Bool(true), "f").unwrap(), "true");
  }

  #[test]
  fn declarators() {
    let ty = <[[f32; 2]; 3]>::ty();

    assert_eq!(type_name(&ty).unwrap(), "float[3][2]");
    assert_eq!(declarator(&ty, "w").unwrap(), "float w[3][2]");
    assert!(matches!(
      declarator(&<Vec<f32>>::ty(), "w"),
      Err(CompileError::MissingArrayLengthAnnotation(name)) if name == "w"
    ));
  }

  #[test]
  fn operators() {
    let env = Env::new();
    let mut emitter = env.emitter();
    let a = Expr::param("a", Type::float());
    let b = Expr::param("b", Type::float());
    let i = Expr::param("i", Type::int());
    let t = Expr::param("t", Type::bool());

    assert_eq!(emitter.emit(&(&a + &b * 2.)).unwrap(), "(a + (b * 2.0))");
    assert_eq!(emitter.emit(&(&a % &b)).unwrap(), "mod(a, b)");
    assert_eq!(emitter.emit(&(&i % 2)).unwrap(), "(i % 2)");
    assert_eq!(emitter.emit(&(&t & a.lt(&b))).unwrap(), "(t && (a < b))");
    assert_eq!(emitter.emit(&-(-&a)).unwrap(), "-(-a)");
    assert_eq!(emitter.emit(&!&t).unwrap(), "!t");
    assert_eq!(
      emitter.emit(&Expr::cond(&t, &a, 1.)).unwrap(),
      "(t ? a : 1.0)"
    );
  }

  #[test]
  fn templates_for_operators_calls_and_members() {
    let mut env = Env::new();
    env.registry.register("complex::mul", "cmul({0}, {1})");

    let mut emitter = env.emitter();
    let v = Expr::param("v", <V3<f32>>::ty());
    let w = Expr::param("w", <V3<f32>>::ty());

    let mul = Expr::binary_decl(BinOp::Mul, &v, &w, DeclId::new("complex::mul"));
    assert_eq!(emitter.emit(&mul).unwrap(), "(cmul(v, w))");
    assert_eq!(emitter.emit(&v.dot(&w)).unwrap(), "dot(v, w)");
    assert_eq!(
      emitter.emit(&v.clamp(0., 1.)).unwrap(),
      "clamp(v, 0.0, 1.0)"
    );
    assert_eq!(
      emitter.emit(&stdlib::swizzle(&v, "zy")).unwrap(),
      "v.zy"
    );
    assert_eq!(emitter.emit(&v.at(1)).unwrap(), "v[1]");
  }

  #[test]
  fn unknown_call() {
    let env = Env::new();
    let e = Expr::call("nowhere", Type::float(), vec![Expr::from(1.)]);

    match env.emitter().emit_standalone(&e) {
      Err(CompileError::UnsupportedDeclaration { decl, .. }) => assert_eq!(decl.as_str(), "nowhere"),
      r => panic!("unexpected {:?}", r),
    }
  }

  #[test]
  fn constructor_without_template() {
    let env = Env::new();
    let e = Expr::construct("quat::new", <V3<f32>>::ty(), Vec::new());

    assert!(matches!(
      env.emitter().emit_standalone(&e),
      Err(CompileError::UnsupportedDeclaration { .. })
    ));
  }

  #[test]
  fn lambda_outside_of_fold() {
    let env = Env::new();
    let e = Expr::lambda(vec![Param::new("x", Type::float())], 1.);

    assert!(matches!(
      env.emitter().emit_standalone(&e),
      Err(CompileError::UnsupportedExpression(_))
    ));
  }

  #[test]
  fn struct_members_and_constructors() {
    let env = Env::new();
    let mut emitter = env.emitter();
    let light = Type::structure(StructDef::new(
      "Light",
      vec![FieldDef::new("power", Type::float())],
    ));
    let l = Expr::param("l", light.clone());

    assert_eq!(emitter.emit(&l.field("power")).unwrap(), "l.power");
    assert_eq!(emitter.output(), "struct Light {\n  float power;\n};\n");

    let built = query::project(light, vec![Expr::from(2.)]);
    assert_eq!(emitter.emit(&built).unwrap(), "Light(2.0)");
    assert_eq!(emitter.emit(&built.field("power")).unwrap(), "Light(2.0).power");
    assert_eq!(emitter.output(), "struct Light {\n  float power;\n};\n");
  }

  #[test]
  fn source_fields_are_globals() {
    let env = Env::new();
    let mut emitter = env.emitter();
    let light = Type::structure(StructDef::new(
      "Light",
      vec![FieldDef::new("power", Type::float())],
    ));

    assert!(emitter.declare_source("v", &query::inputs_of(light.clone())).unwrap());
    assert_eq!(emitter.output(), "in float power;\n");

    let v = Expr::param("v", light.clone());
    assert_eq!(emitter.emit(&v.field("power")).unwrap(), "power");

    // a let binding shadows the source
    emitter.open_entry().unwrap();
    emitter.write_let("v", &query::project(light, vec![Expr::from(1.)])).unwrap();
    assert_eq!(emitter.emit(&v.field("power")).unwrap(), "v.power");
  }

  #[test]
  fn nested_array_constructor() {
    let env = Env::new();
    let ty = <[[f32; 2]; 3]>::ty();
    let rows = (0..3)
      .map(|i| {
        let row = vec![Expr::from(i as f32), Expr::from(1.)];
        Expr::construct(stdlib::ARRAY, <[f32; 2]>::ty(), row)
      })
      .collect();
    let e = Expr::construct(stdlib::ARRAY, ty, rows);

    assert_eq!(
      env.emitter().emit_standalone(&e).unwrap(),
      "float[3][2](float[2](0.0, 1.0), float[2](1.0, 1.0), float[2](2.0, 1.0))"
    );
  }

  #[test]
  fn fold_parameters_do_not_capture_outer_names() {
    let env = Env::new();
    let mut emitter = env.emitter();
    emitter.indent = 1;

    let weights = Expr::param("weights", <[f32; 2]>::ty());
    let q = Query::new().from("w", weights.each());
    let w = q.var("w");
    let outer_item = Expr::param("item", Type::float());
    let outer_acc = Expr::param("acc", Type::float());
    let sum = query::aggregate(q.select(w), outer_acc, |acc, x| acc + x * outer_item);

    assert_eq!(emitter.emit(&sum).unwrap(), "acc_0");
    assert_eq!(
      emitter.output(),
      "  float acc_0 = acc;
  for (int idx_1 = 0; idx_1 < 2; idx_1++) {
    float w = weights[idx_1];
    acc_0 = (acc_0 + (w * item));
  }
"
    );
  }

  #[test]
  fn fold_into_loop() {
    let env = Env::new();
    let mut emitter = env.emitter();
    emitter.indent = 1;

    let weights = Expr::param("weights", <[f32; 4]>::ty());
    let q = Query::new().from("w", weights.each());
    let w = q.var("w");
    let source = q.bind("sq", &w * &w).select(Expr::param("sq", Type::float()));
    let sum = query::aggregate(source, 0., |acc, item| acc + item);

    assert_eq!(emitter.emit(&sum).unwrap(), "acc_0");
    assert_eq!(
      emitter.output(),
      "  float acc_0 = 0.0;
  for (int idx_1 = 0; idx_1 < 4; idx_1++) {
    float w = weights[idx_1];
    float sq = (w * w);
    acc_0 = (acc_0 + sq);
  }
"
    );
  }

  #[test]
  fn fold_needs_array_length() {
    let env = Env::new();
    let weights = Expr::param("weights", <Vec<f32>>::ty());
    let q = Query::new().from("w", weights.each());
    let w = q.var("w");
    let sum = query::aggregate(q.select(w), 0., |acc, item| acc + item);

    match env.emitter().emit(&sum) {
      Err(CompileError::MissingArrayLengthAnnotation(name)) => assert_eq!(name, "weights"),
      r => panic!("unexpected {:?}", r),
    }
  }

  #[test]
  fn fold_iterates_once() {
    let env = Env::new();
    let a = Expr::param("a", <[f32; 2]>::ty());
    let b = Expr::param("b", <[f32; 2]>::ty());
    let q = Query::new().from("x", a.each()).from("y", b.each());
    let x = q.var("x");
    let sum = query::aggregate(q.select(x), 0., |acc, item| acc + item);

    assert!(matches!(
      env.emitter().emit(&sum),
      Err(CompileError::MalformedClauseSequence(_))
    ));
  }

  #[test]
  fn fold_without_select() {
    let env = Env::new();
    let a = Expr::param("a", <[f32; 2]>::ty());
    let q = Query::new().from("x", a.each());
    let x = q.var("x");
    let source = q.bind("y", x).select(1.);
    // a source without select: drop the last stage
    let source = match source.kind() {
      ExprKind::Call {
        target: Some(target),
        ..
      } => target.clone(),
      _ => unreachable!(),
    };
    let sum = query::aggregate(source, 0., |acc, item| acc + item);

    assert!(matches!(
      env.emitter().emit(&sum),
      Err(CompileError::MissingReturnClause)
    ));
  }

  #[test]
  fn standalone_fold_is_rejected() {
    let env = Env::new();
    let a = Expr::param("a", <[f32; 2]>::ty());
    let q = Query::new().from("x", a.each());
    let x = q.var("x");
    let sum = query::aggregate(q.select(x), 0., |acc, item| acc + item);

    assert!(matches!(
      env.emitter().emit_standalone(&sum),
      Err(CompileError::UnsupportedExpression(_))
    ));
  }
}
