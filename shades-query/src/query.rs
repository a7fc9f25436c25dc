//! Query front-end.
//!
//! Shaders are described as queries: one or more `from` clauses binding the declaration sources (inputs, uniforms,
//! constants), `let` clauses binding intermediate values and a final `select` projecting the outputs.
//!
//! ```
//! use shades_query::{query::{self, Query}, types::{FieldDef, StructDef, Type, ToType, V3}};
//!
//! let vertex = Type::structure(StructDef::new("Vertex", vec![
//!   FieldDef::new("a", <V3<f32>>::ty()),
//!   FieldDef::new("b", <V3<f32>>::ty()),
//! ]));
//! let output = Type::structure(StructDef::new("Output", vec![FieldDef::new("result", <V3<f32>>::ty())]));
//!
//! let q = Query::new().from("v", query::inputs_of(vertex));
//! let v = q.var("v");
//! let q = q.bind("x", v.field("a") + v.field("b"));
//! let x = q.var("x");
//! let shader = q.select(query::project(output, vec![x]));
//! ```
//!
//! Each clause is a [`Call`](ExprKind::Call) wrapping the previous one as its target, so a query is an ordinary
//! [`Expr`]. The compiler recovers the clause sequence with [`clauses`].
//!
//! The same clauses describe the source sequence of a fold, the first `from` iterating an array with
//! [`Expr::each`]; see [`aggregate`].

use crate::{
  decl::{self, DeclId},
  error::{CompileError, CompileResult},
  expr::{Expr, ExprKind, Param},
  reflect::{ToValue, Value},
  stdlib,
  types::{ToType, Type},
};
use std::sync::atomic::{AtomicUsize, Ordering};

// numbers the parameters of fold lambdas; `#` keeps them apart from query variables
static NEXT_FOLD: AtomicUsize = AtomicUsize::new(0);

/// A recognized clause.
#[derive(Clone, Copy, Debug)]
pub enum Clause<'a> {
  /// `from name in source`.
  From { name: &'a str, source: &'a Expr },

  /// `let name = value`.
  Let { name: &'a str, value: &'a Expr },

  /// `select projection`.
  Select { projection: &'a Expr },
}

impl Clause<'_> {
  /// Keyword of the clause, for diagnostics.
  pub fn keyword(&self) -> &'static str {
    match self {
      Clause::From { .. } => "from",
      Clause::Let { .. } => "let",
      Clause::Select { .. } => "select",
    }
  }
}

fn is_clause_decl(decl: &DeclId) -> bool {
  decl::is(decl, decl::FROM) || decl::is(decl, decl::LET) || decl::is(decl, decl::SELECT)
}

/// Whether `e` is the last stage of a clause chain.
pub fn is_clause(e: &Expr) -> bool {
  matches!(e.kind(), ExprKind::Call { decl, .. } if is_clause_decl(decl))
}

/// Flatten the clause chain ending with `e`, first clause first.
///
/// An expression that is not a clause yields no clause at all.
pub fn clauses(e: &Expr) -> CompileResult<Vec<Clause<'_>>> {
  let mut clauses = Vec::new();

  if is_clause(e) {
    flatten(e, &mut clauses)?;
  }

  Ok(clauses)
}

fn flatten<'a>(e: &'a Expr, clauses: &mut Vec<Clause<'a>>) -> CompileResult<()> {
  let (decl, target, args) = match e.kind() {
    ExprKind::Call {
      decl, target, args, ..
    } if is_clause_decl(decl) => (decl, target, args),

    kind => {
      return Err(CompileError::malformed(format!(
        "a {} cannot start a clause sequence",
        kind.name()
      )))
    }
  };

  if let Some(previous) = target {
    flatten(previous, clauses)?;
  }

  let clause = match args.as_slice() {
    [var, source] if decl::is(decl, decl::FROM) => Clause::From {
      name: var_name(var)?,
      source,
    },

    [var, value] if decl::is(decl, decl::LET) => Clause::Let {
      name: var_name(var)?,
      value,
    },

    [projection] if decl::is(decl, decl::SELECT) => Clause::Select { projection },

    _ => {
      return Err(CompileError::malformed(format!(
        "unexpected arguments for clause {}",
        decl
      )))
    }
  };

  clauses.push(clause);
  Ok(())
}

fn var_name(e: &Expr) -> CompileResult<&str> {
  match e.kind() {
    ExprKind::Parameter(name) => Ok(name),
    kind => Err(CompileError::malformed(format!(
      "clauses bind variables, not a {}",
      kind.name()
    ))),
  }
}

/// Query builder.
///
/// Every method consumes the builder and returns it extended with a new clause; [`Query::select`] ends the query and
/// returns the whole chain.
#[derive(Clone, Debug, Default)]
pub struct Query {
  stage: Option<Expr>,
  vars: Vec<Param>,
}

impl Query {
  pub fn new() -> Self {
    Self::default()
  }

  /// `from name in source`.
  ///
  /// `name` is bound to an item of `source`: the whole declaration source for inputs, uniforms and constants, the
  /// current array item for [`Expr::each`].
  pub fn from(self, name: &str, source: Expr) -> Self {
    let var = Param::new(name, source.ty().clone());
    self.push(decl::FROM, var, source)
  }

  /// `let name = value`.
  pub fn bind(self, name: &str, value: impl Into<Expr>) -> Self {
    let value = value.into();
    let var = Param::new(name, value.ty().clone());
    self.push(decl::LET, var, value)
  }

  /// `select projection`.
  pub fn select(self, projection: impl Into<Expr>) -> Expr {
    let projection = projection.into();
    let ty = projection.ty().clone();
    let args = vec![projection];

    match self.stage {
      Some(stage) => stage.method(decl::SELECT, ty, args),
      None => Expr::call(decl::SELECT, ty, args),
    }
  }

  /// Variable bound by the latest clause named `name`.
  pub fn try_var(&self, name: &str) -> Option<Expr> {
    self
      .vars
      .iter()
      .rev()
      .find(|var| var.name == name)
      .map(Param::expr)
  }

  /// Variable bound by the latest clause named `name`.
  ///
  /// # Panics
  ///
  /// Panics if no clause binds `name`.
  pub fn var(&self, name: &str) -> Expr {
    match self.try_var(name) {
      Some(var) => var,
      None => panic!("unbound query variable {}", name),
    }
  }

  fn push(mut self, clause: &str, var: Param, value: Expr) -> Self {
    let ty = var.ty.clone();
    let args = vec![var.expr(), value];

    let stage = match self.stage.take() {
      Some(stage) => stage.method(clause, ty, args),
      None => Expr::call(clause, ty, args),
    };

    self.stage = Some(stage);
    self.vars.push(var);
    self
  }
}

/// Shader inputs of type `ty`, which must be a struct.
pub fn inputs_of(ty: Type) -> Expr {
  Expr::call(decl::INPUTS, ty, Vec::new())
}

/// Shader inputs of type `T`.
pub fn inputs<T>() -> Expr
where
  T: ToType,
{
  inputs_of(T::ty())
}

/// Uniforms of type `ty`, which must be a struct.
pub fn uniforms_of(ty: Type) -> Expr {
  Expr::call(decl::UNIFORMS, ty, Vec::new())
}

/// Uniforms of type `T`.
pub fn uniforms<T>() -> Expr
where
  T: ToType,
{
  uniforms_of(T::ty())
}

/// Constants of type `ty`, holding `value`.
pub fn constants_of(ty: Type, value: &Value) -> CompileResult<Expr> {
  let value = value.to_expr(&ty)?;
  Ok(Expr::call(decl::CONSTANTS, ty, vec![value]))
}

/// Constants holding `value`.
pub fn constants<T>(value: &T) -> CompileResult<Expr>
where
  T: ToType + ToValue,
{
  constants_of(T::ty(), &value.to_value())
}

/// Build a value of the struct type `ty`, one expression per field.
///
/// Used as the projection of a shader, each field becomes an output.
pub fn project(ty: Type, fields: Vec<Expr>) -> Expr {
  let decl = match ty.as_struct() {
    Some(def) => stdlib::struct_ctor(&def.name),
    None => DeclId::new(stdlib::ARRAY),
  };

  Expr::construct(decl, ty, fields)
}

/// Fold the items selected by `source` into an accumulator, starting from `seed`.
///
/// `source` is a query whose first clause iterates a fixed-size array with [`Expr::each`]. `combine` receives the
/// accumulator and the current item and returns the next accumulator.
///
/// Every fold binds its own accumulator and item, so `combine` can freely refer to query variables and to the
/// accumulator or item of an enclosing fold.
pub fn aggregate(
  source: Expr,
  seed: impl Into<Expr>,
  combine: impl FnOnce(Expr, Expr) -> Expr,
) -> Expr {
  let seed = seed.into();
  let n = NEXT_FOLD.fetch_add(1, Ordering::Relaxed);
  let acc = Param::new(format!("acc#{}", n), seed.ty().clone());
  let item = Param::new(format!("item#{}", n), source.ty().clone());
  let body = combine(acc.expr(), item.expr());
  let ty = seed.ty().clone();
  let lambda = Expr::lambda(vec![acc, item], body);

  source.method(decl::AGGREGATE, ty, vec![seed, lambda])
}
