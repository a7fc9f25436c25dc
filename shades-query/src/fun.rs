//! User-defined functions.
//!
//! Functions are compiled once, with [`Compiler::define_function`](crate::compiler::Compiler::define_function), into a
//! [`FunctionRecord`] stored in a [`FunctionCache`]. Shaders calling them only reference their identity; the calls are
//! resolved when the shader is finished, so that every function is written once, after all of its dependencies.

use crate::{
  decl::DeclId,
  error::{CompileError, CompileResult},
  expr::{Expr, Param},
  types::{StructDef, Type},
};
use indexmap::{IndexMap, IndexSet};
use std::sync::{Arc, PoisonError, RwLock};

/// Definition of a user function.
///
/// The body is either a plain expression, returned as-is, or a chain of `let` clauses ending with a `select`, built
/// with [`Query`](crate::query::Query).
#[derive(Clone, Debug)]
pub struct FunctionDef {
  pub decl: DeclId,
  pub name: String,
  pub params: Vec<Param>,
  pub ret: Type,
  pub body: Expr,
}

impl FunctionDef {
  /// Define a function returning the type of its body.
  pub fn new(
    decl: impl Into<DeclId>,
    name: impl Into<String>,
    params: Vec<Param>,
    body: impl Into<Expr>,
  ) -> Self {
    let body = body.into();

    Self {
      decl: decl.into(),
      name: name.into(),
      params,
      ret: body.ty().clone(),
      body,
    }
  }

  /// Call the function.
  pub fn call(&self, args: Vec<Expr>) -> Expr {
    Expr::call(self.decl.clone(), self.ret.clone(), args)
  }
}

/// A compiled user function.
#[derive(Clone, Debug)]
pub struct FunctionRecord {
  pub identity: DeclId,
  pub name: String,

  /// Complete definition, signature included.
  pub code: String,

  /// User functions called by this one, in discovery order.
  pub dependencies: IndexSet<DeclId>,

  /// Struct types the function needs declared, dependencies first.
  pub struct_types: Vec<Arc<StructDef>>,
}

impl FunctionRecord {
  pub fn new(
    identity: impl Into<DeclId>,
    name: impl Into<String>,
    code: impl Into<String>,
    dependencies: impl IntoIterator<Item = DeclId>,
  ) -> Self {
    Self {
      identity: identity.into(),
      name: name.into(),
      code: code.into(),
      dependencies: dependencies.into_iter().collect(),
      struct_types: Vec::new(),
    }
  }
}

/// Compiled functions, shared between compilations.
///
/// Records are published whole under the write lock and never removed nor replaced: the first record inserted for an
/// identity is the one every compilation sees.
#[derive(Debug, Default)]
pub struct FunctionCache {
  records: RwLock<IndexMap<DeclId, Arc<FunctionRecord>>>,
}

impl FunctionCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, identity: &DeclId) -> Option<Arc<FunctionRecord>> {
    self
      .records
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(identity)
      .cloned()
  }

  pub fn contains(&self, identity: &DeclId) -> bool {
    self
      .records
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .contains_key(identity)
  }

  /// Insert a record, unless one already exists for its identity.
  ///
  /// Returns the record stored in the cache, which is the already existing one if any.
  pub fn insert(&self, record: FunctionRecord) -> Arc<FunctionRecord> {
    let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);

    records
      .entry(record.identity.clone())
      .or_insert_with(|| Arc::new(record))
      .clone()
  }

  pub fn len(&self) -> usize {
    self.records.read().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Order `referenced` and their transitive dependencies so that every function comes after the ones it calls.
  ///
  /// Each function appears once. Functions are otherwise ordered as a depth-first traversal discovers them.
  pub fn resolve<'a>(
    &self,
    referenced: impl IntoIterator<Item = &'a DeclId>,
  ) -> CompileResult<Vec<Arc<FunctionRecord>>> {
    let mut resolution = Resolution {
      cache: self,
      output: IndexSet::new(),
      in_progress: IndexSet::new(),
      ordered: Vec::new(),
    };

    for identity in referenced {
      resolution.visit(identity)?;
    }

    Ok(resolution.ordered)
  }
}

struct Resolution<'a> {
  cache: &'a FunctionCache,
  output: IndexSet<DeclId>,
  in_progress: IndexSet<DeclId>,
  ordered: Vec<Arc<FunctionRecord>>,
}

impl Resolution<'_> {
  fn visit(&mut self, identity: &DeclId) -> CompileResult<()> {
    if self.output.contains(identity) {
      return Ok(());
    }

    if let Some(start) = self.in_progress.get_index_of(identity) {
      let cycle = self
        .in_progress
        .iter()
        .skip(start)
        .chain(Some(identity))
        .map(DeclId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ");

      return Err(CompileError::CyclicFunctionDependency(cycle));
    }

    let record = self
      .cache
      .get(identity)
      .ok_or_else(|| CompileError::UnknownFunction(identity.clone()))?;

    self.in_progress.insert(identity.clone());

    for dep in &record.dependencies {
      self.visit(dep)?;
    }

    self.in_progress.pop();
    self.output.insert(identity.clone());

    log::trace!("resolved function {}", record.name);
    self.ordered.push(record);

    Ok(())
  }
}
