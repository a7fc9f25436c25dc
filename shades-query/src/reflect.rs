//! Struct and field reflection.
//!
//! Aggregate types are flattened into lists of leaf fields, each named after its dotted path (`u.inner.value`,
//! `lights[2].color`, …). Those lists drive the declaration of inputs and uniforms and tell the uniform-upload code
//! where to read each leaf in a host [`Value`].
//!
//! Flattening is memoized in a [`FieldCache`], meant to be shared between compilations.

use crate::{
  decl::DeclId,
  error::{CompileError, CompileResult},
  expr::{Expr, Literal},
  stdlib,
  types::{Matrix, PrimType, Type, V2, V3, V4},
};
use std::{
  collections::HashMap,
  sync::{Arc, PoisonError, RwLock},
};

/// One step of an [`Accessor`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Step {
  /// Field of a struct, by position.
  Field(usize),

  /// Item of an array.
  Element(usize),
}

/// Path from the root of a value to one of its leaves.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Accessor(Vec<Step>);

impl Accessor {
  pub fn steps(&self) -> &[Step] {
    &self.0
  }

  /// Follow the path in `value`.
  ///
  /// Returns [`None`] if the shape of `value` doesn’t match the reflected type.
  pub fn get<'a>(&self, value: &'a Value) -> Option<&'a Value> {
    self.0.iter().try_fold(value, |value, step| match (step, value) {
      (Step::Field(i), Value::Struct(fields)) => fields.get(*i),
      (Step::Element(i), Value::Array(items)) => items.get(*i),
      _ => None,
    })
  }
}

/// A flattened leaf field.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldPath {
  /// Dotted path of the field.
  pub name: String,

  /// Type of the leaf.
  pub ty: Type,

  pub accessor: Accessor,
}

/// Host-side values, mirroring [`Type`].
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
  Lit(Literal),
  Vector(Vec<Literal>),

  /// Column-major matrix.
  Matrix(Vec<f32>),

  Struct(Vec<Value>),
  Array(Vec<Value>),
}

impl Value {
  /// Lift the value into a constant expression of type `ty`.
  ///
  /// Vectors and matrices use the stock constructors; structs and arrays use the constructor syntax of the target
  /// language.
  pub fn to_expr(&self, ty: &Type) -> CompileResult<Expr> {
    match (self, ty) {
      (Value::Lit(lit), _) => Ok(Expr::lit(*lit)),

      (Value::Vector(lits), Type::Prim(prim)) => {
        let args = lits.iter().copied().map(Expr::lit).collect();
        Ok(Expr::construct(ctor(prim)?, ty.clone(), args))
      }

      (Value::Matrix(cells), Type::Prim(prim)) => {
        let args = cells.iter().copied().map(Expr::from).collect();
        Ok(Expr::construct(ctor(prim)?, ty.clone(), args))
      }

      (Value::Struct(fields), Type::Struct(def)) if fields.len() == def.fields.len() => {
        let args = fields
          .iter()
          .zip(&def.fields)
          .map(|(value, field)| value.to_expr(&field.ty))
          .collect::<CompileResult<_>>()?;
        Ok(Expr::construct(stdlib::struct_ctor(&def.name), ty.clone(), args))
      }

      (Value::Array(items), Type::Array(item_ty, _)) => {
        let args = items
          .iter()
          .map(|value| value.to_expr(item_ty))
          .collect::<CompileResult<_>>()?;
        let ty = Type::array((**item_ty).clone(), items.len());
        Ok(Expr::construct(stdlib::ARRAY, ty, args))
      }

      _ => Err(CompileError::UnsupportedExpression(format!(
        "value {:?} doesn’t have type {:?}",
        self, ty
      ))),
    }
  }
}

fn ctor(prim: &PrimType) -> CompileResult<&'static str> {
  stdlib::constructor(prim).ok_or_else(|| {
    CompileError::unsupported_decl(
      &DeclId::new(format!("{:?}", prim)),
      "no constructor for this primitive type",
    )
  })
}

/// Host values that can be turned into a [`Value`].
///
/// Aggregate types get their implementation from `#[derive(Struct)]`.
pub trait ToValue {
  fn to_value(&self) -> Value;
}

macro_rules! impl_ToValue_scalar {
  ($t:ty, $q:ident) => {
    impl ToValue for $t {
      fn to_value(&self) -> Value {
        Value::Lit(Literal::$q(*self))
      }
    }

    impl ToValue for V2<$t> {
      fn to_value(&self) -> Value {
        Value::Vector(self.0.iter().map(|x| Literal::$q(*x)).collect())
      }
    }

    impl ToValue for V3<$t> {
      fn to_value(&self) -> Value {
        Value::Vector(self.0.iter().map(|x| Literal::$q(*x)).collect())
      }
    }

    impl ToValue for V4<$t> {
      fn to_value(&self) -> Value {
        Value::Vector(self.0.iter().map(|x| Literal::$q(*x)).collect())
      }
    }
  };
}

impl_ToValue_scalar!(i32, Int);
impl_ToValue_scalar!(u32, UInt);
impl_ToValue_scalar!(f32, Float);
impl_ToValue_scalar!(bool, Bool);

impl<const M: usize, const N: usize> ToValue for Matrix<[[f32; N]; M]> {
  fn to_value(&self) -> Value {
    Value::Matrix(self.0.iter().flat_map(|col| col.iter().copied()).collect())
  }
}

impl<T, const N: usize> ToValue for [T; N]
where
  T: ToValue,
{
  fn to_value(&self) -> Value {
    Value::Array(self.iter().map(ToValue::to_value).collect())
  }
}

impl<T> ToValue for Vec<T>
where
  T: ToValue,
{
  fn to_value(&self) -> Value {
    Value::Array(self.iter().map(ToValue::to_value).collect())
  }
}

/// Memoized field lists, keyed by type and prefix.
///
/// The cache can be shared between threads. Computing a missing entry happens while holding the write lock, so a given
/// key is only ever computed once; readers of already-computed entries only take the read lock.
#[derive(Debug, Default)]
pub struct FieldCache {
  entries: RwLock<HashMap<(Type, String), Arc<[FieldPath]>>>,
}

impl FieldCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// Flattened leaf fields of `ty`, named after `prefix`.
  ///
  /// For a struct, `prefix` is prepended to each field name (pass `"u."` to get `u.inner.value`); for any other type,
  /// `prefix` names the value itself. Arrays are expanded item by item and must carry their length.
  pub fn fields(&self, ty: &Type, prefix: &str) -> CompileResult<Arc<[FieldPath]>> {
    let key = (ty.clone(), prefix.to_owned());

    if let Some(paths) = self
      .entries
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(&key)
    {
      return Ok(paths.clone());
    }

    let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

    // another writer might have been faster
    if let Some(paths) = entries.get(&key) {
      return Ok(paths.clone());
    }

    let paths: Arc<[FieldPath]> = flatten(ty, prefix)?.into();
    log::trace!("reflected {} field(s) under `{}`", paths.len(), prefix);

    entries.insert(key, paths.clone());
    Ok(paths)
  }

  /// Number of cached entries.
  pub fn len(&self) -> usize {
    self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Uncached flattening.
pub fn flatten(ty: &Type, prefix: &str) -> CompileResult<Vec<FieldPath>> {
  let mut paths = Vec::new();
  let mut steps = Vec::new();

  match ty {
    Type::Struct(def) => {
      for (i, field) in def.fields.iter().enumerate() {
        steps.push(Step::Field(i));
        flatten_named(&field.ty, format!("{}{}", prefix, field.name), &mut steps, &mut paths)?;
        steps.pop();
      }
    }

    _ => flatten_named(ty, prefix.to_owned(), &mut steps, &mut paths)?,
  }

  Ok(paths)
}

fn flatten_named(
  ty: &Type,
  name: String,
  steps: &mut Vec<Step>,
  paths: &mut Vec<FieldPath>,
) -> CompileResult<()> {
  match ty {
    Type::Prim(_) => paths.push(FieldPath {
      name,
      ty: ty.clone(),
      accessor: Accessor(steps.clone()),
    }),

    Type::Struct(def) => {
      for (i, field) in def.fields.iter().enumerate() {
        steps.push(Step::Field(i));
        flatten_named(&field.ty, format!("{}.{}", name, field.name), steps, paths)?;
        steps.pop();
      }
    }

    Type::Array(item, Some(len)) => {
      for i in 0..*len {
        steps.push(Step::Element(i));
        flatten_named(item, format!("{}[{}]", name, i), steps, paths)?;
        steps.pop();
      }
    }

    Type::Array(_, None) => return Err(CompileError::MissingArrayLengthAnnotation(name)),
  }

  Ok(())
}
