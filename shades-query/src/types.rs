//! Types recognized by the compiler.

use std::{iter::once, sync::Arc};

macro_rules! make_vn {
  ($t:ident, $dim:expr) => {
    /// Host-side vector of `T`, giving a [`Type`] to struct fields and values.
    #[derive(Clone, Debug, PartialEq)]
    pub struct $t<T>(pub [T; $dim]);

    impl<T> From<[T; $dim]> for $t<T> {
      fn from(a: [T; $dim]) -> Self {
        Self(a)
      }
    }
  };
}

make_vn!(V2, 2);
make_vn!(V3, 3);
make_vn!(V4, 4);

/// Host-side matrix; `Matrix<[[f32; N]; M]>` has `M` columns of `N` rows.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix<T>(pub T);

impl<T, const M: usize, const N: usize> From<[[T; N]; M]> for Matrix<[[T; N]; M]> {
  fn from(a: [[T; N]; M]) -> Self {
    Matrix(a)
  }
}

macro_rules! make_mat_ty {
  ($t:ident, $m:expr, $n:expr, $mdim:ident) => {
    pub type $t = Matrix<[[f32; $n]; $m]>;

    impl ToPrimType for Matrix<[[f32; $n]; $m]> {
      const PRIM_TYPE: PrimType = PrimType::Matrix(MatrixDim::$mdim);
    }
  };
}

make_mat_ty!(M22, 2, 2, D22);
make_mat_ty!(M23, 2, 3, D23);
make_mat_ty!(M24, 2, 4, D24);
make_mat_ty!(M32, 3, 2, D32);
make_mat_ty!(M33, 3, 3, D33);
make_mat_ty!(M34, 3, 4, D34);
make_mat_ty!(M42, 4, 2, D42);
make_mat_ty!(M43, 4, 3, D43);
make_mat_ty!(M44, 4, 4, D44);

/// Columns × rows of a matrix, column-major.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MatrixDim {
  D22,
  D23,
  D24,
  D32,
  D33,
  D34,
  D42,
  D43,
  D44,
}

/// Vector dimension of a scalar type; [`Dim::Scalar`] for plain scalars.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Dim {
  Scalar,
  D2,
  D3,
  D4,
}

/// Dimension of a sampler.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SamplerDim {
  D2,
  D3,
  Cube,
}

/// Types built into the target language, needing no declaration.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PrimType {
  Int(Dim),
  UInt(Dim),
  Float(Dim),
  Bool(Dim),
  Matrix(MatrixDim),

  /// Floating-point texture sampler.
  Sampler(SamplerDim),
}

impl PrimType {
  /// Vector dimension of the type, if it’s a scalar or a vector.
  pub fn dim(&self) -> Option<Dim> {
    match *self {
      PrimType::Int(d) | PrimType::UInt(d) | PrimType::Float(d) | PrimType::Bool(d) => Some(d),
      _ => None,
    }
  }

  /// Same scalar kind, but with another vector dimension.
  pub fn with_dim(&self, dim: Dim) -> Self {
    match *self {
      PrimType::Int(_) => PrimType::Int(dim),
      PrimType::UInt(_) => PrimType::UInt(dim),
      PrimType::Float(_) => PrimType::Float(dim),
      PrimType::Bool(_) => PrimType::Bool(dim),
      other => other,
    }
  }
}

/// An aggregate type, declared as a `struct` in the target language.
///
/// The name is the identity of the aggregate: two [`StructDef`] with the same name are expected to have the same
/// fields.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct StructDef {
  pub name: String,
  pub fields: Vec<FieldDef>,
}

impl StructDef {
  pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
    Self {
      name: name.into(),
      fields,
    }
  }

  /// Look up a field by name.
  pub fn field(&self, name: &str) -> Option<&FieldDef> {
    self.fields.iter().find(|field| field.name == name)
  }
}

/// A field of an aggregate type.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct FieldDef {
  pub name: String,
  pub ty: Type,
}

impl FieldDef {
  pub fn new(name: impl Into<String>, ty: Type) -> Self {
    Self {
      name: name.into(),
      ty,
    }
  }
}

/// Type representation.
///
/// Arrays carry their length as an optional annotation: `None` means the length is unknown, which is fine as long as
/// nothing needs to declare or iterate the array.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Type {
  /// A primitive type.
  Prim(PrimType),

  /// A struct type.
  Struct(Arc<StructDef>),

  /// An array of items with their length annotation, if any.
  Array(Box<Type>, Option<usize>),
}

impl Type {
  pub fn structure(def: StructDef) -> Self {
    Type::Struct(Arc::new(def))
  }

  pub fn array(item: Type, len: impl Into<Option<usize>>) -> Self {
    Type::Array(Box::new(item), len.into())
  }

  /// Annotate an array type with its length.
  ///
  /// Nested arrays get the annotation on their outermost dimension. Other types are returned unchanged.
  pub fn with_len(self, len: usize) -> Self {
    match self {
      Type::Array(item, _) => Type::Array(item, Some(len)),
      ty => ty,
    }
  }

  pub fn bool() -> Self {
    Type::Prim(PrimType::Bool(Dim::Scalar))
  }

  pub fn int() -> Self {
    Type::Prim(PrimType::Int(Dim::Scalar))
  }

  pub fn float() -> Self {
    Type::Prim(PrimType::Float(Dim::Scalar))
  }

  pub fn as_struct(&self) -> Option<&Arc<StructDef>> {
    match self {
      Type::Struct(def) => Some(def),
      _ => None,
    }
  }

  pub fn as_prim(&self) -> Option<PrimType> {
    match self {
      Type::Prim(prim) => Some(*prim),
      _ => None,
    }
  }

  /// Item type and length annotation of an array type.
  pub fn as_array(&self) -> Option<(&Type, Option<usize>)> {
    match self {
      Type::Array(item, len) => Some((item, *len)),
      _ => None,
    }
  }

  /// Innermost non-array type.
  pub fn leaf(&self) -> &Type {
    match self {
      Type::Array(item, _) => item.leaf(),
      ty => ty,
    }
  }

  /// Array dimensions, sorted from outer to inner; i.e. `[[i32; N]; M]`’s dimensions is encoded as `vec![M, N]`.
  pub fn array_dims(&self) -> Vec<Option<usize>> {
    match self {
      Type::Array(item, len) => once(*len).chain(item.array_dims()).collect(),
      _ => Vec::new(),
    }
  }
}

/// Class of types that are recognized as primitive types.
pub trait ToPrimType {
  /// Mapped primitive type.
  const PRIM_TYPE: PrimType;
}

macro_rules! impl_ToPrimType {
  ($t:ty, $q:ident, $d:ident) => {
    impl ToPrimType for $t {
      const PRIM_TYPE: PrimType = PrimType::$q(Dim::$d);
    }
  };
}

impl_ToPrimType!(i32, Int, Scalar);
impl_ToPrimType!(u32, UInt, Scalar);
impl_ToPrimType!(f32, Float, Scalar);
impl_ToPrimType!(bool, Bool, Scalar);
impl_ToPrimType!(V2<i32>, Int, D2);
impl_ToPrimType!(V2<u32>, UInt, D2);
impl_ToPrimType!(V2<f32>, Float, D2);
impl_ToPrimType!(V2<bool>, Bool, D2);
impl_ToPrimType!(V3<i32>, Int, D3);
impl_ToPrimType!(V3<u32>, UInt, D3);
impl_ToPrimType!(V3<f32>, Float, D3);
impl_ToPrimType!(V3<bool>, Bool, D3);
impl_ToPrimType!(V4<i32>, Int, D4);
impl_ToPrimType!(V4<u32>, UInt, D4);
impl_ToPrimType!(V4<f32>, Float, D4);
impl_ToPrimType!(V4<bool>, Bool, D4);

/// Represent a type in the compiler.
///
/// Any type implementing [`ToPrimType`] automatically also implements [`ToType`]. Aggregate types get their
/// implementation from `#[derive(Struct)]`.
pub trait ToType {
  fn ty() -> Type;
}

impl<T> ToType for T
where
  T: ToPrimType,
{
  fn ty() -> Type {
    Type::Prim(T::PRIM_TYPE)
  }
}

impl<T, const N: usize> ToType for [T; N]
where
  T: ToType,
{
  fn ty() -> Type {
    Type::array(T::ty(), N)
  }
}

/// Dynamically-sized arrays have no length annotation until one is supplied.
impl<T> ToType for Vec<T>
where
  T: ToType,
{
  fn ty() -> Type {
    Type::array(T::ty(), None)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn array_dims_outer_to_inner() {
    let ty = <[[V2<f32>; 2]; 15] as ToType>::ty();

    assert_eq!(ty.array_dims(), vec![Some(15), Some(2)]);
    assert_eq!(ty.leaf(), &Type::Prim(PrimType::Float(Dim::D2)));
  }

  #[test]
  fn vec_needs_annotation() {
    let ty = <Vec<f32> as ToType>::ty();
    assert_eq!(ty.as_array().map(|(_, len)| len), Some(None));
    assert_eq!(ty.with_len(8).as_array().map(|(_, len)| len), Some(Some(8)));
  }
}
