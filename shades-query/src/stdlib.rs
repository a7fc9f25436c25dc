//! Stock GLSL declarations.
//!
//! This module provides the declaration identities of the GLSL built-in constructors, functions, swizzles and array
//! indexing, the templates rendering them ([`register_glsl`], used by [`SyntaxRegistry::glsl`]) and extension traits
//! building the matching [`Expr`] nodes.

use crate::{
  decl::DeclId,
  expr::Expr,
  syntax::SyntaxRegistry,
  types::{Dim, MatrixDim, PrimType, SamplerDim, Type},
};

/// Array lookup, `a[i]`.
pub const INDEX: &str = "array::index";

macro_rules! ctor_decls {
  ($($konst:ident => $name:literal),* $(,)?) => {
    $(
      #[doc = concat!("`", $name, "` constructor.")]
      pub const $konst: &str = concat!($name, "::new");
    )*

    const CTORS: &[(&str, &str)] = &[$(($konst, $name)),*];
  };
}

ctor_decls! {
  VEC2 => "vec2",
  VEC3 => "vec3",
  VEC4 => "vec4",
  IVEC2 => "ivec2",
  IVEC3 => "ivec3",
  IVEC4 => "ivec4",
  UVEC2 => "uvec2",
  UVEC3 => "uvec3",
  UVEC4 => "uvec4",
  BVEC2 => "bvec2",
  BVEC3 => "bvec3",
  BVEC4 => "bvec4",
  MAT2 => "mat2",
  MAT3 => "mat3",
  MAT4 => "mat4",
  MAT2X3 => "mat2x3",
  MAT2X4 => "mat2x4",
  MAT3X2 => "mat3x2",
  MAT3X4 => "mat3x4",
  MAT4X2 => "mat4x2",
  MAT4X3 => "mat4x3",
  FLOAT => "float",
  INT => "int",
  UINT => "uint",
  BOOL => "bool",
}

/// Array constructor, rendered with the array constructor syntax of the target language.
pub const ARRAY: &str = "array::new";

/// Constructor of a user struct, rendered with the struct constructor syntax of the target language.
pub fn struct_ctor(name: &str) -> DeclId {
  DeclId::new(format!("struct::{}::new", name))
}

/// Stock constructor of a primitive type.
pub fn constructor(prim: &PrimType) -> Option<&'static str> {
  let decl = match prim {
    PrimType::Int(Dim::Scalar) => INT,
    PrimType::Int(Dim::D2) => IVEC2,
    PrimType::Int(Dim::D3) => IVEC3,
    PrimType::Int(Dim::D4) => IVEC4,
    PrimType::UInt(Dim::Scalar) => UINT,
    PrimType::UInt(Dim::D2) => UVEC2,
    PrimType::UInt(Dim::D3) => UVEC3,
    PrimType::UInt(Dim::D4) => UVEC4,
    PrimType::Float(Dim::Scalar) => FLOAT,
    PrimType::Float(Dim::D2) => VEC2,
    PrimType::Float(Dim::D3) => VEC3,
    PrimType::Float(Dim::D4) => VEC4,
    PrimType::Bool(Dim::Scalar) => BOOL,
    PrimType::Bool(Dim::D2) => BVEC2,
    PrimType::Bool(Dim::D3) => BVEC3,
    PrimType::Bool(Dim::D4) => BVEC4,
    PrimType::Matrix(MatrixDim::D22) => MAT2,
    PrimType::Matrix(MatrixDim::D23) => MAT2X3,
    PrimType::Matrix(MatrixDim::D24) => MAT2X4,
    PrimType::Matrix(MatrixDim::D32) => MAT3X2,
    PrimType::Matrix(MatrixDim::D33) => MAT3,
    PrimType::Matrix(MatrixDim::D34) => MAT3X4,
    PrimType::Matrix(MatrixDim::D42) => MAT4X2,
    PrimType::Matrix(MatrixDim::D43) => MAT4X3,
    PrimType::Matrix(MatrixDim::D44) => MAT4,
    PrimType::Sampler(_) => return None,
  };

  Some(decl)
}

/// Built-in functions: GLSL name and number of arguments.
const FUNCTIONS: &[(&str, usize)] = &[
  // trigonometry
  ("radians", 1),
  ("degrees", 1),
  ("sin", 1),
  ("cos", 1),
  ("tan", 1),
  ("asin", 1),
  ("acos", 1),
  ("atan", 1),
  ("sinh", 1),
  ("cosh", 1),
  ("tanh", 1),
  ("asinh", 1),
  ("acosh", 1),
  ("atanh", 1),
  // exponential
  ("pow", 2),
  ("exp", 1),
  ("exp2", 1),
  ("log", 1),
  ("log2", 1),
  ("sqrt", 1),
  ("inversesqrt", 1),
  // common
  ("abs", 1),
  ("sign", 1),
  ("floor", 1),
  ("trunc", 1),
  ("round", 1),
  ("roundEven", 1),
  ("ceil", 1),
  ("fract", 1),
  ("mod", 2),
  ("min", 2),
  ("max", 2),
  ("clamp", 3),
  ("mix", 3),
  ("step", 2),
  ("smoothstep", 3),
  // geometry
  ("length", 1),
  ("distance", 2),
  ("dot", 2),
  ("cross", 2),
  ("normalize", 1),
  ("faceforward", 3),
  ("reflect", 2),
  ("refract", 3),
  // vector relational
  ("lessThan", 2),
  ("lessThanEqual", 2),
  ("greaterThan", 2),
  ("greaterThanEqual", 2),
  ("equal", 2),
  ("notEqual", 2),
  ("any", 1),
  ("all", 1),
  ("not", 1),
  // derivatives
  ("dFdx", 1),
  ("dFdy", 1),
  ("fwidth", 1),
  // matrices
  ("transpose", 1),
  ("inverse", 1),
  ("determinant", 1),
  // textures
  ("texture", 2),
  ("textureLod", 3),
];

/// Declaration identity of a built-in function.
pub fn function(name: &str) -> DeclId {
  DeclId::new(format!("glsl::{}", name))
}

/// Declaration identity of a swizzle, such as `xy` or `rgb`.
pub fn swizzle_decl(selector: &str) -> DeclId {
  DeclId::new(format!("swizzle::{}", selector))
}

/// Fill `registry` with the stock GLSL templates.
pub fn register_glsl(registry: &mut SyntaxRegistry) {
  registry.register(INDEX, "{0}[{1}]");

  for (decl, name) in CTORS {
    registry.register(*decl, format!("{}({{0}})", name).as_str());
  }

  for (name, arity) in FUNCTIONS {
    let placeholders = (0..*arity)
      .map(|i| format!("{{{}}}", i))
      .collect::<Vec<_>>()
      .join(", ");

    registry.register(function(name), format!("{}({})", name, placeholders).as_str());
  }

  for set in &["xyzw", "rgba", "stpq"] {
    for selector in swizzles(set) {
      registry.register(swizzle_decl(&selector), format!("{{0}}.{}", selector).as_str());
    }
  }
}

/// Every selector of one to four components over a component set.
fn swizzles(set: &str) -> Vec<String> {
  let components = set.chars().collect::<Vec<_>>();
  let mut selectors: Vec<String> = components.iter().map(|c| c.to_string()).collect();
  let mut last = selectors.clone();

  for _ in 1..4 {
    last = last
      .iter()
      .flat_map(|prefix| components.iter().map(move |c| format!("{}{}", prefix, c)))
      .collect();
    selectors.extend(last.iter().cloned());
  }

  selectors
}

fn float_vec(dim: Dim) -> Type {
  Type::Prim(PrimType::Float(dim))
}

/// Build a `vec2`.
pub fn vec2(x: impl Into<Expr>, y: impl Into<Expr>) -> Expr {
  Expr::construct(VEC2, float_vec(Dim::D2), vec![x.into(), y.into()])
}

/// Build a `vec3`.
pub fn vec3(x: impl Into<Expr>, y: impl Into<Expr>, z: impl Into<Expr>) -> Expr {
  Expr::construct(VEC3, float_vec(Dim::D3), vec![x.into(), y.into(), z.into()])
}

/// Build a `vec4`.
pub fn vec4(x: impl Into<Expr>, y: impl Into<Expr>, z: impl Into<Expr>, w: impl Into<Expr>) -> Expr {
  Expr::construct(
    VEC4,
    float_vec(Dim::D4),
    vec![x.into(), y.into(), z.into(), w.into()],
  )
}

/// Swizzle an expression.
///
/// The result has the scalar kind of `e` and as many components as `selector` has characters.
pub fn swizzle(e: &Expr, selector: &str) -> Expr {
  let dim = match selector.len() {
    1 => Dim::Scalar,
    2 => Dim::D2,
    3 => Dim::D3,
    _ => Dim::D4,
  };
  let ty = match e.ty().as_prim() {
    Some(prim) => Type::Prim(prim.with_dim(dim)),
    None => float_vec(dim),
  };

  e.member(selector, ty, swizzle_decl(selector))
}

macro_rules! same_type_fns {
  ($(#[$doc:meta])* $trait:ident { $($meth:ident => $name:literal ($($arg:ident),*)),* $(,)? }) => {
    $(#[$doc])*
    pub trait $trait {
      $(
        fn $meth(&self $(, $arg: impl Into<Expr>)*) -> Self;
      )*
    }

    impl $trait for Expr {
      $(
        fn $meth(&self $(, $arg: impl Into<Expr>)*) -> Self {
          Expr::call(function($name), self.ty().clone(), vec![self.clone() $(, $arg.into())*])
        }
      )*
    }
  };
}

same_type_fns! {
  /// Trigonometry functions.
  Trigonometry {
    radians => "radians"(),
    degrees => "degrees"(),
    sin => "sin"(),
    cos => "cos"(),
    tan => "tan"(),
    asin => "asin"(),
    acos => "acos"(),
    atan => "atan"(),
  }
}

same_type_fns! {
  /// Exponential functions.
  Exponential {
    pow => "pow"(exponent),
    exp => "exp"(),
    exp2 => "exp2"(),
    ln => "log"(),
    log2 => "log2"(),
    sqrt => "sqrt"(),
    isqrt => "inversesqrt"(),
  }
}

same_type_fns! {
  /// Common functions.
  Common {
    abs => "abs"(),
    sign => "sign"(),
    floor => "floor"(),
    trunc => "trunc"(),
    round => "round"(),
    ceil => "ceil"(),
    fract => "fract"(),
    modulo => "mod"(y),
    min => "min"(y),
    max => "max"(y),
    clamp => "clamp"(min, max),
    mix => "mix"(y, a),
    step => "step"(x),
    smoothstep => "smoothstep"(edge1, x),
  }
}

/// Geometric functions.
pub trait Geometry {
  fn length(&self) -> Self;
  fn distance(&self, other: impl Into<Expr>) -> Self;
  fn dot(&self, other: impl Into<Expr>) -> Self;
  fn cross(&self, other: impl Into<Expr>) -> Self;
  fn normalize(&self) -> Self;
  fn reflect(&self, normal: impl Into<Expr>) -> Self;
}

impl Geometry for Expr {
  fn length(&self) -> Self {
    Expr::call(function("length"), Type::float(), vec![self.clone()])
  }

  fn distance(&self, other: impl Into<Expr>) -> Self {
    Expr::call(
      function("distance"),
      Type::float(),
      vec![self.clone(), other.into()],
    )
  }

  fn dot(&self, other: impl Into<Expr>) -> Self {
    Expr::call(function("dot"), Type::float(), vec![self.clone(), other.into()])
  }

  fn cross(&self, other: impl Into<Expr>) -> Self {
    Expr::call(
      function("cross"),
      self.ty().clone(),
      vec![self.clone(), other.into()],
    )
  }

  fn normalize(&self) -> Self {
    Expr::call(function("normalize"), self.ty().clone(), vec![self.clone()])
  }

  fn reflect(&self, normal: impl Into<Expr>) -> Self {
    Expr::call(
      function("reflect"),
      self.ty().clone(),
      vec![self.clone(), normal.into()],
    )
  }
}

/// Sample a texture.
pub fn texture(sampler: &Expr, coords: impl Into<Expr>) -> Expr {
  Expr::call(
    function("texture"),
    float_vec(Dim::D4),
    vec![sampler.clone(), coords.into()],
  )
}

/// Type of a 2D sampler.
pub fn sampler2d() -> Type {
  Type::Prim(PrimType::Sampler(SamplerDim::D2))
}
