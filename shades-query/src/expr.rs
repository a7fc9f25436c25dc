//! Expressions, the AST consumed by the compiler.

use crate::{
  decl::{self, DeclId},
  types::{Dim, PrimType, Type},
};
use std::{fmt, ops, sync::Arc};

/// Binary operators with a built-in syntax in the target language.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BinOp {
  Add,
  Sub,
  Mul,
  Div,
  Rem,
  And,
  Or,
  Xor,
  BitAnd,
  BitOr,
  BitXor,
  Shl,
  Shr,
  Eq,
  Neq,
  Lt,
  Lte,
  Gt,
  Gte,
}

impl BinOp {
  /// Whether the operator yields a boolean regardless of its operands.
  pub fn is_predicate(self) -> bool {
    matches!(
      self,
      BinOp::And
        | BinOp::Or
        | BinOp::Xor
        | BinOp::Eq
        | BinOp::Neq
        | BinOp::Lt
        | BinOp::Lte
        | BinOp::Gt
        | BinOp::Gte
    )
  }
}

/// Unary operators with a built-in syntax in the target language.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum UnOp {
  Neg,
  Not,
}

/// Literal values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Literal {
  Int(i32),
  UInt(u32),
  Float(f32),
  Bool(bool),
}

impl Literal {
  pub fn ty(&self) -> Type {
    match self {
      Literal::Int(_) => Type::Prim(PrimType::Int(Dim::Scalar)),
      Literal::UInt(_) => Type::Prim(PrimType::UInt(Dim::Scalar)),
      Literal::Float(_) => Type::Prim(PrimType::Float(Dim::Scalar)),
      Literal::Bool(_) => Type::Prim(PrimType::Bool(Dim::Scalar)),
    }
  }
}

/// A named and typed parameter of a lambda, or the variable bound by a clause.
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
  pub name: String,
  pub ty: Type,
}

impl Param {
  pub fn new(name: impl Into<String>, ty: Type) -> Self {
    Self {
      name: name.into(),
      ty,
    }
  }

  /// Reference this parameter in an expression.
  pub fn expr(&self) -> Expr {
    Expr::param(self.name.clone(), self.ty.clone())
  }
}

/// Shape of an expression node.
#[derive(Debug)]
pub enum ExprKind {
  Binary {
    op: BinOp,
    lhs: Expr,
    rhs: Expr,
    decl: Option<DeclId>,
  },

  Unary {
    op: UnOp,
    operand: Expr,
    decl: Option<DeclId>,
  },

  /// Call of a function or method.
  ///
  /// `target` is the receiver of instance (non-static) methods.
  Call {
    decl: DeclId,
    is_static: bool,
    target: Option<Expr>,
    args: Vec<Expr>,
  },

  Member {
    target: Expr,
    member: String,
    decl: Option<DeclId>,
  },

  Construct {
    decl: DeclId,
    args: Vec<Expr>,
  },

  Constant(Literal),

  Conditional {
    test: Expr,
    then: Expr,
    otherwise: Expr,
  },

  Parameter(String),

  Lambda {
    params: Vec<Param>,
    body: Expr,
  },
}

impl ExprKind {
  /// Short name of the node kind, for diagnostics.
  pub fn name(&self) -> &'static str {
    match self {
      ExprKind::Binary { .. } => "binary operation",
      ExprKind::Unary { .. } => "unary operation",
      ExprKind::Call { .. } => "call",
      ExprKind::Member { .. } => "member access",
      ExprKind::Construct { .. } => "construction",
      ExprKind::Constant(_) => "constant",
      ExprKind::Conditional { .. } => "conditional",
      ExprKind::Parameter(_) => "parameter",
      ExprKind::Lambda { .. } => "lambda",
    }
  }
}

#[derive(Debug)]
struct Node {
  ty: Type,
  kind: ExprKind,
}

/// Expression representation.
///
/// An expression is an immutable, typed node. Cloning an [`Expr`] is cheap and shares the node: expressions are never
/// mutated once built, so sub-trees can be shared freely, even across threads.
///
/// # Building expressions
///
/// Literals are lifted with [`From`] (or the [`lit!`](crate::lit) macro), parameters with [`Expr::param`] and the
/// arithmetic operators are overloaded, so `x * 2. + y` builds the expected tree. Calls, constructors and member
/// accesses take the [`DeclId`] that identifies them in the [`SyntaxRegistry`](crate::syntax::SyntaxRegistry).
#[derive(Clone)]
pub struct Expr(Arc<Node>);

impl fmt::Debug for Expr {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("Expr")
      .field("ty", &self.0.ty)
      .field("kind", &self.0.kind)
      .finish()
  }
}

impl From<&'_ Expr> for Expr {
  fn from(e: &Expr) -> Self {
    e.clone()
  }
}

impl Expr {
  pub fn new(ty: Type, kind: ExprKind) -> Self {
    Expr(Arc::new(Node { ty, kind }))
  }

  /// Static type tag.
  pub fn ty(&self) -> &Type {
    &self.0.ty
  }

  pub fn kind(&self) -> &ExprKind {
    &self.0.kind
  }

  pub fn lit(lit: Literal) -> Self {
    Self::new(lit.ty(), ExprKind::Constant(lit))
  }

  pub fn param(name: impl Into<String>, ty: Type) -> Self {
    Self::new(ty, ExprKind::Parameter(name.into()))
  }

  /// Binary operation using the built-in syntax of `op`.
  pub fn binary(op: BinOp, lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
    Self::binary_decl(op, lhs, rhs, None)
  }

  /// Binary operation that might be rendered with the template registered for `decl`.
  pub fn binary_decl(
    op: BinOp,
    lhs: impl Into<Expr>,
    rhs: impl Into<Expr>,
    decl: impl Into<Option<DeclId>>,
  ) -> Self {
    let (lhs, rhs) = (lhs.into(), rhs.into());
    let ty = binary_type(op, lhs.ty(), rhs.ty());

    Self::new(
      ty,
      ExprKind::Binary {
        op,
        lhs,
        rhs,
        decl: decl.into(),
      },
    )
  }

  pub fn unary(op: UnOp, operand: impl Into<Expr>) -> Self {
    Self::unary_decl(op, operand, None)
  }

  pub fn unary_decl(op: UnOp, operand: impl Into<Expr>, decl: impl Into<Option<DeclId>>) -> Self {
    let operand = operand.into();

    Self::new(
      operand.ty().clone(),
      ExprKind::Unary {
        op,
        operand,
        decl: decl.into(),
      },
    )
  }

  /// Static function call returning a `ty`.
  pub fn call(decl: impl Into<DeclId>, ty: Type, args: Vec<Expr>) -> Self {
    Self::new(
      ty,
      ExprKind::Call {
        decl: decl.into(),
        is_static: true,
        target: None,
        args,
      },
    )
  }

  /// Instance method call on `self`, returning a `ty`.
  pub fn method(&self, decl: impl Into<DeclId>, ty: Type, args: Vec<Expr>) -> Self {
    Self::new(
      ty,
      ExprKind::Call {
        decl: decl.into(),
        is_static: false,
        target: Some(self.clone()),
        args,
      },
    )
  }

  /// Member access on `self`.
  pub fn member(&self, member: impl Into<String>, ty: Type, decl: impl Into<Option<DeclId>>) -> Self {
    Self::new(
      ty,
      ExprKind::Member {
        target: self.clone(),
        member: member.into(),
        decl: decl.into(),
      },
    )
  }

  /// Access the field `name` of an expression of struct type.
  pub fn try_field(&self, name: &str) -> Option<Self> {
    let def = self.ty().as_struct()?;
    let field = def.field(name)?;
    Some(self.member(name, field.ty.clone(), None))
  }

  /// Access the field `name` of an expression of struct type.
  ///
  /// # Panics
  ///
  /// Panics if the expression is not a struct or has no such field, which is a front-end bug.
  pub fn field(&self, name: &str) -> Self {
    match self.try_field(name) {
      Some(field) => field,
      None => panic!("no field {} in {:?}", name, self.ty()),
    }
  }

  /// Array lookup.
  pub fn at(&self, index: impl Into<Expr>) -> Self {
    let item = match self.ty().as_array() {
      Some((item, _)) => item.clone(),
      None => self.ty().clone(),
    };

    self.method(crate::stdlib::INDEX, item, vec![index.into()])
  }

  pub fn construct(decl: impl Into<DeclId>, ty: Type, args: Vec<Expr>) -> Self {
    Self::new(
      ty,
      ExprKind::Construct {
        decl: decl.into(),
        args,
      },
    )
  }

  /// `test ? then : otherwise`.
  pub fn cond(test: impl Into<Expr>, then: impl Into<Expr>, otherwise: impl Into<Expr>) -> Self {
    let then = then.into();

    Self::new(
      then.ty().clone(),
      ExprKind::Conditional {
        test: test.into(),
        then,
        otherwise: otherwise.into(),
      },
    )
  }

  pub fn lambda(params: Vec<Param>, body: impl Into<Expr>) -> Self {
    let body = body.into();
    Self::new(body.ty().clone(), ExprKind::Lambda { params, body })
  }

  /// Iterate over the items of an array, as the source of a `from` clause.
  pub fn each(&self) -> Self {
    let item = match self.ty().as_array() {
      Some((item, _)) => item.clone(),
      None => self.ty().clone(),
    };

    self.method(decl::EACH, item, Vec::new())
  }

  pub fn eq(&self, rhs: impl Into<Expr>) -> Self {
    Self::binary(BinOp::Eq, self, rhs)
  }

  pub fn neq(&self, rhs: impl Into<Expr>) -> Self {
    Self::binary(BinOp::Neq, self, rhs)
  }

  pub fn lt(&self, rhs: impl Into<Expr>) -> Self {
    Self::binary(BinOp::Lt, self, rhs)
  }

  pub fn lte(&self, rhs: impl Into<Expr>) -> Self {
    Self::binary(BinOp::Lte, self, rhs)
  }

  pub fn gt(&self, rhs: impl Into<Expr>) -> Self {
    Self::binary(BinOp::Gt, self, rhs)
  }

  pub fn gte(&self, rhs: impl Into<Expr>) -> Self {
    Self::binary(BinOp::Gte, self, rhs)
  }

  pub fn and(&self, rhs: impl Into<Expr>) -> Self {
    Self::binary(BinOp::And, self, rhs)
  }

  pub fn or(&self, rhs: impl Into<Expr>) -> Self {
    Self::binary(BinOp::Or, self, rhs)
  }

  pub fn xor(&self, rhs: impl Into<Expr>) -> Self {
    Self::binary(BinOp::Xor, self, rhs)
  }
}

/// Type of a binary operation, following the implicit broadcasting rules of the target language.
fn binary_type(op: BinOp, lhs: &Type, rhs: &Type) -> Type {
  if op.is_predicate() {
    return Type::bool();
  }

  match (lhs.as_prim(), rhs.as_prim()) {
    (Some(l), Some(_)) if l.dim() == Some(Dim::Scalar) => rhs.clone(),
    (Some(_), Some(r)) if r.dim() == Some(Dim::Scalar) => lhs.clone(),
    // matrix × vector and vector × matrix both yield a vector
    (Some(PrimType::Matrix(_)), Some(r)) if r.dim().is_some() => rhs.clone(),
    _ => lhs.clone(),
  }
}

macro_rules! impl_From_Expr_scalar {
  ($t:ty, $q:ident) => {
    impl From<$t> for Expr {
      fn from(a: $t) -> Self {
        Expr::lit(Literal::$q(a))
      }
    }
  };
}

impl_From_Expr_scalar!(i32, Int);
impl_From_Expr_scalar!(u32, UInt);
impl_From_Expr_scalar!(f32, Float);
impl_From_Expr_scalar!(bool, Bool);

/// Double-precision literals are lowered to single precision, which also makes unsuffixed float literals work.
impl From<f64> for Expr {
  fn from(a: f64) -> Self {
    Expr::lit(Literal::Float(a as f32))
  }
}

// binary arithmetic and logical (+, -, *, /, %, &, |, ^, <<, >>)
macro_rules! impl_binop_Expr {
  ($op:ident, $meth_name:ident) => {
    // expr OP rhs, where rhs is automatically lifted
    impl<R> ops::$op<R> for Expr
    where
      R: Into<Expr>,
    {
      type Output = Expr;

      fn $meth_name(self, rhs: R) -> Self::Output {
        Expr::binary(BinOp::$op, self, rhs)
      }
    }

    // &expr OP rhs, where rhs is automatically lifted
    impl<'a, R> ops::$op<R> for &'a Expr
    where
      R: Into<Expr>,
    {
      type Output = Expr;

      fn $meth_name(self, rhs: R) -> Self::Output {
        Expr::binary(BinOp::$op, self, rhs)
      }
    }
  };
}

impl_binop_Expr!(Add, add);
impl_binop_Expr!(Sub, sub);
impl_binop_Expr!(Mul, mul);
impl_binop_Expr!(Div, div);
impl_binop_Expr!(Rem, rem);
impl_binop_Expr!(BitAnd, bitand);
impl_binop_Expr!(BitOr, bitor);
impl_binop_Expr!(BitXor, bitxor);
impl_binop_Expr!(Shl, shl);
impl_binop_Expr!(Shr, shr);

macro_rules! impl_unop_Expr {
  ($op:ident, $meth_name:ident) => {
    impl ops::$op for Expr {
      type Output = Expr;

      fn $meth_name(self) -> Self::Output {
        Expr::unary(UnOp::$op, self)
      }
    }

    impl<'a> ops::$op for &'a Expr {
      type Output = Expr;

      fn $meth_name(self) -> Self::Output {
        Expr::unary(UnOp::$op, self)
      }
    }
  };
}

impl_unop_Expr!(Neg, neg);
impl_unop_Expr!(Not, not);

/// Lift a Rust literal into an [`Expr`].
///
/// - `lit!(x)` is `Expr::from(x)`.
/// - `lit!(x, y)`, `lit!(x, y, z)` and `lit!(x, y, z, w)` build a floating vector with the stock `vec2`, `vec3` and
///   `vec4` constructors.
///
/// ```
/// use shades_query::lit;
///
/// let _ = lit!(1);
/// let _ = lit!(false);
/// let _ = lit!(1., 2., 3., 4.);
/// ```
#[macro_export]
macro_rules! lit {
  ($e:expr) => {
    $crate::expr::Expr::from($e)
  };

  ($a:expr, $b:expr) => {
    $crate::stdlib::vec2($a, $b)
  };

  ($a:expr, $b:expr, $c:expr) => {
    $crate::stdlib::vec3($a, $b, $c)
  };

  ($a:expr, $b:expr, $c:expr, $d:expr) => {
    $crate::stdlib::vec4($a, $b, $c, $d)
  };
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::{ToType, M44, V3, V4};

  #[test]
  fn lit_scalars() {
    assert_eq!(lit!(true).ty(), &Type::bool());
    assert_eq!(lit!(1).ty(), &Type::int());
    assert!(matches!(lit!(1.).kind(), ExprKind::Constant(Literal::Float(x)) if *x == 1.));
  }

  #[test]
  fn operators_build_binary_nodes() {
    let a = Expr::param("a", Type::float());
    let e = &a + a.clone() * 1.;

    match e.kind() {
      ExprKind::Binary { op, rhs, decl, .. } => {
        assert_eq!(*op, BinOp::Add);
        assert!(decl.is_none());
        assert!(matches!(rhs.kind(), ExprKind::Binary { op: BinOp::Mul, .. }));
      }

      kind => panic!("unexpected {}", kind.name()),
    }
  }

  #[test]
  fn broadcast_types() {
    let s = Expr::param("s", Type::float());
    let v = Expr::param("v", <V3<f32>>::ty());
    let m = Expr::param("m", M44::ty());
    let p = Expr::param("p", <V4<f32>>::ty());

    assert_eq!((&s * &v).ty(), &<V3<f32>>::ty());
    assert_eq!((&v * &s).ty(), &<V3<f32>>::ty());
    assert_eq!((&m * &p).ty(), &<V4<f32>>::ty());
    assert_eq!((&m * 2.).ty(), &M44::ty());
    assert_eq!(s.lt(1.).ty(), &Type::bool());
    assert_eq!((-&v).ty(), &<V3<f32>>::ty());
  }
}
