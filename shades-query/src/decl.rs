//! Declaration identities.
//!
//! Every operator, method, field or constructor the front-end can produce is identified by a [`DeclId`]. The compiler
//! never inspects the identity itself: it only uses it to look up a [`Template`](crate::syntax::Template), a user
//! function or one of the query declarations below.

use std::{borrow::Borrow, fmt, sync::Arc};

/// Opaque identity of a host declaration.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DeclId(Arc<str>);

impl DeclId {
  pub fn new(id: impl AsRef<str>) -> Self {
    DeclId(Arc::from(id.as_ref()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl From<&'_ str> for DeclId {
  fn from(id: &str) -> Self {
    Self::new(id)
  }
}

impl From<String> for DeclId {
  fn from(id: String) -> Self {
    DeclId(Arc::from(id))
  }
}

impl Borrow<str> for DeclId {
  fn borrow(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for DeclId {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// `from x in source` clause.
pub const FROM: &str = "query::from";

/// `let x = value` clause.
pub const LET: &str = "query::let";

/// `select projection` clause.
pub const SELECT: &str = "query::select";

/// Source of vertex / fragment inputs.
pub const INPUTS: &str = "shader::inputs";

/// Source of uniforms.
pub const UNIFORMS: &str = "shader::uniforms";

/// Source of constants.
pub const CONSTANTS: &str = "shader::constants";

/// Iterate over the items of a fixed-size array.
pub const EACH: &str = "array::each";

/// Fold a sequence into an accumulator.
pub const AGGREGATE: &str = "sequence::aggregate";

/// Check whether a [`DeclId`] is one of the declarations above.
pub(crate) fn is(decl: &DeclId, well_known: &str) -> bool {
  decl.as_str() == well_known
}
