//! Compilation errors.

use crate::decl::DeclId;
use std::fmt;
use thiserror::Error;

/// Everything that can make a compilation fail.
///
/// Errors are raised as soon as they are detected and abort the whole compilation; no partial output is ever returned.
/// Compilation is deterministic, so retrying without changing the input fails the same way.
#[derive(Debug, Error)]
pub enum CompileError {
  /// An expression reached no emission rule.
  #[error("unsupported expression: {0}")]
  UnsupportedExpression(String),

  /// A constructor, operator, call or leaf type has no template and is not a primitive of the target language.
  #[error("unsupported declaration {decl}: {reason}")]
  UnsupportedDeclaration { decl: DeclId, reason: String },

  /// The clause sequence doesn’t start with at least one input, uniform or constant declaration.
  #[error("missing declaration clause: a shader must declare its inputs, uniforms or constants first")]
  MissingDeclarationClause,

  /// The clause sequence doesn’t end with a projection.
  #[error("missing return clause: the clause sequence must end with a select")]
  MissingReturnClause,

  /// A fixed-size array was used without its length annotation.
  #[error("missing array length annotation on {0}")]
  MissingArrayLengthAnnotation(String),

  /// A clause appears where the grammar doesn’t expect it.
  #[error("malformed clause sequence: {0}")]
  MalformedClauseSequence(String),

  /// A user function depends on itself, directly or transitively.
  #[error("cyclic function dependency through {0}")]
  CyclicFunctionDependency(String),

  /// A function was referenced but was never defined.
  #[error("unknown function {0}")]
  UnknownFunction(DeclId),

  /// The output sink refused a write.
  #[error(transparent)]
  Fmt(#[from] fmt::Error),
}

impl CompileError {
  pub(crate) fn unsupported_decl(decl: &DeclId, reason: impl Into<String>) -> Self {
    CompileError::UnsupportedDeclaration {
      decl: decl.clone(),
      reason: reason.into(),
    }
  }

  pub(crate) fn malformed(reason: impl Into<String>) -> Self {
    CompileError::MalformedClauseSequence(reason.into())
  }
}

pub type CompileResult<T> = Result<T, CompileError>;
