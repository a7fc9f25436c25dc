//! Syntax templates.
//!
//! A [`Template`] tells the emitter how to render the uses of one host declaration in the target language. Templates
//! are registered in a [`SyntaxRegistry`] before compilation and only read afterwards.

use crate::{
  decl::DeclId,
  error::{CompileError, CompileResult},
};
use std::collections::HashMap;

#[derive(Clone, Debug, Eq, PartialEq)]
enum Segment {
  Text(String),
  Arg(usize),
}

/// A format string with positional placeholders.
///
/// Placeholders are written `{0}`, `{1}`, etc. and are replaced by the emitted arguments: operands for operators,
/// arguments for calls and constructors (the receiver first for instance methods), the target expression for member
/// accesses. `{{` and `}}` render literal braces.
///
/// A template with an arity of one fed several arguments substitutes all of them, separated by `", "`, which is what
/// variadic constructors such as `vec3({0})` need.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Template {
  format: String,
  segments: Vec<Segment>,
  arity: usize,
}

impl Template {
  pub fn new(format: impl Into<String>) -> Self {
    let format = format.into();
    let segments = parse_segments(&format);
    let arity = segments
      .iter()
      .filter_map(|seg| match seg {
        Segment::Arg(i) => Some(i + 1),
        Segment::Text(_) => None,
      })
      .max()
      .unwrap_or(0);

    Self {
      format,
      segments,
      arity,
    }
  }

  pub fn format_str(&self) -> &str {
    &self.format
  }

  /// Number of arguments the template consumes.
  pub fn arity(&self) -> usize {
    self.arity
  }

  /// Substitute `args` into the template.
  ///
  /// `decl` is only used to report arity mismatches.
  pub fn apply(&self, decl: &DeclId, args: &[String]) -> CompileResult<String> {
    let joined;
    let args = if self.arity == 1 && args.len() > 1 {
      joined = [args.join(", ")];
      &joined[..]
    } else {
      args
    };

    if args.len() != self.arity {
      return Err(CompileError::unsupported_decl(
        decl,
        format!(
          "template `{}` expects {} argument(s), got {}",
          self.format,
          self.arity,
          args.len()
        ),
      ));
    }

    let mut output = String::with_capacity(self.format.len());
    for seg in &self.segments {
      match seg {
        Segment::Text(text) => output.push_str(text),
        Segment::Arg(i) => output.push_str(&args[*i]),
      }
    }

    Ok(output)
  }
}

impl From<&'_ str> for Template {
  fn from(format: &str) -> Self {
    Template::new(format)
  }
}

fn parse_segments(format: &str) -> Vec<Segment> {
  let mut segments = Vec::new();
  let mut text = String::new();
  let mut chars = format.chars().peekable();

  while let Some(c) = chars.next() {
    match c {
      '{' if chars.peek() == Some(&'{') => {
        chars.next();
        text.push('{');
      }

      '}' if chars.peek() == Some(&'}') => {
        chars.next();
        text.push('}');
      }

      '{' => {
        let mut digits = String::new();
        while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
          digits.push(d);
          chars.next();
        }

        match (digits.parse(), chars.peek()) {
          (Ok(i), Some('}')) => {
            chars.next();

            if !text.is_empty() {
              segments.push(Segment::Text(std::mem::take(&mut text)));
            }

            segments.push(Segment::Arg(i));
          }

          // not a placeholder; keep it verbatim
          _ => {
            text.push('{');
            text.push_str(&digits);
          }
        }
      }

      c => text.push(c),
    }
  }

  if !text.is_empty() {
    segments.push(Segment::Text(text));
  }

  segments
}

/// Lookup table from declarations to their [`Template`].
#[derive(Clone, Debug, Default)]
pub struct SyntaxRegistry {
  templates: HashMap<DeclId, Template>,
}

impl SyntaxRegistry {
  /// An empty registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// A registry filled with the stock GLSL table; see [`stdlib`](crate::stdlib).
  pub fn glsl() -> Self {
    let mut registry = Self::new();
    crate::stdlib::register_glsl(&mut registry);
    registry
  }

  /// Register the template of a declaration.
  ///
  /// Registering is idempotent: the first template registered for `decl` is kept and `false` is returned for any later
  /// attempt.
  pub fn register(&mut self, decl: impl Into<DeclId>, template: impl Into<Template>) -> bool {
    let decl = decl.into();

    if self.templates.contains_key(&decl) {
      return false;
    }

    self.templates.insert(decl, template.into());
    true
  }

  pub fn lookup(&self, decl: &DeclId) -> Option<&Template> {
    self.templates.get(decl)
  }

  pub fn len(&self) -> usize {
    self.templates.len()
  }

  pub fn is_empty(&self) -> bool {
    self.templates.is_empty()
  }
}
