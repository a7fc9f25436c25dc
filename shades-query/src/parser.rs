//! Clause parser combinators.
//!
//! Clause sequences are short, linear and recognized in a single forward pass: a [`Source`] is a cursor over a slice
//! and a [`Parser`] either recognizes what’s under the cursor (returning `true` and advancing) or doesn’t (returning
//! `false`). Hard failures, such as a missing mandatory clause, are reported with [`CompileError`].
//!
//! Parsers are built from element predicates with [`exactly_one`], [`zero_or_more`] and [`one_or_more`], then combined
//! with [`Parser::then`], [`Parser::if_fail`] and [`Parser::if_succeed`].

use crate::error::{CompileError, CompileResult};

/// Cursor over a sequence of elements.
#[derive(Debug)]
pub struct Source<'a, T> {
  items: &'a [T],
  pos: usize,
}

impl<'a, T> Source<'a, T> {
  pub fn new(items: &'a [T]) -> Self {
    Self { items, pos: 0 }
  }

  /// Element under the cursor, if any.
  pub fn current(&self) -> Option<&'a T> {
    self.items.get(self.pos)
  }

  pub fn advance(&mut self) {
    if self.pos < self.items.len() {
      self.pos += 1;
    }
  }

  pub fn at_end(&self) -> bool {
    self.pos >= self.items.len()
  }

  pub fn position(&self) -> usize {
    self.pos
  }

  /// Elements not consumed yet.
  pub fn remaining(&self) -> &'a [T] {
    &self.items[self.pos.min(self.items.len())..]
  }
}

/// A parser of `T` elements, threading a state `S` (typically the emitter).
pub trait Parser<T, S> {
  /// Try to recognize the elements under the cursor.
  ///
  /// `Ok(false)` means “not recognized” and leaves the decision to the caller.
  fn parse(&mut self, source: &mut Source<T>, state: &mut S) -> CompileResult<bool>;

  /// Run `self`, then `next` if `self` succeeded.
  fn then<P>(self, next: P) -> Then<Self, P>
  where
    Self: Sized,
    P: Parser<T, S>,
  {
    Then {
      first: self,
      second: next,
    }
  }

  /// Turn a `false` result into the error built by `err`.
  fn if_fail<F>(self, err: F) -> IfFail<Self, F>
  where
    Self: Sized,
    F: FnMut() -> CompileError,
  {
    IfFail { parser: self, err }
  }

  /// Run `effect` the first time `self` succeeds.
  fn if_succeed<F>(self, effect: F) -> IfSucceed<Self, F>
  where
    Self: Sized,
    F: FnOnce(&mut S) -> CompileResult<()>,
  {
    IfSucceed {
      parser: self,
      effect: Some(effect),
    }
  }
}

/// Parser built by [`exactly_one`].
#[derive(Debug)]
pub struct ExactlyOne<F>(F);

/// Recognize the element under the cursor with `pred`.
pub fn exactly_one<F>(pred: F) -> ExactlyOne<F> {
  ExactlyOne(pred)
}

impl<T, S, F> Parser<T, S> for ExactlyOne<F>
where
  F: FnMut(&T, &mut S) -> CompileResult<bool>,
{
  fn parse(&mut self, source: &mut Source<T>, state: &mut S) -> CompileResult<bool> {
    match source.current() {
      Some(item) if (self.0)(item, state)? => {
        source.advance();
        Ok(true)
      }

      _ => Ok(false),
    }
  }
}

/// Parser built by [`zero_or_more`].
#[derive(Debug)]
pub struct ZeroOrMore<F>(F);

/// Recognize as many elements as possible with `pred`; always succeeds.
pub fn zero_or_more<F>(pred: F) -> ZeroOrMore<F> {
  ZeroOrMore(pred)
}

impl<T, S, F> Parser<T, S> for ZeroOrMore<F>
where
  F: FnMut(&T, &mut S) -> CompileResult<bool>,
{
  fn parse(&mut self, source: &mut Source<T>, state: &mut S) -> CompileResult<bool> {
    while let Some(item) = source.current() {
      if !(self.0)(item, state)? {
        break;
      }

      source.advance();
    }

    Ok(true)
  }
}

/// Parser built by [`one_or_more`].
#[derive(Debug)]
pub struct OneOrMore<F>(F);

/// Recognize at least one element with `pred`, then as many as possible.
pub fn one_or_more<F>(pred: F) -> OneOrMore<F> {
  OneOrMore(pred)
}

impl<T, S, F> Parser<T, S> for OneOrMore<F>
where
  F: FnMut(&T, &mut S) -> CompileResult<bool>,
{
  fn parse(&mut self, source: &mut Source<T>, state: &mut S) -> CompileResult<bool> {
    let mut once = ExactlyOne(&mut self.0);

    if !once.parse(source, state)? {
      return Ok(false);
    }

    ZeroOrMore(once.0).parse(source, state)
  }
}

/// Parser built by [`Parser::then`].
#[derive(Debug)]
pub struct Then<P, Q> {
  first: P,
  second: Q,
}

impl<T, S, P, Q> Parser<T, S> for Then<P, Q>
where
  P: Parser<T, S>,
  Q: Parser<T, S>,
{
  fn parse(&mut self, source: &mut Source<T>, state: &mut S) -> CompileResult<bool> {
    Ok(self.first.parse(source, state)? && self.second.parse(source, state)?)
  }
}

/// Parser built by [`Parser::if_fail`].
#[derive(Debug)]
pub struct IfFail<P, F> {
  parser: P,
  err: F,
}

impl<T, S, P, F> Parser<T, S> for IfFail<P, F>
where
  P: Parser<T, S>,
  F: FnMut() -> CompileError,
{
  fn parse(&mut self, source: &mut Source<T>, state: &mut S) -> CompileResult<bool> {
    if self.parser.parse(source, state)? {
      Ok(true)
    } else {
      Err((self.err)())
    }
  }
}

/// Parser built by [`Parser::if_succeed`].
#[derive(Debug)]
pub struct IfSucceed<P, F> {
  parser: P,
  effect: Option<F>,
}

impl<T, S, P, F> Parser<T, S> for IfSucceed<P, F>
where
  P: Parser<T, S>,
  F: FnOnce(&mut S) -> CompileResult<()>,
{
  fn parse(&mut self, source: &mut Source<T>, state: &mut S) -> CompileResult<bool> {
    if !self.parser.parse(source, state)? {
      return Ok(false);
    }

    if let Some(effect) = self.effect.take() {
      effect(state)?;
    }

    Ok(true)
  }
}
