//! Reified stream events.
//!
//! A [`Signal`] captures one event of a stream together with the
//! [`Context`] of the subscription it was observed on. `switch_on_first`
//! hands its transformer the first signal of the source in this form.

use crate::{context::Context, error::FlowError};

/// One event of a stream: a value, an error or a completion.
#[derive(Debug, Clone)]
pub enum Signal<T> {
  Next { value: T, context: Context },
  Error { error: FlowError, context: Context },
  Complete { context: Context },
}

impl<T> Signal<T> {
  #[inline]
  pub fn next(value: T, context: Context) -> Self { Signal::Next { value, context } }

  #[inline]
  pub fn error(error: FlowError, context: Context) -> Self { Signal::Error { error, context } }

  #[inline]
  pub fn complete(context: Context) -> Self { Signal::Complete { context } }

  /// The context of the subscription the signal was observed on.
  pub fn context(&self) -> &Context {
    match self {
      Signal::Next { context, .. } | Signal::Error { context, .. } | Signal::Complete { context } => {
        context
      }
    }
  }

  pub fn value(&self) -> Option<&T> {
    match self {
      Signal::Next { value, .. } => Some(value),
      _ => None,
    }
  }

  pub fn into_value(self) -> Option<T> {
    match self {
      Signal::Next { value, .. } => Some(value),
      _ => None,
    }
  }

  pub fn error_ref(&self) -> Option<&FlowError> {
    match self {
      Signal::Error { error, .. } => Some(error),
      _ => None,
    }
  }

  #[inline]
  pub fn is_next(&self) -> bool { matches!(self, Signal::Next { .. }) }

  #[inline]
  pub fn is_error(&self) -> bool { matches!(self, Signal::Error { .. }) }

  #[inline]
  pub fn is_complete(&self) -> bool { matches!(self, Signal::Complete { .. }) }

  /// Whether this is a terminal signal.
  #[inline]
  pub fn is_terminal(&self) -> bool { !self.is_next() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accessors() {
    let ctx = Context::of("k", 1_u8);
    let next = Signal::next(5, ctx.clone());
    assert!(next.is_next() && !next.is_terminal());
    assert_eq!(next.value(), Some(&5));
    assert_eq!(next.context().get::<u8>("k"), Some(&1));

    let err = Signal::<i32>::error(FlowError::message("x"), Context::empty());
    assert!(err.is_error() && err.is_terminal());
    assert_eq!(err.error_ref().map(|e| e.to_string()), Some("x".to_string()));
    assert_eq!(err.into_value(), None);

    assert!(Signal::<i32>::complete(ctx).is_complete());
  }
}
