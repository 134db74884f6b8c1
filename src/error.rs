//! Error type shared by every observable in the crate.
//!
//! Streams in rxflow carry a single error type, [`FlowError`]. It is `Clone`
//! because a terminal error may have to reach more than one party: the
//! captured first [`Signal`](crate::signal::Signal) and the observer of the
//! [`Continuation`](crate::ops::switch_on_first::Continuation) both see the
//! same upstream failure.
//!
//! # Examples
//!
//! ```
//! use rxflow::error::{FlowError, Result};
//!
//! fn parse(raw: &str) -> Result<u32> {
//!   raw.parse().map_err(FlowError::user)
//! }
//!
//! assert!(parse("12").is_ok());
//! assert!(parse("x").is_err());
//! ```

use std::{any::Any, borrow::Cow, sync::Arc};

/// Root error type for every stream failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FlowError {
  /// A second observer tried to attach to a single-subscriber source.
  ///
  /// Only the losing observer receives this error.
  #[error("{operator} allows only one Subscriber")]
  MultipleSubscribers {
    /// Name of the operator that refused the subscription
    operator: &'static str,
  },

  /// A producer emitted more values than were requested.
  #[error("Can't deliver value due to lack of requests")]
  MissingRequests,

  /// The source backing a handle was cancelled before the observer attached.
  #[error("{operator} has already been cancelled")]
  Cancelled {
    /// Name of the operator whose source is gone
    operator: &'static str,
  },

  /// `request(0)` was called.
  #[error("request amount must be strictly positive, got {0}")]
  NonPositiveRequest(u64),

  /// A user supplied closure panicked while the operator was running it.
  #[error("User callback panicked: {context}")]
  CallbackPanic {
    /// The panic message, when one could be extracted
    context: String,
  },

  /// Free-form failure raised by user code.
  #[error("{0}")]
  Message(Cow<'static, str>),

  /// Wraps an arbitrary error produced by user code.
  #[error(transparent)]
  User(Arc<dyn std::error::Error + Send + Sync>),
}

impl FlowError {
  /// Build a [`FlowError::Message`].
  pub fn message(msg: impl Into<Cow<'static, str>>) -> Self { Self::Message(msg.into()) }

  /// Wrap an error coming from user code.
  pub fn user(err: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::User(Arc::new(err))
  }

  /// Convert a payload caught by `catch_unwind` into a
  /// [`FlowError::CallbackPanic`].
  pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
    let context = if let Some(s) = payload.downcast_ref::<&'static str>() {
      (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
      s.clone()
    } else {
      "<non-string panic payload>".to_string()
    };
    Self::CallbackPanic { context }
  }

  #[inline]
  pub fn is_missing_requests(&self) -> bool { matches!(self, Self::MissingRequests) }

  #[inline]
  pub fn is_multiple_subscribers(&self) -> bool { matches!(self, Self::MultipleSubscribers { .. }) }

  #[inline]
  pub fn is_cancelled(&self) -> bool { matches!(self, Self::Cancelled { .. }) }
}

/// Result alias used by transformers and helpers.
pub type Result<T> = std::result::Result<T, FlowError>;
