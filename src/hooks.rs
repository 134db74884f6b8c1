//! Secondary channel for signals that can no longer be delivered.
//!
//! Once a subscription has terminated, or was cancelled, a producer may still
//! push an error or a value at it. Those signals must not reach the observer
//! again, and must not panic either. Operators hand them to
//! [`on_error_dropped`] / [`on_next_dropped`] instead.
//!
//! By default dropped signals are logged through `tracing`. A subscription can
//! install its own hook in its [`Context`]:
//!
//! ```
//! use std::sync::{Arc, Mutex};
//!
//! use rxflow::{context::Context, error::FlowError, hooks};
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = seen.clone();
//! let ctx = Context::empty().with_error_dropped_hook(move |e| sink.lock().unwrap().push(e.to_string()));
//!
//! hooks::on_error_dropped(&FlowError::message("late"), &ctx);
//! assert_eq!(*seen.lock().unwrap(), vec!["late".to_string()]);
//! ```

use std::{any::Any, sync::Arc};

use crate::{context::Context, error::FlowError};

/// Context key under which an [`ErrorDroppedHook`] is looked up.
pub const ON_ERROR_DROPPED_KEY: &str = "rxflow.hooks.on_error_dropped";
/// Context key under which a [`NextDroppedHook`] is looked up.
pub const ON_NEXT_DROPPED_KEY: &str = "rxflow.hooks.on_next_dropped";

/// Callback receiving errors that arrived after termination.
#[derive(Clone)]
pub struct ErrorDroppedHook(Arc<dyn Fn(&FlowError) + Send + Sync>);

/// Callback receiving values that arrived after termination. The value is
/// type-erased; downcast it to inspect it.
#[derive(Clone)]
pub struct NextDroppedHook(Arc<dyn Fn(&(dyn Any + Send)) + Send + Sync>);

impl ErrorDroppedHook {
  pub fn new(f: impl Fn(&FlowError) + Send + Sync + 'static) -> Self { Self(Arc::new(f)) }
}

impl NextDroppedHook {
  pub fn new(f: impl Fn(&(dyn Any + Send)) + Send + Sync + 'static) -> Self { Self(Arc::new(f)) }
}

impl Context {
  /// Return a copy of this context carrying `f` as its dropped-error hook.
  pub fn with_error_dropped_hook(&self, f: impl Fn(&FlowError) + Send + Sync + 'static) -> Self {
    self.put(ON_ERROR_DROPPED_KEY, ErrorDroppedHook::new(f))
  }

  /// Return a copy of this context carrying `f` as its dropped-value hook.
  pub fn with_next_dropped_hook(
    &self, f: impl Fn(&(dyn Any + Send)) + Send + Sync + 'static,
  ) -> Self {
    self.put(ON_NEXT_DROPPED_KEY, NextDroppedHook::new(f))
  }
}

/// Report an error that could not be delivered.
pub fn on_error_dropped(err: &FlowError, context: &Context) {
  match context.get::<ErrorDroppedHook>(ON_ERROR_DROPPED_KEY) {
    Some(hook) => (hook.0)(err),
    None => tracing::error!(error = %err, "error dropped after termination"),
  }
}

/// Report a value that could not be delivered.
pub fn on_next_dropped<T: Send + 'static>(value: T, context: &Context) {
  match context.get::<NextDroppedHook>(ON_NEXT_DROPPED_KEY) {
    Some(hook) => (hook.0)(&value),
    None => tracing::debug!(value_type = std::any::type_name::<T>(), "value dropped after termination"),
  }
}

/// Report a `request(0)`. The request itself is ignored.
pub fn on_bad_request(n: u64, context: &Context) {
  on_error_dropped(&FlowError::NonPositiveRequest(n), context);
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use super::*;

  #[test]
  fn next_hook_receives_the_value() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let ctx = Context::empty().with_next_dropped_hook(move |v| {
      if let Some(v) = v.downcast_ref::<i32>() {
        sink.lock().unwrap().push(*v);
      }
    });

    on_next_dropped(7_i32, &ctx);
    on_next_dropped("ignored", &ctx);
    assert_eq!(*seen.lock().unwrap(), vec![7]);
  }

  #[test]
  fn without_hook_nothing_panics() {
    on_error_dropped(&FlowError::MissingRequests, &Context::empty());
    on_next_dropped(1_u8, &Context::empty());
  }

  #[test]
  fn bad_request_goes_through_error_hook() {
    let seen = Arc::new(Mutex::new(None));
    let sink = seen.clone();
    let ctx = Context::empty().with_error_dropped_hook(move |e| *sink.lock().unwrap() = Some(e.clone()));

    on_bad_request(0, &ctx);
    assert!(matches!(*seen.lock().unwrap(), Some(FlowError::NonPositiveRequest(0))));
  }
}
