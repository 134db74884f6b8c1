//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for easy access.

pub use crate::{
  context::Context,
  error::FlowError,
  observable::{
    self, empty, from_iter, never, of, throw_err, BoxedObservable, Observable, ObservableExt,
  },
  observer::{ConditionalObserver, Observer},
  ops::{into_stream::IntoStream, switch_on_first::Continuation},
  signal::Signal,
  subscription::{BoxedSubscription, Subscription},
};
