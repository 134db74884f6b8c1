//! IntoStream Operator
//!
//! Converts an [`Observable`] into a `futures::Stream`, so that emissions can
//! be consumed with `while let` loops in async code.
//!
//! The stream keeps at most `prefetch` values requested ahead of the
//! consumer, and requests one more each time a value is taken out. Dropping
//! the stream cancels the subscription.
//!
//! # Example
//!
//! ```rust
//! use futures::StreamExt;
//! use rxflow::prelude::*;
//!
//! # futures::executor::block_on(async {
//! let mut stream = observable::from_iter(1..=3).into_stream();
//!
//! let mut sum = 0;
//! while let Some(Ok(value)) = stream.next().await {
//!   sum += value;
//! }
//! assert_eq!(sum, 6);
//! # });
//! ```

use std::{
  collections::VecDeque,
  pin::Pin,
  sync::Arc,
  task::{Context as AsyncContext, Poll, Waker},
};

use futures::stream::Stream;
use parking_lot::Mutex;

use crate::{
  error::FlowError,
  observable::Observable,
  observer::Observer,
  subscription::{BoxedSubscription, DeferredSubscription, Subscription},
};

/// Buffered signals and the waker of the task waiting on them.
struct IntoStreamState<T> {
  queue: VecDeque<Result<T, FlowError>>,
  waker: Option<Waker>,
  is_closed: bool,
}

struct Shared<T> {
  state: Mutex<IntoStreamState<T>>,
  subscription: DeferredSubscription,
}

/// A `Stream` that yields values emitted by an `Observable`.
///
/// Created by [`into_stream`](crate::observable::ObservableExt::into_stream).
///
/// - `Ok(T)` for each value.
/// - `Err(FlowError)` when the observable fails, followed by the end of the
///   stream.
/// - `None` once the observable completes.
pub struct IntoStream<T> {
  shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> IntoStream<T> {
  pub const DEFAULT_PREFETCH: usize = 32;

  /// Subscribe to `observable`, requesting `prefetch` values up front. A
  /// prefetch of 0 is treated as 1.
  pub fn new<S>(observable: S, prefetch: usize) -> Self
  where
    S: Observable<Item = T>,
  {
    let shared = Arc::new(Shared {
      state: Mutex::new(IntoStreamState { queue: VecDeque::new(), waker: None, is_closed: false }),
      subscription: DeferredSubscription::new(),
    });
    observable.actual_subscribe(IntoStreamObserver {
      shared: shared.clone(),
      prefetch: prefetch.max(1) as u64,
    });
    IntoStream { shared }
  }
}

impl<T> Stream for IntoStream<T> {
  type Item = Result<T, FlowError>;

  fn poll_next(self: Pin<&mut Self>, cx: &mut AsyncContext<'_>) -> Poll<Option<Self::Item>> {
    let this = self.get_mut();
    let mut state = this.shared.state.lock();

    if let Some(item) = state.queue.pop_front() {
      let replenish = item.is_ok() && !state.is_closed;
      drop(state);
      if replenish {
        this.shared.subscription.request(1);
      }
      return Poll::Ready(Some(item));
    }

    if state.is_closed {
      return Poll::Ready(None);
    }

    state.waker = Some(cx.waker().clone());
    Poll::Pending
  }
}

impl<T> Drop for IntoStream<T> {
  fn drop(&mut self) { self.shared.subscription.cancel(); }
}

struct IntoStreamObserver<T> {
  shared: Arc<Shared<T>>,
  prefetch: u64,
}

impl<T> IntoStreamObserver<T> {
  fn push(&self, item: Option<Result<T, FlowError>>, close: bool) {
    let waker = {
      let mut state = self.shared.state.lock();
      if state.is_closed {
        return;
      }
      if let Some(item) = item {
        state.queue.push_back(item);
      }
      state.is_closed = close;
      state.waker.take()
    };
    if let Some(waker) = waker {
      waker.wake();
    }
  }
}

impl<T: Send + 'static> Observer<T> for IntoStreamObserver<T> {
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    if self.shared.subscription.set(subscription) {
      self.shared.subscription.request(self.prefetch);
    }
  }

  fn next(&mut self, value: T) { self.push(Some(Ok(value)), false) }

  fn error(&mut self, err: FlowError) { self.push(Some(Err(err)), true) }

  fn complete(&mut self) { self.push(None, true) }
}
