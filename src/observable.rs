//! Observable traits and sources
//!
//! [`Observable`] is the producing end of a stream: subscribing an observer
//! starts the flow of values, paced by the observer's requests.
//! [`ObservableExt`] layers the operators on top and is implemented for every
//! observable.
//!
//! ```
//! use rxflow::prelude::*;
//!
//! let (tx, rx) = std::sync::mpsc::channel();
//! observable::from_iter(1..=5)
//!   .filter(|v| v % 2 == 1)
//!   .map(|v| v * 10)
//!   .subscribe(move |v| tx.send(v).unwrap());
//!
//! assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![10, 30, 50]);
//! ```

use crate::{
  context::Context,
  error::{FlowError, Result},
  observer::{ConditionalObserver, FnObserver, Observer, SubscriptionHandle},
  ops::{
    context_write::ContextWrite,
    filter::Filter,
    into_stream::IntoStream,
    lifecycle::{OnCancel, OnRequest},
    map::Map,
    merge::Merge,
    switch_on_first::{Continuation, SwitchOnFirst},
  },
  signal::Signal,
};

mod boxed;
mod from_iter;
mod trivial;

pub use boxed::{BoxedObservable, DynObservable};
pub use from_iter::{from_iter, of, FromIter};
pub use trivial::{empty, never, throw_err, Empty, Never, ThrowErr};

// ============================================================================
// Observable Trait
// ============================================================================

/// A source of values that honours its observer's demand.
pub trait Observable: Send + 'static {
  type Item: Send + 'static;

  /// Subscribe `observer`, delivering through plain `next`.
  fn actual_subscribe<O>(self, observer: O)
  where
    O: Observer<Self::Item>,
    Self: Sized;

  /// Subscribe an observer able to reject values synchronously.
  ///
  /// Observables that can exploit `try_next` override this; the default falls
  /// back to [`actual_subscribe`](Self::actual_subscribe).
  fn actual_subscribe_conditional<O>(self, observer: O)
  where
    O: ConditionalObserver<Self::Item>,
    Self: Sized,
  {
    self.actual_subscribe(observer)
  }
}

// ============================================================================
// ObservableExt - operators
// ============================================================================

pub trait ObservableExt: Observable + Sized {
  /// Transform each value.
  fn map<F, B>(self, f: F) -> Map<Self, F>
  where
    F: FnMut(Self::Item) -> B + Send + 'static,
    B: Send + 'static,
  {
    Map::new(self, f)
  }

  /// Keep only the values matching `predicate`.
  fn filter<F>(self, predicate: F) -> Filter<Self, F>
  where
    F: FnMut(&Self::Item) -> bool + Send + 'static,
  {
    Filter::new(self, predicate)
  }

  /// Interleave the values of `self` and `other`; completes once both have.
  fn merge_with<S>(self, other: S) -> Merge<Self, S>
  where
    S: Observable<Item = Self::Item>,
  {
    Merge::new(self, other)
  }

  /// Rewrite the context seen by everything upstream of this operator.
  fn context_write<F>(self, f: F) -> ContextWrite<Self, F>
  where
    F: Fn(&Context) -> Context + Send + Sync + 'static,
  {
    ContextWrite::new(self, f)
  }

  /// Observe every request made to this observable.
  fn on_request<F>(self, f: F) -> OnRequest<Self, F>
  where
    F: Fn(u64) + Send + Sync + 'static,
  {
    OnRequest::new(self, f)
  }

  /// Observe cancellation of this observable.
  fn on_cancel<F>(self, f: F) -> OnCancel<Self, F>
  where
    F: Fn() + Send + Sync + 'static,
  {
    OnCancel::new(self, f)
  }

  /// Decide the rest of the stream from its first signal.
  ///
  /// See [`switch_on_first`](crate::ops::switch_on_first). The source is
  /// cancelled when the derived observable completes.
  fn switch_on_first<F, P>(self, transform: F) -> SwitchOnFirst<Self, F>
  where
    F: FnOnce(Signal<Self::Item>, Continuation<Self::Item>) -> Result<P> + Send + 'static,
    P: Observable,
  {
    SwitchOnFirst::new(self, transform, true)
  }

  /// Like [`switch_on_first`](Self::switch_on_first) with an explicit policy
  /// for the source when the derived observable completes normally.
  fn switch_on_first_with<F, P>(
    self, transform: F, cancel_source_on_complete: bool,
  ) -> SwitchOnFirst<Self, F>
  where
    F: FnOnce(Signal<Self::Item>, Continuation<Self::Item>) -> Result<P> + Send + 'static,
    P: Observable,
  {
    SwitchOnFirst::new(self, transform, cancel_source_on_complete)
  }

  /// Erase the concrete observable type.
  fn box_it(self) -> BoxedObservable<Self::Item> { BoxedObservable::new(self) }

  /// Consume the observable as a `futures::Stream`.
  fn into_stream(self) -> IntoStream<Self::Item> {
    IntoStream::new(self, IntoStream::<Self::Item>::DEFAULT_PREFETCH)
  }

  /// Like [`into_stream`](Self::into_stream), keeping at most `prefetch`
  /// values requested ahead of the consumer.
  fn into_stream_with_prefetch(self, prefetch: usize) -> IntoStream<Self::Item> {
    IntoStream::new(self, prefetch)
  }

  /// Subscribe with a closure for values, requesting an unbounded amount.
  fn subscribe<N>(self, next: N) -> SubscriptionHandle
  where
    N: FnMut(Self::Item) + Send + 'static,
  {
    self.subscribe_all(next, |_| {}, || {})
  }

  /// Subscribe with closures for values, error and completion.
  fn subscribe_all<N, E, C>(self, next: N, error: E, complete: C) -> SubscriptionHandle
  where
    N: FnMut(Self::Item) + Send + 'static,
    E: FnOnce(FlowError) + Send + 'static,
    C: FnOnce() + Send + 'static,
  {
    let (observer, handle) = FnObserver::new(next, error, complete);
    self.actual_subscribe(observer);
    handle
  }
}

impl<T: Observable> ObservableExt for T {}
