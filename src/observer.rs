//! Observer traits and delivery strategies
//!
//! An [`Observer`] is the consuming end of a stream. It first receives a
//! [`BoxedSubscription`] through `on_subscribe`, and then at most as many
//! `next` calls as it requested, followed by at most one of `error` /
//! `complete`. Calls to one observer are never concurrent, but they may come
//! from different threads over the observer's lifetime.
//!
//! A [`ConditionalObserver`] additionally offers `try_next`, which lets the
//! observer reject a value without consuming demand. Producers that know about
//! the capability skip the request round-trip for every rejected value.

use std::sync::Arc;

use crate::{
  context::Context,
  error::FlowError,
  subscription::{BoxedSubscription, DeferredSubscription, Subscription, UNBOUNDED},
};

// ============================================================================
// Observer Traits
// ============================================================================

/// The consumer of a stream.
pub trait Observer<Item>: Send + 'static {
  /// Receive the handle used to request values and to cancel.
  ///
  /// Called exactly once, before any other method.
  fn on_subscribe(&mut self, subscription: BoxedSubscription);

  /// Receive the next value. Never called more often than requested.
  fn next(&mut self, value: Item);

  /// Receive the terminal error.
  fn error(&mut self, err: FlowError);

  /// Receive the terminal completion.
  fn complete(&mut self);

  /// The context this observer exposes to its producers.
  fn context(&self) -> Context { Context::empty() }
}

/// An observer that can accept or reject a value synchronously.
pub trait ConditionalObserver<Item>: Observer<Item> {
  /// Offer a value. Returns `true` if it was accepted, in which case it
  /// counts against demand; a rejected value does not.
  fn try_next(&mut self, value: Item) -> bool;
}

// ============================================================================
// Boxed Observers
// ============================================================================

/// Type-erased observer.
pub type BoxedObserver<Item> = Box<dyn Observer<Item>>;

/// Type-erased conditional observer.
pub type BoxedConditionalObserver<Item> = Box<dyn ConditionalObserver<Item>>;

macro_rules! impl_observer_for_box {
  ($ty:ty) => {
    impl<Item: 'static> Observer<Item> for $ty {
      #[inline]
      fn on_subscribe(&mut self, subscription: BoxedSubscription) {
        (**self).on_subscribe(subscription)
      }

      #[inline]
      fn next(&mut self, value: Item) { (**self).next(value) }

      #[inline]
      fn error(&mut self, err: FlowError) { (**self).error(err) }

      #[inline]
      fn complete(&mut self) { (**self).complete() }

      #[inline]
      fn context(&self) -> Context { (**self).context() }
    }
  };
}

impl_observer_for_box!(Box<dyn Observer<Item>>);
impl_observer_for_box!(Box<dyn ConditionalObserver<Item>>);

impl<Item: 'static> ConditionalObserver<Item> for Box<dyn ConditionalObserver<Item>> {
  #[inline]
  fn try_next(&mut self, value: Item) -> bool { (**self).try_next(value) }
}

// ============================================================================
// Deliver - plain or fused emission
// ============================================================================

/// How a producer hands values to its observer.
///
/// Producers are written once against this trait and instantiated with
/// [`Plain`] or [`Fused`] depending on which subscribe entry point was used.
pub trait Deliver<Item>: Send + 'static {
  fn on_subscribe(&mut self, subscription: BoxedSubscription);

  /// Hand over a value. Returns `false` if the observer rejected it; the
  /// value then does not count against demand.
  fn deliver(&mut self, value: Item) -> bool;

  fn error(&mut self, err: FlowError);

  fn complete(&mut self);

  fn context(&self) -> Context;

  /// Whether rejections are reported synchronously. `false` means `deliver`
  /// always returns `true`.
  fn is_fused(&self) -> bool;
}

/// Delivers through [`Observer::next`].
pub struct Plain<O>(pub O);

/// Delivers through [`ConditionalObserver::try_next`].
pub struct Fused<O>(pub O);

impl<Item, O: Observer<Item>> Deliver<Item> for Plain<O> {
  #[inline]
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.0.on_subscribe(subscription) }

  #[inline]
  fn deliver(&mut self, value: Item) -> bool {
    self.0.next(value);
    true
  }

  #[inline]
  fn error(&mut self, err: FlowError) { self.0.error(err) }

  #[inline]
  fn complete(&mut self) { self.0.complete() }

  #[inline]
  fn context(&self) -> Context { self.0.context() }

  #[inline]
  fn is_fused(&self) -> bool { false }
}

impl<Item, O: ConditionalObserver<Item>> Deliver<Item> for Fused<O> {
  #[inline]
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.0.on_subscribe(subscription) }

  #[inline]
  fn deliver(&mut self, value: Item) -> bool { self.0.try_next(value) }

  #[inline]
  fn error(&mut self, err: FlowError) { self.0.error(err) }

  #[inline]
  fn complete(&mut self) { self.0.complete() }

  #[inline]
  fn context(&self) -> Context { self.0.context() }

  #[inline]
  fn is_fused(&self) -> bool { true }
}

/// Type-erased delivery strategy.
pub type BoxedDeliver<Item> = Box<dyn Deliver<Item>>;

// ============================================================================
// FnObserver - Closure adapter
// ============================================================================

/// Observer built from closures, requesting an unbounded amount on subscribe.
///
/// Created by [`ObservableExt::subscribe`](crate::observable::ObservableExt::subscribe)
/// and [`ObservableExt::subscribe_all`](crate::observable::ObservableExt::subscribe_all).
pub struct FnObserver<N, E, C> {
  next: N,
  error: Option<E>,
  complete: Option<C>,
  handle: Arc<DeferredSubscription>,
  done: bool,
}

impl<N, E, C> FnObserver<N, E, C> {
  pub fn new(next: N, error: E, complete: C) -> (Self, SubscriptionHandle) {
    let handle = Arc::new(DeferredSubscription::new());
    let observer = FnObserver {
      next,
      error: Some(error),
      complete: Some(complete),
      handle: handle.clone(),
      done: false,
    };
    (observer, SubscriptionHandle(handle))
  }
}

impl<Item, N, E, C> Observer<Item> for FnObserver<N, E, C>
where
  N: FnMut(Item) + Send + 'static,
  E: FnOnce(FlowError) + Send + 'static,
  C: FnOnce() + Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    if self.handle.set(subscription) {
      self.handle.request(UNBOUNDED);
    }
  }

  fn next(&mut self, value: Item) {
    if !self.done {
      (self.next)(value);
    }
  }

  fn error(&mut self, err: FlowError) {
    self.done = true;
    if let Some(error) = self.error.take() {
      error(err);
    }
  }

  fn complete(&mut self) {
    self.done = true;
    if let Some(complete) = self.complete.take() {
      complete();
    }
  }
}

/// Handle returned by closure subscriptions. Cancels the stream on demand; it
/// does not cancel on drop.
#[derive(Clone, Debug)]
pub struct SubscriptionHandle(Arc<DeferredSubscription>);

impl SubscriptionHandle {
  #[inline]
  pub fn cancel(&self) { self.0.cancel() }

  #[inline]
  pub fn is_cancelled(&self) -> bool { self.0.is_cancelled() }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
  use parking_lot::Mutex;

  use super::*;
  use crate::subscription::EmptySubscription;

  struct Collect(Arc<Mutex<Vec<i32>>>);

  impl Observer<i32> for Collect {
    fn on_subscribe(&mut self, _: BoxedSubscription) {}

    fn next(&mut self, value: i32) { self.0.lock().push(value); }

    fn error(&mut self, _: FlowError) {}

    fn complete(&mut self) {}
  }

  impl ConditionalObserver<i32> for Collect {
    fn try_next(&mut self, value: i32) -> bool {
      if value % 2 == 0 {
        self.next(value);
        true
      } else {
        false
      }
    }
  }

  #[test]
  fn plain_always_accepts() {
    let seen = Arc::new(Mutex::new(vec![]));
    let mut plain = Plain(Collect(seen.clone()));
    assert!(plain.deliver(1));
    assert!(plain.deliver(2));
    assert!(!plain.is_fused());
    assert_eq!(*seen.lock(), vec![1, 2]);
  }

  #[test]
  fn fused_reports_rejections() {
    let seen = Arc::new(Mutex::new(vec![]));
    let mut fused: BoxedDeliver<i32> = Box::new(Fused(Collect(seen.clone())));
    assert!(!fused.deliver(1));
    assert!(fused.deliver(2));
    assert!(fused.is_fused());
    assert_eq!(*seen.lock(), vec![2]);
  }

  #[test]
  fn boxed_observer_forwards() {
    let seen = Arc::new(Mutex::new(vec![]));
    let mut boxed: BoxedObserver<i32> = Box::new(Collect(seen.clone()));
    boxed.on_subscribe(EmptySubscription::boxed());
    boxed.next(3);
    assert_eq!(*seen.lock(), vec![3]);
  }

  #[test]
  fn fn_observer_runs_terminal_once() {
    let seen = Arc::new(Mutex::new(vec![]));
    let sink = seen.clone();
    let ended = Arc::new(Mutex::new(0));
    let ended_c = ended.clone();
    let (mut observer, handle) =
      FnObserver::new(move |v: i32| sink.lock().push(v), |_e: FlowError| {}, move || *ended_c.lock() += 1);

    Observer::<i32>::on_subscribe(&mut observer, EmptySubscription::boxed());
    observer.next(1);
    Observer::<i32>::complete(&mut observer);
    observer.next(2);
    Observer::<i32>::complete(&mut observer);

    assert_eq!(*seen.lock(), vec![1]);
    assert_eq!(*ended.lock(), 1);
    assert!(!handle.is_cancelled());
    handle.cancel();
    assert!(handle.is_cancelled());
  }
}
