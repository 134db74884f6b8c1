//! Lifecycle operators: OnRequest and OnCancel
//!
//! These operators tap the subscription flowing from an observable to its
//! observer, running a callback for every request or on cancellation. Values
//! and terminal signals pass through untouched, and fused delivery is kept.

use std::sync::Arc;

use crate::{
  context::Context,
  error::FlowError,
  observable::Observable,
  observer::{ConditionalObserver, Observer},
  subscription::{BoxedSubscription, Subscription},
};

/// Callbacks run when a tapped subscription is used.
pub trait SubscriptionTap: Send + Sync + 'static {
  fn on_request(&self, _n: u64) {}

  fn on_cancel(&self) {}
}

// ==================== OnRequest ====================

/// Runs a callback with every requested amount before forwarding it.
pub struct OnRequest<S, F> {
  source: S,
  callback: F,
}

impl<S, F> OnRequest<S, F> {
  pub fn new(source: S, callback: F) -> Self { Self { source, callback } }
}

#[doc(hidden)]
pub struct RequestTap<F>(F);

impl<F: Fn(u64) + Send + Sync + 'static> SubscriptionTap for RequestTap<F> {
  fn on_request(&self, n: u64) { (self.0)(n) }
}

impl<S, F> Observable for OnRequest<S, F>
where
  S: Observable,
  F: Fn(u64) + Send + Sync + 'static,
{
  type Item = S::Item;

  fn actual_subscribe<O: Observer<S::Item>>(self, observer: O) {
    self
      .source
      .actual_subscribe(TapObserver::new(observer, RequestTap(self.callback)))
  }

  fn actual_subscribe_conditional<O: ConditionalObserver<S::Item>>(self, observer: O) {
    self
      .source
      .actual_subscribe_conditional(TapObserver::new(observer, RequestTap(self.callback)))
  }
}

// ==================== OnCancel ====================

/// Runs a callback the first time the subscription is cancelled.
pub struct OnCancel<S, F> {
  source: S,
  callback: F,
}

impl<S, F> OnCancel<S, F> {
  pub fn new(source: S, callback: F) -> Self { Self { source, callback } }
}

#[doc(hidden)]
pub struct CancelTap<F> {
  callback: F,
  fired: std::sync::atomic::AtomicBool,
}

impl<F: Fn() + Send + Sync + 'static> SubscriptionTap for CancelTap<F> {
  fn on_cancel(&self) {
    if !self.fired.swap(true, std::sync::atomic::Ordering::AcqRel) {
      (self.callback)()
    }
  }
}

impl<S, F> Observable for OnCancel<S, F>
where
  S: Observable,
  F: Fn() + Send + Sync + 'static,
{
  type Item = S::Item;

  fn actual_subscribe<O: Observer<S::Item>>(self, observer: O) {
    let tap = CancelTap { callback: self.callback, fired: Default::default() };
    self.source.actual_subscribe(TapObserver::new(observer, tap))
  }

  fn actual_subscribe_conditional<O: ConditionalObserver<S::Item>>(self, observer: O) {
    let tap = CancelTap { callback: self.callback, fired: Default::default() };
    self
      .source
      .actual_subscribe_conditional(TapObserver::new(observer, tap))
  }
}

// ==================== Shared plumbing ====================

struct TappedSubscription<H> {
  inner: BoxedSubscription,
  tap: Arc<H>,
}

impl<H: SubscriptionTap> Subscription for TappedSubscription<H> {
  fn request(&self, n: u64) {
    self.tap.on_request(n);
    self.inner.request(n);
  }

  fn cancel(&self) {
    self.tap.on_cancel();
    self.inner.cancel();
  }
}

/// Observer wrapper handing a tapped subscription downstream.
pub struct TapObserver<O, H> {
  observer: O,
  tap: Arc<H>,
}

impl<O, H> TapObserver<O, H> {
  fn new(observer: O, tap: H) -> Self { Self { observer, tap: Arc::new(tap) } }
}

impl<Item, O, H> Observer<Item> for TapObserver<O, H>
where
  O: Observer<Item>,
  H: SubscriptionTap,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.observer.on_subscribe(Arc::new(TappedSubscription {
      inner: subscription,
      tap: self.tap.clone(),
    }))
  }

  #[inline]
  fn next(&mut self, value: Item) { self.observer.next(value) }

  #[inline]
  fn error(&mut self, err: FlowError) { self.observer.error(err) }

  #[inline]
  fn complete(&mut self) { self.observer.complete() }

  #[inline]
  fn context(&self) -> Context { self.observer.context() }
}

impl<Item, O, H> ConditionalObserver<Item> for TapObserver<O, H>
where
  O: ConditionalObserver<Item>,
  H: SubscriptionTap,
{
  #[inline]
  fn try_next(&mut self, value: Item) -> bool { self.observer.try_next(value) }
}
